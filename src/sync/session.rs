use std::{
    fmt, panic,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::info;

use super::SyncChannel;
use crate::core::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub producer: usize,
    pub seq: usize,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item-{}.{}", self.producer, self.seq)
    }
}

#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub items: usize,
    pub producers: usize,
    pub consumers: usize,
    pub capacity: usize,
    // Pause after each produced or consumed item
    pub item_delay: Duration,
}

impl SessionPlan {
    pub fn single(items: usize, capacity: usize) -> Self {
        Self {
            items,
            producers: 1,
            consumers: 1,
            capacity,
            item_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub produced: usize,
    // What each consumer took, in the order it took it
    pub consumed: Vec<Vec<Item>>,
    pub capacity: usize,
    pub high_water: usize,
}

impl SessionReport {
    pub fn consumed_count(&self) -> usize {
        self.consumed.iter().map(Vec::len).sum()
    }
}

/// A running producer/consumer session over a fresh [`SyncChannel`].
pub struct ProducerConsumer {
    channel: Arc<SyncChannel<Item>>,
    producers: Vec<JoinHandle<usize>>,
    consumers: Vec<JoinHandle<Vec<Item>>>,
}

// Items handled by worker `index` when `total` is split `parts` ways
fn share(total: usize, parts: usize, index: usize) -> usize {
    total / parts + usize::from(index < total % parts)
}

impl ProducerConsumer {
    pub fn start(plan: &SessionPlan) -> Result<Self, ConfigError> {
        if plan.producers == 0 || plan.consumers == 0 {
            return Err(ConfigError::SessionWorkers {
                producers: plan.producers,
                consumers: plan.consumers,
            });
        }
        let channel = Arc::new(SyncChannel::new(plan.capacity)?);
        info!(
            items = plan.items,
            producers = plan.producers,
            consumers = plan.consumers,
            capacity = plan.capacity,
            "Producer/consumer session started"
        );

        let producers = (0..plan.producers)
            .map(|producer| {
                let channel = Arc::clone(&channel);
                let count = share(plan.items, plan.producers, producer);
                let delay = plan.item_delay;
                thread::spawn(move || {
                    for seq in 0..count {
                        let item = Item { producer, seq };
                        info!(item = %item, "Produced");
                        channel.put(item);
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                    count
                })
            })
            .collect();

        let consumers = (0..plan.consumers)
            .map(|consumer| {
                let channel = Arc::clone(&channel);
                let count = share(plan.items, plan.consumers, consumer);
                let delay = plan.item_delay;
                thread::spawn(move || {
                    let mut taken = Vec::with_capacity(count);
                    for _ in 0..count {
                        let item = channel.take();
                        info!(consumer, item = %item, "Consumed");
                        taken.push(item);
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                    taken
                })
            })
            .collect();

        Ok(Self {
            channel,
            producers,
            consumers,
        })
    }

    pub fn channel(&self) -> &SyncChannel<Item> {
        &self.channel
    }

    /// Waits for every producer and consumer to finish.
    pub fn join(self) -> SessionReport {
        let produced = self
            .producers
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .sum();
        let consumed: Vec<Vec<Item>> = self
            .consumers
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .collect();

        debug_assert!(self.channel.is_empty(), "Session ended with items left");
        let report = SessionReport {
            produced,
            consumed,
            capacity: self.channel.capacity(),
            high_water: self.channel.high_water(),
        };
        info!(
            produced = report.produced,
            consumed = report.consumed_count(),
            high_water = report.high_water,
            "Producer/consumer session finished"
        );
        report
    }
}
