use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use super::{Semaphore, lock};
use crate::core::ConfigError;

/// Bounded FIFO buffer shared by any number of producers and consumers.
///
/// `empty_slots` starts at the capacity and `full_slots` at zero; the buffer
/// itself sits behind a mutex. Producers block while the buffer is full and
/// consumers while it is empty, purely through the permit counts.
#[derive(Debug)]
pub struct SyncChannel<T> {
    capacity: usize,
    empty_slots: Semaphore,
    full_slots: Semaphore,
    items: Mutex<VecDeque<T>>,
    high_water: AtomicUsize,
}

impl<T> SyncChannel<T> {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::BufferCapacity(capacity));
        }
        Ok(Self {
            capacity,
            empty_slots: Semaphore::new(capacity),
            full_slots: Semaphore::new(0),
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            high_water: AtomicUsize::new(0),
        })
    }

    pub fn put(&self, item: T) {
        self.empty_slots.acquire();
        {
            let mut items = lock(&self.items);
            items.push_back(item);
            assert!(
                items.len() <= self.capacity,
                "Buffer holds {} items, capacity {}",
                items.len(),
                self.capacity
            );
            self.high_water.fetch_max(items.len(), Ordering::SeqCst);
        }
        self.full_slots.release();
    }

    /// Removes the oldest item, blocking while the buffer is empty.
    pub fn take(&self) -> T {
        self.full_slots.acquire();
        let item = lock(&self.items).pop_front();
        let Some(item) = item else {
            unreachable!("full-slot permit acquired on an empty buffer");
        };
        self.empty_slots.release();
        item
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            SyncChannel::<u8>::new(0).unwrap_err(),
            ConfigError::BufferCapacity(0)
        );
    }

    #[test]
    fn items_come_out_in_order() {
        let channel = SyncChannel::new(3).unwrap();
        channel.put(1);
        channel.put(2);
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.take(), 1);
        assert_eq!(channel.take(), 2);
        assert!(channel.is_empty());
    }

    #[test]
    fn full_buffer_blocks_producer_until_consumed() {
        let channel = SyncChannel::new(1).unwrap();
        channel.put(10);
        thread::scope(|s| {
            let producer = s.spawn(|| channel.put(20));
            thread::sleep(Duration::from_millis(20));
            assert_eq!(channel.len(), 1);
            assert_eq!(channel.take(), 10);
            producer.join().unwrap();
        });
        assert_eq!(channel.take(), 20);
        assert_eq!(channel.high_water(), 1);
    }
}
