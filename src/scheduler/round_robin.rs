use tracing::{info, warn};

use super::{DEFAULT_QUANTUM, Scheduler};
use crate::core::{ProcessRecord, ProcessTable, QueueId, Ticks};

/// Time-sliced FIFO: each dispatch runs at most one quantum, unfinished
/// records go back to the tail.
#[derive(Debug)]
pub struct RoundRobinScheduler {
    queue: QueueId,
    quantum: Ticks,
}

impl RoundRobinScheduler {
    pub fn quantum(&self) -> Ticks {
        self.quantum
    }

    /// Values below one are floored to one.
    pub fn set_quantum(&mut self, quantum: i64) -> Ticks {
        let clamped = Ticks::try_from(quantum).unwrap_or(0).max(1);
        if i64::try_from(clamped).ok() != Some(quantum) {
            warn!(requested = quantum, quantum = clamped, "Quantum clamped");
        }
        self.quantum = clamped;
        info!(quantum = clamped, "Time quantum set");
        clamped
    }
}

impl Scheduler for RoundRobinScheduler {
    fn init(table: &mut ProcessTable) -> Self {
        Self {
            queue: table.create_queue_fifo(),
            quantum: DEFAULT_QUANTUM,
        }
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn queue(&self) -> QueueId {
        self.queue
    }

    fn slice(&self, record: &ProcessRecord) -> Ticks {
        self.quantum.min(record.remaining_burst)
    }
}
