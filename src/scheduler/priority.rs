use super::Scheduler;
use crate::core::{ProcessRecord, ProcessTable, QueueId, Ticks};

/// Highest priority first, earliest admission among equals. A dispatched
/// record runs its whole remaining burst before the queue is consulted again.
#[derive(Debug)]
pub struct PriorityScheduler {
    queue: QueueId,
}

impl Scheduler for PriorityScheduler {
    fn init(table: &mut ProcessTable) -> Self {
        Self {
            queue: table.create_queue_priq(),
        }
    }

    fn name(&self) -> &'static str {
        "priority"
    }

    fn queue(&self) -> QueueId {
        self.queue
    }

    fn slice(&self, record: &ProcessRecord) -> Ticks {
        record.remaining_burst
    }
}
