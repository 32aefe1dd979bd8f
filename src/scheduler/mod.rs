pub mod priority;
pub mod round_robin;

use crate::core::{Pid, ProcessRecord, ProcessTable, QueueId, Ticks};
pub use priority::PriorityScheduler;
pub use round_robin::RoundRobinScheduler;

pub const DEFAULT_QUANTUM: Ticks = 2;

/// A dispatch discipline over one run queue of the shared process table.
///
/// The driving loop lives in [`crate::core::SchedCore`]; a scheduler only
/// decides where records queue and how long a dispatch lasts.
pub trait Scheduler {
    fn init(table: &mut ProcessTable) -> Self
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    fn queue(&self) -> QueueId;

    fn enqueue(&mut self, table: &mut ProcessTable, pid: Pid) {
        table.queue_push(self.queue(), pid);
    }

    /// Ticks the record runs for once dispatched. Never exceeds its
    /// remaining burst.
    fn slice(&self, record: &ProcessRecord) -> Ticks;
}
