pub mod driver;
pub mod error;
pub mod event;
pub mod memory;
pub mod observer;
pub mod state;

pub use driver::{RunReport, SchedCore, StopHandle};
pub use error::{AdmissionError, ConfigError, KernelError};
pub use event::SchedEvent;
pub use memory::{Allocation, Eviction, PageStore};
pub use observer::Observer;
pub use state::{
    NewProcess, PageId, Pid, Priority, PriorityKey, ProcessRecord, ProcessState, ProcessTable,
    QueueId, RunQueue, Ticks,
};
