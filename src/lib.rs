pub mod core;
pub mod metrics;
pub mod scheduler;
pub mod sim;
pub mod sync;

pub use crate::core::{KernelError, Pid, ProcessRecord, SchedEvent};
pub use metrics::{MetricsCollector, ProcessMetrics};
pub use scheduler::Scheduler;
pub use sim::{Kernel, LaunchSpec, SessionConfig};
