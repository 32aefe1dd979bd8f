pub mod command;
pub mod config;
pub mod driver;
pub mod launch;
pub mod shell;
pub mod workload;

pub use command::{Command, CommandKind, ParseError, SchedulePolicy};
pub use config::SessionConfig;
pub use driver::{Kernel, MemoryMap};
pub use launch::{LaunchSpec, Launcher, OsLauncher, SimulatedLauncher};
pub use shell::{Flow, Shell};
pub use workload::{Job, bernoulli_jobs};
