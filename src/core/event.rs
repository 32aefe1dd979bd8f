use std::fmt;

use crate::core::{Pid, Ticks};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedEvent {
    Dispatched {
        pid: Pid,
        slice: Ticks,
        at: Ticks,
    },
    Requeued {
        pid: Pid,
        remaining: Ticks,
    },
    Completed {
        pid: Pid,
        at: Ticks,
    },
    // Popped but left in the queue for lack of pages
    SkippedStarved {
        pid: Pid,
    },
}

impl fmt::Display for SchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatched { pid, slice, at } => {
                write!(f, "t={at} running pid {pid} for {slice} tick(s)")
            }
            Self::Requeued { pid, remaining } => {
                write!(f, "pid {pid} requeued with {remaining} tick(s) left")
            }
            Self::Completed { pid, at } => write!(f, "t={at} pid {pid} completed"),
            Self::SkippedStarved { pid } => write!(f, "pid {pid} skipped: memory-starved"),
        }
    }
}
