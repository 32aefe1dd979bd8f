use std::{error::Error, fmt};

use super::state::Pid;

/// The launch collaborator could not start the job; the process never enters
/// the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    EmptyCommand,
    Launch { program: String, reason: String },
    DuplicatePid(Pid),
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCommand => write!(f, "empty command"),
            Self::Launch { program, reason } => write!(f, "cannot launch {program}: {reason}"),
            Self::DuplicatePid(pid) => write!(f, "pid {pid} is already live"),
        }
    }
}

impl Error for AdmissionError {}

/// Values rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Priority(i64),
    PageCount { requested: i64, capacity: usize },
    Burst(i64),
    PageSize { total_memory: usize, page_size: usize },
    BufferCapacity(usize),
    SessionWorkers { producers: usize, consumers: usize },
    Env { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Priority(p) => write!(f, "priority must be in 0..={}, got {p}", u32::MAX),
            Self::PageCount {
                requested,
                capacity,
            } => write!(f, "page count {requested} outside 0..={capacity}"),
            Self::Burst(b) => write!(f, "burst must be at least 1, got {b}"),
            Self::PageSize {
                total_memory,
                page_size,
            } => write!(
                f,
                "page size {page_size} does not fit total memory {total_memory}"
            ),
            Self::BufferCapacity(c) => write!(f, "buffer capacity must be at least 1, got {c}"),
            Self::SessionWorkers {
                producers,
                consumers,
            } => write!(
                f,
                "need at least one producer and one consumer, got {producers}/{consumers}"
            ),
            Self::Env { name, value } => write!(f, "invalid value {value:?} for {name}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    Admission(AdmissionError),
    InsufficientMemory { requested: usize, available: usize },
    // Every queued record was memory-starved during one full pass.
    SchedulingStalled { starved: Vec<Pid> },
    InvalidConfiguration(ConfigError),
    UnknownProcess(Pid),
    MetricsUnavailable(Pid),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admission(e) => write!(f, "admission failed: {e}"),
            Self::InsufficientMemory {
                requested,
                available,
            } => write!(
                f,
                "insufficient memory: requested {requested} page(s), {available} obtainable"
            ),
            Self::SchedulingStalled { starved } => {
                write!(f, "scheduling stalled: all queued processes are memory-starved {starved:?}")
            }
            Self::InvalidConfiguration(e) => write!(f, "invalid configuration: {e}"),
            Self::UnknownProcess(pid) => write!(f, "no live process with pid {pid}"),
            Self::MetricsUnavailable(pid) => write!(f, "process {pid} has not completed"),
        }
    }
}

impl Error for KernelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Admission(e) => Some(e),
            Self::InvalidConfiguration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AdmissionError> for KernelError {
    fn from(e: AdmissionError) -> Self {
        Self::Admission(e)
    }
}

impl From<ConfigError> for KernelError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfiguration(e)
    }
}
