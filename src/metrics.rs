use average::{Estimate, Mean};

use crate::core::{KernelError, Pid, ProcessRecord, ProcessState, ProcessTable, Ticks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMetrics {
    pub turnaround: Ticks,
    pub waiting: Ticks,
    pub response: Ticks,
}

impl ProcessMetrics {
    /// `None` until the record has completed.
    pub fn from_record(record: &ProcessRecord) -> Option<Self> {
        if record.state != ProcessState::Completed {
            return None;
        }
        let completion = record.completion_time?;
        let first_run = record.first_run_time?;

        let turnaround = completion.saturating_sub(record.admission_time);
        Some(Self {
            turnaround,
            waiting: turnaround.saturating_sub(record.consumed_burst),
            response: first_run.saturating_sub(record.admission_time),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub completed: usize,
    pub mean_turnaround: f64,
    pub mean_waiting: f64,
    pub mean_response: f64,
}

/// Reads completed records out of the process table.
pub struct MetricsCollector<'a> {
    table: &'a ProcessTable,
}

impl<'a> MetricsCollector<'a> {
    pub fn new(table: &'a ProcessTable) -> Self {
        Self { table }
    }

    pub fn metrics_for(&self, pid: Pid) -> Result<ProcessMetrics, KernelError> {
        let record = self
            .table
            .record(pid)
            .ok_or(KernelError::UnknownProcess(pid))?;
        ProcessMetrics::from_record(record).ok_or(KernelError::MetricsUnavailable(pid))
    }

    pub fn completed(&self) -> impl Iterator<Item = (Pid, ProcessMetrics)> + 'a {
        self.table
            .records()
            .filter_map(|r| ProcessMetrics::from_record(r).map(|m| (r.pid, m)))
    }

    pub fn summary(&self) -> MetricsSummary {
        let all: Vec<ProcessMetrics> = self.completed().map(|(_, m)| m).collect();
        MetricsSummary {
            completed: all.len(),
            mean_turnaround: avg(all.iter().map(|m| m.turnaround as f64)),
            mean_waiting: avg(all.iter().map(|m| m.waiting as f64)),
            mean_response: avg(all.iter().map(|m| m.response as f64)),
        }
    }
}

fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    iter.collect::<Mean>().estimate()
}
