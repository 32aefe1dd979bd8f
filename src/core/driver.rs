use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};
use tracing::{debug, info, warn};

use super::{
    error::KernelError,
    event::SchedEvent,
    memory::PageStore,
    observer::Observer,
    state::{Pid, ProcessState, ProcessTable},
};
use crate::{scheduler::Scheduler, sync::lock};

/// Cancellation request for a running scheduler loop, honored at the next
/// dispatch boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    // Consume a pending request
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub scheduler: &'static str,
    pub events: Vec<SchedEvent>,
    pub dispatches: usize,
    pub cancelled: bool,
    // Set when the run ended because every queued record was starved
    pub stalled: Option<Vec<Pid>>,
}

impl RunReport {
    fn new(scheduler: &'static str) -> Self {
        Self {
            scheduler,
            events: Vec::new(),
            dispatches: 0,
            cancelled: false,
            stalled: None,
        }
    }

    pub fn completed(&self) -> impl Iterator<Item = Pid> + '_ {
        self.events.iter().filter_map(|e| match e {
            SchedEvent::Completed { pid, .. } => Some(*pid),
            _ => None,
        })
    }
}

/// Drives one scheduling discipline over a shared process table and page
/// store. Lock order is table before pages.
pub struct SchedCore<S: Scheduler> {
    table: Arc<Mutex<ProcessTable>>,
    pages: Arc<Mutex<PageStore>>,
    pub scheduler: S,
    observer: Observer,
    stop: StopHandle,
    // Real time spent per simulated tick
    tick_duration: Duration,
}

impl<S: Scheduler> SchedCore<S> {
    pub fn new(
        table: Arc<Mutex<ProcessTable>>,
        pages: Arc<Mutex<PageStore>>,
        stop: StopHandle,
    ) -> Self {
        let scheduler = S::init(&mut lock(&table));
        Self {
            table,
            pages,
            scheduler,
            observer: Observer::new(),
            stop,
            tick_duration: Duration::ZERO,
        }
    }

    pub fn with_tick_duration(mut self, tick_duration: Duration) -> Self {
        self.tick_duration = tick_duration;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Dispatches until the run queue drains, a stop is requested or every
    /// queued record is starved. A stall ends the run with `stalled` set.
    pub fn run(&mut self) -> Result<RunReport, KernelError> {
        let mut report = RunReport::new(self.scheduler.name());
        info!(scheduler = report.scheduler, "Scheduling started");

        loop {
            if self.stop.take() {
                report.cancelled = true;
                warn!(scheduler = report.scheduler, "Scheduling cancelled");
                break;
            }
            match self.step() {
                Ok(Some(events)) => {
                    report.dispatches += 1;
                    report.events.extend(events);
                }
                Ok(None) => break,
                Err(KernelError::SchedulingStalled { starved }) => {
                    report.stalled = Some(starved);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            scheduler = report.scheduler,
            dispatches = report.dispatches,
            "Scheduling finished"
        );
        Ok(report)
    }

    pub fn step(&mut self) -> Result<Option<Vec<SchedEvent>>, KernelError> {
        let mut events = Vec::new();

        let (pid, slice) = {
            let mut table = lock(&self.table);
            let Some(pid) = Self::select_runnable(&mut self.scheduler, &mut table, &mut events)?
            else {
                return Ok(None);
            };
            let at = table.now;
            let slice = self.scheduler.slice(table.mark_running(pid));
            debug!(pid, slice, at, "Dispatching");
            events.push(SchedEvent::Dispatched { pid, slice, at });
            (pid, slice)
        };

        if !self.tick_duration.is_zero() {
            let ticks = u32::try_from(slice).unwrap_or(u32::MAX);
            thread::sleep(self.tick_duration.saturating_mul(ticks));
        }

        let mut table = lock(&self.table);
        table.advance_time(slice);

        // Killed while its burst was in flight
        let still_running = table
            .record(pid)
            .is_some_and(|r| r.state == ProcessState::Running);
        if still_running {
            let remaining = table.charge(pid, slice);
            if remaining == 0 {
                let now = table.now;
                table.mark_completed(pid, now);
                lock(&self.pages).release(&mut table, pid);
                info!(pid, at = now, "Process completed");
                events.push(SchedEvent::Completed { pid, at: now });
            } else {
                table.mark_ready(pid);
                self.scheduler.enqueue(&mut table, pid);
                events.push(SchedEvent::Requeued { pid, remaining });
            }
        }

        let pages = lock(&self.pages);
        self.observer.observe(&table, &pages);
        Ok(Some(events))
    }

    // Pop until a record holding all its pages turns up. Starved records go
    // back into the queue; a full pass of them stalls the run.
    fn select_runnable(
        scheduler: &mut S,
        table: &mut ProcessTable,
        events: &mut Vec<SchedEvent>,
    ) -> Result<Option<Pid>, KernelError> {
        let queue = scheduler.queue();
        let pass = table.queue_len(queue);
        let mut starved = Vec::new();
        let mut selected = None;

        for _ in 0..pass {
            let Some(pid) = table.queue_pop(queue) else {
                break;
            };
            if table.record(pid).is_some_and(|r| r.memory_starved()) {
                debug!(pid, "Skipping memory-starved process");
                events.push(SchedEvent::SkippedStarved { pid });
                starved.push(pid);
                continue;
            }
            selected = Some(pid);
            break;
        }

        for &pid in &starved {
            scheduler.enqueue(table, pid);
        }

        match selected {
            Some(pid) => Ok(Some(pid)),
            None if starved.is_empty() => Ok(None),
            None => {
                warn!(starved = ?starved, "Every queued process is memory-starved");
                Err(KernelError::SchedulingStalled { starved })
            }
        }
    }
}
