use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

use super::{
    config::SessionConfig,
    launch::{LaunchSpec, Launcher},
};
use crate::{
    core::{
        AdmissionError, Allocation, ConfigError, KernelError, NewProcess, Observer, PageId,
        PageStore, Pid, Priority, ProcessRecord, ProcessTable, RunReport, SchedCore, StopHandle,
        Ticks,
    },
    metrics::{MetricsCollector, MetricsSummary, ProcessMetrics},
    scheduler::{PriorityScheduler, RoundRobinScheduler},
    sync::{ProducerConsumer, SessionPlan, lock},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub capacity: usize,
    pub free: usize,
    // Owned pages, oldest allocation first
    pub owned: Vec<(PageId, Pid)>,
}

// Lock order: run lock, scheduler, table, pages. The launcher is never held
// together with the table.
pub struct Kernel<L: Launcher> {
    config: SessionConfig,
    table: Arc<Mutex<ProcessTable>>,
    pages: Arc<Mutex<PageStore>>,
    launcher: Mutex<L>,
    round_robin: Mutex<SchedCore<RoundRobinScheduler>>,
    priority: Mutex<SchedCore<PriorityScheduler>>,
    // Only one scheduling run at a time
    run_lock: Mutex<()>,
    stop: StopHandle,
}

impl<L: Launcher> Kernel<L> {
    pub fn new(config: SessionConfig, launcher: L) -> Result<Self, KernelError> {
        config.validate()?;
        let table = Arc::new(Mutex::new(ProcessTable::new()));
        let pages = Arc::new(Mutex::new(PageStore::with_memory(
            config.total_memory,
            config.page_size,
        )?));
        let stop = StopHandle::new();

        let mut round_robin =
            SchedCore::<RoundRobinScheduler>::new(table.clone(), pages.clone(), stop.clone())
                .with_tick_duration(config.tick_duration);
        round_robin
            .scheduler
            .set_quantum(i64::try_from(config.quantum).unwrap_or(i64::MAX));
        let priority =
            SchedCore::<PriorityScheduler>::new(table.clone(), pages.clone(), stop.clone())
                .with_tick_duration(config.tick_duration);

        Ok(Self {
            config,
            table,
            pages,
            launcher: Mutex::new(launcher),
            round_robin: Mutex::new(round_robin),
            priority: Mutex::new(priority),
            run_lock: Mutex::new(()),
            stop,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn page_capacity(&self) -> usize {
        lock(&self.pages).capacity()
    }

    pub fn admit_process(
        &self,
        spec: LaunchSpec,
        priority: i64,
        page_count: i64,
    ) -> Result<Pid, KernelError> {
        let priority = Priority::try_from(priority).map_err(|_| ConfigError::Priority(priority))?;
        let capacity = self.page_capacity();
        let page_count = usize::try_from(page_count)
            .ok()
            .filter(|count| *count <= capacity)
            .ok_or(ConfigError::PageCount {
                requested: page_count,
                capacity,
            })?;
        if spec.burst == 0 {
            return Err(ConfigError::Burst(0).into());
        }

        let pid = lock(&self.launcher).launch(&spec)?;
        match self.register(&spec, pid, priority, page_count) {
            Ok(()) => {
                info!(
                    pid,
                    priority,
                    pages = page_count,
                    burst = spec.burst,
                    command = %spec.command_line(),
                    "Process admitted"
                );
                Ok(pid)
            }
            Err(e) => {
                warn!(pid, error = %e, "Admission rejected");
                lock(&self.launcher).terminate(pid);
                Err(e)
            }
        }
    }

    fn register(
        &self,
        spec: &LaunchSpec,
        pid: Pid,
        priority: Priority,
        page_count: usize,
    ) -> Result<(), KernelError> {
        let mut table = lock(&self.table);
        if table.record(pid).is_some_and(ProcessRecord::is_live) {
            return Err(AdmissionError::DuplicatePid(pid).into());
        }

        let mut pages = lock(&self.pages);
        let Allocation { granted, .. } = pages.allocate(&mut table, pid, page_count)?;
        table.register(
            NewProcess {
                pid,
                command: spec.command_line(),
                priority,
                burst: spec.burst,
                pages_requested: page_count,
            },
            granted.into_iter().collect::<BTreeSet<_>>(),
        )?;
        for queue in table.queue_ids() {
            table.queue_push(queue, pid);
        }

        debug_assert!(
            Observer::violations(&table, &pages).is_empty(),
            "Admission of pid {pid} broke bookkeeping"
        );
        Ok(())
    }

    pub fn set_quantum(&self, quantum: i64) -> Ticks {
        lock(&self.round_robin).scheduler.set_quantum(quantum)
    }

    pub fn quantum(&self) -> Ticks {
        lock(&self.round_robin).scheduler.quantum()
    }

    pub fn run_round_robin(&self) -> Result<RunReport, KernelError> {
        let _running = lock(&self.run_lock);
        lock(&self.round_robin).run()
    }

    pub fn run_priority_scheduling(&self) -> Result<RunReport, KernelError> {
        let _running = lock(&self.run_lock);
        lock(&self.priority).run()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn start_producer_consumer(&self, items: usize) -> Result<ProducerConsumer, KernelError> {
        let plan = SessionPlan {
            item_delay: self.config.item_delay,
            ..SessionPlan::single(items, self.config.buffer_capacity)
        };
        Ok(ProducerConsumer::start(&plan)?)
    }

    pub fn list_processes(&self) -> Vec<ProcessRecord> {
        lock(&self.table).records().cloned().collect()
    }

    pub fn process(&self, pid: Pid) -> Option<ProcessRecord> {
        lock(&self.table).record(pid).cloned()
    }

    pub fn metrics_for(&self, pid: Pid) -> Result<ProcessMetrics, KernelError> {
        MetricsCollector::new(&lock(&self.table)).metrics_for(pid)
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        MetricsCollector::new(&lock(&self.table)).summary()
    }

    pub fn kill(&self, pid: Pid) -> Result<(), KernelError> {
        {
            let mut table = lock(&self.table);
            table.mark_killed(pid)?;
            let mut pages = lock(&self.pages);
            let released = pages.release(&mut table, pid);
            info!(pid, released, "Process killed");
        }
        lock(&self.launcher).terminate(pid);
        Ok(())
    }

    // Requests only the pages eviction took
    pub fn refill(&self, pid: Pid) -> Result<Allocation, KernelError> {
        let mut table = lock(&self.table);
        let record = table.live_record(pid)?;
        let missing = record
            .pages_requested
            .saturating_sub(record.pages_held.len());
        if missing == 0 {
            return Ok(Allocation {
                granted: Vec::new(),
                evicted: Vec::new(),
            });
        }

        let mut pages = lock(&self.pages);
        let allocation = pages.allocate(&mut table, pid, missing)?;
        info!(pid, granted = allocation.granted.len(), "Pages refilled");
        Ok(allocation)
    }

    pub fn memory_map(&self) -> MemoryMap {
        let pages = lock(&self.pages);
        MemoryMap {
            capacity: pages.capacity(),
            free: pages.free_count(),
            owned: pages.eviction_order().collect(),
        }
    }

    pub fn check_invariants(&self) -> Vec<String> {
        let table = lock(&self.table);
        let pages = lock(&self.pages);
        Observer::violations(&table, &pages)
    }
}
