use keyed_priority_queue::KeyedPriorityQueue;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use std::{
    cmp::Ordering,
    collections::{BTreeSet, VecDeque},
};

use super::error::{AdmissionError, KernelError};

// Assigned by the launch collaborator
pub type Pid = u32;
pub type PageId = usize;
pub type Ticks = u64;
pub type Priority = u32;

new_key_type! {
    pub struct QueueId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Admitted,
    Ready,
    Running,
    Completed,
    Killed,
}

/// Ordering key for the priority run queue. Higher priority first, then
/// earlier admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityKey {
    pub priority: Priority,
    pub seq: u64,
}

// KeyedPriorityQueue is a max-heap, so the admission sequence compares flipped
impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub command: String,
    pub priority: Priority,
    pub seq: u64,
    pub state: ProcessState,
    pub remaining_burst: Ticks,
    pub consumed_burst: Ticks,
    pub dispatches: u32,
    pub admission_time: Ticks,
    pub first_run_time: Option<Ticks>,
    pub completion_time: Option<Ticks>,
    pub pages_requested: usize,
    pub pages_held: BTreeSet<PageId>,
}

impl ProcessRecord {
    /// Holds fewer pages than it was admitted with, either because eviction
    /// took some or all of them.
    pub fn memory_starved(&self) -> bool {
        self.is_live() && self.pages_held.len() < self.pages_requested
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.state, ProcessState::Completed | ProcessState::Killed)
    }

    pub fn priority_key(&self) -> PriorityKey {
        PriorityKey {
            priority: self.priority,
            seq: self.seq,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProcess {
    pub pid: Pid,
    pub command: String,
    pub priority: Priority,
    pub burst: Ticks,
    pub pages_requested: usize,
}

#[derive(Debug)]
pub enum RunQueue {
    Fifo {
        pids: VecDeque<Pid>,
    },
    Priq {
        pids: KeyedPriorityQueue<Pid, PriorityKey>,
    },
}

impl RunQueue {
    pub fn new_fifo() -> Self {
        Self::Fifo {
            pids: VecDeque::new(),
        }
    }

    pub fn new_priq() -> Self {
        Self::Priq {
            pids: KeyedPriorityQueue::new(),
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        match self {
            Self::Fifo { pids } => pids.contains(&pid),
            Self::Priq { pids } => pids.get_priority(&pid).is_some(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo { pids } => pids.len(),
            Self::Priq { pids } => pids.len(),
        }
    }

    fn remove(&mut self, pid: Pid) -> bool {
        match self {
            Self::Fifo { pids } => {
                let before = pids.len();
                pids.retain(|p| *p != pid);
                pids.len() != before
            }
            Self::Priq { pids } => pids.remove(&pid).is_some(),
        }
    }
}

/// Canonical registry of process records plus the run queues over them.
/// Finished records stay registered so their metrics remain readable.
#[derive(Debug)]
pub struct ProcessTable {
    pub now: Ticks,
    records: FxHashMap<Pid, ProcessRecord>,
    // Admission order, for listing
    order: Vec<Pid>,
    queues: SlotMap<QueueId, RunQueue>,

    // Increment upon admission
    next_seq: u64,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            now: 0,
            records: FxHashMap::default(),
            order: Vec::new(),
            queues: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    pub fn advance_time(&mut self, delta: Ticks) {
        self.now = self.now.saturating_add(delta);
    }

    // A pid may only be reused once its previous record has finished
    pub fn register(
        &mut self,
        process: NewProcess,
        pages_held: BTreeSet<PageId>,
    ) -> Result<&ProcessRecord, KernelError> {
        if let Some(existing) = self.records.get(&process.pid) {
            if existing.is_live() {
                return Err(AdmissionError::DuplicatePid(process.pid).into());
            }
            self.order.retain(|p| *p != process.pid);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let record = ProcessRecord {
            pid: process.pid,
            command: process.command,
            priority: process.priority,
            seq,
            state: ProcessState::Admitted,
            remaining_burst: process.burst,
            consumed_burst: 0,
            dispatches: 0,
            admission_time: self.now,
            first_run_time: None,
            completion_time: None,
            pages_requested: process.pages_requested,
            pages_held,
        };

        self.order.push(process.pid);
        self.records.insert(process.pid, record);
        Ok(&self.records[&process.pid])
    }

    pub fn record(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    pub fn record_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.records.get_mut(&pid)
    }

    pub fn live_record(&self, pid: Pid) -> Result<&ProcessRecord, KernelError> {
        self.records
            .get(&pid)
            .filter(|r| r.is_live())
            .ok_or(KernelError::UnknownProcess(pid))
    }

    pub fn records(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.order.iter().filter_map(|pid| self.records.get(pid))
    }

    pub fn create_queue_fifo(&mut self) -> QueueId {
        self.queues.insert(RunQueue::new_fifo())
    }

    pub fn create_queue_priq(&mut self) -> QueueId {
        self.queues.insert(RunQueue::new_priq())
    }

    pub fn queue_ids(&self) -> Vec<QueueId> {
        self.queues.keys().collect()
    }

    pub fn queue(&self, queue_id: QueueId) -> Option<&RunQueue> {
        self.queues.get(queue_id)
    }

    pub fn queue_len(&self, queue_id: QueueId) -> usize {
        self.queues.get(queue_id).map_or(0, RunQueue::len)
    }

    pub fn queue_push(&mut self, queue_id: QueueId, pid: Pid) {
        let Some(record) = self.records.get_mut(&pid) else {
            debug_assert!(false, "Enqueueing unknown pid {pid}");
            return;
        };
        debug_assert!(
            record.is_live(),
            "Pid {pid} must not be Completed or Killed when enqueued"
        );
        if record.state == ProcessState::Admitted {
            record.state = ProcessState::Ready;
        }
        let key = record.priority_key();

        let queue = self.queues.get_mut(queue_id).expect("Unknown run queue");
        assert!(
            !queue.contains(pid),
            "Pid {pid} already present in run queue {queue_id:?}"
        );
        match queue {
            RunQueue::Fifo { pids } => pids.push_back(pid),
            RunQueue::Priq { pids } => {
                pids.push(pid, key);
            }
        }
    }

    pub fn queue_pop(&mut self, queue_id: QueueId) -> Option<Pid> {
        match self.queues.get_mut(queue_id)? {
            RunQueue::Fifo { pids } => pids.pop_front(),
            RunQueue::Priq { pids } => pids.pop().map(|(pid, _)| pid),
        }
    }

    pub fn queued_anywhere(&self, pid: Pid) -> bool {
        self.queues.values().any(|q| q.contains(pid))
    }

    fn remove_from_queues(&mut self, pid: Pid) {
        for queue in self.queues.values_mut() {
            queue.remove(pid);
        }
    }

    // First dispatch fixes the response timestamp
    pub fn mark_running(&mut self, pid: Pid) -> &ProcessRecord {
        let now = self.now;
        let record = self
            .records
            .get_mut(&pid)
            .expect("Dispatched pid missing from process table");
        debug_assert!(
            record.is_live(),
            "Finished pid {pid} must not be dispatched"
        );
        record.state = ProcessState::Running;
        record.dispatches += 1;
        record.first_run_time.get_or_insert(now);
        record
    }

    // Returns the burst still left
    pub fn charge(&mut self, pid: Pid, run: Ticks) -> Ticks {
        let record = self
            .records
            .get_mut(&pid)
            .expect("Charged pid missing from process table");
        debug_assert!(
            run <= record.remaining_burst,
            "Charging {run} ticks to pid {pid} with {} remaining",
            record.remaining_burst
        );
        let run = run.min(record.remaining_burst);
        record.remaining_burst -= run;
        record.consumed_burst += run;
        record.remaining_burst
    }

    pub fn mark_ready(&mut self, pid: Pid) {
        if let Some(record) = self.records.get_mut(&pid) {
            debug_assert!(
                record.is_live(),
                "Finished pid {pid} cannot become ready"
            );
            record.state = ProcessState::Ready;
        }
    }

    pub fn mark_completed(&mut self, pid: Pid, completion_time: Ticks) {
        self.remove_from_queues(pid);

        let record = self
            .records
            .get_mut(&pid)
            .expect("Completed pid missing from process table");
        debug_assert!(
            record.state == ProcessState::Running,
            "Pid {pid} must have been running before marked complete"
        );
        debug_assert_eq!(
            record.remaining_burst, 0,
            "Pid {pid} completed with burst remaining"
        );

        record.state = ProcessState::Completed;
        record.completion_time.get_or_insert(completion_time);
    }

    pub fn mark_killed(&mut self, pid: Pid) -> Result<(), KernelError> {
        self.live_record(pid)?;
        self.remove_from_queues(pid);
        if let Some(record) = self.records.get_mut(&pid) {
            record.state = ProcessState::Killed;
        }
        Ok(())
    }
}
