use rustc_hash::FxHashSet;

use super::{
    memory::PageStore,
    state::{ProcessState, ProcessTable},
};

/// Cross-checks the process table against the page store after each dispatch.
#[derive(Debug, Default)]
pub struct Observer {
    step: u64,
}

impl Observer {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, table: &ProcessTable, pages: &PageStore) {
        self.step += 1;

        let violations = Self::violations(table, pages);
        debug_assert!(
            violations.is_empty(),
            "Invariant violations after step {}: {violations:#?}",
            self.step
        );
    }

    /// Every broken bookkeeping invariant, described.
    pub fn violations(table: &ProcessTable, pages: &PageStore) -> Vec<String> {
        let mut violations = Vec::new();

        let held: usize = table.records().map(|r| r.pages_held.len()).sum();
        if pages.free_count() + held != pages.capacity() {
            violations.push(format!(
                "free {} + held {held} != capacity {}",
                pages.free_count(),
                pages.capacity()
            ));
        }
        if pages.free_count() + pages.owned_count() != pages.capacity() {
            violations.push(format!(
                "free {} + owned {} != capacity {}",
                pages.free_count(),
                pages.owned_count(),
                pages.capacity()
            ));
        }

        let mut seen = FxHashSet::default();
        for record in table.records() {
            for &page in &record.pages_held {
                if !seen.insert(page) {
                    violations.push(format!("page {page} held by more than one process"));
                }
                if pages.owner_of(page) != Some(record.pid) {
                    violations.push(format!(
                        "pid {} holds page {page} owned by {:?}",
                        record.pid,
                        pages.owner_of(page)
                    ));
                }
                if pages.is_free(page) {
                    violations.push(format!("page {page} is both free and owned"));
                }
            }

            let finished = matches!(
                record.state,
                ProcessState::Completed | ProcessState::Killed
            );
            if finished && table.queued_anywhere(record.pid) {
                violations.push(format!(
                    "finished pid {} still present in a run queue",
                    record.pid
                ));
            }
            if record.state == ProcessState::Completed && record.remaining_burst != 0 {
                violations.push(format!(
                    "completed pid {} has {} ticks of burst left",
                    record.pid, record.remaining_burst
                ));
            }
            if record.consumed_burst > 0 && record.first_run_time.is_none() {
                violations.push(format!("pid {} ran without a first-run time", record.pid));
            }
        }

        for (page, owner) in pages.eviction_order() {
            let held = table
                .record(owner)
                .is_some_and(|r| r.pages_held.contains(&page));
            if !held {
                violations.push(format!(
                    "page {page} owned by {owner} but missing from its pages_held"
                ));
            }
        }

        violations
    }
}
