use procsim::core::{
    ConfigError, Eviction, KernelError, NewProcess, Observer, PageId, PageStore, Pid,
    ProcessTable,
};
use rand::prelude::*;
use std::collections::BTreeSet;

fn register(table: &mut ProcessTable, pid: Pid, pages_requested: usize) {
    table
        .register(
            NewProcess {
                pid,
                command: format!("job{pid}"),
                priority: 1,
                burst: 5,
                pages_requested,
            },
            BTreeSet::new(),
        )
        .unwrap();
}

fn held(table: &ProcessTable, pid: Pid) -> Vec<PageId> {
    table.record(pid).unwrap().pages_held.iter().copied().collect()
}

#[test]
fn eviction_takes_the_oldest_pages_first() {
    let mut table = ProcessTable::new();
    let mut pages = PageStore::new(3);
    register(&mut table, 1, 3);
    register(&mut table, 2, 2);

    pages.allocate(&mut table, 1, 3).unwrap();
    assert_eq!(pages.free_count(), 0);

    let allocation = pages.allocate(&mut table, 2, 2).unwrap();
    assert_eq!(
        allocation.evicted,
        vec![
            Eviction { page: 0, victim: 1 },
            Eviction { page: 1, victim: 1 },
        ]
    );
    assert_eq!(held(&table, 1), vec![2]);
    assert_eq!(held(&table, 2), vec![0, 1]);
    assert!(table.record(1).unwrap().memory_starved());
    assert!(!table.record(2).unwrap().memory_starved());
    assert!(Observer::violations(&table, &pages).is_empty());
}

#[test]
fn eviction_order_spans_owners() {
    let mut table = ProcessTable::new();
    let mut pages = PageStore::new(4);
    for pid in 1..=3 {
        register(&mut table, pid, 2);
    }

    pages.allocate(&mut table, 1, 2).unwrap();
    pages.allocate(&mut table, 2, 2).unwrap();
    let allocation = pages.allocate(&mut table, 3, 3).unwrap();

    let victims: Vec<Pid> = allocation.evicted.iter().map(|e| e.victim).collect();
    assert_eq!(victims, vec![1, 1, 2]);
    assert!(held(&table, 1).is_empty());
    assert_eq!(held(&table, 2).len(), 1);
    assert_eq!(held(&table, 3).len(), 3);
}

#[test]
fn requester_never_evicts_itself() {
    let mut table = ProcessTable::new();
    let mut pages = PageStore::new(4);
    register(&mut table, 1, 3);
    register(&mut table, 2, 1);
    pages.allocate(&mut table, 1, 3).unwrap();
    pages.allocate(&mut table, 2, 1).unwrap();

    let err = pages.allocate(&mut table, 1, 2).unwrap_err();
    assert_eq!(
        err,
        KernelError::InsufficientMemory {
            requested: 2,
            available: 1,
        }
    );
    // Failed requests leave every page where it was
    assert_eq!(held(&table, 1), vec![0, 1, 2]);
    assert_eq!(held(&table, 2), vec![3]);
    assert_eq!(pages.free_count(), 0);
}

#[test]
fn oversized_requests_are_configuration_errors() {
    let mut table = ProcessTable::new();
    let mut pages = PageStore::new(2);
    register(&mut table, 1, 3);
    assert_eq!(
        pages.allocate(&mut table, 1, 3).unwrap_err(),
        KernelError::InvalidConfiguration(ConfigError::PageCount {
            requested: 3,
            capacity: 2,
        })
    );
    assert_eq!(pages.free_count(), 2);
}

#[test]
fn release_returns_pages_once() {
    let mut table = ProcessTable::new();
    let mut pages = PageStore::new(4);
    register(&mut table, 1, 3);
    pages.allocate(&mut table, 1, 3).unwrap();

    assert_eq!(pages.release(&mut table, 1), 3);
    assert_eq!(pages.release(&mut table, 1), 0);
    assert_eq!(pages.free_count(), 4);
    assert!(held(&table, 1).is_empty());
    assert_eq!(pages.eviction_order().count(), 0);
}

#[test]
fn random_allocate_release_keeps_bookkeeping_consistent() {
    const CAPACITY: usize = 8;
    const PIDS: Pid = 6;

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut table = ProcessTable::new();
        let mut pages = PageStore::new(CAPACITY);
        for pid in 1..=PIDS {
            register(&mut table, pid, 2);
        }

        for _ in 0..200 {
            let pid = rng.random_range(1..=PIDS);
            if rng.random_bool(0.7) {
                let count = rng.random_range(0..=CAPACITY);
                let before: Vec<_> = pages.eviction_order().collect();
                if pages.allocate(&mut table, pid, count).is_err() {
                    assert_eq!(pages.eviction_order().collect::<Vec<_>>(), before);
                }
            } else {
                pages.release(&mut table, pid);
            }

            let held: usize = table.records().map(|r| r.pages_held.len()).sum();
            assert_eq!(pages.free_count() + held, CAPACITY, "seed {seed}");
            let violations = Observer::violations(&table, &pages);
            assert!(violations.is_empty(), "seed {seed}: {violations:?}");
        }
    }
}
