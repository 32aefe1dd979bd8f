use procsim::{
    SchedEvent,
    core::{NewProcess, Observer, PageStore, Pid, ProcessTable, SchedCore, StopHandle},
    scheduler::{PriorityScheduler, RoundRobinScheduler, Scheduler},
    sim::{Kernel, LaunchSpec, SessionConfig, SimulatedLauncher},
};
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

fn kernel_with_pages(capacity: usize) -> Kernel<SimulatedLauncher> {
    let config = SessionConfig {
        total_memory: capacity * 4096,
        page_size: 4096,
        ..SessionConfig::default()
    };
    Kernel::new(config, SimulatedLauncher::starting_at(1)).unwrap()
}

fn spec(burst: u64) -> LaunchSpec {
    LaunchSpec::new(vec!["job".into()], burst).unwrap()
}

fn dispatched(events: &[SchedEvent]) -> Vec<Pid> {
    events
        .iter()
        .filter_map(|e| match e {
            SchedEvent::Dispatched { pid, .. } => Some(*pid),
            _ => None,
        })
        .collect()
}

#[test]
fn round_robin_dispatch_count_is_ceil_burst_over_quantum() {
    for burst in 1..=10u64 {
        for quantum in 1..=4u64 {
            let kernel = kernel_with_pages(4);
            kernel.set_quantum(quantum as i64);
            let pid = kernel.admit_process(spec(burst), 1, 1).unwrap();

            let report = kernel.run_round_robin().unwrap();
            assert_eq!(
                dispatched(&report.events).len() as u64,
                burst.div_ceil(quantum),
                "burst {burst} quantum {quantum}"
            );

            let record = kernel.process(pid).unwrap();
            assert_eq!(record.consumed_burst, burst);
            assert_eq!(record.remaining_burst, 0);
            assert_eq!(record.dispatches as u64, burst.div_ceil(quantum));
        }
    }
}

#[test]
fn round_robin_interleaves_in_fifo_order() {
    let kernel = kernel_with_pages(8);
    let a = kernel.admit_process(spec(5), 1, 1).unwrap();
    let b = kernel.admit_process(spec(2), 9, 1).unwrap();
    let c = kernel.admit_process(spec(3), 4, 1).unwrap();

    let report = kernel.run_round_robin().unwrap();
    assert_eq!(dispatched(&report.events), vec![a, b, c, a, c, a]);
    assert_eq!(report.completed().collect::<Vec<_>>(), vec![b, c, a]);
}

#[test]
fn priority_runs_highest_first_with_admission_tiebreak() {
    let kernel = kernel_with_pages(8);
    let low = kernel.admit_process(spec(3), 1, 1).unwrap();
    let tie_first = kernel.admit_process(spec(2), 5, 1).unwrap();
    let high = kernel.admit_process(spec(4), 8, 1).unwrap();
    let tie_second = kernel.admit_process(spec(1), 5, 1).unwrap();
    let tie_third = kernel.admit_process(spec(1), 5, 1).unwrap();

    let report = kernel.run_priority_scheduling().unwrap();
    assert_eq!(
        dispatched(&report.events),
        vec![high, tie_first, tie_second, tie_third, low]
    );
    // Each record runs its whole burst in one dispatch
    assert_eq!(report.dispatches, 5);
    for pid in [low, tie_first, high, tie_second, tie_third] {
        assert_eq!(kernel.process(pid).unwrap().dispatches, 1);
    }
}

#[test]
fn priority_step_always_picks_a_maximal_ready_record() {
    let table = Arc::new(Mutex::new(ProcessTable::new()));
    let pages = Arc::new(Mutex::new(PageStore::new(16)));
    let mut core =
        SchedCore::<PriorityScheduler>::new(table.clone(), pages.clone(), StopHandle::new());

    let priorities = [3u32, 7, 1, 7, 0, 3, 9, 7];
    {
        let mut table = table.lock().unwrap();
        for (i, &priority) in priorities.iter().enumerate() {
            let pid = 100 + i as Pid;
            table
                .register(
                    NewProcess {
                        pid,
                        command: format!("job{i}"),
                        priority,
                        burst: 2,
                        pages_requested: 0,
                    },
                    BTreeSet::new(),
                )
                .unwrap();
            table.queue_push(core.scheduler.queue(), pid);
        }
    }

    let mut last_seq = None;
    let mut last_priority = u32::MAX;
    while let Some(events) = core.step().unwrap() {
        let pid = dispatched(&events)[0];
        let table = table.lock().unwrap();
        let record = table.record(pid).unwrap();
        let others_max = table
            .records()
            .filter(|r| r.is_live())
            .map(|r| r.priority)
            .max()
            .unwrap_or(0);
        assert!(record.priority >= others_max);
        assert!(record.priority <= last_priority);
        if record.priority == last_priority {
            assert!(Some(record.seq) > last_seq, "tie broken out of admission order");
        }
        last_priority = record.priority;
        last_seq = Some(record.seq);
    }
    assert_eq!(core.observer().steps(), priorities.len() as u64);
}

#[test]
fn fully_starved_queue_stalls_instead_of_spinning() {
    let kernel = kernel_with_pages(2);
    let a = kernel.admit_process(spec(2), 1, 2).unwrap();
    let b = kernel.admit_process(spec(2), 1, 2).unwrap();
    let c = kernel.admit_process(spec(2), 1, 2).unwrap();
    kernel.kill(c).unwrap();
    assert!(kernel.process(a).unwrap().memory_starved());
    assert!(kernel.process(b).unwrap().memory_starved());

    let report = kernel.run_round_robin().unwrap();
    assert_eq!(report.stalled, Some(vec![a, b]));
    assert_eq!(report.dispatches, 0);
    let report = kernel.run_priority_scheduling().unwrap();
    assert!(report.stalled.is_some());

    // Starved records keep their place and run once their pages return
    kernel.refill(a).unwrap();
    let report = kernel.run_round_robin().unwrap();
    assert_eq!(report.completed().collect::<Vec<_>>(), vec![a]);
    assert_eq!(report.stalled, Some(vec![b]));
    assert!(kernel.metrics_for(a).is_ok());

    kernel.refill(b).unwrap();
    let report = kernel.run_round_robin().unwrap();
    assert_eq!(report.completed().collect::<Vec<_>>(), vec![b]);
    assert_eq!(report.stalled, None);
    assert!(kernel.check_invariants().is_empty());
}

#[test]
fn stalled_run_keeps_the_work_done_before_it() {
    let kernel = kernel_with_pages(3);
    let a = kernel.admit_process(spec(2), 1, 3).unwrap();
    let b = kernel.admit_process(spec(2), 1, 2).unwrap();
    assert!(kernel.process(a).unwrap().memory_starved());

    let report = kernel.run_round_robin().unwrap();
    assert_eq!(report.stalled, Some(vec![a]));
    assert_eq!(dispatched(&report.events), vec![b]);
    assert_eq!(report.completed().collect::<Vec<_>>(), vec![b]);
    assert!(report.events.contains(&SchedEvent::SkippedStarved { pid: a }));

    assert_eq!(kernel.process(b).unwrap().remaining_burst, 0);
    assert_eq!(kernel.process(a).unwrap().consumed_burst, 0);
    assert!(kernel.metrics_for(b).is_ok());
}

#[test]
fn starved_head_of_priority_queue_yields_then_runs_first_when_refilled() {
    let table = Arc::new(Mutex::new(ProcessTable::new()));
    let pages = Arc::new(Mutex::new(PageStore::new(5)));
    let mut core =
        SchedCore::<PriorityScheduler>::new(table.clone(), pages.clone(), StopHandle::new());
    let queue = core.scheduler.queue();

    let (top, mid, low, late) = (1, 2, 3, 4);
    {
        let mut table = table.lock().unwrap();
        let mut pages = pages.lock().unwrap();
        let plan = [(top, 9, 2), (mid, 5, 1), (low, 1, 1), (late, 5, 2)];
        for (pid, priority, pages_requested) in plan {
            table
                .register(
                    NewProcess {
                        pid,
                        command: format!("job{pid}"),
                        priority,
                        burst: 2,
                        pages_requested,
                    },
                    BTreeSet::new(),
                )
                .unwrap();
            pages.allocate(&mut table, pid, pages_requested).unwrap();
            table.queue_push(queue, pid);
        }
        // The last allocation reclaimed the oldest page, one of top's
        assert!(table.record(top).unwrap().memory_starved());
    }

    let events = core.step().unwrap().unwrap();
    assert_eq!(events[0], SchedEvent::SkippedStarved { pid: top });
    assert_eq!(dispatched(&events), vec![mid]);
    {
        let table = table.lock().unwrap();
        assert!(table.queue(queue).unwrap().contains(top));
        assert_eq!(table.record(top).unwrap().dispatches, 0);
    }

    {
        let mut table = table.lock().unwrap();
        let allocation = pages.lock().unwrap().allocate(&mut table, top, 1).unwrap();
        assert!(allocation.evicted.is_empty());
        assert!(!table.record(top).unwrap().memory_starved());
    }

    let mut order = Vec::new();
    while let Some(events) = core.step().unwrap() {
        order.extend(dispatched(&events));
    }
    assert_eq!(order, vec![top, late, low]);
}

#[test]
fn metrics_match_timestamps() {
    let kernel = kernel_with_pages(4);
    let a = kernel.admit_process(spec(4), 1, 1).unwrap();
    let b = kernel.admit_process(spec(2), 1, 1).unwrap();
    kernel.run_round_robin().unwrap();

    // a: t0=0 t1=0 t2=6, b: t0=0 t1=2 t2=4
    let ma = kernel.metrics_for(a).unwrap();
    assert_eq!((ma.turnaround, ma.waiting, ma.response), (6, 2, 0));
    let mb = kernel.metrics_for(b).unwrap();
    assert_eq!((mb.turnaround, mb.waiting, mb.response), (4, 2, 2));

    let summary = kernel.metrics_summary();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.mean_turnaround, 5.0);
    assert_eq!(summary.mean_response, 1.0);
}

#[test]
fn later_admission_measures_from_its_own_arrival() {
    let kernel = kernel_with_pages(4);
    let a = kernel.admit_process(spec(3), 1, 1).unwrap();
    kernel.run_priority_scheduling().unwrap();
    let b = kernel.admit_process(spec(2), 1, 1).unwrap();
    kernel.run_priority_scheduling().unwrap();

    assert_eq!(kernel.process(b).unwrap().admission_time, 3);
    let mb = kernel.metrics_for(b).unwrap();
    assert_eq!((mb.turnaround, mb.waiting, mb.response), (2, 0, 0));
    assert_eq!(kernel.metrics_for(a).unwrap().turnaround, 3);
}

#[test]
fn stop_from_another_thread_cancels_at_a_boundary() {
    let config = SessionConfig {
        tick_duration: Duration::from_millis(5),
        ..SessionConfig::default()
    };
    let kernel = Kernel::new(config, SimulatedLauncher::default()).unwrap();
    for _ in 0..10 {
        kernel.admit_process(spec(6), 1, 1).unwrap();
    }
    let stop = kernel.stop_handle();

    let report = thread::scope(|s| {
        let run = s.spawn(|| kernel.run_round_robin());
        thread::sleep(Duration::from_millis(20));
        stop.request_stop();
        run.join().unwrap()
    })
    .unwrap();

    assert!(report.cancelled);
    assert!(report.dispatches < 30);
    let unfinished = kernel
        .list_processes()
        .iter()
        .filter(|r| r.remaining_burst > 0)
        .count();
    assert!(unfinished > 0);
    assert!(kernel.check_invariants().is_empty());

    // Resuming picks up where the cancelled run left off
    let report = kernel.run_round_robin().unwrap();
    assert!(!report.cancelled);
    assert!(kernel.list_processes().iter().all(|r| r.remaining_burst == 0));
}

#[test]
fn schedulers_share_one_table_but_own_their_queues() {
    let table = Arc::new(Mutex::new(ProcessTable::new()));
    let pages = Arc::new(Mutex::new(PageStore::new(4)));
    let stop = StopHandle::new();
    let mut rr =
        SchedCore::<RoundRobinScheduler>::new(table.clone(), pages.clone(), stop.clone());
    let prio = SchedCore::<PriorityScheduler>::new(table.clone(), pages.clone(), stop);
    rr.scheduler.set_quantum(1);

    {
        let mut table = table.lock().unwrap();
        table
            .register(
                NewProcess {
                    pid: 1,
                    command: "job".into(),
                    priority: 1,
                    burst: 3,
                    pages_requested: 0,
                },
                BTreeSet::new(),
            )
            .unwrap();
        table.queue_push(rr.scheduler.queue(), 1);
        table.queue_push(prio.scheduler.queue(), 1);
    }

    rr.step().unwrap();
    {
        let table = table.lock().unwrap();
        assert_eq!(table.queue_len(rr.scheduler.queue()), 1);
        assert_eq!(table.queue_len(prio.scheduler.queue()), 1);
        assert_eq!(table.record(1).unwrap().remaining_burst, 2);
    }

    rr.run().unwrap();
    let table = table.lock().unwrap();
    assert_eq!(table.queue_len(prio.scheduler.queue()), 0);
    assert!(Observer::violations(&table, &pages.lock().unwrap()).is_empty());
}
