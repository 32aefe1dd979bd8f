use anyhow::{Context, Result};
use std::io::Write;

use super::{
    command::{Command, CommandKind, SchedulePolicy},
    driver::Kernel,
    launch::{LaunchSpec, Launcher},
    workload::bernoulli_jobs,
};
use crate::core::{ConfigError, KernelError, Pid, RunReport, Ticks};

// Share of short bursts in `random` workloads
const P_SHORT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Runs parsed commands against a kernel and renders the results.
///
/// Kernel errors are reported on `out` and the session carries on; only
/// write failures surface as errors.
pub struct Shell<L: Launcher> {
    kernel: Kernel<L>,
}

impl<L: Launcher> Shell<L> {
    pub fn new(kernel: Kernel<L>) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &Kernel<L> {
        &self.kernel
    }

    pub fn execute(&self, command: Command, out: &mut impl Write) -> Result<Flow> {
        let result = match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => self.help(out),
            Command::Add {
                argv,
                priority,
                pages,
                burst,
            } => self.add(argv, priority, pages, burst, out),
            Command::SetQuantum(quantum) => self.set_quantum(quantum, out),
            Command::Schedule(policy) => self.schedule(policy, out),
            Command::StartProducerConsumer { items } => self.producer_consumer(items, out),
            Command::Ps => self.ps(out),
            Command::Metrics(pid) => self.metrics(pid, out),
            Command::Kill(pid) => self.kill(pid, out),
            Command::Refill(pid) => self.refill(pid, out),
            Command::Mem => self.mem(out),
            Command::Random { count, seed } => self.random(count, seed, out),
        };

        match result {
            Ok(()) => {}
            Err(e) => match e.downcast::<KernelError>() {
                Ok(kernel_error) => writeln!(out, "error: {kernel_error}")?,
                Err(e) => return Err(e),
            },
        }
        Ok(Flow::Continue)
    }

    fn help(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "Commands:")?;
        for kind in CommandKind::ALL {
            writeln!(out, "  {}", kind.usage())?;
        }
        Ok(())
    }

    fn add(
        &self,
        argv: Vec<String>,
        priority: i64,
        pages: Option<i64>,
        burst: Option<i64>,
        out: &mut impl Write,
    ) -> Result<()> {
        let config = self.kernel.config();
        let burst = match burst {
            Some(b) => Ticks::try_from(b).map_err(|_| KernelError::from(ConfigError::Burst(b)))?,
            None => config.default_burst,
        };
        let pages =
            pages.unwrap_or_else(|| i64::try_from(config.default_pages).unwrap_or(i64::MAX));

        let spec = LaunchSpec::new(argv, burst).map_err(KernelError::from)?;
        let command_line = spec.command_line();
        let pid = self.kernel.admit_process(spec, priority, pages)?;
        writeln!(
            out,
            "Scheduled process => PID: {pid}, Priority: {priority}, Pages: {pages}, Burst: {burst} ({command_line})"
        )?;
        Ok(())
    }

    fn set_quantum(&self, quantum: i64, out: &mut impl Write) -> Result<()> {
        let quantum = self.kernel.set_quantum(quantum);
        writeln!(out, "Time quantum set to {quantum} tick(s).")?;
        Ok(())
    }

    fn kill(&self, pid: Pid, out: &mut impl Write) -> Result<()> {
        self.kernel.kill(pid)?;
        writeln!(out, "Killed {pid}.")?;
        Ok(())
    }

    fn schedule(&self, policy: SchedulePolicy, out: &mut impl Write) -> Result<()> {
        let report = match policy {
            SchedulePolicy::RoundRobin => {
                writeln!(
                    out,
                    "=== Round-Robin Scheduling (quantum={}) ===",
                    self.kernel.quantum()
                )?;
                self.kernel.run_round_robin()?
            }
            SchedulePolicy::Priority => {
                writeln!(out, "=== Priority-Based Scheduling ===")?;
                self.kernel.run_priority_scheduling()?
            }
        };
        self.print_report(&report, out)
    }

    fn print_report(&self, report: &RunReport, out: &mut impl Write) -> Result<()> {
        for event in &report.events {
            writeln!(out, "[{}] {event}", report.scheduler)?;
        }
        for pid in report.completed() {
            if let Ok(m) = self.kernel.metrics_for(pid) {
                writeln!(
                    out,
                    "--- PID {pid}: turnaround {} waiting {} response {}",
                    m.turnaround, m.waiting, m.response
                )?;
            }
        }
        if report.cancelled {
            writeln!(out, "Scheduling cancelled after {} dispatch(es).", report.dispatches)?;
        }
        if let Some(starved) = &report.stalled {
            let stall = KernelError::SchedulingStalled {
                starved: starved.clone(),
            };
            writeln!(out, "error: {stall}")?;
        }
        Ok(())
    }

    fn producer_consumer(&self, items: Option<usize>, out: &mut impl Write) -> Result<()> {
        let items = items.unwrap_or(self.kernel.config().default_items);
        let session = self.kernel.start_producer_consumer(items)?;
        let report = session.join();
        for item in report.consumed.iter().flatten() {
            writeln!(out, "Consumer consumed {item}")?;
        }
        writeln!(
            out,
            "Produced {} / consumed {} item(s), buffer peak {}/{}.",
            report.produced,
            report.consumed_count(),
            report.high_water,
            report.capacity
        )?;
        Ok(())
    }

    fn ps(&self, out: &mut impl Write) -> Result<()> {
        writeln!(
            out,
            "{:>7} {:>4} {:<9} {:>5} {:>5} {:>5} {:<7} COMMAND",
            "PID", "PRI", "STATE", "LEFT", "USED", "PAGES", "MEMORY"
        )?;
        for record in self.kernel.list_processes() {
            writeln!(
                out,
                "{:>7} {:>4} {:<9} {:>5} {:>5} {:>5} {:<7} {}",
                record.pid,
                record.priority,
                format!("{:?}", record.state),
                record.remaining_burst,
                record.consumed_burst,
                format!("{}/{}", record.pages_held.len(), record.pages_requested),
                if record.memory_starved() {
                    "starved"
                } else {
                    "ok"
                },
                record.command
            )?;
        }
        Ok(())
    }

    fn metrics(&self, pid: Option<Pid>, out: &mut impl Write) -> Result<()> {
        match pid {
            Some(pid) => {
                let m = self.kernel.metrics_for(pid)?;
                writeln!(out, "PID {pid}")?;
                writeln!(out, "    Turnaround Time: {}", m.turnaround)?;
                writeln!(out, "    Waiting Time   : {}", m.waiting)?;
                writeln!(out, "    Response Time  : {}", m.response)?;
            }
            None => {
                let s = self.kernel.metrics_summary();
                writeln!(out, "Completed processes: {}", s.completed)?;
                writeln!(out, "Average turnaround time: {:.2} ticks", s.mean_turnaround)?;
                writeln!(out, "Average waiting time: {:.2} ticks", s.mean_waiting)?;
                writeln!(out, "Average response time: {:.2} ticks", s.mean_response)?;
            }
        }
        Ok(())
    }

    fn refill(&self, pid: Pid, out: &mut impl Write) -> Result<()> {
        let allocation = self.kernel.refill(pid)?;
        for eviction in &allocation.evicted {
            writeln!(
                out,
                "Page {} reclaimed from PID {}",
                eviction.page, eviction.victim
            )?;
        }
        writeln!(
            out,
            "PID {pid} granted {} page(s).",
            allocation.granted.len()
        )?;
        Ok(())
    }

    fn mem(&self, out: &mut impl Write) -> Result<()> {
        let map = self.kernel.memory_map();
        writeln!(
            out,
            "{} of {} page(s) free, {} KiB page size.",
            map.free,
            map.capacity,
            self.kernel.config().page_size / 1024
        )?;
        for (page, pid) in &map.owned {
            writeln!(out, "  page {page:>3} -> pid {pid}")?;
        }
        Ok(())
    }

    fn random(&self, count: usize, seed: u64, out: &mut impl Write) -> Result<()> {
        for job in bernoulli_jobs(count, P_SHORT, seed) {
            let spec = LaunchSpec::new(vec!["true".into(), job.name.clone()], job.burst)
                .map_err(KernelError::from)?;
            let pid = self
                .kernel
                .admit_process(spec, job.priority, job.pages)
                .with_context(|| format!("admitting {}", job.name));
            match pid {
                Ok(pid) => writeln!(
                    out,
                    "Scheduled {} => PID: {pid}, Priority: {}, Pages: {}, Burst: {}",
                    job.name, job.priority, job.pages, job.burst
                )?,
                Err(e) => writeln!(out, "error: {e:#}")?,
            }
        }
        Ok(())
    }
}
