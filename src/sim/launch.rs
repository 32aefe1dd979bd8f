use rustc_hash::FxHashMap;
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

use crate::core::{AdmissionError, Pid, Ticks};

/// What to launch and how much simulated CPU it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub burst: Ticks,
}

impl LaunchSpec {
    pub fn new(argv: Vec<String>, burst: Ticks) -> Result<Self, AdmissionError> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|p| !p.is_empty())
            .ok_or(AdmissionError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
            burst,
        })
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Starts the job behind an admitted process and hands back its pid.
pub trait Launcher: Send {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, AdmissionError>;

    /// Stops a launched job. Unknown pids are ignored.
    fn terminate(&mut self, pid: Pid);
}

/// Spawns real host processes.
#[derive(Debug, Default)]
pub struct OsLauncher {
    children: FxHashMap<Pid, Child>,
}

impl OsLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    // Forget children that already exited
    fn reap(&mut self) {
        self.children
            .retain(|_, child| matches!(child.try_wait(), Ok(None)));
    }
}

impl Launcher for OsLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> Result<Pid, AdmissionError> {
        self.reap();
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| AdmissionError::Launch {
                program: spec.program.clone(),
                reason: e.to_string(),
            })?;
        let pid = child.id();
        debug!(pid, program = %spec.program, "Launched");
        self.children.insert(pid, child);
        Ok(pid)
    }

    fn terminate(&mut self, pid: Pid) {
        let Some(mut child) = self.children.remove(&pid) else {
            return;
        };
        if let Err(e) = child.kill() {
            debug!(pid, error = %e, "Kill failed, child likely exited");
        }
        if let Err(e) = child.wait() {
            warn!(pid, error = %e, "Could not reap child");
        }
    }
}

/// Hands out sequential pids without starting anything.
#[derive(Debug)]
pub struct SimulatedLauncher {
    next_pid: Pid,
    launched: Vec<Pid>,
    terminated: Vec<Pid>,
}

impl Default for SimulatedLauncher {
    fn default() -> Self {
        Self::starting_at(1000)
    }
}

impl SimulatedLauncher {
    pub fn starting_at(first_pid: Pid) -> Self {
        Self {
            next_pid: first_pid,
            launched: Vec::new(),
            terminated: Vec::new(),
        }
    }

    pub fn terminated(&self) -> &[Pid] {
        &self.terminated
    }
}

impl Launcher for SimulatedLauncher {
    fn launch(&mut self, _spec: &LaunchSpec) -> Result<Pid, AdmissionError> {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.launched.push(pid);
        Ok(pid)
    }

    fn terminate(&mut self, pid: Pid) {
        if self.launched.contains(&pid) && !self.terminated.contains(&pid) {
            self.terminated.push(pid);
        }
    }
}
