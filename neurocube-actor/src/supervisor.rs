//! Fleet supervisor
//!
//! Launches one worker process per actor index and waits for all of them.
//! Workers that fail are relaunched with the same index until their restart
//! budget runs out.

use crate::config::FleetConfig;
use crate::error::{ActorError, ActorResult, ConfigError};
use neurocube_ml::DeviceSlot;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Poll interval for child status.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What one worker will run as.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPlan {
    /// Actor index
    pub index: usize,
    /// Role position in the fleet file
    pub role: usize,
    /// Device assignment
    pub device: DeviceSlot,
}

/// Assign role and device to every actor index.
pub fn plan(fleet: &FleetConfig) -> Result<Vec<WorkerPlan>, ConfigError> {
    (0..fleet.total_actors())
        .map(|index| {
            Ok(WorkerPlan {
                index,
                role: fleet.role_for_index(index)?,
                device: fleet.device_slot(index),
            })
        })
        .collect()
}

/// How to start a worker: `program args.. --worker-index <index>`.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    /// Executable
    pub program: PathBuf,
    /// Arguments placed before `--worker-index`
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    /// Re-execute the running binary.
    pub fn current_exe(args: Vec<OsString>) -> ActorResult<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args,
        })
    }

    fn spawn(&self, index: usize) -> ActorResult<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg("--worker-index")
            .arg(index.to_string())
            .spawn()
            .map_err(|source| ActorError::Spawn { index, source })
    }
}

/// How the fleet ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSummary {
    /// Workers that exited successfully
    pub succeeded: Vec<usize>,
    /// Workers that failed after exhausting their restarts
    pub failed: Vec<usize>,
    /// Process launches including restarts
    pub launches: usize,
}

struct Worker {
    index: usize,
    child: Child,
    restarts: u32,
}

// A worker dropped while still running belongs to a supervisor that is
// bailing out; take the process down with it.
impl Drop for Worker {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!(index = self.index, "cannot stop worker: {e}");
        }
        if let Err(e) = self.child.wait() {
            warn!(index = self.index, "cannot reap worker: {e}");
        }
    }
}

/// Runs the fleet as child processes.
#[derive(Debug, Clone)]
pub struct Supervisor {
    command: WorkerCommand,
    max_restarts: u32,
}

impl Supervisor {
    /// Supervisor starting workers with `command`.
    pub fn new(command: WorkerCommand, max_restarts: u32) -> Self {
        Self {
            command,
            max_restarts,
        }
    }

    /// Launch every planned worker and wait until all have exited for good.
    pub fn run(&self, plans: &[WorkerPlan]) -> ActorResult<FleetSummary> {
        let mut summary = FleetSummary::default();
        let mut running = Vec::with_capacity(plans.len());

        for plan in plans {
            info!(
                index = plan.index,
                role = plan.role,
                device = plan.device.id,
                "launching worker"
            );
            running.push(Worker {
                index: plan.index,
                child: self.command.spawn(plan.index)?,
                restarts: 0,
            });
            summary.launches += 1;
        }

        while !running.is_empty() {
            let mut still_running = Vec::with_capacity(running.len());
            for mut worker in running {
                match worker.child.try_wait()? {
                    None => still_running.push(worker),
                    Some(status) if status.success() => {
                        info!(index = worker.index, "worker finished");
                        summary.succeeded.push(worker.index);
                    }
                    Some(status) => {
                        if let Some(worker) = self.restart(worker, status, &mut summary)? {
                            still_running.push(worker);
                        }
                    }
                }
            }
            running = still_running;
            if !running.is_empty() {
                thread::sleep(POLL_INTERVAL);
            }
        }

        summary.succeeded.sort_unstable();
        summary.failed.sort_unstable();
        Ok(summary)
    }

    fn restart(
        &self,
        worker: Worker,
        status: ExitStatus,
        summary: &mut FleetSummary,
    ) -> ActorResult<Option<Worker>> {
        if worker.restarts >= self.max_restarts {
            warn!(index = worker.index, %status, "worker failed");
            summary.failed.push(worker.index);
            return Ok(None);
        }
        warn!(
            index = worker.index,
            %status,
            restart = worker.restarts + 1,
            max = self.max_restarts,
            "worker failed, relaunching"
        );
        summary.launches += 1;
        Ok(Some(Worker {
            index: worker.index,
            child: self.command.spawn(worker.index)?,
            restarts: worker.restarts + 1,
        }))
    }
}
