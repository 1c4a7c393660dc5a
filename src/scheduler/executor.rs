//! Execution contexts: where a compilation attempt actually runs.
//!
//! - [`ProcessExecutor`] re-runs this binary as `mdxc worker` per attempt.
//!   A crash stays inside the child, and a timeout kills it.
//! - [`ThreadExecutor`] runs a compile function on a fresh thread. A timed
//!   out thread cannot be killed; it is detached and its late result is
//!   dropped by attempt id.
//!
//! Both report through the coordinator's channel; neither blocks `start`.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::Sender;
use parking_lot::Mutex;

use crate::cache::CachedArtifact;
use crate::compiler::CompileOptions;
use crate::source::CompileJob;

use super::message::{AttemptId, Event, WorkerReport, run_attempt_catching};

/// Starts attempts in some isolated context.
pub trait Executor {
    /// Begin `job` as attempt `attempt`. Exactly one [`Event`] for this
    /// attempt is eventually sent on `events`, unless it is terminated first.
    fn start(
        &self,
        job: &CompileJob,
        attempt: AttemptId,
        events: &Sender<Event>,
    ) -> io::Result<Box<dyn Execution>>;

    fn name(&self) -> &'static str;
}

/// Handle to a running attempt.
pub trait Execution {
    /// Stop the attempt. Idempotent.
    fn terminate(&mut self);
}

// ============================================================================
// Process isolation
// ============================================================================

/// Poll interval while reaping a child after its stdout closed.
const REAP_POLL: Duration = Duration::from_millis(10);

pub struct ProcessExecutor {
    program: PathBuf,
    options: CompileOptions,
}

impl ProcessExecutor {
    /// Spawn workers from the currently running binary.
    pub fn current(options: CompileOptions) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, options))
    }

    pub fn new(program: PathBuf, options: CompileOptions) -> Self {
        Self { program, options }
    }

    fn command(&self, job: &CompileJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("worker")
            .arg("--file")
            .arg(&job.source_path)
            .args(["--slug", &job.identifier])
            .args(["--attempt", &job.retry_count.to_string()])
            .args(["--default-image", &self.options.default_image])
            .args(["--default-read-time", &self.options.default_read_time])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl Executor for ProcessExecutor {
    fn start(
        &self,
        job: &CompileJob,
        attempt: AttemptId,
        events: &Sender<Event>,
    ) -> io::Result<Box<dyn Execution>> {
        let mut child = self.command(job).spawn()?;
        let stdout = child.stdout.take();
        let child = Arc::new(Mutex::new(child));

        let reaper = Arc::clone(&child);
        let events = events.clone();
        let spawned = thread::Builder::new()
            .name(format!("mdxc-reap-{attempt}"))
            .spawn(move || {
                let mut output = Vec::new();
                if let Some(mut stdout) = stdout {
                    // a killed child closes the pipe, so this always returns
                    let _ = stdout.read_to_end(&mut output);
                }
                let result = reap(&reaper).and_then(|status| parse_output(status, &output));
                let _ = events.send(Event { attempt, result });
            });

        let mut execution = ChildExecution { child };
        if let Err(e) = spawned {
            execution.terminate();
            return Err(e);
        }
        Ok(Box::new(execution))
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Wait for exit without holding the lock across the wait, so `terminate`
/// can always get in to kill.
fn reap(child: &Mutex<Child>) -> Result<ExitStatus, String> {
    loop {
        let polled = child.lock().try_wait();
        match polled {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => thread::sleep(REAP_POLL),
            Err(e) => return Err(format!("cannot wait for worker: {e}")),
        }
    }
}

fn parse_output(status: ExitStatus, output: &[u8]) -> Result<WorkerReport, String> {
    if !status.success() {
        return Err(format!("worker exited abnormally ({status})"));
    }
    serde_json::from_slice(output).map_err(|e| format!("unreadable worker report: {e}"))
}

struct ChildExecution {
    child: Arc<Mutex<Child>>,
}

impl Execution for ChildExecution {
    fn terminate(&mut self) {
        let mut child = self.child.lock();
        // already exited: kill fails harmlessly, wait returns the cached status
        let _ = child.kill();
        let _ = child.wait();
    }
}

// ============================================================================
// Thread isolation
// ============================================================================

/// Runs a compile function on one thread per attempt, with panic capture.
pub struct ThreadExecutor<F> {
    compile: Arc<F>,
}

impl<F> ThreadExecutor<F>
where
    F: Fn(&CompileJob) -> anyhow::Result<CachedArtifact> + Send + Sync + 'static,
{
    pub fn new(compile: F) -> Self {
        Self {
            compile: Arc::new(compile),
        }
    }
}

impl<F> Executor for ThreadExecutor<F>
where
    F: Fn(&CompileJob) -> anyhow::Result<CachedArtifact> + Send + Sync + 'static,
{
    fn start(
        &self,
        job: &CompileJob,
        attempt: AttemptId,
        events: &Sender<Event>,
    ) -> io::Result<Box<dyn Execution>> {
        let compile = Arc::clone(&self.compile);
        let events = events.clone();
        let job = job.clone();

        thread::Builder::new()
            .name(format!("mdxc-{}", job.identifier))
            .spawn(move || {
                let result = run_attempt_catching(&job, || compile(&job));
                let _ = events.send(Event { attempt, result });
            })?;

        Ok(Box::new(DetachedThread))
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

struct DetachedThread;

impl Execution for DetachedThread {
    fn terminate(&mut self) {}
}
