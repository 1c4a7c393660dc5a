//! Messages from execution contexts to the coordinator.
//!
//! A worker process prints exactly one [`WorkerReport`] as JSON on stdout:
//!
//! ```json
//! { "slug": "hello", "status": "success", "artifact": { ... }, "processingMs": 12, "memoryDeltaMb": 3.5 }
//! { "slug": "hello", "status": "failure", "error": "empty content", "processingMs": 1 }
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cache::CachedArtifact;
use crate::source::CompileJob;
use crate::utils::{elapsed_ms, memory};

/// Monotonic id of one dispatch. Results carrying a stale id are dropped.
pub type AttemptId = u64;

/// Outcome of one compilation attempt, as reported by the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerReport {
    pub slug: String,
    #[serde(flatten)]
    pub outcome: WorkerOutcome,
    pub processing_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_delta_mb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerOutcome {
    Success { artifact: Box<CachedArtifact> },
    Failure { error: String },
}

/// Event delivered on the coordinator channel.
///
/// `Err` means the context died without a report (crash, abnormal exit,
/// panic, unreadable output).
#[derive(Debug)]
pub struct Event {
    pub attempt: AttemptId,
    pub result: Result<WorkerReport, String>,
}

/// Run `compile` for `job`, timing it and sampling memory around it.
pub fn run_attempt<F>(job: &CompileJob, compile: F) -> WorkerReport
where
    F: FnOnce() -> anyhow::Result<CachedArtifact>,
{
    let before = memory::resident_mb();
    let start = Instant::now();

    let outcome = match compile() {
        Ok(artifact) => WorkerOutcome::Success {
            artifact: Box::new(artifact),
        },
        Err(e) => WorkerOutcome::Failure {
            error: format!("{e:#}"),
        },
    };

    let memory_delta_mb = before
        .zip(memory::resident_mb())
        .map(|(before, after)| (after - before).max(0.0));

    WorkerReport {
        slug: job.identifier.clone(),
        outcome,
        processing_ms: elapsed_ms(start),
        memory_delta_mb,
    }
}

/// Like [`run_attempt`], but a panic becomes an abnormal exit.
pub fn run_attempt_catching<F>(job: &CompileJob, compile: F) -> Result<WorkerReport, String>
where
    F: FnOnce() -> anyhow::Result<CachedArtifact>,
{
    catch_unwind(AssertUnwindSafe(|| run_attempt(job, compile)))
        .map_err(|payload| format!("compile panicked: {}", panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_artifact;
    use std::path::PathBuf;

    fn job() -> CompileJob {
        CompileJob::new("hello", PathBuf::from("/blog/hello.mdx"), 1.0)
    }

    #[test]
    fn test_report_wire_format() {
        let report = WorkerReport {
            slug: "hello".to_string(),
            outcome: WorkerOutcome::Failure {
                error: "empty content".to_string(),
            },
            processing_ms: 3,
            memory_delta_mb: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"], "empty content");
        assert_eq!(json["processingMs"], 3);

        let text = serde_json::to_string(&WorkerReport {
            outcome: WorkerOutcome::Success {
                artifact: Box::new(test_artifact("hello", "", 1.0)),
            },
            ..report
        })
        .unwrap();
        let back: WorkerReport = serde_json::from_str(&text).unwrap();
        let WorkerOutcome::Success { artifact } = back.outcome else {
            panic!("expected success");
        };
        assert_eq!(artifact.slug(), "hello");
    }

    #[test]
    fn test_run_attempt_failure_keeps_context() {
        let report = run_attempt(&job(), || {
            Err(anyhow::anyhow!("inner").context("outer"))
        });
        let WorkerOutcome::Failure { error } = report.outcome else {
            panic!("expected failure");
        };
        assert_eq!(error, "outer: inner");
    }

    #[test]
    fn test_panic_becomes_abnormal_exit() {
        let err = run_attempt_catching(&job(), || panic!("boom")).unwrap_err();
        assert_eq!(err, "compile panicked: boom");
    }
}
