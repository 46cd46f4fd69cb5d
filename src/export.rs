use anyhow::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub const EXPORT_FAILED_MESSAGE: &str = "Failed to generate PDF. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum ExportOutcome {
    Completed(ExportArtifact),
    /// The user-visible notification; details go to the log.
    Failed { message: String },
    /// Another export from the same control is still running.
    Busy,
}

/// Busy flag owned by one export trigger. While a job runs, further triggers are
/// refused; the flag is cleared when the job finishes, fails or panics.
#[derive(Debug, Default)]
pub struct ExportControl {
    busy: AtomicBool,
}

impl ExportControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn run<F, Fut>(&self, label: &str, job: F) -> ExportOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExportArtifact>>,
    {
        let Some(_guard) = self.acquire(label) else {
            return ExportOutcome::Busy;
        };

        finish(label, job().await)
    }

    pub fn run_blocking<F>(&self, label: &str, job: F) -> ExportOutcome
    where
        F: FnOnce() -> Result<ExportArtifact>,
    {
        let Some(_guard) = self.acquire(label) else {
            return ExportOutcome::Busy;
        };

        finish(label, job())
    }

    fn acquire(&self, label: &str) -> Option<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!(export = label, "export already in progress; trigger ignored");
            return None;
        }

        Some(BusyGuard(&self.busy))
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn finish(label: &str, result: Result<ExportArtifact>) -> ExportOutcome {
    match result {
        Ok(artifact) => {
            info!(
                export = label,
                filename = %artifact.filename,
                bytes = artifact.bytes.len(),
                "export completed"
            );
            ExportOutcome::Completed(artifact)
        }
        Err(error) => {
            warn!(export = label, error = %format!("{error:#}"), "export failed");
            ExportOutcome::Failed {
                message: EXPORT_FAILED_MESSAGE.to_string(),
            }
        }
    }
}
