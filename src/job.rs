//! # Consolidation Jobs
//!
//! Stato, avanzamento e registro dei job di consolidamento.
//!
//! ## Responsabilità:
//! - Macchina a stati `Pending → Analyzing → Processing → WritingProject → Completed`,
//!   con `Cancelled` e `Failed` raggiungibili da ogni stato non terminale
//! - Snapshot immutabile dell'avanzamento pubblicato su un canale `watch`:
//!   un solo scrittore (il driver del job), lettori illimitati
//! - Flag di cancellazione cooperativa
//! - Registro dei job posseduto dal motore, con pulizia dei job terminati
//!
//! ## Pulizia del registro:
//! Un job terminato viene rimosso quando il suo stato finale è stato letto
//! almeno una volta ed è trascorso il periodo di grazia, oppure quando è
//! terminato da più del tempo di retention.

use crate::error::{ConsolidateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsolidationStatus {
    Pending,
    Analyzing,
    Processing,
    WritingProject,
    Completed,
    Cancelled,
    Failed,
}

impl ConsolidationStatus {
    pub fn can_transition_to(&self, next: ConsolidationStatus) -> bool {
        use ConsolidationStatus::*;
        match (self, next) {
            (Pending, Analyzing) => true,
            (Analyzing, Processing) => true,
            (Processing, WritingProject) => true,
            (WritingProject, Completed) => true,
            (from, Cancelled | Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for ConsolidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Analyzing => "Analyzing",
            Self::Processing => "Processing",
            Self::WritingProject => "WritingProject",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// One failure recorded on a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub file_path: String,
    pub error_message: String,
    pub is_fatal: bool,
}

impl ProcessingError {
    pub fn new(file_path: impl Into<String>, error: &ConsolidateError) -> Self {
        Self {
            file_path: file_path.into(),
            error_message: error.to_string(),
            is_fatal: error.is_fatal(),
        }
    }
}

/// Snapshot of a job's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationProgress {
    pub job_id: String,
    pub status: ConsolidationStatus,
    pub current_file: Option<String>,
    pub current_operation: Option<String>,
    pub files_processed: usize,
    pub files_total: usize,
    pub bytes_processed: u64,
    pub bytes_total: u64,
    pub errors: Vec<ProcessingError>,
    pub warnings: Vec<String>,
}

impl ConsolidationProgress {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: ConsolidationStatus::Pending,
            current_file: None,
            current_operation: None,
            files_processed: 0,
            files_total: 0,
            bytes_processed: 0,
            bytes_total: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Completion ratio in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.files_total == 0 {
            return if self.status.is_terminal() { 1.0 } else { 0.0 };
        }
        (self.files_processed as f64 / self.files_total as f64).min(1.0)
    }
}

/// Cooperative cancellation signal shared by a job and its registry entry
#[derive(Debug, Clone)]
pub struct CancellationFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationFlag {
    fn default() -> Self {
        Self {
            tx: Arc::new(watch::channel(false).0),
        }
    }
}

impl CancellationFlag {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel never closes here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// The single writer of a job's progress
#[derive(Debug)]
pub struct ProgressPublisher {
    tx: watch::Sender<ConsolidationProgress>,
}

impl ProgressPublisher {
    pub fn new(job_id: &str) -> (Self, watch::Receiver<ConsolidationProgress>) {
        let (tx, rx) = watch::channel(ConsolidationProgress::new(job_id));
        (Self { tx }, rx)
    }

    pub fn snapshot(&self) -> ConsolidationProgress {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> ConsolidationStatus {
        self.tx.borrow().status
    }

    /// Apply a change and publish the new snapshot. Terminal jobs are frozen.
    pub fn update(&self, change: impl FnOnce(&mut ConsolidationProgress)) {
        self.tx.send_if_modified(|progress| {
            if progress.status.is_terminal() {
                return false;
            }
            change(progress);
            true
        });
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&self, next: ConsolidationStatus) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|progress| {
            if !progress.status.can_transition_to(next) {
                return false;
            }
            progress.status = next;
            if next.is_terminal() {
                progress.current_file = None;
                progress.current_operation = None;
            }
            applied = true;
            true
        });
        if !applied {
            warn!("Ignoring job status change {} -> {}", self.status(), next);
        }
        applied
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.update(|p| p.warnings.push(message));
    }

    pub fn error(&self, error: ProcessingError) {
        self.update(|p| p.errors.push(error));
    }
}

struct JobEntry {
    progress: watch::Receiver<ConsolidationProgress>,
    cancel: CancellationFlag,
    terminal_since: Option<Instant>,
    observed_at: Option<Instant>,
}

/// A freshly registered job
pub struct JobHandle {
    pub job_id: String,
    pub publisher: ProgressPublisher,
    pub cancel: CancellationFlag,
}

/// Jobs known to an engine instance
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobEntry>>,
    retention: Duration,
    grace: Duration,
}

impl JobRegistry {
    pub fn new(retention: Duration, grace: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            retention,
            grace,
        }
    }

    /// Register a new job in `Pending`.
    pub async fn create(&self) -> JobHandle {
        let job_id = Uuid::new_v4().to_string();
        let (publisher, progress) = ProgressPublisher::new(&job_id);
        let cancel = CancellationFlag::default();

        let mut jobs = self.jobs.lock().await;
        Self::prune(&mut jobs, Instant::now(), self.retention, self.grace);
        jobs.insert(
            job_id.clone(),
            JobEntry {
                progress,
                cancel: cancel.clone(),
                terminal_since: None,
                observed_at: None,
            },
        );
        debug!("Registered job {}", job_id);

        JobHandle {
            job_id,
            publisher,
            cancel,
        }
    }

    /// Latest snapshot of a job.
    pub async fn progress(&self, job_id: &str) -> Result<ConsolidationProgress> {
        self.progress_at(job_id, Instant::now()).await
    }

    async fn progress_at(&self, job_id: &str, now: Instant) -> Result<ConsolidationProgress> {
        let mut jobs = self.jobs.lock().await;
        Self::prune(&mut jobs, now, self.retention, self.grace);

        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| ConsolidateError::JobNotFound(job_id.to_string()))?;
        let snapshot = entry.progress.borrow().clone();
        if snapshot.status.is_terminal() {
            entry.terminal_since.get_or_insert(now);
            entry.observed_at.get_or_insert(now);
        }
        Ok(snapshot)
    }

    /// Request cancellation; a finished job is left as it is.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let jobs = self.jobs.lock().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| ConsolidateError::JobNotFound(job_id.to_string()))?;
        if !entry.progress.borrow().status.is_terminal() {
            debug!("Cancellation requested for job {}", job_id);
            entry.cancel.cancel();
        }
        Ok(())
    }

    pub async fn list(&self) -> Vec<String> {
        let mut jobs = self.jobs.lock().await;
        Self::prune(&mut jobs, Instant::now(), self.retention, self.grace);
        let mut ids: Vec<String> = jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn prune(jobs: &mut HashMap<String, JobEntry>, now: Instant, retention: Duration, grace: Duration) {
        jobs.retain(|id, entry| {
            if !entry.progress.borrow().status.is_terminal() {
                return true;
            }
            let since = *entry.terminal_since.get_or_insert(now);
            let expired = now.saturating_duration_since(since) >= retention;
            let observed = entry
                .observed_at
                .map(|at| now.saturating_duration_since(at) >= grace)
                .unwrap_or(false);
            if expired || observed {
                debug!("Removing finished job {}", id);
            }
            !(expired || observed)
        });
    }
}
