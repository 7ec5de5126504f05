//! # Media Processing Executor
//!
//! Esegue le operazioni di un [`OperationPlan`] con un pool limitato di worker.
//!
//! ## Responsabilità:
//! - Trim, transcode, copia e no_process per ogni voce del piano
//! - Politica di fallback quando il codec non permette il trim lossless
//! - Copia dei file sidecar accanto al file di output
//! - Media offline: warning e salto, oppure errore sul singolo file
//! - Classificazione degli errori: fatali (interrompono il job) o per singolo file
//! - Cancellazione cooperativa: nessuna nuova operazione dopo la richiesta,
//!   l'encoder in corso viene terminato
//!
//! ## Concorrenza:
//! Il numero di operazioni parallele è limitato da un `Semaphore`. Ogni worker
//! invia il proprio risultato su un canale al driver, che è l'unico a
//! pubblicare l'avanzamento.
//!
//! ## Scrittura atomica:
//! L'output viene scritto in un file temporaneo nella cartella di destinazione
//! e rinominato solo a operazione riuscita.

use crate::config::{Config, TrimFallback};
use crate::encoder::{supports_stream_copy, MediaEncoder};
use crate::error::{ConsolidateError, Result};
use crate::interval::Interval;
use crate::job::{CancellationFlag, ProcessingError, ProgressPublisher};
use crate::options::{ConsolidationOptions, TranscodePreset};
use crate::planner::{OperationPlan, PlanAction, PlanEntry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

/// What happened to one plan entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// A new file was written
    Written {
        destination: PathBuf,
        bytes: u64,
        sidecars: Vec<PathBuf>,
    },
    /// Reference only, nothing written
    Referenced,
    Skipped { reason: String },
    Failed { message: String, fatal: bool },
    /// Never started, or interrupted by cancellation
    NotRun,
}

impl EntryOutcome {
    /// Final location of the entry's file, if it now exists.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Written { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

/// Result of running a plan
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// One outcome per plan entry, same order
    pub outcomes: Vec<EntryOutcome>,
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EntryOutcome::Written { .. }))
            .count()
    }
}

/// Settings shared by every worker of one run
#[derive(Debug, Clone, Copy)]
struct RunSettings {
    trim_fallback: TrimFallback,
    fallback_preset: TranscodePreset,
    timeout: Option<Duration>,
    skip_offline: bool,
}

struct ItemResult {
    outcome: Result<EntryOutcome>,
    warnings: Vec<String>,
}

enum WorkerMessage {
    Done(usize, ItemResult),
    Interrupted(usize),
}

/// Runs plans against a [`MediaEncoder`]
pub struct Executor<E: MediaEncoder> {
    encoder: Arc<E>,
    workers: usize,
    trim_fallback: TrimFallback,
    fallback_preset: TranscodePreset,
    timeout: Option<Duration>,
}

impl<E: MediaEncoder> Executor<E> {
    pub fn new(encoder: Arc<E>, config: &Config) -> Self {
        Self {
            encoder,
            workers: config.workers.max(1),
            trim_fallback: config.trim_fallback,
            fallback_preset: config.fallback_preset,
            timeout: config.encoder_timeout(),
        }
    }

    /// Process every entry of `plan`.
    ///
    /// Item failures are recorded on `publisher`; a fatal one stops the run and
    /// is returned as the error.
    pub async fn execute(
        &self,
        plan: &OperationPlan,
        options: &ConsolidationOptions,
        publisher: &ProgressPublisher,
        cancel: &CancellationFlag,
    ) -> Result<ExecutionReport> {
        tokio::fs::create_dir_all(&plan.output_root)
            .await
            .map_err(|e| ConsolidateError::output_write(&plan.output_root, e))?;

        publisher.update(|p| {
            p.files_total = plan.entries.len();
            p.bytes_total = plan.estimated_bytes();
        });
        info!(
            "🚀 Processing {} planned files with {} workers",
            plan.entries.len(),
            self.workers
        );

        let settings = RunSettings {
            trim_fallback: self.trim_fallback,
            fallback_preset: options.transcode_preset.unwrap_or(self.fallback_preset),
            timeout: self.timeout,
            skip_offline: options.skip_offline_media,
        };

        let mut outcomes = vec![EntryOutcome::NotRun; plan.entries.len()];
        let mut fatal: Option<ConsolidateError> = None;

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel::<WorkerMessage>(plan.entries.len().max(1));
        let mut queue = plan.entries.iter().enumerate().peekable();
        let mut in_flight = 0usize;

        loop {
            let stopping = fatal.is_some() || cancel.is_cancelled();
            if in_flight == 0 && (stopping || queue.peek().is_none()) {
                break;
            }

            tokio::select! {
                biased;

                Some(message) = rx.recv(), if in_flight > 0 => {
                    in_flight -= 1;
                    match message {
                        WorkerMessage::Done(index, result) => {
                            let entry = &plan.entries[index];
                            outcomes[index] = self.apply(entry, result, publisher, &mut fatal);
                        }
                        WorkerMessage::Interrupted(index) => {
                            debug!("Interrupted {}", plan.entries[index].file_name());
                        }
                    }
                }

                permit = semaphore.clone().acquire_owned(), if !stopping && queue.peek().is_some() => {
                    let Ok(permit) = permit else { break };
                    let Some((index, entry)) = queue.next() else { continue };

                    publisher.update(|p| {
                        p.current_file = Some(entry.file_name());
                        p.current_operation = Some(entry.action.to_string());
                    });

                    let encoder = Arc::clone(&self.encoder);
                    let entry = entry.clone();
                    let cancel = cancel.clone();
                    let tx = tx.clone();
                    in_flight += 1;

                    tokio::spawn(async move {
                        // Own task, so a panicking operation still reports back.
                        let work = tokio::spawn(async move {
                            process_entry(encoder.as_ref(), &entry, settings).await
                        });
                        let abort = work.abort_handle();
                        let message = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                abort.abort();
                                WorkerMessage::Interrupted(index)
                            }
                            joined = work => WorkerMessage::Done(index, joined.unwrap_or_else(|e| ItemResult {
                                outcome: Err(ConsolidateError::Encoder(format!("operation stopped: {}", e))),
                                warnings: Vec::new(),
                            })),
                        };
                        // Result first, then the permit, so the driver sees it before the next item starts.
                        let _ = tx.send(message).await;
                        drop(permit);
                    });
                }

                _ = cancel.cancelled(), if !stopping => {
                    info!("🛑 Cancellation requested, no new files will be started");
                }

                else => break,
            }
        }

        if let Some(err) = fatal {
            error!("❌ Fatal error, stopping: {}", err);
            return Err(err);
        }

        let cancelled = cancel.is_cancelled();
        let report = ExecutionReport {
            outcomes,
            cancelled,
        };
        info!(
            "✅ Processing finished: {} written, {} entries{}",
            report.written(),
            plan.entries.len(),
            if cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    fn apply(
        &self,
        entry: &PlanEntry,
        result: ItemResult,
        publisher: &ProgressPublisher,
        fatal: &mut Option<ConsolidateError>,
    ) -> EntryOutcome {
        for warning in result.warnings {
            publisher.warn(warning);
        }

        match result.outcome {
            Ok(outcome) => {
                let bytes = match &outcome {
                    EntryOutcome::Written { .. } => entry.estimated_bytes,
                    _ => 0,
                };
                if let EntryOutcome::Skipped { reason } = &outcome {
                    publisher.warn(reason.clone());
                }
                publisher.update(|p| {
                    p.files_processed += 1;
                    p.bytes_processed += bytes;
                });
                outcome
            }
            Err(err) => {
                let is_fatal = err.is_fatal();
                warn!("Failed {}: {}", entry.source_path.display(), err);
                publisher.update(|p| {
                    p.errors
                        .push(ProcessingError::new(entry.source_path.display().to_string(), &err));
                    p.files_processed += 1;
                });
                let outcome = EntryOutcome::Failed {
                    message: err.to_string(),
                    fatal: is_fatal,
                };
                if is_fatal && fatal.is_none() {
                    *fatal = Some(err);
                }
                outcome
            }
        }
    }
}

async fn process_entry<E: MediaEncoder>(encoder: &E, entry: &PlanEntry, settings: RunSettings) -> ItemResult {
    let mut warnings = Vec::new();
    let outcome = run_entry(encoder, entry, settings, &mut warnings).await;
    ItemResult { outcome, warnings }
}

async fn run_entry<E: MediaEncoder>(
    encoder: &E,
    entry: &PlanEntry,
    settings: RunSettings,
    warnings: &mut Vec<String>,
) -> Result<EntryOutcome> {
    if entry.action == PlanAction::NoProcess {
        return Ok(EntryOutcome::Referenced);
    }

    if !entry.is_online {
        if settings.skip_offline {
            return Ok(EntryOutcome::Skipped {
                reason: format!("Media offline, skipped: {}", entry.source_path.display()),
            });
        }
        return Err(ConsolidateError::OfflineMedia(entry.source_path.clone()));
    }

    let mut destination = entry.destination.clone();
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_error(parent, e))?;
    }

    match (entry.action, entry.span) {
        (PlanAction::Trim, Some(span)) => {
            let codec = match &entry.codec {
                Some(codec) => Some(codec.clone()),
                None => encoder.detect_codec(&entry.source_path).await.unwrap_or_else(|e| {
                    debug!("Codec detection failed for {}: {}", entry.source_path.display(), e);
                    None
                }),
            };

            if codec.as_deref().map(supports_stream_copy).unwrap_or(false) {
                let source = entry.source_path.clone();
                write_via_temp(&destination, settings.timeout, |tmp| async move {
                    encoder.trim(&source, &tmp, span).await
                })
                .await?;
            } else {
                let codec = codec.unwrap_or_else(|| "unknown".to_string());
                let unsupported = ConsolidateError::UnsupportedCodecForLosslessTrim {
                    path: entry.source_path.clone(),
                    codec,
                };
                if settings.trim_fallback == TrimFallback::Error {
                    return Err(unsupported);
                }
                let preset = settings.fallback_preset;
                warnings.push(format!("{}; transcoding with {} instead", unsupported, preset));
                if let Some(reserved) = &entry.fallback_destination {
                    destination = reserved.clone();
                }
                transcode(encoder, &entry.source_path, &destination, Some(span), preset, settings.timeout).await?;
            }
        }
        (PlanAction::Transcode(preset), span) => {
            transcode(encoder, &entry.source_path, &destination, span, preset, settings.timeout).await?;
        }
        _ => {
            let source = entry.source_path.clone();
            write_via_temp(&destination, settings.timeout, |tmp| async move {
                encoder.copy(&source, &tmp).await.map(|_| ())
            })
            .await?;
        }
    }

    let sidecars = copy_sidecars(entry, &destination, warnings).await;
    let bytes = tokio::fs::metadata(&destination).await?.len();
    debug!("Wrote {} ({} bytes)", destination.display(), bytes);

    Ok(EntryOutcome::Written {
        destination,
        bytes,
        sidecars,
    })
}

async fn transcode<E: MediaEncoder>(
    encoder: &E,
    source: &Path,
    destination: &Path,
    span: Option<Interval>,
    preset: TranscodePreset,
    timeout: Option<Duration>,
) -> Result<()> {
    let source = source.to_path_buf();
    write_via_temp(destination, timeout, |tmp| async move {
        encoder.transcode(&source, &tmp, span, preset).await
    })
    .await
}

/// Run `op` against a temporary file next to `destination`, then move it into place.
async fn write_via_temp<F, Fut>(destination: &Path, timeout: Option<Duration>, op: F) -> Result<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let dir = destination.parent().unwrap_or_else(|| Path::new("."));
    let suffix = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let temp = tempfile::Builder::new()
        .prefix(".consolidate-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| write_error(dir, e))?;

    let work = op(temp.path().to_path_buf());
    match timeout {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            ConsolidateError::Encoder(format!("timed out after {}s", limit.as_secs()))
        })??,
        None => work.await?,
    }

    temp.persist(destination)
        .map_err(|e| write_error(destination, e.error))?;
    Ok(())
}

async fn copy_sidecars(entry: &PlanEntry, destination: &Path, warnings: &mut Vec<String>) -> Vec<PathBuf> {
    let mut copied = Vec::new();
    let (Some(dir), Some(new_stem)) = (destination.parent(), destination.file_stem()) else {
        return copied;
    };
    let old_stem = entry
        .source_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let new_stem = new_stem.to_string_lossy();

    for sidecar in &entry.sidecars {
        let Some(name) = sidecar.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let renamed = match name.strip_prefix(old_stem.as_str()) {
            Some(rest) if !old_stem.is_empty() => format!("{}{}", new_stem, rest),
            _ => name,
        };
        let target = dir.join(renamed);
        match tokio::fs::copy(sidecar, &target).await {
            Ok(_) => copied.push(target),
            Err(e) => warnings.push(format!("Could not copy sidecar {}: {}", sidecar.display(), e)),
        }
    }
    copied
}

fn write_error(path: &Path, e: std::io::Error) -> ConsolidateError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ConsolidateError::output_write(path, e)
    } else {
        ConsolidateError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ConsolidationStatus, ProgressPublisher};
    use crate::planner::{EntryRole, MEDIA_DIR};
    use crate::test_support::{touch, FakeEncoder};
    use crate::ticks::TICKS_PER_SECOND as S;
    use tempfile::TempDir;

    fn entry(dir: &Path, name: &str, action: PlanAction, codec: Option<&str>) -> PlanEntry {
        let source = dir.join("src").join(name);
        touch(&source, 100);
        PlanEntry {
            media_id: name.to_string(),
            owner_id: name.to_string(),
            role: EntryRole::Main,
            fragment: 0,
            fragment_count: 1,
            source_path: source,
            destination: dir.join("out").join(MEDIA_DIR).join(name),
            fallback_destination: None,
            action,
            span: Some(Interval::new(0, 5 * S)),
            intervals: vec![Interval::new(0, 5 * S)],
            clip_ids: Vec::new(),
            multicam: false,
            codec: codec.map(str::to_string),
            is_online: true,
            source_size: 100,
            source_duration: Some(10 * S),
            sidecars: Vec::new(),
            sidecar_bytes: 0,
            estimated_bytes: 50,
        }
    }

    fn plan(dir: &Path, entries: Vec<PlanEntry>) -> OperationPlan {
        OperationPlan {
            output_root: dir.join("out"),
            entries,
            notes: Vec::new(),
        }
    }

    async fn run(
        encoder: FakeEncoder,
        config: &Config,
        plan: &OperationPlan,
        options: &ConsolidationOptions,
    ) -> (Result<ExecutionReport>, crate::job::ConsolidationProgress) {
        let (publisher, _rx) = ProgressPublisher::new("test");
        publisher.transition(ConsolidationStatus::Analyzing);
        publisher.transition(ConsolidationStatus::Processing);
        let executor = Executor::new(Arc::new(encoder), config);
        let report = executor
            .execute(plan, options, &publisher, &CancellationFlag::default())
            .await;
        (report, publisher.snapshot())
    }

    #[tokio::test]
    async fn test_trim_copy_and_reference() {
        let dir = TempDir::new().unwrap();
        let mut skipped = entry(dir.path(), "c.mov", PlanAction::NoProcess, None);
        skipped.destination = skipped.source_path.clone();
        let plan = plan(
            dir.path(),
            vec![
                entry(dir.path(), "a.mov", PlanAction::Trim, Some("prores")),
                entry(dir.path(), "b.png", PlanAction::Copy, None),
                skipped,
            ],
        );
        let encoder = FakeEncoder::default();
        let (report, progress) = run(encoder.clone(), &Config::default(), &plan, &ConsolidationOptions::default()).await;
        let report = report.unwrap();

        assert_eq!(report.written(), 2);
        assert_eq!(report.outcomes[2], EntryOutcome::Referenced);
        assert!(plan.entries[0].destination.exists());
        assert_eq!(progress.files_processed, 3);
        assert_eq!(progress.bytes_processed, 100);
        assert!(progress.errors.is_empty());

        let calls = encoder.calls();
        assert!(calls.contains(&"trim a.mov".to_string()));
        assert!(calls.contains(&"copy b.png".to_string()));
    }

    #[tokio::test]
    async fn test_unsupported_codec_fallback_policy() {
        let dir = TempDir::new().unwrap();
        let mut e = entry(dir.path(), "a.mp4", PlanAction::Trim, Some("mpeg2video"));
        e.fallback_destination = Some(dir.path().join("out").join(MEDIA_DIR).join("a_pp001.mov"));
        let plan = plan(dir.path(), vec![e]);

        let encoder = FakeEncoder::default();
        let (report, progress) = run(encoder.clone(), &Config::default(), &plan, &ConsolidationOptions::default()).await;
        let report = report.unwrap();
        let written = report.outcomes[0].destination().unwrap();
        assert_eq!(Some(written), plan.entries[0].fallback_destination.as_deref());
        assert_eq!(encoder.calls(), vec!["transcode a.mp4".to_string()]);
        assert_eq!(progress.warnings.len(), 1);

        let strict = Config {
            trim_fallback: TrimFallback::Error,
            ..Default::default()
        };
        let (report, progress) = run(FakeEncoder::default(), &strict, &plan, &ConsolidationOptions::default()).await;
        assert!(matches!(report.unwrap().outcomes[0], EntryOutcome::Failed { fatal: false, .. }));
        assert_eq!(progress.errors.len(), 1);
        assert!(!progress.errors[0].is_fatal);
    }

    #[tokio::test]
    async fn test_offline_media_policy() {
        let dir = TempDir::new().unwrap();
        let mut offline = entry(dir.path(), "gone.mov", PlanAction::Trim, Some("h264"));
        offline.is_online = false;
        let plan = plan(dir.path(), vec![offline]);

        let (report, progress) = run(FakeEncoder::default(), &Config::default(), &plan, &ConsolidationOptions::default()).await;
        assert!(matches!(report.unwrap().outcomes[0], EntryOutcome::Skipped { .. }));
        assert!(progress.errors.is_empty());
        assert_eq!(progress.warnings.len(), 1);

        let options = ConsolidationOptions {
            skip_offline_media: false,
            ..Default::default()
        };
        let (report, progress) = run(FakeEncoder::default(), &Config::default(), &plan, &options).await;
        assert!(report.is_ok());
        assert_eq!(progress.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_encoder_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let plan = plan(
            dir.path(),
            vec![
                entry(dir.path(), "bad.mov", PlanAction::Trim, Some("h264")),
                entry(dir.path(), "good.mov", PlanAction::Trim, Some("h264")),
            ],
        );
        let encoder = FakeEncoder {
            fail_on: Some("bad".to_string()),
            ..Default::default()
        };
        let (report, progress) = run(encoder, &Config::default(), &plan, &ConsolidationOptions::default()).await;
        let report = report.unwrap();
        assert_eq!(report.written(), 1);
        assert_eq!(progress.errors.len(), 1);
        assert!(!plan.entries[0].destination.exists());
    }

    #[tokio::test]
    async fn test_panicking_operation_is_an_item_error() {
        let dir = TempDir::new().unwrap();
        let plan = plan(
            dir.path(),
            vec![
                entry(dir.path(), "boom.mov", PlanAction::Trim, Some("h264")),
                entry(dir.path(), "fine.mov", PlanAction::Trim, Some("h264")),
            ],
        );
        let encoder = FakeEncoder {
            panic_on: Some("boom".to_string()),
            ..Default::default()
        };
        let (report, progress) = run(encoder, &Config::default(), &plan, &ConsolidationOptions::default()).await;
        let report = report.unwrap();
        assert!(matches!(report.outcomes[0], EntryOutcome::Failed { fatal: false, .. }));
        assert_eq!(report.written(), 1);
        assert_eq!(progress.files_processed, 2);
    }

    #[tokio::test]
    async fn test_missing_encoder_is_fatal() {
        let dir = TempDir::new().unwrap();
        let plan = plan(
            dir.path(),
            (0..3)
                .map(|i| entry(dir.path(), &format!("{}.mov", i), PlanAction::Trim, Some("h264")))
                .collect(),
        );
        let encoder = FakeEncoder {
            missing: true,
            ..Default::default()
        };
        let config = Config {
            workers: 1,
            ..Default::default()
        };
        let (report, progress) = run(encoder, &config, &plan, &ConsolidationOptions::default()).await;
        assert!(matches!(report, Err(ConsolidateError::MissingDependency(_))));
        assert_eq!(progress.errors.len(), 1);
        assert!(progress.errors[0].is_fatal);
        assert_eq!(progress.files_processed, 1);
    }

    #[tokio::test]
    async fn test_cancel_after_two_of_four() {
        let dir = TempDir::new().unwrap();
        let plan = plan(
            dir.path(),
            (0..4)
                .map(|i| entry(dir.path(), &format!("{}.mov", i), PlanAction::Trim, Some("h264")))
                .collect(),
        );
        let (encoder, gate, mut started) = FakeEncoder::gated();
        let config = Config {
            workers: 1,
            ..Default::default()
        };
        let (publisher, rx) = ProgressPublisher::new("job");
        publisher.transition(ConsolidationStatus::Analyzing);
        publisher.transition(ConsolidationStatus::Processing);
        let cancel = CancellationFlag::default();

        let executor = Executor::new(Arc::new(encoder), &config);
        let options = ConsolidationOptions::default();
        let run = executor.execute(&plan, &options, &publisher, &cancel);
        let control = async {
            for _ in 0..2 {
                started.recv().await.unwrap();
                gate.add_permits(1);
            }
            // Third file is in flight when the cancel arrives.
            started.recv().await.unwrap();
            cancel.cancel();
        };
        let (report, _) = tokio::join!(run, control);
        let report = report.unwrap();
        publisher.transition(ConsolidationStatus::Cancelled);

        assert!(report.cancelled);
        assert_eq!(report.written(), 2);
        assert_eq!(report.outcomes[2], EntryOutcome::NotRun);
        assert_eq!(report.outcomes[3], EntryOutcome::NotRun);
        assert!(!plan.entries[2].destination.exists());

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, ConsolidationStatus::Cancelled);
        assert_eq!(snapshot.files_processed, 2);
        assert_eq!(snapshot.files_total, 4);
    }

    #[tokio::test]
    async fn test_sidecars_follow_renamed_output() {
        let dir = TempDir::new().unwrap();
        let mut e = entry(dir.path(), "A001.braw", PlanAction::Copy, None);
        let sidecar = dir.path().join("src").join("A001.sidecar");
        touch(&sidecar, 3);
        e.sidecars = vec![sidecar];
        e.destination = dir.path().join("out").join(MEDIA_DIR).join("A001_pp001.braw");
        let plan = plan(dir.path(), vec![e]);

        let (report, _) = run(FakeEncoder::default(), &Config::default(), &plan, &ConsolidationOptions::default()).await;
        match &report.unwrap().outcomes[0] {
            EntryOutcome::Written { sidecars, .. } => {
                assert_eq!(sidecars[0].file_name().unwrap(), "A001_pp001.sidecar");
                assert!(sidecars[0].exists());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
