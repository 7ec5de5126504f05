//! # Consolidation Engine
//!
//! Punto d'accesso della libreria: espone le operazioni esterne e avvia i job.
//!
//! ## Responsabilità:
//! - Apertura dei progetti con cache per percorso, invalidata dalla data di modifica
//! - Operazioni di sola lettura: info progetto, sequenze, media, analisi d'uso, stima
//! - Avvio dei job di consolidamento su un task in background
//! - Lettura dell'avanzamento e cancellazione tramite il [`JobRegistry`]
//!
//! ## Fasi di un job:
//! 1. `Analyzing`: inventario, analisi d'uso e piano delle operazioni
//! 2. `Processing`: esecuzione del piano con l'[`Executor`]
//! 3. `WritingProject`: riscrittura del progetto e manifest
//! 4. `Completed`, oppure `Cancelled` / `Failed`
//!
//! La cancellazione viene controllata prima di ogni fase; durante `Processing`
//! è l'executor a fermare i worker.

use crate::analyzer::{SequenceAnalyzer, UsageResult};
use crate::config::Config;
use crate::encoder::{FfmpegEncoder, MediaEncoder};
use crate::error::{ConsolidateError, Result};
use crate::executor::{EntryOutcome, Executor};
use crate::file_manager::FileManager;
use crate::inventory::MediaInventory;
use crate::job::{
    CancellationFlag, ConsolidationProgress, ConsolidationStatus, JobHandle, JobRegistry,
    ProcessingError, ProgressPublisher,
};
use crate::options::ConsolidationOptions;
use crate::planner::{OperationPlan, PlanEntry, Planner};
use crate::project::{document, Project, TrackKind};
use crate::rewriter::rewrite_project;
use crate::ticks::ticks_to_seconds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const MANIFEST_FILE: &str = "consolidation_manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub file_path: PathBuf,
    pub version: Option<String>,
    pub sequence_count: usize,
    pub media_count: usize,
    pub bin_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub object_id: String,
    pub name: String,
    pub duration_seconds: f64,
    /// Frames per second
    pub frame_rate: f64,
    pub video_track_count: usize,
    pub audio_track_count: usize,
    pub nested_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItemInfo {
    pub object_id: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub file_size_formatted: String,
    pub is_online: bool,
    pub media_type: String,
    pub has_proxy: bool,
    pub bin_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsedMediaInfo {
    pub object_id: String,
    pub file_name: String,
    pub usage_count: usize,
    pub time_range_seconds: [f64; 2],
    pub sequences: Vec<String>,
}

/// Result of `analyze_media_usage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub used_count: usize,
    pub unused_count: usize,
    pub used_size: u64,
    pub unused_size: u64,
    pub used_media: Vec<UsedMediaInfo>,
    pub unused_media: Vec<String>,
    pub warnings: Vec<String>,
}

/// Record of a finished run, written next to the consolidated project
#[derive(Debug, Serialize)]
struct ConsolidationManifest<'a> {
    job_id: &'a str,
    created_at: u64,
    source_project: &'a Path,
    source_sha256: &'a str,
    consolidated_project: &'a Path,
    options: &'a ConsolidationOptions,
    entries: Vec<ManifestEntry<'a>>,
    warnings: &'a [String],
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    #[serde(flatten)]
    entry: &'a PlanEntry,
    result: &'a EntryOutcome,
}

/// Owns the job registry and the project cache
pub struct ConsolidationEngine<E: MediaEncoder = FfmpegEncoder> {
    config: Config,
    encoder: Arc<E>,
    registry: Arc<JobRegistry>,
    projects: Mutex<HashMap<PathBuf, Arc<Project>>>,
}

impl ConsolidationEngine {
    /// Engine driving the system `ffmpeg`.
    pub fn new(config: Config) -> Self {
        let encoder = FfmpegEncoder::from_config(&config);
        Self::with_encoder(config, encoder)
    }
}

impl<E: MediaEncoder> ConsolidationEngine<E> {
    pub fn with_encoder(config: Config, encoder: E) -> Self {
        let registry = JobRegistry::new(config.job_retention(), config.observed_job_grace());
        Self {
            config,
            encoder: Arc::new(encoder),
            registry: Arc::new(registry),
            projects: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open `path`, reusing the parsed project while the file is unchanged.
    pub async fn open_project(&self, path: &Path) -> Result<Arc<Project>> {
        let modified = tokio::fs::metadata(path).await?.modified().ok();
        if let Some(cached) = self.projects.lock().await.get(path) {
            if cached.modified.is_some() && cached.modified == modified {
                debug!("Using cached project {}", path.display());
                return Ok(cached.clone());
            }
        }

        let project = Arc::new(Project::open(path).await?);
        self.projects
            .lock()
            .await
            .insert(path.to_path_buf(), project.clone());
        Ok(project)
    }

    pub async fn get_project_info(&self, path: &Path) -> Result<ProjectInfo> {
        let project = self.open_project(path).await?;
        let graph = &project.graph;
        Ok(ProjectInfo {
            name: project.name().to_string(),
            file_path: project.path.clone(),
            version: graph.version.clone(),
            sequence_count: graph.sequences().count(),
            media_count: graph.media_items().count(),
            bin_count: graph.bins().count(),
        })
    }

    pub async fn get_sequences(&self, path: &Path) -> Result<Vec<SequenceInfo>> {
        let project = self.open_project(path).await?;
        let graph = &project.graph;
        Ok(graph
            .sequences()
            .map(|sequence| {
                let tracks: Vec<_> = graph.tracks_of(sequence).collect();
                SequenceInfo {
                    object_id: sequence.id.clone(),
                    name: sequence.name.clone(),
                    duration_seconds: ticks_to_seconds(sequence.duration),
                    frame_rate: sequence.frame_rate.fps(),
                    video_track_count: tracks.iter().filter(|t| t.kind == TrackKind::Video).count(),
                    audio_track_count: tracks.iter().filter(|t| t.kind == TrackKind::Audio).count(),
                    nested_count: graph.nested_sequences(sequence).len(),
                }
            })
            .collect())
    }

    pub async fn get_media_items(&self, path: &Path) -> Result<Vec<MediaItemInfo>> {
        let project = self.open_project(path).await?;
        let inventory = MediaInventory::build(&project.graph);
        Ok(inventory
            .items()
            .iter()
            .map(|item| MediaItemInfo {
                object_id: item.object_id.clone(),
                file_path: item.file_path.clone(),
                file_name: item.file_name.clone(),
                file_size: item.file_size,
                file_size_formatted: FileManager::format_size(item.file_size),
                is_online: item.is_online,
                media_type: item.media_type.to_string(),
                has_proxy: item.has_proxy(),
                bin_path: item.bin_path.clone(),
            })
            .collect())
    }

    pub async fn analyze_media_usage(
        &self,
        path: &Path,
        sequence_ids: &[String],
        handle_frames: u32,
        include_all_multicam: bool,
    ) -> Result<UsageReport> {
        let project = self.open_project(path).await?;
        let inventory = MediaInventory::build(&project.graph);
        let usage = analyze(
            &project,
            &inventory,
            &self.config,
            sequence_ids,
            handle_frames,
            include_all_multicam,
        )?;

        let used_media = usage
            .used
            .iter()
            .map(|media| {
                let range = media
                    .time_range()
                    .map(|r| [ticks_to_seconds(r.start), ticks_to_seconds(r.end)])
                    .unwrap_or([0.0, 0.0]);
                UsedMediaInfo {
                    object_id: media.media_id.clone(),
                    file_name: inventory
                        .get(&media.media_id)
                        .map(|i| i.file_name.clone())
                        .unwrap_or_default(),
                    usage_count: media.usage_count(),
                    time_range_seconds: range,
                    sequences: media.sequences.iter().cloned().collect(),
                }
            })
            .collect();

        Ok(UsageReport {
            used_count: usage.used_count,
            unused_count: usage.unused_count,
            used_size: usage.used_size,
            unused_size: usage.unused_size,
            used_media,
            unused_media: usage.unused_media,
            warnings: usage.warnings,
        })
    }

    /// Bytes a consolidation with `options` is expected to write.
    pub async fn estimate_output_size(&self, path: &Path, options: &ConsolidationOptions) -> Result<u64> {
        let project = self.open_project(path).await?;
        let inventory = MediaInventory::build(&project.graph);
        let plan = build_plan(&project, &inventory, &self.config, options)?;
        Ok(plan.estimated_bytes())
    }

    /// Validate the request, register a job and run it in the background.
    pub async fn start_consolidation(&self, path: &Path, options: ConsolidationOptions) -> Result<String> {
        if options.output_path.as_os_str().is_empty() {
            return Err(ConsolidateError::Validation("output_path is required".to_string()));
        }
        let project = self.open_project(path).await?;
        if let Some(unknown) = options
            .sequences
            .iter()
            .find(|id| project.graph.sequence(id).is_none())
        {
            return Err(ConsolidateError::UnknownSequence(unknown.clone()));
        }

        let handle = self.registry.create().await;
        let job_id = handle.job_id.clone();
        info!("🚀 Starting consolidation job {} for {}", job_id, path.display());

        let job = ConsolidationJob {
            project,
            options,
            config: self.config.clone(),
            encoder: self.encoder.clone(),
        };
        let JobHandle {
            job_id: _,
            publisher,
            cancel,
        } = handle;
        let publisher = Arc::new(publisher);
        let worker = tokio::spawn(job.run(job_id.clone(), Arc::clone(&publisher), cancel));
        tokio::spawn(supervise(job_id.clone(), worker, publisher));

        Ok(job_id)
    }

    pub async fn get_consolidation_progress(&self, job_id: &str) -> Result<ConsolidationProgress> {
        self.registry.progress(job_id).await
    }

    pub async fn cancel_consolidation(&self, job_id: &str) -> Result<()> {
        self.registry.cancel(job_id).await
    }

    /// Version line of the encoder, failing when it cannot be run.
    pub async fn check_ffmpeg(&self) -> Result<String> {
        self.encoder.version().await
    }

    pub async fn list_jobs(&self) -> Vec<String> {
        self.registry.list().await
    }

    pub fn validate_output_path(&self, path: &Path) -> bool {
        FileManager::validate_output_path(path)
    }

    pub fn format_file_size(&self, bytes: u64) -> String {
        FileManager::format_size(bytes)
    }
}

fn analyze(
    project: &Project,
    inventory: &MediaInventory,
    config: &Config,
    sequence_ids: &[String],
    handle_frames: u32,
    include_all_multicam: bool,
) -> Result<UsageResult> {
    SequenceAnalyzer::new(&project.graph, inventory)
        .with_handles(handle_frames)
        .include_all_multicam_angles(include_all_multicam)
        .with_merge_tolerance(config.merge_tolerance())
        .analyze(sequence_ids)
}

fn build_plan(
    project: &Project,
    inventory: &MediaInventory,
    config: &Config,
    options: &ConsolidationOptions,
) -> Result<OperationPlan> {
    let usage = analyze(
        project,
        inventory,
        config,
        &options.sequences,
        options.handle_frames,
        options.include_all_multicam_angles,
    )?;
    Ok(Planner::new(&project.graph, inventory, options)
        .with_default_preset(config.fallback_preset)
        .plan(&usage))
}

/// Name of the rewritten project inside the output root.
pub fn consolidated_file_name(project_path: &Path) -> String {
    let stem = project_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let ext = project_path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "prproj".to_string());
    format!("{}_consolidated.{}", stem, ext)
}

/// Wait for a job driver and fail the job if the driver task died.
async fn supervise(job_id: String, worker: JoinHandle<()>, publisher: Arc<ProgressPublisher>) {
    let Err(e) = worker.await else { return };
    error!("❌ Job {} driver stopped: {}", job_id, e);
    publisher.error(ProcessingError {
        file_path: String::new(),
        error_message: format!("job driver stopped: {}", e),
        is_fatal: true,
    });
    publisher.transition(ConsolidationStatus::Failed);
}

/// Everything a background job owns
struct ConsolidationJob<E: MediaEncoder> {
    project: Arc<Project>,
    options: ConsolidationOptions,
    config: Config,
    encoder: Arc<E>,
}

impl<E: MediaEncoder> ConsolidationJob<E> {
    async fn run(self, job_id: String, publisher: Arc<ProgressPublisher>, cancel: CancellationFlag) {
        match self.drive(&job_id, &publisher, &cancel).await {
            Ok(status) => {
                publisher.transition(status);
                info!("🏁 Job {} finished: {}", job_id, status);
            }
            Err(e) => {
                error!("❌ Job {} failed: {}", job_id, e);
                if !publisher.snapshot().errors.iter().any(|err| err.is_fatal) {
                    publisher.error(ProcessingError {
                        file_path: self.project.path.display().to_string(),
                        error_message: e.to_string(),
                        is_fatal: true,
                    });
                }
                publisher.transition(ConsolidationStatus::Failed);
            }
        }
    }

    /// Run the phases and return the terminal status to publish.
    async fn drive(
        &self,
        job_id: &str,
        publisher: &ProgressPublisher,
        cancel: &CancellationFlag,
    ) -> Result<ConsolidationStatus> {
        if cancel.is_cancelled() {
            return Ok(ConsolidationStatus::Cancelled);
        }
        publisher.transition(ConsolidationStatus::Analyzing);
        publisher.update(|p| p.current_operation = Some("Analyzing media usage".to_string()));

        let graph = self.project.graph.clone();
        let inventory = tokio::task::spawn_blocking(move || MediaInventory::build(&graph))
            .await
            .map_err(|e| ConsolidateError::Validation(format!("inventory task failed: {}", e)))?;
        let offline = inventory.offline_count();
        if offline > 0 {
            warn!("⚠️ {} of {} media are offline", offline, inventory.items().len());
        }
        let usage = analyze(
            &self.project,
            &inventory,
            &self.config,
            &self.options.sequences,
            self.options.handle_frames,
            self.options.include_all_multicam_angles,
        )?;
        for warning in &usage.warnings {
            publisher.warn(warning.clone());
        }
        let plan = Planner::new(&self.project.graph, &inventory, &self.options)
            .with_default_preset(self.config.fallback_preset)
            .plan(&usage);
        for note in &plan.notes {
            publisher.warn(note.clone());
        }
        info!(
            "📋 Planned {} outputs for {} used media ({} estimated)",
            plan.entries.len(),
            usage.used_count,
            FileManager::format_size(plan.estimated_bytes())
        );

        if cancel.is_cancelled() {
            return Ok(ConsolidationStatus::Cancelled);
        }
        publisher.transition(ConsolidationStatus::Processing);
        let executor = Executor::new(self.encoder.clone(), &self.config);
        let report = executor.execute(&plan, &self.options, publisher, cancel).await?;
        if report.cancelled || cancel.is_cancelled() {
            return Ok(ConsolidationStatus::Cancelled);
        }

        publisher.transition(ConsolidationStatus::WritingProject);
        publisher.update(|p| {
            p.current_file = Some(self.project.file_name());
            p.current_operation = Some("Writing project".to_string());
        });

        let rewritten = rewrite_project(&self.project.xml, &self.project.graph, &plan, &report.outcomes)?;
        for warning in &rewritten.warnings {
            publisher.warn(warning.clone());
        }

        let project_path = plan.output_root.join(consolidated_file_name(&self.project.path));
        let compressed = document::compress(&rewritten.xml)
            .map_err(|e| ConsolidateError::output_write(&project_path, e))?;
        tokio::fs::write(&project_path, compressed)
            .await
            .map_err(|e| ConsolidateError::output_write(&project_path, e))?;
        info!("💾 Wrote {}", project_path.display());

        let warnings = publisher.snapshot().warnings;
        let manifest = ConsolidationManifest {
            job_id,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            source_project: &self.project.path,
            source_sha256: &self.project.sha256,
            consolidated_project: &project_path,
            options: &self.options,
            entries: plan
                .entries
                .iter()
                .zip(&report.outcomes)
                .map(|(entry, result)| ManifestEntry { entry, result })
                .collect(),
            warnings: &warnings,
        };
        let manifest_path = plan.output_root.join(MANIFEST_FILE);
        tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
            .await
            .map_err(|e| ConsolidateError::output_write(&manifest_path, e))?;
        debug!("Wrote manifest {}", manifest_path.display());

        Ok(ConsolidationStatus::Completed)
    }
}
