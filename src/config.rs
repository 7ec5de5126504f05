//! # Configuration Management Module
//!
//! Configurazione del motore, separata dalle opzioni di un singolo job.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri del motore
//! - Fornisce validazione dei parametri
//! - Supporta caricamento/salvataggio da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `workers`: operazioni su file in parallelo per job (default: 2)
//! - `trim_fallback`: cosa fare quando un codec non permette il trim lossless (default: transcode)
//! - `fallback_preset`: preset usato dal fallback se il job non ne indica uno
//! - `encoder_timeout_secs`: limite per singola invocazione di ffmpeg (default: nessuno)
//! - `ffmpeg_path` / `ffprobe_path`: percorsi espliciti dei tool esterni
//! - `job_retention_secs` / `observed_job_grace_secs`: vita dei job terminati nel registro
//! - `merge_tolerance_ms`: distanza massima tra due intervalli che vengono fusi
//!
//! ## Esempio:
//! ```rust
//! # use project_consolidator::{Config, TrimFallback};
//! # fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     workers: 4,
//!     trim_fallback: TrimFallback::Error,
//!     ..Default::default()
//! };
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::options::TranscodePreset;
use crate::ticks::{Ticks, TICKS_PER_SECOND};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Policy for media whose codec cannot be stream-copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrimFallback {
    /// Warn and transcode the range instead
    #[default]
    Transcode,
    /// Report an item-level error and skip the file
    Error,
}

/// Configuration for the consolidation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of parallel file operations per job
    pub workers: usize,
    /// Behaviour when lossless trim is not possible
    pub trim_fallback: TrimFallback,
    /// Preset for fallback transcodes when the job has none
    pub fallback_preset: TranscodePreset,
    /// Per-invocation encoder timeout in seconds (None = unlimited)
    pub encoder_timeout_secs: Option<u64>,
    /// Explicit ffmpeg binary
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary
    pub ffprobe_path: Option<PathBuf>,
    /// Seconds a terminal job stays in the registry
    pub job_retention_secs: u64,
    /// Seconds a terminal job stays after its final status was read
    pub observed_job_grace_secs: u64,
    /// Gap (milliseconds) under which usage intervals are merged
    pub merge_tolerance_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 2,
            trim_fallback: TrimFallback::default(),
            fallback_preset: TranscodePreset::default(),
            encoder_timeout_secs: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            job_retention_secs: 600,
            observed_job_grace_secs: 30,
            merge_tolerance_ms: 1,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.encoder_timeout_secs == Some(0) {
            return Err(anyhow::anyhow!("Encoder timeout must be greater than 0 seconds"));
        }

        if self.observed_job_grace_secs > self.job_retention_secs {
            return Err(anyhow::anyhow!(
                "Observed job grace ({}s) cannot exceed job retention ({}s)",
                self.observed_job_grace_secs,
                self.job_retention_secs
            ));
        }

        for (name, path) in [("ffmpeg", &self.ffmpeg_path), ("ffprobe", &self.ffprobe_path)] {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(anyhow::anyhow!("{} path is not a file: {}", name, path.display()));
                }
            }
        }

        Ok(())
    }

    pub fn encoder_timeout(&self) -> Option<Duration> {
        self.encoder_timeout_secs.map(Duration::from_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn observed_job_grace(&self) -> Duration {
        Duration::from_secs(self.observed_job_grace_secs)
    }

    pub fn merge_tolerance(&self) -> Ticks {
        Ticks::try_from(self.merge_tolerance_ms)
            .unwrap_or(Ticks::MAX)
            .saturating_mul(TICKS_PER_SECOND / 1000)
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("project-consolidator").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
