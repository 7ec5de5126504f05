//! # Project Consolidator Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione del motore e validazione
//! - `error`: Tassonomia degli errori
//! - `ticks`: Unità di tempo dei documenti di progetto
//! - `options`: Opzioni di un consolidamento
//! - `project`: Apertura, parsing e grafo del progetto
//! - `inventory`: Stato su disco dei media referenziati
//! - `analyzer`: Intervalli usati da ogni media sulle timeline
//! - `interval`: Aritmetica degli intervalli
//! - `planner`: Piano dei file da produrre
//! - `encoder`: Driver di ffmpeg / ffprobe
//! - `executor`: Esecuzione concorrente del piano
//! - `rewriter`: Riscrittura del documento di progetto
//! - `job`: Stato, avanzamento e registro dei job
//! - `engine`: Operazioni esterne
//! - `file_manager`: Operazioni sui file e sidecar
//! - `tool_resolver`: Ricerca degli eseguibili esterni
//! - `progress`: Progress bar e riepilogo da terminale
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use project_consolidator::{Config, ConsolidationEngine, ConsolidationOptions};
//! # async fn run() -> project_consolidator::Result<()> {
//! let engine = ConsolidationEngine::new(Config::default());
//! let options = ConsolidationOptions {
//!     output_path: "/archive/edit".into(),
//!     ..Default::default()
//! };
//! let job_id = engine.start_consolidation("Edit.prproj".as_ref(), options).await?;
//! let progress = engine.get_consolidation_progress(&job_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod executor;
pub mod file_manager;
pub mod interval;
pub mod inventory;
pub mod job;
pub mod options;
pub mod planner;
pub mod progress;
pub mod project;
pub mod rewriter;
pub mod ticks;
pub mod tool_resolver;

#[cfg(test)]
mod test_support;

pub use config::{Config, TrimFallback};
pub use engine::{ConsolidationEngine, MediaItemInfo, ProjectInfo, SequenceInfo, UsageReport};
pub use error::{ConsolidateError, Result};
pub use job::{ConsolidationProgress, ConsolidationStatus, ProcessingError};
pub use options::{
    ConsolidationOptions, FolderStructure, OptimizationMode, ProcessingMode, ProxyMode,
    TranscodePreset,
};
pub use project::Project;
