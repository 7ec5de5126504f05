//! # Error Types Module
//!
//! Tipi di errore del motore di consolidamento.
//!
//! ## Categorie di errori:
//! - `CorruptArchive` / `MalformedDocument`: il file di progetto non si apre
//! - `CycleDetected`: una sequenza contiene se stessa (anche indirettamente)
//! - `OfflineMedia`, `UnsupportedCodecForLosslessTrim`, `Encoder`: errori per singolo file
//! - `OutputWrite`: la destinazione non è scrivibile (sempre fatale)
//! - `JobNotFound`: id di job sconosciuto o già rimosso dal registro
//!
//! I riferimenti non risolti (`DanglingReference`) non sono errori: vengono
//! raccolti nel grafo come warning, vedi [`crate::project::graph`].

use std::path::PathBuf;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ConsolidateError>;

/// Errors raised by the consolidation engine
#[derive(thiserror::Error, Debug)]
pub enum ConsolidateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt project archive: {0}")]
    CorruptArchive(String),

    #[error("Malformed project document: {0}")]
    MalformedDocument(String),

    #[error("Sequence cycle detected: {}", .chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    #[error("Unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("Media offline: {}", .0.display())]
    OfflineMedia(PathBuf),

    #[error("Codec '{codec}' of {} cannot be trimmed without re-encoding", .path.display())]
    UnsupportedCodecForLosslessTrim { path: PathBuf, codec: String },

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Cannot write {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),
}

impl ConsolidateError {
    /// Wrap an I/O failure on a destination path.
    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// Whether this failure must abort the whole job instead of a single item.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::OutputWrite { .. } | Self::MissingDependency(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}
