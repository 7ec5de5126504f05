//! # Project Module
//!
//! Apertura dei file di progetto e rappresentazione in memoria.
//!
//! ## Responsabilità:
//! - `document`: involucro gzip e utilità XML condivise con il rewriter
//! - `graph`: arena di nodi tipizzati indicizzati per identificatore
//! - `parser`: costruzione del grafo con risoluzione dei riferimenti in due passaggi
//!
//! Un [`Project`] viene creato una volta per richiesta di apertura e poi
//! usato solo in lettura.

pub mod document;
pub mod graph;
pub mod parser;

pub use graph::{
    Bin, Clip, ClipSource, DanglingReference, MediaItem, MediaKind, MulticamAngle,
    MulticamSource, Node, ProjectGraph, ProjectItem, Sequence, Track, TrackKind,
};

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

/// A parsed project together with the document it came from
#[derive(Debug, Clone)]
pub struct Project {
    pub path: PathBuf,
    pub graph: ProjectGraph,
    /// Decompressed XML, kept for the rewriter
    pub xml: String,
    /// SHA-256 of the file as read from disk
    pub sha256: String,
    pub modified: Option<SystemTime>,
}

impl Project {
    /// Read and parse a project file
    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok());
        let mut project = Self::from_bytes(path, &bytes)?;
        project.modified = modified;
        info!(
            "📂 Opened project {} ({} sequences, {} media)",
            path.display(),
            project.graph.sequences().count(),
            project.graph.media_items().count()
        );
        Ok(project)
    }

    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let name = parser::project_name(path);
        let (graph, xml) = parser::parse_project_bytes(bytes, &name)?;
        Ok(Self {
            path: path.to_path_buf(),
            graph,
            xml,
            sha256: hex::encode(Sha256::digest(bytes)),
            modified: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.graph.name
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.prproj", self.name()))
    }
}
