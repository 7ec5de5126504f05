//! # File Management Module
//!
//! Operazioni sul filesystem usate da inventario, planner ed executor.
//!
//! ## Responsabilità:
//! - Dimensione e presenza dei file (media online/offline)
//! - Discovery dei file sidecar accanto ai media (XMP, audio RED, sidecar BRAW)
//! - Verifica che la directory di output sia scrivibile
//! - Antenato comune di un insieme di path (struttura cartelle `original`)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Sidecar riconosciuti:
//! - `<nome>.xmp` per qualsiasi media
//! - `.r3d`: file `.wav` nella stessa cartella il cui nome inizia con quello del clip
//! - `.braw`: `<nome>.sidecar`

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem helpers
pub struct FileManager;

impl FileManager {
    /// Size of a file, or `None` when it does not exist.
    pub fn file_size(path: &Path) -> Option<u64> {
        std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// Companion files of a media file that exist on disk.
    pub fn get_sidecar_files(media_path: &Path) -> Vec<PathBuf> {
        let (Some(parent), Some(stem)) = (media_path.parent(), media_path.file_stem()) else {
            return Vec::new();
        };
        let stem = stem.to_string_lossy().to_string();
        let ext = media_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut sidecars = BTreeSet::new();

        let xmp = parent.join(format!("{}.xmp", stem));
        if xmp.is_file() {
            sidecars.insert(xmp);
        }

        match ext.as_str() {
            "r3d" => {
                for entry in WalkDir::new(parent)
                    .min_depth(1)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    let path = entry.path();
                    let is_wav = path
                        .extension()
                        .map(|e| e.eq_ignore_ascii_case("wav"))
                        .unwrap_or(false);
                    let matches_stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().starts_with(&stem))
                        .unwrap_or(false);
                    if is_wav && matches_stem {
                        sidecars.insert(path.to_path_buf());
                    }
                }
            }
            "braw" => {
                let sidecar = parent.join(format!("{}.sidecar", stem));
                if sidecar.is_file() {
                    sidecars.insert(sidecar);
                }
            }
            _ => {}
        }

        sidecars.into_iter().collect()
    }

    /// Whether `path` (or, if missing, its parent) accepts new files.
    pub fn validate_output_path(path: &Path) -> bool {
        let target = if path.exists() {
            if !path.is_dir() {
                return false;
            }
            path
        } else {
            match path.parent() {
                Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
                Some(parent) if parent.is_dir() => parent,
                _ => return false,
            }
        };

        tempfile::NamedTempFile::new_in(target).is_ok()
    }

    /// Deepest directory containing every path.
    pub fn find_common_ancestor(paths: &[PathBuf]) -> Option<PathBuf> {
        let mut iter = paths.iter();
        let first = iter.next()?;
        let mut common: Vec<Component> = first
            .parent()
            .unwrap_or(first.as_path())
            .components()
            .collect();

        for path in iter {
            let dir = path.parent().unwrap_or(path.as_path());
            let matching = common
                .iter()
                .zip(dir.components())
                .take_while(|(a, b)| *a == b)
                .count();
            common.truncate(matching);
        }

        if common.is_empty() {
            None
        } else {
            Some(common.iter().collect())
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Make a string safe to use as a file name on every platform.
    pub fn sanitize_file_name(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let trimmed = cleaned.trim().trim_matches('.');
        if trimmed.is_empty() {
            "untitled".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Make a relative path from any directory components, dropping roots and prefixes.
    pub fn relative_components(path: &Path) -> PathBuf {
        path.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect()
    }
}
