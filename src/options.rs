//! # Consolidation Options
//!
//! Le opzioni scelte dall'utente per un singolo consolidamento.
//!
//! ## Responsabilità:
//! - Definisce `ConsolidationOptions` e le enum chiuse dei vari modi
//! - Nomi serde identici a quelli usati dal chiamante (`trim`, `keep_files`, `proxy_only`, ...)
//! - Valori di default per ogni campo, così un JSON parziale è sempre valido

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What happens to each planned output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Stream copy of the used range only
    #[default]
    Trim,
    /// Re-encode the used range with a preset
    Transcode,
    /// Duplicate the whole file
    Copy,
    /// Keep the media where it is, only the project is rewritten
    NoProcess,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trim => write!(f, "trim"),
            Self::Transcode => write!(f, "transcode"),
            Self::Copy => write!(f, "copy"),
            Self::NoProcess => write!(f, "no_process"),
        }
    }
}

/// Encoder presets available for transcoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscodePreset {
    #[serde(rename = "prores422lt")]
    ProRes422Lt,
    #[default]
    #[serde(rename = "prores422")]
    ProRes422,
    #[serde(rename = "prores422hq")]
    ProRes422Hq,
    #[serde(rename = "prores4444")]
    ProRes4444,
    Dnxhd,
    Dnxhr,
    H264Medium,
    H264High,
    H265Medium,
    H265High,
}

impl TranscodePreset {
    /// Container extension of the files produced by this preset.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::ProRes422Lt
            | Self::ProRes422
            | Self::ProRes422Hq
            | Self::ProRes4444
            | Self::Dnxhd
            | Self::Dnxhr => "mov",
            Self::H264Medium | Self::H264High | Self::H265Medium | Self::H265High => "mp4",
        }
    }
}

impl fmt::Display for TranscodePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProRes422Lt => "ProRes 422 LT",
            Self::ProRes422 => "ProRes 422",
            Self::ProRes422Hq => "ProRes 422 HQ",
            Self::ProRes4444 => "ProRes 4444",
            Self::Dnxhd => "DNxHD",
            Self::Dnxhr => "DNxHR HQ",
            Self::H264Medium => "H.264 Medium",
            Self::H264High => "H.264 High",
            Self::H265Medium => "H.265 Medium",
            Self::H265High => "H.265 High",
        };
        f.write_str(name)
    }
}

/// How usage intervals become output files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    /// One file per source media, bounding all used ranges
    #[default]
    KeepFiles,
    /// One file per merged interval
    Minimize,
    /// One file per timeline clip
    UniqueClips,
}

/// Directory layout of the consolidated media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FolderStructure {
    #[default]
    Flat,
    Bins,
    Original,
}

/// Which of main and proxy media get consolidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    #[default]
    Both,
    ProxyOnly,
    MainOnly,
    Preserve,
}

/// Options of a single consolidation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationOptions {
    /// Root directory receiving media, proxies, project and manifest
    pub output_path: PathBuf,
    /// Sequences to consolidate; empty means every sequence
    pub sequences: Vec<String>,
    pub processing_mode: ProcessingMode,
    /// Preset for `transcode`, also used when a trim falls back to transcoding
    pub transcode_preset: Option<TranscodePreset>,
    pub optimization_mode: OptimizationMode,
    pub folder_structure: FolderStructure,
    pub proxy_mode: ProxyMode,
    /// Extra frames kept before and after every used range
    pub handle_frames: u32,
    pub include_all_multicam_angles: bool,
    pub generate_unique_filenames: bool,
    pub use_project_item_names: bool,
    pub add_frame_range_to_filename: bool,
    pub copy_sidecar_files: bool,
    pub skip_offline_media: bool,
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            sequences: Vec::new(),
            processing_mode: ProcessingMode::default(),
            transcode_preset: None,
            optimization_mode: OptimizationMode::default(),
            folder_structure: FolderStructure::default(),
            proxy_mode: ProxyMode::default(),
            handle_frames: 0,
            include_all_multicam_angles: false,
            generate_unique_filenames: true,
            use_project_item_names: false,
            add_frame_range_to_filename: false,
            copy_sidecar_files: true,
            skip_offline_media: true,
        }
    }
}
