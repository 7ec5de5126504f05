//! Arena representation of a parsed project.
//!
//! Nodes live in a `Vec` in document order and are looked up by identifier.
//! Sequences may nest each other, so nodes never own each other: every link
//! is an identifier resolved through the arena.

use crate::ticks::{FrameRate, Ticks};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Declared kind of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Raw,
    Graphics,
    Unknown,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp4" | "mov" | "avi" | "mxf" | "mkv" | "wmv" | "m4v" | "webm" | "mts" | "m2ts" => {
                Self::Video
            }
            "wav" | "mp3" | "aac" | "aif" | "aiff" | "flac" | "ogg" | "m4a" => Self::Audio,
            "jpg" | "jpeg" | "png" | "tiff" | "tif" | "bmp" | "gif" | "psd" | "exr" | "dpx" => {
                Self::Image
            }
            "r3d" | "braw" | "ari" | "arx" => Self::Raw,
            "mogrt" | "aep" | "aegraphic" => Self::Graphics,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or(Self::Unknown)
    }

    /// Parse a kind declared in the document metadata.
    pub fn from_declared(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "image" | "still" => Some(Self::Image),
            "raw" | "red" | "braw" => Some(Self::Raw),
            "graphics" => Some(Self::Graphics),
            _ => None,
        }
    }

    /// Kinds whose content has a timeline that can be cut.
    pub fn is_time_based(&self) -> bool {
        matches!(self, Self::Video | Self::Audio | Self::Unknown)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Raw => "raw",
            Self::Graphics => "graphics",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub frame_rate: FrameRate,
    pub duration: Ticks,
    /// Video tracks first, then audio tracks, each in declaration order
    pub tracks: Vec<String>,
    pub bin_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    pub sequence_id: Option<String>,
    pub clips: Vec<String>,
}

/// What a timeline clip plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSource {
    Media(String),
    Nested(String),
    Multicam {
        source_id: String,
        selected_angle: usize,
    },
    /// Nothing, or a reference that did not resolve
    Unlinked,
}

#[derive(Debug, Clone)]
pub struct Clip {
    pub id: String,
    pub track_id: Option<String>,
    /// Position on the sequence timeline
    pub start: Ticks,
    pub end: Ticks,
    /// Range read from the source
    pub source_in: Ticks,
    pub source_out: Ticks,
    pub source: ClipSource,
    /// Object holding `InPoint` / `OutPoint`; the clip itself unless reached through a chain
    pub timing_id: String,
    /// Object holding the reference to the media or nested sequence
    pub link_id: String,
}

#[derive(Debug, Clone)]
pub struct MulticamAngle {
    pub media_id: String,
    /// Added to the clip's source time to get the angle's media time
    pub offset: Ticks,
}

#[derive(Debug, Clone)]
pub struct MulticamSource {
    pub id: String,
    pub angles: Vec<MulticamAngle>,
}

#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: String,
    pub path: PathBuf,
    pub title: Option<String>,
    pub declared_kind: Option<MediaKind>,
    pub duration: Option<Ticks>,
    pub frame_rate: Option<FrameRate>,
    pub codec: Option<String>,
    pub declared_size: Option<u64>,
    pub proxy_id: Option<String>,
    pub sidecars: Vec<PathBuf>,
}

impl MediaItem {
    pub fn kind(&self) -> MediaKind {
        self.declared_kind
            .unwrap_or_else(|| MediaKind::from_path(&self.path))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Bin {
    pub id: String,
    pub name: Option<String>,
    pub parent_id: Option<String>,
}

/// A master clip in the project panel
#[derive(Debug, Clone)]
pub struct ProjectItem {
    pub id: String,
    pub name: String,
    pub media_id: Option<String>,
    pub bin_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Sequence(Sequence),
    Track(Track),
    Clip(Clip),
    Media(MediaItem),
    Multicam(MulticamSource),
    Bin(Bin),
    ProjectItem(ProjectItem),
    Other { id: String, tag: String },
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Sequence(n) => &n.id,
            Node::Track(n) => &n.id,
            Node::Clip(n) => &n.id,
            Node::Media(n) => &n.id,
            Node::Multicam(n) => &n.id,
            Node::Bin(n) => &n.id,
            Node::ProjectItem(n) => &n.id,
            Node::Other { id, .. } => id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Sequence(_) => "sequence",
            Node::Track(_) => "track",
            Node::Clip(_) => "clip",
            Node::Media(_) => "media",
            Node::Multicam(_) => "multicam source",
            Node::Bin(_) => "bin",
            Node::ProjectItem(_) => "project item",
            Node::Other { .. } => "object",
        }
    }
}

/// A reference that could not be resolved to a node of the expected kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    /// Object holding the reference, or `document` at top level
    pub from: String,
    /// Tag of the reference element
    pub field: String,
    pub target: String,
    pub reason: String,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} ({}): {}",
            self.from, self.target, self.field, self.reason
        )
    }
}

/// Immutable object graph of one project
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    pub name: String,
    pub version: Option<String>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    unresolved: Vec<DanglingReference>,
}

impl ProjectGraph {
    pub(crate) fn new(name: String, version: Option<String>) -> Self {
        Self {
            name,
            version,
            ..Default::default()
        }
    }

    pub(crate) fn push(&mut self, node: Node) {
        self.index.insert(node.id().to_string(), self.nodes.len());
        self.nodes.push(node);
    }

    pub(crate) fn record_unresolved(&mut self, reference: DanglingReference) {
        self.unresolved.push(reference);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn unresolved(&self) -> &[DanglingReference] {
        &self.unresolved
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Sequence(s) => Some(s),
            _ => None,
        })
    }

    pub fn media_items(&self) -> impl Iterator<Item = &MediaItem> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Media(m) => Some(m),
            _ => None,
        })
    }

    pub fn bins(&self) -> impl Iterator<Item = &Bin> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Bin(b) => Some(b),
            _ => None,
        })
    }

    pub fn project_items(&self) -> impl Iterator<Item = &ProjectItem> {
        self.nodes.iter().filter_map(|n| match n {
            Node::ProjectItem(p) => Some(p),
            _ => None,
        })
    }

    pub fn sequence(&self, id: &str) -> Option<&Sequence> {
        match self.get(id)? {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        match self.get(id)? {
            Node::Track(t) => Some(t),
            _ => None,
        }
    }

    pub fn clip(&self, id: &str) -> Option<&Clip> {
        match self.get(id)? {
            Node::Clip(c) => Some(c),
            _ => None,
        }
    }

    pub fn media(&self, id: &str) -> Option<&MediaItem> {
        match self.get(id)? {
            Node::Media(m) => Some(m),
            _ => None,
        }
    }

    pub fn multicam(&self, id: &str) -> Option<&MulticamSource> {
        match self.get(id)? {
            Node::Multicam(m) => Some(m),
            _ => None,
        }
    }

    pub fn bin(&self, id: &str) -> Option<&Bin> {
        match self.get(id)? {
            Node::Bin(b) => Some(b),
            _ => None,
        }
    }

    /// Tracks of a sequence, skipping ids that are not tracks.
    pub fn tracks_of<'g>(&'g self, sequence: &'g Sequence) -> impl Iterator<Item = &'g Track> {
        sequence.tracks.iter().filter_map(|id| self.track(id))
    }

    /// Every clip of a sequence, track by track.
    pub fn clips_of<'g>(&'g self, sequence: &'g Sequence) -> impl Iterator<Item = &'g Clip> {
        self.tracks_of(sequence)
            .flat_map(move |track| track.clips.iter().filter_map(|id| self.clip(id)))
    }

    /// Distinct sequences nested directly inside `sequence`.
    pub fn nested_sequences(&self, sequence: &Sequence) -> Vec<String> {
        let mut seen = HashSet::new();
        self.clips_of(sequence)
            .filter_map(|clip| match &clip.source {
                ClipSource::Nested(id) if seen.insert(id.clone()) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// "Parent/Child" path of a bin; the unnamed root bin is left out.
    pub fn bin_path(&self, bin_id: &str) -> String {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(bin_id.to_string());

        while let Some(id) = current {
            if !visited.insert(id.clone()) {
                break;
            }
            let Some(bin) = self.bin(&id) else { break };
            if let Some(name) = bin.name.as_deref().filter(|n| !n.is_empty()) {
                names.push(name.to_string());
            }
            current = bin.parent_id.clone();
        }

        names.reverse();
        names.join("/")
    }

    /// First project item (master clip) pointing at a media item.
    pub fn project_item_for_media(&self, media_id: &str) -> Option<&ProjectItem> {
        self.project_items()
            .find(|item| item.media_id.as_deref() == Some(media_id))
    }

    /// Bin path of the master clip owning a media item.
    pub fn media_bin_path(&self, media_id: &str) -> String {
        self.project_item_for_media(media_id)
            .and_then(|item| item.bin_id.as_deref())
            .map(|bin| self.bin_path(bin))
            .unwrap_or_default()
    }

    /// Media items acting as the proxy of some other media item.
    pub fn proxy_ids(&self) -> HashSet<&str> {
        self.media_items()
            .filter_map(|m| m.proxy_id.as_deref())
            .collect()
    }
}
