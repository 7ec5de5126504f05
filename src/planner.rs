//! # Interval Optimizer / Operation Planner
//!
//! Trasforma il risultato dell'analisi in un piano di operazioni sui file.
//!
//! ## Responsabilità:
//! - Sceglie quanti file di output produrre per media (`keep_files`, `minimize`, `unique_clips`)
//! - Decide l'azione per ogni output (trim, transcode, copy, no_process)
//! - Gestisce i proxy secondo `proxy_mode`
//! - Calcola i percorsi di destinazione (layout cartelle e politiche sui nomi)
//! - Stima i byte che verranno scritti
//!
//! ## Layout di output:
//! ```text
//! <output>/Media/...   media principali
//! <output>/Proxy/...   proxy
//! ```
//!
//! Il piano è puro: non tocca il filesystem se non per controllare
//! l'esistenza dei nomi di destinazione.

use crate::analyzer::{MediaUsage, UsageResult};
use crate::encoder::supports_stream_copy;
use crate::file_manager::FileManager;
use crate::interval::{bounding, merge_intervals, Interval};
use crate::inventory::{InventoryItem, MediaInventory};
use crate::options::{
    ConsolidationOptions, FolderStructure, OptimizationMode, ProcessingMode, ProxyMode,
    TranscodePreset,
};
use crate::project::ProjectGraph;
use crate::ticks::{FrameRate, Ticks};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MEDIA_DIR: &str = "Media";
pub const PROXY_DIR: &str = "Proxy";

/// File operation for one planned output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "preset")]
pub enum PlanAction {
    Trim,
    Transcode(TranscodePreset),
    Copy,
    NoProcess,
}

impl PlanAction {
    /// Whether the output covers only a time range of the source.
    pub fn is_time_bounded(&self) -> bool {
        matches!(self, Self::Trim | Self::Transcode(_))
    }
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trim => write!(f, "trim"),
            Self::Transcode(preset) => write!(f, "transcode ({})", preset),
            Self::Copy => write!(f, "copy"),
            Self::NoProcess => write!(f, "no_process"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    Main,
    Proxy,
}

/// One output file of the plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Media object whose path is rewritten to `destination`
    pub media_id: String,
    /// Main media this entry belongs to (equal to `media_id` for main entries)
    pub owner_id: String,
    pub role: EntryRole,
    /// Position among the outputs of the same media; 0 reuses the original object
    pub fragment: usize,
    pub fragment_count: usize,
    pub source_path: PathBuf,
    pub destination: PathBuf,
    /// Reserved name for a trim that has to fall back to a transcode with another container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_destination: Option<PathBuf>,
    pub action: PlanAction,
    /// Realized range of the output; `None` means the whole file
    pub span: Option<Interval>,
    /// Merged usage intervals covered by this output
    pub intervals: Vec<Interval>,
    /// Clips served by this output
    pub clip_ids: Vec<String>,
    pub multicam: bool,
    pub codec: Option<String>,
    pub is_online: bool,
    pub source_size: u64,
    pub source_duration: Option<Ticks>,
    /// Companion files copied next to the output
    pub sidecars: Vec<PathBuf>,
    pub sidecar_bytes: u64,
    pub estimated_bytes: u64,
}

impl PlanEntry {
    /// Source time that becomes time zero in the output.
    pub fn zero_point(&self) -> Ticks {
        match (self.action.is_time_bounded(), self.span) {
            (true, Some(span)) => span.start,
            _ => 0,
        }
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.media_id.clone())
    }

    pub fn writes_file(&self) -> bool {
        self.action != PlanAction::NoProcess
    }
}

/// Ordered list of output files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationPlan {
    pub output_root: PathBuf,
    pub entries: Vec<PlanEntry>,
    /// Decisions worth reporting as job warnings
    pub notes: Vec<String>,
}

impl OperationPlan {
    pub fn estimated_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.estimated_bytes).sum()
    }
}

struct Fragment {
    span: Option<Interval>,
    intervals: Vec<Interval>,
    clip_ids: Vec<String>,
}

/// Builds an [`OperationPlan`] from usage
pub struct Planner<'a> {
    graph: &'a ProjectGraph,
    inventory: &'a MediaInventory,
    options: &'a ConsolidationOptions,
    default_preset: TranscodePreset,
}

impl<'a> Planner<'a> {
    pub fn new(
        graph: &'a ProjectGraph,
        inventory: &'a MediaInventory,
        options: &'a ConsolidationOptions,
    ) -> Self {
        Self {
            graph,
            inventory,
            options,
            default_preset: TranscodePreset::default(),
        }
    }

    /// Preset used by `transcode` when the options leave it open.
    pub fn with_default_preset(mut self, preset: TranscodePreset) -> Self {
        self.default_preset = preset;
        self
    }

    pub fn plan(&self, usage: &UsageResult) -> OperationPlan {
        let mut plan = OperationPlan {
            output_root: self.options.output_path.clone(),
            ..Default::default()
        };

        let mut drafts = Vec::new();
        // Proxies in first-use order, each with every main media it serves.
        let mut proxies: Vec<(&InventoryItem, Vec<(&InventoryItem, &MediaUsage)>)> = Vec::new();
        for media_usage in &usage.used {
            let Some(main) = self.inventory.get(&media_usage.media_id) else {
                continue;
            };
            self.plan_media(main, media_usage, &mut drafts, &mut plan.notes);

            if let Some(proxy) = self.inventory.proxy_of(&main.object_id) {
                match proxies.iter_mut().find(|(p, _)| p.object_id == proxy.object_id) {
                    Some((_, owners)) => owners.push((main, media_usage)),
                    None => proxies.push((proxy, vec![(main, media_usage)])),
                }
            }
        }
        for (proxy, owners) in &proxies {
            self.plan_proxy(proxy, owners, &mut drafts, &mut plan.notes);
        }

        let ancestor = if self.options.folder_structure == FolderStructure::Original {
            let sources: Vec<PathBuf> = drafts.iter().map(|d| d.source_path.clone()).collect();
            FileManager::find_common_ancestor(&sources)
        } else {
            None
        };

        let mut taken = HashSet::new();
        for mut entry in drafts {
            if entry.writes_file() {
                entry.destination = self.destination(&entry, ancestor.as_deref(), &mut taken);
                entry.fallback_destination = self.fallback_destination(&entry, &mut taken);
            }
            entry.estimated_bytes = self.estimate(&entry);
            plan.entries.push(entry);
        }

        debug!(
            "Planned {} outputs, estimated {}",
            plan.entries.len(),
            FileManager::format_size(plan.estimated_bytes())
        );
        plan
    }

    fn plan_media(
        &self,
        main: &InventoryItem,
        usage: &MediaUsage,
        drafts: &mut Vec<PlanEntry>,
        notes: &mut Vec<String>,
    ) {
        let proxy = self.inventory.proxy_of(&main.object_id);

        let source = match (self.options.proxy_mode, proxy) {
            (ProxyMode::ProxyOnly, Some(proxy)) => proxy,
            _ => main,
        };
        let action = self.action_for(source, notes);
        let fragments = self.fragments(usage, action);
        let count = fragments.len();

        for (index, fragment) in fragments.iter().enumerate() {
            drafts.push(self.entry(main, source, EntryRole::Main, action, index, count, fragment, usage));
        }
    }

    /// Entries of one proxy file. A proxy shared by several main media is
    /// planned once, over the union of its owners' ranges.
    fn plan_proxy(
        &self,
        proxy: &InventoryItem,
        owners: &[(&InventoryItem, &MediaUsage)],
        drafts: &mut Vec<PlanEntry>,
        notes: &mut Vec<String>,
    ) {
        let Some(&(main, usage)) = owners.first() else {
            return;
        };

        match self.options.proxy_mode {
            ProxyMode::Both if owners.len() == 1 => {
                let action = self.action_for(proxy, notes);
                let fragments = self.fragments(usage, action);
                let count = fragments.len();
                for (index, fragment) in fragments.iter().enumerate() {
                    drafts.push(self.entry(main, proxy, EntryRole::Proxy, action, index, count, fragment, usage));
                }
            }
            ProxyMode::Both => {
                let action = self.action_for(proxy, notes);
                let all: Vec<Interval> = owners
                    .iter()
                    .flat_map(|(_, u)| u.intervals.iter().copied())
                    .collect();
                let intervals = merge_intervals(&all, 0);
                let shared = Fragment {
                    span: bounding(&intervals),
                    intervals,
                    clip_ids: Vec::new(),
                };
                notes.push(format!(
                    "Proxy {} is shared by {} media and is written once",
                    proxy.file_name,
                    owners.len()
                ));
                drafts.push(self.entry(main, proxy, EntryRole::Proxy, action, 0, 1, &shared, usage));
            }
            ProxyMode::Preserve => {
                let whole = Fragment {
                    span: None,
                    intervals: usage.intervals.clone(),
                    clip_ids: Vec::new(),
                };
                drafts.push(self.entry(main, proxy, EntryRole::Proxy, PlanAction::NoProcess, 0, 1, &whole, usage));
            }
            ProxyMode::ProxyOnly | ProxyMode::MainOnly => {}
        }
    }

    fn action_for(&self, item: &InventoryItem, notes: &mut Vec<String>) -> PlanAction {
        let action = match self.options.processing_mode {
            ProcessingMode::Trim => PlanAction::Trim,
            ProcessingMode::Transcode => {
                PlanAction::Transcode(self.options.transcode_preset.unwrap_or(self.default_preset))
            }
            ProcessingMode::Copy => PlanAction::Copy,
            ProcessingMode::NoProcess => PlanAction::NoProcess,
        };

        if action.is_time_bounded() && !item.media_type.is_time_based() {
            notes.push(format!(
                "{} is {} media and will be copied whole instead of {}",
                item.file_name, item.media_type, action
            ));
            return PlanAction::Copy;
        }
        action
    }

    fn fragments(&self, usage: &MediaUsage, action: PlanAction) -> Vec<Fragment> {
        let all_clips = || usage.clips.iter().map(|c| c.clip_id.clone()).collect::<Vec<_>>();

        if !action.is_time_bounded() {
            return vec![Fragment {
                span: None,
                intervals: usage.intervals.clone(),
                clip_ids: all_clips(),
            }];
        }

        let mode = if usage.is_multicam_angle() {
            OptimizationMode::KeepFiles
        } else {
            self.options.optimization_mode
        };

        match mode {
            OptimizationMode::KeepFiles => vec![Fragment {
                span: usage.time_range(),
                intervals: usage.intervals.clone(),
                clip_ids: all_clips(),
            }],
            OptimizationMode::Minimize => usage
                .intervals
                .iter()
                .map(|interval| Fragment {
                    span: Some(*interval),
                    intervals: vec![*interval],
                    clip_ids: usage
                        .clips
                        .iter()
                        .filter(|c| interval.contains(&c.interval))
                        .map(|c| c.clip_id.clone())
                        .collect(),
                })
                .collect(),
            OptimizationMode::UniqueClips => usage
                .clips
                .iter()
                .map(|c| Fragment {
                    span: Some(c.interval),
                    intervals: vec![c.interval],
                    clip_ids: vec![c.clip_id.clone()],
                })
                .collect(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn entry(
        &self,
        main: &InventoryItem,
        source: &InventoryItem,
        role: EntryRole,
        action: PlanAction,
        fragment: usize,
        fragment_count: usize,
        part: &Fragment,
        usage: &MediaUsage,
    ) -> PlanEntry {
        let media_id = match role {
            EntryRole::Main => main.object_id.clone(),
            EntryRole::Proxy => source.object_id.clone(),
        };
        let copy_sidecars =
            self.options.copy_sidecar_files && action != PlanAction::NoProcess && fragment == 0;
        let (sidecars, sidecar_bytes) = if copy_sidecars {
            (source.sidecar_files.clone(), source.sidecar_total_size)
        } else {
            (Vec::new(), 0)
        };

        PlanEntry {
            media_id,
            owner_id: main.object_id.clone(),
            role,
            fragment,
            fragment_count,
            source_path: source.file_path.clone(),
            destination: source.file_path.clone(),
            fallback_destination: None,
            action,
            span: if action.is_time_bounded() { part.span } else { None },
            intervals: part.intervals.clone(),
            clip_ids: part.clip_ids.clone(),
            multicam: usage.is_multicam_angle(),
            codec: source.codec.clone(),
            is_online: source.is_online,
            source_size: source.file_size,
            source_duration: source.duration,
            sidecars,
            sidecar_bytes,
            estimated_bytes: 0,
        }
    }

    fn destination(&self, entry: &PlanEntry, ancestor: Option<&Path>, taken: &mut HashSet<PathBuf>) -> PathBuf {
        let mut dir = self.options.output_path.join(match entry.role {
            EntryRole::Main => MEDIA_DIR,
            EntryRole::Proxy => PROXY_DIR,
        });

        match self.options.folder_structure {
            FolderStructure::Flat => {}
            FolderStructure::Bins => {
                for part in self.graph.media_bin_path(&entry.owner_id).split('/') {
                    if !part.is_empty() {
                        dir.push(FileManager::sanitize_file_name(part));
                    }
                }
            }
            FolderStructure::Original => {
                if let Some(parent) = entry.source_path.parent() {
                    let relative = ancestor
                        .and_then(|a| parent.strip_prefix(a).ok())
                        .unwrap_or(parent);
                    dir.push(FileManager::relative_components(relative));
                }
            }
        }

        let stem = self.base_name(entry);
        let extension = match entry.action {
            PlanAction::Transcode(preset) => Some(preset.extension().to_string()),
            _ => entry
                .source_path
                .extension()
                .map(|e| e.to_string_lossy().to_string()),
        };
        reserve(&dir, &stem, extension.as_deref(), self.options.generate_unique_filenames, taken)
    }

    /// Name for a trim whose codec may not allow stream copy, when the
    /// fallback preset writes another container than the planned name.
    fn fallback_destination(&self, entry: &PlanEntry, taken: &mut HashSet<PathBuf>) -> Option<PathBuf> {
        if entry.action != PlanAction::Trim || entry.codec.as_deref().map(supports_stream_copy).unwrap_or(false) {
            return None;
        }
        let ext = self.fallback_preset().extension();
        let same = entry
            .destination
            .extension()
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
        if same {
            return None;
        }

        let dir = entry.destination.parent()?;
        let stem = entry.destination.file_stem()?.to_string_lossy().to_string();
        // Another output of this plan must never land on the fallback file.
        Some(reserve(dir, &stem, Some(ext), true, taken))
    }

    /// Preset a trim falls back to: the job's preset, otherwise the default.
    fn fallback_preset(&self) -> TranscodePreset {
        self.options.transcode_preset.unwrap_or(self.default_preset)
    }

    fn base_name(&self, entry: &PlanEntry) -> String {
        let project_name = self
            .options
            .use_project_item_names
            .then(|| self.graph.project_item_for_media(&entry.owner_id))
            .flatten()
            .map(|item| FileManager::sanitize_file_name(&item.name));

        let mut name = project_name.unwrap_or_else(|| {
            entry
                .source_path
                .file_stem()
                .map(|s| FileManager::sanitize_file_name(&s.to_string_lossy()))
                .unwrap_or_else(|| FileManager::sanitize_file_name(&entry.media_id))
        });

        if entry.fragment_count > 1 {
            name.push_str(&format!("_{:03}", entry.fragment + 1));
        }

        if self.options.add_frame_range_to_filename {
            if let Some(span) = entry.span {
                let rate = self
                    .graph
                    .media(&entry.media_id)
                    .and_then(|m| m.frame_rate)
                    .unwrap_or(FrameRate::DEFAULT);
                let first = rate.ticks_to_frame(span.start);
                let last = (rate.ticks_to_frame(span.end) - 1).max(first);
                name.push_str(&format!("_{}-{}", first, last));
            }
        }

        name
    }

    fn estimate(&self, entry: &PlanEntry) -> u64 {
        if !entry.is_online && self.options.skip_offline_media {
            return 0;
        }

        match entry.action {
            PlanAction::NoProcess => 0,
            PlanAction::Copy => entry.source_size + entry.sidecar_bytes,
            PlanAction::Trim | PlanAction::Transcode(_) => {
                let body = match (entry.span, entry.source_duration) {
                    (Some(span), Some(duration)) if duration > 0 => {
                        let len = span.len().clamp(0, duration) as u128;
                        (entry.source_size as u128 * len / duration as u128) as u64
                    }
                    _ => entry.source_size,
                };
                body + entry.sidecar_bytes
            }
        }
    }
}

/// First free `stem[_ppNNN].ext` in `dir`, recorded in `taken`.
fn reserve(
    dir: &Path,
    stem: &str,
    extension: Option<&str>,
    unique: bool,
    taken: &mut HashSet<PathBuf>,
) -> PathBuf {
    let with_ext = |name: &str| match extension {
        Some(ext) => format!("{}.{}", name, ext),
        None => name.to_string(),
    };

    let mut candidate = dir.join(with_ext(stem));
    if unique {
        let mut counter = 0;
        while taken.contains(&candidate) || candidate.exists() {
            counter += 1;
            candidate = dir.join(with_ext(&format!("{}_pp{:03}", stem, counter)));
        }
    }
    taken.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SequenceAnalyzer;
    use crate::project::parser::parse_project_xml;
    use crate::test_support::{touch, ProjectBuilder};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn plan_with(b: &ProjectBuilder, options: &ConsolidationOptions) -> OperationPlan {
        let graph = parse_project_xml(&b.xml(), "t").unwrap();
        let status: HashMap<PathBuf, u64> = graph
            .media_items()
            .map(|m| (m.path.clone(), 6_000))
            .collect();
        let inventory = MediaInventory::build_with(&graph, &status);
        let usage = SequenceAnalyzer::new(&graph, &inventory)
            .analyze(&options.sequences)
            .unwrap();
        Planner::new(&graph, &inventory, options).plan(&usage)
    }

    fn options(dir: &TempDir) -> ConsolidationOptions {
        ConsolidationOptions {
            output_path: dir.path().join("out"),
            ..Default::default()
        }
    }

    fn two_clip_project() -> (ProjectBuilder, String) {
        let mut b = ProjectBuilder::new();
        let media = b.media("/footage/a.mov", 60.0);
        b.set_fps(&media, 25.0);
        let seq = b.sequence("Main");
        let track = b.video_track(&seq);
        b.clip(&track, &media, 0.0, 10.0);
        b.clip(&track, &media, 20.0, 30.0);
        (b, media)
    }

    fn names(plan: &OperationPlan) -> Vec<String> {
        plan.entries
            .iter()
            .map(|e| e.destination.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_entry_count_per_optimization_mode() {
        let dir = TempDir::new().unwrap();
        let (b, _) = two_clip_project();

        let mut opts = options(&dir);
        let keep = plan_with(&b, &opts);
        assert_eq!(keep.entries.len(), 1);
        assert_eq!(keep.entries[0].span, Some(Interval::new(0, 30 * crate::ticks::TICKS_PER_SECOND)));
        assert_eq!(keep.entries[0].intervals.len(), 2);

        opts.optimization_mode = OptimizationMode::Minimize;
        let minimize = plan_with(&b, &opts);
        assert_eq!(minimize.entries.len(), 2);
        assert_eq!(names(&minimize), vec!["a_001.mov", "a_002.mov"]);
        assert_eq!(minimize.entries[1].clip_ids.len(), 1);

        opts.optimization_mode = OptimizationMode::UniqueClips;
        assert_eq!(plan_with(&b, &opts).entries.len(), 2);
    }

    #[test]
    fn test_copy_ignores_fragmentation() {
        let dir = TempDir::new().unwrap();
        let (b, _) = two_clip_project();
        let opts = ConsolidationOptions {
            processing_mode: ProcessingMode::Copy,
            optimization_mode: OptimizationMode::Minimize,
            ..options(&dir)
        };
        let plan = plan_with(&b, &opts);
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].span, None);
        assert_eq!(plan.entries[0].estimated_bytes, 6_000);
    }

    #[test]
    fn test_proxy_modes() {
        let dir = TempDir::new().unwrap();
        let (mut b, media) = two_clip_project();
        let proxy = b.media("/footage/proxy/a_proxy.mp4", 60.0);
        b.set_proxy(&media, &proxy);

        let both = plan_with(&b, &options(&dir));
        assert_eq!(both.entries.len(), 2);
        assert_eq!(both.entries[1].role, EntryRole::Proxy);
        assert_eq!(both.entries[1].media_id, proxy);
        assert!(both.entries[1].destination.starts_with(dir.path().join("out").join(PROXY_DIR)));

        let only = plan_with(&b, &ConsolidationOptions { proxy_mode: ProxyMode::ProxyOnly, ..options(&dir) });
        assert_eq!(only.entries.len(), 1);
        assert_eq!(only.entries[0].media_id, media);
        assert_eq!(only.entries[0].source_path, PathBuf::from("/footage/proxy/a_proxy.mp4"));

        let main = plan_with(&b, &ConsolidationOptions { proxy_mode: ProxyMode::MainOnly, ..options(&dir) });
        assert_eq!(main.entries.len(), 1);
        assert_eq!(main.entries[0].source_path, PathBuf::from("/footage/a.mov"));

        let preserve = plan_with(&b, &ConsolidationOptions { proxy_mode: ProxyMode::Preserve, ..options(&dir) });
        assert_eq!(preserve.entries[1].action, PlanAction::NoProcess);
        assert_eq!(preserve.entries[1].destination, preserve.entries[1].source_path);
        assert_eq!(preserve.entries[1].estimated_bytes, 0);
    }

    #[test]
    fn test_folder_structures() {
        let dir = TempDir::new().unwrap();
        let mut b = ProjectBuilder::new();
        let footage = b.bin("Footage", None);
        let day = b.bin("Day 1", Some(&footage));
        let a = b.media("/shoot/day1/a.mov", 10.0);
        let c = b.media("/shoot/day2/c.mov", 10.0);
        b.master_clip("Interview", &a, Some(&day));
        let seq = b.sequence("S");
        let track = b.video_track(&seq);
        b.clip(&track, &a, 0.0, 5.0);
        b.clip(&track, &c, 0.0, 5.0);
        let out = dir.path().join("out").join(MEDIA_DIR);

        let bins = plan_with(&b, &ConsolidationOptions { folder_structure: FolderStructure::Bins, ..options(&dir) });
        assert_eq!(bins.entries[0].destination, out.join("Footage").join("Day 1").join("a.mov"));
        assert_eq!(bins.entries[1].destination, out.join("c.mov"));

        let original = plan_with(&b, &ConsolidationOptions { folder_structure: FolderStructure::Original, ..options(&dir) });
        assert_eq!(original.entries[0].destination, out.join("day1").join("a.mov"));
        assert_eq!(original.entries[1].destination, out.join("day2").join("c.mov"));

        let named = plan_with(&b, &ConsolidationOptions { use_project_item_names: true, ..options(&dir) });
        assert_eq!(named.entries[0].destination, out.join("Interview.mov"));
    }

    #[test]
    fn test_unique_names_against_plan_and_disk() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("out").join(MEDIA_DIR).join("clip.mov"), 1);

        let mut b = ProjectBuilder::new();
        let first = b.media("/a/clip.mov", 10.0);
        let second = b.media("/b/clip.mov", 10.0);
        let seq = b.sequence("S");
        let track = b.video_track(&seq);
        b.clip(&track, &first, 0.0, 5.0);
        b.clip(&track, &second, 0.0, 5.0);

        let plan = plan_with(&b, &options(&dir));
        assert_eq!(names(&plan), vec!["clip_pp001.mov", "clip_pp002.mov"]);
    }

    #[test]
    fn test_transcode_extension_and_frame_range() {
        let dir = TempDir::new().unwrap();
        let mut b = ProjectBuilder::new();
        let media = b.media("/footage/a.mov", 60.0);
        b.set_fps(&media, 25.0);
        let seq = b.sequence("S");
        let track = b.video_track(&seq);
        b.clip(&track, &media, 0.0, 10.0);

        let opts = ConsolidationOptions {
            processing_mode: ProcessingMode::Transcode,
            transcode_preset: Some(TranscodePreset::H264High),
            add_frame_range_to_filename: true,
            ..options(&dir)
        };
        let plan = plan_with(&b, &opts);
        assert_eq!(names(&plan), vec!["a_0-249.mp4"]);
        assert_eq!(plan.entries[0].action, PlanAction::Transcode(TranscodePreset::H264High));
    }

    #[test]
    fn test_fallback_container_name_is_reserved() {
        let dir = TempDir::new().unwrap();
        let mut b = ProjectBuilder::new();
        let mpeg = b.media("/footage/a.mp4", 60.0);
        b.set_codec(&mpeg, "mpeg2video");
        let prores = b.media("/footage/a.mov", 60.0);
        b.set_codec(&prores, "prores");
        let seq = b.sequence("S");
        let track = b.video_track(&seq);
        b.clip(&track, &mpeg, 0.0, 5.0);
        b.clip(&track, &prores, 0.0, 5.0);

        let plan = plan_with(&b, &options(&dir));
        let by_media = |id: &str| plan.entries.iter().find(|e| e.media_id == id).unwrap();
        let fallback = by_media(&mpeg).fallback_destination.clone().unwrap();
        assert_eq!(fallback.extension().unwrap(), "mov");
        assert!(by_media(&prores).fallback_destination.is_none());

        let mut paths: Vec<&PathBuf> = plan
            .entries
            .iter()
            .flat_map(|e| std::iter::once(&e.destination).chain(e.fallback_destination.as_ref()))
            .collect();
        let count = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), count);
    }

    #[test]
    fn test_shared_proxy_planned_once() {
        let dir = TempDir::new().unwrap();
        let mut b = ProjectBuilder::new();
        let a = b.media("/footage/a.mov", 60.0);
        let c = b.media("/footage/c.mov", 60.0);
        let proxy = b.media("/footage/proxy/p.mov", 60.0);
        b.set_proxy(&a, &proxy);
        b.set_proxy(&c, &proxy);
        let seq = b.sequence("S");
        let track = b.video_track(&seq);
        b.clip(&track, &a, 0.0, 5.0);
        b.clip(&track, &c, 20.0, 30.0);

        let plan = plan_with(&b, &options(&dir));
        let proxies: Vec<&PlanEntry> = plan.entries.iter().filter(|e| e.role == EntryRole::Proxy).collect();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].media_id, proxy);
        assert_eq!(proxies[0].span, Some(Interval::new(0, 30 * crate::ticks::TICKS_PER_SECOND)));
        assert_eq!(proxies[0].intervals.len(), 2);
        assert!(plan.notes.iter().any(|n| n.contains("shared by 2 media")));
    }

    #[test]
    fn test_stills_degrade_to_copy() {
        let dir = TempDir::new().unwrap();
        let mut b = ProjectBuilder::new();
        let logo = b.media("/gfx/logo.png", 5.0);
        let seq = b.sequence("S");
        let track = b.video_track(&seq);
        b.clip(&track, &logo, 0.0, 2.0);

        let plan = plan_with(&b, &options(&dir));
        assert_eq!(plan.entries[0].action, PlanAction::Copy);
        assert_eq!(plan.notes.len(), 1);
    }

    #[test]
    fn test_estimate_scales_and_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let (b, _) = two_clip_project();
        let opts = options(&dir);
        // Bounding span [0, 30) of a 60 s file of 6000 bytes.
        let first = plan_with(&b, &opts).estimated_bytes();
        assert_eq!(first, 3_000);
        for _ in 0..3 {
            assert_eq!(plan_with(&b, &opts).estimated_bytes(), first);
        }
    }
}
