//! # Sequence / Usage Analyzer
//!
//! Percorre le timeline delle sequenze selezionate e calcola, per ogni media,
//! quali porzioni sono effettivamente usate.
//!
//! ## Responsabilità:
//! - Visita in profondità di tracce e clip, entrando nelle sequenze annidate
//! - Rilevamento dei cicli tramite l'insieme delle sequenze sul percorso corrente
//! - Espansione delle clip multicam (solo angolo selezionato, o tutti)
//! - Handle frames: margine prima e dopo ogni intervallo, limitato a `[0, durata)`
//! - Fusione degli intervalli per media e conteggi usati/non usati
//!
//! ## Note:
//! - La visita usa uno stack esplicito: la profondità di annidamento non consuma stack nativo
//! - Una sequenza già analizzata completamente non viene rivisitata
//! - I media che sono solo proxy di altri media non entrano nei conteggi usati/non usati

use crate::error::{ConsolidateError, Result};
use crate::interval::{bounding, merge_intervals, Interval};
use crate::inventory::MediaInventory;
use crate::project::{Clip, ClipSource, ProjectGraph};
use crate::ticks::{FrameRate, Ticks};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// How a clip reaches a media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageVia {
    Direct,
    MulticamAngle { source_id: String, angle: usize },
}

/// One clip's use of one media item
#[derive(Debug, Clone)]
pub struct ClipUsage {
    pub clip_id: String,
    /// Sequence whose track holds the clip
    pub sequence_id: String,
    /// Used range including handles, clamped to the media
    pub interval: Interval,
    pub via: UsageVia,
}

/// Aggregated usage of one media item
#[derive(Debug, Clone)]
pub struct MediaUsage {
    pub media_id: String,
    pub clips: Vec<ClipUsage>,
    /// Minimal covering set of the clip intervals
    pub intervals: Vec<Interval>,
    pub sequences: BTreeSet<String>,
}

impl MediaUsage {
    /// Number of distinct clips using this media.
    pub fn usage_count(&self) -> usize {
        self.clips.len()
    }

    /// Outer bound of every used range.
    pub fn time_range(&self) -> Option<Interval> {
        bounding(&self.intervals)
    }

    pub fn is_multicam_angle(&self) -> bool {
        self.clips
            .iter()
            .any(|c| matches!(c.via, UsageVia::MulticamAngle { .. }))
    }
}

/// Result of analysing a set of sequences
#[derive(Debug, Clone, Default)]
pub struct UsageResult {
    /// Used media, in inventory order
    pub used: Vec<MediaUsage>,
    pub unused_media: Vec<String>,
    pub used_count: usize,
    pub unused_count: usize,
    pub used_size: u64,
    pub unused_size: u64,
    pub analyzed_sequences: Vec<String>,
    pub warnings: Vec<String>,
}

impl UsageResult {
    pub fn get(&self, media_id: &str) -> Option<&MediaUsage> {
        self.used.iter().find(|u| u.media_id == media_id)
    }
}

/// Walks sequences and collects per-media usage
pub struct SequenceAnalyzer<'g> {
    graph: &'g ProjectGraph,
    inventory: &'g MediaInventory,
    handle_frames: u32,
    include_all_multicam_angles: bool,
    merge_tolerance: Ticks,
}

struct Frame<'g> {
    sequence_id: &'g str,
    clips: Vec<&'g Clip>,
    next: usize,
}

#[derive(Default)]
struct Collector {
    by_media: HashMap<String, MediaUsage>,
    seen: HashSet<(String, String)>,
    warnings: Vec<String>,
}

impl<'g> SequenceAnalyzer<'g> {
    pub fn new(graph: &'g ProjectGraph, inventory: &'g MediaInventory) -> Self {
        Self {
            graph,
            inventory,
            handle_frames: 0,
            include_all_multicam_angles: false,
            merge_tolerance: 0,
        }
    }

    pub fn with_handles(mut self, frames: u32) -> Self {
        self.handle_frames = frames;
        self
    }

    pub fn include_all_multicam_angles(mut self, include: bool) -> Self {
        self.include_all_multicam_angles = include;
        self
    }

    pub fn with_merge_tolerance(mut self, tolerance: Ticks) -> Self {
        self.merge_tolerance = tolerance.max(0);
        self
    }

    /// Analyse `sequence_ids`, or every sequence when empty.
    pub fn analyze(&self, sequence_ids: &[String]) -> Result<UsageResult> {
        let roots: Vec<&'g str> = if sequence_ids.is_empty() {
            self.graph.sequences().map(|s| s.id.as_str()).collect()
        } else {
            sequence_ids
                .iter()
                .map(|id| {
                    self.graph
                        .sequence(id)
                        .map(|s| s.id.as_str())
                        .ok_or_else(|| ConsolidateError::UnknownSequence(id.clone()))
                })
                .collect::<Result<_>>()?
        };

        let mut completed: HashSet<&'g str> = HashSet::new();
        let mut collector = Collector::default();

        for root in &roots {
            if !completed.contains(root) {
                self.walk(root, &mut completed, &mut collector)?;
            }
        }

        debug!(
            "Analyzed {} sequences ({} including nested), {} media used",
            roots.len(),
            completed.len(),
            collector.by_media.len()
        );

        Ok(self.summarize(roots, collector))
    }

    fn walk(
        &self,
        root: &'g str,
        completed: &mut HashSet<&'g str>,
        collector: &mut Collector,
    ) -> Result<()> {
        let mut path: Vec<&'g str> = Vec::new();
        let mut on_path: HashSet<&'g str> = HashSet::new();
        let mut stack: Vec<Frame<'g>> = Vec::new();

        self.enter(root, &mut stack, &mut path, &mut on_path);

        while let Some(frame) = stack.last_mut() {
            let Some(clip) = frame.clips.get(frame.next).copied() else {
                stack.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(done);
                    completed.insert(done);
                }
                continue;
            };
            frame.next += 1;
            let sequence_id = frame.sequence_id;

            match &clip.source {
                ClipSource::Media(media_id) => {
                    let source = Interval::new(clip.source_in, clip.source_out);
                    self.record(collector, media_id, clip, sequence_id, source, UsageVia::Direct);
                }
                ClipSource::Nested(nested) => {
                    let nested = match self.graph.sequence(nested) {
                        Some(s) => s.id.as_str(),
                        None => continue,
                    };
                    if on_path.contains(nested) {
                        return Err(self.cycle_error(&path, nested));
                    }
                    if !completed.contains(nested) {
                        self.enter(nested, &mut stack, &mut path, &mut on_path);
                    }
                }
                ClipSource::Multicam {
                    source_id,
                    selected_angle,
                } => self.record_multicam(collector, clip, sequence_id, source_id, *selected_angle),
                ClipSource::Unlinked => {}
            }
        }

        Ok(())
    }

    fn enter(
        &self,
        sequence_id: &'g str,
        stack: &mut Vec<Frame<'g>>,
        path: &mut Vec<&'g str>,
        on_path: &mut HashSet<&'g str>,
    ) {
        let clips = self
            .graph
            .sequence(sequence_id)
            .map(|s| self.graph.clips_of(s).collect())
            .unwrap_or_default();
        stack.push(Frame {
            sequence_id,
            clips,
            next: 0,
        });
        path.push(sequence_id);
        on_path.insert(sequence_id);
    }

    fn cycle_error(&self, path: &[&'g str], repeated: &'g str) -> ConsolidateError {
        let start = path.iter().position(|id| *id == repeated).unwrap_or(0);
        let name = |id: &str| {
            self.graph
                .sequence(id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let mut chain: Vec<String> = path[start..].iter().map(|id| name(id)).collect();
        chain.push(name(repeated));
        warn!("Cycle in nested sequences: {}", chain.join(" -> "));
        ConsolidateError::CycleDetected { chain }
    }

    fn record_multicam(
        &self,
        collector: &mut Collector,
        clip: &Clip,
        sequence_id: &str,
        source_id: &str,
        selected: usize,
    ) {
        let Some(multicam) = self.graph.multicam(source_id) else {
            return;
        };
        let source = Interval::new(clip.source_in, clip.source_out);

        for (index, angle) in multicam.angles.iter().enumerate() {
            if !self.include_all_multicam_angles && index != selected {
                continue;
            }
            let via = UsageVia::MulticamAngle {
                source_id: source_id.to_string(),
                angle: index,
            };
            self.record(collector, &angle.media_id, clip, sequence_id, source.shift(angle.offset), via);
        }

        if !self.include_all_multicam_angles && selected >= multicam.angles.len() {
            collector.warnings.push(format!(
                "Clip {} selects angle {} but multicam source {} has {} angles",
                clip.id,
                selected,
                source_id,
                multicam.angles.len()
            ));
        }
    }

    fn record(
        &self,
        collector: &mut Collector,
        media_id: &str,
        clip: &Clip,
        sequence_id: &str,
        source: Interval,
        via: UsageVia,
    ) {
        let Some(media) = self.graph.media(media_id) else {
            return;
        };
        if !collector.seen.insert((media_id.to_string(), clip.id.clone())) {
            return;
        }

        let rate = media
            .frame_rate
            .or_else(|| self.graph.sequence(sequence_id).map(|s| s.frame_rate))
            .unwrap_or(FrameRate::DEFAULT);
        let interval = source
            .expand(rate.frames_to_ticks(self.handle_frames))
            .clamp_to(media.duration);

        if interval.is_empty() {
            collector.warnings.push(format!(
                "Clip {} uses no valid range of {}",
                clip.id,
                media.file_name()
            ));
            return;
        }

        let usage = collector
            .by_media
            .entry(media_id.to_string())
            .or_insert_with(|| MediaUsage {
                media_id: media_id.to_string(),
                clips: Vec::new(),
                intervals: Vec::new(),
                sequences: BTreeSet::new(),
            });
        usage.clips.push(ClipUsage {
            clip_id: clip.id.clone(),
            sequence_id: sequence_id.to_string(),
            interval,
            via,
        });
        usage.sequences.insert(sequence_id.to_string());
    }

    fn summarize(&self, roots: Vec<&str>, collector: Collector) -> UsageResult {
        let Collector {
            mut by_media,
            warnings,
            ..
        } = collector;
        let mut result = UsageResult {
            analyzed_sequences: roots.into_iter().map(str::to_string).collect(),
            warnings,
            ..Default::default()
        };

        for item in self.inventory.items() {
            match by_media.remove(&item.object_id) {
                Some(mut usage) => {
                    let ranges: Vec<Interval> = usage.clips.iter().map(|c| c.interval).collect();
                    usage.intervals = merge_intervals(&ranges, self.merge_tolerance);
                    result.used_count += 1;
                    result.used_size += item.file_size;
                    result.used.push(usage);
                }
                None if !item.is_proxy => {
                    result.unused_count += 1;
                    result.unused_size += item.file_size;
                    result.unused_media.push(item.object_id.clone());
                }
                None => {}
            }
        }

        result
    }
}
