//! # Project Parser
//!
//! Decomprime il file di progetto e costruisce il [`ProjectGraph`].
//!
//! ## Responsabilità:
//! - Rimuove l'involucro gzip e parsa l'XML in un albero (`roxmltree`)
//! - Primo passaggio: indicizza ogni oggetto con `ObjectID` / `ObjectUID`
//! - Secondo passaggio: costruisce i nodi tipizzati (sequenze, tracce, clip, media, bin)
//! - Terzo passaggio: segue le catene di oggetti intermedi (gruppi di tracce,
//!   sub-clip, clip, media source) fino alle tracce e ai media
//! - Quarto passaggio: verifica ogni riferimento; quelli non risolti diventano warning
//!
//! Riferimenti in avanti sono permessi: la risoluzione avviene solo dopo
//! che l'intero documento è stato indicizzato.

use super::document::{self, ObjectIndex};
use super::graph::*;
use crate::error::Result;
use crate::ticks::{FrameRate, Ticks};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reference fields followed from a track item down to what it plays
const SOURCE_CHAIN_FIELDS: [&str; 6] = ["SubClip", "Clip", "Source", "MediaSource", "Media", "Sequence"];
const MAX_CHAIN_DEPTH: usize = 16;

/// Parse gzip-wrapped project bytes.
pub fn parse_project_bytes(bytes: &[u8], name: &str) -> Result<(ProjectGraph, String)> {
    let xml = document::decompress(bytes)?;
    let graph = parse_project_xml(&xml, name)?;
    Ok((graph, xml))
}

/// Build the graph from an already decompressed document.
pub fn parse_project_xml(xml: &str, name: &str) -> Result<ProjectGraph> {
    let doc = document::parse_xml(xml)?;
    let index = ObjectIndex::build(&doc)?;

    let version = doc
        .root_element()
        .attribute("Version")
        .map(|v| v.to_string());
    let mut graph = ProjectGraph::new(name.to_string(), version);

    for (id, node) in &index.objects {
        let view = ObjectView::new(id, *node);
        graph.push(view.into_node());
    }

    record_missing_targets(&doc, &index, &mut graph);
    resolve_reference_chains(&index, &mut graph);
    resolve_typed_links(&mut graph);
    fill_derived_fields(&mut graph);

    let dangling = graph.unresolved().len();
    if dangling > 0 {
        warn!("Project '{}' has {} unresolved references", name, dangling);
    }
    debug!(
        "Parsed project '{}': {} objects, {} sequences, {} media",
        name,
        graph.len(),
        graph.sequences().count(),
        graph.media_items().count()
    );

    Ok(graph)
}

/// Fields of one object, read from its own subtree.
struct ObjectView<'a, 'input> {
    id: &'a str,
    tag: &'a str,
    elements: Vec<roxmltree::Node<'a, 'input>>,
}

impl<'a, 'input> ObjectView<'a, 'input> {
    fn new(id: &'a str, node: roxmltree::Node<'a, 'input>) -> Self {
        Self {
            id,
            tag: node.tag_name().name(),
            elements: document::own_elements(node),
        }
    }

    fn text(&self, tag: &str) -> Option<&'a str> {
        self.texts(tag).into_iter().next()
    }

    fn texts(&self, tag: &str) -> Vec<&'a str> {
        self.elements
            .iter()
            .filter(|n| n.tag_name().name() == tag)
            .filter_map(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn int(&self, tag: &str) -> Option<i64> {
        self.text(tag).and_then(|t| t.parse().ok())
    }

    fn reference(&self, tag: &str) -> Option<String> {
        self.references(|t| t == tag).into_iter().next().map(|(_, id)| id)
    }

    /// Reference elements whose tag passes `accept`, with their target id.
    fn references(&self, accept: impl Fn(&str) -> bool) -> Vec<(roxmltree::Node<'a, 'input>, String)> {
        self.elements
            .iter()
            .filter_map(|n| {
                let target = document::reference(n)?;
                accept(n.tag_name().name()).then(|| (*n, target.to_string()))
            })
            .collect()
    }

    fn into_node(self) -> Node {
        let tag = self.tag;
        match tag {
            "Sequence" => Node::Sequence(self.sequence()),
            "Media" => Node::Media(self.media()),
            "MulticamSource" => Node::Multicam(self.multicam()),
            "BinProjectItem" | "RootProjectItem" => Node::Bin(Bin {
                id: self.id.to_string(),
                name: self.text("Name").map(str::to_string),
                parent_id: self.reference("ParentBin"),
            }),
            "MasterClip" | "ClipProjectItem" => Node::ProjectItem(ProjectItem {
                id: self.id.to_string(),
                name: self.text("Name").unwrap_or(self.id).to_string(),
                media_id: self.reference("Media"),
                bin_id: self.reference("ParentBin"),
            }),
            t if t.ends_with("ClipTrack") => Node::Track(self.track()),
            t if t.ends_with("TrackItem") => Node::Clip(self.clip()),
            _ => Node::Other {
                id: self.id.to_string(),
                tag: tag.to_string(),
            },
        }
    }

    fn sequence(&self) -> Sequence {
        let mut video = Vec::new();
        let mut audio = Vec::new();
        for (node, target) in self.references(|t| t.ends_with("Track")) {
            if node.tag_name().name().starts_with("Audio") {
                audio.push(target);
            } else {
                video.push(target);
            }
        }
        video.extend(audio);

        Sequence {
            id: self.id.to_string(),
            name: self.text("Name").unwrap_or(self.id).to_string(),
            frame_rate: self.frame_rate().unwrap_or_default(),
            duration: self
                .int("Duration")
                .or_else(|| self.int("MZ.OutPoint"))
                .unwrap_or(0),
            tracks: video,
            bin_id: self.reference("ParentBin"),
        }
    }

    fn track(&self) -> Track {
        let kind = if self.tag.starts_with("Audio") {
            TrackKind::Audio
        } else {
            TrackKind::Video
        };
        Track {
            id: self.id.to_string(),
            kind,
            sequence_id: None,
            clips: self
                .references(|t| t.ends_with("Item"))
                .into_iter()
                .map(|(_, id)| id)
                .collect(),
        }
    }

    fn clip(&self) -> Clip {
        let start = self.int("Start").unwrap_or(0);
        let end = self.int("End").unwrap_or(start);
        let source_in = self.int("InPoint").unwrap_or(0);
        let source_out = self
            .int("OutPoint")
            .unwrap_or_else(|| source_in + (end - start).max(0));

        let source = if let Some(media) = self.reference("Source") {
            ClipSource::Media(media)
        } else if let Some(nested) = self.reference("NestedSequence") {
            ClipSource::Nested(nested)
        } else if let Some(multicam) = self.reference("MulticamSource") {
            ClipSource::Multicam {
                source_id: multicam,
                selected_angle: self
                    .int("SelectedAngle")
                    .and_then(|a| usize::try_from(a).ok())
                    .unwrap_or(0),
            }
        } else {
            ClipSource::Unlinked
        };

        Clip {
            id: self.id.to_string(),
            track_id: None,
            start: start.min(end),
            end: start.max(end),
            source_in: source_in.min(source_out),
            source_out: source_in.max(source_out),
            source,
            timing_id: self.id.to_string(),
            link_id: self.id.to_string(),
        }
    }

    fn media(&self) -> MediaItem {
        let path = self
            .text("ActualMediaFilePath")
            .or_else(|| self.text("FilePath"))
            .or_else(|| self.text("MediaFilePath"))
            .map(PathBuf::from)
            .unwrap_or_default();

        MediaItem {
            id: self.id.to_string(),
            path,
            title: self.text("Title").map(str::to_string),
            declared_kind: self.text("MediaKind").and_then(MediaKind::from_declared),
            duration: self
                .int("MediaDuration")
                .or_else(|| self.int("Duration"))
                .filter(|d| *d > 0),
            frame_rate: self.frame_rate(),
            codec: self.text("Codec").map(|c| c.to_lowercase()),
            declared_size: self.text("FileSize").and_then(|s| s.parse().ok()),
            proxy_id: self.reference("ProxyMedia"),
            sidecars: self.texts("Sidecar").into_iter().map(PathBuf::from).collect(),
        }
    }

    fn multicam(&self) -> MulticamSource {
        MulticamSource {
            id: self.id.to_string(),
            angles: self
                .references(|t| t == "Angle")
                .into_iter()
                .map(|(node, media_id)| MulticamAngle {
                    media_id,
                    offset: node
                        .attribute("Offset")
                        .and_then(|o| o.trim().parse::<Ticks>().ok())
                        .unwrap_or(0),
                })
                .collect(),
        }
    }

    fn frame_rate(&self) -> Option<FrameRate> {
        self.int("FrameRate").and_then(FrameRate::from_ticks_per_frame)
    }
}

/// Every reference element whose target is not an object at all.
fn record_missing_targets(
    doc: &roxmltree::Document<'_>,
    index: &ObjectIndex<'_, '_>,
    graph: &mut ProjectGraph,
) {
    for node in doc.descendants().filter(|n| n.is_element()) {
        let Some(target) = document::reference(&node) else {
            continue;
        };
        if !index.contains(target) {
            graph.record_unresolved(DanglingReference {
                from: document::owning_object(&node)
                    .unwrap_or("document")
                    .to_string(),
                field: node.tag_name().name().to_string(),
                target: target.to_string(),
                reason: "no such object".to_string(),
            });
        }
    }
}

/// Reach tracks and media through intermediate objects when the direct links are absent.
///
/// Sequences list their tracks through track groups, and track items reach their
/// media through sub-clip, clip and media source objects. The first object on the
/// way that carries `InPoint` supplies the source range.
fn resolve_reference_chains(index: &ObjectIndex<'_, '_>, graph: &mut ProjectGraph) {
    let tag_of = |id: &str| index.get(id).map(|n| n.tag_name().name());

    for node in graph.nodes_mut() {
        match node {
            Node::Sequence(s) => {
                if s.tracks.iter().any(|t| tag_of(t).is_some_and(is_clip_track)) {
                    continue;
                }
                let tracks = chained_tracks(index, &s.id);
                if !tracks.is_empty() {
                    debug!("Sequence {} reaches {} tracks through track groups", s.id, tracks.len());
                    s.tracks = tracks;
                }
            }
            Node::Clip(c) => {
                let direct = match &c.source {
                    ClipSource::Unlinked => false,
                    ClipSource::Media(m) => tag_of(m) == Some("Media"),
                    _ => true,
                };
                if direct {
                    continue;
                }
                let Some(chain) = chained_source(index, &c.id) else {
                    continue;
                };
                c.source = chain.source;
                c.link_id = chain.link_id;
                if let Some(timing) = chain.timing.filter(|t| t.object_id != c.id) {
                    let out = timing
                        .out_point
                        .unwrap_or_else(|| timing.in_point.saturating_add(c.end - c.start));
                    c.source_in = timing.in_point.min(out);
                    c.source_out = timing.in_point.max(out);
                    c.timing_id = timing.object_id;
                }
            }
            _ => {}
        }
    }
}

fn is_clip_track(tag: &str) -> bool {
    tag.ends_with("ClipTrack")
}

/// Tracks reachable from a sequence through track group objects, video first.
fn chained_tracks(index: &ObjectIndex<'_, '_>, sequence_id: &str) -> Vec<String> {
    let mut video = Vec::new();
    let mut audio = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(sequence_id.to_string(), 0usize)];

    while let Some((id, depth)) = stack.pop() {
        if depth > MAX_CHAIN_DEPTH || !visited.insert(id.clone()) {
            continue;
        }
        let Some(object) = index.get(&id) else { continue };
        let mut next = Vec::new();
        for element in document::own_elements(object) {
            let Some(target) = document::reference(&element) else { continue };
            let Some(tag) = index.get(target).map(|n| n.tag_name().name()) else {
                continue;
            };
            if is_clip_track(tag) {
                if visited.insert(target.to_string()) {
                    if tag.starts_with("Audio") {
                        audio.push(target.to_string());
                    } else {
                        video.push(target.to_string());
                    }
                }
            } else if tag.ends_with("TrackGroup")
                || (element.tag_name().name().ends_with("Tracks") && !tag.ends_with("TrackItem"))
            {
                next.push((target.to_string(), depth + 1));
            }
        }
        next.reverse();
        stack.extend(next);
    }

    video.extend(audio);
    video
}

struct ChainTiming {
    object_id: String,
    in_point: Ticks,
    out_point: Option<Ticks>,
}

struct ChainedSource {
    source: ClipSource,
    link_id: String,
    timing: Option<ChainTiming>,
}

/// Follow source fields from a track item until a media item or a sequence.
fn chained_source(index: &ObjectIndex<'_, '_>, clip_id: &str) -> Option<ChainedSource> {
    let mut visited = HashSet::new();
    let mut stack = vec![(clip_id.to_string(), 0usize)];
    let mut timing = None;

    while let Some((id, depth)) = stack.pop() {
        if depth > MAX_CHAIN_DEPTH || !visited.insert(id.clone()) {
            continue;
        }
        let Some(object) = index.get(&id) else { continue };
        let elements = document::own_elements(object);
        if timing.is_none() {
            timing = int_field(&elements, "InPoint").map(|in_point| ChainTiming {
                object_id: id.clone(),
                in_point,
                out_point: int_field(&elements, "OutPoint"),
            });
        }

        let mut next = Vec::new();
        for element in &elements {
            if !SOURCE_CHAIN_FIELDS.contains(&element.tag_name().name()) {
                continue;
            }
            let Some(target) = document::reference(element) else { continue };
            let source = match index.get(target).map(|n| n.tag_name().name()) {
                Some("Media") => ClipSource::Media(target.to_string()),
                Some("Sequence") => ClipSource::Nested(target.to_string()),
                Some(_) => {
                    next.push((target.to_string(), depth + 1));
                    continue;
                }
                None => continue,
            };
            return Some(ChainedSource {
                source,
                link_id: id,
                timing,
            });
        }
        next.reverse();
        stack.extend(next);
    }
    None
}

fn int_field(elements: &[roxmltree::Node<'_, '_>], tag: &str) -> Option<Ticks> {
    elements
        .iter()
        .filter(|n| n.tag_name().name() == tag)
        .find_map(|n| n.text()?.trim().parse().ok())
}

/// Clear typed links that point at nothing or at the wrong kind of node.
fn resolve_typed_links(graph: &mut ProjectGraph) {
    let kinds: HashMap<String, &'static str> = graph
        .nodes()
        .iter()
        .map(|n| (n.id().to_string(), n.kind_name()))
        .collect();

    let mut dangling = Vec::new();
    let mut link = |from: &str, field: &str, target: &str, expected: &'static str| -> bool {
        match kinds.get(target) {
            Some(kind) if *kind == expected => true,
            Some(kind) => {
                dangling.push(DanglingReference {
                    from: from.to_string(),
                    field: field.to_string(),
                    target: target.to_string(),
                    reason: format!("expected {}, found {}", expected, kind),
                });
                false
            }
            // Missing targets were already recorded in the first sweep.
            None => false,
        }
    };

    for node in graph.nodes_mut() {
        match node {
            Node::Sequence(s) => {
                let id = s.id.clone();
                s.tracks.retain(|t| link(&id, "Track", t, "track"));
                if let Some(bin) = s.bin_id.take() {
                    s.bin_id = link(&id, "ParentBin", &bin, "bin").then_some(bin);
                }
            }
            Node::Track(t) => {
                let id = t.id.clone();
                t.clips.retain(|c| link(&id, "TrackItem", c, "clip"));
            }
            Node::Clip(c) => {
                let ok = match &c.source {
                    ClipSource::Media(m) => link(&c.id, "Source", m, "media"),
                    ClipSource::Nested(s) => link(&c.id, "NestedSequence", s, "sequence"),
                    ClipSource::Multicam { source_id, .. } => {
                        link(&c.id, "MulticamSource", source_id, "multicam source")
                    }
                    ClipSource::Unlinked => true,
                };
                if !ok {
                    c.source = ClipSource::Unlinked;
                }
            }
            Node::Media(m) => {
                if let Some(proxy) = m.proxy_id.take() {
                    m.proxy_id = link(&m.id, "ProxyMedia", &proxy, "media").then_some(proxy);
                }
            }
            Node::Multicam(mc) => {
                let id = mc.id.clone();
                mc.angles.retain(|a| link(&id, "Angle", &a.media_id, "media"));
            }
            Node::Bin(b) => {
                if let Some(parent) = b.parent_id.take() {
                    b.parent_id = link(&b.id, "ParentBin", &parent, "bin").then_some(parent);
                }
            }
            Node::ProjectItem(p) => {
                if let Some(media) = p.media_id.take() {
                    p.media_id = link(&p.id, "Media", &media, "media").then_some(media);
                }
                if let Some(bin) = p.bin_id.take() {
                    p.bin_id = link(&p.id, "ParentBin", &bin, "bin").then_some(bin);
                }
            }
            Node::Other { .. } => {}
        }
    }

    for reference in dangling {
        graph.record_unresolved(reference);
    }
}

/// Owner links and sequence durations, computed once links are valid.
fn fill_derived_fields(graph: &mut ProjectGraph) {
    let mut track_owner = HashMap::new();
    let mut clip_owner = HashMap::new();
    let mut sequence_end: HashMap<String, Ticks> = HashMap::new();

    for sequence in graph.sequences() {
        for track in graph.tracks_of(sequence) {
            track_owner.insert(track.id.clone(), sequence.id.clone());
            for clip_id in &track.clips {
                clip_owner.insert(clip_id.clone(), track.id.clone());
            }
        }
        let end = graph.clips_of(sequence).map(|c| c.end).max().unwrap_or(0);
        sequence_end.insert(sequence.id.clone(), end);
    }

    for node in graph.nodes_mut() {
        match node {
            Node::Track(t) => t.sequence_id = track_owner.get(&t.id).cloned(),
            Node::Clip(c) => c.track_id = clip_owner.get(&c.id).cloned(),
            Node::Sequence(s) if s.duration <= 0 => {
                s.duration = sequence_end.get(&s.id).copied().unwrap_or(0);
            }
            _ => {}
        }
    }
}

/// Project name shown to users: the file stem.
pub fn project_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}
