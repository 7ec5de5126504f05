//! # Project Rewriter
//!
//! Produce il nuovo documento di progetto a partire dall'XML originale.
//!
//! ## Responsabilità:
//! - Sostituisce il percorso di ogni media elaborato con quello di destinazione
//! - Riporta `InPoint` / `OutPoint` delle clip sullo zero del nuovo file
//! - Aggiorna `MediaDuration` quando il file contiene solo un intervallo
//! - Duplica l'oggetto media quando un sorgente produce più file, e
//!   ricollega le clip servite da ogni file
//! - Per i media usati da multicam sposta l'`Offset` dell'angolo invece delle clip
//!
//! ## Strategia:
//! Le modifiche sono sostituzioni su intervalli di byte dell'XML originale,
//! applicate dalla fine verso l'inizio: tutto ciò che non viene modificato
//! resta identico al byte.

use crate::error::{ConsolidateError, Result};
use crate::executor::EntryOutcome;
use crate::planner::{EntryRole, OperationPlan, PlanEntry};
use crate::project::document::{self, ObjectIndex, ID_ATTRS, REF_ATTRS};
use crate::project::{ClipSource, ProjectGraph};
use crate::ticks::Ticks;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

const PATH_TAGS: [&str; 3] = ["ActualMediaFilePath", "FilePath", "MediaFilePath"];
const DURATION_TAGS: [&str; 2] = ["MediaDuration", "Duration"];
/// Fields that link a clip or media source to its media object
const LINK_TAGS: [&str; 2] = ["Source", "Media"];

/// Rewritten document and what happened on the way
#[derive(Debug, Clone)]
pub struct RewriteResult {
    pub xml: String,
    pub warnings: Vec<String>,
    /// Media objects added for multi-file sources
    pub cloned_media: usize,
}

type Edit = (Range<usize>, String);

/// How one plan entry changes its media object
struct Target {
    path: Option<PathBuf>,
    zero: Ticks,
    duration: Option<Ticks>,
}

impl Target {
    fn for_entry(entry: &PlanEntry, outcome: Option<&EntryOutcome>) -> Self {
        match outcome.and_then(EntryOutcome::destination) {
            Some(destination) => Self {
                path: Some(destination.to_path_buf()),
                zero: entry.zero_point(),
                duration: entry
                    .span
                    .filter(|_| entry.action.is_time_bounded())
                    .map(|s| s.len()),
            },
            None => Self {
                path: None,
                zero: 0,
                duration: None,
            },
        }
    }
}

/// Apply `plan` and its `outcomes` to the original document text.
pub fn rewrite_project(
    xml: &str,
    graph: &ProjectGraph,
    plan: &OperationPlan,
    outcomes: &[EntryOutcome],
) -> Result<RewriteResult> {
    let doc = document::parse_xml(xml)?;
    let index = ObjectIndex::build(&doc)?;
    let mut rewriter = Rewriter {
        xml,
        graph,
        index: &index,
        edits: Vec::new(),
        inserts: HashMap::new(),
        warnings: Vec::new(),
        rebased: HashMap::new(),
        retargeted: HashMap::new(),
        next_numeric_id: next_numeric_id(&index),
    };

    let clone_ids = rewriter.allocate_clone_ids(plan);
    let assigned = assigned_clips(plan);

    for (i, entry) in plan.entries.iter().enumerate() {
        let target = Target::for_entry(entry, outcomes.get(i));
        rewriter.rewrite_entry(entry, &target, &clone_ids, &assigned)?;
    }

    let cloned_media = clone_ids.len();
    let Rewriter {
        mut edits,
        inserts,
        warnings,
        ..
    } = rewriter;
    for (at, clones) in inserts {
        edits.push((at..at, clones.concat()));
    }

    debug!(
        "Rewriting project: {} edits, {} cloned media",
        edits.len(),
        cloned_media
    );
    Ok(RewriteResult {
        xml: apply_edits(xml, edits)?,
        warnings,
        cloned_media,
    })
}

struct Rewriter<'a, 'd, 'input> {
    xml: &'a str,
    graph: &'a ProjectGraph,
    index: &'a ObjectIndex<'d, 'input>,
    edits: Vec<Edit>,
    /// Clone texts inserted right after their original element
    inserts: HashMap<usize, Vec<String>>,
    warnings: Vec<String>,
    /// Timing objects already rebased, with their zero point
    rebased: HashMap<String, Ticks>,
    /// Link objects already handled, with the media id they now point at
    retargeted: HashMap<String, String>,
    next_numeric_id: u64,
}

impl<'a, 'd, 'input> Rewriter<'a, 'd, 'input> {
    fn allocate_clone_ids(&mut self, plan: &OperationPlan) -> HashMap<(String, usize), String> {
        let mut ids = HashMap::new();
        for entry in plan.entries.iter().filter(|e| e.fragment > 0) {
            let Some(node) = self.index.get(&entry.media_id) else {
                continue;
            };
            let id = if node.attribute("ObjectUID").is_some() {
                Uuid::new_v4().to_string()
            } else {
                self.next_numeric_id += 1;
                (self.next_numeric_id - 1).to_string()
            };
            ids.insert((entry.media_id.clone(), entry.fragment), id);
        }
        ids
    }

    fn rewrite_entry(
        &mut self,
        entry: &PlanEntry,
        target: &Target,
        clone_ids: &HashMap<(String, usize), String>,
        assigned: &HashMap<&str, HashSet<&str>>,
    ) -> Result<()> {
        let Some(node) = self.index.get(&entry.media_id) else {
            self.warn(format!("Media object {} is missing from the document", entry.media_id));
            return Ok(());
        };
        let media_edits = self.media_edits(node, target);

        let clone_id = clone_ids
            .get(&(entry.media_id.clone(), entry.fragment))
            .map(String::as_str);
        match clone_id {
            None => self.edits.extend(media_edits),
            Some(clone_id) => {
                let proxy_clone = match entry.role {
                    EntryRole::Main => self
                        .graph
                        .media(&entry.media_id)
                        .and_then(|m| m.proxy_id.as_ref())
                        .and_then(|proxy| clone_ids.get(&(proxy.clone(), entry.fragment)))
                        .map(String::as_str),
                    EntryRole::Proxy => None,
                };
                let text = self.clone_text(node, media_edits, clone_id, proxy_clone)?;
                self.inserts
                    .entry(node.range().end)
                    .or_default()
                    .push(text);
            }
        }

        // Clips always point at the main object.
        if entry.role != EntryRole::Main {
            return Ok(());
        }

        let graph = self.graph;
        let mut clips: Vec<&str> = entry.clip_ids.iter().map(String::as_str).collect();
        if entry.fragment == 0 {
            let taken = assigned.get(entry.media_id.as_str());
            clips.extend(
                graph
                    .nodes()
                    .iter()
                    .filter_map(|n| match n {
                        crate::project::Node::Clip(c) => Some(c),
                        _ => None,
                    })
                    .filter(|c| c.source == ClipSource::Media(entry.media_id.clone()))
                    .map(|c| c.id.as_str())
                    .filter(|id| !taken.map(|t| t.contains(id)).unwrap_or(false)),
            );
        }

        for clip_id in clips {
            self.rewrite_clip(clip_id, &entry.media_id, target.zero, clone_id);
        }

        if entry.multicam && target.zero != 0 {
            self.shift_angles(&entry.media_id, target.zero);
        }
        Ok(())
    }

    fn media_edits(&self, node: roxmltree::Node, target: &Target) -> Vec<Edit> {
        let mut edits = Vec::new();
        for element in document::own_elements(node) {
            let tag = element.tag_name().name();
            if let (Some(path), true) = (&target.path, PATH_TAGS.contains(&tag)) {
                if let Some(range) = text_range(&element) {
                    edits.push((range, escape_text(&path.to_string_lossy())));
                }
            } else if let (Some(duration), true) = (target.duration, DURATION_TAGS.contains(&tag)) {
                if let Some(range) = text_range(&element) {
                    edits.push((range, duration.to_string()));
                }
            }
        }
        edits
    }

    /// Copy of a media element with a new identifier and the given edits.
    fn clone_text(
        &self,
        node: roxmltree::Node,
        media_edits: Vec<Edit>,
        clone_id: &str,
        proxy_clone: Option<&str>,
    ) -> Result<String> {
        let range = node.range();
        let base = range.start;
        let slice = &self.xml[range.clone()];
        let shift = |r: &Range<usize>| (r.start - base)..(r.end - base);

        let mut edits: Vec<Edit> = media_edits.iter().map(|(r, t)| (shift(r), t.clone())).collect();

        let tag_end = slice.find('>').unwrap_or(slice.len());
        let id_range = attr_value_range(&slice[..tag_end], &ID_ATTRS).ok_or_else(|| {
            ConsolidateError::MalformedDocument(format!("media {} has no identifier", node.range().start))
        })?;
        edits.push((id_range, clone_id.to_string()));

        // Nested object definitions would duplicate identifiers.
        let mut nested: Vec<Range<usize>> = Vec::new();
        for child in node.descendants().skip(1).filter(|n| n.is_element()) {
            let r = child.range();
            if document::object_id(&child).is_some() && !nested.iter().any(|n| n.start <= r.start && r.end <= n.end) {
                nested.push(r);
            }
        }
        edits.extend(nested.iter().map(|r| (shift(r), String::new())));

        if let Some(proxy_clone) = proxy_clone {
            for element in document::own_elements(node) {
                if element.tag_name().name() == "ProxyMedia" {
                    let r = element.range();
                    if let Some(value) = attr_value_range(&self.xml[r.clone()], &REF_ATTRS) {
                        let start = r.start - base;
                        edits.push(((start + value.start)..(start + value.end), proxy_clone.to_string()));
                    }
                }
            }
        }

        Ok(format!("\n{}", apply_edits(slice, edits)?))
    }

    fn rewrite_clip(&mut self, clip_id: &str, media_id: &str, zero: Ticks, retarget: Option<&str>) {
        let graph = self.graph;
        let Some(clip) = graph.clip(clip_id) else {
            return;
        };
        if clip.source != ClipSource::Media(media_id.to_string()) {
            return;
        }

        // Timing and link objects can be shared by several track items.
        match self.rebased.get(&clip.timing_id).copied() {
            Some(done) if done == zero => {}
            Some(_) => self.warn(format!(
                "Clip {} shares its source range with a clip in another output of {}, kept the first",
                clip_id, media_id
            )),
            None => {
                self.rebased.insert(clip.timing_id.clone(), zero);
                if zero != 0 {
                    self.rebase_points(&clip.timing_id, clip_id, media_id, zero);
                }
            }
        }

        let link_target = retarget.unwrap_or(media_id);
        match self.retargeted.get(&clip.link_id).cloned() {
            Some(done) if done == link_target => {}
            Some(_) => self.warn(format!(
                "Clip {} shares its media link with a clip in another output of {}, kept the first",
                clip_id, media_id
            )),
            None => {
                self.retargeted.insert(clip.link_id.clone(), link_target.to_string());
                if let Some(new_id) = retarget {
                    self.retarget_link(&clip.link_id, media_id, new_id);
                }
            }
        }
    }

    fn rebase_points(&mut self, timing_id: &str, clip_id: &str, media_id: &str, zero: Ticks) {
        let Some(node) = self.index.get(timing_id) else {
            return;
        };
        for element in document::own_elements(node) {
            if !matches!(element.tag_name().name(), "InPoint" | "OutPoint") {
                continue;
            }
            let Some(range) = text_range(&element) else { continue };
            let Ok(value) = self.xml[range.clone()].trim().parse::<Ticks>() else {
                continue;
            };
            let mut rebased = value.saturating_sub(zero);
            if rebased < 0 {
                self.warnings.push(format!(
                    "Clip {} reads before the consolidated range of {}",
                    clip_id, media_id
                ));
                rebased = 0;
            }
            self.edits.push((range, rebased.to_string()));
        }
    }

    /// Point the media reference held by `link_id` at `new_id`.
    fn retarget_link(&mut self, link_id: &str, media_id: &str, new_id: &str) {
        let Some(node) = self.index.get(link_id) else {
            return;
        };
        for element in document::own_elements(node) {
            if !LINK_TAGS.contains(&element.tag_name().name()) || document::reference(&element) != Some(media_id) {
                continue;
            }
            let r = element.range();
            if let Some(value) = attr_value_range(&self.xml[r.clone()], &REF_ATTRS) {
                self.edits
                    .push(((r.start + value.start)..(r.start + value.end), new_id.to_string()));
            }
        }
    }

    fn shift_angles(&mut self, media_id: &str, zero: Ticks) {
        let (graph, xml) = (self.graph, self.xml);
        for multicam in graph.nodes().iter().filter_map(|n| match n {
            crate::project::Node::Multicam(m) => Some(m),
            _ => None,
        }) {
            let Some(node) = self.index.get(&multicam.id) else {
                continue;
            };
            for element in document::own_elements(node) {
                if element.tag_name().name() != "Angle" || document::reference(&element) != Some(media_id) {
                    continue;
                }
                let offset = element
                    .attribute("Offset")
                    .and_then(|o| o.trim().parse::<Ticks>().ok())
                    .unwrap_or(0);
                let shifted = offset.saturating_sub(zero).to_string();
                let r = element.range();
                let text = &xml[r.clone()];
                match attr_value_range(text, &["Offset"]) {
                    Some(value) => self
                        .edits
                        .push(((r.start + value.start)..(r.start + value.end), shifted)),
                    None => {
                        let at = text.find(&['/', '>'][..]).unwrap_or(text.len());
                        self.edits.push((
                            (r.start + at)..(r.start + at),
                            format!(" Offset=\"{}\"", shifted),
                        ));
                    }
                }
            }
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Clips explicitly served by some main entry, per media.
fn assigned_clips(plan: &OperationPlan) -> HashMap<&str, HashSet<&str>> {
    let mut assigned: HashMap<&str, HashSet<&str>> = HashMap::new();
    for entry in plan.entries.iter().filter(|e| e.role == EntryRole::Main) {
        assigned
            .entry(entry.media_id.as_str())
            .or_default()
            .extend(entry.clip_ids.iter().map(String::as_str));
    }
    assigned
}

fn next_numeric_id(index: &ObjectIndex) -> u64 {
    index
        .objects
        .iter()
        .filter_map(|(id, _)| id.parse::<u64>().ok())
        .max()
        .map(|max| max + 1)
        .unwrap_or(1)
}

fn text_range(element: &roxmltree::Node) -> Option<Range<usize>> {
    element
        .children()
        .find(|c| c.is_text())
        .map(|t| t.range())
}

/// Byte range of the value of the first attribute in `names` inside `tag`.
fn attr_value_range(tag: &str, names: &[&str]) -> Option<Range<usize>> {
    for name in names {
        let mut from = 0;
        while let Some(found) = tag[from..].find(name) {
            let at = from + found;
            from = at + name.len();
            let preceded = tag[..at].chars().last().map(char::is_whitespace).unwrap_or(false);
            let rest = tag[from..].trim_start();
            if !preceded || !rest.starts_with('=') {
                continue;
            }
            let after_eq = &rest[1..].trim_start();
            let Some(quote) = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'') else {
                continue;
            };
            let value_start = tag.len() - after_eq.len() + 1;
            let value_len = tag[value_start..].find(quote)?;
            return Some(value_start..value_start + value_len);
        }
    }
    None
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> Result<String> {
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start).then(b.0.end.cmp(&a.0.end)));
    let mut out = text.to_string();
    let mut limit = usize::MAX;
    for (range, replacement) in edits {
        if range.end > limit {
            return Err(ConsolidateError::Validation(format!(
                "overlapping document edits at byte {}",
                range.start
            )));
        }
        limit = range.start;
        out.replace_range(range, &replacement);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SequenceAnalyzer;
    use crate::inventory::MediaInventory;
    use crate::options::{ConsolidationOptions, OptimizationMode, ProcessingMode};
    use crate::planner::Planner;
    use crate::project::parser::parse_project_xml;
    use crate::test_support::{ProjectBuilder, CHAINED_PROJECT};
    use crate::ticks::TICKS_PER_SECOND as S;

    fn written(plan: &OperationPlan) -> Vec<EntryOutcome> {
        plan.entries
            .iter()
            .map(|e| {
                if e.writes_file() {
                    EntryOutcome::Written {
                        destination: e.destination.clone(),
                        bytes: 1,
                        sidecars: Vec::new(),
                    }
                } else {
                    EntryOutcome::Referenced
                }
            })
            .collect()
    }

    fn consolidate(b: &ProjectBuilder, options: &ConsolidationOptions) -> (OperationPlan, ProjectGraph) {
        consolidate_xml(&b.xml(), options)
    }

    fn consolidate_xml(xml: &str, options: &ConsolidationOptions) -> (OperationPlan, ProjectGraph) {
        let graph = parse_project_xml(&xml, "t").unwrap();
        let status: HashMap<PathBuf, u64> = graph.media_items().map(|m| (m.path.clone(), 100)).collect();
        let inventory = MediaInventory::build_with(&graph, &status);
        let usage = SequenceAnalyzer::new(&graph, &inventory)
            .with_handles(options.handle_frames)
            .analyze(&[])
            .unwrap();
        let plan = Planner::new(&graph, &inventory, options).plan(&usage);
        (plan, graph)
    }

    fn two_clip_project() -> (ProjectBuilder, String, String, String) {
        let mut b = ProjectBuilder::new();
        let media = b.media("/footage/a&amp;b.mov", 60.0);
        let seq = b.sequence("Main");
        let track = b.video_track(&seq);
        let first = b.clip(&track, &media, 5.0, 10.0);
        let second = b.clip(&track, &media, 20.0, 30.0);
        (b, media, first, second)
    }

    fn out_options() -> ConsolidationOptions {
        ConsolidationOptions {
            output_path: PathBuf::from("/nonexistent-out"),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_process_round_trip_is_identical() {
        let (b, _, _, _) = two_clip_project();
        let options = ConsolidationOptions {
            processing_mode: ProcessingMode::NoProcess,
            ..out_options()
        };
        let (plan, graph) = consolidate(&b, &options);
        let xml = b.xml();
        let result = rewrite_project(&xml, &graph, &plan, &written(&plan)).unwrap();
        assert_eq!(result.xml, xml);

        let reparsed = parse_project_xml(&result.xml, "t").unwrap();
        for clip in graph.nodes().iter().filter_map(|n| match n {
            crate::project::Node::Clip(c) => Some(c),
            _ => None,
        }) {
            let after = reparsed.clip(&clip.id).unwrap();
            assert_eq!((after.source_in, after.source_out), (clip.source_in, clip.source_out));
        }
    }

    #[test]
    fn test_keep_files_rebases_clips() {
        let (b, media, first, second) = two_clip_project();
        let (plan, graph) = consolidate(&b, &out_options());
        let result = rewrite_project(&b.xml(), &graph, &plan, &written(&plan)).unwrap();
        let reparsed = parse_project_xml(&result.xml, "t").unwrap();

        let m = reparsed.media(&media).unwrap();
        assert_eq!(m.path, plan.entries[0].destination);
        assert_eq!(m.duration, Some(25 * S));
        let first = reparsed.clip(&first).unwrap();
        assert_eq!((first.source_in, first.source_out), (0, 5 * S));
        let second = reparsed.clip(&second).unwrap();
        assert_eq!((second.source_in, second.source_out), (15 * S, 25 * S));
        assert!(result.xml.contains("a&amp;b.mov"));
    }

    #[test]
    fn test_minimize_clones_media_and_retargets_clips() {
        let (b, media, first, second) = two_clip_project();
        let options = ConsolidationOptions {
            optimization_mode: OptimizationMode::Minimize,
            ..out_options()
        };
        let (plan, graph) = consolidate(&b, &options);
        assert_eq!(plan.entries.len(), 2);
        let result = rewrite_project(&b.xml(), &graph, &plan, &written(&plan)).unwrap();
        assert_eq!(result.cloned_media, 1);

        let reparsed = parse_project_xml(&result.xml, "t").unwrap();
        assert!(reparsed.unresolved().is_empty());
        assert_eq!(reparsed.media_items().count(), 2);

        let first = reparsed.clip(&first).unwrap();
        assert_eq!(first.source, ClipSource::Media(media.clone()));
        assert_eq!((first.source_in, first.source_out), (0, 5 * S));

        let second = reparsed.clip(&second).unwrap();
        let ClipSource::Media(clone) = &second.source else {
            panic!("clip lost its media");
        };
        assert_ne!(clone, &media);
        assert_eq!((second.source_in, second.source_out), (0, 10 * S));
        assert_eq!(reparsed.media(clone).unwrap().path, plan.entries[1].destination);
    }

    #[test]
    fn test_keep_files_rebases_chained_clips() {
        let (plan, graph) = consolidate_xml(CHAINED_PROJECT, &out_options());
        assert_eq!(plan.entries.len(), 1);
        let result = rewrite_project(CHAINED_PROJECT, &graph, &plan, &written(&plan)).unwrap();
        assert!(result.warnings.is_empty());

        let reparsed = parse_project_xml(&result.xml, "t").unwrap();
        assert_eq!(reparsed.media("m1").unwrap().path, plan.entries[0].destination);
        let first = reparsed.clip("30").unwrap();
        assert_eq!((first.source_in, first.source_out), (0, 10 * S));
        let second = reparsed.clip("40").unwrap();
        assert_eq!((second.source_in, second.source_out), (30 * S, 35 * S));
        // Track item timing is untouched.
        assert_eq!((second.start, second.end), (10 * S, 15 * S));
    }

    #[test]
    fn test_minimize_retargets_chained_media_source() {
        let options = ConsolidationOptions {
            optimization_mode: OptimizationMode::Minimize,
            ..out_options()
        };
        let (plan, graph) = consolidate_xml(CHAINED_PROJECT, &options);
        assert_eq!(plan.entries.len(), 2);
        let result = rewrite_project(CHAINED_PROJECT, &graph, &plan, &written(&plan)).unwrap();
        assert_eq!(result.cloned_media, 1);

        let reparsed = parse_project_xml(&result.xml, "t").unwrap();
        assert!(reparsed.unresolved().is_empty());
        let first = reparsed.clip("30").unwrap();
        assert_eq!(first.source, ClipSource::Media("m1".to_string()));
        assert_eq!((first.source_in, first.source_out), (0, 10 * S));

        let second = reparsed.clip("40").unwrap();
        let ClipSource::Media(clone) = &second.source else {
            panic!("clip lost its media");
        };
        assert_ne!(clone, "m1");
        assert_eq!(second.link_id, "43");
        assert_eq!((second.source_in, second.source_out), (0, 5 * S));
        assert_eq!(reparsed.media(clone).unwrap().path, plan.entries[1].destination);
    }

    #[test]
    fn test_shared_media_source_keeps_first_link() {
        let xml = CHAINED_PROJECT.replace(r#"<Source ObjectRef="43"/>"#, r#"<Source ObjectRef="33"/>"#);
        let options = ConsolidationOptions {
            optimization_mode: OptimizationMode::Minimize,
            ..out_options()
        };
        let (plan, graph) = consolidate_xml(&xml, &options);
        let result = rewrite_project(&xml, &graph, &plan, &written(&plan)).unwrap();

        assert!(result.warnings.iter().any(|w| w.contains("shares its media link")));
        let reparsed = parse_project_xml(&result.xml, "t").unwrap();
        assert_eq!(reparsed.clip("30").unwrap().source, ClipSource::Media("m1".to_string()));
        assert_eq!(reparsed.clip("40").unwrap().source, ClipSource::Media("m1".to_string()));
    }

    #[test]
    fn test_failed_entry_keeps_original_reference() {
        let (b, media, first, _) = two_clip_project();
        let (plan, graph) = consolidate(&b, &out_options());
        let outcomes = vec![EntryOutcome::Failed {
            message: "boom".to_string(),
            fatal: false,
        }];
        let result = rewrite_project(&b.xml(), &graph, &plan, &outcomes).unwrap();
        let reparsed = parse_project_xml(&result.xml, "t").unwrap();
        assert_eq!(reparsed.media(&media).unwrap().path, PathBuf::from("/footage/a&b.mov"));
        assert_eq!(reparsed.clip(&first).unwrap().source_in, 5 * S);
    }

    #[test]
    fn test_multicam_shifts_angle_offset() {
        let mut b = ProjectBuilder::new();
        let cam = b.media("/cam_a.mov", 100.0);
        let source = b.multicam_source(&[(&cam, 2.0)]);
        let seq = b.sequence("Multi");
        let track = b.video_track(&seq);
        let clip = b.multicam_clip(&track, &source, 0, 10.0, 20.0);

        let (plan, graph) = consolidate(&b, &out_options());
        assert_eq!(plan.entries[0].zero_point(), 12 * S);
        let result = rewrite_project(&b.xml(), &graph, &plan, &written(&plan)).unwrap();
        let reparsed = parse_project_xml(&result.xml, "t").unwrap();

        let angle = &reparsed.multicam(&source).unwrap().angles[0];
        assert_eq!(angle.offset, -10 * S);
        // Media time of the clip start is now 10 + (-10) = 0 in the trimmed file.
        let clip = reparsed.clip(&clip).unwrap();
        assert_eq!(clip.source_in, 10 * S);
    }

    #[test]
    fn test_attr_value_range() {
        let tag = r#"<Source ObjectURef="abc-1"/>"#;
        let r = attr_value_range(tag, &REF_ATTRS).unwrap();
        assert_eq!(&tag[r], "abc-1");
        let tag = "<Media  ObjectID = '42'>";
        let r = attr_value_range(tag, &ID_ATTRS).unwrap();
        assert_eq!(&tag[r], "42");
    }
}
