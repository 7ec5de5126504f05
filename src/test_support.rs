//! Fixture builder for project documents used across unit tests.

use crate::encoder::MediaEncoder;
use crate::error::{ConsolidateError, Result};
use crate::interval::Interval;
use crate::options::TranscodePreset;
use crate::project::document;
use crate::ticks::{seconds_to_ticks, TICKS_PER_SECOND};
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};

/// Project laid out with track groups, sub-clips, clips and media sources
/// between the sequence and its media. Two track items use `/footage/shot.mov`
/// at 20-30 s and 50-55 s, each through its own media source object.
pub const CHAINED_PROJECT: &str = r#"<PremiereData Version="3">
    <Sequence ObjectUID="seq">
        <Name>Chained</Name>
        <TrackGroups>
            <TrackGroup Index="0"><First>video</First><Second ObjectRef="20"/></TrackGroup>
            <TrackGroup Index="1"><First>audio</First><Second ObjectRef="21"/></TrackGroup>
        </TrackGroups>
    </Sequence>
    <VideoTrackGroup ObjectID="20">
        <TrackGroup><Tracks><Track Index="0" ObjectURef="vt"/></Tracks></TrackGroup>
    </VideoTrackGroup>
    <AudioTrackGroup ObjectID="21">
        <TrackGroup><Tracks><Track Index="0" ObjectURef="at"/></Tracks></TrackGroup>
    </AudioTrackGroup>
    <AudioClipTrack ObjectUID="at">
        <ClipTrack><ClipItems><TrackItems/></ClipItems></ClipTrack>
    </AudioClipTrack>
    <VideoClipTrack ObjectUID="vt">
        <ClipTrack><ClipItems><TrackItems>
            <TrackItem Index="0" ObjectRef="30"/>
            <TrackItem Index="1" ObjectRef="40"/>
        </TrackItems></ClipItems></ClipTrack>
    </VideoClipTrack>
    <VideoClipTrackItem ObjectID="30">
        <ClipTrackItem>
            <TrackItem><Start>0</Start><End>2540160000000</End></TrackItem>
            <SubClip ObjectRef="31"/>
        </ClipTrackItem>
    </VideoClipTrackItem>
    <SubClip ObjectID="31"><Clip ObjectRef="32"/><MasterClip ObjectURef="mc"/></SubClip>
    <VideoClip ObjectID="32">
        <Clip>
            <Source ObjectRef="33"/>
            <InPoint>5080320000000</InPoint>
            <OutPoint>7620480000000</OutPoint>
        </Clip>
    </VideoClip>
    <VideoMediaSource ObjectID="33"><MediaSource><Media ObjectURef="m1"/></MediaSource></VideoMediaSource>
    <VideoClipTrackItem ObjectID="40">
        <ClipTrackItem>
            <TrackItem><Start>2540160000000</Start><End>3810240000000</End></TrackItem>
            <SubClip ObjectRef="41"/>
        </ClipTrackItem>
    </VideoClipTrackItem>
    <SubClip ObjectID="41"><Clip ObjectRef="42"/><MasterClip ObjectURef="mc"/></SubClip>
    <VideoClip ObjectID="42">
        <Clip>
            <Source ObjectRef="43"/>
            <InPoint>12700800000000</InPoint>
            <OutPoint>13970880000000</OutPoint>
        </Clip>
    </VideoClip>
    <VideoMediaSource ObjectID="43"><MediaSource><Media ObjectURef="m1"/></MediaSource></VideoMediaSource>
    <MasterClip ObjectUID="mc"><Name>Shot</Name></MasterClip>
    <Media ObjectUID="m1">
        <ActualMediaFilePath>/footage/shot.mov</ActualMediaFilePath>
        <MediaDuration>15240960000000</MediaDuration>
    </Media>
</PremiereData>"#;

#[derive(Default)]
struct MediaFixture {
    id: String,
    path: String,
    duration: f64,
    codec: Option<String>,
    proxy: Option<String>,
    kind: Option<String>,
    fps: Option<f64>,
    sidecars: Vec<String>,
}

struct ClipFixture {
    id: String,
    start: f64,
    end: f64,
    source_in: f64,
    source_out: f64,
    link: String,
}

#[derive(Default)]
pub struct ProjectBuilder {
    next_id: usize,
    bins: Vec<String>,
    media: Vec<MediaFixture>,
    master_clips: Vec<String>,
    sequences: Vec<(String, String, Vec<String>)>,
    tracks: Vec<(String, bool, Vec<ClipFixture>)>,
    multicams: Vec<String>,
    raw: Vec<String>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 100,
            ..Default::default()
        }
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn numeric_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    pub fn bin(&mut self, name: &str, parent: Option<&str>) -> String {
        let id = self.id("bin");
        let parent = parent
            .map(|p| format!("<ParentBin ObjectURef=\"{}\"/>", p))
            .unwrap_or_default();
        self.bins.push(format!(
            "<BinProjectItem ObjectUID=\"{}\"><Name>{}</Name>{}</BinProjectItem>",
            id, name, parent
        ));
        id
    }

    pub fn media(&mut self, path: &str, duration_secs: f64) -> String {
        let id = self.id("media");
        self.media.push(MediaFixture {
            id: id.clone(),
            path: path.to_string(),
            duration: duration_secs,
            ..Default::default()
        });
        id
    }

    fn media_mut(&mut self, id: &str) -> &mut MediaFixture {
        self.media
            .iter_mut()
            .find(|m| m.id == id)
            .expect("unknown media fixture")
    }

    pub fn set_codec(&mut self, media: &str, codec: &str) {
        self.media_mut(media).codec = Some(codec.to_string());
    }

    pub fn set_proxy(&mut self, media: &str, proxy: &str) {
        self.media_mut(media).proxy = Some(proxy.to_string());
    }

    pub fn set_kind(&mut self, media: &str, kind: &str) {
        self.media_mut(media).kind = Some(kind.to_string());
    }

    pub fn set_fps(&mut self, media: &str, fps: f64) {
        self.media_mut(media).fps = Some(fps);
    }

    pub fn add_sidecar(&mut self, media: &str, path: &str) {
        self.media_mut(media).sidecars.push(path.to_string());
    }

    pub fn master_clip(&mut self, name: &str, media: &str, bin: Option<&str>) -> String {
        let id = self.id("mc");
        let bin = bin
            .map(|b| format!("<ParentBin ObjectURef=\"{}\"/>", b))
            .unwrap_or_default();
        self.master_clips.push(format!(
            "<MasterClip ObjectUID=\"{}\"><Name>{}</Name><Media ObjectURef=\"{}\"/>{}</MasterClip>",
            id, name, media, bin
        ));
        id
    }

    pub fn sequence(&mut self, name: &str) -> String {
        let id = self.id("seq");
        self.sequences.push((id.clone(), name.to_string(), Vec::new()));
        id
    }

    fn track(&mut self, sequence: &str, audio: bool) -> String {
        let id = self.numeric_id();
        let seq = self
            .sequences
            .iter_mut()
            .find(|s| s.0 == sequence)
            .expect("unknown sequence fixture");
        seq.2.push(id.clone());
        self.tracks.push((id.clone(), audio, Vec::new()));
        id
    }

    pub fn video_track(&mut self, sequence: &str) -> String {
        self.track(sequence, false)
    }

    pub fn audio_track(&mut self, sequence: &str) -> String {
        self.track(sequence, true)
    }

    fn push_clip(&mut self, track: &str, start: Option<f64>, source_in: f64, source_out: f64, link: String) -> String {
        let id = self.numeric_id();
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.0 == track)
            .expect("unknown track fixture");
        let start = start.unwrap_or_else(|| track.2.last().map(|c| c.end).unwrap_or(0.0));
        track.2.push(ClipFixture {
            id: id.clone(),
            start,
            end: start + (source_out - source_in),
            source_in,
            source_out,
            link,
        });
        id
    }

    /// Clip appended after the last clip of the track.
    pub fn clip(&mut self, track: &str, media: &str, source_in: f64, source_out: f64) -> String {
        let link = format!("<Source ObjectURef=\"{}\"/>", media);
        self.push_clip(track, None, source_in, source_out, link)
    }

    pub fn clip_at(&mut self, track: &str, media: &str, start: f64, source_in: f64, source_out: f64) -> String {
        let link = format!("<Source ObjectURef=\"{}\"/>", media);
        self.push_clip(track, Some(start), source_in, source_out, link)
    }

    pub fn nested(&mut self, track: &str, sequence: &str, source_in: f64, source_out: f64) -> String {
        let link = format!("<NestedSequence ObjectURef=\"{}\"/>", sequence);
        self.push_clip(track, None, source_in, source_out, link)
    }

    pub fn multicam_source(&mut self, angles: &[(&str, f64)]) -> String {
        let id = self.id("mcs");
        let mut xml = format!("<MulticamSource ObjectUID=\"{}\">", id);
        for (media, offset) in angles {
            let _ = write!(
                xml,
                "<Angle ObjectURef=\"{}\" Offset=\"{}\"/>",
                media,
                seconds_to_ticks(*offset)
            );
        }
        xml.push_str("</MulticamSource>");
        self.multicams.push(xml);
        id
    }

    pub fn multicam_clip(&mut self, track: &str, source: &str, selected: usize, source_in: f64, source_out: f64) -> String {
        let link = format!(
            "<MulticamSource ObjectURef=\"{}\"/><SelectedAngle>{}</SelectedAngle>",
            source, selected
        );
        self.push_clip(track, None, source_in, source_out, link)
    }

    /// Arbitrary extra XML placed before the closing root tag.
    pub fn raw(&mut self, xml: &str) {
        self.raw.push(xml.to_string());
    }

    pub fn xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<PremiereData Version=\"3\">\n");
        for bin in &self.bins {
            let _ = writeln!(out, "  {}", bin);
        }
        for m in &self.media {
            let _ = write!(
                out,
                "  <Media ObjectUID=\"{}\"><ActualMediaFilePath>{}</ActualMediaFilePath><MediaDuration>{}</MediaDuration>",
                m.id,
                m.path,
                seconds_to_ticks(m.duration)
            );
            if let Some(codec) = &m.codec {
                let _ = write!(out, "<Codec>{}</Codec>", codec);
            }
            if let Some(kind) = &m.kind {
                let _ = write!(out, "<MediaKind>{}</MediaKind>", kind);
            }
            if let Some(fps) = m.fps {
                let _ = write!(out, "<FrameRate>{}</FrameRate>", (TICKS_PER_SECOND as f64 / fps).round() as i64);
            }
            if let Some(proxy) = &m.proxy {
                let _ = write!(out, "<ProxyMedia ObjectURef=\"{}\"/>", proxy);
            }
            for sidecar in &m.sidecars {
                let _ = write!(out, "<Sidecar>{}</Sidecar>", sidecar);
            }
            out.push_str("</Media>\n");
        }
        for mc in &self.master_clips {
            let _ = writeln!(out, "  {}", mc);
        }
        for mcs in &self.multicams {
            let _ = writeln!(out, "  {}", mcs);
        }
        let audio: HashMap<&str, bool> = self.tracks.iter().map(|t| (t.0.as_str(), t.1)).collect();
        for (id, name, tracks) in &self.sequences {
            let _ = write!(out, "  <Sequence ObjectUID=\"{}\"><Name>{}</Name><FrameRate>{}</FrameRate>", id, name, TICKS_PER_SECOND / 25);
            for track in tracks {
                let tag = if audio.get(track.as_str()).copied().unwrap_or(false) { "AudioTrack" } else { "VideoTrack" };
                let _ = write!(out, "<{} ObjectRef=\"{}\"/>", tag, track);
            }
            out.push_str("</Sequence>\n");
        }
        for (id, is_audio, clips) in &self.tracks {
            let prefix = if *is_audio { "Audio" } else { "Video" };
            let _ = write!(out, "  <{}ClipTrack ObjectID=\"{}\"><ClipItems>", prefix, id);
            for clip in clips {
                let _ = write!(out, "<TrackItem ObjectRef=\"{}\"/>", clip.id);
            }
            let _ = writeln!(out, "</ClipItems></{}ClipTrack>", prefix);
            for clip in clips {
                let _ = writeln!(
                    out,
                    "  <{p}ClipTrackItem ObjectID=\"{}\"><Start>{}</Start><End>{}</End><InPoint>{}</InPoint><OutPoint>{}</OutPoint>{}</{p}ClipTrackItem>",
                    clip.id,
                    seconds_to_ticks(clip.start),
                    seconds_to_ticks(clip.end),
                    seconds_to_ticks(clip.source_in),
                    seconds_to_ticks(clip.source_out),
                    clip.link,
                    p = prefix
                );
            }
        }
        for raw in &self.raw {
            let _ = writeln!(out, "  {}", raw);
        }
        out.push_str("</PremiereData>\n");
        out
    }

    pub fn gz(&self) -> Vec<u8> {
        document::compress(&self.xml()).expect("compress fixture")
    }

    /// Write the gzip project into `dir` and return its path.
    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.gz()).expect("write fixture");
        path
    }
}

/// Create a file of `len` bytes, with parent directories.
pub fn touch(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(path, vec![7u8; len]).expect("write fixture file");
}

/// Encoder double writing small placeholder files
#[derive(Clone, Default)]
pub struct FakeEncoder {
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Each operation waits for one permit
    pub gate: Option<Arc<Semaphore>>,
    /// Receives the input file name when an operation starts
    pub started: Option<mpsc::UnboundedSender<String>>,
    /// Operations on inputs containing this text fail
    pub fail_on: Option<String>,
    /// Operations on inputs containing this text panic
    pub panic_on: Option<String>,
    /// Every operation fails as if the binary were missing
    pub missing: bool,
    pub detected_codec: Option<String>,
}

impl FakeEncoder {
    /// Encoder whose operations block until the returned semaphore gets permits.
    pub fn gated() -> (Self, Arc<Semaphore>, mpsc::UnboundedReceiver<String>) {
        let gate = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let encoder = Self {
            gate: Some(gate.clone()),
            started: Some(tx),
            ..Default::default()
        };
        (encoder, gate, rx)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn op(&self, kind: &str, input: &Path, output: &Path) -> Result<u64> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Some(started) = &self.started {
            let _ = started.send(name.clone());
        }
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ConsolidateError::Encoder(e.to_string()))?
                .forget();
        }
        self.calls.lock().unwrap().push(format!("{} {}", kind, name));

        if self.missing {
            return Err(ConsolidateError::MissingDependency("ffmpeg".to_string()));
        }
        if self.panic_on.as_deref().map(|f| name.contains(f)).unwrap_or(false) {
            panic!("encoder crashed on {}", name);
        }
        if self.fail_on.as_deref().map(|f| name.contains(f)).unwrap_or(false) {
            return Err(ConsolidateError::Encoder(format!("cannot process {}", name)));
        }
        let body = format!("{} of {}", kind, name);
        tokio::fs::write(output, &body).await?;
        Ok(body.len() as u64)
    }
}

impl MediaEncoder for FakeEncoder {
    async fn version(&self) -> Result<String> {
        if self.missing {
            return Err(ConsolidateError::MissingDependency("ffmpeg".to_string()));
        }
        Ok("ffmpeg version 6.1-fake".to_string())
    }

    async fn detect_codec(&self, _path: &Path) -> Result<Option<String>> {
        Ok(self.detected_codec.clone())
    }

    async fn trim(&self, input: &Path, output: &Path, _span: Interval) -> Result<()> {
        self.op("trim", input, output).await.map(|_| ())
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _span: Option<Interval>,
        _preset: TranscodePreset,
    ) -> Result<()> {
        self.op("transcode", input, output).await.map(|_| ())
    }

    async fn copy(&self, input: &Path, output: &Path) -> Result<u64> {
        self.op("copy", input, output).await
    }
}
