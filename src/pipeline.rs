//! The main AV processing pipeline.
//!
//! Topology (fixed):
//!
//! ```text
//! present source -> 1x2 splitter -> compositor -+-> combined mux -> srt sink
//!                               \-> present mux | -> srt sink
//! camera source  -> 1x2 splitter -> compositor -+
//!                               \-> camera mux ----> srt sink
//! audio source   -> 1x3 splitter -> {combined, present, camera} mux
//! ```
//!
//! Assembly is single-threaded and fail-fast: the topology is marked
//! constructed only once every bin was built and every link succeeded, and a
//! partially built pipeline is never started.

use crate::bins::{
    compositor::{compositor_bin, CombinedViewConfig},
    muxer::mux_bin,
    sources,
    sources::VideoPattern,
    splitter::splitter,
    srt::{srt_sink, SRT_SINK_ELEMENT},
    BinError, SubGraph,
};
use crate::caps::{AudioCaps, Fraction, VideoCaps};
use crate::config::DaemonConfig;
use crate::srt_stats::{SrtStats, StatsError};
use gstreamer as gst;
use gstreamer::prelude::*;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid source kind '{kind}' for the {channel} channel")]
    InvalidSourceKind { channel: &'static str, kind: String },

    #[error(transparent)]
    Bin(#[from] BinError),

    #[error("failed to add bin '{bin}' to the pipeline: {source}")]
    Add {
        bin: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("failed to link '{from}' to '{to}': {source}")]
    Link {
        from: String,
        to: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("pipeline not constructed")]
    NotConstructed,

    #[error("element '{0}' has no '{1}' property")]
    MissingProperty(String, &'static str),

    #[error("'stats' value is not a structure")]
    StatsNotAStructure,

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("failed to change pipeline state: {0}")]
    StateChange(#[from] gst::StateChangeError),
}

/// Coarse lifecycle phase of the running graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Void,
    Null,
    Ready,
    Paused,
    Playing,
}

impl From<gst::State> for RunState {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::VoidPending => RunState::Void,
            gst::State::Ready => RunState::Ready,
            gst::State::Paused => RunState::Paused,
            gst::State::Playing => RunState::Playing,
            _ => RunState::Null,
        }
    }
}

/// The three output programs, used as stable labels in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkId {
    Combined,
    Present,
    Camera,
}

impl SinkId {
    pub const ALL: [SinkId; 3] = [SinkId::Combined, SinkId::Present, SinkId::Camera];

    pub fn label(self) -> &'static str {
        match self {
            SinkId::Combined => "combined",
            SinkId::Present => "present",
            SinkId::Camera => "camera",
        }
    }
}

fn caps_1920x1080p30() -> VideoCaps {
    VideoCaps::raw(1920, 1080, Fraction::new(30, 1))
}

fn caps_1440x810p30() -> VideoCaps {
    VideoCaps::raw(1440, 810, Fraction::new(30, 1))
}

fn caps_480x270p30() -> VideoCaps {
    VideoCaps::raw(480, 270, Fraction::new(30, 1))
}

fn caps_stereo_48khz() -> AudioCaps {
    AudioCaps::raw(2, 48000)
}

/// The assembled processing graph and its sub-units.
#[derive(Debug)]
pub struct Pipeline {
    constructed: bool,
    pipeline: gst::Pipeline,

    camera_src: SubGraph,
    present_src: SubGraph,
    audio_src: SubGraph,

    // One fan-out per source: video feeds its own mux and the compositor,
    // audio feeds all three muxes.
    splitter_present: SubGraph,
    splitter_camera: SubGraph,
    splitter_audio: SubGraph,

    compositor: SubGraph,

    muxer_combined: SubGraph,
    muxer_present: SubGraph,
    muxer_camera: SubGraph,

    srt_combined: SubGraph,
    srt_present: SubGraph,
    srt_camera: SubGraph,
}

const VIDEO_SOURCE_KINDS: [&str; 3] = ["videotestsrc", "v4l2src", "decklinkvideosrc"];
const AUDIO_SOURCE_KINDS: [&str; 3] = ["audiotestsrc", "alsasrc", "decklinkaudiosrc"];

/// Reject any unknown source kind before a single element is created.
fn validate_source_kinds(config: &DaemonConfig) -> Result<(), PipelineError> {
    let channels = [
        ("presentation", &config.source_present, &VIDEO_SOURCE_KINDS),
        ("camera", &config.source_camera, &VIDEO_SOURCE_KINDS),
        ("audio", &config.source_audio, &AUDIO_SOURCE_KINDS),
    ];
    for (channel, kind, known) in channels {
        if !known.contains(&kind.as_str()) {
            return Err(PipelineError::InvalidSourceKind {
                channel,
                kind: kind.clone(),
            });
        }
    }
    Ok(())
}

fn video_source(
    channel: &'static str,
    kind: &str,
    opts: &str,
    name: &str,
    caps: &VideoCaps,
) -> Result<SubGraph, PipelineError> {
    let bin = match kind {
        "videotestsrc" => sources::video_test_source(name, VideoPattern::Smpte, caps)?,
        "v4l2src" => sources::v4l2_source(name, opts, caps)?,
        "decklinkvideosrc" => sources::decklink_video_source(name, opts, caps)?,
        _ => {
            return Err(PipelineError::InvalidSourceKind {
                channel,
                kind: kind.to_string(),
            })
        }
    };
    Ok(bin)
}

fn audio_source(
    kind: &str,
    opts: &str,
    name: &str,
    caps: &AudioCaps,
) -> Result<SubGraph, PipelineError> {
    let bin = match kind {
        "audiotestsrc" => sources::audio_test_source(name, caps)?,
        "alsasrc" => sources::alsa_source(name, opts, caps)?,
        "decklinkaudiosrc" => sources::decklink_audio_source(name, opts, caps)?,
        _ => {
            return Err(PipelineError::InvalidSourceKind {
                channel: "audio",
                kind: kind.to_string(),
            })
        }
    };
    Ok(bin)
}

impl Pipeline {
    /// Assemble the full topology from the daemon configuration.
    ///
    /// Fail-fast: the first failing step aborts assembly and no partially
    /// built pipeline is returned.
    pub fn new(config: &DaemonConfig) -> Result<Self, PipelineError> {
        validate_source_kinds(config)?;

        let output_caps = caps_1920x1080p30();
        let present_src_caps = caps_1920x1080p30();
        let camera_src_caps = caps_1920x1080p30();
        let audio_caps = caps_stereo_48khz();

        let mut present_comp_caps = caps_1440x810p30();
        let mut camera_comp_caps = caps_480x270p30();

        let present_src = video_source(
            "presentation",
            &config.source_present,
            &config.source_present_opts,
            "present",
            &present_src_caps,
        )?;
        let camera_src = video_source(
            "camera",
            &config.source_camera,
            &config.source_camera_opts,
            "cam",
            &camera_src_caps,
        )?;
        let audio_src = audio_source(
            &config.source_audio,
            &config.source_audio_opts,
            "master",
            &audio_caps,
        )?;

        let splitter_present = splitter("splitter_present", 2)?;
        let splitter_camera = splitter("splitter_cam", 2)?;
        let splitter_audio = splitter("splitter_audio", 3)?;

        // Scaling and compositing on the GPU takes a large load off the
        // CPU. Keep buffers in VRAM between the scaler and the compositor.
        if config.hw_accel {
            present_comp_caps.media_type = "video/x-raw(memory:VAMemory)".to_string();
            camera_comp_caps.media_type = "video/x-raw(memory:VAMemory)".to_string();
        }
        let compositor = compositor_bin(
            "compositor",
            &CombinedViewConfig {
                output: output_caps.clone(),
                presentation: present_comp_caps,
                camera: camera_comp_caps,
                hw_accel: config.hw_accel,
            },
        )?;

        let video_kbps = config.video_bitrate_kbps;
        let audio_kbps = config.audio_bitrate_kbps;
        let muxer_combined = mux_bin("muxer_comb", video_kbps, audio_kbps, config.hw_accel)?;
        let muxer_present = mux_bin("muxer_present", video_kbps, audio_kbps, config.hw_accel)?;
        let muxer_camera = mux_bin("muxer_cam", video_kbps, audio_kbps, config.hw_accel)?;

        let srt_combined = srt_sink("srt_combined", &config.listen_srt_combined)?;
        let srt_present = srt_sink("srt_present", &config.listen_srt_present)?;
        let srt_camera = srt_sink("srt_cam", &config.listen_srt_camera)?;

        let pipeline = gst::Pipeline::builder().name("castd").build();

        let mut this = Self {
            constructed: false,
            pipeline,
            camera_src,
            present_src,
            audio_src,
            splitter_present,
            splitter_camera,
            splitter_audio,
            compositor,
            muxer_combined,
            muxer_present,
            muxer_camera,
            srt_combined,
            srt_present,
            srt_camera,
        };

        this.insert_and_link()?;
        this.constructed = true;
        info!("pipeline assembled: 13 bins, 14 links");

        Ok(this)
    }

    fn insert_and_link(&mut self) -> Result<(), PipelineError> {
        let bins = [
            // Sources
            &self.camera_src,
            &self.present_src,
            &self.audio_src,
            // Splitters
            &self.splitter_present,
            &self.splitter_camera,
            &self.splitter_audio,
            // Processors
            &self.compositor,
            // Muxers
            &self.muxer_combined,
            &self.muxer_present,
            &self.muxer_camera,
            // Sinks
            &self.srt_combined,
            &self.srt_present,
            &self.srt_camera,
        ];
        for bin in bins {
            self.pipeline.add(bin.bin()).map_err(|e| PipelineError::Add {
                bin: bin.name().to_string(),
                source: e,
            })?;
        }

        // Boundary pads are named, so every link is pinned explicitly; the
        // engine must never pick a pad pairing on its own.
        let links = [
            (&self.present_src, "src", &self.splitter_present, "sink"),
            (&self.camera_src, "src", &self.splitter_camera, "sink"),
            (&self.audio_src, "src", &self.splitter_audio, "sink"),
            (&self.splitter_present, "src_0", &self.compositor, "sink0"),
            (&self.splitter_present, "src_1", &self.muxer_present, "video_sink"),
            (&self.splitter_camera, "src_0", &self.compositor, "sink1"),
            (&self.splitter_camera, "src_1", &self.muxer_camera, "video_sink"),
            (&self.splitter_audio, "src_0", &self.muxer_combined, "audio_sink"),
            (&self.splitter_audio, "src_1", &self.muxer_present, "audio_sink"),
            (&self.splitter_audio, "src_2", &self.muxer_camera, "audio_sink"),
            (&self.compositor, "src", &self.muxer_combined, "video_sink"),
            (&self.muxer_combined, "src", &self.srt_combined, "sink"),
            (&self.muxer_present, "src", &self.srt_present, "sink"),
            (&self.muxer_camera, "src", &self.srt_camera, "sink"),
        ];
        for (from, from_pad, to, to_pad) in links {
            from.element()
                .link_pads(Some(from_pad), to.element(), Some(to_pad))
                .map_err(|e| PipelineError::Link {
                    from: format!("{}.{}", from.name(), from_pad),
                    to: format!("{}.{}", to.name(), to_pad),
                    source: e,
                })?;
        }

        Ok(())
    }

    pub fn constructed(&self) -> bool {
        self.constructed
    }

    /// Set the overall run state to Playing. Final step of startup,
    /// performed by the caller once assembly has fully succeeded.
    pub fn start(&self) -> Result<(), PipelineError> {
        self.pipeline.set_state(gst::State::Playing)?;
        Ok(())
    }

    /// Drop the graph to Null synchronously.
    pub fn stop(&self) -> Result<(), PipelineError> {
        self.pipeline.set_state(gst::State::Null)?;
        Ok(())
    }

    pub fn bus(&self) -> Option<gst::Bus> {
        self.pipeline.bus()
    }

    /// Current coarse run state as reported by the engine.
    pub fn run_state(&self) -> RunState {
        let (_, current, _) = self.pipeline.state(gst::ClockTime::ZERO);
        current.into()
    }

    /// The filter graph as `text/vnd.graphviz`.
    pub fn dot_graph(&self, details: gst::DebugGraphDetails) -> String {
        self.pipeline.debug_to_dot_data(details).to_string()
    }

    fn sink_bin(&self, sink: SinkId) -> &SubGraph {
        match sink {
            SinkId::Combined => &self.srt_combined,
            SinkId::Present => &self.srt_present,
            SinkId::Camera => &self.srt_camera,
        }
    }

    /// Decode the statistics of one SRT sink.
    ///
    /// Engine elements are thread-safe, so this may be called from the
    /// sampler while the graph is running.
    pub fn srt_sink_stats(&self, sink: SinkId) -> Result<SrtStats, PipelineError> {
        if !self.constructed {
            return Err(PipelineError::NotConstructed);
        }

        let element = self.sink_bin(sink).by_base_name(SRT_SINK_ELEMENT)?;
        if !element.has_property("stats") {
            return Err(PipelineError::MissingProperty(
                element.name().to_string(),
                "stats",
            ));
        }

        let value = element.property_value("stats");
        let structure = value
            .get::<gst::Structure>()
            .map_err(|_| PipelineError::StatsNotAStructure)?;

        Ok(SrtStats::from_structure(&structure)?)
    }
}
