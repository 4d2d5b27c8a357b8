//! Source bins: test generators, V4L2/ALSA capture devices and Decklink
//! professional capture cards.
//!
//! Each builder returns a bin exposing a single `src` boundary pad (via the
//! engine's automatic ghost pads on the trailing capsfilter/queue).

use super::{BinError, Chain, ElementSpec, SubGraph};
use crate::caps::{AudioCaps, VideoCaps};

/// Test patterns for [`video_test_source`], one-to-one with the engine's
/// `videotestsrc` pattern property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum VideoPattern {
    /// SMPTE 100% color bars
    Smpte = 0,
    /// Random (television snow)
    Snow = 1,
    /// 100% Black
    Black = 2,
    /// 100% White
    White = 3,
    Red = 4,
    Green = 5,
    Blue = 6,
    Checkers1 = 7,
    Checkers2 = 8,
    Checkers4 = 9,
    Checkers8 = 10,
    Circular = 11,
    Blink = 12,
    /// SMPTE 75% color bars
    Smpte75 = 13,
    ZonePlate = 14,
    Gamut = 15,
    ChromaZonePlate = 16,
    SolidColor = 17,
    /// Moving ball
    Ball = 18,
    Smpte100 = 19,
    Bar = 20,
    Pinwheel = 21,
    Spokes = 22,
    Gradient = 23,
    Colors = 24,
    /// SMPTE test pattern, RP 219 conformant
    SmpteRp219 = 25,
}

/// Video test generator with a single `src` boundary pad.
pub fn video_test_source(
    name: &str,
    pattern: VideoPattern,
    caps: &VideoCaps,
) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new()
        .then(ElementSpec::new("videotestsrc").prop("pattern", pattern as i32))
        .then(ElementSpec::new("capsfilter").prop("caps", caps.render()))];

    SubGraph::from_chains(name, &chains, true)
}

/// V4L2 capture device, scaled and rate-adjusted to the target caps.
pub fn v4l2_source(name: &str, opts: &str, caps: &VideoCaps) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new()
        .then(ElementSpec::new("v4l2src").raw_props(opts))
        .then(
            ElementSpec::named("capsfilter", "capsfilter_device")
                .prop("caps", "video/x-raw,width=1920,height=1080"),
        )
        .then(ElementSpec::new("queue"))
        .then(ElementSpec::new("videoconvertscale"))
        .then(ElementSpec::new("capsfilter").prop("caps", caps.render()))];

    SubGraph::from_chains(name, &chains, true)
}

/// Decklink SDI/HDMI video capture.
pub fn decklink_video_source(name: &str, opts: &str, caps: &VideoCaps) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new()
        .then(ElementSpec::new("decklinkvideosrc").raw_props(opts))
        .then(ElementSpec::new("videoconvertscale"))
        .then(ElementSpec::new("videorate"))
        .then(ElementSpec::new("capsfilter").prop("caps", caps.render()))];

    SubGraph::from_chains(name, &chains, true)
}

/// Audio test generator with a single `src` boundary pad.
pub fn audio_test_source(name: &str, caps: &AudioCaps) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new()
        .then(ElementSpec::new("audiotestsrc"))
        .then(ElementSpec::new("capsfilter").prop("caps", caps.render()))];

    SubGraph::from_chains(name, &chains, true)
}

/// ALSA capture device.
///
/// Conversion, resampling and timestamping are isolated between two queues;
/// leaving one out results in clock problems.
pub fn alsa_source(name: &str, opts: &str, caps: &AudioCaps) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new()
        .then(ElementSpec::new("alsasrc").raw_props(opts))
        .then(ElementSpec::named("queue", "queue0"))
        .then(ElementSpec::new("audioconvert"))
        .then(ElementSpec::new("audioresample"))
        .then(ElementSpec::new("audiorate"))
        .then(ElementSpec::new("capsfilter").prop("caps", caps.render()))
        .then(ElementSpec::named("queue", "queue1"))];

    SubGraph::from_chains(name, &chains, true)
}

/// Decklink SDI/HDMI audio capture.
pub fn decklink_audio_source(name: &str, opts: &str, caps: &AudioCaps) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new()
        .then(ElementSpec::new("decklinkaudiosrc").raw_props(opts))
        .then(ElementSpec::named("queue", "queue0"))
        .then(ElementSpec::new("audioconvert"))
        .then(ElementSpec::new("audioresample"))
        .then(ElementSpec::new("capsfilter").prop("caps", caps.render()))
        .then(ElementSpec::named("queue", "queue1"))];

    SubGraph::from_chains(name, &chains, true)
}
