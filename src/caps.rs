//! Caps filter descriptions for the pipeline bins.
//!
//! A caps filter constrains the media format negotiated between two linked
//! elements. The descriptors here are plain values that render to the
//! GStreamer caps string at the engine boundary, so the rest of the crate
//! never does string surgery on caps.

use std::fmt;

/// A reduced or unreduced positive integer ratio, used for frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Video format constraint.
///
/// Renders to e.g. `video/x-raw,width=1920,height=1080,framerate=30/1`.
/// Equal descriptors render identically, which keeps repeated topology
/// builds deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCaps {
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub framerate: Fraction,
    /// Extra constraint fields appended verbatim, e.g. `format=NV12`.
    pub extra: Option<String>,
}

impl VideoCaps {
    pub fn raw(width: u32, height: u32, framerate: Fraction) -> Self {
        Self {
            media_type: "video/x-raw".to_string(),
            width,
            height,
            framerate,
            extra: None,
        }
    }

    /// Render the caps string fragment. Pure function of the fields.
    pub fn render(&self) -> String {
        let mut s = format!(
            "{},width={},height={},framerate={}",
            self.media_type, self.width, self.height, self.framerate
        );
        if let Some(extra) = &self.extra {
            s.push(',');
            s.push_str(extra);
        }
        s
    }

    /// Parse a rendered fragment back into a descriptor.
    ///
    /// Only the fields `render()` emits are understood; anything else lands
    /// in `extra`. Used by tests to verify the round-trip and by nothing on
    /// the hot path.
    pub fn parse(fragment: &str) -> Option<Self> {
        let mut parts = fragment.split(',');
        let media_type = parts.next()?.to_string();

        let mut width = None;
        let mut height = None;
        let mut framerate = None;
        let mut extra = Vec::new();

        for part in parts {
            match part.split_once('=') {
                Some(("width", v)) => width = v.parse().ok(),
                Some(("height", v)) => height = v.parse().ok(),
                Some(("framerate", v)) => {
                    let (n, d) = v.split_once('/')?;
                    framerate = Some(Fraction::new(n.parse().ok()?, d.parse().ok()?));
                }
                _ => extra.push(part),
            }
        }

        Some(Self {
            media_type,
            width: width?,
            height: height?,
            framerate: framerate?,
            extra: if extra.is_empty() {
                None
            } else {
                Some(extra.join(","))
            },
        })
    }
}

/// Audio format constraint.
///
/// Renders to e.g. `audio/x-raw,channels=2,rate=48000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCaps {
    pub media_type: String,
    pub channels: u32,
    pub rate: u32,
    /// Sample format, e.g. `S16LE`. Omitted when `None`.
    pub format: Option<String>,
}

impl AudioCaps {
    pub fn raw(channels: u32, rate: u32) -> Self {
        Self {
            media_type: "audio/x-raw".to_string(),
            channels,
            rate,
            format: None,
        }
    }

    /// Render the caps string fragment. Pure function of the fields.
    pub fn render(&self) -> String {
        let mut s = format!(
            "{},channels={},rate={}",
            self.media_type, self.channels, self.rate
        );
        if let Some(format) = &self.format {
            s.push_str(",format=");
            s.push_str(format);
        }
        s
    }

    /// Parse a rendered fragment back into a descriptor. Test counterpart
    /// of `render()`.
    pub fn parse(fragment: &str) -> Option<Self> {
        let mut parts = fragment.split(',');
        let media_type = parts.next()?.to_string();

        let mut channels = None;
        let mut rate = None;
        let mut format = None;

        for part in parts {
            match part.split_once('=') {
                Some(("channels", v)) => channels = v.parse().ok(),
                Some(("rate", v)) => rate = v.parse().ok(),
                Some(("format", v)) => format = Some(v.to_string()),
                _ => return None,
            }
        }

        Some(Self {
            media_type,
            channels: channels?,
            rate: rate?,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_caps_render() {
        let caps = VideoCaps::raw(1920, 1080, Fraction::new(30, 1));
        assert_eq!(caps.render(), "video/x-raw,width=1920,height=1080,framerate=30/1");
    }

    #[test]
    fn video_caps_render_with_extra() {
        let mut caps = VideoCaps::raw(1280, 720, Fraction::new(30000, 1001));
        caps.extra = Some("format=NV12".to_string());
        assert_eq!(
            caps.render(),
            "video/x-raw,width=1280,height=720,framerate=30000/1001,format=NV12"
        );
    }

    #[test]
    fn video_caps_render_is_deterministic() {
        let a = VideoCaps::raw(1440, 810, Fraction::new(30, 1));
        let b = a.clone();
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn video_caps_round_trip() {
        let caps = VideoCaps::raw(480, 270, Fraction::new(30, 1));
        let parsed = VideoCaps::parse(&caps.render()).unwrap();
        assert_eq!(parsed.width, 480);
        assert_eq!(parsed.height, 270);
        assert_eq!(parsed.framerate, Fraction::new(30, 1));
        assert_eq!(parsed, caps);
    }

    #[test]
    fn video_caps_round_trip_gpu_memory() {
        let mut caps = VideoCaps::raw(1440, 810, Fraction::new(30, 1));
        caps.media_type = "video/x-raw(memory:VAMemory)".to_string();
        let parsed = VideoCaps::parse(&caps.render()).unwrap();
        assert_eq!(parsed, caps);
    }

    #[test]
    fn audio_caps_render() {
        let caps = AudioCaps::raw(2, 48000);
        assert_eq!(caps.render(), "audio/x-raw,channels=2,rate=48000");
    }

    #[test]
    fn audio_caps_round_trip() {
        let mut caps = AudioCaps::raw(2, 48000);
        caps.format = Some("S16LE".to_string());
        let parsed = AudioCaps::parse(&caps.render()).unwrap();
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.rate, 48000);
        assert_eq!(parsed, caps);
    }
}
