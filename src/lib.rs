//! castd: capture, composite, encode and distribute a three-program AV feed.
//!
//! Two video sources (presentation and camera) and one audio source are
//! captured, the videos composited into a picture-in-picture view, and all
//! three programs encoded to H.264/AAC in MPEG-TS, each served by its own
//! SRT listener. An HTTP endpoint exposes Prometheus-style metrics and the
//! live filter graph.

pub mod bins;
pub mod bus;
pub mod caps;
pub mod config;
pub mod http;
pub mod metrics;
pub mod pipeline;
pub mod srt_stats;
pub mod sys;
