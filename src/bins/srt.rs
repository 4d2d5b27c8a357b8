//! SRT transport sink bin.

use super::{BinError, Chain, ElementSpec, SubGraph};

/// Base name of the sink element inside the bin, for stats lookups.
pub const SRT_SINK_ELEMENT: &str = "srtsink";

/// SRT latency window in milliseconds, the retransmission budget per caller.
const SRT_LATENCY_MS: u32 = 125;

/// Build an SRT listener sink bin with a single `sink` boundary pad.
///
/// `wait-for-connection=false` keeps the pipeline running with no
/// subscribers; data is dropped until a caller connects.
pub fn srt_sink(name: &str, uri: &str) -> Result<SubGraph, BinError> {
    let chains = vec![Chain::new().then(
        ElementSpec::new(SRT_SINK_ELEMENT)
            .prop("uri", uri)
            .prop("latency", SRT_LATENCY_MS)
            .prop("wait-for-connection", false),
    )];

    SubGraph::from_chains(name, &chains, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstreamer as gst;

    #[test]
    fn srt_sink_exposes_sink_pad() {
        if gst::init().is_err() || gst::ElementFactory::find("srtsink").is_none() {
            return;
        }
        use gstreamer::prelude::*;

        let sink = srt_sink("srt_combined", "srt://[::]:7000?mode=listener").unwrap();
        assert!(sink.bin().static_pad("sink").is_some());
        assert_eq!(sink.by_base_name(SRT_SINK_ELEMENT).unwrap().name(), "srtsink_srt_combined");
    }
}
