//! Encoder + MPEG-TS mux bin.
//!
//! One audio input, one video input, one muxed output. Video is H.264
//! (x264 in software, VA-API when hardware acceleration is on), audio is
//! AAC. The mux runs with alignment=7 so each outgoing burst is seven TS
//! packets (1316 bytes), which fits a typical MTU for SRT/UDP transport.

use super::{ghost, scoped, Chain, ElementSpec, BinError, SubGraph};

/// Build an encoder+mux bin with `audio_sink`, `video_sink` and `src`
/// boundary pads.
///
/// `h264_bitrate_kbps` feeds the video encoder directly (it takes kbit/s);
/// `aac_bitrate_kbps` is scaled to bit/s for the AAC encoder.
pub fn mux_bin(
    name: &str,
    h264_bitrate_kbps: u32,
    aac_bitrate_kbps: u32,
    hw_accel: bool,
) -> Result<SubGraph, BinError> {
    let video_encoder = if hw_accel {
        ElementSpec::new("vah264enc").prop("rate-control", "cbr")
    } else {
        // pass=0 is constant bitrate
        ElementSpec::new("x264enc")
            .prop("tune", "zerolatency")
            .prop("pass", 0)
    };

    let chains = vec![
        Chain::new().then(ElementSpec::new("mpegtsmux").prop("alignment", 7)),
        Chain::new()
            .then(ElementSpec::named("queue", "queue_audio"))
            .then(
                ElementSpec::new("fdkaacenc")
                    .prop("bitrate", aac_bitrate_kbps * 1000)
                    .prop("rate-control", "cbr"),
            )
            .into_element("mpegtsmux"),
        Chain::new()
            .then(ElementSpec::named("queue", "queue_video"))
            .then(video_encoder.prop("bitrate", h264_bitrate_kbps))
            .then(
                ElementSpec::new("capsfilter")
                    .prop("caps", "video/x-h264,pixel-aspect-ratio=1/1,profile=high"),
            )
            .then(ElementSpec::new("h264parse").prop("config-interval", -1))
            .into_element("mpegtsmux"),
    ];

    let subgraph = SubGraph::from_chains(name, &chains, false)?;
    let bin = subgraph.bin();

    ghost::bind(bin, &scoped("queue_audio", name), "sink", "audio_sink")?;
    ghost::bind(bin, &scoped("queue_video", name), "sink", "video_sink")?;
    ghost::bind(bin, &scoped("mpegtsmux", name), "src", "src")?;

    Ok(subgraph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstreamer as gst;

    fn have_elements(factories: &[&str]) -> bool {
        gst::init().is_ok() && factories.iter().all(|f| gst::ElementFactory::find(f).is_some())
    }

    #[test]
    fn mux_bin_exposes_av_inputs_and_output() {
        if !have_elements(&["mpegtsmux", "fdkaacenc", "x264enc", "h264parse"]) {
            return;
        }
        use gstreamer::prelude::*;

        let muxer = mux_bin("muxer_present", 4000, 128, false).unwrap();
        assert!(muxer.bin().static_pad("audio_sink").is_some());
        assert!(muxer.bin().static_pad("video_sink").is_some());
        assert!(muxer.bin().static_pad("src").is_some());
        assert!(muxer.by_base_name("mpegtsmux").is_ok());
    }
}
