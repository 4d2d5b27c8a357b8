//! Picture-in-picture compositor bin.
//!
//! The presentation feed fills the canvas; the camera feed is scaled down
//! and anchored to the top-right corner. With hardware acceleration the
//! scaler and compositor switch to their VA-API variants and the
//! intermediate caps stay in GPU memory, avoiding a CPU round-trip between
//! scaling and compositing.

use super::{ghost, Chain, ElementSpec, BinError, SubGraph};
use crate::caps::VideoCaps;

/// Configuration for [`compositor_bin`].
pub struct CombinedViewConfig {
    pub output: VideoCaps,
    pub presentation: VideoCaps,
    pub camera: VideoCaps,
    pub hw_accel: bool,
}

/// Horizontal offset of the camera overlay: flush with the right edge of
/// the output canvas.
pub fn overlay_xpos(output: &VideoCaps, camera: &VideoCaps) -> i64 {
    output.width as i64 - camera.width as i64
}

/// Build a compositor bin with `sink0` (presentation), `sink1` (camera) and
/// `src` boundary pads.
pub fn compositor_bin(name: &str, config: &CombinedViewConfig) -> Result<SubGraph, BinError> {
    let xpos = overlay_xpos(&config.output, &config.camera);

    let (comp_factory, scaler_factory) = if config.hw_accel {
        ("vacompositor", "vapostproc")
    } else {
        ("compositor", "videoscale")
    };

    let comp = if config.hw_accel {
        ElementSpec::new(comp_factory)
    } else {
        ElementSpec::new(comp_factory).prop("background", "black")
    };

    let chains = vec![
        Chain::new()
            .then(comp.prop("sink_1::xpos", xpos))
            .then(ElementSpec::new("capsfilter").prop("caps", config.output.render())),
        Chain::new()
            .then(ElementSpec::named("queue", "queue_sink_0"))
            .then(ElementSpec::named(scaler_factory, "scaler_sink_0").prop("add-borders", 1))
            .then(
                ElementSpec::named("capsfilter", "capsfilter_sink_0")
                    .prop("caps", config.presentation.render()),
            )
            .into_pad(comp_factory, "sink_0"),
        Chain::new()
            .then(ElementSpec::named("queue", "queue_sink_1"))
            .then(ElementSpec::named(scaler_factory, "scaler_sink_1").prop("add-borders", 1))
            .then(
                ElementSpec::named("capsfilter", "capsfilter_sink_1")
                    .prop("caps", config.camera.render()),
            )
            .into_pad(comp_factory, "sink_1"),
    ];

    // No automatic ghost pads: the compositor's request sink pads would not
    // be picked up correctly, so the boundary is bound by hand.
    let subgraph = SubGraph::from_chains(name, &chains, false)?;
    let bin = subgraph.bin();

    ghost::bind(bin, &subgraph_scoped(&subgraph, "queue_sink_0"), "sink", "sink0")?;
    ghost::bind(bin, &subgraph_scoped(&subgraph, "queue_sink_1"), "sink", "sink1")?;
    ghost::bind(bin, &subgraph_scoped(&subgraph, "capsfilter"), "src", "src")?;

    Ok(subgraph)
}

fn subgraph_scoped(subgraph: &SubGraph, base_name: &str) -> String {
    super::scoped(base_name, subgraph.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::Fraction;
    use gstreamer as gst;

    #[test]
    fn overlay_anchors_to_right_edge() {
        let output = VideoCaps::raw(1920, 1080, Fraction::new(30, 1));
        let camera = VideoCaps::raw(480, 270, Fraction::new(30, 1));
        assert_eq!(overlay_xpos(&output, &camera), 1440);
    }

    #[test]
    fn template_renders_overlay_position() {
        let config = CombinedViewConfig {
            output: VideoCaps::raw(1920, 1080, Fraction::new(30, 1)),
            presentation: VideoCaps::raw(1440, 810, Fraction::new(30, 1)),
            camera: VideoCaps::raw(480, 270, Fraction::new(30, 1)),
            hw_accel: false,
        };
        // Render the same template compositor_bin() builds, without the engine.
        let comp = ElementSpec::new("compositor")
            .prop("background", "black")
            .prop("sink_1::xpos", overlay_xpos(&config.output, &config.camera));
        let rendered = super::super::render_chains("comp", &[Chain::new().then(comp)]);
        assert!(rendered.contains("sink_1::xpos=1440"), "{}", rendered);
    }

    #[test]
    fn compositor_bin_exposes_boundary_pads() {
        if gst::init().is_err() || gst::ElementFactory::find("compositor").is_none() {
            return;
        }
        use gstreamer::prelude::*;

        let config = CombinedViewConfig {
            output: VideoCaps::raw(1920, 1080, Fraction::new(30, 1)),
            presentation: VideoCaps::raw(1440, 810, Fraction::new(30, 1)),
            camera: VideoCaps::raw(480, 270, Fraction::new(30, 1)),
            hw_accel: false,
        };
        let comp = compositor_bin("comp", &config).unwrap();
        assert!(comp.bin().static_pad("sink0").is_some());
        assert!(comp.bin().static_pad("sink1").is_some());
        assert!(comp.bin().static_pad("src").is_some());
    }
}
