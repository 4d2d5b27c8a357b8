//! Fan-out bins: one `sink` boundary pad, N `src_<i>` boundary pads backed
//! by a single tee.

use super::{ghost, scoped, BinError, SubGraph};
use gstreamer as gst;
use gstreamer::prelude::*;

/// Build a 1×`outputs` splitter bin.
///
/// Boundary pads: `sink` plus `src_0` .. `src_{outputs-1}`, one tee request
/// pad each.
pub fn splitter(name: &str, outputs: u32) -> Result<SubGraph, BinError> {
    let subgraph = SubGraph::empty(name)?;
    let bin = subgraph.bin();

    let tee_name = scoped("tee", name);
    let tee = gst::ElementFactory::make("tee")
        .name(&tee_name)
        .build()
        .map_err(|e| BinError::Creation {
            bin: name.to_string(),
            source: e,
        })?;

    bin.add(&tee).map_err(|e| BinError::Add {
        bin: name.to_string(),
        element: tee_name.clone(),
        source: e,
    })?;

    ghost::bind_element(bin, &tee, "sink", "sink")?;

    for i in 0..outputs {
        let pad_name = format!("src_{}", i);
        let pad = tee
            .request_pad_simple(&pad_name)
            .ok_or_else(|| BinError::PadRequest {
                element: tee_name.clone(),
                pad: pad_name.clone(),
            })?;
        ghost::bind_pad(bin, pad.upcast_ref(), &pad_name)?;
    }

    Ok(subgraph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn have_tee() -> bool {
        gst::init().is_ok() && gst::ElementFactory::find("tee").is_some()
    }

    #[test]
    fn splitter_exposes_requested_outputs() {
        if !have_tee() {
            return;
        }
        let split = splitter("splitter_audio", 3).unwrap();

        assert!(split.bin().static_pad("sink").is_some());
        for i in 0..3 {
            assert!(
                split.bin().static_pad(&format!("src_{}", i)).is_some(),
                "missing src_{}",
                i
            );
        }
        assert!(split.bin().static_pad("src_3").is_none());
    }

    #[test]
    fn splitter_tee_name_is_instance_scoped() {
        if !have_tee() {
            return;
        }
        let split = splitter("splitter_cam", 2).unwrap();
        assert_eq!(split.by_base_name("tee").unwrap().name(), "tee_splitter_cam");
    }
}
