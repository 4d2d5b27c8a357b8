//! Ghost-pad binding for bin boundaries.
//!
//! A ghost pad exposes one internal element's pad as an externally linkable
//! pad on the enclosing bin. Binding is five steps, each with its own
//! failure; any failure aborts the construction of the whole bin, so no
//! partially bound boundary ever survives.

use gstreamer as gst;
use gstreamer::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GhostPadError {
    #[error("element '{element}' not found in bin '{bin}'")]
    ElementNotFound { bin: String, element: String },

    #[error("no static pad '{pad}' on element '{element}'")]
    PadNotFound { element: String, pad: String },

    #[error("failed to create ghost pad '{ghost}': {source}")]
    CreationFailed {
        ghost: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("failed to activate ghost pad '{ghost}': {source}")]
    ActivationFailed {
        ghost: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("failed to add ghost pad '{ghost}' to bin '{bin}': {source}")]
    RegistrationFailed {
        ghost: String,
        bin: String,
        #[source]
        source: gst::glib::BoolError,
    },
}

/// Expose `element_name.pad` as ghost pad `ghost` on `bin`.
pub fn bind(
    bin: &gst::Bin,
    element_name: &str,
    pad: &str,
    ghost: &str,
) -> Result<(), GhostPadError> {
    let element = bin
        .by_name(element_name)
        .ok_or_else(|| GhostPadError::ElementNotFound {
            bin: bin.name().to_string(),
            element: element_name.to_string(),
        })?;

    bind_element(bin, &element, pad, ghost)
}

/// Like [`bind`], for an already-resolved element.
pub fn bind_element(
    bin: &gst::Bin,
    element: &gst::Element,
    pad: &str,
    ghost: &str,
) -> Result<(), GhostPadError> {
    let static_pad = element
        .static_pad(pad)
        .ok_or_else(|| GhostPadError::PadNotFound {
            element: element.name().to_string(),
            pad: pad.to_string(),
        })?;

    bind_pad(bin, &static_pad, ghost)
}

/// Like [`bind`], for an already-resolved pad. Needed for request pads
/// (e.g. tee src pads), which have no static pad to look up.
pub fn bind_pad(bin: &gst::Bin, pad: &gst::Pad, ghost: &str) -> Result<(), GhostPadError> {
    let ghost_pad = gst::GhostPad::builder_with_target(pad)
        .map_err(|e| GhostPadError::CreationFailed {
            ghost: ghost.to_string(),
            source: e,
        })?
        .name(ghost)
        .build();

    ghost_pad
        .set_active(true)
        .map_err(|e| GhostPadError::ActivationFailed {
            ghost: ghost.to_string(),
            source: e,
        })?;

    bin.add_pad(&ghost_pad)
        .map_err(|e| GhostPadError::RegistrationFailed {
            ghost: ghost.to_string(),
            bin: bin.name().to_string(),
            source: e,
        })
}
