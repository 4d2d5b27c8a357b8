//! Bin builders for the capture pipeline.
//!
//! Every processing stage of the pipeline is an encapsulated `gst::Bin` with
//! ghost pads as its boundary. Bins are described as a structured list of
//! element chains that only becomes gst-launch text at the engine boundary,
//! so template validation never depends on string parsing.
//!
//! Each internal element name is suffixed with the bin's instance name, which
//! lets the same template be instantiated several times (e.g. one SRT sink
//! per output program) inside one pipeline without name collisions.

pub mod compositor;
pub mod ghost;
pub mod sources;
pub mod splitter;
pub mod srt;

pub use ghost::GhostPadError;

use gstreamer as gst;
use gstreamer::prelude::*;
use std::fmt::Write as _;
use thiserror::Error;

pub mod muxer;

#[derive(Error, Debug)]
pub enum BinError {
    /// The engine rejected the rendered element chain (unknown factory, bad
    /// property, caps syntax).
    #[error("failed to construct bin '{bin}': {source}")]
    Construction {
        bin: String,
        #[source]
        source: gst::glib::Error,
    },

    #[error("cannot create bin '{bin}': {source}")]
    Creation {
        bin: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("element '{element}' not found in bin '{bin}'")]
    ElementNotFound { bin: String, element: String },

    #[error("failed to add element '{element}' to bin '{bin}': {source}")]
    Add {
        bin: String,
        element: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("failed to request pad '{pad}' from element '{element}'")]
    PadRequest { element: String, pad: String },

    #[error(transparent)]
    Ghost(#[from] GhostPadError),
}

/// One element in a chain template.
///
/// The `base_name` is scoped with the bin instance name at render time; all
/// lookups inside the built bin go through the same scoping, so templates
/// stay collision free across instances.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    factory: String,
    base_name: String,
    props: Vec<(String, String)>,
    /// Free-form property text appended verbatim, used for operator-supplied
    /// source options like `device=/dev/video2`.
    raw_props: Option<String>,
}

impl ElementSpec {
    /// Element whose base name equals its factory name.
    pub fn new(factory: &str) -> Self {
        Self::named(factory, factory)
    }

    /// Element with an explicit base name, for templates that repeat a
    /// factory (e.g. two queues).
    pub fn named(factory: &str, base_name: &str) -> Self {
        Self {
            factory: factory.to_string(),
            base_name: base_name.to_string(),
            props: Vec::new(),
            raw_props: None,
        }
    }

    pub fn prop(mut self, key: &str, value: impl ToString) -> Self {
        self.props.push((key.to_string(), value.to_string()));
        self
    }

    pub fn raw_props(mut self, props: &str) -> Self {
        if !props.trim().is_empty() {
            self.raw_props = Some(props.trim().to_string());
        }
        self
    }

    /// The collision-free element name used inside a bin instance.
    pub fn scoped_name(&self, instance: &str) -> String {
        scoped(&self.base_name, instance)
    }

    fn render(&self, instance: &str, out: &mut String) {
        let _ = write!(out, "{} name={}", self.factory, self.scoped_name(instance));
        if let Some(raw) = &self.raw_props {
            let _ = write!(out, " {}", raw);
        }
        for (key, value) in &self.props {
            if value.contains([',', '(', ' ']) {
                let _ = write!(out, " {}=\"{}\"", key, value);
            } else {
                let _ = write!(out, " {}={}", key, value);
            }
        }
    }
}

/// Scope a base element name with a bin instance name.
pub fn scoped(base_name: &str, instance: &str) -> String {
    format!("{}_{}", base_name, instance)
}

/// A linear element chain, optionally ending in a link into a named pad of
/// another element of the same bin (e.g. a compositor sink pad).
#[derive(Debug, Clone, Default)]
pub struct Chain {
    elements: Vec<ElementSpec>,
    tail: Option<(String, Option<String>)>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, element: ElementSpec) -> Self {
        self.elements.push(element);
        self
    }

    /// Terminate the chain by linking into `base_name.pad`.
    pub fn into_pad(mut self, base_name: &str, pad: &str) -> Self {
        self.tail = Some((base_name.to_string(), Some(pad.to_string())));
        self
    }

    /// Terminate the chain by linking into any compatible (request) pad of
    /// `base_name`.
    pub fn into_element(mut self, base_name: &str) -> Self {
        self.tail = Some((base_name.to_string(), None));
        self
    }

    fn render(&self, instance: &str, out: &mut String) {
        for (idx, element) in self.elements.iter().enumerate() {
            if idx > 0 {
                out.push_str(" ! ");
            }
            element.render(instance, out);
        }
        if let Some((base_name, pad)) = &self.tail {
            let _ = write!(out, " ! {}.", scoped(base_name, instance));
            if let Some(pad) = pad {
                out.push_str(pad);
            }
        }
    }
}

/// Render a chain template to the textual form handed to the engine.
pub fn render_chains(instance: &str, chains: &[Chain]) -> String {
    let mut out = String::new();
    for (idx, chain) in chains.iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        chain.render(instance, &mut out);
    }
    out
}

/// A named, self-contained processing sub-unit of the pipeline.
#[derive(Debug)]
pub struct SubGraph {
    name: String,
    bin: gst::Bin,
}

impl SubGraph {
    /// Build a bin from a chain template.
    ///
    /// With `auto_ghost` the engine exposes every unlinked pad as a ghost
    /// pad; builders that need hand-placed boundary pads pass `false` and
    /// bind them via [`ghost`].
    pub fn from_chains(name: &str, chains: &[Chain], auto_ghost: bool) -> Result<Self, BinError> {
        let description = render_chains(name, chains);
        tracing::debug!("building bin '{}': {}", name, description);

        let bin = gst::parse::bin_from_description(&description, auto_ghost).map_err(|e| {
            BinError::Construction {
                bin: name.to_string(),
                source: e,
            }
        })?;
        bin.set_property("name", name);

        Ok(Self {
            name: name.to_string(),
            bin,
        })
    }

    /// An empty bin, for builders that assemble elements by hand.
    pub fn empty(name: &str) -> Result<Self, BinError> {
        let bin = gst::Bin::builder().name(name).build();
        Ok(Self {
            name: name.to_string(),
            bin,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bin(&self) -> &gst::Bin {
        &self.bin
    }

    /// Upcast reference for pipeline insertion and linking.
    pub fn element(&self) -> &gst::Element {
        self.bin.upcast_ref()
    }

    /// Look up an internal element by its template base name.
    pub fn by_base_name(&self, base_name: &str) -> Result<gst::Element, BinError> {
        let scoped = scoped(base_name, &self.name);
        self.bin
            .by_name(&scoped)
            .ok_or_else(|| BinError::ElementNotFound {
                bin: self.name.clone(),
                element: scoped,
            })
    }
}
