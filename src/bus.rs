//! Bus watcher: translates engine bus traffic into run-state changes and
//! counters.
//!
//! Messages are first mapped onto the plain [`BusEvent`] enum and only then
//! interpreted, so the control logic can be tested without a live bus. The
//! watcher is the only writer of the shared run state and pipeline counters.

use crate::pipeline::{Pipeline, RunState};
use futures::StreamExt;
use gstreamer as gst;
use gstreamer::prelude::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters accumulated from bus traffic since startup.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub warnings: u64,
    /// QoS events per emitting element name.
    pub qos_events: HashMap<String, u64>,
}

pub type SharedPipelineStats = Arc<RwLock<PipelineStats>>;
pub type SharedRunState = Arc<RwLock<RunState>>;

/// A bus message reduced to what the controller acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Eos,
    Error {
        message: String,
        debug: Option<String>,
        source: Option<String>,
    },
    Warning {
        message: String,
        source: Option<String>,
    },
    Qos {
        source: String,
    },
    /// State change of the top-level pipeline. Element-level state changes
    /// are dropped during mapping.
    StateChanged {
        current: RunState,
    },
    Other {
        kind: gst::MessageType,
    },
}

impl BusEvent {
    /// Map a raw bus message. Returns `None` for traffic the controller
    /// ignores entirely (element state changes, tags, latency, ...).
    pub fn from_message(msg: &gst::Message) -> Option<Self> {
        use gst::MessageView;

        match msg.view() {
            MessageView::Eos(_) => Some(BusEvent::Eos),
            MessageView::Error(err) => Some(BusEvent::Error {
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
                source: err.src().map(|s| s.name().to_string()),
            }),
            MessageView::Warning(w) => Some(BusEvent::Warning {
                message: w.error().to_string(),
                source: w.src().map(|s| s.name().to_string()),
            }),
            MessageView::Qos(qos) => qos
                .src()
                .map(|s| BusEvent::Qos {
                    source: s.name().to_string(),
                }),
            MessageView::StateChanged(sc) => {
                let from_pipeline = msg
                    .src()
                    .is_some_and(|s| s.type_() == gst::Pipeline::static_type());
                if !from_pipeline {
                    return None;
                }
                Some(BusEvent::StateChanged {
                    current: sc.current().into(),
                })
            }
            _ => Some(BusEvent::Other { kind: msg.type_() }),
        }
    }
}

/// Interprets bus events. Sole writer of the shared run state and counters.
pub struct BusController {
    stats: SharedPipelineStats,
    run_state: SharedRunState,
}

impl BusController {
    pub fn new(stats: SharedPipelineStats, run_state: SharedRunState) -> Self {
        Self { stats, run_state }
    }

    /// Apply one event. Returns `true` when the watcher should exit.
    pub fn handle(&self, event: BusEvent) -> bool {
        match event {
            BusEvent::Eos => {
                info!("pipeline reached end of stream");
                true
            }
            BusEvent::Error {
                message,
                debug: debug_info,
                source,
            } => {
                error!(?source, debug = ?debug_info, "pipeline error: {}", message);
                true
            }
            BusEvent::Warning { message, source } => {
                warn!(?source, "pipeline warning: {}", message);
                self.stats.write().warnings += 1;
                false
            }
            BusEvent::Qos { source } => {
                // QoS means an element dropped or throttled buffers. Spikes
                // show up in the counters, so keep the log quiet.
                debug!(source = %source, "qos event");
                *self.stats.write().qos_events.entry(source).or_insert(0) += 1;
                false
            }
            BusEvent::StateChanged { current } => {
                info!(state = ?current, "pipeline state changed");
                *self.run_state.write() = current;
                false
            }
            BusEvent::Other { kind } => {
                debug!(?kind, "bus message");
                false
            }
        }
    }
}

/// Consume the bus until the pipeline errors, ends, or shutdown is
/// requested, then drop the graph to Null.
pub async fn run(
    pipeline: Arc<Pipeline>,
    stats: SharedPipelineStats,
    run_state: SharedRunState,
    shutdown: CancellationToken,
) {
    let Some(bus) = pipeline.bus() else {
        error!("pipeline has no bus, watcher exiting");
        return;
    };

    let controller = BusController::new(stats, run_state.clone());
    let mut messages = bus.stream();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, stopping pipeline");
                break;
            }
            msg = messages.next() => {
                let Some(msg) = msg else {
                    warn!("bus stream ended");
                    break;
                };
                let Some(event) = BusEvent::from_message(&msg) else {
                    continue;
                };
                if controller.handle(event) {
                    break;
                }
            }
        }
    }

    if let Err(e) = pipeline.stop() {
        warn!("failed to stop pipeline: {}", e);
    }
    *run_state.write() = RunState::Null;

    // Make sure sibling tasks wind down too when the bus side exits first.
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (BusController, SharedPipelineStats, SharedRunState) {
        let stats = SharedPipelineStats::default();
        let run_state = SharedRunState::default();
        (
            BusController::new(stats.clone(), run_state.clone()),
            stats,
            run_state,
        )
    }

    #[test]
    fn warnings_and_qos_accumulate_until_eos() {
        let (controller, stats, _) = controller();

        let events = [
            BusEvent::Warning {
                message: "late buffer".to_string(),
                source: Some("queue_video_muxer_comb".to_string()),
            },
            BusEvent::Qos {
                source: "x264enc_muxer_comb".to_string(),
            },
            BusEvent::Warning {
                message: "clock drift".to_string(),
                source: None,
            },
            BusEvent::Eos,
        ];

        let mut exits = 0;
        for event in events {
            if controller.handle(event) {
                exits += 1;
            }
        }

        assert_eq!(exits, 1);
        let stats = stats.read();
        assert_eq!(stats.warnings, 2);
        assert_eq!(stats.qos_events.get("x264enc_muxer_comb"), Some(&1));
    }

    #[test]
    fn error_stops_the_watcher() {
        let (controller, _, _) = controller();
        assert!(controller.handle(BusEvent::Error {
            message: "Internal data stream error.".to_string(),
            debug: Some("streaming stopped, reason not-negotiated".to_string()),
            source: Some("srtsink_srt_combined".to_string()),
        }));
    }

    #[test]
    fn state_changes_are_published() {
        let (controller, _, run_state) = controller();

        assert!(!controller.handle(BusEvent::StateChanged {
            current: RunState::Playing,
        }));
        assert_eq!(*run_state.read(), RunState::Playing);
    }

    #[test]
    fn qos_counts_per_element() {
        let (controller, stats, _) = controller();

        for source in ["a", "b", "a", "a"] {
            controller.handle(BusEvent::Qos {
                source: source.to_string(),
            });
        }

        let stats = stats.read();
        assert_eq!(stats.qos_events.get("a"), Some(&3));
        assert_eq!(stats.qos_events.get("b"), Some(&1));
    }
}
