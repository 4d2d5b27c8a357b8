//! HTTP surface: a minimalist Prometheus exporter at `/metrics` and the
//! filter graph in DOT form at `/graph`.
//!
//! Exposition is hand-rendered text. Every sample line carries its own
//! millisecond timestamp, taken when the underlying value was sampled, so a
//! stalled sampler is visible to the scraper.

use crate::metrics::{MetricsSnapshot, SharedMetrics};
use crate::pipeline::{Pipeline, SinkId};
use crate::srt_stats::SrtStats;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use gstreamer as gst;
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;

/// Where the DOT rendering of the running graph comes from.
pub trait GraphSource: Send + Sync {
    fn dot_graph(&self, details: gst::DebugGraphDetails) -> String;
}

impl GraphSource for Pipeline {
    fn dot_graph(&self, details: gst::DebugGraphDetails) -> String {
        Pipeline::dot_graph(self, details)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub metrics: SharedMetrics,
    pub graph: Arc<dyn GraphSource>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/graph", get(graph_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.read().clone();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(&snapshot),
    )
}

#[derive(Deserialize)]
struct GraphQuery {
    details: Option<String>,
}

async fn graph_handler(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> impl IntoResponse {
    let details = match query.details.as_deref() {
        Some("media-type") => gst::DebugGraphDetails::MEDIA_TYPE,
        Some("caps") => gst::DebugGraphDetails::CAPS_DETAILS,
        Some("non-default-params") => gst::DebugGraphDetails::NON_DEFAULT_PARAMS,
        Some("states") => gst::DebugGraphDetails::STATES,
        Some("full-params") => gst::DebugGraphDetails::FULL_PARAMS,
        Some("all") => gst::DebugGraphDetails::ALL,
        Some("verbose") => gst::DebugGraphDetails::VERBOSE,
        _ => gst::DebugGraphDetails::STATES,
    };

    (
        [(header::CONTENT_TYPE, "text/vnd.graphviz")],
        state.graph.dot_graph(details),
    )
}

fn meta(out: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn render_srt_meta(out: &mut String) {
    meta(out, "srt_callers", "gauge", "Current number of subscribers to the SRT stream");
    meta(out, "srt_send_bytes_total", "counter", "Total bytes sent across all callers");
    meta(out, "srt_send_rate", "gauge", "Send rate in Mbps");
    meta(out, "srt_bandwidth", "gauge", "Bandwidth in Mbps");
    meta(out, "srt_rtt_seconds", "gauge", "RTT in s");
    meta(out, "srt_negotiated_latency_seconds", "gauge", "Negotiated latency in s");
    meta(out, "srt_sent_bytes_total", "counter", "Total bytes sent");
    meta(out, "srt_retransmitted_bytes_total", "counter", "Total bytes retransmitted");
    meta(out, "srt_sent_dropped_bytes_total", "counter", "Total bytes dropped");
    meta(out, "srt_packets_sent_total", "counter", "Total packets sent");
    meta(out, "srt_packets_sent_lost_total", "counter", "Total packets lost");
    meta(out, "srt_packets_sent_dropped_total", "counter", "Total packets dropped");
    meta(out, "srt_packets_retransmitted_total", "counter", "Total packets retransmitted");
    meta(out, "srt_packets_ack_received_total", "counter", "Number of acks received");
    meta(out, "srt_packets_nack_received_total", "counter", "Number of nacks received");
}

fn render_srt_stats(out: &mut String, stats: &SrtStats, sink: &str) {
    let t = stats.timestamp_ms;
    let _ = writeln!(out, "srt_callers{{sink=\"{sink}\"}} {} {t}", stats.callers.len());
    let _ = writeln!(
        out,
        "srt_send_bytes_total{{sink=\"{sink}\"}} {} {t}",
        stats.bytes_sent_total
    );

    for caller in &stats.callers {
        let labels = format!(
            "address=\"{}\", port=\"{}\", sink=\"{}\"",
            caller.caller_address, caller.caller_port, sink
        );

        let _ = writeln!(out, "srt_send_rate{{{labels}}} {:.6} {t}", caller.send_rate_mbps);
        let _ = writeln!(out, "srt_bandwidth{{{labels}}} {:.6} {t}", caller.bandwidth_mbps);
        let _ = writeln!(out, "srt_rtt_seconds{{{labels}}} {:.6} {t}", caller.rtt_ms / 1000.0);
        let _ = writeln!(
            out,
            "srt_negotiated_latency_seconds{{{labels}}} {} {t}",
            caller.negotiated_latency_ms / 1000
        );
        let _ = writeln!(out, "srt_sent_bytes_total{{{labels}}} {} {t}", caller.bytes_sent);
        let _ = writeln!(
            out,
            "srt_retransmitted_bytes_total{{{labels}}} {} {t}",
            caller.bytes_retransmitted
        );
        let _ = writeln!(
            out,
            "srt_sent_dropped_bytes_total{{{labels}}} {} {t}",
            caller.bytes_sent_dropped
        );
        let _ = writeln!(out, "srt_packets_sent_total{{{labels}}} {} {t}", caller.packets_sent);
        let _ = writeln!(
            out,
            "srt_packets_sent_lost_total{{{labels}}} {} {t}",
            caller.packets_sent_lost
        );
        let _ = writeln!(
            out,
            "srt_packets_sent_dropped_total{{{labels}}} {} {t}",
            caller.packets_sent_dropped
        );
        let _ = writeln!(
            out,
            "srt_packets_retransmitted_total{{{labels}}} {} {t}",
            caller.packets_retransmitted
        );
        let _ = writeln!(
            out,
            "srt_packets_ack_received_total{{{labels}}} {} {t}",
            caller.packet_ack_received
        );
        let _ = writeln!(
            out,
            "srt_packets_nack_received_total{{{labels}}} {} {t}",
            caller.packet_nack_received
        );
    }
}

/// Render the whole exposition. Pure, so tests can pin the exact output.
pub fn render_metrics(m: &MetricsSnapshot) -> String {
    let mut out = String::new();

    let cpu_time = m.cpu.timestamp_ms;
    meta(&mut out, "linux_proc_user_total", "counter", "Time spent in user mode, in ticks");
    let _ = writeln!(out, "linux_proc_user_total {} {cpu_time}", m.cpu.user);
    meta(&mut out, "linux_proc_system_total", "counter", "Time spent in system mode, in ticks");
    let _ = writeln!(out, "linux_proc_system_total {} {cpu_time}", m.cpu.system);
    meta(
        &mut out,
        "linux_proc_iowait_total",
        "counter",
        "Time spent waiting for I/O to complete, in ticks",
    );
    let _ = writeln!(out, "linux_proc_iowait_total {} {cpu_time}", m.cpu.iowait);
    meta(&mut out, "linux_proc_irq_total", "counter", "Time spent servicing interrupts, in ticks");
    let _ = writeln!(out, "linux_proc_irq_total {} {cpu_time}", m.cpu.irq);
    meta(
        &mut out,
        "linux_proc_softirq_total",
        "counter",
        "Time spent servicing soft interrupts, in ticks",
    );
    let _ = writeln!(out, "linux_proc_softirq_total {} {cpu_time}", m.cpu.softirq);

    let mem_time = m.mem.timestamp_ms;
    meta(&mut out, "linux_mem_used_bytes", "gauge", "Amount of memory used, in bytes");
    let _ = writeln!(out, "linux_mem_used_bytes {} {mem_time}", m.mem.used_bytes);
    meta(&mut out, "linux_mem_free_bytes", "gauge", "Amount of free memory, in bytes");
    let _ = writeln!(out, "linux_mem_free_bytes {} {mem_time}", m.mem.free_bytes);

    let load_time = m.load_avg.timestamp_ms;
    meta(&mut out, "load_avg_one", "gauge", "Load average over one minute");
    let _ = writeln!(out, "load_avg_one {:.6} {load_time}", m.load_avg.one);
    meta(&mut out, "load_avg_five", "gauge", "Load average over five minutes");
    let _ = writeln!(out, "load_avg_five {:.6} {load_time}", m.load_avg.five);
    meta(&mut out, "load_avg_fifteen", "gauge", "Load average over fifteen minutes");
    let _ = writeln!(out, "load_avg_fifteen {:.6} {load_time}", m.load_avg.fifteen);

    render_srt_meta(&mut out);
    render_srt_stats(&mut out, &m.combined, SinkId::Combined.label());
    render_srt_stats(&mut out, &m.present, SinkId::Present.label());
    render_srt_stats(&mut out, &m.camera, SinkId::Camera.label());

    if !m.pipeline.qos_events.is_empty() {
        meta(&mut out, "gst_qos_events_total", "gauge", "Number of qos events");
        // Stable output order for scrapers and tests.
        let mut sources: Vec<_> = m.pipeline.qos_events.iter().collect();
        sources.sort_by_key(|(source, _)| source.as_str());
        for (source, count) in sources {
            let _ = writeln!(out, "gst_qos_events_total{{source=\"{source}\"}} {count}");
        }
    }

    out
}
