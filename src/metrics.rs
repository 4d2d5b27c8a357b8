//! Periodic telemetry sampler.
//!
//! Once per period the sampler polls host counters and the three SRT sinks,
//! then publishes one atomic [`MetricsSnapshot`]. A failed poll is logged
//! and the previous snapshot stays current; readers never see a half-updated
//! one.

use crate::bus::{PipelineStats, SharedPipelineStats};
use crate::pipeline::{Pipeline, SinkId};
use crate::srt_stats::SrtStats;
use crate::sys::{self, CpuSample, LoadAvgSample, MemSample};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// One consistent view of everything the exporter reports.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub cpu: CpuSample,
    pub mem: MemSample,
    pub load_avg: LoadAvgSample,

    pub combined: SrtStats,
    pub present: SrtStats,
    pub camera: SrtStats,

    pub pipeline: PipelineStats,
}

pub type SharedMetrics = Arc<RwLock<MetricsSnapshot>>;

/// Where SRT sink statistics come from. The live implementation reads the
/// sink elements; tests substitute their own.
pub trait TelemetrySource: Send + Sync {
    fn srt_sink_stats(&self, sink: SinkId) -> anyhow::Result<SrtStats>;
}

impl TelemetrySource for Pipeline {
    fn srt_sink_stats(&self, sink: SinkId) -> anyhow::Result<SrtStats> {
        Ok(Pipeline::srt_sink_stats(self, sink)?)
    }
}

fn sample<T: TelemetrySource>(
    source: &T,
    bus_stats: &SharedPipelineStats,
) -> anyhow::Result<MetricsSnapshot> {
    let combined = source.srt_sink_stats(SinkId::Combined)?;
    let present = source.srt_sink_stats(SinkId::Present)?;
    let camera = source.srt_sink_stats(SinkId::Camera)?;

    Ok(MetricsSnapshot {
        cpu: sys::cpu_sample()?,
        mem: sys::mem_sample(),
        load_avg: sys::load_avg_sample(),
        combined,
        present,
        camera,
        pipeline: bus_stats.read().clone(),
    })
}

/// Poll every `period` until shutdown. One failed poll skips the publish;
/// the loop keeps going.
pub async fn run_sampler<T: TelemetrySource>(
    source: Arc<T>,
    bus_stats: SharedPipelineStats,
    metrics: SharedMetrics,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Shutdown wins over a tick that is due at the same instant.
            biased;
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }

        match sample(source.as_ref(), &bus_stats) {
            Ok(snapshot) => *metrics.write() = snapshot,
            Err(e) => warn!("telemetry poll failed, keeping previous snapshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` polls, then succeeds with a fixed payload.
    struct FlakySource {
        attempts: AtomicU32,
        failures: u32,
    }

    impl TelemetrySource for FlakySource {
        fn srt_sink_stats(&self, _sink: SinkId) -> anyhow::Result<SrtStats> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                anyhow::bail!("sink not ready");
            }
            Ok(SrtStats {
                callers: Vec::new(),
                bytes_sent_total: 4096,
                timestamp_ms: 1,
            })
        }
    }

    #[tokio::test]
    async fn sampler_survives_failed_polls() {
        let source = Arc::new(FlakySource {
            attempts: AtomicU32::new(0),
            failures: 3,
        });
        let bus_stats = SharedPipelineStats::default();
        let metrics = SharedMetrics::default();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run_sampler(
            source.clone(),
            bus_stats,
            metrics.clone(),
            Duration::from_millis(5),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        task.await.unwrap();

        // The first polls failed, later ones must have gone through and
        // published.
        assert!(source.attempts.load(Ordering::SeqCst) >= 4);
        assert_eq!(metrics.read().combined.bytes_sent_total, 4096);
    }

    #[tokio::test]
    async fn sampler_stops_on_shutdown() {
        let source = Arc::new(FlakySource {
            attempts: AtomicU32::new(0),
            failures: 0,
        });
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Already cancelled: must return without a single poll.
        run_sampler(
            source.clone(),
            SharedPipelineStats::default(),
            SharedMetrics::default(),
            Duration::from_millis(1),
            shutdown,
        )
        .await;

        assert_eq!(source.attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pipeline_counters_are_copied_into_the_snapshot() {
        let source = FlakySource {
            attempts: AtomicU32::new(0),
            failures: 0,
        };
        let bus_stats = SharedPipelineStats::default();
        bus_stats.write().warnings = 7;
        bus_stats
            .write()
            .qos_events
            .insert("x264enc_muxer_comb".to_string(), 2);

        let snapshot = sample(&source, &bus_stats).unwrap();
        assert_eq!(snapshot.pipeline.warnings, 7);
        assert_eq!(
            snapshot.pipeline.qos_events.get("x264enc_muxer_comb"),
            Some(&2)
        );
    }
}
