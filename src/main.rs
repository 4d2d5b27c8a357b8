//! castd daemon entry point.

use castd::bus::{self, SharedPipelineStats, SharedRunState};
use castd::config::{DaemonConfig, Overrides};
use castd::http::{create_app, AppState};
use castd::metrics::{self, SharedMetrics, SAMPLE_PERIOD};
use castd::pipeline::Pipeline;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Capture, composite and distribute a three-program AV feed over SRT.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address at which to listen for HTTP requests
    #[arg(long)]
    listen_http: Option<SocketAddr>,

    /// SRT listening URI for the combined stream
    #[arg(long)]
    listen_comb_srt: Option<String>,

    /// SRT listening URI for the presentation stream
    #[arg(long)]
    listen_present_srt: Option<String>,

    /// SRT listening URI for the camera stream
    #[arg(long)]
    listen_cam_srt: Option<String>,

    /// Element factory name for the presentation source
    #[arg(long)]
    source_present: Option<String>,

    /// Element properties for the presentation source
    #[arg(long)]
    source_present_opts: Option<String>,

    /// Element factory name for the camera source
    #[arg(long)]
    source_cam: Option<String>,

    /// Element properties for the camera source
    #[arg(long)]
    source_cam_opts: Option<String>,

    /// Element factory name for the audio source
    #[arg(long)]
    source_audio: Option<String>,

    /// Element properties for the audio source
    #[arg(long)]
    source_audio_opts: Option<String>,

    /// Enable hardware acceleration and offload processing onto the GPU
    #[arg(long)]
    hw_accel: bool,

    /// H.264 video bitrate in kbit/s
    #[arg(long)]
    video_bitrate_kbps: Option<u32>,

    /// AAC audio bitrate in kbit/s
    #[arg(long)]
    audio_bitrate_kbps: Option<u32>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Overrides {
            listen_http: args.listen_http,
            listen_srt_combined: args.listen_comb_srt,
            listen_srt_present: args.listen_present_srt,
            listen_srt_camera: args.listen_cam_srt,
            source_present: args.source_present,
            source_present_opts: args.source_present_opts,
            source_camera: args.source_cam,
            source_camera_opts: args.source_cam_opts,
            source_audio: args.source_audio,
            source_audio_opts: args.source_audio_opts,
            hw_accel: args.hw_accel.then_some(true),
            video_bitrate_kbps: args.video_bitrate_kbps,
            audio_bitrate_kbps: args.audio_bitrate_kbps,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = DaemonConfig::load(args.into())?;

    gstreamer::init()?;
    info!("GStreamer initialized");

    let pipeline = Arc::new(Pipeline::new(&config)?);

    let bus_stats = SharedPipelineStats::default();
    let run_state = SharedRunState::default();
    let shared_metrics = SharedMetrics::default();
    let shutdown = CancellationToken::new();

    let bus_task = tokio::spawn(bus::run(
        pipeline.clone(),
        bus_stats.clone(),
        run_state.clone(),
        shutdown.clone(),
    ));

    let sampler_task = tokio::spawn(metrics::run_sampler(
        pipeline.clone(),
        bus_stats,
        shared_metrics.clone(),
        SAMPLE_PERIOD,
        shutdown.clone(),
    ));

    let app = create_app(AppState {
        metrics: shared_metrics,
        graph: pipeline.clone(),
    });

    info!("listening for HTTP at {}", config.listen_http);
    let listener = tokio::net::TcpListener::bind(config.listen_http).await?;

    let http_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await
    });

    // Everything that watches the pipeline is in place; go live.
    pipeline.start()?;
    info!("pipeline playing");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
            shutdown.cancel();
        }
        // The bus watcher cancels the token itself on error or EOS.
        _ = shutdown.cancelled() => {}
    }

    bus_task.await?;
    sampler_task.await?;
    server_task.await??;

    info!("shutdown complete");
    Ok(())
}
