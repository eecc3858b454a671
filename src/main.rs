use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pose_overlay::camera::{FrameSource, ThreadedCamera};
use pose_overlay::config::Config;
use pose_overlay::device::{Backend, DeviceContext};
use pose_overlay::pipeline::{InferenceEngine, LoopStats, RefreshClock, RenderLoop};
use pose_overlay::pose::{MoveNetLoader, MOVENET_INPUT_SIZE};
use pose_overlay::render::{FrameBuffer, OverlayWindow, RenderStyle, SkeletonRenderer};

/// ロード中にタイトルへ出すメッセージ
const LOADING_MESSAGE: &str = "Loading webcam tracking code - this may take a few seconds";

/// ウィンドウのリフレッシュレート
const TARGET_FPS: usize = 60;

#[derive(Parser)]
#[command(
    name = "pose-overlay",
    version = env!("GIT_VERSION"),
    about = "Live MoveNet skeleton overlay for a webcam",
    long_about = None
)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Camera index (overrides config)
    #[arg(long)]
    camera: Option<i32>,

    /// MoveNet ONNX model path (overrides config)
    #[arg(long, env = "POSE_OVERLAY_MODEL")]
    model: Option<String>,

    /// Force CPU inference
    #[arg(long)]
    cpu: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config);
    if let Some(index) = cli.camera {
        config.camera.index = index;
    }
    if let Some(model) = cli.model {
        config.model.path = model;
    }
    if cli.cpu {
        config.model.backend = Backend::Cpu;
    }
    info!(version = env!("GIT_VERSION"), model = %config.model.path, backend = config.model.backend.as_str(), "pose-overlay");

    let camera = ThreadedCamera::start(
        config.camera.index,
        Some(config.camera.width),
        Some(config.camera.height),
    )
    .context("failed to start camera")?;

    let device = Arc::new(DeviceContext::new());
    let engine = InferenceEngine::new(
        MoveNetLoader::new(&config.model.path),
        Arc::clone(&device),
        config.model.backend,
        MOVENET_INPUT_SIZE,
    );
    let mut render_loop = RenderLoop::new(engine, Arc::clone(&device), camera, RefreshClock::new())?;
    let published = render_loop.published();

    let mut window = OverlayWindow::new(
        &config.window.title,
        config.window.width as usize,
        config.window.height as usize,
        TARGET_FPS,
    )?;
    let mut overlay = FrameBuffer::new(config.window.width as usize, config.window.height as usize);
    let mut renderer = SkeletonRenderer::new(RenderStyle::from(&config.render));

    info!("{}", LOADING_MESSAGE);
    window.set_title(&format!("{} - {}", config.window.title, LOADING_MESSAGE));
    let mut loading = true;

    render_loop.start();

    // FPS計測用
    let mut last_stats = LoopStats::default();
    let mut stats_timer = Instant::now();

    // メインループ: 1リフレッシュ = 1ティック
    while window.is_open() {
        let (width, height) = window.size();
        overlay.resize(width, height);

        if let Some(id) = render_loop.clock_mut().fire() {
            // エラーはループ側でログ済み
            render_loop.tick(id)?;
        }

        if loading && !render_loop.is_loading() {
            loading = false;
            window.set_title(&config.window.title);
        }

        renderer.render_published(&mut overlay, &published, width as u32, height as u32);
        if let Some(frame) = render_loop.source().current_frame() {
            window.draw_frame(&frame);
        }
        window.composite(&overlay);
        window.update()?;

        let elapsed = stats_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let stats = render_loop.stats();
            let confidence = published
                .latest()
                .map(|pose| pose.average_confidence())
                .unwrap_or(0.0);
            info!(
                fps = format!("{:.1}", (stats.ticks - last_stats.ticks) as f32 / elapsed),
                inferences = stats.dispatched - last_stats.dispatched,
                published = stats.published - last_stats.published,
                empty = stats.empty_detections - last_stats.empty_detections,
                avg_confidence = format!("{:.2}", confidence),
                peak_tensor_bytes = device.peak_bytes(),
                "throughput"
            );
            last_stats = stats;
            stats_timer = Instant::now();
        }
    }

    info!("shutting down");
    render_loop.stop();
    Ok(())
}
