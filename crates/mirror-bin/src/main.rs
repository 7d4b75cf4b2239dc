use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mirror_core::{
    run_capture_engine, run_session_manager, run_viewer_client, CaptureEngine, EngineConfig,
    HostConfig, InputTranslator, PixelRect, PresentationSink, ScreenBuffer, SessionManagerConfig,
    Settings, ViewerConfig,
};
use mirror_platform::{DesktopInput, MonitorCapture};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Server,
    Client,
}

#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(about = "Tile-based delta screen-streaming host and viewer")]
#[command(version)]
struct Cli {
    #[arg(long)]
    mode: Mode,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8765)]
    port: u16,

    /// Server-only: which monitor to capture.
    #[arg(long, default_value_t = 0)]
    monitor_id: u32,

    #[arg(long, default_value_t = 64)]
    tile_size: u16,

    /// Server-only: changed-tile ratio above which a keyframe is sent instead of a delta.
    #[arg(long, default_value_t = 0.6)]
    fallback_threshold: f32,

    /// Server-only: seconds between capture ticks.
    #[arg(long, default_value_t = 0.1)]
    capture_interval: f64,

    #[arg(long, default_value_t = 75)]
    webp_quality: u8,

    #[arg(long, default_value_t = 80)]
    jpeg_quality: u8,

    /// Client-only: seconds before the first reconnect attempt.
    #[arg(long, default_value_t = 1.0)]
    reconnect_delay: f64,

    #[arg(long, default_value_t = 1920)]
    default_width: u32,

    #[arg(long, default_value_t = 1080)]
    default_height: u32,

    #[arg(long, default_value = "info", env = "MIRROR_LOG_LEVEL")]
    log_level: String,

    #[arg(long, env = "MIRROR_CONFIG_PATH")]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        "mirror v{} starting (os={}, arch={}, mode={:?})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        cli.mode,
    );

    let config_path = cli
        .config_path
        .clone()
        .or_else(Settings::default_path)
        .context("could not determine a config path")?;
    let _settings = Settings::load(&config_path);

    match cli.mode {
        Mode::Server => run_server(cli).await,
        Mode::Client => run_client(cli).await,
    }
}

async fn run_server(cli: Cli) -> Result<()> {
    let config = HostConfig {
        monitor_id: cli.monitor_id,
        tile_size: cli.tile_size,
        fallback_threshold: cli.fallback_threshold,
        capture_interval: Duration::from_secs_f64(cli.capture_interval),
        jpeg_quality: cli.jpeg_quality,
        webp_quality: cli.webp_quality,
        bind_host: cli.host,
        bind_port: cli.port,
    };

    let mut monitor = make_monitor_capture()?;
    monitor.init().await.context("monitor capture init failed")?;

    let desktop = make_desktop_input()?;
    let input_translator = std::sync::Arc::new(InputTranslator::new(desktop));

    let engine = CaptureEngine::new(
        monitor,
        EngineConfig {
            tile_size: config.tile_size,
            fallback_threshold: config.fallback_threshold,
            capture_interval: config.capture_interval,
            jpeg_quality: config.jpeg_quality,
            webp_quality: config.webp_quality,
        },
    );

    let (engine_cmd_tx, engine_cmd_rx) = mpsc::channel(16);
    let (broadcast_tx, broadcast_rx) = mpsc::channel(64);

    let engine_task = tokio::spawn(run_capture_engine(engine, engine_cmd_rx, broadcast_tx));

    let session_config = SessionManagerConfig {
        bind_host: config.bind_host,
        bind_port: config.bind_port,
        tile_size: config.tile_size,
        outbound_queue_capacity: 8,
    };

    let result = run_session_manager(session_config, input_translator, engine_cmd_tx, broadcast_rx).await;
    engine_task.abort();
    result
}

async fn run_client(cli: Cli) -> Result<()> {
    let config = ViewerConfig {
        host: cli.host,
        port: cli.port,
        initial_reconnect_delay: Duration::from_secs_f64(cli.reconnect_delay),
        default_width: cli.default_width,
        default_height: cli.default_height,
        tile_size: cli.tile_size,
    };

    let sink = Box::new(LoggingSink::default());
    let _handle = run_viewer_client(config, sink);

    // No presentation surface is in scope here; keep the process alive. The
    // client loop sends its own redraw_full_frame on every (re)connect.
    std::future::pending::<()>().await;
    Ok(())
}

#[derive(Default)]
struct LoggingSink {
    frames_presented: u64,
}

impl PresentationSink for LoggingSink {
    fn present(&mut self, buffer: &ScreenBuffer, changed: &[PixelRect]) {
        self.frames_presented += 1;
        let (width, height) = buffer.dimensions();
        tracing::debug!(
            frames_presented = self.frames_presented,
            width,
            height,
            changed_rects = changed.len(),
            "frame presented"
        );
    }

    fn connection_state_changed(&mut self, connected: bool) {
        info!(connected, "connection state changed");
    }
}

#[cfg(target_os = "linux")]
fn make_monitor_capture() -> Result<Box<dyn MonitorCapture>> {
    Ok(Box::new(mirror_linux::X11MonitorCapture::new()))
}

#[cfg(target_os = "windows")]
fn make_monitor_capture() -> Result<Box<dyn MonitorCapture>> {
    Ok(Box::new(mirror_windows::GdiMonitorCapture::new()))
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn make_monitor_capture() -> Result<Box<dyn MonitorCapture>> {
    anyhow::bail!("monitor capture is not implemented for this platform")
}

#[cfg(target_os = "linux")]
fn make_desktop_input() -> Result<Box<dyn DesktopInput>> {
    let mut input = mirror_linux::X11DesktopInput::new();
    input.init()?;
    Ok(Box::new(input))
}

#[cfg(target_os = "windows")]
fn make_desktop_input() -> Result<Box<dyn DesktopInput>> {
    Ok(Box::new(mirror_windows::SendInputDesktop::new()))
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn make_desktop_input() -> Result<Box<dyn DesktopInput>> {
    anyhow::bail!("input injection is not implemented for this platform")
}
