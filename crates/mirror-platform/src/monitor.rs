use anyhow::Result;
use async_trait::async_trait;

/// A single captured monitor image, packed RGB8 (no alpha), row-major.
pub struct MonitorFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixel data.
    pub data: Vec<u8>,
    /// Bytes per row. Equal to `width * 3` unless the backend pads rows.
    pub stride: u32,
}

/// The on-host desktop I/O synthesizer's capture half — out of scope per the
/// core's purpose statement, but implemented concretely per platform so the
/// repository runs end-to-end. The core only ever sees this trait.
#[async_trait]
pub trait MonitorCapture: Send + Sync {
    /// Initialize capture of the configured monitor, returns (width, height).
    async fn init(&mut self) -> Result<(u32, u32)>;

    /// Grab the current frame of the monitor.
    async fn capture_frame(&mut self) -> Result<MonitorFrame>;

    fn dimensions(&self) -> (u32, u32);
}
