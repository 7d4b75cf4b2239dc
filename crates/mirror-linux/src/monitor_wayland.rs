//! Wayland capture is not implemented. A real backend would negotiate
//! xdg-desktop-portal's ScreenCast interface and read frames over PipeWire,
//! but that's substantially more surface than this repository's capture
//! contract needs to demonstrate. Callers on Wayland sessions get a clear
//! error instead of a silent black screen.

use anyhow::{bail, Result};
use async_trait::async_trait;
use mirror_platform::{MonitorCapture, MonitorFrame};

#[derive(Default)]
pub struct WaylandMonitorCapture;

impl WaylandMonitorCapture {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MonitorCapture for WaylandMonitorCapture {
    async fn init(&mut self) -> Result<(u32, u32)> {
        bail!("Wayland monitor capture is not implemented; run under X11 or Xwayland")
    }

    async fn capture_frame(&mut self) -> Result<MonitorFrame> {
        bail!("Wayland monitor capture is not implemented; run under X11 or Xwayland")
    }

    fn dimensions(&self) -> (u32, u32) {
        (0, 0)
    }
}
