//! Windows screen capture via GDI `BitBlt`. DXGI Desktop Duplication is a
//! reasonable step up in throughput but pulls in the Direct3D/Dxgi feature
//! set for a budget this repository doesn't need to spend; GDI covers every
//! session type, including RDP, where Desktop Duplication doesn't.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mirror_platform::{MonitorCapture, MonitorFrame};
use tracing::info;

pub struct GdiMonitorCapture {
    width: u32,
    height: u32,
    initialized: bool,
}

unsafe impl Send for GdiMonitorCapture {}
unsafe impl Sync for GdiMonitorCapture {}

impl GdiMonitorCapture {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            initialized: false,
        }
    }
}

impl Default for GdiMonitorCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips alpha and swaps channel order: BGRA (GDI's 32-bit DIB layout) ->
/// packed RGB8.
fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for px in bgra.chunks_exact(4).take(pixel_count) {
        rgb.push(px[2]);
        rgb.push(px[1]);
        rgb.push(px[0]);
    }
    rgb
}

#[async_trait]
impl MonitorCapture for GdiMonitorCapture {
    async fn init(&mut self) -> Result<(u32, u32)> {
        info!("initializing GDI monitor capture");

        unsafe {
            use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};
            let width = GetSystemMetrics(SM_CXSCREEN) as u32;
            let height = GetSystemMetrics(SM_CYSCREEN) as u32;

            if width == 0 || height == 0 {
                bail!("GetSystemMetrics returned zero dimensions");
            }

            self.width = width;
            self.height = height;
            self.initialized = true;
            Ok((width, height))
        }
    }

    async fn capture_frame(&mut self) -> Result<MonitorFrame> {
        if !self.initialized {
            bail!("monitor capture not initialized");
        }

        let bgra = unsafe { capture_bgra(self.width, self.height)? };
        let rgb = bgra_to_rgb(&bgra, self.width, self.height);

        Ok(MonitorFrame {
            width: self.width,
            height: self.height,
            data: rgb,
            stride: self.width * 3,
        })
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

unsafe fn capture_bgra(width: u32, height: u32) -> Result<Vec<u8>> {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, DIB_RGB_COLORS, SRCCOPY,
    };

    let hdc_screen = GetDC(HWND::default());
    if hdc_screen.0.is_null() {
        bail!("GetDC(NULL) failed");
    }

    let hdc_mem = CreateCompatibleDC(hdc_screen);
    if hdc_mem.0.is_null() {
        ReleaseDC(HWND::default(), hdc_screen);
        bail!("CreateCompatibleDC failed");
    }

    let hbmp = CreateCompatibleBitmap(hdc_screen, width as i32, height as i32);
    if hbmp.0.is_null() {
        DeleteDC(hdc_mem);
        ReleaseDC(HWND::default(), hdc_screen);
        bail!("CreateCompatibleBitmap failed");
    }

    let old_bmp = SelectObject(hdc_mem, hbmp);

    let blt_result = BitBlt(
        hdc_mem,
        0,
        0,
        width as i32,
        height as i32,
        hdc_screen,
        0,
        0,
        SRCCOPY,
    )
    .context("BitBlt failed");

    let mut bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: 0,
            biSizeImage: 0,
            biXPelsPerMeter: 0,
            biYPelsPerMeter: 0,
            biClrUsed: 0,
            biClrImportant: 0,
        },
        bmiColors: [Default::default()],
    };

    let buf_size = (width * height * 4) as usize;
    let mut data = vec![0u8; buf_size];

    let lines = if blt_result.is_ok() {
        GetDIBits(
            hdc_mem,
            hbmp,
            0,
            height,
            Some(data.as_mut_ptr() as *mut _),
            &mut bmi,
            DIB_RGB_COLORS,
        )
    } else {
        0
    };

    SelectObject(hdc_mem, old_bmp);
    let _ = DeleteObject(hbmp);
    let _ = DeleteDC(hdc_mem);
    ReleaseDC(HWND::default(), hdc_screen);

    blt_result?;
    if lines == 0 {
        bail!("GetDIBits returned 0 lines");
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_to_rgb_swaps_channels_and_drops_alpha() {
        let bgra = vec![10u8, 20, 30, 255, 40, 50, 60, 255];
        let rgb = bgra_to_rgb(&bgra, 2, 1);
        assert_eq!(rgb, vec![30, 20, 10, 60, 50, 40]);
    }
}
