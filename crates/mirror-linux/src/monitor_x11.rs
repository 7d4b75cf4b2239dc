//! X11 screen capture using xcb with the SHM extension for zero-copy frame
//! grabs. XCB hands back BGRA; this module strips the alpha channel and
//! swaps to RGB before returning, since `MonitorFrame`'s contract is packed
//! RGB8 — the core never deals in platform-native pixel formats.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mirror_platform::{MonitorCapture, MonitorFrame};

pub struct X11MonitorCapture {
    conn: xcb::Connection,
    screen_num: i32,
    width: u32,
    height: u32,
    root: u32,
    shm_seg: u32,
    shm_id: i32,
    shm_ptr: *mut u8,
    shm_size: usize,
    initialized: bool,
}

// SAFETY: the SHM pointer and xcb connection are only touched from this
// struct's own methods, called serially by the capture engine.
unsafe impl Send for X11MonitorCapture {}
unsafe impl Sync for X11MonitorCapture {}

impl X11MonitorCapture {
    pub fn new() -> Self {
        Self {
            conn: unsafe { std::mem::zeroed() },
            screen_num: 0,
            width: 0,
            height: 0,
            root: 0,
            shm_seg: 0,
            shm_id: -1,
            shm_ptr: std::ptr::null_mut(),
            shm_size: 0,
            initialized: false,
        }
    }

    fn setup_shm(&mut self) -> Result<()> {
        let size = (self.width * self.height * 4) as usize;

        self.shm_id = unsafe { libc::shmget(libc::IPC_PRIVATE, size, libc::IPC_CREAT | 0o600) };
        if self.shm_id < 0 {
            bail!("shmget failed: {}", std::io::Error::last_os_error());
        }

        let ptr = unsafe { libc::shmat(self.shm_id, std::ptr::null(), 0) };
        if ptr == (-1isize) as *mut libc::c_void {
            unsafe { libc::shmctl(self.shm_id, libc::IPC_RMID, std::ptr::null_mut()) };
            bail!("shmat failed: {}", std::io::Error::last_os_error());
        }
        self.shm_ptr = ptr as *mut u8;
        self.shm_size = size;

        unsafe { libc::shmctl(self.shm_id, libc::IPC_RMID, std::ptr::null_mut()) };

        self.shm_seg = self.conn.generate_id();
        let cookie = xcb::shm::attach_checked(&self.conn, self.shm_seg, self.shm_id as u32, false);
        cookie.request_check().context("xcb::shm::attach failed")?;

        Ok(())
    }

    fn cleanup_shm(&mut self) {
        if self.initialized {
            let _ = xcb::shm::detach_checked(&self.conn, self.shm_seg).request_check();
        }
        if !self.shm_ptr.is_null() {
            unsafe { libc::shmdt(self.shm_ptr as *const libc::c_void) };
            self.shm_ptr = std::ptr::null_mut();
        }
    }
}

impl Drop for X11MonitorCapture {
    fn drop(&mut self) {
        self.cleanup_shm();
    }
}

impl Default for X11MonitorCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips alpha and swaps channel order: BGRA (xcb's Z_PIXMAP format on
/// typical X servers) -> packed RGB8.
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
impl MonitorCapture for X11MonitorCapture {
    async fn init(&mut self) -> Result<(u32, u32)> {
        let (conn, screen_num) =
            xcb::Connection::connect(None).context("failed to connect to X11 display")?;

        let setup = conn.get_setup();
        let screen = setup
            .roots()
            .nth(screen_num as usize)
            .context("no X11 screen found")?;

        self.width = screen.width_in_pixels() as u32;
        self.height = screen.height_in_pixels() as u32;
        self.root = screen.root();
        self.screen_num = screen_num;
        self.conn = conn;

        let shm_query = xcb::shm::query_version(&self.conn);
        shm_query
            .get_reply()
            .context("X11 SHM extension not available")?;

        self.setup_shm()?;
        self.initialized = true;

        tracing::info!(
            width = self.width,
            height = self.height,
            screen = self.screen_num,
            "X11 monitor capture initialized"
        );

        Ok((self.width, self.height))
    }

    async fn capture_frame(&mut self) -> Result<MonitorFrame> {
        if !self.initialized {
            bail!("monitor capture not initialized");
        }

        let cookie = xcb::shm::get_image(
            &self.conn,
            self.root,
            0,
            0,
            self.width as u16,
            self.height as u16,
            !0u32,
            xcb::IMAGE_FORMAT_Z_PIXMAP as u8,
            self.shm_seg,
            0,
        );
        cookie.get_reply().context("xcb::shm::get_image failed")?;

        let bgra = unsafe { std::slice::from_raw_parts(self.shm_ptr, self.shm_size) };
        let rgb = bgra_to_rgb(bgra, self.width, self.height);

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
