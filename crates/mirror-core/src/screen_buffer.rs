//! Local Screen Buffer. The viewer's reconstructed image: starts out black
//! at a default size, gets fully replaced by each keyframe, and has deltas
//! pasted into it tile by tile.

use image::RgbImage;
use tracing::warn;

pub struct ScreenBuffer {
    image: RgbImage,
}

impl ScreenBuffer {
    /// Default black buffer shown before the first keyframe arrives.
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    pub fn replace_with_keyframe(&mut self, width: u32, height: u32, rgb: Vec<u8>) -> Result<(), String> {
        match RgbImage::from_raw(width, height, rgb) {
            Some(image) => {
                self.image = image;
                Ok(())
            }
            None => Err(format!(
                "keyframe buffer size does not match {}x{}x3",
                width, height
            )),
        }
    }

    /// Paste a decoded tile's pixels into the buffer at `(x, y)`. Tiles that
    /// fall outside the buffer's current bounds (stale dimensions before a
    /// keyframe catches the buffer up) are logged and skipped — the rest of
    /// the buffer stays consistent.
    pub fn paste_tile(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: &[u8]) {
        let (buf_width, buf_height) = (self.image.width(), self.image.height());
        if x >= buf_width || y >= buf_height {
            warn!(x, y, w, h, buf_width, buf_height, "tile origin outside buffer, skipping");
            return;
        }

        let clipped_w = w.min(buf_width - x);
        let clipped_h = h.min(buf_height - y);

        for row in 0..clipped_h {
            for col in 0..clipped_w {
                let src_index = ((row * w + col) * 3) as usize;
                if src_index + 3 > rgb.len() {
                    warn!(x, y, row, col, "tile payload shorter than declared dimensions, skipping rest of tile");
                    return;
                }
                let pixel = image::Rgb([rgb[src_index], rgb[src_index + 1], rgb[src_index + 2]]);
                self.image.put_pixel(x + col, y + row, pixel);
            }
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_black_buffer_is_all_zero() {
        let buffer = ScreenBuffer::new_black(4, 4);
        assert!(buffer.as_raw().iter().all(|&b| b == 0));
    }

    #[test]
    fn replace_with_keyframe_sets_pixels() {
        let mut buffer = ScreenBuffer::new_black(2, 2);
        let rgb = vec![255u8; 2 * 2 * 3];
        buffer.replace_with_keyframe(2, 2, rgb).unwrap();
        assert!(buffer.as_raw().iter().all(|&b| b == 255));
    }

    #[test]
    fn replace_with_keyframe_rejects_mismatched_size() {
        let mut buffer = ScreenBuffer::new_black(2, 2);
        let rgb = vec![0u8; 3];
        assert!(buffer.replace_with_keyframe(2, 2, rgb).is_err());
    }

    #[test]
    fn paste_tile_writes_correct_window() {
        let mut buffer = ScreenBuffer::new_black(4, 4);
        let tile = vec![200u8; 2 * 2 * 3];
        buffer.paste_tile(1, 1, 2, 2, &tile);

        let raw = buffer.as_raw();
        let stride = 4 * 3;
        let idx = (1 * stride + 1 * 3) as usize;
        assert_eq!(&raw[idx..idx + 3], &[200, 200, 200]);
        assert_eq!(&raw[0..3], &[0, 0, 0]);
    }

    #[test]
    fn paste_tile_outside_bounds_is_skipped_without_panic() {
        let mut buffer = ScreenBuffer::new_black(4, 4);
        let tile = vec![100u8; 2 * 2 * 3];
        buffer.paste_tile(10, 10, 2, 2, &tile);
        assert!(buffer.as_raw().iter().all(|&b| b == 0));
    }
}
