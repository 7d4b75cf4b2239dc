//! Tile grid partitioning and per-tile fingerprinting.

use sha1::{Digest, Sha1};

/// A 20-byte digest of a tile's raw pixel bytes. Compared only for equality
/// — never authenticated, so SHA-1's collision weakness is irrelevant here.
pub type TileFingerprint = [u8; 20];

/// Grid index of a tile cell. Not a pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub tx: u16,
    pub ty: u16,
}

/// A tile's pixel rectangle within the source image, row-major iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub coord: TileCoord,
    /// Pixel offset of the tile's top-left corner.
    pub x: u32,
    pub y: u32,
    /// True dimensions — smaller than the grid's nominal tile size at the
    /// right/bottom edge when the image isn't an exact multiple of it.
    pub w: u32,
    pub h: u32,
}

/// Partitions a `width x height` image into a regular grid of `tile_size`
/// cells, row-major, top-left first. Deterministic and total: every pixel
/// belongs to exactly one tile.
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles_x: u32,
    tiles_y: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        assert!(tile_size > 0, "tile size must be nonzero");
        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);
        Self {
            width,
            height,
            tile_size,
            tiles_x,
            tiles_y,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major, top-left-first iteration over every tile in the grid.
    pub fn iter(&self) -> impl Iterator<Item = TileRect> + '_ {
        let tile_size = self.tile_size;
        let width = self.width;
        let height = self.height;
        (0..self.tiles_y).flat_map(move |ty| {
            (0..self.tiles_x).map(move |tx| {
                let x = tx * tile_size;
                let y = ty * tile_size;
                let w = (width - x).min(tile_size);
                let h = (height - y).min(tile_size);
                TileRect {
                    coord: TileCoord {
                        tx: tx as u16,
                        ty: ty as u16,
                    },
                    x,
                    y,
                    w,
                    h,
                }
            })
        })
    }
}

/// Extracts a tile's raw RGB bytes from a packed `RGB8` image buffer with the
/// given stride (bytes per row), row-major within the tile.
pub fn extract_tile_rgb(image: &[u8], stride: u32, rect: &TileRect) -> Vec<u8> {
    let mut out = Vec::with_capacity((rect.w * rect.h * 3) as usize);
    for row in 0..rect.h {
        let row_start = ((rect.y + row) * stride + rect.x * 3) as usize;
        let row_end = row_start + (rect.w * 3) as usize;
        out.extend_from_slice(&image[row_start..row_end]);
    }
    out
}

/// Fingerprints a tile's raw RGB bytes exactly as extracted — no color-space
/// transform, no dependency on surrounding pixels.
pub fn fingerprint_tile(tile_rgb: &[u8]) -> TileFingerprint {
    let mut hasher = Sha1::new();
    hasher.update(tile_rgb);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_exact_multiple() {
        let grid = TileGrid::new(128, 64, 64);
        assert_eq!(grid.tile_count(), 4);
        let rects: Vec<_> = grid.iter().collect();
        assert_eq!(rects.len(), 4);
        assert!(rects.iter().all(|r| r.w == 64 && r.h == 64));
    }

    #[test]
    fn grid_handles_edge_tiles() {
        let grid = TileGrid::new(100, 70, 64);
        assert_eq!(grid.tile_count(), 4); // 2x2: ceil(100/64)=2, ceil(70/64)=2
        let rects: Vec<_> = grid.iter().collect();
        let bottom_right = rects
            .iter()
            .find(|r| r.coord.tx == 1 && r.coord.ty == 1)
            .unwrap();
        assert_eq!(bottom_right.w, 100 - 64);
        assert_eq!(bottom_right.h, 70 - 64);
    }

    #[test]
    fn iteration_is_row_major_top_left_first() {
        let grid = TileGrid::new(192, 128, 64);
        let coords: Vec<_> = grid.iter().map(|r| (r.coord.tx, r.coord.ty)).collect();
        assert_eq!(
            coords,
            vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
        );
    }

    #[test]
    fn fingerprint_depends_only_on_pixel_bytes() {
        let a = vec![1u8, 2, 3, 4, 5, 6];
        let b = a.clone();
        let c = vec![1u8, 2, 3, 4, 5, 7];
        assert_eq!(fingerprint_tile(&a), fingerprint_tile(&b));
        assert_ne!(fingerprint_tile(&a), fingerprint_tile(&c));
    }

    #[test]
    fn extract_tile_rgb_reads_correct_window() {
        // 2x2 image, stride = 2*3 = 6, pixel (1,1) is the bottom-right texel.
        let image: Vec<u8> = vec![
            10, 10, 10, 20, 20, 20, // row 0: (0,0) (1,0)
            30, 30, 30, 40, 40, 40, // row 1: (0,1) (1,1)
        ];
        let rect = TileRect {
            coord: TileCoord { tx: 1, ty: 1 },
            x: 1,
            y: 1,
            w: 1,
            h: 1,
        };
        let out = extract_tile_rgb(&image, 6, &rect);
        assert_eq!(out, vec![40, 40, 40]);
    }
}
