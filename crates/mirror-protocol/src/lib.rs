pub mod tiles;
pub mod wire;

pub use tiles::{extract_tile_rgb, fingerprint_tile, TileCoord, TileFingerprint, TileGrid, TileRect};
pub use wire::{Frame, ProtocolError, TileEntry, DELTA_TYPE, KEYFRAME_TYPE};
