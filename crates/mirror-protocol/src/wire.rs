//! Binary wire format for host-to-viewer screen frames.
//!
//! ```text
//! Keyframe record:
//!   offset 0: u8  type = 0x01
//!   offset 1: u32 frame_id
//!   offset 5: bytes[...] compressed full image (JPEG)
//!
//! Delta record:
//!   offset 0: u8  type = 0x00
//!   offset 1: u32 frame_id
//!   offset 5: u16 n_tiles
//!   offset 7: n_tiles x TileEntry
//!
//!   TileEntry (12 byte header + payload):
//!     u16 tx
//!     u16 ty
//!     u16 tile_w
//!     u16 tile_h
//!     u32 data_len
//!     bytes[data_len] compressed tile (WebP)
//! ```
//!
//! All multi-byte integers are big-endian. Keyframes carry JPEG, tiles carry
//! WebP; this asymmetry is a protocol constant, not negotiated on the wire.

use bytes::{Buf, BufMut};
use thiserror::Error;

pub const KEYFRAME_TYPE: u8 = 0x01;
pub const DELTA_TYPE: u8 = 0x00;

const KEYFRAME_HEADER_LEN: usize = 5;
const DELTA_HEADER_LEN: usize = 7;
const TILE_ENTRY_HEADER_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("unknown frame type tag: 0x{0:02x}")]
    UnknownType(u8),
    #[error("tile entry header truncated at index {index}")]
    TruncatedTileHeader { index: usize },
    #[error("tile entry payload truncated at index {index}: need {need} bytes, have {have}")]
    TruncatedTilePayload {
        index: usize,
        need: usize,
        have: usize,
    },
}

/// One changed tile in a delta record. `tile_w`/`tile_h` are the tile's true
/// dimensions (edge tiles may be smaller than the grid's nominal size);
/// `tx`/`ty` are grid indices, not pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileEntry {
    pub tx: u16,
    pub ty: u16,
    pub tile_w: u16,
    pub tile_h: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Keyframe { frame_id: u32, image: Vec<u8> },
    Delta { frame_id: u32, tiles: Vec<TileEntry> },
}

impl Frame {
    /// Pack a full-image keyframe record.
    pub fn pack_keyframe(frame_id: u32, image: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(KEYFRAME_HEADER_LEN + image.len());
        buf.put_u8(KEYFRAME_TYPE);
        buf.put_u32(frame_id);
        buf.extend_from_slice(image);
        buf
    }

    /// Pack a delta record from an ordered list of changed tiles.
    ///
    /// Callers must keep `tiles.len()` within `u16::MAX`; any real tile grid
    /// (even a 4K screen at the default 64px tile size is under 5,000 tiles)
    /// is far below that bound.
    pub fn pack_delta(frame_id: u32, tiles: &[TileEntry]) -> Vec<u8> {
        let body_len: usize = tiles
            .iter()
            .map(|t| TILE_ENTRY_HEADER_LEN + t.data.len())
            .sum();
        let mut buf = Vec::with_capacity(DELTA_HEADER_LEN + body_len);
        buf.put_u8(DELTA_TYPE);
        buf.put_u32(frame_id);
        buf.put_u16(tiles.len() as u16);
        for tile in tiles {
            buf.put_u16(tile.tx);
            buf.put_u16(tile.ty);
            buf.put_u16(tile.tile_w);
            buf.put_u16(tile.tile_h);
            buf.put_u32(tile.data.len() as u32);
            buf.extend_from_slice(&tile.data);
        }
        buf
    }

    /// Unpack a received binary frame into a keyframe or delta record.
    pub fn unpack(buf: &[u8]) -> Result<Frame, ProtocolError> {
        if buf.is_empty() {
            return Err(ProtocolError::TooShort { need: 1, have: 0 });
        }
        let frame_type = buf[0];
        match frame_type {
            KEYFRAME_TYPE => {
                if buf.len() < KEYFRAME_HEADER_LEN {
                    return Err(ProtocolError::TooShort {
                        need: KEYFRAME_HEADER_LEN,
                        have: buf.len(),
                    });
                }
                let mut cursor = &buf[1..];
                let frame_id = cursor.get_u32();
                let image = cursor.to_vec();
                Ok(Frame::Keyframe { frame_id, image })
            }
            DELTA_TYPE => {
                if buf.len() < DELTA_HEADER_LEN {
                    return Err(ProtocolError::TooShort {
                        need: DELTA_HEADER_LEN,
                        have: buf.len(),
                    });
                }
                let mut cursor = &buf[1..];
                let frame_id = cursor.get_u32();
                let n_tiles = cursor.get_u16() as usize;

                let mut tiles = Vec::with_capacity(n_tiles);
                for index in 0..n_tiles {
                    if cursor.len() < TILE_ENTRY_HEADER_LEN {
                        return Err(ProtocolError::TruncatedTileHeader { index });
                    }
                    let tx = cursor.get_u16();
                    let ty = cursor.get_u16();
                    let tile_w = cursor.get_u16();
                    let tile_h = cursor.get_u16();
                    let data_len = cursor.get_u32() as usize;

                    if cursor.len() < data_len {
                        return Err(ProtocolError::TruncatedTilePayload {
                            index,
                            need: data_len,
                            have: cursor.len(),
                        });
                    }
                    let data = cursor[..data_len].to_vec();
                    cursor.advance(data_len);

                    tiles.push(TileEntry {
                        tx,
                        ty,
                        tile_w,
                        tile_h,
                        data,
                    });
                }

                Ok(Frame::Delta { frame_id, tiles })
            }
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyframe_roundtrip() {
        let image = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let packed = Frame::pack_keyframe(7, &image);
        assert_eq!(packed[0], KEYFRAME_TYPE);

        let unpacked = Frame::unpack(&packed).unwrap();
        assert_eq!(
            unpacked,
            Frame::Keyframe {
                frame_id: 7,
                image
            }
        );
    }

    #[test]
    fn delta_roundtrip_with_tiles() {
        let tiles = vec![
            TileEntry {
                tx: 0,
                ty: 0,
                tile_w: 64,
                tile_h: 64,
                data: vec![1, 2, 3, 4],
            },
            TileEntry {
                tx: 1,
                ty: 0,
                tile_w: 32,
                tile_h: 64,
                data: vec![9, 9],
            },
        ];
        let packed = Frame::pack_delta(42, &tiles);
        assert_eq!(packed[0], DELTA_TYPE);

        let unpacked = Frame::unpack(&packed).unwrap();
        assert_eq!(
            unpacked,
            Frame::Delta {
                frame_id: 42,
                tiles
            }
        );
    }

    #[test]
    fn empty_delta_roundtrip() {
        let packed = Frame::pack_delta(1, &[]);
        let unpacked = Frame::unpack(&packed).unwrap();
        assert_eq!(
            unpacked,
            Frame::Delta {
                frame_id: 1,
                tiles: vec![]
            }
        );
    }

    #[test]
    fn empty_buffer_is_too_short() {
        assert_eq!(
            Frame::unpack(&[]).unwrap_err(),
            ProtocolError::TooShort { need: 1, have: 0 }
        );
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let buf = [0x42, 0, 0, 0, 0];
        assert_eq!(
            Frame::unpack(&buf).unwrap_err(),
            ProtocolError::UnknownType(0x42)
        );
    }

    #[test]
    fn truncated_keyframe_header() {
        let buf = [KEYFRAME_TYPE, 0, 0];
        assert_eq!(
            Frame::unpack(&buf).unwrap_err(),
            ProtocolError::TooShort {
                need: KEYFRAME_HEADER_LEN,
                have: buf.len()
            }
        );
    }

    #[test]
    fn truncated_tile_header() {
        // delta header claims one tile but the buffer ends right after it.
        let mut buf = Vec::new();
        buf.put_u8(DELTA_TYPE);
        buf.put_u32(1);
        buf.put_u16(1);
        buf.extend_from_slice(&[0, 0, 0]); // short of the 12-byte tile header
        assert_eq!(
            Frame::unpack(&buf).unwrap_err(),
            ProtocolError::TruncatedTileHeader { index: 0 }
        );
    }

    #[test]
    fn truncated_tile_payload() {
        let mut buf = Vec::new();
        buf.put_u8(DELTA_TYPE);
        buf.put_u32(1);
        buf.put_u16(1);
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u16(64);
        buf.put_u16(64);
        buf.put_u32(10); // claims 10 bytes of tile data
        buf.extend_from_slice(&[1, 2, 3]); // only 3 provided
        assert_eq!(
            Frame::unpack(&buf).unwrap_err(),
            ProtocolError::TruncatedTilePayload {
                index: 0,
                need: 10,
                have: 3
            }
        );
    }
}
