//! Capture-Broadcast Engine. Owns the monitor capture handle and the
//! previous-frame tile hash map; on each tick it decides keyframe vs delta
//! and hands the packed wire bytes off to whoever is driving it.

use std::collections::HashMap;
use std::time::Duration;

use mirror_platform::MonitorCapture;
use mirror_protocol::{extract_tile_rgb, fingerprint_tile, Frame, TileCoord, TileEntry, TileFingerprint, TileGrid};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec_image::{encode_jpeg, encode_webp};
use crate::error::CaptureError;
use crate::session::SessionId;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tile_size: u16,
    pub fallback_threshold: f32,
    pub capture_interval: Duration,
    pub jpeg_quality: u8,
    pub webp_quality: u8,
}

/// Told to the engine by the Session Manager when a viewer needs a full
/// redraw outside the regular capture cadence (§4.3's "redraw_full_frame").
#[derive(Debug, Clone, Copy)]
pub enum EngineCommand {
    RedrawFor(SessionId),
}

/// What the engine hands to the Session Manager for distribution. The packed
/// bytes are shared across however many viewers receive them, per §5's
/// immutable-once-passed rule.
#[derive(Debug, Clone)]
pub enum BroadcastItem {
    Broadcast(OutboundFrame),
    SendTo(SessionId, OutboundFrame),
}

#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Keyframe(std::sync::Arc<Vec<u8>>),
    Delta(std::sync::Arc<Vec<u8>>),
}

pub struct CaptureEngine {
    monitor: Box<dyn MonitorCapture>,
    config: EngineConfig,
    frame_id: u32,
    prev_hashes: HashMap<TileCoord, TileFingerprint>,
}

impl CaptureEngine {
    pub fn new(monitor: Box<dyn MonitorCapture>, config: EngineConfig) -> Self {
        Self {
            monitor,
            config,
            frame_id: 0,
            prev_hashes: HashMap::new(),
        }
    }

    fn next_frame_id(&mut self) -> u32 {
        self.frame_id = self.frame_id.wrapping_add(1);
        self.frame_id
    }

    /// One regular-cadence tick: capture, diff against the previous-hash
    /// map, pack a keyframe or a delta depending on the changed-tile ratio,
    /// and replace the previous-hash map with this tick's fingerprints.
    ///
    /// Returns `None` on capture failure — the caller logs and retries next
    /// interval; the previous-hash map is left untouched so the next tick's
    /// comparison still means something.
    pub async fn capture_and_pack(&mut self) -> Option<Vec<u8>> {
        let frame = match self.monitor.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %CaptureError(e), "capture failed, skipping this tick");
                return None;
            }
        };

        let grid = TileGrid::new(frame.width, frame.height, u32::from(self.config.tile_size));
        let mut new_hashes = HashMap::with_capacity(grid.tile_count());
        let mut changed = Vec::new();

        for rect in grid.iter() {
            let tile_rgb = extract_tile_rgb(&frame.data, frame.stride, &rect);
            let fingerprint = fingerprint_tile(&tile_rgb);
            let is_changed = self.prev_hashes.get(&rect.coord) != Some(&fingerprint);
            if is_changed {
                changed.push((rect, tile_rgb));
            }
            new_hashes.insert(rect.coord, fingerprint);
        }

        let ratio = changed.len() as f32 / grid.tile_count().max(1) as f32;
        let frame_id = self.next_frame_id();

        let packed = if ratio > self.config.fallback_threshold {
            debug!(frame_id, ratio, "changed-tile ratio exceeds threshold, sending keyframe");
            match encode_jpeg(&frame.data, frame.width, frame.height, self.config.jpeg_quality) {
                Ok(jpeg) => Frame::pack_keyframe(frame_id, &jpeg),
                Err(e) => {
                    warn!(error = %e, "keyframe encode failed, skipping this tick");
                    return None;
                }
            }
        } else {
            let mut tiles = Vec::with_capacity(changed.len());
            for (rect, tile_rgb) in changed {
                match encode_webp(&tile_rgb, rect.w, rect.h, self.config.webp_quality) {
                    Ok(data) => tiles.push(TileEntry {
                        tx: rect.coord.tx,
                        ty: rect.coord.ty,
                        tile_w: rect.w as u16,
                        tile_h: rect.h as u16,
                        data,
                    }),
                    Err(e) => {
                        warn!(error = %e, tx = rect.coord.tx, ty = rect.coord.ty, "tile encode failed, skipping tile");
                    }
                }
            }
            debug!(frame_id, n_tiles = tiles.len(), "sending delta");
            Frame::pack_delta(frame_id, &tiles)
        };

        self.prev_hashes = new_hashes;
        Some(packed)
    }

    /// An out-of-band keyframe for a single viewer's redraw request. Captures
    /// independently of the regular cadence and does not touch the regular
    /// loop's previous-hash map, so the normal delta stream is unaffected
    /// once this completes.
    pub async fn capture_keyframe(&mut self) -> Option<Vec<u8>> {
        let frame = match self.monitor.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %CaptureError(e), "redraw capture failed");
                return None;
            }
        };
        let frame_id = self.next_frame_id();
        match encode_jpeg(&frame.data, frame.width, frame.height, self.config.jpeg_quality) {
            Ok(jpeg) => Some(Frame::pack_keyframe(frame_id, &jpeg)),
            Err(e) => {
                warn!(error = %e, "redraw keyframe encode failed");
                None
            }
        }
    }
}

fn classify(packed: Vec<u8>) -> OutboundFrame {
    let shared = std::sync::Arc::new(packed);
    if shared.first() == Some(&mirror_protocol::KEYFRAME_TYPE) {
        OutboundFrame::Keyframe(shared)
    } else {
        OutboundFrame::Delta(shared)
    }
}

/// Drives the regular capture cadence and services redraw requests, handing
/// each packed frame to `broadcast_tx` for the Session Manager to fan out.
pub async fn run_capture_engine(
    mut engine: CaptureEngine,
    mut engine_cmd_rx: mpsc::Receiver<EngineCommand>,
    broadcast_tx: mpsc::Sender<BroadcastItem>,
) {
    let mut ticker = tokio::time::interval(engine.config.capture_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(packed) = engine.capture_and_pack().await {
                    if broadcast_tx.send(BroadcastItem::Broadcast(classify(packed))).await.is_err() {
                        break;
                    }
                }
            }
            cmd = engine_cmd_rx.recv() => {
                match cmd {
                    Some(EngineCommand::RedrawFor(session_id)) => {
                        if let Some(packed) = engine.capture_keyframe().await {
                            if broadcast_tx.send(BroadcastItem::SendTo(session_id, classify(packed))).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_keyframe_packed_bytes() {
        let packed = Frame::pack_keyframe(1, &[0xFF, 0xD8]);
        match classify(packed) {
            OutboundFrame::Keyframe(_) => {}
            OutboundFrame::Delta(_) => panic!("expected keyframe"),
        }
    }

    #[test]
    fn classify_delta_packed_bytes() {
        let packed = Frame::pack_delta(1, &[]);
        match classify(packed) {
            OutboundFrame::Delta(_) => {}
            OutboundFrame::Keyframe(_) => panic!("expected delta"),
        }
    }
}
