//! Viewer Client. Dials the host, applies the tile-size handshake, decodes
//! incoming frames into the local screen buffer, and hands input/redraw
//! commands from the presentation surface back to the host. Reconnects with
//! the same exponential-backoff-plus-jitter algorithm used elsewhere in this
//! codebase for server connections, since the shape of the problem —
//! "retry a flaky outbound connection without hammering the other end" — is
//! identical.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use mirror_protocol::{Frame, TileEntry};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

type ClientWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

use crate::codec_image::{decode_jpeg, decode_webp};
use crate::config::ViewerConfig;
use crate::screen_buffer::ScreenBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// The out-of-scope presentation/input surface's interface into the client.
pub trait PresentationSink: Send {
    fn present(&mut self, buffer: &ScreenBuffer, changed: &[PixelRect]);
    fn connection_state_changed(&mut self, connected: bool);
}

/// Commands the presentation/input collaborator sends across the
/// concurrency boundary into the session loop.
#[derive(Debug, Clone)]
pub enum ViewerCommand {
    MouseMove { x: i32, y: i32 },
    MouseClick { x: i32, y: i32 },
    KeyPress { key: String },
    RedrawFullFrame,
}

#[derive(Clone)]
pub struct ViewerHandle {
    tx: mpsc::Sender<ViewerCommand>,
    state: watch::Receiver<ClientState>,
}

impl ViewerHandle {
    pub async fn send(&self, command: ViewerCommand) {
        let _ = self.tx.send(command).await;
    }

    /// The viewer's current position in the Idle/Connecting/Connected/Closed
    /// state machine, as of the last observed transition.
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }
}

fn reconnect_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let base = initial.as_secs_f64();
    let max = max.as_secs_f64();
    let delay = (base * 2.0f64.powi(attempt as i32 - 1)).min(max);
    let jitter = delay * 0.25 * (2.0 * rand_simple() - 1.0);
    Duration::from_secs_f64((delay + jitter).max(base))
}

fn rand_simple() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Spawns the reconnect loop and returns a handle for sending viewer
/// commands into it. `sink` receives buffer updates and connection-state
/// changes.
pub fn run_viewer_client(config: ViewerConfig, mut sink: Box<dyn PresentationSink>) -> ViewerHandle {
    let (tx, rx) = mpsc::channel(64);
    let (state_tx, state_rx) = watch::channel(ClientState::Idle);
    tokio::spawn(async move {
        client_loop(config, rx, state_tx, sink.as_mut()).await;
    });
    ViewerHandle { tx, state: state_rx }
}

async fn client_loop(
    config: ViewerConfig,
    mut command_rx: mpsc::Receiver<ViewerCommand>,
    state_tx: watch::Sender<ClientState>,
    sink: &mut dyn PresentationSink,
) {
    let max_delay = Duration::from_secs(60);
    let mut attempt = 0u32;
    let mut buffer = ScreenBuffer::new_black(config.default_width, config.default_height);
    let mut tile_size = config.tile_size;

    loop {
        let delay = reconnect_delay(config.initial_reconnect_delay, max_delay, attempt);
        if attempt > 0 {
            info!("reconnecting in {:.1}s (attempt {})", delay.as_secs_f64(), attempt);
            tokio::time::sleep(delay).await;
        }

        let _ = state_tx.send(ClientState::Connecting);
        match run_session(&config, &mut buffer, &mut tile_size, &state_tx, &mut command_rx, sink).await {
            Ok(()) => {
                info!("connection closed gracefully");
                attempt = 0;
            }
            Err(e) => {
                error!("connection error: {:#}", e);
                attempt = attempt.saturating_add(1);
            }
        }
        sink.connection_state_changed(false);

        if command_rx.is_closed() {
            let _ = state_tx.send(ClientState::Closed);
            break;
        }
    }
}

async fn run_session(
    config: &ViewerConfig,
    buffer: &mut ScreenBuffer,
    tile_size: &mut u16,
    state_tx: &watch::Sender<ClientState>,
    command_rx: &mut mpsc::Receiver<ViewerCommand>,
    sink: &mut dyn PresentationSink,
) -> anyhow::Result<()> {
    let url = format!("ws://{}:{}", config.host, config.port);
    debug!(%url, "connecting");
    let (ws, _) = connect_async(&url).await?;
    let (mut write, mut read) = ws.split();
    sink.connection_state_changed(true);
    let _ = state_tx.send(ClientState::Connected);
    send_command(&mut write, ViewerCommand::RedrawFullFrame).await?;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        handle_wire_frame(&bytes, *tile_size, buffer, sink);
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_text_message(&text, tile_size);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(command) => send_command(&mut write, command).await?,
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn handle_wire_frame(bytes: &[u8], tile_size: u16, buffer: &mut ScreenBuffer, sink: &mut dyn PresentationSink) {
    let frame = match Frame::unpack(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping malformed wire frame");
            return;
        }
    };

    match frame {
        Frame::Keyframe { image, .. } => match decode_jpeg(&image) {
            Ok((width, height, rgb)) => {
                if let Err(e) = buffer.replace_with_keyframe(width, height, rgb) {
                    warn!(error = %e, "keyframe did not match declared dimensions");
                    return;
                }
                let (w, h) = buffer.dimensions();
                sink.present(buffer, &[PixelRect { x: 0, y: 0, w, h }]);
            }
            Err(e) => warn!(error = %e, "keyframe decode failed, skipping"),
        },
        Frame::Delta { tiles, .. } => {
            let mut changed = Vec::with_capacity(tiles.len());
            for TileEntry { tx, ty, tile_w, tile_h, data } in tiles {
                match decode_webp(&data) {
                    Ok((_, _, rgb)) => {
                        let x = tx as u32 * u32::from(tile_size);
                        let y = ty as u32 * u32::from(tile_size);
                        buffer.paste_tile(x, y, tile_w as u32, tile_h as u32, &rgb);
                        changed.push(PixelRect { x, y, w: tile_w as u32, h: tile_h as u32 });
                    }
                    Err(e) => warn!(error = %e, tx, ty, "tile decode failed, skipping tile"),
                }
            }
            if !changed.is_empty() {
                sink.present(buffer, &changed);
            }
        }
    }
}

fn handle_text_message(text: &str, tile_size: &mut u16) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        debug!("ignoring malformed text message");
        return;
    };
    if value.get("type").and_then(|t| t.as_str()) == Some("session_config") {
        if let Some(t) = value.get("tile_size").and_then(|t| t.as_u64()) {
            *tile_size = t as u16;
            debug!(tile_size, "applied negotiated tile size");
        }
    }
}

async fn send_command(write: &mut ClientWriter, command: ViewerCommand) -> anyhow::Result<()> {
    let payload = match command {
        ViewerCommand::MouseMove { x, y } => {
            serde_json::json!({"type": "input", "payload": {"action": "mouse_move", "x": x, "y": y}})
        }
        ViewerCommand::MouseClick { x, y } => {
            serde_json::json!({"type": "input", "payload": {"action": "mouse_click", "x": x, "y": y}})
        }
        ViewerCommand::KeyPress { key } => {
            serde_json::json!({"type": "input", "payload": {"action": "key_press", "key": key}})
        }
        ViewerCommand::RedrawFullFrame => {
            serde_json::json!({"type": "command", "command": "redraw_full_frame"})
        }
    };
    write.send(WsMessage::Text(payload.to_string())).await?;
    Ok(())
}

/// Scale an input coordinate from viewer-surface space to host-screen space
/// using the current buffer dimensions and the surface's own dimensions.
pub fn scale_point(
    surface_x: i32,
    surface_y: i32,
    surface_width: u32,
    surface_height: u32,
    buffer_width: u32,
    buffer_height: u32,
) -> (i32, i32) {
    if surface_width == 0 || surface_height == 0 {
        return (surface_x, surface_y);
    }
    let x = (surface_x as f64 * buffer_width as f64 / surface_width as f64).round() as i32;
    let y = (surface_y as f64 * buffer_height as f64 / surface_height as f64).round() as i32;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_is_zero_on_first_attempt() {
        assert_eq!(reconnect_delay(Duration::from_secs(1), Duration::from_secs(60), 0), Duration::ZERO);
    }

    #[test]
    fn reconnect_delay_grows_and_caps() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        for attempt in 1..10 {
            let delay = reconnect_delay(initial, max, attempt);
            assert!(delay.as_secs_f64() <= max.as_secs_f64() * 1.25 + 0.01);
            assert!(delay.as_secs_f64() >= initial.as_secs_f64() * 0.75);
        }
    }

    #[test]
    fn scale_point_identity_when_surface_matches_buffer() {
        assert_eq!(scale_point(100, 50, 800, 600, 800, 600), (100, 50));
    }

    #[test]
    fn scale_point_scales_proportionally() {
        assert_eq!(scale_point(400, 300, 800, 600, 1600, 1200), (800, 600));
    }

    #[test]
    fn scale_point_handles_zero_surface_dimensions() {
        assert_eq!(scale_point(10, 10, 0, 0, 800, 600), (10, 10));
    }
}
