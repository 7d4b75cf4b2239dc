//! Session Manager. Accepts WebSocket connections, fans captured frames out
//! to each connected viewer, and routes inbound JSON messages to the input
//! translator or back to the engine as redraw requests.
//!
//! Per-viewer outbound traffic goes through [`OutboundQueue`] rather than a
//! plain bounded `mpsc` channel. A standard mpsc can only reject a send once
//! the channel is full; it can't reach in and evict an already-queued item.
//! The overflow policy here needs exactly that: drop the oldest queued delta
//! to make room, and never drop a queued keyframe. That's a priority-aware
//! bounded queue, not a channel, so it's built directly on a mutex-guarded
//! deque with a notify for the waiting receiver.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::engine::{BroadcastItem, EngineCommand, OutboundFrame};
use crate::input_translator::InputTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Input { payload: serde_json::Value },
    Command { command: String },
}

struct OutboundQueueInner {
    items: VecDeque<OutboundFrame>,
    closed: bool,
}

/// Bounded per-viewer queue with a priority eviction policy: on overflow,
/// drop the oldest queued delta; if the queue holds only keyframes, drop the
/// incoming delta instead. Keyframes are never evicted.
pub struct OutboundQueue {
    capacity: usize,
    inner: std::sync::Mutex<OutboundQueueInner>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            inner: std::sync::Mutex::new(OutboundQueueInner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
        })
    }

    pub fn push(&self, frame: OutboundFrame) {
        let mut inner = self.inner.lock().expect("outbound queue poisoned");
        if inner.closed {
            return;
        }
        if inner.items.len() >= self.capacity {
            let oldest_delta_index = inner
                .items
                .iter()
                .position(|f| matches!(f, OutboundFrame::Delta(_)));
            match oldest_delta_index {
                Some(idx) => {
                    inner.items.remove(idx);
                }
                None => {
                    if matches!(frame, OutboundFrame::Delta(_)) {
                        debug!("outbound queue full of keyframes, dropping incoming delta");
                        return;
                    }
                    inner.items.pop_front();
                }
            }
        }
        inner.items.push_back(frame);
        drop(inner);
        self.notify.notify_one();
    }

    pub fn close(&self) {
        self.inner.lock().expect("outbound queue poisoned").closed = true;
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> Option<OutboundFrame> {
        loop {
            {
                let mut inner = self.inner.lock().expect("outbound queue poisoned");
                if let Some(frame) = inner.items.pop_front() {
                    return Some(frame);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }
}

pub struct SessionManagerConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub tile_size: u16,
    pub outbound_queue_capacity: usize,
}

/// Runs the accept loop, spawning one task per connection. `engine_cmd_tx`
/// lets a session ask the engine for an out-of-band redraw; `broadcast_rx`
/// is where the engine's packed frames arrive for fan-out.
pub async fn run_session_manager(
    config: SessionManagerConfig,
    input_translator: Arc<InputTranslator>,
    engine_cmd_tx: mpsc::Sender<EngineCommand>,
    mut broadcast_rx: mpsc::Receiver<BroadcastItem>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind_host, config.bind_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "session manager listening");

    let sessions: Arc<std::sync::Mutex<std::collections::HashMap<SessionId, Arc<OutboundQueue>>>> =
        Arc::new(std::sync::Mutex::new(std::collections::HashMap::new()));

    let fanout_sessions = sessions.clone();
    let _fanout = tokio::spawn(async move {
        while let Some(item) = broadcast_rx.recv().await {
            let sessions = fanout_sessions.lock().expect("sessions poisoned");
            match item {
                BroadcastItem::Broadcast(frame) => {
                    for queue in sessions.values() {
                        queue.push(frame.clone());
                    }
                }
                BroadcastItem::SendTo(id, frame) => {
                    if let Some(queue) = sessions.get(&id) {
                        queue.push(frame);
                    }
                }
            }
        }
    });

    let tile_size = config.tile_size;
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let session_id = SessionId::next();
        let queue = OutboundQueue::new(config.outbound_queue_capacity);
        sessions
            .lock()
            .expect("sessions poisoned")
            .insert(session_id, queue.clone());

        let sessions = sessions.clone();
        let input_translator = input_translator.clone();
        let engine_cmd_tx = engine_cmd_tx.clone();

        tokio::spawn(async move {
            debug!(?session_id, %peer_addr, "accepted connection");
            if let Err(e) = handle_session(
                session_id,
                stream,
                queue.clone(),
                tile_size,
                input_translator,
                engine_cmd_tx,
            )
            .await
            {
                warn!(?session_id, error = %e, "session ended with error");
            }
            queue.close();
            sessions.lock().expect("sessions poisoned").remove(&session_id);
        });
    }
}

async fn handle_session(
    session_id: SessionId,
    stream: TcpStream,
    queue: Arc<OutboundQueue>,
    tile_size: u16,
    input_translator: Arc<InputTranslator>,
    engine_cmd_tx: mpsc::Sender<EngineCommand>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    // Handshake: resolve the tile-size-sync open question by telling the
    // viewer the host's tile size immediately, before any frame traffic.
    let handshake = serde_json::json!({
        "type": "session_config",
        "tile_size": tile_size,
    });
    write.send(Message::Text(handshake.to_string())).await?;

    let mut outbound_done = false;
    loop {
        tokio::select! {
            frame = queue.pop(), if !outbound_done => {
                match frame {
                    Some(OutboundFrame::Keyframe(bytes)) | Some(OutboundFrame::Delta(bytes)) => {
                        if write.send(Message::Binary((*bytes).clone().into())).await.is_err() {
                            break;
                        }
                    }
                    None => outbound_done = true,
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, session_id, &input_translator, &engine_cmd_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(?session_id, error = %e, "transport closed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn handle_client_message(
    text: &str,
    session_id: SessionId,
    input_translator: &InputTranslator,
    engine_cmd_tx: &mpsc::Sender<EngineCommand>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(?session_id, error = %e, "ignoring malformed client message");
            return;
        }
    };

    match message {
        ClientMessage::Input { payload } => {
            input_translator.handle(&payload).await;
        }
        ClientMessage::Command { command } => {
            if command == "redraw_full_frame" {
                let _ = engine_cmd_tx.send(EngineCommand::RedrawFor(session_id)).await;
            } else {
                debug!(?session_id, %command, "ignoring unknown command");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_evicts_oldest_delta_before_dropping_new_one() {
        let queue = OutboundQueue::new(2);
        let d1 = OutboundFrame::Delta(Arc::new(vec![1]));
        let d2 = OutboundFrame::Delta(Arc::new(vec![2]));
        let d3 = OutboundFrame::Delta(Arc::new(vec![3]));
        queue.push(d1);
        queue.push(d2);
        queue.push(d3);

        let inner = queue.inner.lock().unwrap();
        assert_eq!(inner.items.len(), 2);
        match &inner.items[0] {
            OutboundFrame::Delta(bytes) => assert_eq!(**bytes, vec![2]),
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn queue_never_evicts_keyframe() {
        let queue = OutboundQueue::new(1);
        queue.push(OutboundFrame::Keyframe(Arc::new(vec![0x01])));
        queue.push(OutboundFrame::Delta(Arc::new(vec![0x00])));

        let inner = queue.inner.lock().unwrap();
        assert_eq!(inner.items.len(), 1);
        assert!(matches!(inner.items[0], OutboundFrame::Keyframe(_)));
    }

    #[test]
    fn queue_evicts_keyframe_room_only_via_delta_eviction_path() {
        let queue = OutboundQueue::new(2);
        queue.push(OutboundFrame::Keyframe(Arc::new(vec![1])));
        queue.push(OutboundFrame::Delta(Arc::new(vec![2])));
        queue.push(OutboundFrame::Keyframe(Arc::new(vec![3])));

        let inner = queue.inner.lock().unwrap();
        assert_eq!(inner.items.len(), 2);
        assert!(inner.items.iter().all(|f| matches!(f, OutboundFrame::Keyframe(_))));
    }
}
