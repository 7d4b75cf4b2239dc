//! Input Translator. Dispatches inbound `input` JSON payloads to the
//! desktop-I/O collaborator. Unknown actions and malformed payloads are
//! logged and ignored; nothing here ever propagates an error back up to the
//! transport.

use std::sync::Arc;

use mirror_platform::DesktopInput;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct InputTranslator {
    desktop: Arc<Mutex<Box<dyn DesktopInput>>>,
}

impl InputTranslator {
    pub fn new(desktop: Box<dyn DesktopInput>) -> Self {
        Self {
            desktop: Arc::new(Mutex::new(desktop)),
        }
    }

    pub async fn handle(&self, payload: &Value) {
        let Some(action) = payload.get("action").and_then(Value::as_str) else {
            debug!("input payload missing action field, ignoring");
            return;
        };

        let result = match action {
            "mouse_move" => match (field_i32(payload, "x"), field_i32(payload, "y")) {
                (Some(x), Some(y)) => self.desktop.lock().await.mouse_move(x, y),
                _ => {
                    debug!("mouse_move missing x/y, ignoring");
                    return;
                }
            },
            "mouse_click" => match (field_i32(payload, "x"), field_i32(payload, "y")) {
                (Some(x), Some(y)) => self.desktop.lock().await.mouse_click(x, y),
                _ => {
                    debug!("mouse_click missing x/y, ignoring");
                    return;
                }
            },
            "key_press" => match payload.get("key").and_then(Value::as_str) {
                Some(key) => self.desktop.lock().await.key_press(key),
                None => {
                    debug!("key_press missing key, ignoring");
                    return;
                }
            },
            other => {
                debug!(action = other, "unknown input action, ignoring");
                return;
            }
        };

        if let Err(e) = result {
            warn!(action, error = %e, "desktop input failed, ignoring");
        }
    }
}

fn field_i32(payload: &Value, key: &str) -> Option<i32> {
    payload.get(key).and_then(Value::as_i64).map(|v| v as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingDesktop {
        calls: Arc<AtomicUsize>,
    }

    impl DesktopInput for RecordingDesktop {
        fn mouse_move(&mut self, _x: i32, _y: i32) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn mouse_click(&mut self, _x: i32, _y: i32) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn key_press(&mut self, _key: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn unknown_action_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let translator = InputTranslator::new(Box::new(RecordingDesktop { calls: calls.clone() }));
        translator.handle(&serde_json::json!({"action": "teleport"})).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mouse_move_dispatches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let translator = InputTranslator::new(Box::new(RecordingDesktop { calls: calls.clone() }));
        translator
            .handle(&serde_json::json!({"action": "mouse_move", "x": 10, "y": 20}))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let translator = InputTranslator::new(Box::new(RecordingDesktop { calls: calls.clone() }));
        translator
            .handle(&serde_json::json!({"action": "mouse_move", "x": "not a number"}))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
