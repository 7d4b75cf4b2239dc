pub mod client;
pub mod codec_image;
pub mod config;
pub mod engine;
pub mod error;
pub mod input_translator;
pub mod screen_buffer;
pub mod session;

pub use client::{run_viewer_client, scale_point, ClientState, PixelRect, PresentationSink, ViewerCommand, ViewerHandle};
pub use config::{HostConfig, Settings, ViewerConfig};
pub use engine::{run_capture_engine, BroadcastItem, CaptureEngine, EngineCommand, EngineConfig, OutboundFrame};
pub use error::{CaptureError, CodecError};
pub use input_translator::InputTranslator;
pub use screen_buffer::ScreenBuffer;
pub use session::{run_session_manager, OutboundQueue, SessionId, SessionManagerConfig};
