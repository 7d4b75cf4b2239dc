pub mod input;
pub mod monitor;

pub use input::DesktopInput;
pub use monitor::{MonitorCapture, MonitorFrame};
