#[cfg(target_os = "windows")]
pub mod input_sendinput;
#[cfg(target_os = "windows")]
pub mod monitor_gdi;

#[cfg(target_os = "windows")]
pub use input_sendinput::SendInputDesktop;
#[cfg(target_os = "windows")]
pub use monitor_gdi::GdiMonitorCapture;
