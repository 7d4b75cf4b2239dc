#[cfg(target_os = "linux")]
pub mod input_x11;
#[cfg(target_os = "linux")]
pub mod monitor_wayland;
#[cfg(target_os = "linux")]
pub mod monitor_x11;

#[cfg(target_os = "linux")]
pub use input_x11::X11DesktopInput;
#[cfg(target_os = "linux")]
pub use monitor_wayland::WaylandMonitorCapture;
#[cfg(target_os = "linux")]
pub use monitor_x11::X11MonitorCapture;
