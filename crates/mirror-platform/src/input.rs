use anyhow::Result;

/// The on-host desktop I/O synthesizer's input half — out of scope per the
/// core's purpose statement. The Input Translator drives this trait; it
/// never touches a concrete platform backend directly.
pub trait DesktopInput: Send + Sync {
    /// Move the pointer to an absolute pixel position on the captured monitor.
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()>;

    /// Move the pointer to `(x, y)` then synthesize a primary-button click.
    fn mouse_click(&mut self, x: i32, y: i32) -> Result<()>;

    /// Synthesize a press+release of the named key. Names follow the
    /// viewer's key symbol set; exact mapping is the backend's concern.
    fn key_press(&mut self, key: &str) -> Result<()>;
}
