//! X11 input injection using the XTest extension.

use anyhow::{bail, Context, Result};
use mirror_platform::DesktopInput;

pub struct X11DesktopInput {
    conn: xcb::Connection,
    root: u32,
    initialized: bool,
}

// SAFETY: xcb::Connection is only touched from this struct's own methods,
// called serially by the input translator's mutex.
unsafe impl Send for X11DesktopInput {}
unsafe impl Sync for X11DesktopInput {}

const MOTION_NOTIFY: u8 = 6;
const BUTTON_PRESS: u8 = 4;
const BUTTON_RELEASE: u8 = 5;
const KEY_PRESS: u8 = 2;
const KEY_RELEASE: u8 = 3;
const X11_BUTTON_LEFT: u8 = 1;

impl X11DesktopInput {
    pub fn new() -> Self {
        Self {
            conn: unsafe { std::mem::zeroed() },
            root: 0,
            initialized: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        let (conn, screen_num) =
            xcb::Connection::connect(None).context("failed to connect to X11 display")?;

        let setup = conn.get_setup();
        let screen = setup
            .roots()
            .nth(screen_num as usize)
            .context("no X11 screen found")?;

        self.root = screen.root();
        self.conn = conn;

        let query = xcb::test::get_version(&self.conn, 2, 1);
        query.get_reply().context("XTest extension not available")?;

        self.initialized = true;
        tracing::info!("X11 input injector initialized (XTest)");
        Ok(())
    }

    fn fake_input(&self, event_type: u8, detail: u8, x: i16, y: i16) -> Result<()> {
        if !self.initialized {
            bail!("input injector not initialized");
        }
        let cookie = xcb::test::fake_input_checked(
            &self.conn, event_type, detail, 0, self.root, x, y, 0,
        );
        cookie.request_check().context("XTest fake_input failed")?;
        self.conn.flush();
        Ok(())
    }
}

impl Default for X11DesktopInput {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopInput for X11DesktopInput {
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        self.fake_input(MOTION_NOTIFY, 0, x as i16, y as i16)
    }

    fn mouse_click(&mut self, x: i32, y: i32) -> Result<()> {
        self.fake_input(MOTION_NOTIFY, 0, x as i16, y as i16)?;
        self.fake_input(BUTTON_PRESS, X11_BUTTON_LEFT, 0, 0)?;
        self.fake_input(BUTTON_RELEASE, X11_BUTTON_LEFT, 0, 0)
    }

    fn key_press(&mut self, key: &str) -> Result<()> {
        let (keycode, shift) = key_to_keycode(key)
            .ok_or_else(|| anyhow::anyhow!("unrecognized key name: {key}"))?;
        if shift {
            self.fake_input(KEY_PRESS, XK_SHIFT_L, 0, 0)?;
        }
        self.fake_input(KEY_PRESS, keycode, 0, 0)?;
        self.fake_input(KEY_RELEASE, keycode, 0, 0)?;
        if shift {
            self.fake_input(KEY_RELEASE, XK_SHIFT_L, 0, 0)?;
        }
        Ok(())
    }
}

const XK_SHIFT_L: u8 = 50;

/// Maps a viewer key name to an X11 keycode + shift flag. Single characters
/// go through the ASCII table; everything else is looked up by name.
/// Keycodes assume a standard US QWERTY layout (evdev + 8).
fn key_to_keycode(key: &str) -> Option<(u8, bool)> {
    let mut chars = key.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if let Some(mapped) = char_to_keycode(ch) {
            return Some(mapped);
        }
    }

    let named = match key {
        "Enter" | "Return" => 36,
        "Escape" | "Esc" => 9,
        "Backspace" => 22,
        "Tab" => 23,
        "Space" => 65,
        "ArrowUp" | "Up" => 111,
        "ArrowDown" | "Down" => 116,
        "ArrowLeft" | "Left" => 113,
        "ArrowRight" | "Right" => 114,
        "Home" => 110,
        "End" => 115,
        "PageUp" => 112,
        "PageDown" => 117,
        "Delete" => 119,
        "Insert" => 118,
        "F1" => 67,
        "F2" => 68,
        "F3" => 69,
        "F4" => 70,
        "F5" => 71,
        "F6" => 72,
        "F7" => 73,
        "F8" => 74,
        "F9" => 75,
        "F10" => 76,
        "F11" => 95,
        "F12" => 96,
        "Shift" => 50,
        "Control" | "Ctrl" => 37,
        "Alt" => 64,
        "Meta" | "Super" => 133,
        _ => return None,
    };
    Some((named, false))
}

/// Map ASCII character to X11 keycode + shift flag.
fn char_to_keycode(ch: char) -> Option<(u8, bool)> {
    match ch {
        'a'..='z' => Some((ch as u8 - b'a' + 38, false)),
        'A'..='Z' => Some((ch as u8 - b'A' + 38, true)),
        '0' => Some((19, false)),
        '1'..='9' => Some((ch as u8 - b'1' + 10, false)),
        ' ' => Some((65, false)),
        '\n' | '\r' => Some((36, false)),
        '\t' => Some((23, false)),
        '-' => Some((20, false)),
        '=' => Some((21, false)),
        '[' => Some((34, false)),
        ']' => Some((35, false)),
        '\\' => Some((51, false)),
        ';' => Some((47, false)),
        '\'' => Some((48, false)),
        ',' => Some((59, false)),
        '.' => Some((60, false)),
        '/' => Some((61, false)),
        '`' => Some((49, false)),
        '!' => Some((10, true)),
        '@' => Some((11, true)),
        '#' => Some((12, true)),
        '$' => Some((13, true)),
        '%' => Some((14, true)),
        '^' => Some((15, true)),
        '&' => Some((16, true)),
        '*' => Some((17, true)),
        '(' => Some((18, true)),
        ')' => Some((19, true)),
        '_' => Some((20, true)),
        '+' => Some((21, true)),
        '{' => Some((34, true)),
        '}' => Some((35, true)),
        '|' => Some((51, true)),
        ':' => Some((47, true)),
        '"' => Some((48, true)),
        '<' => Some((59, true)),
        '>' => Some((60, true)),
        '?' => Some((61, true)),
        '~' => Some((49, true)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_letter_maps_without_shift() {
        assert_eq!(key_to_keycode("a"), Some((38, false)));
    }

    #[test]
    fn uppercase_letter_maps_with_shift() {
        assert_eq!(key_to_keycode("A"), Some((38, true)));
    }

    #[test]
    fn named_key_enter_maps() {
        assert_eq!(key_to_keycode("Enter"), Some((36, false)));
    }

    #[test]
    fn unrecognized_key_name_returns_none() {
        assert_eq!(key_to_keycode("NotAKey"), None);
    }
}
