//! Windows input injection via `SendInput`, driven by virtual-key codes
//! rather than scancodes — simpler to map from the viewer's named key
//! symbols, and `SendInput` accepts `VIRTUAL_KEY` directly without needing
//! a scancode translation table.

use anyhow::{bail, Result};
use mirror_platform::DesktopInput;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT,
    VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

pub struct SendInputDesktop {
    screen_width: i32,
    screen_height: i32,
}

unsafe impl Send for SendInputDesktop {}
unsafe impl Sync for SendInputDesktop {}

impl SendInputDesktop {
    pub fn new() -> Self {
        let (screen_width, screen_height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        Self {
            screen_width: screen_width.max(1),
            screen_height: screen_height.max(1),
        }
    }

    fn send_inputs(&self, inputs: &[INPUT]) -> Result<()> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            bail!("SendInput: sent {} of {} inputs", sent, inputs.len());
        }
        Ok(())
    }

    fn normalize_coords(&self, x: i32, y: i32) -> (i32, i32) {
        let nx = ((x as i64 * 65535) / self.screen_width as i64) as i32;
        let ny = ((y as i64 * 65535) / self.screen_height as i64) as i32;
        (nx, ny)
    }

    fn mouse_input(&self, flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS, dx: i32, dy: i32) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn key_input(&self, vk: u16, press: bool) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: if press {
                        windows::Win32::UI::Input::KeyboardAndMouse::KEYBD_EVENT_FLAGS(0)
                    } else {
                        KEYEVENTF_KEYUP
                    },
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }
}

impl Default for SendInputDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopInput for SendInputDesktop {
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        let (nx, ny) = self.normalize_coords(x, y);
        let input = self.mouse_input(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE, nx, ny);
        self.send_inputs(&[input])
    }

    fn mouse_click(&mut self, x: i32, y: i32) -> Result<()> {
        let (nx, ny) = self.normalize_coords(x, y);
        let move_input = self.mouse_input(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE, nx, ny);
        let down = self.mouse_input(MOUSEEVENTF_LEFTDOWN, 0, 0);
        let up = self.mouse_input(MOUSEEVENTF_LEFTUP, 0, 0);
        self.send_inputs(&[move_input, down, up])
    }

    fn key_press(&mut self, key: &str) -> Result<()> {
        let vk = key_to_virtual_key(key)
            .ok_or_else(|| anyhow::anyhow!("unrecognized key name: {key}"))?;
        self.send_inputs(&[self.key_input(vk, true), self.key_input(vk, false)])
    }
}

/// Maps a viewer key name to a Windows virtual-key code. Single ASCII
/// letters/digits map directly since their VK codes equal the uppercase
/// ASCII value; everything else is looked up by name.
fn key_to_virtual_key(key: &str) -> Option<u16> {
    let mut chars = key.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphanumeric() {
            return Some(ch.to_ascii_uppercase() as u16);
        }
    }

    Some(match key {
        "Enter" | "Return" => 0x0D,
        "Escape" | "Esc" => 0x1B,
        "Backspace" => 0x08,
        "Tab" => 0x09,
        "Space" => 0x20,
        "ArrowUp" | "Up" => 0x26,
        "ArrowDown" | "Down" => 0x28,
        "ArrowLeft" | "Left" => 0x25,
        "ArrowRight" | "Right" => 0x27,
        "Home" => 0x24,
        "End" => 0x23,
        "PageUp" => 0x21,
        "PageDown" => 0x22,
        "Delete" => 0x2E,
        "Insert" => 0x2D,
        "F1" => 0x70,
        "F2" => 0x71,
        "F3" => 0x72,
        "F4" => 0x73,
        "F5" => 0x74,
        "F6" => 0x75,
        "F7" => 0x76,
        "F8" => 0x77,
        "F9" => 0x78,
        "F10" => 0x79,
        "F11" => 0x7A,
        "F12" => 0x7B,
        "Shift" => 0x10,
        "Control" | "Ctrl" => 0x11,
        "Alt" => 0x12,
        "Meta" | "Super" => 0x5B,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_maps_to_its_ascii_value() {
        assert_eq!(key_to_virtual_key("a"), Some(b'A' as u16));
    }

    #[test]
    fn named_key_enter_maps() {
        assert_eq!(key_to_virtual_key("Enter"), Some(0x0D));
    }

    #[test]
    fn unrecognized_key_name_returns_none() {
        assert_eq!(key_to_virtual_key("NotAKey"), None);
    }
}
