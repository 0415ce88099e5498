//! Windows injection with `SendInput`.

use anyhow::{bail, Result};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
    KEYEVENTF_UNICODE, VIRTUAL_KEY, VK_LEFT,
};

use q9_core::TextInjector;

/// Sends every UTF-16 unit as a unicode key press and release.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendInputInjector;

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        bail!("SendInput accepted {sent} of {} events", inputs.len());
    }
    Ok(())
}

impl TextInjector for SendInputInjector {
    fn type_text(&mut self, text: &str) -> Result<()> {
        let inputs: Vec<INPUT> = text
            .encode_utf16()
            .flat_map(|unit| {
                [
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP),
                ]
            })
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }
        send(&inputs)
    }

    fn cursor_left(&mut self) -> Result<()> {
        send(&[
            key_input(VK_LEFT, 0, KEYBD_EVENT_FLAGS(0)),
            key_input(VK_LEFT, 0, KEYEVENTF_KEYUP),
        ])
    }

    fn name(&self) -> &'static str {
        "send-input"
    }
}
