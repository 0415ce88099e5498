//! Line protocol between the device helper and the main process.
//!
//! Helper stdout carries one line per intercepted key-down: `KEY:<code>`.
//! The code is the evdev key code; the helper only prints codes it
//! intercepts.
//!
//! Helper stdin carries the intercept state so the helper swallows the same
//! keys the engine handles: `SCHEME:numpad|letters` and `GLOBAL:0|1`. End of
//! stdin tells the helper to release the device and exit.

use q9_core::{InputScheme, InterceptGate};

/// Line prefix written by the helper.
pub const KEY_PREFIX: &str = "KEY";

pub fn format_key_line(code: u32) -> String {
    format!("{KEY_PREFIX}:{code}")
}

/// Parse a helper line. The suffix after the last `:` must be an integer;
/// anything else is a diagnostic line and yields `None`.
pub fn parse_key_line(line: &str) -> Option<u32> {
    let (_, suffix) = line.trim().rsplit_once(':')?;
    suffix.trim().parse().ok()
}

/// Control lines describing the current intercept state.
pub fn control_lines(scheme: InputScheme, global: bool) -> [String; 2] {
    let scheme = match scheme {
        InputScheme::Numpad => "numpad",
        InputScheme::Letters => "letters",
    };
    [
        format!("SCHEME:{scheme}"),
        format!("GLOBAL:{}", u8::from(global)),
    ]
}

/// Apply one control line to the helper's gate. Returns false for lines
/// that are not understood.
pub fn apply_control_line(gate: &InterceptGate, line: &str) -> bool {
    let Some((key, value)) = line.trim().split_once(':') else {
        return false;
    };
    match (key, value.trim()) {
        ("SCHEME", "numpad") => gate.set_scheme(InputScheme::Numpad),
        ("SCHEME", "letters") => gate.set_scheme(InputScheme::Letters),
        ("GLOBAL", "0") => gate.set_global(false),
        ("GLOBAL", "1") => gate.set_global(true),
        _ => return false,
    }
    true
}
