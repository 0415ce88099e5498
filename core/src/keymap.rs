//! Translation of raw platform key codes into logical commands.
//!
//! Two code sets ship: Windows virtual-key codes (low-level hook) and Linux
//! evdev codes (device helper). Each has a numeric-keypad table and a
//! letter table for keyboards without a keypad. Top-row digits are never
//! mapped so normal typing is left alone.
//!
//! The visibility key (F10) maps to `ToggleVisibility` under every scheme and
//! is checked before the tables.

use ahash::AHashMap;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Logical input accepted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Digit(u8),
    Cancel,
    Relate,
    Homophone,
    OpenClose,
    /// Previous page while selecting, quick pick otherwise
    PrevOrShortcut,
    Next,
    ToggleVisibility,
}

/// Which physical keys feed the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputScheme {
    /// Numeric keypad digits and operators
    #[default]
    Numpad,
    /// X C V / S D F / W E R / Z plus B G A T Q
    Letters,
}

impl InputScheme {
    pub fn toggled(self) -> Self {
        match self {
            InputScheme::Numpad => InputScheme::Letters,
            InputScheme::Letters => InputScheme::Numpad,
        }
    }
}

/// Key code namespace of the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Windows virtual-key codes
    Windows,
    /// Linux input-event codes
    Linux,
}

impl Platform {
    /// Code set used by the capture backend of the running OS.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}

use Command::*;

const WINDOWS_TOGGLE: u32 = 0x79;

const WINDOWS_NUMPAD: &[(u32, Command)] = &[
    (0x60, Digit(0)),
    (0x61, Digit(1)),
    (0x62, Digit(2)),
    (0x63, Digit(3)),
    (0x64, Digit(4)),
    (0x65, Digit(5)),
    (0x66, Digit(6)),
    (0x67, Digit(7)),
    (0x68, Digit(8)),
    (0x69, Digit(9)),
    (0x6E, Cancel),
    (0x6B, Relate),
    (0x6A, Homophone),
    (0x6F, OpenClose),
    (0x6D, PrevOrShortcut),
];

// Virtual-key codes of letters are their ASCII uppercase values.
const WINDOWS_LETTERS: &[(u32, Command)] = &[
    (b'X' as u32, Digit(1)),
    (b'C' as u32, Digit(2)),
    (b'V' as u32, Digit(3)),
    (b'S' as u32, Digit(4)),
    (b'D' as u32, Digit(5)),
    (b'F' as u32, Digit(6)),
    (b'W' as u32, Digit(7)),
    (b'E' as u32, Digit(8)),
    (b'R' as u32, Digit(9)),
    (b'Z' as u32, Digit(0)),
    (b'B' as u32, Cancel),
    (b'G' as u32, Relate),
    (b'A' as u32, PrevOrShortcut),
    (b'T' as u32, Homophone),
    (b'Q' as u32, OpenClose),
];

const EVDEV_TOGGLE: u32 = 68;

const EVDEV_NUMPAD: &[(u32, Command)] = &[
    (82, Digit(0)),
    (79, Digit(1)),
    (80, Digit(2)),
    (81, Digit(3)),
    (75, Digit(4)),
    (76, Digit(5)),
    (77, Digit(6)),
    (71, Digit(7)),
    (72, Digit(8)),
    (73, Digit(9)),
    (83, Cancel),
    (78, Relate),
    (55, Homophone),
    (98, OpenClose),
    (74, PrevOrShortcut),
];

const EVDEV_LETTERS: &[(u32, Command)] = &[
    (45, Digit(1)),
    (46, Digit(2)),
    (47, Digit(3)),
    (31, Digit(4)),
    (32, Digit(5)),
    (33, Digit(6)),
    (17, Digit(7)),
    (18, Digit(8)),
    (19, Digit(9)),
    (44, Digit(0)),
    (48, Cancel),
    (34, Relate),
    (30, PrevOrShortcut),
    (20, Homophone),
    (16, OpenClose),
];

/// The full logical alphabet every table must cover exactly once.
fn alphabet() -> impl Iterator<Item = Command> {
    (0..=9)
        .map(Digit)
        .chain([Cancel, Relate, Homophone, OpenClose, PrevOrShortcut])
}

/// Check a table and index it by source code.
pub(crate) fn validate_table(
    name: &str,
    entries: &[(u32, Command)],
    toggle: u32,
) -> Result<AHashMap<u32, Command>> {
    let mut by_code = AHashMap::with_capacity(entries.len());
    for &(code, command) in entries {
        if code == toggle {
            bail!("{name}: code {code:#x} collides with the visibility key");
        }
        if by_code.insert(code, command).is_some() {
            bail!("{name}: code {code:#x} mapped twice");
        }
    }
    for command in alphabet() {
        let count = entries.iter().filter(|(_, c)| *c == command).count();
        if count != 1 {
            bail!("{name}: {command:?} mapped {count} times");
        }
    }
    if entries.len() != alphabet().count() {
        bail!("{name}: unexpected entries beyond the input alphabet");
    }
    Ok(by_code)
}

/// Validated translation tables for one platform.
#[derive(Debug, Clone)]
pub struct KeyMap {
    platform: Platform,
    toggle: u32,
    numpad: AHashMap<u32, Command>,
    letters: AHashMap<u32, Command>,
}

impl KeyMap {
    /// Build and validate the tables for `platform`.
    pub fn new(platform: Platform) -> Result<Self> {
        let (toggle, numpad, letters) = match platform {
            Platform::Windows => (WINDOWS_TOGGLE, WINDOWS_NUMPAD, WINDOWS_LETTERS),
            Platform::Linux => (EVDEV_TOGGLE, EVDEV_NUMPAD, EVDEV_LETTERS),
        };
        Ok(Self {
            platform,
            toggle,
            numpad: validate_table("numpad", numpad, toggle)?,
            letters: validate_table("letters", letters, toggle)?,
        })
    }

    pub fn for_current_platform() -> Result<Self> {
        Self::new(Platform::current())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Code of the visibility key on this platform.
    pub fn toggle_code(&self) -> u32 {
        self.toggle
    }

    /// Translate a raw code under `scheme`.
    pub fn translate(&self, code: u32, scheme: InputScheme) -> Option<Command> {
        if code == self.toggle {
            return Some(ToggleVisibility);
        }
        let table = match scheme {
            InputScheme::Numpad => &self.numpad,
            InputScheme::Letters => &self.letters,
        };
        table.get(&code).copied()
    }

    /// Every code the capture backend should intercept under `scheme`.
    pub fn intercepted_codes(&self, scheme: InputScheme) -> Vec<u32> {
        let table = match scheme {
            InputScheme::Numpad => &self.numpad,
            InputScheme::Letters => &self.letters,
        };
        let mut codes: Vec<u32> = table.keys().copied().collect();
        codes.push(self.toggle);
        codes.sort_unstable();
        codes
    }
}

/// Intercept decision shared with capture threads.
///
/// Hook callbacks must decide synchronously whether a key is swallowed, on a
/// thread that does not own the engine. The engine keeps this gate in sync
/// with its scheme and global-input toggles.
#[derive(Debug)]
pub struct InterceptGate {
    keymap: KeyMap,
    letters: AtomicBool,
    global: AtomicBool,
}

impl InterceptGate {
    pub fn new(keymap: KeyMap, scheme: InputScheme, global: bool) -> Self {
        Self {
            keymap,
            letters: AtomicBool::new(scheme == InputScheme::Letters),
            global: AtomicBool::new(global),
        }
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn scheme(&self) -> InputScheme {
        if self.letters.load(Ordering::Relaxed) {
            InputScheme::Letters
        } else {
            InputScheme::Numpad
        }
    }

    pub fn set_scheme(&self, scheme: InputScheme) {
        self.letters
            .store(scheme == InputScheme::Letters, Ordering::Relaxed);
    }

    pub fn global_enabled(&self) -> bool {
        self.global.load(Ordering::Relaxed)
    }

    pub fn set_global(&self, enabled: bool) {
        self.global.store(enabled, Ordering::Relaxed);
    }

    /// Translate under the current scheme.
    pub fn translate(&self, code: u32) -> Option<Command> {
        self.keymap.translate(code, self.scheme())
    }

    /// Whether a captured key is swallowed. The visibility key always is;
    /// everything else only while global input is enabled.
    pub fn should_intercept(&self, code: u32) -> bool {
        match self.translate(code) {
            Some(ToggleVisibility) => true,
            Some(_) => self.global_enabled(),
            None => false,
        }
    }
}

/// Translate a typed character for the console front-end.
///
/// The numpad scheme reads the characters printed on the keypad; the letter
/// scheme reads the letter table, ignoring case.
pub fn translate_char(ch: char, scheme: InputScheme) -> Option<Command> {
    match scheme {
        InputScheme::Numpad => match ch {
            '0'..='9' => ch.to_digit(10).map(|d| Digit(d as u8)),
            '.' => Some(Cancel),
            '+' => Some(Relate),
            '*' => Some(Homophone),
            '/' => Some(OpenClose),
            '-' => Some(PrevOrShortcut),
            _ => None,
        },
        InputScheme::Letters => {
            let upper = ch.to_ascii_uppercase();
            if !upper.is_ascii_uppercase() {
                return None;
            }
            WINDOWS_LETTERS
                .iter()
                .find(|(code, _)| *code == upper as u32)
                .map(|(_, command)| *command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_tables_validate() {
        assert!(KeyMap::new(Platform::Windows).is_ok());
        assert!(KeyMap::new(Platform::Linux).is_ok());
    }

    #[test]
    fn duplicate_source_code_is_rejected() {
        let mut entries = WINDOWS_NUMPAD.to_vec();
        entries[1].0 = entries[0].0;
        assert!(validate_table("bad", &entries, WINDOWS_TOGGLE).is_err());
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let mut entries = EVDEV_LETTERS.to_vec();
        entries[10].1 = Relate;
        assert!(validate_table("bad", &entries, EVDEV_TOGGLE).is_err());
    }

    #[test]
    fn toggle_inside_a_table_is_rejected() {
        let mut entries = EVDEV_NUMPAD.to_vec();
        entries[0].0 = EVDEV_TOGGLE;
        assert!(validate_table("bad", &entries, EVDEV_TOGGLE).is_err());
    }

    #[test]
    fn toggle_wins_under_every_scheme() {
        for platform in [Platform::Windows, Platform::Linux] {
            let map = KeyMap::new(platform).unwrap();
            for scheme in [InputScheme::Numpad, InputScheme::Letters] {
                assert_eq!(map.translate(map.toggle_code(), scheme), Some(ToggleVisibility));
            }
        }
    }

    #[test]
    fn numpad_scheme_ignores_top_row_digits() {
        let win = KeyMap::new(Platform::Windows).unwrap();
        assert_eq!(win.translate(0x61, InputScheme::Numpad), Some(Digit(1)));
        assert_eq!(win.translate(b'1' as u32, InputScheme::Numpad), None);
        assert_eq!(win.translate(0x6E, InputScheme::Numpad), Some(Cancel));

        let linux = KeyMap::new(Platform::Linux).unwrap();
        assert_eq!(linux.translate(79, InputScheme::Numpad), Some(Digit(1)));
        // KEY_1 on the top row
        assert_eq!(linux.translate(2, InputScheme::Numpad), None);
    }

    #[test]
    fn letter_scheme_only_reads_letters() {
        let win = KeyMap::new(Platform::Windows).unwrap();
        assert_eq!(win.translate(b'Z' as u32, InputScheme::Letters), Some(Digit(0)));
        assert_eq!(win.translate(b'T' as u32, InputScheme::Letters), Some(Homophone));
        assert_eq!(win.translate(0x61, InputScheme::Letters), None);

        let linux = KeyMap::new(Platform::Linux).unwrap();
        assert_eq!(linux.translate(45, InputScheme::Letters), Some(Digit(1)));
        assert_eq!(linux.translate(16, InputScheme::Letters), Some(OpenClose));
    }

    #[test]
    fn evdev_and_windows_letter_tables_agree() {
        let letters = "XCVSDFWERZBGATQ";
        let linux_codes = [45, 46, 47, 31, 32, 33, 17, 18, 19, 44, 48, 34, 30, 20, 16];
        let win = KeyMap::new(Platform::Windows).unwrap();
        let linux = KeyMap::new(Platform::Linux).unwrap();
        for (ch, code) in letters.chars().zip(linux_codes) {
            assert_eq!(
                win.translate(ch as u32, InputScheme::Letters),
                linux.translate(code, InputScheme::Letters),
                "letter {ch}"
            );
        }
    }

    #[test]
    fn console_characters() {
        assert_eq!(translate_char('7', InputScheme::Numpad), Some(Digit(7)));
        assert_eq!(translate_char('*', InputScheme::Numpad), Some(Homophone));
        assert_eq!(translate_char('x', InputScheme::Numpad), None);
        assert_eq!(translate_char('x', InputScheme::Letters), Some(Digit(1)));
        assert_eq!(translate_char('Q', InputScheme::Letters), Some(OpenClose));
        assert_eq!(translate_char('7', InputScheme::Letters), None);
        assert_eq!(translate_char('中', InputScheme::Letters), None);
    }

    #[test]
    fn gate_follows_scheme_and_global_flag() {
        let gate = InterceptGate::new(KeyMap::new(Platform::Linux).unwrap(), InputScheme::Numpad, false);
        assert!(gate.should_intercept(EVDEV_TOGGLE));
        assert!(!gate.should_intercept(79));
        gate.set_global(true);
        assert!(gate.should_intercept(79));
        assert!(!gate.should_intercept(45));
        gate.set_scheme(InputScheme::Letters);
        assert!(gate.should_intercept(45));
        assert!(!gate.should_intercept(79));
        assert_eq!(gate.translate(45), Some(Digit(1)));
    }

    #[test]
    fn intercepted_codes_include_toggle() {
        let linux = KeyMap::new(Platform::Linux).unwrap();
        let codes = linux.intercepted_codes(InputScheme::Numpad);
        assert_eq!(codes.len(), 16);
        assert!(codes.contains(&EVDEV_TOGGLE));
    }
}
