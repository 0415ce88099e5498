//! q9-core
//!
//! Stroke-code ("九万") input engine shared by the q9 front-ends: the lookup
//! service over the character dataset, the 9-per-page candidate list, the
//! platform key-code translator, the input state machine and the engine that
//! ties them to a text injector.
//!
//! Public API:
//! - `Lookup` - Read-only dataset queries (codes, related, homophones, simplify)
//! - `TableLookup` / `RedbLookup` - In-memory and persistent lookup backends
//! - `CandidateList` - Wrapping 9-slot pagination over a candidate set
//! - `KeyMap` - Raw platform key codes → `Command`
//! - `Session` - Pure input state machine (`apply` returns the next state and an `Effect`)
//! - `ImeEngine` - Owns the session and performs effects through a `TextInjector`
//! - `ImeContext` - Read model for renderers
//! - `Config` - Configuration loaded from TOML
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod lookup;
pub use lookup::{LruLookup, Lookup, TableLookup, PUNCTUATION_PAIR_CODE, QUICK_PICK_BASE};

pub mod dataset;
pub use dataset::{DatasetWriter, RedbLookup, SourceTables};

pub mod candidate;
pub use candidate::{CandidateList, PAGE_SIZE};

pub mod keymap;
pub use keymap::{translate_char, Command, InputScheme, InterceptGate, KeyMap, Platform};

pub mod session;
pub use session::{Effect, Phase, Session};

pub mod context;
pub use context::{GridHint, ImeContext};

pub mod inject;
pub use inject::{Injected, NullInjector, RecordingInjector, TextInjector};

pub mod ime_engine;
pub use ime_engine::{ImeEngine, KeyResult};

/// Engine configuration shared by every front-end.
///
/// Front-ends extend it by flattening it into their own config struct.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Path of the redb dataset built by `q9-tools`
    pub dataset_path: PathBuf,

    /// Key scheme used at startup (`numpad` or `letters`)
    pub input_scheme: InputScheme,

    /// Convert emitted text to simplified characters
    pub simplified_output: bool,

    /// Number of code lookups kept in the LRU cache (0 disables the cache)
    pub lookup_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/q9.redb"),
            input_scheme: InputScheme::Numpad,
            simplified_output: false,
            lookup_cache_size: 256,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Text helpers used by the lookup backends.
pub mod utils {
    use unicode_normalization::UnicodeNormalization;

    /// Split stored text into single-character strings.
    ///
    /// The text is NFC-normalized first so a base character and its combining
    /// mark never end up in different slots.
    pub fn split_chars(text: &str) -> Vec<String> {
        text.nfc().map(|c| c.to_string()).collect()
    }

    /// Number of characters after NFC normalization.
    pub fn char_len(text: &str) -> usize {
        text.nfc().count()
    }

    /// Split a space-delimited list, dropping empty entries.
    pub fn split_list(text: &str) -> Vec<String> {
        text.split(' ')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}
