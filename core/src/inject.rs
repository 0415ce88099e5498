//! Text injection seam.
//!
//! Platform backends live in the `q9` crate; this module only holds the trait
//! and the in-process implementations used by tests and `--dry-run`.

use std::sync::{Arc, Mutex};

/// Sends resolved text into whatever application has focus.
pub trait TextInjector: Send {
    /// Type `text` as if entered on the keyboard.
    fn type_text(&mut self, text: &str) -> anyhow::Result<()>;

    /// Move the caret one position to the left.
    fn cursor_left(&mut self) -> anyhow::Result<()>;

    /// Type `text`, then step back into the middle of a pair when
    /// `cursor_back` is set.
    fn emit(&mut self, text: &str, cursor_back: bool) -> anyhow::Result<()> {
        self.type_text(text)?;
        if cursor_back {
            self.cursor_left()?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// One call observed by `RecordingInjector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injected {
    Text(String),
    CursorLeft,
}

/// Records every call; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingInjector {
    log: Arc<Mutex<Vec<Injected>>>,
    fail_with: Option<String>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// An injector whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            log: Arc::default(),
            fail_with: Some(message.to_string()),
        }
    }

    /// Snapshot of the calls made so far.
    pub fn calls(&self) -> Vec<Injected> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// All typed text concatenated.
    pub fn typed(&self) -> String {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Injected::Text(t) => Some(t),
                Injected::CursorLeft => None,
            })
            .collect()
    }

    fn record(&self, call: Injected) -> anyhow::Result<()> {
        if let Some(message) = &self.fail_with {
            anyhow::bail!("{message}");
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(call);
        }
        Ok(())
    }
}

impl TextInjector for RecordingInjector {
    fn type_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.record(Injected::Text(text.to_string()))
    }

    fn cursor_left(&mut self) -> anyhow::Result<()> {
        self.record(Injected::CursorLeft)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInjector;

impl TextInjector for NullInjector {
    fn type_text(&mut self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn cursor_left(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
