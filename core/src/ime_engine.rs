//! IME engine: session ownership and effect execution.
//!
//! The `ImeEngine` keeps the current `Session`, feeds it commands, performs
//! the returned `Effect` (text injection, status messages, visibility) and
//! refreshes the `ImeContext` read model afterwards. It is owned by exactly one
//! dispatch thread; capture threads only see the shared `InterceptGate`.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::context::ImeContext;
use crate::inject::TextInjector;
use crate::keymap::{Command, InputScheme, InterceptGate, KeyMap};
use crate::lookup::Lookup;
use crate::session::{Effect, Session};
use crate::Config;

/// Result of processing a raw key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResult {
    /// Key was handled by the IME
    Handled,
    /// Key was not handled (pass through to application)
    NotHandled,
}

/// IME engine with session management.
pub struct ImeEngine {
    session: Session,
    lookup: Arc<dyn Lookup>,
    injector: Box<dyn TextInjector>,
    gate: Arc<InterceptGate>,
    context: ImeContext,
}

impl ImeEngine {
    /// Create an engine. Global input starts disabled; the front-end enables
    /// it once a capture backend is installed.
    pub fn new(
        lookup: Arc<dyn Lookup>,
        injector: Box<dyn TextInjector>,
        keymap: KeyMap,
        config: &Config,
    ) -> Self {
        let gate = Arc::new(InterceptGate::new(keymap, config.input_scheme, false));
        let mut engine = Self {
            session: Session::new(config.input_scheme, config.simplified_output),
            lookup,
            injector,
            gate,
            context: ImeContext::new(),
        };
        engine.refresh_mode_status();
        engine
    }

    /// Get a reference to the context for reading IME state.
    pub fn context(&self) -> &ImeContext {
        &self.context
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Gate shared with capture backends.
    pub fn gate(&self) -> Arc<InterceptGate> {
        Arc::clone(&self.gate)
    }

    pub fn injector_name(&self) -> &'static str {
        self.injector.name()
    }

    /// Process a raw captured key code.
    ///
    /// Returns `KeyResult::NotHandled` for codes outside the active scheme
    /// and, while global input is off, for everything but the visibility key.
    pub fn process_key(&mut self, code: u32) -> KeyResult {
        let Some(command) = self.gate.translate(code) else {
            return KeyResult::NotHandled;
        };
        if command != Command::ToggleVisibility && !self.gate.global_enabled() {
            debug!(code, "global input off, passing key through");
            return KeyResult::NotHandled;
        }
        self.issue_command(command);
        KeyResult::Handled
    }

    /// Equivalent of pressing digit key `digit`.
    pub fn press_digit(&mut self, digit: u8) {
        self.issue_command(Command::Digit(digit));
    }

    /// Feed one command through the state machine and perform its effect.
    pub fn issue_command(&mut self, command: Command) {
        if !self.context.visible && command != Command::ToggleVisibility {
            self.context.visible = true;
        }
        let (next, effect) = self.session.apply(command, self.lookup.as_ref());
        self.session = next;
        self.perform(effect);
        self.context.sync_from(&self.session);
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Status(message) => self.context.status_text = message,
            Effect::ToggleVisibility => {
                self.context.visible = !self.context.visible;
                debug!(visible = self.context.visible, "visibility toggled");
            }
            Effect::Emit { text, cursor_back } => self.emit(text, cursor_back),
        }
    }

    fn emit(&mut self, text: String, cursor_back: bool) {
        let output = if self.session.simplified_output() {
            self.lookup.simplify(&text)
        } else {
            text
        };
        match self.injector.emit(&output, cursor_back) {
            Ok(()) => {
                info!(text = %output, cursor_back, "emitted");
                self.context.status_text = if cursor_back {
                    format!("已輸出配對符號: {output}")
                } else {
                    format!("已輸出: {output}")
                };
            }
            Err(e) => {
                error!(injector = self.injector.name(), "text injection failed: {e:#}");
                self.context.status_text = format!("輸出失敗：{e}");
            }
        }
    }

    // ========== Mode toggles ==========

    pub fn toggle_simplified_output(&mut self) {
        let enabled = !self.session.simplified_output();
        self.session.set_simplified_output(enabled);
        self.refresh_mode_status();
    }

    pub fn toggle_scheme(&mut self) {
        self.set_scheme(self.session.scheme().toggled());
    }

    pub fn set_scheme(&mut self, scheme: InputScheme) {
        self.session.set_scheme(scheme);
        self.gate.set_scheme(scheme);
        self.refresh_mode_status();
    }

    pub fn toggle_global_input(&mut self) {
        self.set_global_input(!self.gate.global_enabled());
    }

    pub fn set_global_input(&mut self, enabled: bool) {
        self.gate.set_global(enabled);
        self.refresh_mode_status();
    }

    pub fn toggle_visibility(&mut self) {
        self.issue_command(Command::ToggleVisibility);
    }

    fn refresh_mode_status(&mut self) {
        self.context.global_input = self.gate.global_enabled();
        self.context.sync_from(&self.session);
        self.context.status_text = self.context.mode_summary();
    }
}
