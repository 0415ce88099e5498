//! X11 injection through the `xdotool` command.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

use q9_core::TextInjector;

use crate::config::InjectStrategy;

/// Injects text by running `xdotool` (and `xclip` for the paste strategy).
#[derive(Debug, Clone)]
pub struct XdotoolInjector {
    strategy: InjectStrategy,
    program: String,
}

impl XdotoolInjector {
    pub fn new(strategy: InjectStrategy) -> Self {
        Self {
            strategy,
            program: "xdotool".to_string(),
        }
    }

    /// Use another executable in place of `xdotool`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Argument lists passed to `xdotool` for one piece of text.
    pub fn type_args(&self, text: &str) -> Vec<Vec<String>> {
        match self.strategy {
            InjectStrategy::Type => vec![vec![
                "type".into(),
                "--clearmodifiers".into(),
                "--".into(),
                text.into(),
            ]],
            InjectStrategy::Paste => vec![vec![
                "key".into(),
                "--clearmodifiers".into(),
                "ctrl+v".into(),
            ]],
        }
    }

    fn run(&self, args: &[String]) -> Result<()> {
        debug!(program = %self.program, ?args, "running injector command");
        let status = Command::new(&self.program)
            .args(args)
            .status()
            .with_context(|| format!("failed to run {}", self.program))?;
        if !status.success() {
            bail!("{} exited with {status}", self.program);
        }
        Ok(())
    }
}

fn set_clipboard(text: &str) -> Result<()> {
    let mut child = Command::new("xclip")
        .args(["-selection", "clipboard"])
        .stdin(Stdio::piped())
        .spawn()
        .context("failed to run xclip")?;
    child
        .stdin
        .take()
        .context("xclip stdin not captured")?
        .write_all(text.as_bytes())?;
    let status = child.wait()?;
    if !status.success() {
        bail!("xclip exited with {status}");
    }
    Ok(())
}

impl TextInjector for XdotoolInjector {
    fn type_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.strategy == InjectStrategy::Paste {
            set_clipboard(text)?;
        }
        for args in self.type_args(text) {
            self.run(&args)?;
        }
        Ok(())
    }

    fn cursor_left(&mut self) -> Result<()> {
        self.run(&["key".to_string(), "Left".to_string()])
    }

    fn name(&self) -> &'static str {
        match self.strategy {
            InjectStrategy::Type => "xdotool-type",
            InjectStrategy::Paste => "xdotool-paste",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_text_is_passed_after_double_dash() {
        let injector = XdotoolInjector::new(InjectStrategy::Type);
        assert_eq!(
            injector.type_args("-木"),
            vec![vec!["type", "--clearmodifiers", "--", "-木"]]
        );
    }

    #[test]
    fn paste_strategy_sends_ctrl_v() {
        let injector = XdotoolInjector::new(InjectStrategy::Paste);
        assert_eq!(injector.type_args("木"), vec![vec!["key", "--clearmodifiers", "ctrl+v"]]);
        assert_eq!(injector.name(), "xdotool-paste");
    }

    #[test]
    fn missing_program_is_an_error() {
        let mut injector = XdotoolInjector::new(InjectStrategy::Type)
            .with_program("q9-no-such-program");
        let err = injector.type_text("木").unwrap_err();
        assert!(err.to_string().contains("q9-no-such-program"));
        assert!(injector.cursor_left().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_status_is_an_error() {
        let mut injector = XdotoolInjector::new(InjectStrategy::Type).with_program("false");
        assert!(injector.emit("「」", true).is_err());
    }
}
