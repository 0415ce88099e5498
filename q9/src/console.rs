//! Console front-end.
//!
//! Every character of a typed line is translated under the current scheme
//! and fed to the engine in order. Lines starting with `:` are commands:
//! `:s` simplified output, `:n` numpad/letter scheme, `:g` global input,
//! `:v` visibility, `:q` quit.

use std::io::BufRead;
use tracing::{debug, warn};

use q9_core::{translate_char, Command, ImeEngine, InputScheme};

use crate::capture::{Input, InputSender};

/// A `:` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    ToggleSimplified,
    ToggleScheme,
    ToggleGlobal,
    ToggleVisibility,
    Quit,
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Console(ConsoleCommand),
    Keys(Vec<Command>),
    Unknown(String),
}

pub fn parse_line(line: &str, scheme: InputScheme) -> LineAction {
    let line = line.trim();
    if let Some(command) = line.strip_prefix(':') {
        return match command.trim() {
            "s" => LineAction::Console(ConsoleCommand::ToggleSimplified),
            "n" => LineAction::Console(ConsoleCommand::ToggleScheme),
            "g" => LineAction::Console(ConsoleCommand::ToggleGlobal),
            "v" => LineAction::Console(ConsoleCommand::ToggleVisibility),
            "q" => LineAction::Console(ConsoleCommand::Quit),
            other => LineAction::Unknown(other.to_string()),
        };
    }
    let keys = line
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter_map(|c| {
            let command = translate_char(c, scheme);
            if command.is_none() {
                debug!(%c, "character has no key under the current scheme");
            }
            command
        })
        .collect();
    LineAction::Keys(keys)
}

/// Apply one line to the engine. Returns false when the user asked to quit.
pub fn apply_line(engine: &mut ImeEngine, line: &str) -> bool {
    match parse_line(line, engine.session().scheme()) {
        LineAction::Console(ConsoleCommand::Quit) => return false,
        LineAction::Console(ConsoleCommand::ToggleSimplified) => engine.toggle_simplified_output(),
        LineAction::Console(ConsoleCommand::ToggleScheme) => engine.toggle_scheme(),
        LineAction::Console(ConsoleCommand::ToggleGlobal) => engine.toggle_global_input(),
        LineAction::Console(ConsoleCommand::ToggleVisibility) => engine.toggle_visibility(),
        LineAction::Keys(commands) => {
            for command in commands {
                engine.issue_command(command);
            }
        }
        LineAction::Unknown(command) => warn!(command = %command, "unknown console command"),
    }
    true
}

/// Read stdin lines on a detached thread. End of input is reported as
/// `SourceClosed("console")`.
pub fn spawn_stdin_reader(sink: InputSender) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("q9-console".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("reading console input failed: {e}");
                        break;
                    }
                };
                if sink.send(Input::Line(line)).is_err() {
                    return;
                }
            }
            let _ = sink.send(Input::SourceClosed(CONSOLE_SOURCE));
        })?;
    Ok(())
}

/// Name the console reader reports when stdin closes.
pub const CONSOLE_SOURCE: &str = "console";
