//! Single consumer of all inputs.
//!
//! Capture backends and the console reader only send `Input`s; this loop
//! owns the engine and handles them one at a time, in arrival order.

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use q9_core::{ImeContext, ImeEngine, KeyResult};

use crate::capture::Input;
use crate::console::{self, CONSOLE_SOURCE};

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub keys_handled: usize,
    pub keys_passed: usize,
    pub key_ups: usize,
    pub lines: usize,
}

/// Process inputs until `Quit`, a `:q` line, every source closing, or all
/// senders dropping. `on_update` runs after each input with the refreshed
/// context.
pub fn run<F>(
    engine: &mut ImeEngine,
    inputs: &Receiver<Input>,
    capture_active: bool,
    mut on_update: F,
) -> DispatchSummary
where
    F: FnMut(&ImeContext),
{
    let mut summary = DispatchSummary::default();
    let mut capture_open = capture_active;
    let mut console_open = true;

    while let Ok(input) = inputs.recv() {
        match input {
            Input::Key(event) if event.is_key_up => summary.key_ups += 1,
            Input::Key(event) => match engine.process_key(event.code) {
                KeyResult::Handled => summary.keys_handled += 1,
                KeyResult::NotHandled => {
                    debug!(code = event.code, "key not handled");
                    summary.keys_passed += 1;
                }
            },
            Input::Line(line) => {
                summary.lines += 1;
                if !console::apply_line(engine, &line) {
                    info!("quit requested from console");
                    break;
                }
            }
            Input::SourceClosed(source) => {
                if source == CONSOLE_SOURCE {
                    console_open = false;
                } else {
                    warn!(source, "capture source closed, continuing window-focused only");
                    capture_open = false;
                    engine.set_global_input(false);
                }
                if !capture_open && !console_open {
                    info!("no input sources left");
                    break;
                }
            }
            Input::Quit => break,
        }
        on_update(engine.context());
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::KeyEvent;
    use q9_core::{Config, KeyMap, Platform, RecordingInjector, TableLookup};
    use std::sync::Arc;

    fn engine(rec: &RecordingInjector) -> ImeEngine {
        let mut t = TableLookup::new();
        t.insert_code(111, "一二三");
        let mut engine = ImeEngine::new(
            Arc::new(t),
            Box::new(rec.clone()),
            KeyMap::new(Platform::Linux).unwrap(),
            &Config::default(),
        );
        engine.set_global_input(true);
        engine
    }

    #[test]
    fn key_ups_are_ignored() {
        let rec = RecordingInjector::new();
        let mut engine = engine(&rec);
        let (tx, rx) = crossbeam_channel::unbounded();
        for code in [79, 79, 79] {
            tx.send(Input::Key(KeyEvent::down(code))).unwrap();
            tx.send(Input::Key(KeyEvent { code, is_key_up: true })).unwrap();
        }
        tx.send(Input::Key(KeyEvent::down(80))).unwrap();
        drop(tx);

        let summary = run(&mut engine, &rx, true, |_| {});
        assert_eq!(summary.keys_handled, 4);
        assert_eq!(summary.key_ups, 3);
        assert_eq!(rec.typed(), "二");
    }

    #[test]
    fn capture_closing_turns_global_input_off() {
        let rec = RecordingInjector::new();
        let mut engine = engine(&rec);
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Input::SourceClosed("device-stream")).unwrap();
        tx.send(Input::Key(KeyEvent::down(79))).unwrap();
        tx.send(Input::SourceClosed(CONSOLE_SOURCE)).unwrap();
        tx.send(Input::Line("1".into())).unwrap();

        let summary = run(&mut engine, &rx, true, |_| {});
        assert!(!engine.gate().global_enabled());
        assert_eq!(summary.keys_passed, 1);
        // loop stopped before the trailing line
        assert_eq!(summary.lines, 0);
    }
}
