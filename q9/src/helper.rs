//! `q9 hook-helper`: the privileged side of Linux capture.
//!
//! Reads the keyboard device, prints `KEY:<code>` for every intercepted
//! key-down and mirrors everything else through a virtual keyboard when the
//! device is grabbed. The intercept state arrives as control lines on stdin;
//! end of stdin or SIGTERM stops the helper, which releases the device
//! (ungrab, then close) before exiting.

use anyhow::Result;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use q9_core::InterceptGate;

use crate::capture::protocol::{apply_control_line, format_key_line};

/// Options of the helper subcommand.
#[derive(Debug, Clone)]
pub struct HelperOptions {
    /// Device node; discovered when `None`
    pub device: Option<PathBuf>,
    pub grab: bool,
    /// Longest wait for key events before `stop` is checked again
    pub poll_interval: Duration,
}

/// What the helper does with one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Print it for the main process (key-down of an intercepted key)
    Report,
    /// Drop it (release or repeat of a reported key)
    Swallow,
    /// Re-emit it to the system
    Forward,
}

/// Decides per event, keeping press/release pairs together even when the
/// intercept state changes while a key is held.
pub struct KeyFilter {
    gate: Arc<InterceptGate>,
    held: HashSet<u32>,
}

impl KeyFilter {
    pub fn new(gate: Arc<InterceptGate>) -> Self {
        Self {
            gate,
            held: HashSet::new(),
        }
    }

    /// `value` follows evdev: 1 press, 0 release, 2 repeat.
    pub fn classify(&mut self, code: u32, value: i32) -> KeyAction {
        match value {
            1 if self.gate.should_intercept(code) => {
                self.held.insert(code);
                KeyAction::Report
            }
            1 => KeyAction::Forward,
            0 if self.held.remove(&code) => KeyAction::Swallow,
            _ if value != 0 && self.held.contains(&code) => KeyAction::Swallow,
            _ => KeyAction::Forward,
        }
    }
}

/// Raw key events for the read loop.
pub trait KeyStream {
    /// Wait up to `timeout` for `(code, value)` pairs; an empty batch means
    /// nothing arrived.
    fn next_keys(&mut self, timeout: Duration) -> Result<Vec<(u32, i32)>>;

    /// Re-emit an event that is not ours.
    fn forward(&mut self, code: u32, value: i32);

    /// Ungrab, then close.
    fn release(&mut self);
}

/// Copy intercepted key-downs to `out` until `stop` is set or reading fails.
/// The stream is released on every exit path.
pub fn pump<S: KeyStream, W: Write>(
    stream: &mut S,
    filter: &mut KeyFilter,
    out: &mut W,
    stop: &AtomicBool,
    poll_interval: Duration,
) -> Result<()> {
    let result = pump_until_stopped(stream, filter, out, stop, poll_interval);
    stream.release();
    result
}

fn pump_until_stopped<S: KeyStream, W: Write>(
    stream: &mut S,
    filter: &mut KeyFilter,
    out: &mut W,
    stop: &AtomicBool,
    poll_interval: Duration,
) -> Result<()> {
    while !stop.load(Ordering::Relaxed) {
        for (code, value) in stream.next_keys(poll_interval)? {
            match filter.classify(code, value) {
                KeyAction::Report => {
                    writeln!(out, "{}", format_key_line(code))?;
                    out.flush()?;
                }
                KeyAction::Swallow => {}
                KeyAction::Forward => stream.forward(code, value),
            }
        }
    }
    Ok(())
}

/// Apply control lines to `gate`; set `stop` once the input ends.
pub fn follow_control<R: BufRead>(input: R, gate: &InterceptGate, stop: &AtomicBool) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if !apply_control_line(gate, &line) {
            debug!(line = %line, "ignoring control line");
        }
    }
    info!("control input closed, stopping");
    stop.store(true, Ordering::Relaxed);
}

#[cfg(target_os = "linux")]
pub use linux::run;

#[cfg(not(target_os = "linux"))]
pub fn run(_options: HelperOptions) -> anyhow::Result<()> {
    anyhow::bail!("hook-helper reads evdev devices and is only available on Linux")
}

#[cfg(target_os = "linux")]
mod linux {
    use anyhow::Result;
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tracing::{info, warn};

    use q9_core::{InputScheme, InterceptGate, KeyMap, Platform};

    use super::{follow_control, pump, HelperOptions, KeyFilter};
    use crate::capture::evdev_device::{discover_keyboard, KeyboardDevice};

    pub fn run(options: HelperOptions) -> Result<()> {
        // only the visibility key until the main process sends its state
        let gate = Arc::new(InterceptGate::new(
            KeyMap::new(Platform::Linux)?,
            InputScheme::Numpad,
            false,
        ));
        let stop = Arc::new(AtomicBool::new(false));
        for signal in [SIGTERM, SIGINT, SIGHUP] {
            signal_hook::flag::register(signal, Arc::clone(&stop))?;
        }
        {
            let gate = Arc::clone(&gate);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("q9-helper-stdin".into())
                .spawn(move || follow_control(std::io::stdin().lock(), &gate, &stop))?;
        }

        let path = options.device.clone().unwrap_or_else(discover_keyboard);
        let mut device = KeyboardDevice::open(&path)?;
        if options.grab && !device.grab() {
            warn!("continuing without exclusive grab; intercepted keys also reach applications");
        }

        let mut filter = KeyFilter::new(gate);
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        pump(&mut device, &mut filter, &mut out, &stop, options.poll_interval)?;
        info!("hook helper finished");
        Ok(())
    }
}
