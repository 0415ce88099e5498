//! Global key capture.
//!
//! A `KeySource` delivers raw key transitions from outside the terminal
//! window into a channel. Exactly one backend is built at startup:
//! - Windows: `WH_KEYBOARD_LL` hook on its own message-loop thread
//! - Linux: a privileged helper process reading the keyboard device and
//!   printing `KEY:<code>` lines
//!
//! Backends never touch the engine; the dispatch thread owns it.

use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Duration;

use q9_core::InterceptGate;

use crate::config::AppConfig;

pub mod protocol;

pub mod device_stream;
pub use device_stream::DeviceStreamSource;

#[cfg(target_os = "linux")]
pub mod evdev_device;

#[cfg(windows)]
pub mod windows_hook;

/// One raw key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u32,
    pub is_key_up: bool,
}

impl KeyEvent {
    pub fn down(code: u32) -> Self {
        Self {
            code,
            is_key_up: false,
        }
    }
}

/// Messages delivered to the dispatch thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A captured key
    Key(KeyEvent),
    /// A line typed on the console
    Line(String),
    /// The source closed; no more events will arrive from it
    SourceClosed(&'static str),
    Quit,
}

pub type InputSender = Sender<Input>;

/// A source of global key events.
pub trait KeySource: Send {
    /// Start delivering events into `sink`. Keys for which `gate` says
    /// `should_intercept` are swallowed when the backend is able to.
    fn install(&mut self, sink: InputSender, gate: Arc<InterceptGate>) -> anyhow::Result<()>;

    /// Stop delivering events and release OS resources, waiting at most
    /// `timeout` for capture threads.
    fn uninstall(&mut self, timeout: Duration);

    fn name(&self) -> &'static str;
}

/// Build the capture backend for the running OS.
///
/// Returns `None` when the OS has no supported mechanism; the caller then
/// runs in window-focused-only mode.
#[cfg(windows)]
pub fn platform_source(_config: &AppConfig) -> Option<Box<dyn KeySource>> {
    Some(Box::new(windows_hook::LowLevelHook::new()))
}

#[cfg(target_os = "linux")]
pub fn platform_source(config: &AppConfig) -> Option<Box<dyn KeySource>> {
    Some(Box::new(DeviceStreamSource::new(config.helper_argv())))
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn platform_source(_config: &AppConfig) -> Option<Box<dyn KeySource>> {
    None
}

/// Join a capture thread, giving up after `timeout`.
///
/// Returns false when the thread was still running at the deadline; it is
/// left detached.
pub(crate) fn join_bounded(handle: std::thread::JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while !handle.is_finished() {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    let _ = handle.join();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_join_gives_up_on_stuck_thread() {
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        let stuck = std::thread::spawn(move || {
            let _ = rx.recv();
        });
        assert!(!join_bounded(stuck, Duration::from_millis(30)));
        drop(tx);
    }

    #[test]
    fn bounded_join_returns_finished_thread() {
        let done = std::thread::spawn(|| {});
        assert!(join_bounded(done, Duration::from_secs(1)));
    }
}
