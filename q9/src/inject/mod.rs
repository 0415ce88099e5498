//! Platform text injectors.
//!
//! - Windows: `SendInput` with `KEYEVENTF_UNICODE`
//! - Linux (X11): `xdotool`, typing directly or pasting through the clipboard
//! - `--dry-run`: `NullInjector`; the engine still logs every emission

use q9_core::{NullInjector, TextInjector};
use tracing::info;

use crate::config::AppConfig;

pub mod xdotool;
pub use xdotool::XdotoolInjector;

#[cfg(windows)]
pub mod send_input;

/// Injector for the running OS.
pub fn platform_injector(config: &AppConfig) -> Box<dyn TextInjector> {
    let injector = select(config);
    info!(injector = injector.name(), "text injector selected");
    injector
}

fn select(config: &AppConfig) -> Box<dyn TextInjector> {
    if config.dry_run {
        return Box::new(NullInjector);
    }
    #[cfg(windows)]
    {
        Box::new(send_input::SendInputInjector)
    }
    #[cfg(not(windows))]
    {
        Box::new(XdotoolInjector::new(config.inject_strategy))
    }
}
