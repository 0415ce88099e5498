//! q9: the 九万 stroke-code input method front-end.
//!
//! Public API:
//! - `AppConfig`: engine config plus capture and injection settings
//! - `capture`: `KeySource` backends (Windows hook, Linux device helper)
//! - `inject`: platform `TextInjector`s
//! - `dispatch::run`: the single consumer loop that owns the engine
//! - `console`, `render`: terminal front-end
//! - `helper`: the `hook-helper` subcommand
//! - `app::run`: full lifecycle of `q9 run`

pub mod app;
pub mod capture;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod helper;
pub mod inject;
pub mod render;

pub use config::{AppConfig, InjectStrategy};

/// Install the stderr log subscriber. `level` overrides `RUST_LOG`; the
/// default is `info`. Safe to call twice.
pub fn init_logging(level: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
