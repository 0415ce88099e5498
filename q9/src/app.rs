//! Application lifecycle for `q9 run`.

use anyhow::{Context, Result};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{info, warn};

use q9_core::{ImeEngine, KeyMap, Lookup, LruLookup, RedbLookup};

use crate::capture::{platform_source, KeySource};
use crate::config::AppConfig;
use crate::dispatch::{self, DispatchSummary};
use crate::inject::platform_injector;
use crate::render::TerminalRenderer;

/// Open the dataset named by `config`, behind an LRU cache unless the cache
/// size is zero. A missing dataset is fatal.
pub fn open_lookup(config: &q9_core::Config) -> Result<Arc<dyn Lookup>> {
    let redb = RedbLookup::open(&config.dataset_path)
        .with_context(|| format!("cannot open dataset {}", config.dataset_path.display()))?;
    Ok(match NonZeroUsize::new(config.lookup_cache_size) {
        Some(capacity) => Arc::new(LruLookup::new(redb, capacity)),
        None => Arc::new(redb),
    })
}

/// Build the engine used by the interactive front-ends.
pub fn build_engine(config: &AppConfig) -> Result<ImeEngine> {
    let lookup = open_lookup(&config.base)?;
    let keymap = KeyMap::for_current_platform()?;
    let injector = platform_injector(config);
    Ok(ImeEngine::new(lookup, injector, keymap, &config.base))
}

/// Install the global capture backend. Failure degrades to window-focused
/// input.
fn install_capture(
    config: &AppConfig,
    engine: &mut ImeEngine,
    sink: &crate::capture::InputSender,
) -> Option<Box<dyn KeySource>> {
    if !config.global_capture {
        info!("global capture disabled by configuration");
        return None;
    }
    let Some(mut source) = platform_source(config) else {
        warn!("no global capture mechanism on this platform, window-focused only");
        return None;
    };
    match source.install(sink.clone(), engine.gate()) {
        Ok(()) => {
            info!(source = source.name(), "global capture installed");
            engine.set_global_input(true);
            Some(source)
        }
        Err(e) => {
            warn!(source = source.name(), "global capture unavailable, window-focused only: {e:#}");
            None
        }
    }
}

/// Run the IME until the user quits or every input source closes.
pub fn run(config: &AppConfig, console_only: bool) -> Result<DispatchSummary> {
    let mut engine = build_engine(config)?;
    info!(
        dataset = %config.base.dataset_path.display(),
        injector = engine.injector_name(),
        scheme = ?config.base.input_scheme,
        "engine ready"
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut source = if console_only {
        None
    } else {
        install_capture(config, &mut engine, &tx)
    };
    crate::console::spawn_stdin_reader(tx.clone()).context("starting console reader")?;
    drop(tx);

    let mut renderer = TerminalRenderer::stdout();
    let mut draw = |ctx: &q9_core::ImeContext| {
        if let Err(e) = renderer.draw(ctx) {
            warn!("terminal output failed: {e}");
        }
    };
    draw(engine.context());
    let summary = dispatch::run(&mut engine, &rx, source.is_some(), draw);

    if let Some(source) = source.as_mut() {
        source.uninstall(config.shutdown_timeout());
    }
    info!(?summary, "q9 stopped");
    Ok(summary)
}
