use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use q9::helper::{self, HelperOptions};
use q9::AppConfig;
use q9_core::Lookup;

#[derive(Parser)]
#[command(name = "q9")]
#[command(about = "九万 stroke-code Chinese input method")]
struct Cli {
    /// Configuration file (TOML); defaults are used when it does not exist
    #[arg(short, long, global = true, default_value = "q9.toml")]
    config: PathBuf,

    /// Log filter, e.g. `debug` or `q9=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the input method (default)
    Run {
        /// Log emissions instead of injecting them
        #[arg(long)]
        dry_run: bool,
        /// Skip global capture and read keys from the console only
        #[arg(long)]
        console_only: bool,
    },
    /// Privileged keyboard reader started by `run` on Linux
    HookHelper {
        /// Keyboard device instead of auto-discovery
        #[arg(long)]
        device: Option<PathBuf>,
        /// Share the device instead of grabbing it
        #[arg(long)]
        no_grab: bool,
        /// Milliseconds between shutdown checks while no key arrives
        #[arg(long, default_value_t = 100)]
        poll_ms: u64,
    },
    /// Candidates of a stroke code
    Lookup { code: String },
    /// Related characters
    Relate { ch: String },
    /// Homophones
    Homo { ch: String },
    /// Convert text to simplified characters
    Simplify { text: String },
}

fn open_dataset(config_path: &Path) -> Result<Arc<dyn Lookup>> {
    let config = AppConfig::load_or_default(config_path)?;
    q9::app::open_lookup(&config.base)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    q9::init_logging(cli.log_level.as_deref());

    let command = cli.command.unwrap_or(Cmd::Run {
        dry_run: false,
        console_only: false,
    });

    match command {
        Cmd::HookHelper {
            device,
            no_grab,
            poll_ms,
        } => helper::run(HelperOptions {
            device,
            grab: !no_grab,
            poll_interval: Duration::from_millis(poll_ms),
        }),
        Cmd::Run {
            dry_run,
            console_only,
        } => {
            let mut config = AppConfig::load_or_default(&cli.config)?;
            config.dry_run |= dry_run;
            q9::app::run(&config, console_only)?;
            Ok(())
        }
        Cmd::Lookup { code } => {
            let lookup = open_dataset(&cli.config)?;
            // non-numeric codes resolve to nothing
            let candidates = match code.trim().parse::<u32>() {
                Ok(code) => lookup.candidates_for_code(code),
                Err(_) => Vec::new(),
            };
            println!("{}", candidates.join(" "));
            Ok(())
        }
        Cmd::Relate { ch } => {
            println!("{}", open_dataset(&cli.config)?.related_for(&ch).join(" "));
            Ok(())
        }
        Cmd::Homo { ch } => {
            println!("{}", open_dataset(&cli.config)?.homophones_for(&ch).join(" "));
            Ok(())
        }
        Cmd::Simplify { text } => {
            println!("{}", open_dataset(&cli.config)?.simplify(&text));
            Ok(())
        }
    }
}
