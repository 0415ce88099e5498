//! Print table sizes and sample rows of a q9 dataset.
//!
//! Usage:
//!   cargo run -p q9-tools --bin inspect_dataset -- --db data/q9.redb --code 111

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use q9_core::{Lookup, RedbLookup};

#[derive(Parser, Debug)]
#[command(name = "inspect_dataset")]
#[command(about = "Inspect a q9 redb dataset")]
struct Args {
    #[arg(long, default_value = "data/q9.redb")]
    db: PathBuf,

    /// Number of code rows to print
    #[arg(long, default_value_t = 5)]
    limit: usize,

    /// Also resolve this code
    #[arg(long)]
    code: Option<u32>,

    /// Also show related characters and homophones of this character
    #[arg(long)]
    ch: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!(db = %args.db.display(), "opening dataset");
    let db = RedbLookup::open(&args.db)?;
    println!("Opened {}", db.path().display());

    let stats = db.stats()?;
    println!("  candidates: {}", stats.codes);
    println!("  related:    {}", stats.related);
    println!("  readings:   {}", stats.readings);
    println!("  simplified: {}", stats.simplified);

    for (i, (code, chars)) in db.first_codes(args.limit)?.iter().enumerate() {
        println!("  [{i}] {code} -> {chars}");
    }

    if let Some(code) = args.code {
        println!("code {code}: {}", db.candidates_for_code(code).join(" "));
    }
    if let Some(ch) = args.ch.as_deref() {
        println!("related {ch}: {}", db.related_for(ch).join(" "));
        println!("homophones {ch}: {}", db.homophones_for(ch).join(" "));
        println!("simplified {ch}: {}", db.simplify(ch));
    }
    Ok(())
}
