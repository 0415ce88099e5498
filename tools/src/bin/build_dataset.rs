//! Build the q9 redb dataset from TSV sources.
//!
//! Usage:
//!   cargo run -p q9-tools --bin build_dataset -- --source data/source --out data/q9.redb

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use q9_core::{DatasetWriter, SourceTables};

#[derive(Parser, Debug)]
#[command(name = "build_dataset")]
#[command(about = "Build the q9 dataset from codes/related/readings/simplified TSV files")]
struct Args {
    /// Directory holding codes.tsv and the optional tables
    #[arg(long, default_value = "data/source")]
    source: PathBuf,

    /// Output redb file (replaced if it exists)
    #[arg(long, default_value = "data/q9.redb")]
    out: PathBuf,
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
    info!(source = %args.source.display(), out = %args.out.display(), "building dataset");
    let tables = SourceTables::read_dir(&args.source)?;
    let stats = DatasetWriter::create(&args.out)?.write(&tables.to_table_lookup())?;

    println!(
        "Wrote {} (codes={}, related={}, readings={}, simplified={})",
        args.out.display(),
        stats.codes,
        stats.related,
        stats.readings,
        stats.simplified
    );
    Ok(())
}
