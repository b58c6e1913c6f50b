//! bundle-read - query the metadata of a produced bundle.

use anyhow::{Context, Result};
use bundle_gen::bundler::assemble::BundleMetadata;
use clap::Parser;
use std::path::PathBuf;

/// Query bundle metadata
#[derive(Parser, Debug)]
#[command(name = "bundle-read", version, about = "Query bundle metadata")]
struct Args {
    /// The bundle file to query
    #[arg(value_name = "BUNDLE")]
    bundle: PathBuf,

    /// The field to output, one value per line for lists
    #[arg(short, long, conflicts_with = "all")]
    field: Option<String>,

    /// Output everything, one indented value per line
    #[arg(short, long)]
    all: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let metadata = BundleMetadata::from_archive(&args.bundle)
        .with_context(|| format!("reading {}", args.bundle.display()))?;
    let fields = metadata.fields();

    if args.all {
        for (field, values) in &fields {
            println!("{}:", field);
            for value in values {
                println!("  {}", value);
            }
        }
    } else if let Some(field) = args.field {
        match fields.get(field.as_str()) {
            Some(values) => {
                for value in values {
                    println!("{}", value);
                }
            }
            None => {
                log::debug!("{} has no {} field", args.bundle.display(), field);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
