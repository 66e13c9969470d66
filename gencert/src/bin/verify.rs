use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use enough_gencert::verify::verify_files;

#[derive(Parser, Debug)]
#[command(name = "enough-verify")]
#[command(about = "Check a detached DER ECDSA signature against a certificate's public key")]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Certificate file (PEM) containing the public key
    #[arg(long)]
    cert: PathBuf,

    /// Signature file (raw DER) to check
    #[arg(long)]
    sig: PathBuf,

    /// File being verified
    #[arg(long)]
    file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level: tracing::Level = args
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level {:?}", args.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    verify_files(&args.cert, &args.sig, &args.file).context("[!!] verification failed")?;
    println!("Verify OK");
    Ok(())
}
