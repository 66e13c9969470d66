use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use enough_client::{ClientCertPath, ClientConfig, SecureClient, TlsPolicy};
use enough_common::DEFAULT_ADDR;
use tracing::info;

#[derive(Parser)]
#[command(name = "enough-client")]
#[command(about = "Greets a peer over mutually authenticated TLS and waits for its ACK")]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Address of the peer
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    addr: String,

    /// Also require the peer certificate to be issued for this name
    #[arg(long)]
    server_name: Option<String>,

    /// Client certificate PEM (defaults to client0_cert.pem in $ENOUGH_CERTS_DIR)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Client private key PEM
    #[arg(long)]
    key: Option<PathBuf>,

    /// Trust anchor PEM
    #[arg(long)]
    ca: Option<PathBuf>,

    /// JSON file overriding the default TLS policy
    #[arg(long)]
    policy: Option<PathBuf>,
}

impl Args {
    fn cert_path(&self) -> ClientCertPath {
        let defaults = ClientCertPath::new();
        ClientCertPath {
            cert_path: self.cert.clone().unwrap_or(defaults.cert_path),
            key_path:  self.key.clone().unwrap_or(defaults.key_path),
            ca_path:   self.ca.clone().unwrap_or(defaults.ca_path),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level: tracing::Level = args
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level {:?}", args.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let policy = match &args.policy {
        Some(path) => TlsPolicy::from_file(path)
            .with_context(|| format!("Failed to load TLS policy from {path:?}"))?,
        None => TlsPolicy::default(),
    };

    let mut config = ClientConfig::from_cert_path(&args.cert_path())
        .context("Failed to load client trust material")?
        .with_addr(&args.addr)
        .with_policy(policy);
    if let Some(name) = &args.server_name {
        config = config.with_server_name(name);
    }

    let client = SecureClient::new(config).context("Failed to configure TLS client")?;
    info!("Greeting {}", client.addr());
    client.run().context("Greeting exchange failed")?;

    println!("client: received ACK! All done...");
    Ok(())
}
