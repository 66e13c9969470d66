use anyhow::{Context, Result};
use enough_client::{ClientCertPath, ClientConfig, ErrorKind, SecureClient, TlsPolicy};

/// Greets a peer on the default address using the files written by
/// `enough-gencert` and explains what went wrong if it fails.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== enough client basic example ===");

    let paths = ClientCertPath::new();
    println!("Certificate paths:");
    println!("  - Client cert: {:?}", paths.cert_path);
    println!("  - Client key: {:?}", paths.key_path);
    println!("  - CA cert: {:?}", paths.ca_path);

    let config = ClientConfig::from_cert_path(&paths)
        .context("Failed to load certificates, run enough-gencert first")?
        .with_server_name("localhost")
        .with_policy(TlsPolicy::default());

    let client = SecureClient::new(config)?;
    match client.run() {
        Ok(()) => println!("✓ Peer acknowledged the greeting"),
        Err(e) => match e.kind() {
            ErrorKind::Transport => println!("Nothing listening on {}: {e}", client.addr()),
            ErrorKind::Handshake => println!("Peer failed TLS policy checks: {e}"),
            ErrorKind::Protocol => println!("Peer answered, but not with ACK: {e}"),
            _ => return Err(e.into()),
        },
    }
    Ok(())
}
