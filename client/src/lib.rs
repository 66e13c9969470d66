//! enough client library
//!
//! Dials a peer over TCP, upgrades the connection to mutually authenticated
//! TLS under a restricted [`TlsPolicy`], writes one greeting line and checks
//! the acknowledgement line that comes back.
//!
//! # Example
//!
//! ```no_run
//! use enough_client::{ClientCertPath, ClientConfig, SecureClient};
//!
//! # fn main() -> Result<(), enough_client::Error> {
//! let config = ClientConfig::from_cert_path(&ClientCertPath::new())?
//!     .with_addr("127.0.0.1:8000")
//!     .with_server_name("localhost");
//!
//! let client = SecureClient::new(config)?;
//! client.run()?;
//! println!("client: received ACK! All done...");
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::*;
// Re-export important types from enough-common for convenience
pub use enough_common::{
    ClientCertPath, Error, ErrorKind, Identity, TlsPolicy, TlsVersion, TrustAnchor,
};
