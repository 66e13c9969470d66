use std::{env, path::PathBuf};

/// Address the greeting client dials when none is given
pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Line written once the secure channel is up
pub const GREETING: &str = "HELLO FROM RUBBY\n";

/// Line the peer must answer with
pub const EXPECTED_REPLY: &str = "ACK\n";

/// Longest reply line accepted, newline included
pub const MAX_REPLY_LEN: usize = 1024;

/// Environment variable overriding the certificate directory
pub const CERTS_DIR_ENV: &str = "ENOUGH_CERTS_DIR";
const DEFAULT_CERTS_DIR: &str = "certs";

const CA_STUB: &str = "ca";
const DEFAULT_CLIENT_STUB: &str = "client0";

/// Directory holding the PEM files written by `enough-gencert`
pub fn certs_dir() -> PathBuf {
    let dir = env::var(CERTS_DIR_ENV).unwrap_or(DEFAULT_CERTS_DIR.to_string());
    PathBuf::from(dir)
}

/// File name of the certificate half of a pair, e.g. `client0_cert.pem`
pub fn cert_file_name(stub: &str) -> String {
    format!("{stub}_cert.pem")
}

/// File name of the key half of a pair, e.g. `client0_key.pem`
pub fn key_file_name(stub: &str) -> String {
    format!("{stub}_key.pem")
}

/// Certificate paths for client authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertPath {
    /// Path to the client certificate file
    pub cert_path: PathBuf,
    /// Path to the client private key file
    pub key_path:  PathBuf,
    /// Path to the certificate authority file
    pub ca_path:   PathBuf,
}

impl ClientCertPath {
    /// Creates ClientCertPath with default certificate locations
    /// (`client0_*` and `ca_cert.pem` in the certs directory).
    pub fn new() -> Self {
        Self::for_client(DEFAULT_CLIENT_STUB)
    }

    /// Paths for the pair named `stub` inside the certs directory
    pub fn for_client(stub: &str) -> Self {
        Self::in_dir(certs_dir(), stub)
    }

    /// Paths for the pair named `stub` inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>, stub: &str) -> Self {
        let base = dir.into();
        Self {
            cert_path: base.join(cert_file_name(stub)),
            key_path:  base.join(key_file_name(stub)),
            ca_path:   base.join(cert_file_name(CA_STUB)),
        }
    }
}

impl Default for ClientCertPath {
    fn default() -> Self {
        Self::new()
    }
}
