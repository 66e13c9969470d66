//! enough common library
//!
//! Building blocks shared by the enough client and certificate tools:
//!
//! - PEM loading for the local identity and the trust anchor
//! - An explicit, validated TLS policy (versions, suites, verification rules)
//! - A server certificate verifier that bounds the trust-chain depth
//! - A blocking TLS stream wrapper over any `Read + Write` transport
//! - Error types classifying every failure of a connection attempt
//!
//! # Defaults
//!
//! [`TlsPolicy::default`] pins TLS 1.2 with
//! `ECDHE-ECDSA-AES128-GCM-SHA256` only, keeps compression and session
//! tickets off, requires a peer certificate and only accepts a peer signed
//! directly by the trust anchor.

/// Default addresses, greeting lines and certificate paths
pub mod config;

/// Error types and classification
pub mod error;

/// Identity and trust anchor loading
pub mod material;

/// TLS policy definition and validation
pub mod policy;

/// TLS stream wrapper for blocking transports
pub mod tls_stream;

/// Chain-depth limited server certificate verification
pub mod verifier;

// Re-export commonly used types for convenience
pub use config::{ClientCertPath, DEFAULT_ADDR, EXPECTED_REPLY, GREETING};
pub use error::{Error, ErrorKind, MaterialError, PolicyError, Result};
pub use material::{Identity, TrustAnchor};
pub use policy::{TlsPolicy, TlsVersion};
pub use tls_stream::TlsStream;
pub use verifier::ChainDepthVerifier;
