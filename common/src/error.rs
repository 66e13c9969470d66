//! Error types for the connector and its building blocks
//!
//! Every failure the client can hit maps onto one [`ErrorKind`], so callers
//! (and tests) can tell a refused TCP connection apart from a rejected peer
//! certificate without string matching.

use std::io;

use thiserror::Error;

/// Result type alias for enough operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Certificate, key or trust anchor could not be loaded
    TrustMaterial,
    /// The TLS policy or server name is not usable
    Policy,
    /// The TCP connection could not be established
    Transport,
    /// TLS negotiation or peer verification failed
    Handshake,
    /// The peer answered with something other than the expected reply
    Protocol,
    /// I/O failed on an established secure stream
    Stream,
}

/// Problems with PEM encoded certificates and keys
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("failed to read {what} from {path}: {source}")]
    Read {
        what:   &'static str,
        path:   String,
        #[source]
        source: io::Error,
    },

    #[error("malformed PEM in {what}: {source}")]
    Pem {
        what:   &'static str,
        #[source]
        source: io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(&'static str),

    #[error("no private key found in {0}")]
    NoPrivateKey(&'static str),

    #[error("invalid trust anchor: {0}")]
    InvalidAnchor(#[source] rustls::Error),

    #[error("certificate and private key do not form a usable identity: {0}")]
    InvalidIdentity(#[source] rustls::Error),
}

/// Reasons a [`TlsPolicy`](crate::policy::TlsPolicy) is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("minimum protocol version {min} is above maximum {max}")]
    VersionRange { min: String, max: String },

    #[error("at least one cipher suite must be allowed")]
    NoCipherSuites,

    #[error("unknown cipher suite {0:?}")]
    UnknownCipherSuite(String),

    #[error("cipher suite {suite} cannot be negotiated with protocol versions {min}..={max}")]
    SuiteOutsideVersions {
        suite: String,
        min:   String,
        max:   String,
    },

    #[error("TLS compression is not supported and must stay disabled")]
    CompressionUnsupported,

    #[error("peer verification cannot be disabled")]
    VerificationRequired,

    #[error("maximum chain depth must be at least 1")]
    ZeroChainDepth,

    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("failed to parse policy: {0}")]
    Parse(String),
}

/// Top-level error type for the secure connector
#[derive(Debug, Error)]
pub enum Error {
    #[error("trust material error: {0}")]
    TrustMaterial(#[from] MaterialError),

    #[error("invalid TLS policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("failed to build TLS configuration: {0}")]
    Config(#[source] rustls::Error),

    #[error("failed to connect to {addr}: {source}")]
    Transport {
        addr:   String,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] rustls::Error),

    #[error("connection lost during TLS handshake: {0}")]
    HandshakeIo(#[source] io::Error),

    #[error("unexpected reply: expected {expected:?}, got {actual:?}")]
    UnexpectedReply { expected: String, actual: String },

    #[error("connection closed after {received} bytes, before a reply line was received")]
    ClosedBeforeReply { received: usize },

    #[error("secure stream I/O failed: {0}")]
    Stream(#[source] io::Error),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TrustMaterial(_) => ErrorKind::TrustMaterial,
            Error::Policy(_) | Error::Config(_) => ErrorKind::Policy,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Handshake(_) | Error::HandshakeIo(_) => ErrorKind::Handshake,
            Error::UnexpectedReply { .. } | Error::ClosedBeforeReply { .. } => {
                ErrorKind::Protocol
            }
            Error::Stream(_) => ErrorKind::Stream,
        }
    }

    /// Map a failure from [`TlsStream`](crate::tls_stream::TlsStream) handshake
    /// driving onto the handshake class.
    ///
    /// The stream reports rustls errors wrapped in `InvalidData`; those are
    /// unwrapped so the original `rustls::Error` is kept.
    pub fn from_handshake(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::InvalidData {
            if let Some(tls) = err.get_ref().and_then(|e| e.downcast_ref::<rustls::Error>()) {
                return Error::Handshake(tls.clone());
            }
        }
        Error::HandshakeIo(err)
    }
}
