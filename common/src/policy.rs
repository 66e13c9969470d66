//! TLS policy: which protocol versions, cipher suites and verification rules
//! a connection may use.
//!
//! Each option that an OpenSSL context would take as an OR'd flag is a named
//! field here, and [`TlsPolicy::validate`] refuses combinations rustls cannot
//! honour instead of silently ignoring them.

use std::{fmt, path::Path, sync::Arc};

use rustls::{
    crypto::{aws_lc_rs, CryptoProvider},
    CipherSuite, SupportedCipherSuite, SupportedProtocolVersion,
};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Name of the one suite the default policy allows
pub const DEFAULT_CIPHER_SUITE: &str = "ECDHE-ECDSA-AES128-GCM-SHA256";

/// Protocol versions rustls can speak; anything older is unrepresentable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    fn supported(self) -> &'static SupportedProtocolVersion {
        match self {
            TlsVersion::Tls12 => &rustls::version::TLS12,
            TlsVersion::Tls13 => &rustls::version::TLS13,
        }
    }

    fn of(version: &SupportedProtocolVersion) -> Option<Self> {
        match version.version {
            rustls::ProtocolVersion::TLSv1_2 => Some(TlsVersion::Tls12),
            rustls::ProtocolVersion::TLSv1_3 => Some(TlsVersion::Tls13),
            _ => None,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersion::Tls12 => f.write_str("TLSv1.2"),
            TlsVersion::Tls13 => f.write_str("TLSv1.3"),
        }
    }
}

// OpenSSL spelling for the suites the aws-lc-rs provider ships.
const OPENSSL_NAMES: &[(&str, CipherSuite)] = &[
    (
        "ECDHE-ECDSA-AES128-GCM-SHA256",
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    ),
    (
        "ECDHE-ECDSA-AES256-GCM-SHA384",
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    ),
    (
        "ECDHE-ECDSA-CHACHA20-POLY1305",
        CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    ),
    (
        "ECDHE-RSA-AES128-GCM-SHA256",
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ),
    (
        "ECDHE-RSA-AES256-GCM-SHA384",
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    ),
    (
        "ECDHE-RSA-CHACHA20-POLY1305",
        CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ),
];

/// Resolve a suite name against the aws-lc-rs provider.
///
/// Accepts OpenSSL names (`ECDHE-ECDSA-AES128-GCM-SHA256`) and IANA names
/// (`TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256`, `TLS13_AES_128_GCM_SHA256`).
pub fn find_cipher_suite(name: &str) -> Result<SupportedCipherSuite, PolicyError> {
    let wanted = OPENSSL_NAMES
        .iter()
        .find(|(openssl, _)| openssl.eq_ignore_ascii_case(name))
        .map(|(_, suite)| *suite);

    aws_lc_rs::ALL_CIPHER_SUITES
        .iter()
        .copied()
        .find(|supported| match wanted {
            Some(suite) => supported.suite() == suite,
            None => format!("{:?}", supported.suite()).eq_ignore_ascii_case(name),
        })
        .ok_or_else(|| PolicyError::UnknownCipherSuite(name.to_string()))
}

/// Connection policy applied to every handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsPolicy {
    /// Lowest protocol version offered
    pub min_version:     TlsVersion,
    /// Highest protocol version offered
    pub max_version:     TlsVersion,
    /// Cipher suites that may be negotiated, OpenSSL or IANA names
    pub cipher_suites:   Vec<String>,
    /// TLS-level compression; must stay off
    pub compression:     bool,
    /// Session tickets and session-ID resumption
    pub session_tickets: bool,
    /// Fail the handshake when the peer presents no certificate
    pub verify_peer:     bool,
    /// Signer hops allowed between the peer certificate and the trust anchor
    pub max_chain_depth: usize,
}

impl Default for TlsPolicy {
    /// TLS 1.2 only, ECDHE-ECDSA-AES128-GCM-SHA256 only, no compression, no
    /// tickets, peer certificate mandatory and signed directly by the anchor.
    fn default() -> Self {
        Self {
            min_version:     TlsVersion::Tls12,
            max_version:     TlsVersion::Tls12,
            cipher_suites:   vec![DEFAULT_CIPHER_SUITE.to_string()],
            compression:     false,
            session_tickets: false,
            verify_peer:     true,
            max_chain_depth: 1,
        }
    }
}

impl TlsPolicy {
    /// Pin the protocol to exactly one version
    pub fn with_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self.max_version = version;
        self
    }

    /// Replace the allowed cipher suites
    pub fn with_cipher_suites<I, S>(mut self, suites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cipher_suites = suites.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum chain depth
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Parse a policy from JSON; omitted fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: Self =
            serde_json::from_str(json).map_err(|e| PolicyError::Parse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read and parse a JSON policy file
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PolicyError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Check that every option can be enforced
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.selected_suites().map(|_| ())
    }

    /// Protocol versions inside `[min_version, max_version]`
    pub fn protocol_versions(&self) -> Vec<&'static SupportedProtocolVersion> {
        [TlsVersion::Tls12, TlsVersion::Tls13]
            .into_iter()
            .filter(|v| (self.min_version..=self.max_version).contains(v))
            .map(TlsVersion::supported)
            .collect()
    }

    /// The aws-lc-rs provider narrowed to the allowed cipher suites
    pub fn crypto_provider(&self) -> Result<Arc<CryptoProvider>, PolicyError> {
        Ok(Arc::new(CryptoProvider {
            cipher_suites: self.selected_suites()?,
            ..aws_lc_rs::default_provider()
        }))
    }

    fn selected_suites(&self) -> Result<Vec<SupportedCipherSuite>, PolicyError> {
        if self.min_version > self.max_version {
            return Err(PolicyError::VersionRange {
                min: self.min_version.to_string(),
                max: self.max_version.to_string(),
            });
        }
        if self.compression {
            return Err(PolicyError::CompressionUnsupported);
        }
        if !self.verify_peer {
            return Err(PolicyError::VerificationRequired);
        }
        if self.max_chain_depth == 0 {
            return Err(PolicyError::ZeroChainDepth);
        }
        if self.cipher_suites.is_empty() {
            return Err(PolicyError::NoCipherSuites);
        }

        let range = self.min_version..=self.max_version;
        let mut suites = Vec::with_capacity(self.cipher_suites.len());
        for name in &self.cipher_suites {
            let suite = find_cipher_suite(name)?;
            let usable = TlsVersion::of(suite.version()).is_some_and(|v| range.contains(&v));
            if !usable {
                return Err(PolicyError::SuiteOutsideVersions {
                    suite: name.clone(),
                    min:   self.min_version.to_string(),
                    max:   self.max_version.to_string(),
                });
            }
            if !suites.contains(&suite) {
                suites.push(suite);
            }
        }
        Ok(suites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_pinned_and_valid() {
        let policy = TlsPolicy::default();
        assert_eq!(policy.validate(), Ok(()));
        assert_eq!(policy.protocol_versions(), vec![&rustls::version::TLS12]);

        let provider = policy.crypto_provider().unwrap();
        let suites: Vec<_> = provider.cipher_suites.iter().map(|s| s.suite()).collect();
        assert_eq!(
            suites,
            vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256]
        );
    }

    #[test]
    fn openssl_and_iana_names_resolve_to_same_suite() {
        let openssl = find_cipher_suite("ECDHE-ECDSA-AES128-GCM-SHA256").unwrap();
        let iana = find_cipher_suite("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256").unwrap();
        assert_eq!(openssl.suite(), iana.suite());
        assert!(find_cipher_suite("TLS13_AES_128_GCM_SHA256").is_ok());
    }

    #[test]
    fn unknown_suite_is_refused() {
        let policy = TlsPolicy::default().with_cipher_suites(["RC4-MD5"]);
        assert_eq!(
            policy.validate(),
            Err(PolicyError::UnknownCipherSuite("RC4-MD5".into()))
        );
    }

    #[test]
    fn tls13_suite_is_refused_on_tls12_only_policy() {
        let policy = TlsPolicy::default().with_cipher_suites(["TLS13_AES_128_GCM_SHA256"]);
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::SuiteOutsideVersions { .. })
        ));
    }

    #[test]
    fn inverted_version_range_is_refused() {
        let policy = TlsPolicy {
            min_version: TlsVersion::Tls13,
            max_version: TlsVersion::Tls12,
            ..TlsPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::VersionRange { .. })
        ));
    }

    #[test]
    fn unenforceable_options_are_refused() {
        let compression = TlsPolicy {
            compression: true,
            ..TlsPolicy::default()
        };
        assert_eq!(
            compression.validate(),
            Err(PolicyError::CompressionUnsupported)
        );

        let no_verify = TlsPolicy {
            verify_peer: false,
            ..TlsPolicy::default()
        };
        assert_eq!(no_verify.validate(), Err(PolicyError::VerificationRequired));

        let zero_depth = TlsPolicy::default().with_max_chain_depth(0);
        assert_eq!(zero_depth.validate(), Err(PolicyError::ZeroChainDepth));

        let no_suites = TlsPolicy::default().with_cipher_suites(Vec::<String>::new());
        assert_eq!(no_suites.validate(), Err(PolicyError::NoCipherSuites));
    }

    #[test]
    fn range_selects_both_versions() {
        let policy = TlsPolicy {
            max_version: TlsVersion::Tls13,
            ..TlsPolicy::default()
        }
        .with_cipher_suites(["ECDHE-ECDSA-AES128-GCM-SHA256", "TLS13_AES_128_GCM_SHA256"]);
        assert_eq!(policy.validate(), Ok(()));
        assert_eq!(policy.protocol_versions().len(), 2);
    }

    #[test]
    fn json_overrides_only_named_fields() {
        let policy = TlsPolicy::from_json(r#"{"max_chain_depth": 2}"#).unwrap();
        assert_eq!(policy.max_chain_depth, 2);
        assert_eq!(policy.min_version, TlsVersion::Tls12);
        assert_eq!(policy.cipher_suites, vec![DEFAULT_CIPHER_SUITE.to_string()]);

        let pinned = TlsPolicy::from_json(
            r#"{"min_version": "1.3", "max_version": "1.3",
                "cipher_suites": ["TLS13_AES_256_GCM_SHA384"]}"#,
        )
        .unwrap();
        assert_eq!(pinned.protocol_versions(), vec![&rustls::version::TLS13]);
    }

    #[test]
    fn json_rejects_unknown_options_and_invalid_values() {
        assert!(matches!(
            TlsPolicy::from_json(r#"{"renegotiation": true}"#),
            Err(PolicyError::Parse(_))
        ));
        assert_eq!(
            TlsPolicy::from_json(r#"{"compression": true}"#),
            Err(PolicyError::CompressionUnsupported)
        );
    }
}
