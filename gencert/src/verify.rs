//! Detached ECDSA signature checks.
//!
//! A signature file is a bare DER `SEQUENCE { r INTEGER, s INTEGER }` and
//! says nothing about the digest it was computed over, so the digest is taken
//! from the signature algorithm the certificate itself was issued with.

use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use p256::{ecdsa::signature::hazmat::PrehashVerifier, pkcs8::DecodePublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;
use x509_parser::{
    der_parser::{ber::BerObjectContent, der::parse_der},
    pem::parse_x509_pem,
};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid PEM data")]
    Pem,

    #[error("failed to parse certificate: {0}")]
    Certificate(String),

    #[error("unsupported hash algorithm")]
    UnsupportedHash,

    #[error("unsupported public key, expected ECDSA P-256 or P-384")]
    UnsupportedKey,

    #[error("invalid signature data")]
    MalformedSignature,

    #[error("signature contained zero or negative values")]
    NonPositive,

    #[error("failed to read {path:?}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read signed data: {0}")]
    Data(#[source] io::Error),

    #[error("verification failed")]
    Mismatch,
}

/// Digest named by an `ecdsa-with-*` certificate signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    fn from_signature_oid(oid: &str) -> Option<Self> {
        match oid {
            "1.2.840.10045.4.1" => Some(Self::Sha1),
            "1.2.840.10045.4.3.2" => Some(Self::Sha256),
            "1.2.840.10045.4.3.3" => Some(Self::Sha384),
            "1.2.840.10045.4.3.4" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Hash everything `reader` yields without buffering it whole
    pub fn digest_reader<R: Read>(self, reader: R) -> io::Result<Vec<u8>> {
        fn run<D: Digest + io::Write, R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
            let mut hasher = D::new();
            io::copy(&mut reader, &mut hasher)?;
            Ok(hasher.finalize().to_vec())
        }

        match self {
            Self::Sha1 => run::<Sha1, _>(reader),
            Self::Sha256 => run::<Sha256, _>(reader),
            Self::Sha384 => run::<Sha384, _>(reader),
            Self::Sha512 => run::<Sha512, _>(reader),
        }
    }
}

enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

/// Public key and digest taken from a signer's certificate
pub struct SignerCertificate {
    digest: DigestAlgorithm,
    key:    PublicKey,
}

impl SignerCertificate {
    /// Parse a single PEM certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self, VerifyError> {
        let (rest, pem) = parse_x509_pem(pem).map_err(|_| VerifyError::Pem)?;
        if !rest.iter().all(u8::is_ascii_whitespace) {
            return Err(VerifyError::Pem);
        }
        let cert = pem
            .parse_x509()
            .map_err(|e| VerifyError::Certificate(e.to_string()))?;

        let digest =
            DigestAlgorithm::from_signature_oid(&cert.signature_algorithm.algorithm.to_id_string())
                .ok_or(VerifyError::UnsupportedHash)?;

        let spki = cert.public_key().raw;
        let key = if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(spki) {
            PublicKey::P256(key)
        } else if let Ok(key) = p384::ecdsa::VerifyingKey::from_public_key_der(spki) {
            PublicKey::P384(key)
        } else {
            return Err(VerifyError::UnsupportedKey);
        };

        Ok(Self { digest, key })
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest
    }

    /// Check `signature` (DER) over the bytes `data` yields
    pub fn verify<R: Read>(&self, data: R, signature: &[u8]) -> Result<(), VerifyError> {
        check_signature_values(signature)?;
        let digest = self
            .digest
            .digest_reader(data)
            .map_err(VerifyError::Data)?;

        let verified = match &self.key {
            PublicKey::P256(key) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerifyError::MalformedSignature)?;
                key.verify_prehash(&digest, &signature)
            }
            PublicKey::P384(key) => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerifyError::MalformedSignature)?;
                key.verify_prehash(&digest, &signature)
            }
        };
        verified.map_err(|_| VerifyError::Mismatch)
    }
}

/// The signature must be exactly one SEQUENCE of two positive INTEGERs
fn check_signature_values(der: &[u8]) -> Result<(), VerifyError> {
    let (rest, sequence) = parse_der(der).map_err(|_| VerifyError::MalformedSignature)?;
    if !rest.is_empty() {
        return Err(VerifyError::MalformedSignature);
    }
    let values = sequence
        .as_sequence()
        .map_err(|_| VerifyError::MalformedSignature)?;
    if values.len() != 2 {
        return Err(VerifyError::MalformedSignature);
    }

    for value in values {
        match &value.content {
            BerObjectContent::Integer(bytes) => {
                let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
                if negative || bytes.iter().all(|b| *b == 0) {
                    return Err(VerifyError::NonPositive);
                }
            }
            _ => return Err(VerifyError::MalformedSignature),
        }
    }
    Ok(())
}

/// Verify `file` against the DER signature in `sig` using the public key in
/// the PEM certificate `cert`
pub fn verify_files(cert: &Path, sig: &Path, file: &Path) -> Result<(), VerifyError> {
    let read = |path: &Path| {
        fs::read(path).map_err(|source| VerifyError::Read {
            path: path.to_path_buf(),
            source,
        })
    };

    let signer = SignerCertificate::from_pem(&read(cert)?)?;
    let signature = read(sig)?;
    let data = File::open(file).map_err(|source| VerifyError::Read {
        path: file.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Verifying {:?} with {:?} over {:?}",
        file,
        cert,
        signer.digest_algorithm()
    );
    signer.verify(data, &signature)
}
