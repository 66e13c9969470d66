//! PEM loading for the local identity and the trust anchor
//!
//! Both types are built from bytes so callers can inject material directly
//! (tests mint fresh certificates); the `from_files` helpers read the layout
//! written by `enough-gencert`.

use std::{fs, io::BufReader, path::Path, sync::Arc};

use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    RootCertStore,
};
use rustls_pemfile::{certs, private_key};

use crate::error::MaterialError;

fn read_file(path: &Path, what: &'static str) -> Result<Vec<u8>, MaterialError> {
    fs::read(path).map_err(|source| MaterialError::Read {
        what,
        path: path.display().to_string(),
        source,
    })
}

fn parse_certs(pem: &[u8], what: &'static str) -> Result<Vec<CertificateDer<'static>>, MaterialError> {
    let chain = certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| MaterialError::Pem { what, source })?;
    if chain.is_empty() {
        return Err(MaterialError::NoCertificate(what));
    }
    Ok(chain)
}

/// Certificate chain and private key presented to the peer
#[derive(Debug)]
pub struct Identity {
    cert_chain: Vec<CertificateDer<'static>>,
    key:        PrivateKeyDer<'static>,
}

impl Identity {
    /// Parse a PEM certificate chain (leaf first) and a PEM private key.
    ///
    /// The key may be SEC1 (`EC PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`).
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, MaterialError> {
        let cert_chain = parse_certs(cert_pem, "client certificate")?;
        let key = private_key(&mut BufReader::new(key_pem))
            .map_err(|source| MaterialError::Pem {
                what: "client private key",
                source,
            })?
            .ok_or(MaterialError::NoPrivateKey("client private key"))?;

        Ok(Self { cert_chain, key })
    }

    /// Load the identity from a certificate file and a key file
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self, MaterialError> {
        tracing::info!("Loading identity: cert {:?}, key {:?}", cert_path, key_path);
        let cert_pem = read_file(cert_path, "client certificate")?;
        let key_pem = read_file(key_path, "client private key")?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// The certificate chain, leaf first
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// Owned copies of the chain and key, as rustls config builders want them
    pub fn to_parts(&self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.cert_chain.clone(), self.key.clone_key())
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        let (cert_chain, key) = self.to_parts();
        Self { cert_chain, key }
    }
}

/// Certificate authority the peer's certificate must chain to.
///
/// The store starts empty: no system roots are ever consulted.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    roots: Arc<RootCertStore>,
}

impl TrustAnchor {
    /// Parse one or more PEM CA certificates; every one must be a valid anchor
    pub fn from_pem(ca_pem: &[u8]) -> Result<Self, MaterialError> {
        let mut roots = RootCertStore::empty();
        for cert in parse_certs(ca_pem, "CA certificate")? {
            roots.add(cert).map_err(MaterialError::InvalidAnchor)?;
        }
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    /// Load the anchor from a PEM file
    pub fn from_file(ca_path: &Path) -> Result<Self, MaterialError> {
        tracing::info!("Loading trust anchor: {:?}", ca_path);
        let ca_pem = read_file(ca_path, "CA certificate")?;
        Self::from_pem(&ca_pem)
    }

    /// Number of anchors in the store
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether the store holds no anchors (never true for a loaded anchor)
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn root_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }
}
