//! enough certificate toolkit
//!
//! Mints the small PKI the enough client expects: one self-signed EC P-256
//! certificate authority per service, a server certificate named after the
//! service and any number of numbered client certificates, all signed
//! directly by the CA. [`verify`] checks detached ECDSA signatures against a
//! certificate's public key.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use enough_gencert::Authority;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ca = Authority::new("TestCerts")?;
//! ca.issued().write_pair(Path::new("certs"), "ca")?;
//! ca.create_server_cert(&["localhost".into()])?
//!     .write_pair(Path::new("certs"), "server")?;
//! ca.create_client_cert(0)?.write_pair(Path::new("certs"), "client0")?;
//! # Ok(())
//! # }
//! ```

use std::{fs, io::Write, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use enough_common::config::{cert_file_name, key_file_name};
use p256::pkcs8::{EncodePrivateKey, LineEnding};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};
use rustls_pemfile::Item;
use time::{Duration, OffsetDateTime};

pub mod verify;

/// Organization written into every subject
pub const ORGANIZATION: &str = "Just Enough";

/// Longest accepted service name
pub const MAX_SERVICE_NAME_LEN: usize = 140;

const CA_SUFFIX: &str = " CA";
const VALIDITY_DAYS: i64 = 3650;

/// Reject empty or oversized service names
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Service name must not be empty");
    }
    if name.len() > MAX_SERVICE_NAME_LEN {
        bail!(
            "Service name is too long ({} characters, at most {} allowed)",
            name.len(),
            MAX_SERVICE_NAME_LEN
        );
    }
    Ok(())
}

/// Subject, SANs and a ten year validity window starting a few minutes ago
fn base_params(common_name: &str, sans: Vec<String>) -> Result<CertificateParams> {
    let mut params = CertificateParams::new(sans).context("Invalid subject alternative name")?;

    let mut name = DistinguishedName::new();
    name.push(DnType::OrganizationName, ORGANIZATION);
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;

    let now = OffsetDateTime::now_utc();
    params.not_before = now - Duration::minutes(5);
    params.not_after = now + Duration::days(VALIDITY_DAYS);
    Ok(params)
}

fn ca_params(common_name: &str) -> Result<CertificateParams> {
    let mut params = base_params(common_name, Vec::new())?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    Ok(params)
}

fn leaf_params(
    common_name: &str,
    sans: Vec<String>,
    usage: ExtendedKeyUsagePurpose,
) -> Result<CertificateParams> {
    let mut params = base_params(common_name, sans)?;
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![usage];
    Ok(params)
}

fn generate_key() -> Result<KeyPair> {
    KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).context("Failed to generate ECDSA key")
}

/// Load an EC P-256 private key written either as SEC1 (`EC PRIVATE KEY`)
/// or PKCS#8 (`PRIVATE KEY`)
fn parse_ec_key(key_pem: &str) -> Result<KeyPair> {
    let mut reader = key_pem.as_bytes();
    loop {
        match rustls_pemfile::read_one(&mut reader).context("Invalid PEM data")? {
            Some(Item::Pkcs8Key(_)) => return KeyPair::from_pem(key_pem).map_err(Into::into),
            Some(Item::Sec1Key(sec1)) => {
                let secret = p256::SecretKey::from_sec1_der(sec1.secret_sec1_der())
                    .map_err(|e| anyhow!("Not a P-256 EC private key: {e}"))?;
                let pkcs8 = secret
                    .to_pkcs8_pem(LineEnding::LF)
                    .map_err(|e| anyhow!("Failed to re-encode EC private key: {e}"))?;
                return KeyPair::from_pem(&pkcs8).map_err(Into::into);
            }
            Some(_) => continue,
            None => bail!("No EC private key found"),
        }
    }
}

fn dn_text(value: &DnValue) -> Option<&str> {
    match value {
        DnValue::Utf8String(s) => Some(s.as_str()),
        DnValue::PrintableString(s) => Some(s.as_str()),
        _ => None,
    }
}

/// A PEM certificate with its PEM private key
#[derive(Debug, Clone)]
pub struct IssuedCert {
    pub cert_pem: String,
    pub key_pem:  String,
}

impl IssuedCert {
    fn new(cert: &Certificate, key: &KeyPair) -> Self {
        Self {
            cert_pem: cert.pem(),
            key_pem:  key.serialize_pem(),
        }
    }

    /// Write `<stub>_cert.pem` and `<stub>_key.pem` into `dir`.
    ///
    /// The key file is created with mode 0600 on unix.
    pub fn write_pair(&self, dir: &Path, stub: &str) -> Result<()> {
        let cert_path = dir.join(cert_file_name(stub));
        fs::write(&cert_path, &self.cert_pem)
            .with_context(|| format!("Failed to write {cert_path:?}"))?;

        let key_path = dir.join(key_file_name(stub));
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut key_file = options
            .open(&key_path)
            .with_context(|| format!("Failed to open {key_path:?} for writing"))?;
        key_file
            .write_all(self.key_pem.as_bytes())
            .with_context(|| format!("Failed to write {key_path:?}"))?;

        tracing::info!("wrote {:?}, {:?}", cert_path, key_path);
        Ok(())
    }
}

/// Self-signed server certificate not backed by any CA
pub fn self_signed(service: &str, hosts: &[String]) -> Result<IssuedCert> {
    validate_service_name(service)?;
    let key = generate_key()?;
    let cert = leaf_params(service, hosts.to_vec(), ExtendedKeyUsagePurpose::ServerAuth)?
        .self_signed(&key)
        .context("Failed to self-sign certificate")?;
    Ok(IssuedCert::new(&cert, &key))
}

/// Certificate authority for one service
pub struct Authority {
    service:  String,
    // Issuer view used for signing; for a reloaded CA this is a re-signed
    // copy with the same subject and key as `cert_pem`.
    cert:     Certificate,
    key:      KeyPair,
    cert_pem: String,
}

impl Authority {
    /// Create a self-signed CA with subject `O=Just Enough, CN=<service> CA`
    pub fn new(service: &str) -> Result<Self> {
        validate_service_name(service)?;
        let key = generate_key()?;
        let cert = ca_params(&format!("{service}{CA_SUFFIX}"))?
            .self_signed(&key)
            .context("Failed to self-sign CA certificate")?;
        tracing::debug!("Created CA for service {:?}", service);

        Ok(Self {
            service: service.to_string(),
            cert_pem: cert.pem(),
            cert,
            key,
        })
    }

    /// Reload a CA from its PEM certificate and PEM key (SEC1 or PKCS#8).
    ///
    /// The service name is the subject common name minus its ` CA` suffix.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let key = parse_ec_key(key_pem).context("Failed to parse CA private key")?;
        let params = CertificateParams::from_ca_cert_pem(cert_pem)
            .context("Failed to parse CA certificate")?;

        let common_name = params
            .distinguished_name
            .get(&DnType::CommonName)
            .and_then(dn_text)
            .ok_or_else(|| anyhow!("CA certificate has no common name"))?;
        let service = common_name
            .strip_suffix(CA_SUFFIX)
            .ok_or_else(|| anyhow!("CA common name {common_name:?} does not end in {CA_SUFFIX:?}"))?
            .to_string();
        validate_service_name(&service)?;

        let cert = params
            .self_signed(&key)
            .context("Failed to prepare CA for signing")?;

        Ok(Self {
            service,
            cert,
            key,
            cert_pem: cert_pem.to_string(),
        })
    }

    /// Read [`Authority::from_pem`] input from files
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = fs::read_to_string(cert_path)
            .with_context(|| format!("Failed to read ca-cert {cert_path:?}"))?;
        let key_pem = fs::read_to_string(key_path)
            .with_context(|| format!("Failed to read ca-key {key_path:?}"))?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Service this CA was minted for
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The CA certificate as distributed to peers (the trust anchor)
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// The CA certificate and key as a writable pair
    pub fn issued(&self) -> IssuedCert {
        IssuedCert {
            cert_pem: self.cert_pem.clone(),
            key_pem:  self.key.serialize_pem(),
        }
    }

    fn sign(&self, params: CertificateParams) -> Result<IssuedCert> {
        let key = generate_key()?;
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .context("Failed to create certificate")?;
        Ok(IssuedCert::new(&cert, &key))
    }

    /// Server certificate `CN=<service>` with one subject alternative name
    /// per entry of `hosts` (DNS names or IP addresses). Without hosts the
    /// certificate carries the common name only.
    pub fn create_server_cert(&self, hosts: &[String]) -> Result<IssuedCert> {
        self.sign(leaf_params(
            &self.service,
            hosts.to_vec(),
            ExtendedKeyUsagePurpose::ServerAuth,
        )?)
    }

    /// Client certificate `CN=Client<n>`
    pub fn create_client_cert(&self, n: u32) -> Result<IssuedCert> {
        self.sign(leaf_params(
            &format!("Client{n}"),
            Vec::new(),
            ExtendedKeyUsagePurpose::ClientAuth,
        )?)
    }

    /// Subordinate CA for `service`, signed by this CA
    pub fn create_intermediate(&self, service: &str) -> Result<Authority> {
        validate_service_name(service)?;
        let key = generate_key()?;
        let cert = ca_params(&format!("{service}{CA_SUFFIX}"))?
            .signed_by(&key, &self.cert, &self.key)
            .context("Failed to create intermediate CA certificate")?;

        Ok(Authority {
            service: service.to_string(),
            cert_pem: cert.pem(),
            cert,
            key,
        })
    }
}
