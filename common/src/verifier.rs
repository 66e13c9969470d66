use std::sync::Arc;

use rustls::{
    client::{
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        WebPkiServerVerifier,
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
    CertificateError, DigitallySignedStruct, SignatureScheme,
};

use crate::material::TrustAnchor;

/// Server certificate verifier that bounds the chain length.
///
/// Chain building is left to webpki; it is only offered the first
/// `max_depth - 1` intermediates the peer sent, so no path with more signer
/// hops than `max_depth` between the leaf and the anchor can be built.
/// With a depth of 1 the leaf must be signed by the anchor itself.
///
/// The peer certificate is only matched against the server name when
/// [`ChainDepthVerifier::check_server_name`] asks for it; by default a chain
/// to the anchor within the depth limit is sufficient.
#[derive(Debug)]
pub struct ChainDepthVerifier {
    inner:      Arc<WebPkiServerVerifier>,
    max_depth:  usize,
    check_name: bool,
}

impl ChainDepthVerifier {
    pub fn new(
        anchor: &TrustAnchor,
        provider: Arc<CryptoProvider>,
        max_depth: usize,
    ) -> Result<Self, rustls::Error> {
        let inner = WebPkiServerVerifier::builder_with_provider(anchor.root_store(), provider)
            .build()
            .map_err(|e| rustls::Error::General(e.to_string()))?;
        Ok(Self {
            inner,
            max_depth,
            check_name: false,
        })
    }

    /// Also require the peer certificate to be issued for the server name
    pub fn check_server_name(mut self, check: bool) -> Self {
        self.check_name = check;
        self
    }
}

fn is_name_mismatch(err: &rustls::Error) -> bool {
    matches!(
        err,
        rustls::Error::InvalidCertificate(
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
        )
    )
}

impl ServerCertVerifier for ChainDepthVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let allowed = self.max_depth.saturating_sub(1).min(intermediates.len());
        if allowed < intermediates.len() {
            tracing::debug!(
                "Ignoring {} of {} intermediates (max chain depth {})",
                intermediates.len() - allowed,
                intermediates.len(),
                self.max_depth
            );
        }
        // webpki checks the name only after the chain, validity and usage
        // have passed, so a name mismatch here means everything else held
        match self.inner.verify_server_cert(
            end_entity,
            &intermediates[..allowed],
            server_name,
            ocsp_response,
            now,
        ) {
            Err(e) if !self.check_name && is_name_mismatch(&e) => {
                tracing::debug!(
                    "Peer certificate not issued for {:?}, name check disabled",
                    server_name
                );
                Ok(ServerCertVerified::assertion())
            }
            result => result,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
