use std::{io::Write, net::TcpStream, sync::Arc};

use enough_common::{
    config::{ClientCertPath, DEFAULT_ADDR, EXPECTED_REPLY, GREETING, MAX_REPLY_LEN},
    error::{Error, MaterialError, PolicyError, Result},
    material::{Identity, TrustAnchor},
    policy::TlsPolicy,
    tls_stream::TlsStream,
    verifier::ChainDepthVerifier,
};
use rustls::{
    client::Resumption, pki_types::ServerName, ClientConfig as RustlsClientConfig,
    ClientConnection,
};

/// Configuration for the greeting client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` to dial
    pub addr:           String,
    /// Name the peer certificate must be issued for. Unset, the host of
    /// `addr` is sent as SNI and any certificate chaining to the anchor is
    /// accepted.
    pub server_name:    Option<String>,
    /// Certificate chain and key presented to the peer
    pub identity:       Identity,
    /// CA the peer certificate must chain to
    pub trust_anchor:   TrustAnchor,
    /// Versions, suites and verification rules
    pub policy:         TlsPolicy,
    /// Line written after the handshake
    pub greeting:       String,
    /// Line the peer must answer with
    pub expected_reply: String,
}

impl ClientConfig {
    /// Creates a client configuration around injected trust material, with
    /// the default address, policy and greeting
    pub fn new(identity: Identity, trust_anchor: TrustAnchor) -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            server_name: None,
            identity,
            trust_anchor,
            policy: TlsPolicy::default(),
            greeting: GREETING.to_string(),
            expected_reply: EXPECTED_REPLY.to_string(),
        }
    }

    /// Creates a client configuration from PEM files on disk
    pub fn from_cert_path(paths: &ClientCertPath) -> Result<Self> {
        let identity = Identity::from_files(&paths.cert_path, &paths.key_path)?;
        let trust_anchor = TrustAnchor::from_file(&paths.ca_path)?;
        Ok(Self::new(identity, trust_anchor))
    }

    /// Set the address to dial
    pub fn with_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.addr = addr.into();
        self
    }

    /// Require the peer certificate to be issued for `server_name`
    pub fn with_server_name<S: Into<String>>(mut self, server_name: S) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// Set the TLS policy
    pub fn with_policy(mut self, policy: TlsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the greeting line
    pub fn with_greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Set the expected reply line
    pub fn with_expected_reply<S: Into<String>>(mut self, reply: S) -> Self {
        self.expected_reply = reply.into();
        self
    }

    fn resolved_server_name(&self) -> String {
        self.server_name
            .clone()
            .unwrap_or_else(|| host_of(&self.addr).to_string())
    }
}

/// Host part of a `host:port` address; brackets around IPv6 literals removed
fn host_of(addr: &str) -> &str {
    let host = match addr.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            host
        }
        _ => addr,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

/// One-shot mutual-TLS client: dial, handshake, greet, check the reply.
pub struct SecureClient {
    tls_config:     Arc<RustlsClientConfig>,
    server_name:    ServerName<'static>,
    addr:           String,
    greeting:       String,
    expected_reply: String,
}

impl SecureClient {
    /// Validate the policy and build the TLS configuration.
    ///
    /// Everything that can be checked without the network is checked here.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.policy.validate()?;

        let name = config.resolved_server_name();
        let server_name =
            ServerName::try_from(name.clone()).map_err(|_| PolicyError::InvalidServerName(name))?;

        let provider = config.policy.crypto_provider()?;
        let verifier = ChainDepthVerifier::new(
            &config.trust_anchor,
            Arc::clone(&provider),
            config.policy.max_chain_depth,
        )
        .map_err(Error::Config)?
        .check_server_name(config.server_name.is_some());

        let (cert_chain, key) = config.identity.to_parts();
        let mut tls_config = RustlsClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&config.policy.protocol_versions())
            .map_err(Error::Config)?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_client_auth_cert(cert_chain, key)
            .map_err(|e| Error::TrustMaterial(MaterialError::InvalidIdentity(e)))?;

        if !config.policy.session_tickets {
            tls_config.resumption = Resumption::disabled();
        }

        tracing::debug!(
            "TLS policy: versions {}..={}, suites {:?}, max chain depth {}",
            config.policy.min_version,
            config.policy.max_version,
            config.policy.cipher_suites,
            config.policy.max_chain_depth
        );

        Ok(Self {
            tls_config: Arc::new(tls_config),
            server_name,
            addr: config.addr,
            greeting: config.greeting,
            expected_reply: config.expected_reply,
        })
    }

    /// Dial the peer and complete the TLS handshake
    pub fn connect(&self) -> Result<TlsStream<TcpStream>> {
        tracing::info!("Connecting to {}", self.addr);
        let socket = TcpStream::connect(&self.addr).map_err(|source| Error::Transport {
            addr: self.addr.clone(),
            source,
        })?;

        tracing::debug!("TCP connected, starting TLS handshake as {:?}", self.server_name);
        let conn = ClientConnection::new(Arc::clone(&self.tls_config), self.server_name.clone())
            .map_err(Error::Config)?;
        let stream = TlsStream::from_client(socket, conn).map_err(Error::from_handshake)?;

        tracing::info!(
            "✓ Secure connection established ({:?}, {:?})",
            stream.protocol_version(),
            stream.negotiated_cipher_suite().map(|s| s.suite())
        );
        Ok(stream)
    }

    /// Send the greeting, read one line and compare it with the expected
    /// reply. The stream is closed whatever the outcome.
    pub fn exchange(&self, mut stream: TlsStream<TcpStream>) -> Result<()> {
        stream
            .write_all(self.greeting.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(Error::Stream)?;
        tracing::debug!("Sent greeting {:?}", self.greeting);

        let line = stream.read_line(MAX_REPLY_LEN).map_err(Error::Stream)?;
        if !line.ends_with(b"\n") && line.len() < MAX_REPLY_LEN {
            return Err(Error::ClosedBeforeReply {
                received: line.len(),
            });
        }

        let reply = String::from_utf8_lossy(&line);
        if reply != self.expected_reply {
            return Err(Error::UnexpectedReply {
                expected: self.expected_reply.clone(),
                actual:   reply.into_owned(),
            });
        }
        tracing::debug!("Received reply {:?}", reply);

        if let Err(e) = stream.close() {
            tracing::debug!("close_notify not delivered: {}", e);
        }
        Ok(())
    }

    /// Connect, greet and verify the reply in one go
    pub fn run(&self) -> Result<()> {
        let stream = self.connect()?;
        self.exchange(stream)
    }

    /// Address this client dials
    pub fn addr(&self) -> &str {
        &self.addr
    }
}
