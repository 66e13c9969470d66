//! One-shot acknowledging peer and freshly minted certificates for the
//! handshake tests.

use std::{
    io::{self, Write},
    net::{SocketAddr, TcpListener},
    sync::Arc,
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use enough_client::{ClientConfig, Identity, TlsPolicy, TrustAnchor};
use enough_common::{config::MAX_REPLY_LEN, TlsStream};
use enough_gencert::{Authority, IssuedCert};
use rustls::{
    server::{NoServerSessionStorage, WebPkiClientVerifier},
    ServerConfig, ServerConnection,
};

pub const SERVICE: &str = "TestCerts";

pub fn hosts() -> Vec<String> {
    vec!["localhost".into(), "127.0.0.1".into()]
}

/// CA plus one server and one client certificate signed by it
pub struct Pki {
    pub ca:     Authority,
    pub server: IssuedCert,
    pub client: IssuedCert,
}

impl Pki {
    pub fn new() -> Self {
        let ca = Authority::new(SERVICE).expect("CA");
        let server = ca.create_server_cert(&hosts()).expect("server cert");
        let client = ca.create_client_cert(0).expect("client cert");
        Self { ca, server, client }
    }

    /// Client configuration trusting this CA and presenting `Client0`
    pub fn client_config(&self, addr: SocketAddr) -> ClientConfig {
        let identity = Identity::from_pem(
            self.client.cert_pem.as_bytes(),
            self.client.key_pem.as_bytes(),
        )
        .expect("client identity");
        let anchor = TrustAnchor::from_pem(self.ca.cert_pem().as_bytes()).expect("anchor");
        ClientConfig::new(identity, anchor).with_addr(addr.to_string())
    }
}

/// How the peer behaves
pub struct PeerOptions {
    /// Server certificate chain, leaf first
    pub chain_pem:     String,
    pub key_pem:       String,
    /// CA client certificates must chain to
    pub client_ca_pem: String,
    pub policy:        TlsPolicy,
    /// Line sent after the greeting arrives; `None` closes without replying
    pub reply:         Option<&'static [u8]>,
}

impl PeerOptions {
    pub fn for_pki(pki: &Pki) -> Self {
        Self {
            chain_pem:     pki.server.cert_pem.clone(),
            key_pem:       pki.server.key_pem.clone(),
            client_ca_pem: pki.ca.cert_pem().to_string(),
            policy:        TlsPolicy::default(),
            reply:         Some(b"ACK\n"),
        }
    }
}

pub struct Peer {
    pub addr: SocketAddr,
    handle:   JoinHandle<Result<Vec<u8>>>,
}

impl Peer {
    /// What the peer read from the client, or why its side failed
    pub fn join(self) -> Result<Vec<u8>> {
        self.handle.join().expect("peer thread panicked")
    }
}

fn server_config(opts: &PeerOptions) -> Result<ServerConfig> {
    let provider = opts.policy.crypto_provider()?;
    let roots = TrustAnchor::from_pem(opts.client_ca_pem.as_bytes())?.root_store();
    let verifier = WebPkiClientVerifier::builder_with_provider(roots, Arc::clone(&provider))
        .build()
        .context("client verifier")?;

    let (chain, key) =
        Identity::from_pem(opts.chain_pem.as_bytes(), opts.key_pem.as_bytes())?.to_parts();
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&opts.policy.protocol_versions())?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)?;
    config.session_storage = Arc::new(NoServerSessionStorage {});
    config.send_tls13_tickets = 0;
    Ok(config)
}

/// Accept exactly one connection on an ephemeral port
pub fn spawn_peer(opts: PeerOptions) -> Peer {
    let config = Arc::new(server_config(&opts).expect("peer TLS config"));
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || -> Result<Vec<u8>> {
        let (socket, _) = listener.accept()?;
        let conn = ServerConnection::new(config)?;
        let mut stream = TlsStream::from_server(socket, conn).context("peer handshake")?;

        let greeting = stream.read_line(MAX_REPLY_LEN)?;
        if let Some(reply) = opts.reply {
            stream.write_all(reply)?;
        }
        // The client may already have hung up after reading the reply
        let _ = stream.close();
        Ok(greeting)
    });

    Peer { addr, handle }
}

/// Raw TCP peer that answers the client hello with fixed bytes, then waits for
/// the client to hang up
pub fn spawn_scripted_peer(script: Vec<u8>) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let Ok((mut socket, _)) = listener.accept() else {
            return;
        };
        if socket.write_all(&script).is_ok() {
            let _ = io::copy(&mut socket, &mut io::sink());
        }
    });
    (addr, handle)
}

fn handshake_message(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut msg = vec![msg_type, (len >> 16) as u8, (len >> 8) as u8, len as u8];
    msg.extend_from_slice(body);
    msg
}

/// A TLS 1.2 server flight for ECDHE-ECDSA-AES128-GCM-SHA256 whose
/// Certificate message lists no certificates
pub fn flight_without_certificate() -> Vec<u8> {
    let mut server_hello = vec![0x03, 0x03];
    server_hello.extend_from_slice(&[0x42; 32]); // random
    server_hello.push(0); // empty session id
    server_hello.extend_from_slice(&[0xc0, 0x2b]); // cipher suite
    server_hello.push(0); // null compression
    server_hello.extend_from_slice(&[0x00, 0x00]); // no extensions

    let certificate = [0x00, 0x00, 0x00];

    let mut key_exchange = vec![0x03, 0x00, 0x17, 65, 0x04]; // named curve secp256r1
    key_exchange.extend_from_slice(&[0x01; 64]);
    key_exchange.extend_from_slice(&[0x04, 0x03, 0x00, 0x40]); // ecdsa_secp256r1_sha256
    key_exchange.extend_from_slice(&[0x02; 64]);

    let mut messages = handshake_message(2, &server_hello);
    messages.extend(handshake_message(11, &certificate));
    messages.extend(handshake_message(12, &key_exchange));
    messages.extend(handshake_message(14, &[]));

    let len = messages.len();
    let mut record = vec![0x16, 0x03, 0x03, (len >> 8) as u8, len as u8];
    record.extend(messages);
    record
}
