use std::io::{self, Read, Write};

use rustls::{
    pki_types::CertificateDer, ClientConnection, Connection, ProtocolVersion,
    ServerConnection, SupportedCipherSuite,
};

/// Synchronous TLS wrapper over a blocking transport.
///
/// The transport is owned, so dropping the stream closes the socket on every
/// path; [`TlsStream::close`] additionally sends `close_notify` first.
pub struct TlsStream<S: Read + Write> {
    socket: S,
    tls:    Connection,
}

impl<S: Read + Write> TlsStream<S> {
    /// Create a new TLS stream from a server connection and complete the
    /// handshake
    pub fn from_server(socket: S, tls: ServerConnection) -> io::Result<Self> {
        let mut stream = Self {
            socket,
            tls: Connection::Server(tls),
        };
        stream.complete_handshake()?;
        Ok(stream)
    }

    /// Create a new TLS stream from a client connection and complete the
    /// handshake
    pub fn from_client(socket: S, tls: ClientConnection) -> io::Result<Self> {
        let mut stream = Self {
            socket,
            tls: Connection::Client(tls),
        };
        stream.complete_handshake()?;
        Ok(stream)
    }

    /// Complete the TLS handshake.
    ///
    /// rustls failures come back as `InvalidData` wrapping the `rustls::Error`;
    /// the peer hanging up mid-handshake is `UnexpectedEof`.
    fn complete_handshake(&mut self) -> io::Result<()> {
        while self.tls.is_handshaking() {
            while self.tls.wants_write() {
                self.tls.write_tls(&mut self.socket)?;
            }
            if !self.tls.is_handshaking() {
                break;
            }
            if self.tls.wants_read() {
                if self.tls.read_tls(&mut self.socket)? == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed the connection during the handshake",
                    ));
                }
                if let Err(e) = self.tls.process_new_packets() {
                    // Best effort: let the peer see our alert before we hang up
                    let _ = self.tls.write_tls(&mut self.socket);
                    return Err(io::Error::new(io::ErrorKind::InvalidData, e));
                }
            }
        }
        // Flush whatever the final flight left queued (e.g. client Finished)
        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        self.socket.flush()
    }

    /// Read up to and including the first `\n`, at most `limit` bytes.
    ///
    /// Returns what was read; a result not ending in `\n` means the peer
    /// closed the stream first or the line hit the limit.
    pub fn read_line(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() < limit {
            match self.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }
        Ok(line)
    }

    /// Send `close_notify` and release the transport
    pub fn close(mut self) -> io::Result<()> {
        self.tls.send_close_notify();
        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        self.socket.flush()
    }

    /// Negotiated protocol version, once the handshake is done
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.tls.protocol_version()
    }

    /// Negotiated cipher suite, once the handshake is done
    pub fn negotiated_cipher_suite(&self) -> Option<SupportedCipherSuite> {
        self.tls.negotiated_cipher_suite()
    }

    /// Certificates the peer presented, leaf first
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.tls.peer_certificates()
    }
}

impl<S: Read + Write> Read for TlsStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            // Try to read buffered plaintext first
            match self.tls.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            while self.tls.wants_write() {
                self.tls.write_tls(&mut self.socket)?;
            }

            // A zero-length read marks EOF inside rustls, so the next
            // reader() call reports it instead of blocking again.
            if self.tls.read_tls(&mut self.socket)? > 0 {
                self.tls
                    .process_new_packets()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }
        }
    }
}

impl<S: Read + Write> Write for TlsStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.tls.writer().write(buf)?;

        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Ensure any buffered plaintext is passed to the TLS session
        self.tls.writer().flush()?;

        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        // Finally, flush the underlying socket
        self.socket.flush()
    }
}
