//! Coordinator transport: TCP, optionally through a local SOCKS proxy,
//! optionally wrapped in TLS.
//!
//! Coordinators present self-signed certificates; trust comes from the
//! session hash chain, not web PKI, so the TLS layer authenticates nothing
//! and exists for confidentiality and traffic shape. The same connector is
//! reused for covert connections so they exit through the same proxy as
//! the main channel.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// A connected byte stream to a coordinator endpoint.
pub enum FusionStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    /// In-memory stream for harnesses and tests.
    Mem(tokio::io::DuplexStream),
}

impl AsyncRead for FusionStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FusionStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            FusionStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            FusionStream::Mem(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for FusionStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            FusionStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            FusionStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            FusionStream::Mem(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FusionStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            FusionStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            FusionStream::Mem(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FusionStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            FusionStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            FusionStream::Mem(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Dial policy shared by the main channel and covert connections.
#[derive(Clone, Debug)]
pub struct Connector {
    pub proxy: Option<SocketAddr>,
    pub tls: bool,
}

impl Connector {
    pub fn new(proxy: Option<SocketAddr>, tls: bool) -> Self {
        Self { proxy, tls }
    }

    pub async fn connect(&self, host: &str, port: u16) -> io::Result<FusionStream> {
        let tcp = match self.proxy {
            Some(proxy) => {
                let mut stream = TcpStream::connect(proxy).await?;
                socks5_connect(&mut stream, host, port).await?;
                stream
            }
            None => TcpStream::connect((host, port)).await?,
        };
        tcp.set_nodelay(true)?;

        if self.tls {
            let connector = TlsConnector::from(tls_config());
            let name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid TLS name"))?;
            let stream = connector.connect(name, tcp).await?;
            Ok(FusionStream::Tls(Box::new(stream)))
        } else {
            Ok(FusionStream::Tcp(tcp))
        }
    }
}

/// Minimal SOCKS5 CONNECT (RFC 1928), no authentication, domain addressing.
pub(crate) async fn socks5_connect(
    stream: &mut TcpStream,
    host: &str,
    port: u16,
) -> io::Result<()> {
    if host.len() > 255 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "hostname too long"));
    }

    stream.write_all(&[0x05, 0x01, 0x00]).await?;
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await?;
    if method != [0x05, 0x00] {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "SOCKS5 method negotiation failed",
        ));
    }

    let mut request = vec![0x05, 0x01, 0x00, 0x03, host.len() as u8];
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x00 {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("SOCKS5 connect rejected: {:#04x}", reply[1]),
        ));
    }
    // Consume the bound address and port.
    let addr_len = match reply[3] {
        0x01 => 4,
        0x04 => 16,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("SOCKS5 address type {:#04x}", other),
            ));
        }
    };
    let mut rest = vec![0u8; addr_len + 2];
    stream.read_exact(&mut rest).await?;
    Ok(())
}

fn tls_config() -> Arc<rustls::ClientConfig> {
    static CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let config = rustls::ClientConfig::builder_with_provider(provider.clone())
                .with_safe_default_protocol_versions()
                .expect("TLS provider rejects default protocol versions")
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(CoordinatorCertVerifier { provider }))
                .with_no_client_auth();
            Arc::new(config)
        })
        .clone()
}

/// Accepts the coordinator's self-signed certificate while still verifying
/// handshake signatures against whatever key the certificate carries.
#[derive(Debug)]
struct CoordinatorCertVerifier {
    provider: Arc<rustls::crypto::CryptoProvider>,
}

impl rustls::client::danger::ServerCertVerifier for CoordinatorCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
