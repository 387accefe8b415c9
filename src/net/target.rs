//! Connection to the upstream target.
//!
//! # Responsibilities
//! - Resolve the configured target `host[:port]`
//! - Open the TCP connection under the connect deadline
//! - Optionally wrap it in a TLS client session (SNI = target host)

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::TargetConfig;
use crate::http::EndpointAddress;
use crate::net::tls::{build_connector, TlsConfigError};
use crate::resilience::{with_deadline, DeadlineExceeded};

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Errors establishing the target connection. All are session-fatal.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("cannot resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("{address} resolved to no addresses")]
    NoAddresses { address: String },
    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("TLS handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("{0:?} is not a valid TLS server name")]
    ServerName(String),
    #[error("connecting to {address}: {source}")]
    Timeout {
        address: String,
        #[source]
        source: DeadlineExceeded,
    },
    #[error(transparent)]
    Tls(#[from] TlsConfigError),
}

/// Stream to the target, plain or TLS.
#[derive(Debug)]
pub enum TargetStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for TargetStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TargetStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            TargetStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TargetStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            TargetStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            TargetStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TargetStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            TargetStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TargetStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            TargetStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens session-scoped connections to the configured target.
#[derive(Clone)]
pub struct TargetConnector {
    display: String,
    host: String,
    port: u16,
    tls: Option<TlsConnector>,
    connect_timeout: Duration,
}

impl std::fmt::Debug for TargetConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl TargetConnector {
    /// Prepare a connector; builds the TLS client config once when needed.
    pub fn new(config: &TargetConfig, connect_timeout: Duration) -> Result<Self, TargetError> {
        let address = EndpointAddress::from(config.address.as_str());
        let default_port = if config.tls { DEFAULT_HTTPS_PORT } else { DEFAULT_HTTP_PORT };
        let port = address.port().unwrap_or(default_port);
        let host = String::from_utf8_lossy(address.host())
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let tls = if config.tls {
            Some(build_connector(config.ca_file.as_deref())?)
        } else {
            None
        };

        Ok(Self {
            display: format!("{}:{}", address_host_for_display(&host), port),
            host,
            port,
            tls,
            connect_timeout,
        })
    }

    /// `host:port` actually dialled.
    pub fn address(&self) -> &str {
        &self.display
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Resolve, connect and (optionally) handshake under the connect deadline.
    pub async fn connect(&self) -> Result<TargetStream, TargetError> {
        with_deadline(self.connect_timeout, self.connect_inner())
            .await
            .map_err(|source| TargetError::Timeout {
                address: self.display.clone(),
                source,
            })?
    }

    async fn connect_inner(&self) -> Result<TargetStream, TargetError> {
        let stream = self.connect_tcp().await?;
        let Some(connector) = &self.tls else {
            return Ok(TargetStream::Plain(stream));
        };

        let server_name =
            ServerName::try_from(self.host.clone()).map_err(|_| TargetError::ServerName(self.host.clone()))?;
        let tls = connector
            .connect(server_name, stream)
            .await
            .map_err(|source| TargetError::Handshake {
                address: self.display.clone(),
                source,
            })?;
        tracing::debug!(target_addr = %self.display, "TLS session established");
        Ok(TargetStream::Tls(Box::new(tls)))
    }

    async fn connect_tcp(&self) -> Result<TcpStream, TargetError> {
        let candidates = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|source| TargetError::Resolve {
                address: self.display.clone(),
                source,
            })?;

        let mut last_error = None;
        for addr in candidates {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
                    }
                    tracing::debug!(target_addr = %self.display, resolved = %addr, "Target connected");
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(resolved = %addr, error = %e, "Target address refused");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(TargetError::Connect {
                address: self.display.clone(),
                source,
            }),
            None => Err(TargetError::NoAddresses {
                address: self.display.clone(),
            }),
        }
    }
}

fn address_host_for_display(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}
