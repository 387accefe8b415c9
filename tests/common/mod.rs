//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use relay_proxy::config::RelayConfig;
use relay_proxy::http::{HttpMessage, MessageFramer, MessageKind, ReadOutcome};
use relay_proxy::lifecycle::{serve, Shutdown};
use relay_proxy::net::Listener;
use relay_proxy::observability::{Leg, TrafficRecord, TrafficSink};
use relay_proxy::relay::RelayServer;

/// What the mock upstream does after reading a request.
pub enum Reply {
    Raw(Vec<u8>),
    /// Close the connection without answering.
    Close,
}

/// Start a keep-alive mock upstream on an ephemeral port.
///
/// Every request it reads is forwarded on the returned channel, as framed.
pub async fn start_mock_upstream<F>(reply: F) -> (SocketAddr, mpsc::UnboundedReceiver<HttpMessage>)
where
    F: Fn(&HttpMessage) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let reply = Arc::new(reply);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let tx = tx.clone();
                    let reply = reply.clone();
                    tokio::spawn(async move {
                        let mut framer = MessageFramer::new(Duration::from_secs(5), false);
                        while let Ok(ReadOutcome::Message(request)) =
                            framer.read_message(&mut socket, MessageKind::Request).await
                        {
                            let answer = reply(&request);
                            let _ = tx.send(request);
                            match answer {
                                Reply::Raw(bytes) => {
                                    if socket.write_all(&bytes).await.is_err() {
                                        break;
                                    }
                                }
                                Reply::Close => break,
                            }
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

/// `200 OK` with a fixed-length text body.
pub fn ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A record as seen by the sink, owned.
#[derive(Debug, Clone)]
pub struct Captured {
    pub leg: Leg,
    pub start_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub request_line: Option<String>,
}

/// Sink keeping every record for later assertions.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Captured>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<Captured> {
        self.records.lock().unwrap().clone()
    }
}

impl TrafficSink for CollectingSink {
    fn record(&self, record: &TrafficRecord<'_>) {
        let headers = record
            .headers
            .iter()
            .map(|h| {
                (
                    String::from_utf8_lossy(&h.name).into_owned(),
                    String::from_utf8_lossy(&h.value).into_owned(),
                )
            })
            .collect();
        self.records.lock().unwrap().push(Captured {
            leg: record.leg,
            start_line: record.start_line_str(),
            headers,
            body: record.body.to_vec(),
            request_line: record.request_line.map(str::to_string),
        });
    }
}

/// A relay running in the background.
pub struct RelayHandle {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub server: RelayServer,
    /// Resolves to the number of sessions abandoned at drain.
    pub task: JoinHandle<u64>,
}

/// Start a relay on an ephemeral port that advertises its real address.
pub async fn start_relay<F>(target: &str, sink: Arc<dyn TrafficSink>, tweak: F) -> RelayHandle
where
    F: FnOnce(&mut RelayConfig),
{
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();

    let mut config = RelayConfig::default();
    config.listener.local_address = addr.to_string();
    config.target.address = target.to_string();
    config.timeouts.connect_secs = 5;
    config.timeouts.read_secs = 5;
    tweak(&mut config);

    let server = RelayServer::new(&config, sink).unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections).unwrap();
    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();

    let running = server.clone();
    let task = tokio::spawn(async move { serve(&running, listener, stop, Duration::from_secs(5)).await.unwrap() });

    RelayHandle {
        addr,
        shutdown,
        server,
        task,
    }
}

/// Send raw bytes, half-close, and collect everything until the relay closes.
pub async fn send_and_collect(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut out = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut out))
        .await
        .expect("relay did not close the connection");
    match read {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {}
        Err(e) => panic!("client read failed: {e}"),
    }
    out
}

/// Read one framed response off a kept-alive client connection.
pub async fn read_response(stream: &mut TcpStream, framer: &mut MessageFramer) -> Option<HttpMessage> {
    match framer
        .read_message(stream, MessageKind::Response { to_head: false })
        .await
        .unwrap()
    {
        ReadOutcome::Message(message) => Some(message),
        ReadOutcome::EndOfStream | ReadOutcome::Timeout => None,
    }
}

/// Split wire bytes into header block text and body.
pub fn split_message(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator")
        + 4;
    (String::from_utf8_lossy(&raw[..end]).into_owned(), raw[end..].to_vec())
}
