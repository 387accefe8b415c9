//! End-to-end relay behaviour over loopback sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use relay_proxy::http::{transcode, MessageFramer};
use relay_proxy::observability::Leg;

mod common;

use common::{ok, CollectingSink, Reply};

#[tokio::test]
async fn host_header_is_rewritten_both_ways() {
    let (upstream, mut requests) = common::start_mock_upstream(|request| {
        let host = String::from_utf8_lossy(request.header("Host").unwrap_or_default()).into_owned();
        Reply::Raw(ok(&format!("see http://{host}/next")))
    })
    .await;

    let sink = Arc::new(CollectingSink::default());
    let relay = common::start_relay(&upstream.to_string(), sink.clone(), |_| {}).await;

    let request = format!("GET / HTTP/1.1\r\nHost: {}\r\n\r\n", relay.addr);
    let raw = common::send_and_collect(relay.addr, request.as_bytes()).await;

    let seen = requests.recv().await.unwrap();
    assert_eq!(seen.header("Host"), Some(upstream.to_string().as_bytes()));
    assert_eq!(
        seen.to_bytes(),
        format!("GET / HTTP/1.1\r\nHost: {upstream}\r\n\r\n").into_bytes()
    );

    let (head, body) = common::split_message(&raw);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, format!("see http://{}/next", relay.addr).into_bytes());
    assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].leg, Leg::Sent);
    assert_eq!(records[1].leg, Leg::Received);
    assert_eq!(records[1].request_line.as_deref(), Some("GET / HTTP/1.1"));
}

#[tokio::test]
async fn gzip_response_is_inflated_for_the_sink_only() {
    let (upstream, _requests) = common::start_mock_upstream(|_| {
        let gz = common::gzip(b"hello");
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            gz.len()
        )
        .into_bytes();
        response.extend_from_slice(&gz);
        Reply::Raw(response)
    })
    .await;

    let sink = Arc::new(CollectingSink::default());
    let relay = common::start_relay(&upstream.to_string(), sink.clone(), |_| {}).await;
    let raw = common::send_and_collect(relay.addr, b"GET /greeting HTTP/1.1\r\n\r\n").await;

    let (head, body) = common::split_message(&raw);
    assert!(head.contains("Content-Encoding: gzip"));
    assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));
    assert_eq!(transcode::decompress(&body).unwrap(), b"hello");

    let received = sink
        .records()
        .into_iter()
        .find(|r| r.leg == Leg::Received)
        .unwrap();
    assert_eq!(received.body, b"hello");
}

#[tokio::test]
async fn chunked_response_is_rechunked_as_one_chunk() {
    let (upstream, _requests) = common::start_mock_upstream(|_| {
        Reply::Raw(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"
                .to_vec(),
        )
    })
    .await;

    let sink = Arc::new(CollectingSink::default());
    let relay = common::start_relay(&upstream.to_string(), sink.clone(), |_| {}).await;
    let raw = common::send_and_collect(relay.addr, b"GET / HTTP/1.1\r\n\r\n").await;

    let (head, body) = common::split_message(&raw);
    assert!(head.contains("Transfer-Encoding: chunked"));
    assert!(!head.contains("Content-Length"));
    assert_eq!(body, b"b\r\nhello world\r\n0\r\n\r\n");

    let received = sink.records().into_iter().find(|r| r.leg == Leg::Received).unwrap();
    assert_eq!(received.body, b"hello world");
}

#[tokio::test]
async fn chunked_request_body_is_rewritten_without_corrupting_sizes() {
    let (upstream, mut requests) = common::start_mock_upstream(|_| Reply::Raw(ok("done"))).await;
    let relay = common::start_relay(&upstream.to_string(), Arc::new(CollectingSink::default()), |_| {}).await;

    let payload = format!("callback=http://{}/hook", relay.addr);
    let request = format!(
        "POST /register HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{}\r\n0\r\n\r\n",
        payload.len(),
        payload
    );
    common::send_and_collect(relay.addr, request.as_bytes()).await;

    let seen = requests.recv().await.unwrap();
    let expected = format!("callback=http://{upstream}/hook");
    assert_eq!(
        seen.body,
        format!("{:x}\r\n{}\r\n0\r\n\r\n", expected.len(), expected).into_bytes()
    );
}

#[tokio::test]
async fn keep_alive_serves_several_exchanges_on_one_connection() {
    let (upstream, mut requests) = common::start_mock_upstream(|request| {
        let path = String::from_utf8_lossy(&request.start_line[1]).into_owned();
        Reply::Raw(ok(&path))
    })
    .await;
    let relay = common::start_relay(&upstream.to_string(), Arc::new(CollectingSink::default()), |_| {}).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    let mut framer = MessageFramer::new(Duration::from_secs(5), false);

    for path in ["/first", "/second"] {
        client
            .write_all(format!("GET {path} HTTP/1.1\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let response = common::read_response(&mut client, &mut framer).await.unwrap();
        assert_eq!(response.body, path.as_bytes());
    }

    assert_eq!(requests.recv().await.unwrap().start_line_str(), "GET /first HTTP/1.1");
    assert_eq!(requests.recv().await.unwrap().start_line_str(), "GET /second HTTP/1.1");
}

#[tokio::test]
async fn head_request_gets_headers_only() {
    let (upstream, _requests) = common::start_mock_upstream(|_| {
        Reply::Raw(b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\n\r\n".to_vec())
    })
    .await;
    let relay = common::start_relay(&upstream.to_string(), Arc::new(CollectingSink::default()), |_| {}).await;

    let raw = common::send_and_collect(relay.addr, b"HEAD /big HTTP/1.1\r\n\r\n").await;
    assert_eq!(raw, b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\n\r\n");
}

#[tokio::test]
async fn unequal_address_lengths_keep_content_length_in_sync() {
    let (upstream, mut requests) = common::start_mock_upstream(|request| {
        let host = String::from_utf8_lossy(request.header("Host").unwrap_or_default()).into_owned();
        Reply::Raw(ok(&format!("see http://{host}/next")))
    })
    .await;

    let sink = Arc::new(CollectingSink::default());
    let relay = common::start_relay(&upstream.to_string(), sink.clone(), |c| {
        c.listener.local_address = "relay.local:1".into();
    })
    .await;

    let gz = common::gzip(b"cb=http://relay.local:1/x");
    let mut request = format!(
        "POST /hook HTTP/1.1\r\nHost: relay.local:1\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        gz.len()
    )
    .into_bytes();
    request.extend_from_slice(&gz);
    let raw = common::send_and_collect(relay.addr, &request).await;

    let seen = requests.recv().await.unwrap();
    assert_eq!(seen.header("Host"), Some(upstream.to_string().as_bytes()));
    let declared: usize = String::from_utf8_lossy(seen.header("Content-Length").unwrap())
        .parse()
        .unwrap();
    assert_eq!(declared, seen.body.len());
    assert_eq!(
        transcode::decompress(&seen.body).unwrap(),
        format!("cb=http://{upstream}/x").into_bytes()
    );

    let (head, body) = common::split_message(&raw);
    assert_eq!(body, b"see http://relay.local:1/next");
    assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));
}
