use std::net::SocketAddr;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use volley_http::HttpConnector;
use volley_traits::{Connector, RequestDescriptor, Session};

/// Read one HTTP/1.1 request (headers + Content-Length body) from `stream`.
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return text;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Serve exactly one request with a canned reply; yields the raw request.
async fn serve_once(status_line: &'static str, body: &'static str) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });
    (addr, handle)
}

fn descriptor(addr: SocketAddr) -> RequestDescriptor {
    let mut headers = IndexMap::new();
    headers.insert("Host".to_string(), "api.example.com".to_string());
    headers.insert("Content-Length".to_string(), "999".to_string());
    headers.insert("X-Client".to_string(), "volley-test".to_string());
    RequestDescriptor {
        url: format!("http://{addr}/apply?lang=en"),
        headers,
        body: serde_json::json!({ "is_retry": true }),
    }
}

#[tokio::test]
async fn posts_template_and_returns_reply() {
    let (addr, server) = serve_once("200 OK", r#"{"code":0}"#).await;
    let session = HttpConnector::default().open(&descriptor(addr)).unwrap();

    let reply = session.send().await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"code":0}"#);
    assert!(reply.headers_after.is_some());

    let request = server.await.unwrap();
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /apply?lang=en HTTP/1.1"), "{request}");
    assert!(lower.contains("host: api.example.com"), "{request}");
    assert!(lower.contains("x-client: volley-test"), "{request}");
    assert!(lower.contains("content-type: application/json"), "{request}");
    // Template Content-Length is replaced by the real one.
    assert!(!lower.contains("content-length: 999"), "{request}");
    assert!(request.ends_with(r#"{"is_retry":true}"#), "{request}");
}

#[tokio::test]
async fn non_success_status_is_still_a_reply() {
    let (addr, server) = serve_once("503 Service Unavailable", "busy").await;
    let session = HttpConnector::default().open(&descriptor(addr)).unwrap();

    let reply = session.send().await.unwrap();
    assert_eq!(reply.status, 503);
    assert_eq!(reply.body, "busy");
    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let session = HttpConnector::new(Duration::from_millis(100))
        .open(&descriptor(addr))
        .unwrap();
    let err = session.send().await.expect_err("must time out");
    let timed_out = err
        .downcast_ref::<reqwest::Error>()
        .is_some_and(reqwest::Error::is_timeout);
    assert!(timed_out, "unexpected error: {err}");
}

#[tokio::test]
async fn refused_connection_is_a_send_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let session = HttpConnector::default().open(&descriptor(addr)).unwrap();
    assert!(session.send().await.is_err());
}

#[tokio::test]
async fn header_time_excludes_slow_body() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        let body = r#"{"code":0}"#;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        stream.write_all(body.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
    });

    let session = HttpConnector::default().open(&descriptor(addr)).unwrap();
    let started = std::time::Instant::now();
    let reply = session.send().await.unwrap();
    let total = started.elapsed();

    assert_eq!(reply.body, r#"{"code":0}"#);
    assert!(total >= Duration::from_millis(400));
    let headers_after = reply.headers_after.expect("transport reports header time");
    assert!(headers_after < Duration::from_millis(300), "{headers_after:?}");
    server.await.unwrap();
}
