//! Alert delivery through [`DiscordChannel`] against a canned HTTP server.

use std::time::Duration;

use assert_matches::assert_matches;
use ewatch_core::{AlertChannel, DeliveryError};
use ewatch_discord::{DiscordApi, DiscordChannel};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

const CHANNEL_ID: u64 = 42;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serve exactly one HTTP response and hand back the raw request.
async fn spawn_http(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/api/v10", listener.local_addr().unwrap());
    let (request_tx, request_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = request_tx.send(request);

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    (base, request_rx)
}

/// Read headers plus a `content-length` body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn channel(api_url: String, ready: bool) -> (DiscordChannel, watch::Sender<bool>) {
    let (ready_tx, ready_rx) = watch::channel(ready);
    let api = DiscordApi::new(api_url, "bot-token".into()).unwrap();
    (DiscordChannel::new(api, CHANNEL_ID, ready_rx), ready_tx)
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deliver_posts_message_with_bot_token() {
    let (base, request_rx) = spawn_http("200 OK", r#"{"id":"1001","channel_id":"42"}"#).await;
    let (channel, _ready_tx) = channel(base, true);

    channel.deliver("🚨 ALERT: test").await.unwrap();

    let request = request_rx.await.unwrap();
    assert!(request.starts_with("POST /api/v10/channels/42/messages HTTP/1.1"));
    assert!(request.to_lowercase().contains("authorization: bot bot-token"));
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["content"], "🚨 ALERT: test");
}

#[tokio::test]
async fn success_with_undecodable_body_counts_as_delivered() {
    let (base, request_rx) = spawn_http("200 OK", "<html>ok</html>").await;
    let (channel, _ready_tx) = channel(base, true);

    assert_eq!(channel.deliver("🚨 ALERT: test").await, Ok(()));
    let request = request_rx.await.unwrap();
    assert!(request.starts_with("POST /api/v10/channels/42/messages HTTP/1.1"));
}

#[tokio::test]
async fn missing_channel_maps_to_channel_not_found() {
    let (base, _request_rx) =
        spawn_http("404 Not Found", r#"{"message":"Unknown Channel","code":10003}"#).await;
    let (channel, _ready_tx) = channel(base, true);

    let err = channel.deliver("hello").await.unwrap_err();
    assert_eq!(err, DeliveryError::ChannelNotFound(CHANNEL_ID));
}

#[tokio::test]
async fn forbidden_maps_to_rejected_with_body() {
    let (base, _request_rx) =
        spawn_http("403 Forbidden", r#"{"message":"Missing Access","code":50001}"#).await;
    let (channel, _ready_tx) = channel(base, true);

    let err = channel.deliver("hello").await.unwrap_err();
    assert_matches!(err, DeliveryError::Rejected { status: 403, body } if body.contains("Missing Access"));
}

#[tokio::test]
async fn unreachable_api_maps_to_transport_error() {
    let (channel, _ready_tx) = channel("http://127.0.0.1:1/api/v10".into(), true);
    let err = channel.deliver("hello").await.unwrap_err();
    assert_matches!(err, DeliveryError::Transport(_));
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deliver_before_ready_is_refused() {
    let (channel, _ready_tx) = channel("http://127.0.0.1:1/api/v10".into(), false);
    assert!(!channel.is_ready());
    assert_eq!(channel.deliver("hello").await, Err(DeliveryError::NotReady));
}

#[tokio::test]
async fn deliver_after_close_is_refused() {
    let (channel, _ready_tx) = channel("http://127.0.0.1:1/api/v10".into(), true);
    assert!(channel.is_ready());
    channel.close().await;
    assert!(!channel.is_ready());
    assert_eq!(channel.deliver("hello").await, Err(DeliveryError::Closed));
}

#[tokio::test]
async fn wait_ready_resolves_when_gateway_becomes_ready() {
    let (channel, ready_tx) = channel("http://127.0.0.1:1/api/v10".into(), false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ready_tx.send_replace(true);
        // Keep the sender alive until the waiter has observed the change.
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    tokio::time::timeout(Duration::from_secs(5), channel.wait_ready())
        .await
        .expect("readiness should arrive")
        .unwrap();
    assert!(channel.is_ready());
}

#[tokio::test]
async fn wait_ready_fails_when_gateway_goes_away() {
    let (channel, ready_tx) = channel("http://127.0.0.1:1/api/v10".into(), false);
    drop(ready_tx);
    assert_eq!(channel.wait_ready().await, Err(DeliveryError::Closed));
}
