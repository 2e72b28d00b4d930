use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use scrawl_core::net::messages::{ClientMessage, ServerMessage};
use scrawl_core::net::protocol::{decode_server_message, encode_client_message};

use scrawl_server::build_app;
use scrawl_server::config::{GameConfig, ServerConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default configuration.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with custom game pacing.
    pub async fn with_game(game: GameConfig) -> Self {
        Self::from_config(ServerConfig {
            game,
            ..ServerConfig::default()
        })
        .await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn ws_url(&self, room: &str, username: &str) -> String {
        format!(
            "ws://{}/ws/{}?username={}&w=700&h=400",
            self.addr, room, username
        )
    }

    pub fn ws_url_without_dims(&self, room: &str, username: &str) -> String {
        format!("ws://{}/ws/{}?username={}", self.addr, room, username)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage as a text frame.
pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Send a raw text frame (for malformed-input tests).
pub async fn ws_send_raw(stream: &mut WsStream, raw: &str) {
    stream
        .send(Message::Text(raw.to_string().into()))
        .await
        .unwrap();
}

/// Read the next ServerMessage (5s timeout).
pub async fn ws_recv(stream: &mut WsStream) -> ServerMessage {
    ws_recv_until(stream, |_| true).await
}

/// Read messages until one matches, discarding the rest (5s timeout).
/// Useful for skipping interleaved `timer_update` frames.
pub async fn ws_recv_until<F>(stream: &mut WsStream, mut matches: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = decode_server_message(text.as_str())
                        .unwrap_or_else(|e| panic!("bad server message {text:?}: {e}"));
                    if matches(&msg) {
                        return msg;
                    }
                },
                Some(Ok(Message::Close(_))) | None => panic!("WebSocket closed while waiting"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {e}"),
            }
        }
    })
    .await
    .expect("Timed out waiting for matching message")
}

/// Try to read a matching ServerMessage, returning None on timeout.
pub async fn ws_try_recv_until<F>(
    stream: &mut WsStream,
    timeout_ms: u64,
    mut matches: F,
) -> Option<ServerMessage>
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(msg) = decode_server_message(text.as_str())
                        && matches(&msg)
                    {
                        return msg;
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .ok()
}

/// Assert the server closes this connection without sending anything first.
pub async fn ws_expect_closed(stream: &mut WsStream) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => panic!("unexpected message: {text}"),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for close")
}

/// Join a room and return the stream plus this player's server-assigned id,
/// read back from the welcome snapshot.
pub async fn join(server: &TestServer, room: &str, username: &str) -> (WsStream, String) {
    let mut stream = ws_connect(&server.ws_url(room, username)).await;
    let welcome = ws_recv_until(&mut stream, |m| matches!(m, ServerMessage::WelcomeMsg(_))).await;
    let ServerMessage::WelcomeMsg(data) = welcome else {
        unreachable!()
    };
    // Players are in join order; the newest entry with our name is us.
    let player_id = data
        .game_state
        .players
        .iter()
        .rev()
        .find(|p| p.username == username)
        .map(|p| p.id.clone())
        .expect("joining player missing from welcome snapshot");
    (stream, player_id)
}

/// Minimal HTTP GET against the test server, returning (status, body).
pub async fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("malformed status line");
    let body = response
        .split("\r\n\r\n")
        .nth(1)
        .unwrap_or_default()
        .to_string();
    (status, body)
}
