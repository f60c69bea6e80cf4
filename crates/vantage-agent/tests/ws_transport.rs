//! End-to-end tests over a real loopback WebSocket server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use vantage_agent::{AgentClient, ClientConfig, ConnectionState};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Route worker logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Boot an agent-shaped echo server.
///
/// Every connection gets a `CONNECTION_ESTABLISHED` handshake; each
/// `REQUEST` is answered with a `RESPONSE` echoing the message text. When
/// `drop_first` is set, the first connection is closed right after the
/// handshake to exercise reconnection.
async fn boot_server(drop_first: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connection_count = Arc::new(AtomicUsize::new(0));

    let _ = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let n = connection_count.fetch_add(1, Ordering::SeqCst);
            let _ = tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                let hello = json!({
                    "type": "CONNECTION_ESTABLISHED",
                    "id": "srv_hello",
                    "payload": { "sessionId": format!("sess_{n}") },
                    "timestamp": 1,
                });
                ws.send(Message::Text(hello.to_string().into()))
                    .await
                    .unwrap();

                if drop_first && n == 0 {
                    let _ = ws.close(None).await;
                    return;
                }

                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    match frame["type"].as_str() {
                        Some("REQUEST") => {
                            let message = frame["payload"]["message"].as_str().unwrap_or("");
                            let reply = json!({
                                "type": "RESPONSE",
                                "id": frame["id"],
                                "payload": { "content": format!("echo: {message}") },
                                "timestamp": 2,
                            });
                            ws.send(Message::Text(reply.to_string().into()))
                                .await
                                .unwrap();
                        }
                        Some("PING") => {
                            let pong = json!({
                                "type": "PONG",
                                "id": frame["id"],
                                "payload": {},
                                "timestamp": 2,
                            });
                            ws.send(Message::Text(pong.to_string().into()))
                                .await
                                .unwrap();
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn connect_exchange_disconnect_over_real_websocket() {
    init_tracing();
    let url = boot_server(false).await;
    let client = AgentClient::new(url, ClientConfig::default());

    timeout(TIMEOUT, client.connect()).await.unwrap().unwrap();
    assert!(client.is_connected());

    let reply = timeout(TIMEOUT, client.send("gm", Vec::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.content, "echo: gm");

    client.disconnect();
    // The disconnect command is processed asynchronously by the worker.
    timeout(TIMEOUT, async {
        while client.connection_state() != ConnectionState::Disconnected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn recovers_after_server_drops_the_connection() {
    init_tracing();
    let url = boot_server(true).await;
    let config = ClientConfig {
        reconnect_delay_ms: 50,
        max_reconnect_delay_ms: 200,
        ..ClientConfig::default()
    };
    let client = AgentClient::new(url, config);
    let mut changes = client.on_connection_change();

    timeout(TIMEOUT, client.connect()).await.unwrap().unwrap();

    // The server kills the first connection; the client must come back on
    // its own and serve the exchange over the second one.
    timeout(TIMEOUT, async {
        loop {
            let change = changes.recv().await.unwrap();
            if change.current == ConnectionState::Reconnecting {
                break;
            }
        }
    })
    .await
    .unwrap();

    timeout(TIMEOUT, async {
        loop {
            let change = changes.recv().await.unwrap();
            if change.current == ConnectionState::Connected {
                break;
            }
        }
    })
    .await
    .unwrap();

    let reply = timeout(TIMEOUT, client.send("still here", Vec::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.content, "echo: still here");
}

#[tokio::test]
async fn concurrent_exchanges_over_one_socket() {
    init_tracing();
    let url = boot_server(false).await;
    let client = Arc::new(AgentClient::new(url, ClientConfig::default()));
    timeout(TIMEOUT, client.connect()).await.unwrap().unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.send(format!("msg-{n}"), Vec::new()).await
        }));
    }
    for (n, handle) in handles.into_iter().enumerate() {
        let reply = timeout(TIMEOUT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(reply.content, format!("echo: msg-{n}"));
    }
}
