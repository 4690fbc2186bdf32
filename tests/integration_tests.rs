use std::time::Duration;

use echo_chat::{
    ChatClient, ChatClientConfig, ChatMessage, ChatSession, ClientError, ConnectionState,
    InboundEvent, MessageHistory, SubmitError, Transport,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{Receiver, UnboundedReceiver};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/* Hilfsfunktion: lokaler Echo-Server, genau eine Verbindung ---------------- */
async fn spawn_echo_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_text() || msg.is_binary() {
                if ws.send(msg).await.is_err() {
                    break;
                }
            }
            // close frames are answered by tungstenite
        }
    });

    (url, handle)
}

/* Server that greets with the sentinel byte, then hangs up -------------- */
async fn spawn_closing_server(reason: &'static str) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Binary(vec![0xCB])).await.unwrap();
        ws.send(Message::Text("welcome".into())).await.unwrap();
        ws.close(Some(CloseFrame { code: CloseCode::Normal, reason: reason.into() }))
            .await
            .unwrap();
        // drain until the client answered the close
        while let Some(Ok(_)) = ws.next().await {}
    });

    (url, handle)
}

async fn next(feed: &mut UnboundedReceiver<ChatMessage>) -> ChatMessage {
    tokio::time::timeout(Duration::from_secs(3), feed.recv())
        .await
        .expect("feed timeout")
        .expect("feed closed")
}

async fn next_event(events: &mut Receiver<InboundEvent>) -> InboundEvent {
    tokio::time::timeout(Duration::from_secs(3), events.recv())
        .await
        .expect("event timeout")
        .expect("event channel closed")
}

/* ------------------------------------------------------------------------ */
/* 1. Vollständige Sitzung gegen den Echo-Server                            */
/* ------------------------------------------------------------------------ */
#[tokio::test]
async fn test_echo_session() {
    init_logger();
    let (url, srv) = spawn_echo_server().await;

    let (history, mut feed) = MessageHistory::with_feed();
    let session = ChatSession::connect(&ChatClientConfig::new(url), history)
        .await
        .expect("connect");
    assert_eq!(next(&mut feed).await, ChatMessage::received("Connected to server."));
    assert!(session.transport().is_alive());
    assert!(!session.transport().is_closing());

    // ───── Text hin und zurück ───────────────────────────────────────────
    session.submit("hello").unwrap();
    assert_eq!(next(&mut feed).await, ChatMessage::sent("hello"));
    assert_eq!(next(&mut feed).await, ChatMessage::received("hello"));

    // ───── Sonder-Byte ───────────────────────────────────────────────────
    session.submit("203 = 0xcb").unwrap();
    assert_eq!(next(&mut feed).await, ChatMessage::sent("203 = 0xcb"));
    assert_eq!(next(&mut feed).await, ChatMessage::received("Special server message received!"));

    session.submit("1 = 0x01").unwrap();
    assert_eq!(next(&mut feed).await, ChatMessage::sent("1 = 0x01"));
    assert_eq!(next(&mut feed).await, ChatMessage::received("Received binary data: 01"));

    // ───── Schließen ─────────────────────────────────────────────────────
    session.close(1000, "done").unwrap();
    let late = session.submit("too late").unwrap_err();
    assert!(matches!(late, SubmitError::NotQueued { source: ClientError::Closing, .. }));

    assert_eq!(next(&mut feed).await, ChatMessage::received("Server closing connection: done"));
    assert_eq!(next(&mut feed).await, ChatMessage::received("Connection closed: done"));

    let state = tokio::time::timeout(Duration::from_secs(3), session.wait_terminal())
        .await
        .expect("terminal timeout");
    assert_eq!(state, ConnectionState::Closed);

    srv.await.unwrap();
}

/* ------------------------------------------------------------------------ */
/* 2. Server beendet die Verbindung                                         */
/* ------------------------------------------------------------------------ */
#[tokio::test]
async fn test_server_initiated_close() {
    init_logger();
    let (url, srv) = spawn_closing_server("bye").await;

    let (history, mut feed) = MessageHistory::with_feed();
    let session = ChatSession::connect(&ChatClientConfig::new(url), history)
        .await
        .expect("connect");

    assert_eq!(next(&mut feed).await, ChatMessage::received("Connected to server."));
    assert_eq!(next(&mut feed).await, ChatMessage::received("Special server message received!"));
    assert_eq!(next(&mut feed).await, ChatMessage::received("welcome"));
    assert_eq!(next(&mut feed).await, ChatMessage::received("Server closing connection: bye"));

    // nothing goes out once the peer's close frame was read
    let late = session.submit("late").unwrap_err();
    assert!(matches!(late, SubmitError::NotQueued { source: ClientError::Closing, .. }));

    assert_eq!(next(&mut feed).await, ChatMessage::received("Connection closed: bye"));
    assert_eq!(session.wait_terminal().await, ConnectionState::Closed);
    assert_eq!(session.history().len(), 5);
    assert!(session.history().snapshot().iter().all(|m| !m.text().starts_with("Connection Error")));

    srv.await.unwrap();
}

/* ------------------------------------------------------------------------ */
/* 3. Rohe Events vom Client                                                */
/* ------------------------------------------------------------------------ */
#[tokio::test]
async fn test_client_event_order() {
    init_logger();
    let (url, srv) = spawn_closing_server("server shutdown").await;

    let (client, mut events) = ChatClient::connect(&ChatClientConfig::new(url))
        .await
        .expect("connect");
    assert!(client.url().starts_with("ws://127.0.0.1:"));

    assert_eq!(next_event(&mut events).await, InboundEvent::Open);
    assert!(matches!(next_event(&mut events).await, InboundEvent::Binary(b) if b[..] == [0xCB]));
    assert_eq!(next_event(&mut events).await, InboundEvent::Text("welcome".into()));
    assert_eq!(
        next_event(&mut events).await,
        InboundEvent::Closing { code: 1000, reason: "server shutdown".into() }
    );

    // tungstenite answers the close itself; ours is refused
    assert!(client.is_closing());
    assert!(matches!(client.close(1000, ""), Err(ClientError::Closing)));
    assert!(matches!(client.send_text("after close"), Err(ClientError::Closing)));
    assert_eq!(
        next_event(&mut events).await,
        InboundEvent::Closed { code: 1000, reason: "server shutdown".into() }
    );

    // exactly one terminal event, then the channel ends
    let end = tokio::time::timeout(Duration::from_secs(3), events.recv()).await;
    assert_eq!(end.expect("channel not closed"), None);

    srv.await.unwrap();
}

/* ------------------------------------------------------------------------ */
/* 4. Server liest nicht mehr: Schreib-Timeout                              */
/* ------------------------------------------------------------------------ */
const LARGE_FRAME: usize = 1 << 20;
const LARGE_FRAMES: usize = 64;

/* Server that finishes the handshake and then never reads ---------------- */
async fn spawn_stalled_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    (url, handle)
}

#[tokio::test]
async fn test_write_timeout_ends_with_one_failure() {
    init_logger();
    let (url, srv) = spawn_stalled_server().await;

    let cfg = ChatClientConfig::new(url).with_write_timeout(Duration::from_millis(200));
    let (client, mut events) = ChatClient::connect(&cfg).await.expect("connect");
    assert_eq!(next_event(&mut events).await, InboundEvent::Open);

    let payload = bytes::Bytes::from(vec![0x42u8; LARGE_FRAME]);
    for _ in 0..LARGE_FRAMES {
        client.send_binary(payload.clone()).unwrap();
    }

    assert_eq!(
        next_event(&mut events).await,
        InboundEvent::Failure(ClientError::WriteTimeout.to_string())
    );
    let end = tokio::time::timeout(Duration::from_secs(3), events.recv()).await;
    assert_eq!(end.expect("channel not closed"), None);

    srv.abort();
}

#[tokio::test]
async fn test_write_timeout_is_recorded_once() {
    init_logger();
    let (url, srv) = spawn_stalled_server().await;

    let cfg = ChatClientConfig::new(url).with_write_timeout(Duration::from_millis(200));
    let history = MessageHistory::new();
    let session = ChatSession::connect(&cfg, history.clone()).await.expect("connect");

    let line = "x".repeat(LARGE_FRAME);
    for _ in 0..LARGE_FRAMES {
        session.submit(&line).unwrap();
    }

    let state = tokio::time::timeout(Duration::from_secs(5), session.wait_terminal())
        .await
        .expect("terminal timeout");
    assert_eq!(state, ConnectionState::Failed);

    let messages = history.snapshot();
    let errors: Vec<_> =
        messages.iter().filter(|m| m.text().starts_with("Connection Error:")).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].text(), "Connection Error: Timeout writing to socket");
    assert_eq!(messages.last(), Some(errors[0]));

    srv.abort();
}

/* ------------------------------------------------------------------------ */
/* 5. Verbindungsfehler                                                     */
/* ------------------------------------------------------------------------ */
#[tokio::test]
async fn test_connect_refused_is_recorded() {
    init_logger();
    // freien Port sichern und direkt wieder freigeben
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let history = MessageHistory::new();
    let result = ChatSession::connect(&ChatClientConfig::new(url), history.clone()).await;
    assert!(result.is_err());

    let messages = history.snapshot();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text().starts_with("Connection Error: "));
}

#[tokio::test]
async fn test_invalid_url() {
    init_logger();
    let history = MessageHistory::new();
    let result = ChatSession::connect(&ChatClientConfig::new("not a url"), history.clone()).await;

    assert!(matches!(result, Err(ClientError::InvalidUrl { .. })));
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_connect_timeout() {
    init_logger();
    // 192.0.2.0/24 = TEST-NET-1: either refused or never answers
    let cfg = ChatClientConfig::new("ws://192.0.2.1:65000")
        .with_connect_timeout(Duration::from_millis(300));

    let res = tokio::time::timeout(Duration::from_secs(3), ChatClient::connect(&cfg)).await;
    assert!(matches!(res, Ok(Err(_))), "expected a connect error");
}
