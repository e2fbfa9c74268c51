use axum::{Router, body::Body, routing::post};
use bytes::Bytes;
use caseworker_client::message::GREETING;
use caseworker_client::{ChatSession, Conversation, Notification, RelayClient, Role, TurnState};
use caseworker_server::{AppState, DemoUpstream, StaticAssets, UpstreamClient, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Relay server in front of `upstream`, returning the relay's chat endpoint.
async fn spawn_relay(upstream: SocketAddr) -> String {
    let state = AppState::new(
        UpstreamClient::new(&format!("http://{}", upstream), true).unwrap(),
        StaticAssets::new("does-not-exist", "index.html"),
        "/chat-stream",
    );
    let relay = spawn(build_router(state)).await;
    format!("http://{}/chat-stream", relay)
}

fn session_for(endpoint: &str) -> ChatSession {
    ChatSession::new(Arc::new(RelayClient::new(endpoint).unwrap()))
}

/// Content of the newest non-greeting assistant message, if any.
fn reply_content(conversation: &Conversation) -> Option<String> {
    conversation
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant && m.content != GREETING)
        .map(|m| m.content.clone())
}

#[tokio::test]
async fn reply_grows_chunk_by_chunk_through_the_relay() {
    let upstream = spawn(
        DemoUpstream::new(vec!["Hel".into(), "lo, ".into(), "world".into()])
            .with_chunk_delay(Duration::from_millis(30))
            .router(),
    )
    .await;
    let endpoint = spawn_relay(upstream).await;
    let mut session = session_for(&endpoint);

    let mut snapshots: Vec<String> = Vec::new();
    let state = session
        .send("hello", CancellationToken::new(), |conversation| {
            if let Some(content) = reply_content(conversation) {
                if snapshots.last() != Some(&content) {
                    snapshots.push(content);
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(state, TurnState::Finalized);
    assert!(!session.conversation().is_processing());

    // Chunks may coalesce in transit, but every visible state is a cumulative
    // prefix, in order, never repeated.
    let allowed = ["", "Hel", "Hello, ", "Hello, world"];
    let positions: Vec<usize> = snapshots
        .iter()
        .map(|s| allowed.iter().position(|a| a == s).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", snapshots);
    assert_eq!(snapshots.first().map(String::as_str), Some(""));
    assert_eq!(snapshots.last().map(String::as_str), Some("Hello, world"));

    let roles: Vec<Role> = session
        .conversation()
        .messages()
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn posts_conversation_history_as_json() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat-stream"))
        .and(body_json(serde_json::json!({ "messages": [GREETING, "I need help"] })))
        .respond_with(ResponseTemplate::new(200).set_body_string("Sure."))
        .expect(1)
        .mount(&upstream)
        .await;

    let mut session = session_for(&format!("{}/chat-stream", upstream.uri()));
    let state = session
        .send("I need help", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(state, TurnState::Finalized);
    assert_eq!(
        session.conversation().messages().last().unwrap().content,
        "Sure."
    );
}

#[tokio::test]
async fn error_status_rolls_back_the_placeholder() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&upstream)
        .await;

    let mut session = session_for(&format!("{}/chat-stream", upstream.uri()));
    let mut saw_placeholder = false;
    let state = session
        .send("hello", CancellationToken::new(), |conversation| {
            if conversation.messages().len() == 3 {
                saw_placeholder = true;
            }
        })
        .await
        .unwrap();

    assert!(saw_placeholder);
    assert_eq!(state, TurnState::Aborted);
    let conversation = session.conversation();
    assert_eq!(conversation.messages().len(), 2);
    assert_eq!(conversation.messages()[1].role, Role::User);
    assert_eq!(conversation.notifications(), &[Notification::response_failed()]);
}

#[tokio::test]
async fn unreachable_relay_rolls_back_and_frees_the_session() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut session = session_for(&format!("http://{}/chat-stream", addr));
    let state = session
        .send("hello", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(state, TurnState::Aborted);
    assert!(!session.conversation().is_processing());
    assert!(
        session
            .conversation()
            .messages()
            .iter()
            .all(|m| m.role != Role::Assistant || m.content == GREETING)
    );
}

#[tokio::test]
async fn upstream_crash_mid_stream_discards_partial_reply() {
    let failing = Router::new().route(
        "/chat-stream",
        post(|| async {
            let stream = async_stream::stream! {
                yield Ok::<Bytes, std::io::Error>(Bytes::from_static(b"Half an ans"));
                tokio::time::sleep(Duration::from_millis(30)).await;
                yield Err(std::io::Error::other("model crashed"));
            };
            Body::from_stream(stream)
        }),
    );
    let endpoint = spawn_relay(spawn(failing).await).await;
    let mut session = session_for(&endpoint);

    let mut partial_seen = false;
    let state = session
        .send("hello", CancellationToken::new(), |conversation| {
            if reply_content(conversation).as_deref() == Some("Half an ans") {
                partial_seen = true;
            }
        })
        .await
        .unwrap();

    assert!(partial_seen);
    assert_eq!(state, TurnState::Aborted);
    assert!(
        session
            .conversation()
            .messages()
            .iter()
            .all(|m| !m.content.contains("Half an ans"))
    );
    assert_eq!(session.conversation().notifications().len(), 1);
}

#[tokio::test]
async fn multibyte_character_split_between_chunks_is_reassembled() {
    let split = Router::new().route(
        "/chat-stream",
        post(|| async {
            let stream = async_stream::stream! {
                // "Señora" with 'ñ' (0xC3 0xB1) split across two frames.
                yield Ok::<Bytes, std::io::Error>(Bytes::from_static(b"Se\xC3"));
                tokio::time::sleep(Duration::from_millis(30)).await;
                yield Ok(Bytes::from_static(b"\xB1ora"));
            };
            Body::from_stream(stream)
        }),
    );
    let endpoint = spawn_relay(spawn(split).await).await;
    let mut session = session_for(&endpoint);

    let mut snapshots = Vec::new();
    session
        .send("hola", CancellationToken::new(), |conversation| {
            if let Some(content) = reply_content(conversation) {
                snapshots.push(content);
            }
        })
        .await
        .unwrap();

    assert!(snapshots.iter().all(|s| !s.contains('\u{FFFD}')));
    assert_eq!(snapshots.last().map(String::as_str), Some("Señora"));
}

#[tokio::test]
async fn cancelling_keeps_what_was_shown() {
    let upstream = spawn(
        DemoUpstream::new(vec!["first part".into(), " second part".into()])
            .with_chunk_delay(Duration::from_millis(300))
            .router(),
    )
    .await;
    let endpoint = spawn_relay(upstream).await;
    let mut session = session_for(&endpoint);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let state = session
        .send("tell me everything", cancel, |conversation| {
            if reply_content(conversation).is_some_and(|c| !c.is_empty()) {
                trigger.cancel();
            }
        })
        .await
        .unwrap();

    assert_eq!(state, TurnState::Cancelled);
    assert!(!session.conversation().is_processing());
    assert_eq!(
        session.conversation().messages().last().unwrap().content,
        "first part"
    );
    assert!(session.conversation().notifications().is_empty());
}

#[tokio::test]
async fn session_accepts_a_new_turn_after_each_outcome() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Back online."))
        .mount(&upstream)
        .await;

    let mut session = session_for(&format!("{}/chat-stream", upstream.uri()));
    let first = session
        .send("hello", CancellationToken::new(), |_| {})
        .await
        .unwrap();
    let second = session
        .send("hello again", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(first, TurnState::Aborted);
    assert_eq!(second, TurnState::Finalized);
    let contents: Vec<&str> = session
        .conversation()
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec![GREETING, "hello", "hello again", "Back online."]);
}
