//! Integration tests for the HTTP gateway against a mock backend.

use std::{sync::Arc, time::Duration};

use agrichat_core::{BackendGateway, ChatError, CredentialProvider, SessionUpdate, TokenCell};
use agrichat_transport::{GatewayConfig, HttpGateway};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn gateway(server: &MockServer, credentials: Arc<TokenCell>) -> HttpGateway {
    let config = GatewayConfig::new(&format!("{}/api/chat", server.uri())).unwrap();
    HttpGateway::new(config, credentials).unwrap()
}

fn session_json(id: i64, title: &str, count: usize) -> serde_json::Value {
    json!({
        "id": id,
        "userId": 1,
        "title": title,
        "isActive": true,
        "messageCount": count,
        "lastMessage": null,
        "createdAt": "2024-09-06T10:15:00.000000",
        "updatedAt": "2024-09-06T10:20:00.000000"
    })
}

#[tokio::test]
async fn test_list_sessions_sends_bearer() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "sessions": [session_json(2, "Soil pH Analysis", 3), session_json(1, "New Chat", 0)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::new("tok-123")));
    let sessions = gw.list_sessions().await.unwrap();

    let ids: Vec<_> = sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(sessions[0].message_count, 3);
}

#[tokio::test]
async fn test_missing_token_short_circuits() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::empty()));
    let err = gw.list_sessions().await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "Token has expired"})))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Arc::new(TokenCell::new("stale"));
    let gw = gateway(&server, Arc::clone(&credentials));
    let err = gw.create_session("New Chat").await.unwrap_err();

    assert!(err.is_auth());
    // Invalidation is the caller's decision, not the gateway's.
    assert!(credentials.bearer_token().is_some());
}

#[tokio::test]
async fn test_send_message_round_trip() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/sessions/5/messages"))
        .and(body_json(json!({
            "message": "What crops should I plant?",
            "message_type": "text"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "message": "Message sent successfully",
            "chat_message": {
                "id": 11,
                "sessionId": 5,
                "userId": 1,
                "message": "What crops should I plant?",
                "response": "Consider maize or sorghum for your loamy soil.",
                "messageType": "text",
                "contextData": null,
                "createdAt": "2024-09-06T10:21:00.000000"
            },
            "bot_response": "Consider maize or sorghum for your loamy soil.",
            "suggestions": ["How much water do they need?", "When should I sow?"],
            "session": session_json(5, "Crop Selection Help", 1)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::new("tok")));
    let receipt = gw
        .send_message(5, "What crops should I plant?")
        .await
        .unwrap();

    assert_eq!(receipt.message.id, 11);
    assert!(!receipt.message.is_awaiting_reply());
    assert_eq!(receipt.suggestions.len(), 2);
    assert_eq!(receipt.session.title.as_deref(), Some("Crop Selection Help"));
}

#[tokio::test]
async fn test_html_response_is_protocol_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions/3/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<!doctype html><html></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::new("tok")));
    let err = gw.load_messages(3).await.unwrap_err();
    assert!(matches!(err, ChatError::Protocol(_)));
    assert!(err.user_message().contains("backend is running"));
}

#[tokio::test]
async fn test_error_bodies_are_classified() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions/404/messages"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "Chat session not found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions"))
        .respond_with(ResponseTemplate::new(503).set_body_raw("upstream down", "text/plain"))
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::new("tok")));

    let err = gw.load_messages(404).await.unwrap_err();
    assert_eq!(
        err,
        ChatError::Application {
            status: 404,
            message: "Chat session not found".to_string()
        }
    );

    let err = gw.list_sessions().await.unwrap_err();
    assert!(matches!(err, ChatError::Transport { status: Some(503), .. }));
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/sessions/8"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::new("tok")));
    gw.delete_session(8).await.unwrap();
}

#[tokio::test]
async fn test_update_and_quick_ask() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/chat/sessions/4"))
        .and(body_json(json!({"title": "Rabi planning"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "session": session_json(4, "Rabi planning", 6)
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat/quick-ask"))
        .and(body_json(json!({"message": "Is my pH too low?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "response": "A pH of 5.2 is acidic; consider liming.",
            "suggestions": ["How much lime?"],
            "message_type": "soil_analysis"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(TokenCell::new("tok")));

    let update = SessionUpdate {
        title: Some("Rabi planning".to_string()),
        is_active: None,
    };
    let session = gw.update_session(4, &update).await.unwrap();
    assert_eq!(session.title.as_deref(), Some("Rabi planning"));

    let answer = gw.quick_ask("Is my pH too low?").await.unwrap();
    assert_eq!(answer.message_type, "soil_analysis");
    assert_eq!(answer.suggestions, vec!["How much lime?".to_string()]);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport() {
    let listener = match std::net::TcpListener::bind("127.0.0.1:0") {
        Ok(l) => l,
        Err(_) => {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
    };
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = GatewayConfig::new(&format!("http://{addr}/api/chat"))
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    let gw = HttpGateway::new(config, Arc::new(TokenCell::new("tok"))).unwrap();

    let err = gw.list_sessions().await.unwrap_err();
    assert!(matches!(err, ChatError::Transport { status: None, .. }));
}
