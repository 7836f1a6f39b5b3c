//! Integration tests for the HTTP dispatcher against a mock backend.
//!
//! Each test starts its own wiremock server, so tests are independent and
//! need no network access.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gamemaker_core::config::BackendConfig;
use gamemaker_core::types::{PhaseId, SessionId};
use gamemaker_session::{
    DispatchError, HttpDispatcher, SessionController, TurnBackend, TurnOutcome, TurnRequest,
};

// =============================================================================
// Helpers
// =============================================================================

fn dispatcher_for(server: &MockServer) -> HttpDispatcher {
    let config = BackendConfig {
        base_url: format!("{}/api", server.uri()),
        ..BackendConfig::default()
    };
    HttpDispatcher::new(config).unwrap()
}

fn turn(text: &str, session: &str) -> TurnRequest {
    TurnRequest {
        message: text.to_string(),
        session_id: SessionId::new(session),
    }
}

// =============================================================================
// Start
// =============================================================================

#[tokio::test]
async fn test_start_session_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/start-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "session_id": "9f8e7d",
            "phase": "identifying",
            "message": "Hi there! What book do you love?"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatcher_for(&server).start_session().await.unwrap();
    assert_eq!(reply.session_id, SessionId::new("9f8e7d"));
    assert_eq!(reply.phase, PhaseId::from("identifying"));
    assert_eq!(reply.greeting, "Hi there! What book do you love?");
}

#[tokio::test]
async fn test_start_session_explicit_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/start-session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "busy"})),
        )
        .mount(&server)
        .await;

    let err = dispatcher_for(&server).start_session().await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Application {
            detail: Some("busy".to_string())
        }
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let server = MockServer::start().await;
    let dispatcher = dispatcher_for(&server);
    drop(server);

    let err = dispatcher.start_session().await.unwrap_err();
    assert!(matches!(err, DispatchError::Transport { .. }));
}

// =============================================================================
// Turns
// =============================================================================

#[tokio::test]
async fn test_send_turn_posts_message_and_session_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .and(body_json(json!({"message": "I love Harry Potter", "session_id": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Harry Potter is magical! Who is your favourite character?",
            "phase": "discussing",
            "agent": "story_analyst",
            "is_complete": false,
            "game_data": null,
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatcher_for(&server)
        .send_turn(&turn("I love Harry Potter", "abc"))
        .await
        .unwrap();
    assert_eq!(reply.phase, Some(PhaseId::from("discussing")));
    assert_eq!(reply.agent.as_deref(), Some("story_analyst"));
    assert!(!reply.complete);
}

#[tokio::test]
async fn test_error_status_with_failure_envelope_is_application() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "Invalid or expired session. Please start a new session."
        })))
        .mount(&server)
        .await;

    let err = dispatcher_for(&server)
        .send_turn(&turn("hello", "stale"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Application { detail: Some(ref d) } if d.starts_with("Invalid or expired")
    ));
}

#[tokio::test]
async fn test_error_status_with_html_body_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let err = dispatcher_for(&server)
        .send_turn(&turn("hello", "abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport { ref reason } if reason.contains("502")));
}

#[tokio::test]
async fn test_malformed_json_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"success\": tru"))
        .mount(&server)
        .await;

    let err = dispatcher_for(&server)
        .send_turn(&turn("hello", "abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport { ref reason } if reason.contains("malformed")));
}

#[tokio::test]
async fn test_timeout_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "message": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = BackendConfig {
        base_url: format!("{}/api", server.uri()),
        request_timeout_secs: 1,
        ..BackendConfig::default()
    };
    let dispatcher = HttpDispatcher::new(config).unwrap();

    let err = dispatcher
        .send_turn(&turn("hello", "abc"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::transport("request timed out"));
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "service": "the-game-maker",
            "version": "2.0"
        })))
        .mount(&server)
        .await;

    let health = dispatcher_for(&server).health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version.as_deref(), Some("2.0"));
}

// =============================================================================
// Controller over HTTP
// =============================================================================

#[tokio::test]
async fn test_controller_end_to_end_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/start-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "session_id": "e2e",
            "phase": "identifying",
            "message": "Hello!"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Here is your game!",
            "phase": "complete",
            "agent": "code_generator",
            "is_complete": true,
            "game_data": {"html_length": 1024}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let controller = SessionController::new(dispatcher_for(&server));
    controller.start().await.unwrap();

    let outcome = controller.submit_turn("Make the game now").await;
    assert!(matches!(outcome, TurnOutcome::Replied(ref r) if r.complete));
    assert_eq!(controller.artifact_path().as_deref(), Some("/game/e2e"));

    // Terminal session: not dispatched, so the `.expect(1)` above holds.
    assert!(controller.submit_turn("again").await.is_rejected());
}
