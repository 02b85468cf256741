use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use movie_store::auth::{CredentialStore, MemoryCredentialStore};
use movie_store::config::ClientConfig;
use movie_store::context::AppContext;
use movie_store::model::{AuthPhase, ContentStore, SessionStore};
use movie_store::transport::{HttpTransport, Transport, TransportError};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: format!("{}/api", server.uri()),
        timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

fn user_json() -> serde_json::Value {
    json!({"id": "1", "username": "测试用户", "email": "test@example.com"})
}

#[tokio::test]
async fn test_bearer_header_attached_when_credential_present() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "1", "name": "剧情"}])))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Arc::new(MemoryCredentialStore::with_token("abc"));
    let transport = HttpTransport::new(&config_for(&server), credentials).unwrap();

    let body = transport.get("/categories").await.unwrap();
    assert_eq!(body, json!([{"id": "1", "name": "剧情"}]));
}

#[tokio::test]
async fn test_error_status_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid credentials"})))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config_for(&server), Arc::new(MemoryCredentialStore::new())).unwrap();
    let err = transport
        .post("/login", json!({"email": "test@example.com", "password": "wrong"}))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Status {
            path: "/login".into(),
            status: 401,
            message: Some("invalid credentials".into()),
        }
    );
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let config = ClientConfig {
        base_url: "http://127.0.0.1:9/api".into(),
        timeout: Duration::from_millis(500),
        ..ClientConfig::default()
    };
    let transport = HttpTransport::new(&config, Arc::new(MemoryCredentialStore::new())).unwrap();

    let err = transport.get("/movies").await.unwrap_err();
    assert!(matches!(err, TransportError::Network { .. }));
}

#[tokio::test]
async fn test_wrong_password_leaves_session_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({"email": "test@example.com", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid credentials"})))
        .mount(&server)
        .await;

    let credentials = Arc::new(MemoryCredentialStore::new());
    let transport = Arc::new(HttpTransport::new(&config_for(&server), credentials.clone()).unwrap());
    let session = SessionStore::new(transport, credentials.clone());

    assert!(!session.login("test@example.com", "wrong").await);
    assert_eq!(session.login_error().as_deref(), Some("invalid credentials"));
    assert_eq!(credentials.load().unwrap(), None);
    assert_eq!(session.phase(), AuthPhase::Anonymous);
}

#[tokio::test]
async fn test_login_then_restore_session_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-1", "user": user_json()})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let credentials: Arc<MemoryCredentialStore> = Arc::new(MemoryCredentialStore::new());
    let transport = Arc::new(HttpTransport::new(&config_for(&server), credentials.clone()).unwrap());

    let session = SessionStore::new(transport.clone(), credentials.clone());
    assert!(session.login("test@example.com", "secret").await);
    assert_eq!(credentials.load().unwrap().as_deref(), Some("tok-1"));

    // A fresh context over the same credential picks the session back up
    let mut ctx = AppContext::start(transport, credentials);
    ctx.wait_for_session().await;
    assert_eq!(ctx.session.phase(), AuthPhase::Authenticated);
    assert_eq!(ctx.session.user().unwrap().email, "test@example.com");
}

#[tokio::test]
async fn test_expired_credential_is_erased_on_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let credentials = Arc::new(MemoryCredentialStore::with_token("expired"));
    let transport = Arc::new(HttpTransport::new(&config_for(&server), credentials.clone()).unwrap());

    let mut ctx = AppContext::start(transport, credentials.clone());
    ctx.wait_for_session().await;

    assert_eq!(ctx.session.phase(), AuthPhase::Anonymous);
    assert!(!ctx.session.is_logged_in());
    assert_eq!(credentials.load().unwrap(), None);
}

#[tokio::test]
async fn test_rate_movie_posts_then_refreshes_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ratings"))
        .and(body_json(json!({"movieId": "1", "rating": 4.5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ratings/history"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::new(&config_for(&server), Arc::new(MemoryCredentialStore::new())).unwrap());
    let content = ContentStore::new(transport);

    assert!(content.rate_movie("1", 4.5).await);
    assert_eq!(content.error().as_deref(), Some("获取评分历史失败"));
    assert!(content.rating_history().is_empty());
}

#[tokio::test]
async fn test_rating_history_accepts_offset_free_dates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ratings/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"movieId": "1", "rating": 4.5, "date": "2023-10-01T12:30:00"},
            {"movieId": "4", "rating": 5.0, "date": "2023-09-15T18:45:00Z"}
        ])))
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::new(&config_for(&server), Arc::new(MemoryCredentialStore::new())).unwrap());
    let content = ContentStore::new(transport);

    assert!(content.fetch_rating_history().await);
    assert_eq!(content.error(), None);
    let history = content.rating_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].date.to_rfc3339(), "2023-10-01T12:30:00+00:00");
}
