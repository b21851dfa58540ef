//! HTTP API Integration Tests
//!
//! Runs the router on an ephemeral port and talks to it over real HTTP.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::{basis, FakeBackend};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use voxguard::adapters::{EmbeddingServiceConfig, EmbeddingServiceError, HttpEmbeddingClient};
use voxguard::core::{VoiceOrchestrator, VoicePolicy};
use voxguard::server::{router, AppState};
use voxguard::storage::SqliteStore;

const TOKEN: &str = "gateway-secret";

struct TestServer {
    addr: SocketAddr,
    backend: Arc<FakeBackend>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let orchestrator = Arc::new(VoiceOrchestrator::new(
            backend.clone(),
            store,
            VoicePolicy::default(),
        ));
        let state = AppState::new(
            orchestrator,
            Some(TOKEN.to_string()),
            "http://embeddings.test",
        );
        let app = router(state, 5 * 1024 * 1024);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            backend,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder, user: &str) -> reqwest::RequestBuilder {
        builder.bearer_auth(TOKEN).header("X-User-Id", user)
    }
}

fn audio_part(name: &str) -> Part {
    Part::bytes(b"RIFF....WAVE".to_vec())
        .file_name(name.to_string())
        .mime_str("audio/wav")
        .unwrap()
}

fn upload(names: &[&str]) -> Form {
    names
        .iter()
        .fold(Form::new().text("device_id", "phone-1"), |form, name| {
            form.part("audio", audio_part(name))
        })
}

fn scripted() -> FakeBackend {
    FakeBackend::new()
        .with_vector("a.wav", basis(0))
        .with_vector("b.wav", basis(0))
        .with_vector("c.wav", basis(0))
        .with_vector("same.wav", basis(0))
        .with_vector("other.wav", basis(1))
        .with_failure("bad.wav", EmbeddingServiceError::Timeout)
}

#[tokio::test]
async fn test_health_needs_no_auth() {
    let server = TestServer::start(scripted()).await;

    let response = server
        .client
        .get(server.url("/api/voice/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["service"]["healthy"], true);
    assert_eq!(body["service"]["url"], "http://embeddings.test");

    server.backend.set_healthy(false);
    let response = server
        .client
        .get(server.url("/api/voice/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["service"]["reachable"], false);
}

#[tokio::test]
async fn test_requests_without_credentials_are_rejected() {
    let server = TestServer::start(scripted()).await;

    let no_token = server
        .client
        .get(server.url("/api/voice/status"))
        .header("X-User-Id", "kid-1")
        .send()
        .await
        .unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);
    let body: Value = no_token.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let no_user = server
        .client
        .get(server.url("/api/voice/status"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(no_user.status(), StatusCode::UNAUTHORIZED);

    let enroll = server
        .client
        .post(server.url("/api/voice/enroll"))
        .multipart(upload(&["a.wav", "b.wav", "c.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(enroll.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.backend.calls(), 0);
}

#[tokio::test]
async fn test_enroll_verify_status_remove_flow() {
    let server = TestServer::start(scripted()).await;

    let enroll = server
        .authed(server.client.post(server.url("/api/voice/enroll")), "kid-2")
        .multipart(upload(&["a.wav", "b.wav", "c.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(enroll.status(), StatusCode::OK);
    let body: Value = enroll.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["samples_processed"], 3);
    assert_eq!(body["threshold"], 0.78);
    assert_eq!(body["embedding_dimension"], 192);

    let matched = server
        .authed(server.client.post(server.url("/api/voice/verify")), "kid-2")
        .multipart(upload(&["same.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(matched.status(), StatusCode::OK);
    let body: Value = matched.json().await.unwrap();
    assert_eq!(body["match"], true);
    assert_eq!(body["score"], 1.0);

    let rejected = server
        .authed(server.client.post(server.url("/api/voice/verify")), "kid-2")
        .multipart(upload(&["other.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::OK);
    let body: Value = rejected.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["match"], false);
    assert_eq!(body["score"], 0.0);

    let status = server
        .authed(server.client.get(server.url("/api/voice/status")), "kid-2")
        .send()
        .await
        .unwrap();
    let body: Value = status.json().await.unwrap();
    assert_eq!(body["enrolled"], true);
    assert_eq!(body["sample_count"], 3);
    assert_eq!(body["dimension"], 192);

    let history = server
        .authed(
            server.client.get(server.url("/api/voice/history?limit=1")),
            "kid-2",
        )
        .send()
        .await
        .unwrap();
    let body: Value = history.json().await.unwrap();
    assert_eq!(body["enrollments"].as_array().unwrap().len(), 1);
    assert_eq!(body["verifications"].as_array().unwrap().len(), 1);
    assert_eq!(body["verifications"][0]["is_match"], false);

    let removed = server
        .authed(server.client.delete(server.url("/api/voice/enroll")), "kid-2")
        .send()
        .await
        .unwrap();
    let body: Value = removed.json().await.unwrap();
    assert_eq!(body["removed"], true);

    let removed_again = server
        .authed(server.client.delete(server.url("/api/voice/enroll")), "kid-2")
        .send()
        .await
        .unwrap();
    assert_eq!(removed_again.status(), StatusCode::OK);
    let body: Value = removed_again.json().await.unwrap();
    assert_eq!(body["removed"], false);

    let status = server
        .authed(server.client.get(server.url("/api/voice/status")), "kid-2")
        .send()
        .await
        .unwrap();
    let body: Value = status.json().await.unwrap();
    assert_eq!(body["enrolled"], false);
}

#[tokio::test]
async fn test_identities_are_isolated() {
    let server = TestServer::start(scripted()).await;

    let enroll = server
        .authed(server.client.post(server.url("/api/voice/enroll")), "parent")
        .multipart(upload(&["a.wav", "b.wav", "c.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(enroll.status(), StatusCode::OK);

    let verify = server
        .authed(server.client.post(server.url("/api/voice/verify")), "kid-3")
        .multipart(upload(&["same.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(verify.status(), StatusCode::NOT_FOUND);
    let body: Value = verify.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_ENROLLED");
}

#[tokio::test]
async fn test_enrollment_shortfall_reports_counts() {
    let server = TestServer::start(scripted()).await;

    let response = server
        .authed(server.client.post(server.url("/api/voice/enroll")), "kid-4")
        .multipart(upload(&["a.wav", "b.wav", "bad.wav"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INSUFFICIENT_SAMPLES");
    assert_eq!(body["required"], 3);
    assert_eq!(body["achieved"], 2);
    assert_eq!(body["samples_processed"], 3);
}

#[tokio::test]
async fn test_malformed_uploads_are_rejected() {
    let server = TestServer::start(scripted()).await;

    let too_few = server
        .authed(server.client.post(server.url("/api/voice/enroll")), "kid-5")
        .multipart(upload(&["a.wav", "b.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(too_few.status(), StatusCode::BAD_REQUEST);
    let body: Value = too_few.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let two_clips = server
        .authed(server.client.post(server.url("/api/voice/verify")), "kid-5")
        .multipart(upload(&["same.wav", "other.wav"]))
        .send()
        .await
        .unwrap();
    assert_eq!(two_clips.status(), StatusCode::BAD_REQUEST);
    let body: Value = two_clips.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["message"].as_str().unwrap().contains("exactly one"));

    let not_audio = Form::new().part(
        "audio",
        Part::bytes(b"\x89PNG".to_vec())
            .file_name("selfie.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let image = server
        .authed(server.client.post(server.url("/api/voice/verify")), "kid-5")
        .multipart(not_audio)
        .send()
        .await
        .unwrap();
    assert_eq!(image.status(), StatusCode::BAD_REQUEST);

    assert_eq!(server.backend.calls(), 0);
}

#[tokio::test]
async fn test_embedding_outage_maps_to_service_unavailable() {
    let server = TestServer::start(scripted()).await;
    server.backend.set_healthy(false);

    let response = server
        .authed(server.client.post(server.url("/api/voice/enroll")), "kid-6")
        .multipart(upload(&["a.wav", "b.wav", "c.wav"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_untyped_and_octet_stream_uploads_reach_the_service_as_audio() {
    let mut embed_service = mockito::Server::new_async().await;
    embed_service
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status": "healthy", "model_loaded": true}"#)
        .create_async()
        .await;
    let embedding = serde_json::json!({"success": true, "embedding": basis(0)}).to_string();
    let accepted = embed_service
        .mock("POST", "/embed")
        .match_body(mockito::Matcher::Regex(
            r"(?i)content-type: audio/".to_string(),
        ))
        .with_status(200)
        .with_body(embedding)
        .expect(3)
        .create_async()
        .await;

    let client = HttpEmbeddingClient::new(EmbeddingServiceConfig {
        base_url: embed_service.url(),
        ..Default::default()
    });
    let orchestrator = Arc::new(VoiceOrchestrator::new(
        Arc::new(client),
        Arc::new(SqliteStore::open_in_memory().unwrap()),
        VoicePolicy::default(),
    ));
    let app = router(AppState::new(orchestrator, None, embed_service.url()), 5 * 1024 * 1024);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let form = Form::new()
        .part(
            "audio",
            Part::bytes(b"RIFF-one".to_vec())
                .file_name("one.wav")
                .mime_str("application/octet-stream")
                .unwrap(),
        )
        .part("audio", Part::bytes(b"RIFF-two".to_vec()).file_name("two.wav"))
        .part("audio", Part::bytes(b"RIFF-three".to_vec()).file_name("three"));

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/voice/enroll", addr))
        .header("X-User-Id", "kid-7")
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["samples_processed"], 3);
    accepted.assert_async().await;
}
