pub mod agents;
pub mod collaborators;
pub mod credentials;
pub mod health;
pub mod models;
pub mod rooms;
pub mod stats;

use crate::state::AppState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

/// The full API, open to any origin so the browser dashboard can be served
/// from anywhere.
pub fn configure(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::routes())
        .merge(agents::routes(state.clone()))
        .merge(models::routes(state.clone()))
        .merge(rooms::routes(state.clone()))
        .merge(credentials::routes(state.clone()))
        .merge(collaborators::routes(state.clone()))
        .merge(stats::routes(state))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck::credentials::{KeyRetrievalStrategy, MemoryCredentials, RealEnvironment};
    use agentdeck::dashboard::{Dashboard, DashboardDeps};
    use agentdeck::errors::GenerationError;
    use agentdeck::generator::mock::MockGenerator;
    use agentdeck::generator::Endpoints;
    use agentdeck::relay::mock::{MockRelayChannel, MockRelayFactory};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestApp {
        router: Router,
        generator: MockGenerator,
        _files: TempDir,
    }

    fn offline() -> Endpoints {
        Endpoints {
            ollama: "http://127.0.0.1:1".to_string(),
            lmstudio: "http://127.0.0.1:1".to_string(),
            localai: "http://127.0.0.1:1".to_string(),
            ..Endpoints::default()
        }
    }

    fn test_app(generator: MockGenerator, relays: MockRelayFactory) -> TestApp {
        test_app_at(offline(), generator, relays)
    }

    fn test_app_at(endpoints: Endpoints, generator: MockGenerator, relays: MockRelayFactory) -> TestApp {
        // Keys set through the API only, never from the host environment
        let credentials = Arc::new(MemoryCredentials::with_environment(
            RealEnvironment,
            KeyRetrievalStrategy::StoreOnly,
        ));
        let files = TempDir::new().unwrap();
        let deps = DashboardDeps::new(reqwest::Client::new(), endpoints, credentials, Arc::new(relays))
            .with_generator(Arc::new(generator.clone()))
            .with_files_root(files.path());

        TestApp {
            router: configure(AppState::new(Dashboard::new(deps))),
            generator,
            _files: files,
        }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_agent_crud_and_chat() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());

        let (status, agent) = send(
            &app.router,
            Method::POST,
            "/api/agents",
            Some(json!({"name": "Helper", "modelRoute": "ollama:llama3.2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(agent["id"], 1);
        assert_eq!(agent["state"], "inactive");

        let (status, reply) = send(
            &app.router,
            Method::POST,
            "/api/agents/1/chat",
            Some(json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["reply"], "echo: hi");
        assert_eq!(reply["conversationCount"], 1);

        let (_, log) = send(&app.router, Method::GET, "/api/agents/1/conversations", None).await;
        assert_eq!(log.as_array().map(Vec::len), Some(1));

        let (status, learning) = send(&app.router, Method::POST, "/api/agents/1/learning", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(learning["learningEnabled"], false);

        let (status, _) = send(&app.router, Method::DELETE, "/api/agents/1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app.router, Method::GET, "/api/agents/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "notFound");
    }

    #[tokio::test]
    async fn test_validation_and_token_errors() {
        let relays = MockRelayFactory::new();
        relays.insert("bad-token", MockRelayChannel::invalid());
        let app = test_app(MockGenerator::echo(), relays);

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/agents",
            Some(json!({"name": "", "modelRoute": "ollama:llama3.2"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/agents",
            Some(json!({
                "name": "Bot",
                "modelRoute": "ollama:llama3.2",
                "relayEnabled": true,
                "relayToken": "bad-token"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalidRelayToken");
    }

    #[tokio::test]
    async fn test_generation_failures_map_to_status() {
        let generator = MockGenerator::new(vec![
            Err(GenerationError::MissingCredential {
                provider: "OpenAI".to_string(),
            }),
            Err(GenerationError::Unreachable {
                backend: "Ollama".to_string(),
                reason: "connection refused".to_string(),
            }),
        ]);
        let app = test_app(generator, MockRelayFactory::new());
        let request = json!({"modelRoute": "gpt-4o", "message": "hello"});

        let (status, body) = send(&app.router, Method::POST, "/api/generate", Some(request.clone())).await;
        assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
        assert_eq!(body["kind"], "missingCredential");

        let (status, body) = send(&app.router, Method::POST, "/api/generate", Some(request.clone())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "unreachable");

        let (status, body) = send(&app.router, Method::POST, "/api/generate", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "echo: hello");
        assert_eq!(app.generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_activation_of_unreachable_model_conflicts() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());
        send(
            &app.router,
            Method::POST,
            "/api/agents",
            Some(json!({"name": "Local", "modelRoute": "lmstudio:qwen"})),
        )
        .await;

        let (status, body) = send(&app.router, Method::POST, "/api/agents/1/activate", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "modelUnavailable");

        let (_, models) = send(&app.router, Method::GET, "/api/models/status", None).await;
        let statuses = models.as_array().unwrap();
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|status| status["reachable"] == false));
    }

    #[tokio::test]
    async fn test_room_flow_and_export() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());
        send(
            &app.router,
            Method::POST,
            "/api/agents",
            Some(json!({"name": "Ada", "modelRoute": "ollama:llama3.2"})),
        )
        .await;

        let (status, room) = send(
            &app.router,
            Method::POST,
            "/api/rooms",
            Some(json!({"name": "Board Room", "kind": "executive"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let room_id = room["id"].as_u64().unwrap();

        let (status, room) = send(
            &app.router,
            Method::POST,
            &format!("/api/rooms/{}/agents/1", room_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(room["activeAgentIds"], json!([1]));

        // Inactive members stay silent.
        let (status, messages) = send(
            &app.router,
            Method::POST,
            &format!("/api/rooms/{}/messages", room_id),
            Some(json!({"message": "status?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(messages.as_array().map(Vec::len), Some(1));
        assert_eq!(app.generator.call_count(), 0);

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/rooms/{}/export", room_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"room_Board_Room_"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let export: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(export["room"], "Board Room");
        assert_eq!(export["messages"].as_array().map(Vec::len), Some(1));

        let (status, _) = send(&app.router, Method::DELETE, &format!("/api/rooms/{}", room_id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app.router, Method::GET, &format!("/api/rooms/{}/export", room_id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_credentials_never_echo_values() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());

        let (status, _) = send(
            &app.router,
            Method::PUT,
            "/api/credentials/OPENAI_API_KEY",
            Some(json!({"value": "sk-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, status_map) = send(&app.router, Method::GET, "/api/credentials", None).await;
        assert_eq!(status_map["OPENAI_API_KEY"], true);
        assert_eq!(status_map["ANTHROPIC_API_KEY"], false);
        assert!(!status_map.to_string().contains("sk-secret"));

        let (status, body) = send(&app.router, Method::DELETE, "/api/credentials/OPENAI_API_KEY", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], true);

        let (status, body) = send(&app.router, Method::DELETE, "/api/credentials/NOPE", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn test_file_upload_list_delete() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/files?name=notes.md&destination=cabinet")
                    .body(Body::from("# notes"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let file: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(file["originalName"], "notes.md");
        assert_eq!(file["sizeBytes"], 7);

        let (_, cabinet) = send(&app.router, Method::GET, "/api/files?destination=cabinet", None).await;
        assert_eq!(cabinet.as_array().map(Vec::len), Some(1));
        let (_, general) = send(&app.router, Method::GET, "/api/files?destination=general", None).await;
        assert_eq!(general.as_array().map(Vec::len), Some(0));

        let id = file["id"].as_str().unwrap();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/files/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/"));
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"notes.md\""
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"# notes");

        let (status, content) = send(&app.router, Method::GET, &format!("/api/files/{}/content", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content["content"], "# notes");
        assert_eq!(content["length"], 7);
        assert_eq!(content["file"]["id"], id);

        let (status, _) = send(&app.router, Method::DELETE, &format!("/api/files/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app.router, Method::GET, &format!("/api/files/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "notFound");
        let (status, _) = send(&app.router, Method::DELETE, &format!("/api/files/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());
        send(
            &app.router,
            Method::POST,
            "/api/agents",
            Some(json!({"name": "Ada", "modelRoute": "claude-3-5-sonnet"})),
        )
        .await;

        let (status, stats) = send(&app.router, Method::GET, "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalAgents"], 1);
        assert_eq!(stats["agentsOnline"], 0);
        assert_eq!(stats["runningRelays"], 0);
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(MockGenerator::echo(), MockRelayFactory::new());
        let (status, body) = send(&app.router, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_delete_namespaced_ollama_model() {
        let ollama = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/delete"))
            .and(body_json(json!({"name": "library/llama3.2:1b"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&ollama)
            .await;
        let endpoints = Endpoints {
            ollama: ollama.uri(),
            ..offline()
        };
        let app = test_app_at(endpoints, MockGenerator::echo(), MockRelayFactory::new());

        let (status, models) = send(
            &app.router,
            Method::DELETE,
            "/api/models/ollama",
            Some(json!({"name": "library/llama3.2:1b"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(models, json!([]));

        let (status, body) = send(
            &app.router,
            Method::DELETE,
            "/api/models/ollama",
            Some(json!({"name": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }
}
