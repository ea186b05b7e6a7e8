use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use chainrun_core::config::GatewayConfig;
use chainrun_core::traits::RunStore;
use chainrun_engine::ExecutionService;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn RunStore>,
        executions: ExecutionService,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                config,
                store,
                executions,
            }),
        }
    }

    /// The full route table with state attached.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            // Workflows
            .route(
                "/workflow/",
                get(routes::list_workflows).post(routes::create_workflow),
            )
            .route(
                "/workflow/{id}",
                get(routes::get_workflow).put(routes::update_workflow),
            )
            // Executions
            .route(
                "/execution/workflow/{workflow_id}",
                get(routes::list_executions).post(routes::trigger_execution),
            )
            .route("/execution/{execution_id}", get(routes::get_execution))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();
        let bind = &self.state.config.bind;

        let listener = TcpListener::bind(bind).await?;
        info!(bind = %bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use chainrun_core::config::{ApiKeyConfig, RunnerConfig};
    use chainrun_core::traits::{ExecutionStore, UserStore};
    use chainrun_core::types::{ExecutionId, ExecutionStatus, UserId};
    use chainrun_engine::{ExecutionEngine, RunQueue};
    use chainrun_store::SqliteStore;
    use chainrun_test_utils::{fixtures, StubGenerator};

    struct TestApp {
        router: Router,
        store: SqliteStore,
        cancel: CancellationToken,
    }

    async fn app() -> TestApp {
        let store = SqliteStore::in_memory().unwrap();
        let alice = store.create_user("alice@example.com".into()).await.unwrap();
        let bob = store.create_user("bob@example.com".into()).await.unwrap();

        let stub = Arc::new(StubGenerator::new().respond("hello", "HI"));
        let engine = Arc::new(ExecutionEngine::new(stub, Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let (queue, _) = RunQueue::start(
            engine,
            Arc::new(store.clone()),
            &RunnerConfig::default(),
            cancel.clone(),
        );

        let config = GatewayConfig {
            bind: "127.0.0.1:0".into(),
            api_keys: vec![
                ApiKeyConfig {
                    name: "alice".into(),
                    key: "ck_alice".into(),
                    user_id: alice.id,
                },
                ApiKeyConfig {
                    name: "bob".into(),
                    key: "ck_bob".into(),
                    user_id: bob.id,
                },
            ],
        };
        let shared: Arc<dyn RunStore> = Arc::new(store.clone());
        let executions = ExecutionService::new(shared.clone(), queue);
        let server = GatewayServer::new(config, shared, executions);

        TestApp {
            router: server.router(),
            store,
            cancel,
        }
    }

    fn request(method: &str, uri: &str, key: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let app = app().await;
        let (status, body) = send(&app.router, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        app.cancel.cancel();
    }

    #[tokio::test]
    async fn test_missing_or_unknown_key_is_unauthorized() {
        let app = app().await;
        let (status, _) = send(&app.router, request("GET", "/workflow/", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            send(&app.router, request("GET", "/workflow/", Some("ck_nobody"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        app.cancel.cancel();
    }

    #[tokio::test]
    async fn test_workflow_crud_is_owner_scoped() {
        let app = app().await;
        let (status, created) = send(
            &app.router,
            request("POST", "/workflow/", Some("ck_alice"), Some(fixtures::hello_chain_json())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["nodes"].as_array().unwrap().len(), 3);

        let uri = format!("/workflow/{id}");
        let (status, _) = send(&app.router, request("GET", &uri, Some("ck_alice"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app.router, request("GET", &uri, Some("ck_bob"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let renamed = serde_json::json!({"name": "renamed", "nodes": [], "edges": []});
        let (status, _) = send(
            &app.router,
            request("PUT", &uri, Some("ck_bob"), Some(renamed.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, updated) =
            send(&app.router, request("PUT", &uri, Some("ck_alice"), Some(renamed))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "renamed");

        let (_, mine) = send(&app.router, request("GET", "/workflow/", Some("ck_alice"), None)).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        let (_, theirs) = send(&app.router, request("GET", "/workflow/", Some("ck_bob"), None)).await;
        assert!(theirs.as_array().unwrap().is_empty());
        app.cancel.cancel();
    }

    #[tokio::test]
    async fn test_trigger_and_poll_execution() {
        let app = app().await;
        let (_, created) = send(
            &app.router,
            request("POST", "/workflow/", Some("ck_alice"), Some(fixtures::hello_chain_json())),
        )
        .await;
        let wf = created["id"].as_i64().unwrap();

        let (status, triggered) = send(
            &app.router,
            request("POST", &format!("/execution/workflow/{wf}"), Some("ck_alice"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(triggered["message"], "Workflow execution started");
        let ex = triggered["execution_id"].as_i64().unwrap();

        let mut status = ExecutionStatus::Pending;
        for _ in 0..200 {
            status = app
                .store
                .load_execution(ExecutionId(ex))
                .await
                .unwrap()
                .unwrap()
                .status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, ExecutionStatus::Completed);

        let (status, body) = send(
            &app.router,
            request("GET", &format!("/execution/{ex}"), Some("ck_alice"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "COMPLETED");
        assert_eq!(body["results"], serde_json::json!({"a": "hello", "b": "HI", "c": "HI"}));

        let (status, _) = send(
            &app.router,
            request("GET", &format!("/execution/{ex}"), Some("ck_bob"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, listed) = send(
            &app.router,
            request("GET", &format!("/execution/workflow/{wf}"), Some("ck_alice"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        app.cancel.cancel();
    }

    #[tokio::test]
    async fn test_trigger_unknown_workflow_is_not_found() {
        let app = app().await;
        let (status, body) = send(
            &app.router,
            request("POST", "/execution/workflow/77", Some("ck_alice"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("77"));
        assert!(app
            .store
            .get_user(UserId(1))
            .await
            .unwrap()
            .is_some());
        app.cancel.cancel();
    }
}
