//! Router assembly and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::{create_board_store, BoardStore};
use crate::textgen::{ChatCompletionsClient, TaskAssistant};

use super::auth;
use super::boards as boards_api;
use super::lists as lists_api;
use super::tasks as tasks_api;
use super::types::*;
use super::workspaces as workspaces_api;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Board persistence backend
    pub store: Arc<dyn BoardStore>,
    /// Text generation helper, absent when no API key is configured
    pub assistant: Option<TaskAssistant>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn BoardStore>,
        assistant: Option<TaskAssistant>,
    ) -> Self {
        Self {
            config,
            store,
            assistant,
        }
    }
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/api/health", get(health));

    let protected_routes = Router::new()
        .nest("/api/workspaces", workspaces_api::routes())
        .nest("/api/boards", boards_api::routes())
        .nest("/api/lists", lists_api::routes())
        .nest("/api/tasks", tasks_api::routes())
        .route("/api/order", post(tasks_api::apply_order))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = create_board_store(config.store_type, config.database_path.clone()).await?;
    tracing::info!(
        store = ?config.store_type,
        persistent = store.is_persistent(),
        "Board store ready"
    );

    let assistant = match ChatCompletionsClient::from_config(&config.textgen) {
        Some(client) => {
            tracing::info!(models = ?config.textgen.models, "Task assistant enabled");
            Some(TaskAssistant::new(Arc::new(client)))
        }
        None => {
            tracing::info!("Task assistant disabled (no TEXTGEN_API_KEY)");
            None
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store, assistant));
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        persistent: state.store.is_persistent(),
        assistant: state.assistant.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::issue_token;
    use crate::model::{Board, BoardSnapshot, Task, TaskList, Workspace};
    use crate::store::{BoardStoreType, InMemoryBoardStore};
    use serde_json::{json, Value};

    const SECRET: &str = "test-secret";

    async fn spawn_app() -> String {
        let config = Config::new(Some(SECRET.to_string()), BoardStoreType::Memory);
        let state = Arc::new(AppState::new(
            config,
            Arc::new(InMemoryBoardStore::new()),
            None,
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn token(user: &str) -> String {
        issue_token(SECRET, user, 1).unwrap().0
    }

    async fn post<T: serde::de::DeserializeOwned>(
        client: &reqwest::Client,
        url: String,
        user: &str,
        body: Value,
    ) -> T {
        let resp: ApiResponse<T> = client
            .post(url)
            .bearer_auth(token(user))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp.into_result().unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public_and_api_requires_token() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let health = client
            .get(format!("{}/api/health", base))
            .send()
            .await
            .unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);

        let denied = client
            .get(format!("{}/api/workspaces", base))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: Value = denied.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "unauthorized");
    }

    #[tokio::test]
    async fn test_board_flow_and_ownership() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let ws: Workspace = post(
            &client,
            format!("{}/api/workspaces", base),
            "alice",
            json!({ "name": "Side Projects" }),
        )
        .await;
        assert!(ws.slug.starts_with("side-projects-"));

        let board: Board = post(
            &client,
            format!("{}/api/workspaces/{}/boards", base, ws.id),
            "alice",
            json!({ "name": "Launch" }),
        )
        .await;
        let list: TaskList = post(
            &client,
            format!("{}/api/boards/{}/lists", base, board.id),
            "alice",
            json!({ "title": "Todo" }),
        )
        .await;
        let a: Task = post(
            &client,
            format!("{}/api/lists/{}/tasks", base, list.id),
            "alice",
            json!({ "title": "A" }),
        )
        .await;
        let b: Task = post(
            &client,
            format!("{}/api/lists/{}/tasks", base, list.id),
            "alice",
            json!({ "title": "B" }),
        )
        .await;
        assert_eq!((a.order, b.order), (0, 1));

        let rows: usize = post(
            &client,
            format!("{}/api/order", base),
            "alice",
            json!({
                "kind": "task",
                "entries": [
                    { "item_id": b.id, "order": 0, "container_id": list.id },
                    { "item_id": a.id, "order": 1, "container_id": list.id },
                ]
            }),
        )
        .await;
        assert_eq!(rows, 2);

        let snapshot: ApiResponse<BoardSnapshot> = client
            .get(format!("{}/api/boards/{}", base, board.id))
            .bearer_auth(token("alice"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let snapshot = snapshot.into_result().unwrap();
        let titles: Vec<_> = snapshot.lists[0]
            .tasks
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, vec!["B", "A"]);

        let foreign = client
            .get(format!("{}/api/boards/{}", base, board.id))
            .bearer_auth(token("bob"))
            .send()
            .await
            .unwrap();
        assert_eq!(foreign.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_assist_without_assistant_is_persistence_failure() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let ws: Workspace = post(
            &client,
            format!("{}/api/workspaces", base),
            "alice",
            json!({ "name": "Home" }),
        )
        .await;
        let board: Board = post(
            &client,
            format!("{}/api/workspaces/{}/boards", base, ws.id),
            "alice",
            json!({ "name": "Chores" }),
        )
        .await;
        let list: TaskList = post(
            &client,
            format!("{}/api/boards/{}/lists", base, board.id),
            "alice",
            json!({ "title": "Todo" }),
        )
        .await;
        let task: Task = post(
            &client,
            format!("{}/api/lists/{}/tasks", base, list.id),
            "alice",
            json!({ "title": "Laundry" }),
        )
        .await;

        let resp = client
            .post(format!("{}/api/tasks/{}/assist/tags", base, task.id))
            .bearer_auth(token("alice"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["kind"], "persistence_failure");
    }
}
