//! Workspace API endpoints.
//!
//! - List the caller's workspaces
//! - Create a workspace (slug generated from the name)
//! - Get / delete a workspace
//! - List and create the boards of a workspace

use axum::{
    extract::{Extension, Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{authorize, AuthUser};
use super::routes::AppState;
use super::types::{ok, ApiResult, CreateBoardRequest, CreateWorkspaceRequest, DeletedResponse};
use crate::model::{Board, Resource, Workspace};

/// Create workspace routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_workspaces).post(create_workspace))
        .route("/:id", get(get_workspace).delete(delete_workspace))
        .route("/:id/boards", get(list_boards).post(create_board))
}

/// GET /api/workspaces - Workspaces owned by the caller.
async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Workspace>> {
    ok(state.store.list_workspaces(&user.id).await?)
}

/// POST /api/workspaces
async fn create_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> ApiResult<Workspace> {
    let workspace = state
        .store
        .create_workspace(&user.id, &req.name, req.description.as_deref())
        .await?;
    tracing::info!(workspace = %workspace.id, slug = %workspace.slug, "Created workspace");
    ok(workspace)
}

async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Workspace> {
    authorize(state.store.as_ref(), &user, Resource::Workspace(id)).await?;
    ok(state.store.get_workspace(id).await?)
}

/// DELETE /api/workspaces/:id - Removes every board, list and task inside it.
async fn delete_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletedResponse> {
    authorize(state.store.as_ref(), &user, Resource::Workspace(id)).await?;
    state.store.delete_workspace(id).await?;
    tracing::info!(workspace = %id, "Deleted workspace");
    ok(DeletedResponse { deleted: vec![id] })
}

async fn list_boards(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Board>> {
    authorize(state.store.as_ref(), &user, Resource::Workspace(id)).await?;
    ok(state.store.list_boards(id).await?)
}

async fn create_board(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateBoardRequest>,
) -> ApiResult<Board> {
    authorize(state.store.as_ref(), &user, Resource::Workspace(id)).await?;
    ok(state.store.create_board(id, &req.name).await?)
}
