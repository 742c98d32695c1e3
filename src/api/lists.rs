//! List API endpoints: rename, delete, move, and the list's tasks.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{authorize, AuthUser};
use super::routes::AppState;
use super::types::{ok, ApiResult, DeletedResponse, ListTitleRequest, MoveListRequest};
use crate::model::{NewTask, Resource, Task, TaskList};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", patch(rename_list).delete(delete_list))
        .route("/:id/move", post(move_list))
        .route("/:id/tasks", get(list_tasks).post(create_task))
}

async fn rename_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ListTitleRequest>,
) -> ApiResult<TaskList> {
    authorize(state.store.as_ref(), &user, Resource::List(id)).await?;
    ok(state.store.rename_list(id, &req.title).await?)
}

/// DELETE /api/lists/:id - Removes the list and all of its tasks.
async fn delete_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletedResponse> {
    authorize(state.store.as_ref(), &user, Resource::List(id)).await?;
    state.store.delete_list(id).await?;
    ok(DeletedResponse { deleted: vec![id] })
}

async fn move_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveListRequest>,
) -> ApiResult<TaskList> {
    authorize(state.store.as_ref(), &user, Resource::List(id)).await?;
    authorize(state.store.as_ref(), &user, Resource::Board(req.board_id)).await?;
    ok(state
        .store
        .move_list(id, req.board_id, req.target_index)
        .await?)
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Task>> {
    authorize(state.store.as_ref(), &user, Resource::List(id)).await?;
    ok(state.store.list_tasks(id).await?)
}

/// POST /api/lists/:id/tasks - Appends a task (or sub-task, with `parent_id`).
async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewTask>,
) -> ApiResult<Task> {
    authorize(state.store.as_ref(), &user, Resource::List(id)).await?;
    ok(state.store.create_task(id, req).await?)
}
