//! Board API endpoints: full board snapshot, delete, and the board's lists.

use axum::{
    extract::{Extension, Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{authorize, AuthUser};
use super::routes::AppState;
use super::types::{ok, ApiResult, DeletedResponse, ListTitleRequest};
use crate::model::{BoardSnapshot, Resource, TaskList};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(get_board).delete(delete_board))
        .route("/:id/lists", get(list_lists).post(create_list))
}

/// GET /api/boards/:id - Lists and tasks in display order.
async fn get_board(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<BoardSnapshot> {
    authorize(state.store.as_ref(), &user, Resource::Board(id)).await?;
    ok(state.store.board_snapshot(id).await?)
}

async fn delete_board(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletedResponse> {
    authorize(state.store.as_ref(), &user, Resource::Board(id)).await?;
    state.store.delete_board(id).await?;
    ok(DeletedResponse { deleted: vec![id] })
}

async fn list_lists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TaskList>> {
    authorize(state.store.as_ref(), &user, Resource::Board(id)).await?;
    ok(state.store.list_lists(id).await?)
}

/// POST /api/boards/:id/lists - Appends a list to the board.
async fn create_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ListTitleRequest>,
) -> ApiResult<TaskList> {
    authorize(state.store.as_ref(), &user, Resource::Board(id)).await?;
    ok(state.store.create_list(id, &req.title).await?)
}
