//! Task API endpoints.
//!
//! - Get / update / delete a task (`?cascade=true` removes the sub-tree)
//! - Move a task to a list position
//! - Bulk-create sub-tasks
//! - Assistant proposals (never persisted; the client applies what it accepts)
//! - `POST /api/order`: atomic order batch for tasks or lists

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{authorize, AuthUser};
use super::routes::AppState;
use super::types::{
    ok, ApiResult, CreateSubtasksRequest, DeleteTaskQuery, DeletedResponse, MoveTaskRequest,
    RewriteRequest,
};
use crate::error::{BoardError, BoardResult};
use crate::model::{Resource, Task, TaskContext, TaskPatch};
use crate::sync::{ItemKind, OrderBatch};
use crate::textgen::{RewriteProposal, StatusUpdate, TagSuggestion, TaskAssistant, TaskProposal};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/:id/move", post(move_task))
        .route("/:id/subtasks", post(create_subtasks))
        .route("/:id/assist/perfect", post(make_perfect))
        .route("/:id/assist/rewrite", post(rewrite))
        .route("/:id/assist/status", post(status_update))
        .route("/:id/assist/tags", post(suggest_tags))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Task> {
    authorize(state.store.as_ref(), &user, Resource::Task(id)).await?;
    ok(state.store.get_task(id).await?)
}

/// PATCH /api/tasks/:id - Field edits only; ordering goes through move or batch.
async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Task> {
    authorize(state.store.as_ref(), &user, Resource::Task(id)).await?;
    ok(state.store.update_task(id, &patch).await?)
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteTaskQuery>,
) -> ApiResult<DeletedResponse> {
    authorize(state.store.as_ref(), &user, Resource::Task(id)).await?;
    let deleted = state.store.delete_task(id, query.cascade).await?;
    tracing::debug!(task = %id, removed = deleted.len(), "Deleted task");
    ok(DeletedResponse { deleted })
}

async fn move_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveTaskRequest>,
) -> ApiResult<Task> {
    authorize(state.store.as_ref(), &user, Resource::Task(id)).await?;
    authorize(state.store.as_ref(), &user, Resource::List(req.list_id)).await?;
    ok(state
        .store
        .move_task(id, req.list_id, req.target_index)
        .await?)
}

async fn create_subtasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateSubtasksRequest>,
) -> ApiResult<Vec<Task>> {
    authorize(state.store.as_ref(), &user, Resource::Task(id)).await?;
    ok(state.store.create_subtasks(id, &req.titles).await?)
}

/// Resolve the assistant and the task's context, checking ownership first.
async fn assist_context<'a>(
    state: &'a AppState,
    user: &AuthUser,
    id: Uuid,
) -> BoardResult<(&'a TaskAssistant, TaskContext)> {
    authorize(state.store.as_ref(), user, Resource::Task(id)).await?;
    let assistant = state.assistant.as_ref().ok_or_else(|| {
        BoardError::PersistenceFailure("Task assistant not configured".to_string())
    })?;
    let ctx = state.store.task_context(id).await?;
    Ok((assistant, ctx))
}

async fn make_perfect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<TaskProposal> {
    let (assistant, ctx) = assist_context(&state, &user, id).await?;
    ok(assistant.make_perfect(&ctx).await?)
}

async fn rewrite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RewriteRequest>,
) -> ApiResult<RewriteProposal> {
    let (assistant, ctx) = assist_context(&state, &user, id).await?;
    ok(assistant.rewrite(&ctx, req.tone).await?)
}

async fn status_update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusUpdate> {
    let (assistant, ctx) = assist_context(&state, &user, id).await?;
    ok(assistant.status_update(&ctx).await?)
}

async fn suggest_tags(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<TagSuggestion> {
    let (assistant, ctx) = assist_context(&state, &user, id).await?;
    ok(assistant.suggest_tags(&ctx).await?)
}

/// POST /api/order - Apply one gesture's order batch. Returns the number of rows written.
///
/// Every item and every container named by the batch must belong to the caller; the
/// batch is rejected as a whole otherwise.
pub async fn apply_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(batch): Json<OrderBatch>,
) -> ApiResult<usize> {
    batch.validate()?;

    let (item, container): (fn(Uuid) -> Resource, fn(Uuid) -> Resource) = match batch.kind {
        ItemKind::Task => (Resource::Task, Resource::List),
        ItemKind::List => (Resource::List, Resource::Board),
    };

    let mut checked = HashSet::new();
    let resources = batch
        .entries
        .iter()
        .map(|e| item(e.item_id))
        .chain(batch.containers().into_iter().map(container));
    for resource in resources {
        if checked.insert(resource) {
            authorize(state.store.as_ref(), &user, resource).await?;
        }
    }

    state.store.upsert_order(&batch).await?;
    tracing::debug!(kind = %batch.kind, rows = batch.entries.len(), "Applied order batch");
    ok(batch.entries.len())
}
