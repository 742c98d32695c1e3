//! HTTP API for the task board.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check (public)
//! - `GET|POST /api/workspaces` - List / create the caller's workspaces
//! - `GET|DELETE /api/workspaces/{id}` - Get / delete a workspace
//! - `GET|POST /api/workspaces/{id}/boards` - List / create boards
//! - `GET|DELETE /api/boards/{id}` - Board snapshot / delete
//! - `GET|POST /api/boards/{id}/lists` - List / create lists
//! - `PATCH|DELETE /api/lists/{id}` - Rename / delete a list
//! - `POST /api/lists/{id}/move` - Move a list to a board position
//! - `GET|POST /api/lists/{id}/tasks` - List / create tasks
//! - `GET|PATCH|DELETE /api/tasks/{id}` - Get / update / delete a task
//! - `POST /api/tasks/{id}/move` - Move a task to a list position
//! - `POST /api/tasks/{id}/subtasks` - Bulk-create sub-tasks
//! - `POST /api/tasks/{id}/assist/{perfect,rewrite,status,tags}` - Assistant proposals
//! - `POST /api/order` - Atomic order batch

mod auth;
mod boards;
mod lists;
mod routes;
mod tasks;
pub mod types;
mod workspaces;

pub use auth::{issue_token, verify_token, AuthUser, DEV_USER_ID};
pub use routes::{router, serve, AppState};
pub use types::*;
