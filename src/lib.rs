//! # taskboard
//!
//! Collaborative task board: workspaces contain boards, boards contain ordered lists,
//! lists contain ordered tasks, and tasks nest sub-tasks.
//!
//! This library provides:
//! - An ordering engine that keeps every container densely numbered across moves
//! - Pluggable board storage (in-memory and SQLite) with atomic order batches
//! - An HTTP API over the store, guarded by bearer tokens
//! - A client-side optimistic mutation controller and drag state machine
//! - A text-generation assistant that proposes task content
//!
//! ## Architecture
//!
//! ```text
//!   DragSession ──► MutationController ──► Transport ──► api ──► BoardStore
//!                         │                                        ▲
//!                         └── reconcile (plan moves) ── sync ──────┘
//!                                                    (OrderBatch)
//! ```
//!
//! ## Modules
//! - `reconcile`: move planning and full renumbering
//! - `sync`: the order batch protocol
//! - `store`: `BoardStore` trait and backends
//! - `api`: axum routes, auth, response envelope
//! - `client`: shadow state, optimistic controller, drag, HTTP transport
//! - `textgen`: chat-completions client and task assistant

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod sync;
pub mod textgen;
pub mod util;

pub use config::Config;
pub use error::{BoardError, BoardResult};
