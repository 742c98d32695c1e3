//! Batch sync protocol: one gesture's worth of order changes, persisted atomically.
//!
//! A batch describes the complete desired state of every container a gesture touched.
//! The store applies it in a single transaction; validation happens here, before any
//! storage is touched.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BoardError, BoardResult};
use crate::reconcile::{MovePlan, OrderEntry};

/// Which table a batch reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Tasks ordered within lists.
    Task,
    /// Lists ordered within boards.
    List,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::List => write!(f, "list"),
        }
    }
}

/// An atomic set of `(item, order, container)` triples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBatch<I = Uuid> {
    pub kind: ItemKind,
    pub entries: Vec<OrderEntry<I>>,
}

impl<I: Clone + Eq + Hash + Display> OrderBatch<I> {
    pub fn new(kind: ItemKind, entries: Vec<OrderEntry<I>>) -> Self {
        Self { kind, entries }
    }

    /// Batch persisting every container a move plan touched.
    pub fn from_plan(kind: ItemKind, plan: &MovePlan<I>) -> Self {
        Self::new(kind, plan.entries())
    }

    /// Containers named by the batch, in first-seen order.
    pub fn containers(&self) -> Vec<I> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.container_id.clone()))
            .map(|e| e.container_id.clone())
            .collect()
    }

    /// Reject batches that could not describe a consistent ordering.
    pub fn validate(&self) -> BoardResult<()> {
        if self.entries.is_empty() {
            return Err(BoardError::MalformedInput(format!(
                "Empty {} order batch",
                self.kind
            )));
        }

        let mut items = HashSet::new();
        let mut slots = HashSet::new();
        for entry in &self.entries {
            if entry.order < 0 {
                return Err(BoardError::MalformedInput(format!(
                    "Negative order {} for {} {}",
                    entry.order, self.kind, entry.item_id
                )));
            }
            if !items.insert(entry.item_id.clone()) {
                return Err(BoardError::MalformedInput(format!(
                    "Duplicate {} {} in batch",
                    self.kind, entry.item_id
                )));
            }
            if !slots.insert((entry.container_id.clone(), entry.order)) {
                return Err(BoardError::MalformedInput(format!(
                    "Duplicate order {} in container {}",
                    entry.order, entry.container_id
                )));
            }
        }
        Ok(())
    }

    /// Re-key the batch, e.g. from client ids to server ids. `None` from `f` fails the
    /// whole conversion.
    pub fn try_map<J, F>(&self, mut f: F) -> Option<OrderBatch<J>>
    where
        F: FnMut(&I) -> Option<J>,
    {
        let entries = self
            .entries
            .iter()
            .map(|e| {
                Some(OrderEntry {
                    item_id: f(&e.item_id)?,
                    order: e.order,
                    container_id: f(&e.container_id)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(OrderBatch {
            kind: self.kind,
            entries,
        })
    }
}
