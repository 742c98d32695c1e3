//! Board storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing and demos)
//! - `sqlite`: SQLite database, every operation a self-contained transaction
//!
//! The store is the source of truth for order values. Callers compute new orders with
//! [`crate::reconcile`] and persist them through [`BoardStore::upsert_order`].

mod memory;
mod placement;
mod sqlite;

pub use memory::InMemoryBoardStore;
pub use sqlite::SqliteBoardStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{BoardError, BoardResult};
use crate::model::{
    Board, BoardSnapshot, ListWithTasks, NewTask, Resource, Task, TaskContext, TaskList,
    TaskPatch, Workspace,
};
use crate::reconcile::{plan_move, ContainerSeq, Move};
use crate::sync::{ItemKind, OrderBatch};

#[async_trait]
pub trait BoardStore: Send + Sync {
    fn is_persistent(&self) -> bool;

    // === Workspaces ===

    async fn create_workspace(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> BoardResult<Workspace>;

    /// Workspaces owned by `owner_id`, oldest first.
    async fn list_workspaces(&self, owner_id: &str) -> BoardResult<Vec<Workspace>>;

    async fn get_workspace(&self, id: Uuid) -> BoardResult<Workspace>;

    /// Deletes tasks, lists, boards and finally the workspace in one transaction.
    async fn delete_workspace(&self, id: Uuid) -> BoardResult<()>;

    // === Boards ===

    /// Appends the board to the workspace's board sequence.
    async fn create_board(&self, workspace_id: Uuid, name: &str) -> BoardResult<Board>;

    async fn list_boards(&self, workspace_id: Uuid) -> BoardResult<Vec<Board>>;

    async fn get_board(&self, id: Uuid) -> BoardResult<Board>;

    async fn delete_board(&self, id: Uuid) -> BoardResult<()>;

    // === Lists ===

    /// Appends the list to the board's list sequence.
    async fn create_list(&self, board_id: Uuid, title: &str) -> BoardResult<TaskList>;

    /// Lists of a board in display order.
    async fn list_lists(&self, board_id: Uuid) -> BoardResult<Vec<TaskList>>;

    async fn get_list(&self, id: Uuid) -> BoardResult<TaskList>;

    async fn rename_list(&self, id: Uuid, title: &str) -> BoardResult<TaskList>;

    /// Deletes the list and every task in it.
    async fn delete_list(&self, id: Uuid) -> BoardResult<()>;

    // === Tasks ===

    /// Appends the task to the list. A parent, when given, must live in the same list.
    async fn create_task(&self, list_id: Uuid, task: NewTask) -> BoardResult<Task>;

    /// Creates one sub-task per title under `parent_id`, all in one transaction.
    async fn create_subtasks(&self, parent_id: Uuid, titles: &[String])
        -> BoardResult<Vec<Task>>;

    async fn get_task(&self, id: Uuid) -> BoardResult<Task>;

    /// Tasks of a list (sub-tasks included) in display order.
    async fn list_tasks(&self, list_id: Uuid) -> BoardResult<Vec<Task>>;

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> BoardResult<Task>;

    /// Deletes a task. With `cascade` its sub-tree goes too; without it a task that still
    /// has sub-tasks is rejected. Returns every deleted id.
    async fn delete_task(&self, id: Uuid, cascade: bool) -> BoardResult<Vec<Uuid>>;

    // === Ordering ===

    /// Apply an order batch atomically: either every entry lands or none does.
    async fn upsert_order(&self, batch: &OrderBatch) -> BoardResult<()>;

    // === Lookups ===

    /// Owner of the workspace that contains `resource`.
    async fn owner_of(&self, resource: Resource) -> BoardResult<String>;

    async fn task_context(&self, task_id: Uuid) -> BoardResult<TaskContext>;

    /// Lists and tasks of a board, both in display order.
    async fn board_snapshot(&self, board_id: Uuid) -> BoardResult<BoardSnapshot> {
        let board = self.get_board(board_id).await?;
        let lists = futures::future::try_join_all(
            self.list_lists(board_id)
                .await?
                .into_iter()
                .map(|list| async move {
                    let tasks = self.list_tasks(list.id).await?;
                    Ok::<_, BoardError>(ListWithTasks { list, tasks })
                }),
        )
        .await?;
        Ok(BoardSnapshot { board, lists })
    }

    /// Move a task to `target_index` of `list_id`, renumbering both lists.
    async fn move_task(&self, id: Uuid, list_id: Uuid, target_index: usize) -> BoardResult<Task> {
        let task = self.get_task(id).await?;
        let mut containers = vec![task_seq(task.list_id, self.list_tasks(task.list_id).await?)];
        if list_id != task.list_id {
            containers.push(task_seq(list_id, self.list_tasks(list_id).await?));
        }
        let plan = plan_move(
            &containers,
            &Move {
                item_id: id,
                from: task.list_id,
                to: list_id,
                target_index,
            },
        )?;
        self.upsert_order(&OrderBatch::from_plan(ItemKind::Task, &plan))
            .await?;
        self.get_task(id).await
    }

    /// Move a list to `target_index` of `board_id`, renumbering both boards.
    async fn move_list(
        &self,
        id: Uuid,
        board_id: Uuid,
        target_index: usize,
    ) -> BoardResult<TaskList> {
        let list = self.get_list(id).await?;
        let mut containers = vec![list_seq(list.board_id, self.list_lists(list.board_id).await?)];
        if board_id != list.board_id {
            containers.push(list_seq(board_id, self.list_lists(board_id).await?));
        }
        let plan = plan_move(
            &containers,
            &Move {
                item_id: id,
                from: list.board_id,
                to: board_id,
                target_index,
            },
        )?;
        self.upsert_order(&OrderBatch::from_plan(ItemKind::List, &plan))
            .await?;
        self.get_list(id).await
    }
}

fn task_seq(list_id: Uuid, tasks: Vec<Task>) -> ContainerSeq<Uuid> {
    ContainerSeq::new(list_id, tasks.into_iter().map(|t| t.id).collect())
}

fn list_seq(board_id: Uuid, lists: Vec<TaskList>) -> ContainerSeq<Uuid> {
    ContainerSeq::new(board_id, lists.into_iter().map(|l| l.id).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoardStoreType {
    Memory,
    #[default]
    Sqlite,
}

impl std::str::FromStr for BoardStoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" | "db" => Ok(Self::Sqlite),
            other => Err(format!("unknown store type '{}'", other)),
        }
    }
}

pub async fn create_board_store(
    store_type: BoardStoreType,
    database_path: PathBuf,
) -> BoardResult<Arc<dyn BoardStore>> {
    match store_type {
        BoardStoreType::Memory => Ok(Arc::new(InMemoryBoardStore::new())),
        BoardStoreType::Sqlite => {
            let store = SqliteBoardStore::open(database_path).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Next append slot for a sequence with the given orders.
pub(crate) fn next_order(orders: impl IntoIterator<Item = i64>) -> i64 {
    orders.into_iter().max().map_or(0, |max| max + 1)
}

pub(crate) fn ensure_same_list(parent: &Task, list_id: Uuid) -> BoardResult<()> {
    if parent.list_id != list_id {
        return Err(BoardError::MalformedInput(format!(
            "Parent task {} lives in another list",
            parent.id
        )));
    }
    Ok(())
}
