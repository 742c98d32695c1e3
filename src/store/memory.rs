//! In-memory board store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::placement::{
    apply_task_batch, child_depth, collect_descendants, ensure_distinct_orders, Placement,
};
use super::{ensure_same_list, next_order, BoardStore};
use crate::error::{BoardError, BoardResult};
use crate::model::{
    normalize_labels, validate_title, Board, NewTask, Resource, Task, TaskContext, TaskList,
    TaskPatch, Workspace,
};
use crate::sync::{ItemKind, OrderBatch};
use crate::util::{now_string, workspace_slug};

#[derive(Debug, Default, Clone)]
struct BoardData {
    workspaces: HashMap<Uuid, Workspace>,
    boards: HashMap<Uuid, Board>,
    lists: HashMap<Uuid, TaskList>,
    tasks: HashMap<Uuid, Task>,
}

impl BoardData {
    fn workspace(&self, id: Uuid) -> BoardResult<&Workspace> {
        self.workspaces
            .get(&id)
            .ok_or_else(|| BoardError::workspace_not_found(id))
    }

    fn board(&self, id: Uuid) -> BoardResult<&Board> {
        self.boards.get(&id).ok_or_else(|| BoardError::board_not_found(id))
    }

    fn list(&self, id: Uuid) -> BoardResult<&TaskList> {
        self.lists.get(&id).ok_or_else(|| BoardError::list_not_found(id))
    }

    fn task(&self, id: Uuid) -> BoardResult<&Task> {
        self.tasks.get(&id).ok_or_else(|| BoardError::task_not_found(id))
    }

    fn tasks_in(&self, list_id: Uuid) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.list_id == list_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        tasks
    }

    fn next_task_order(&self, list_id: Uuid) -> i64 {
        next_order(
            self.tasks
                .values()
                .filter(|t| t.list_id == list_id)
                .map(|t| t.order),
        )
    }

    fn children_of(&self, id: Uuid) -> Vec<Uuid> {
        let mut kids: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.parent_id == Some(id))
            .collect();
        kids.sort_by_key(|t| t.order);
        kids.into_iter().map(|t| t.id).collect()
    }

    fn remove_lists(&mut self, list_ids: &[Uuid]) {
        self.tasks.retain(|_, t| !list_ids.contains(&t.list_id));
        for id in list_ids {
            self.lists.remove(id);
        }
    }

    fn new_task(&self, list_id: Uuid, task: NewTask, order: i64) -> BoardResult<Task> {
        let now = now_string();
        Ok(Task {
            id: Uuid::new_v4(),
            list_id,
            parent_id: task.parent_id,
            title: validate_title(&task.title)?,
            order,
            completed: false,
            labels: normalize_labels(task.labels),
            due_date: task.due_date,
            description: task.description,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    fn check_parent(&self, parent_id: Uuid, list_id: Uuid) -> BoardResult<()> {
        let parent = self.task(parent_id)?;
        ensure_same_list(parent, list_id)?;
        child_depth(parent_id, |id| Ok(self.task(id)?.parent_id))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemoryBoardStore {
    data: Arc<RwLock<BoardData>>,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BoardData::default())),
        }
    }
}

impl Default for InMemoryBoardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn create_workspace(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> BoardResult<Workspace> {
        let name = validate_title(name)?;
        let workspace = Workspace {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            slug: workspace_slug(&name),
            name,
            description: description.map(str::to_string),
            created_at: now_string(),
        };
        self.data
            .write()
            .await
            .workspaces
            .insert(workspace.id, workspace.clone());
        Ok(workspace)
    }

    async fn list_workspaces(&self, owner_id: &str) -> BoardResult<Vec<Workspace>> {
        let mut workspaces: Vec<Workspace> = self
            .data
            .read()
            .await
            .workspaces
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect();
        workspaces.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(workspaces)
    }

    async fn get_workspace(&self, id: Uuid) -> BoardResult<Workspace> {
        self.data.read().await.workspace(id).cloned()
    }

    async fn delete_workspace(&self, id: Uuid) -> BoardResult<()> {
        let mut data = self.data.write().await;
        data.workspace(id)?;
        let board_ids: Vec<Uuid> = data
            .boards
            .values()
            .filter(|b| b.workspace_id == id)
            .map(|b| b.id)
            .collect();
        let list_ids: Vec<Uuid> = data
            .lists
            .values()
            .filter(|l| board_ids.contains(&l.board_id))
            .map(|l| l.id)
            .collect();
        data.remove_lists(&list_ids);
        data.boards.retain(|_, b| b.workspace_id != id);
        data.workspaces.remove(&id);
        Ok(())
    }

    async fn create_board(&self, workspace_id: Uuid, name: &str) -> BoardResult<Board> {
        let name = validate_title(name)?;
        let mut data = self.data.write().await;
        data.workspace(workspace_id)?;
        let order = next_order(
            data.boards
                .values()
                .filter(|b| b.workspace_id == workspace_id)
                .map(|b| b.order),
        );
        let board = Board {
            id: Uuid::new_v4(),
            workspace_id,
            name,
            order,
            created_at: now_string(),
        };
        data.boards.insert(board.id, board.clone());
        Ok(board)
    }

    async fn list_boards(&self, workspace_id: Uuid) -> BoardResult<Vec<Board>> {
        let data = self.data.read().await;
        data.workspace(workspace_id)?;
        let mut boards: Vec<Board> = data
            .boards
            .values()
            .filter(|b| b.workspace_id == workspace_id)
            .cloned()
            .collect();
        boards.sort_by_key(|b| b.order);
        Ok(boards)
    }

    async fn get_board(&self, id: Uuid) -> BoardResult<Board> {
        self.data.read().await.board(id).cloned()
    }

    async fn delete_board(&self, id: Uuid) -> BoardResult<()> {
        let mut data = self.data.write().await;
        data.board(id)?;
        let list_ids: Vec<Uuid> = data
            .lists
            .values()
            .filter(|l| l.board_id == id)
            .map(|l| l.id)
            .collect();
        data.remove_lists(&list_ids);
        data.boards.remove(&id);
        Ok(())
    }

    async fn create_list(&self, board_id: Uuid, title: &str) -> BoardResult<TaskList> {
        let title = validate_title(title)?;
        let mut data = self.data.write().await;
        data.board(board_id)?;
        let order = next_order(
            data.lists
                .values()
                .filter(|l| l.board_id == board_id)
                .map(|l| l.order),
        );
        let list = TaskList {
            id: Uuid::new_v4(),
            board_id,
            title,
            order,
        };
        data.lists.insert(list.id, list.clone());
        Ok(list)
    }

    async fn list_lists(&self, board_id: Uuid) -> BoardResult<Vec<TaskList>> {
        let data = self.data.read().await;
        data.board(board_id)?;
        let mut lists: Vec<TaskList> = data
            .lists
            .values()
            .filter(|l| l.board_id == board_id)
            .cloned()
            .collect();
        lists.sort_by_key(|l| l.order);
        Ok(lists)
    }

    async fn get_list(&self, id: Uuid) -> BoardResult<TaskList> {
        self.data.read().await.list(id).cloned()
    }

    async fn rename_list(&self, id: Uuid, title: &str) -> BoardResult<TaskList> {
        let title = validate_title(title)?;
        let mut data = self.data.write().await;
        let list = data
            .lists
            .get_mut(&id)
            .ok_or_else(|| BoardError::list_not_found(id))?;
        list.title = title;
        Ok(list.clone())
    }

    async fn delete_list(&self, id: Uuid) -> BoardResult<()> {
        let mut data = self.data.write().await;
        data.list(id)?;
        data.remove_lists(&[id]);
        Ok(())
    }

    async fn create_task(&self, list_id: Uuid, task: NewTask) -> BoardResult<Task> {
        let mut data = self.data.write().await;
        data.list(list_id)?;
        if let Some(parent_id) = task.parent_id {
            data.check_parent(parent_id, list_id)?;
        }
        let order = data.next_task_order(list_id);
        let task = data.new_task(list_id, task, order)?;
        data.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn create_subtasks(
        &self,
        parent_id: Uuid,
        titles: &[String],
    ) -> BoardResult<Vec<Task>> {
        let mut data = self.data.write().await;
        let list_id = data.task(parent_id)?.list_id;
        data.check_parent(parent_id, list_id)?;

        let mut order = data.next_task_order(list_id);
        let mut created = Vec::with_capacity(titles.len());
        for title in titles {
            created.push(data.new_task(list_id, NewTask::subtask_of(parent_id, title), order)?);
            order += 1;
        }
        for task in &created {
            data.tasks.insert(task.id, task.clone());
        }
        Ok(created)
    }

    async fn get_task(&self, id: Uuid) -> BoardResult<Task> {
        self.data.read().await.task(id).cloned()
    }

    async fn list_tasks(&self, list_id: Uuid) -> BoardResult<Vec<Task>> {
        let data = self.data.read().await;
        data.list(list_id)?;
        Ok(data.tasks_in(list_id))
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> BoardResult<Task> {
        let mut data = self.data.write().await;
        let mut task = data.task(id)?.clone();
        patch.apply_to(&mut task)?;
        task.updated_at = now_string();
        data.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid, cascade: bool) -> BoardResult<Vec<Uuid>> {
        let mut data = self.data.write().await;
        data.task(id)?;
        let descendants = collect_descendants(id, |p| Ok(data.children_of(p)))?;
        if !descendants.is_empty() && !cascade {
            return Err(BoardError::MalformedInput(format!(
                "Task {} has {} sub-tasks; delete with cascade",
                id,
                descendants.len()
            )));
        }
        let mut deleted = vec![id];
        deleted.extend(descendants);
        for task_id in &deleted {
            data.tasks.remove(task_id);
        }
        Ok(deleted)
    }

    async fn upsert_order(&self, batch: &OrderBatch) -> BoardResult<()> {
        batch.validate()?;
        let mut data = self.data.write().await;
        match batch.kind {
            ItemKind::Task => {
                for list_id in batch.containers() {
                    data.list(list_id)?;
                }
                let mut rows: HashMap<Uuid, Placement> = data
                    .tasks
                    .values()
                    .map(|t| {
                        (
                            t.id,
                            Placement {
                                list_id: t.list_id,
                                parent_id: t.parent_id,
                                order: t.order,
                            },
                        )
                    })
                    .collect();
                let changed = apply_task_batch(&mut rows, batch)?;
                let now = now_string();
                for id in changed {
                    if let (Some(task), Some(row)) = (data.tasks.get_mut(&id), rows.get(&id)) {
                        task.list_id = row.list_id;
                        task.parent_id = row.parent_id;
                        task.order = row.order;
                        task.updated_at = now.clone();
                    }
                }
            }
            ItemKind::List => {
                for board_id in batch.containers() {
                    data.board(board_id)?;
                }
                for entry in &batch.entries {
                    data.list(entry.item_id)?;
                }
                let mut placed: HashMap<Uuid, (Uuid, i64)> = data
                    .lists
                    .values()
                    .map(|l| (l.id, (l.board_id, l.order)))
                    .collect();
                for entry in &batch.entries {
                    placed.insert(entry.item_id, (entry.container_id, entry.order));
                }
                ensure_distinct_orders(
                    ItemKind::List,
                    &batch.containers(),
                    placed.into_values(),
                )?;
                for entry in &batch.entries {
                    if let Some(list) = data.lists.get_mut(&entry.item_id) {
                        list.board_id = entry.container_id;
                        list.order = entry.order;
                    }
                }
            }
        }
        tracing::debug!(
            kind = %batch.kind,
            entries = batch.entries.len(),
            "Applied order batch"
        );
        Ok(())
    }

    async fn owner_of(&self, resource: Resource) -> BoardResult<String> {
        let data = self.data.read().await;
        let workspace_id = match resource {
            Resource::Workspace(id) => id,
            Resource::Board(id) => data.board(id)?.workspace_id,
            Resource::List(id) => data.board(data.list(id)?.board_id)?.workspace_id,
            Resource::Task(id) => {
                let list = data.list(data.task(id)?.list_id)?;
                data.board(list.board_id)?.workspace_id
            }
        };
        Ok(data.workspace(workspace_id)?.owner_id.clone())
    }

    async fn task_context(&self, task_id: Uuid) -> BoardResult<TaskContext> {
        let data = self.data.read().await;
        let task = data.task(task_id)?;
        let list = data.list(task.list_id)?;
        let board = data.board(list.board_id)?;
        let workspace = data.workspace(board.workspace_id)?;
        Ok(TaskContext {
            task: task.clone(),
            list_title: list.title.clone(),
            board_name: board.name.clone(),
            workspace_name: workspace.name.clone(),
            workspace_slug: workspace.slug.clone(),
        })
    }
}
