//! SQLite-based board store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tokio::sync::Mutex;
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

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS workspaces (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workspaces_owner ON workspaces(owner_id);

CREATE TABLE IF NOT EXISTS boards (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    "order" INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
);

CREATE INDEX IF NOT EXISTS idx_boards_workspace ON boards(workspace_id, "order");

CREATE TABLE IF NOT EXISTS lists (
    id TEXT PRIMARY KEY NOT NULL,
    board_id TEXT NOT NULL,
    title TEXT NOT NULL,
    "order" INTEGER NOT NULL,
    FOREIGN KEY (board_id) REFERENCES boards(id)
);

CREATE INDEX IF NOT EXISTS idx_lists_board ON lists(board_id, "order");

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    list_id TEXT NOT NULL,
    parent_id TEXT,
    title TEXT NOT NULL,
    "order" INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    labels TEXT NOT NULL DEFAULT '[]',
    due_date TEXT,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (list_id) REFERENCES lists(id),
    FOREIGN KEY (parent_id) REFERENCES tasks(id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_list ON tasks(list_id, "order");
CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id) WHERE parent_id IS NOT NULL;
"#;

const TASK_COLUMNS: &str = r#"id, list_id, parent_id, title, "order", completed, labels, due_date,
    description, created_at, updated_at"#;

pub struct SqliteBoardStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBoardStore {
    /// Open (or create) the database at `db_path`.
    pub async fn open(db_path: PathBuf) -> BoardResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BoardError::PersistenceFailure(format!("Failed to create database dir: {}", e))
            })?;
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            Self::init(&conn)?;
            tracing::info!(path = %db_path.display(), "Opened SQLite board store");
            Ok::<_, BoardError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database, used by tests.
    pub async fn open_in_memory() -> BoardResult<Self> {
        let conn = tokio::task::spawn_blocking(|| {
            let conn = Connection::open_in_memory()?;
            Self::init(&conn)?;
            Ok::<_, BoardError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> BoardResult<()> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> BoardResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> BoardResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await?
    }
}

fn parse_uuid(value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_workspace(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    let id: String = row.get(0)?;
    Ok(Workspace {
        id: parse_uuid(&id)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_board(row: &Row<'_>) -> rusqlite::Result<Board> {
    let id: String = row.get(0)?;
    let workspace_id: String = row.get(1)?;
    Ok(Board {
        id: parse_uuid(&id)?,
        workspace_id: parse_uuid(&workspace_id)?,
        name: row.get(2)?,
        order: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_list(row: &Row<'_>) -> rusqlite::Result<TaskList> {
    let id: String = row.get(0)?;
    let board_id: String = row.get(1)?;
    Ok(TaskList {
        id: parse_uuid(&id)?,
        board_id: parse_uuid(&board_id)?,
        title: row.get(2)?,
        order: row.get(3)?,
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let list_id: String = row.get(1)?;
    let parent_id: Option<String> = row.get(2)?;
    let labels_json: String = row.get(6)?;
    let due_date: Option<String> = row.get(7)?;
    Ok(Task {
        id: parse_uuid(&id)?,
        list_id: parse_uuid(&list_id)?,
        parent_id: parent_id.as_deref().map(parse_uuid).transpose()?,
        title: row.get(3)?,
        order: row.get(4)?,
        completed: row.get(5)?,
        labels: serde_json::from_str(&labels_json).unwrap_or_default(),
        due_date: due_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        description: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn load_workspace(conn: &Connection, id: Uuid) -> BoardResult<Workspace> {
    conn.query_row(
        "SELECT id, owner_id, name, slug, description, created_at FROM workspaces WHERE id = ?1",
        params![id.to_string()],
        row_to_workspace,
    )
    .optional()?
    .ok_or_else(|| BoardError::workspace_not_found(id))
}

fn load_board(conn: &Connection, id: Uuid) -> BoardResult<Board> {
    conn.query_row(
        r#"SELECT id, workspace_id, name, "order", created_at FROM boards WHERE id = ?1"#,
        params![id.to_string()],
        row_to_board,
    )
    .optional()?
    .ok_or_else(|| BoardError::board_not_found(id))
}

fn load_list(conn: &Connection, id: Uuid) -> BoardResult<TaskList> {
    conn.query_row(
        r#"SELECT id, board_id, title, "order" FROM lists WHERE id = ?1"#,
        params![id.to_string()],
        row_to_list,
    )
    .optional()?
    .ok_or_else(|| BoardError::list_not_found(id))
}

fn load_task(conn: &Connection, id: Uuid) -> BoardResult<Task> {
    conn.query_row(
        &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
        params![id.to_string()],
        row_to_task,
    )
    .optional()?
    .ok_or_else(|| BoardError::task_not_found(id))
}

fn load_tasks_in(conn: &Connection, list_id: Uuid) -> BoardResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT {} FROM tasks WHERE list_id = ?1 ORDER BY "order" ASC, created_at ASC"#,
        TASK_COLUMNS
    ))?;
    let tasks = stmt
        .query_map(params![list_id.to_string()], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

fn next_task_order(conn: &Connection, list_id: Uuid) -> BoardResult<i64> {
    let max: Option<i64> = conn.query_row(
        r#"SELECT MAX("order") FROM tasks WHERE list_id = ?1"#,
        params![list_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next_order(max))
}

fn children_of(conn: &Connection, id: Uuid) -> BoardResult<Vec<Uuid>> {
    let mut stmt =
        conn.prepare(r#"SELECT id FROM tasks WHERE parent_id = ?1 ORDER BY "order" ASC"#)?;
    let ids = stmt
        .query_map(params![id.to_string()], |row| {
            let id: String = row.get(0)?;
            parse_uuid(&id)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn parent_of(conn: &Connection, id: Uuid) -> BoardResult<Option<Uuid>> {
    Ok(load_task(conn, id)?.parent_id)
}

fn check_parent(conn: &Connection, parent_id: Uuid, list_id: Uuid) -> BoardResult<()> {
    let parent = load_task(conn, parent_id)?;
    ensure_same_list(&parent, list_id)?;
    child_depth(parent_id, |id| parent_of(conn, id))?;
    Ok(())
}

fn insert_task(
    tx: &Transaction<'_>,
    list_id: Uuid,
    task: NewTask,
    order: i64,
) -> BoardResult<Task> {
    let now = now_string();
    let task = Task {
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
    };
    tx.execute(
        &format!(
            "INSERT INTO tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            TASK_COLUMNS
        ),
        params![
            task.id.to_string(),
            task.list_id.to_string(),
            task.parent_id.map(|p| p.to_string()),
            task.title,
            task.order,
            task.completed,
            serde_json::to_string(&task.labels)?,
            format_date(task.due_date),
            task.description,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(task)
}

/// Delete every task in the given lists, then the lists themselves.
fn delete_lists(tx: &Transaction<'_>, list_ids: &[String]) -> BoardResult<()> {
    for list_id in list_ids {
        // Clear parent links first so the self reference never blocks the delete.
        tx.execute(
            "UPDATE tasks SET parent_id = NULL WHERE list_id = ?1",
            params![list_id],
        )?;
        tx.execute("DELETE FROM tasks WHERE list_id = ?1", params![list_id])?;
        tx.execute("DELETE FROM lists WHERE id = ?1", params![list_id])?;
    }
    Ok(())
}

fn list_ids_of_board(tx: &Transaction<'_>, board_id: &str) -> BoardResult<Vec<String>> {
    let mut stmt = tx.prepare("SELECT id FROM lists WHERE board_id = ?1")?;
    let ids = stmt
        .query_map(params![board_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn apply_task_order(tx: &Transaction<'_>, batch: &OrderBatch) -> BoardResult<()> {
    for list_id in batch.containers() {
        load_list(tx, list_id)?;
    }

    // Every list an entry leaves or enters, so sub-trees and append slots resolve.
    let mut lists = batch.containers();
    for entry in &batch.entries {
        let current = load_task(tx, entry.item_id)?.list_id;
        if !lists.contains(&current) {
            lists.push(current);
        }
    }

    let mut rows: HashMap<Uuid, Placement> = HashMap::new();
    for list_id in &lists {
        for task in load_tasks_in(tx, *list_id)? {
            rows.insert(
                task.id,
                Placement {
                    list_id: task.list_id,
                    parent_id: task.parent_id,
                    order: task.order,
                },
            );
        }
    }

    let changed = apply_task_batch(&mut rows, batch)?;
    let now = now_string();
    let mut stmt = tx.prepare(
        r#"UPDATE tasks SET list_id = ?1, parent_id = ?2, "order" = ?3, updated_at = ?4
           WHERE id = ?5"#,
    )?;
    for id in changed {
        let Some(row) = rows.get(&id) else {
            continue;
        };
        let updated = stmt.execute(params![
            row.list_id.to_string(),
            row.parent_id.map(|p| p.to_string()),
            row.order,
            now,
            id.to_string(),
        ])?;
        if updated == 0 {
            return Err(BoardError::task_not_found(id));
        }
    }
    Ok(())
}

fn apply_list_order(tx: &Transaction<'_>, batch: &OrderBatch) -> BoardResult<()> {
    for board_id in batch.containers() {
        load_board(tx, board_id)?;
    }
    let mut stmt = tx.prepare(r#"UPDATE lists SET board_id = ?1, "order" = ?2 WHERE id = ?3"#)?;
    for entry in &batch.entries {
        let updated = stmt.execute(params![
            entry.container_id.to_string(),
            entry.order,
            entry.item_id.to_string(),
        ])?;
        if updated == 0 {
            return Err(BoardError::list_not_found(entry.item_id));
        }
    }

    let boards = batch.containers();
    let mut placed = Vec::new();
    let mut orders = tx.prepare(r#"SELECT "order" FROM lists WHERE board_id = ?1"#)?;
    for board_id in &boards {
        let rows = orders
            .query_map(params![board_id.to_string()], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        placed.extend(rows.into_iter().map(|order| (*board_id, order)));
    }
    ensure_distinct_orders(ItemKind::List, &boards, placed)
}

#[async_trait]
impl BoardStore for SqliteBoardStore {
    fn is_persistent(&self) -> bool {
        true
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
        let ws = workspace.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO workspaces (id, owner_id, name, slug, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ws.id.to_string(),
                    ws.owner_id,
                    ws.name,
                    ws.slug,
                    ws.description,
                    ws.created_at,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(workspace)
    }

    async fn list_workspaces(&self, owner_id: &str) -> BoardResult<Vec<Workspace>> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, name, slug, description, created_at
                 FROM workspaces WHERE owner_id = ?1 ORDER BY created_at ASC",
            )?;
            let workspaces = stmt
                .query_map(params![owner_id], row_to_workspace)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(workspaces)
        })
        .await
    }

    async fn get_workspace(&self, id: Uuid) -> BoardResult<Workspace> {
        self.with_conn(move |conn| load_workspace(conn, id)).await
    }

    async fn delete_workspace(&self, id: Uuid) -> BoardResult<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_workspace(&tx, id)?;
            let board_ids: Vec<String> = tx
                .prepare("SELECT id FROM boards WHERE workspace_id = ?1")?
                .query_map(params![id.to_string()], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            for board_id in &board_ids {
                let list_ids = list_ids_of_board(&tx, board_id)?;
                delete_lists(&tx, &list_ids)?;
            }
            tx.execute(
                "DELETE FROM boards WHERE workspace_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute("DELETE FROM workspaces WHERE id = ?1", params![id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn create_board(&self, workspace_id: Uuid, name: &str) -> BoardResult<Board> {
        let name = validate_title(name)?;
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_workspace(&tx, workspace_id)?;
            let max: Option<i64> = tx.query_row(
                r#"SELECT MAX("order") FROM boards WHERE workspace_id = ?1"#,
                params![workspace_id.to_string()],
                |row| row.get(0),
            )?;
            let board = Board {
                id: Uuid::new_v4(),
                workspace_id,
                name,
                order: next_order(max),
                created_at: now_string(),
            };
            tx.execute(
                r#"INSERT INTO boards (id, workspace_id, name, "order", created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    board.id.to_string(),
                    board.workspace_id.to_string(),
                    board.name,
                    board.order,
                    board.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(board)
        })
        .await
    }

    async fn list_boards(&self, workspace_id: Uuid) -> BoardResult<Vec<Board>> {
        self.with_conn(move |conn| {
            load_workspace(conn, workspace_id)?;
            let mut stmt = conn.prepare(
                r#"SELECT id, workspace_id, name, "order", created_at
                   FROM boards WHERE workspace_id = ?1 ORDER BY "order" ASC"#,
            )?;
            let boards = stmt
                .query_map(params![workspace_id.to_string()], row_to_board)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(boards)
        })
        .await
    }

    async fn get_board(&self, id: Uuid) -> BoardResult<Board> {
        self.with_conn(move |conn| load_board(conn, id)).await
    }

    async fn delete_board(&self, id: Uuid) -> BoardResult<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_board(&tx, id)?;
            let list_ids = list_ids_of_board(&tx, &id.to_string())?;
            delete_lists(&tx, &list_ids)?;
            tx.execute("DELETE FROM boards WHERE id = ?1", params![id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn create_list(&self, board_id: Uuid, title: &str) -> BoardResult<TaskList> {
        let title = validate_title(title)?;
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_board(&tx, board_id)?;
            let max: Option<i64> = tx.query_row(
                r#"SELECT MAX("order") FROM lists WHERE board_id = ?1"#,
                params![board_id.to_string()],
                |row| row.get(0),
            )?;
            let list = TaskList {
                id: Uuid::new_v4(),
                board_id,
                title,
                order: next_order(max),
            };
            tx.execute(
                r#"INSERT INTO lists (id, board_id, title, "order") VALUES (?1, ?2, ?3, ?4)"#,
                params![
                    list.id.to_string(),
                    list.board_id.to_string(),
                    list.title,
                    list.order,
                ],
            )?;
            tx.commit()?;
            Ok(list)
        })
        .await
    }

    async fn list_lists(&self, board_id: Uuid) -> BoardResult<Vec<TaskList>> {
        self.with_conn(move |conn| {
            load_board(conn, board_id)?;
            let mut stmt = conn.prepare(
                r#"SELECT id, board_id, title, "order"
                   FROM lists WHERE board_id = ?1 ORDER BY "order" ASC"#,
            )?;
            let lists = stmt
                .query_map(params![board_id.to_string()], row_to_list)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(lists)
        })
        .await
    }

    async fn get_list(&self, id: Uuid) -> BoardResult<TaskList> {
        self.with_conn(move |conn| load_list(conn, id)).await
    }

    async fn rename_list(&self, id: Uuid, title: &str) -> BoardResult<TaskList> {
        let title = validate_title(title)?;
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE lists SET title = ?1 WHERE id = ?2",
                params![title, id.to_string()],
            )?;
            if updated == 0 {
                return Err(BoardError::list_not_found(id));
            }
            load_list(conn, id)
        })
        .await
    }

    async fn delete_list(&self, id: Uuid) -> BoardResult<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_list(&tx, id)?;
            delete_lists(&tx, &[id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn create_task(&self, list_id: Uuid, task: NewTask) -> BoardResult<Task> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_list(&tx, list_id)?;
            if let Some(parent_id) = task.parent_id {
                check_parent(&tx, parent_id, list_id)?;
            }
            let order = next_task_order(&tx, list_id)?;
            let task = insert_task(&tx, list_id, task, order)?;
            tx.commit()?;
            Ok(task)
        })
        .await
    }

    async fn create_subtasks(
        &self,
        parent_id: Uuid,
        titles: &[String],
    ) -> BoardResult<Vec<Task>> {
        let titles = titles.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let list_id = load_task(&tx, parent_id)?.list_id;
            check_parent(&tx, parent_id, list_id)?;
            let mut order = next_task_order(&tx, list_id)?;
            let mut created = Vec::with_capacity(titles.len());
            for title in titles {
                created.push(insert_task(
                    &tx,
                    list_id,
                    NewTask::subtask_of(parent_id, title),
                    order,
                )?);
                order += 1;
            }
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> BoardResult<Task> {
        self.with_conn(move |conn| load_task(conn, id)).await
    }

    async fn list_tasks(&self, list_id: Uuid) -> BoardResult<Vec<Task>> {
        self.with_conn(move |conn| {
            load_list(conn, list_id)?;
            load_tasks_in(conn, list_id)
        })
        .await
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> BoardResult<Task> {
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut task = load_task(&tx, id)?;
            patch.apply_to(&mut task)?;
            task.updated_at = now_string();
            tx.execute(
                "UPDATE tasks SET title = ?1, description = ?2, completed = ?3, labels = ?4,
                        due_date = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    task.title,
                    task.description,
                    task.completed,
                    serde_json::to_string(&task.labels)?,
                    format_date(task.due_date),
                    task.updated_at,
                    id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(task)
        })
        .await
    }

    async fn delete_task(&self, id: Uuid, cascade: bool) -> BoardResult<Vec<Uuid>> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            load_task(&tx, id)?;
            let descendants = collect_descendants(id, |p| children_of(&tx, p))?;
            if !descendants.is_empty() && !cascade {
                return Err(BoardError::MalformedInput(format!(
                    "Task {} has {} sub-tasks; delete with cascade",
                    id,
                    descendants.len()
                )));
            }
            // Deepest first so no row ever points at a deleted parent.
            for task_id in descendants.iter().rev() {
                tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id.to_string()])?;
            }
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
            tx.commit()?;

            let mut deleted = vec![id];
            deleted.extend(descendants);
            Ok(deleted)
        })
        .await
    }

    async fn upsert_order(&self, batch: &OrderBatch) -> BoardResult<()> {
        batch.validate()?;
        let batch = batch.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            match batch.kind {
                ItemKind::Task => apply_task_order(&tx, &batch)?,
                ItemKind::List => apply_list_order(&tx, &batch)?,
            }
            tx.commit()?;
            tracing::debug!(
                kind = %batch.kind,
                entries = batch.entries.len(),
                "Applied order batch"
            );
            Ok(())
        })
        .await
    }

    async fn owner_of(&self, resource: Resource) -> BoardResult<String> {
        self.with_conn(move |conn| {
            let workspace_id = match resource {
                Resource::Workspace(id) => id,
                Resource::Board(id) => load_board(conn, id)?.workspace_id,
                Resource::List(id) => load_board(conn, load_list(conn, id)?.board_id)?.workspace_id,
                Resource::Task(id) => {
                    let list = load_list(conn, load_task(conn, id)?.list_id)?;
                    load_board(conn, list.board_id)?.workspace_id
                }
            };
            Ok(load_workspace(conn, workspace_id)?.owner_id)
        })
        .await
    }

    async fn task_context(&self, task_id: Uuid) -> BoardResult<TaskContext> {
        self.with_conn(move |conn| {
            let task = load_task(conn, task_id)?;
            let list = load_list(conn, task.list_id)?;
            let board = load_board(conn, list.board_id)?;
            let workspace = load_workspace(conn, board.workspace_id)?;
            Ok(TaskContext {
                task,
                list_title: list.title,
                board_name: board.name,
                workspace_name: workspace.name,
                workspace_slug: workspace.slug,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("board.db");

        let (list_id, task_id) = {
            let store = SqliteBoardStore::open(path.clone()).await.unwrap();
            let ws = store.create_workspace("u", "Team", Some("desc")).await.unwrap();
            let board = store.create_board(ws.id, "Main").await.unwrap();
            let list = store.create_list(board.id, "Todo").await.unwrap();
            let mut new = NewTask::titled("Persist me");
            new.labels = vec!["Green".to_string()];
            new.due_date = NaiveDate::from_ymd_opt(2026, 3, 1);
            let task = store.create_task(list.id, new).await.unwrap();
            (list.id, task.id)
        };

        let store = SqliteBoardStore::open(path).await.unwrap();
        assert!(store.is_persistent());
        let tasks = store.list_tasks(list_id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, task_id);
        assert_eq!(tasks[0].labels, vec!["Green"]);
        assert_eq!(tasks[0].due_date, NaiveDate::from_ymd_opt(2026, 3, 1));
    }

    #[tokio::test]
    async fn test_schema_init_is_idempotent() {
        let store = SqliteBoardStore::open_in_memory().await.unwrap();
        let ws = store.create_workspace("dana", "Home", None).await.unwrap();
        store
            .with_conn(|conn| SqliteBoardStore::init(conn))
            .await
            .unwrap();
        assert_eq!(store.get_workspace(ws.id).await.unwrap().name, "Home");
    }
}
