//! Optimistic mutation controller.
//!
//! Every mutation is applied to the local state at once and then persisted. On success
//! the temporary id is swapped for the server's id in place; on failure the local state
//! is rebuilt from the last confirmed snapshot plus the mutations still in flight.
//!
//! Dispatches touching the same container are serialized through per-container gates,
//! acquired in sorted order. The state lock is never held across a transport call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::state::{BoardState, ListColumn, TaskCard};
use super::transport::Transport;
use super::ClientId;
use crate::error::{BoardError, BoardResult};
use crate::model::{NewTask, TaskPatch};
use crate::reconcile::{plan_move, renumber, Move};
use crate::sync::{ItemKind, OrderBatch};

/// A user-initiated change to the board.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateTask {
        id: ClientId,
        list_id: ClientId,
        parent_id: Option<ClientId>,
        title: String,
    },
    RenameTask {
        id: ClientId,
        title: String,
    },
    /// Removes the task and its sub-tree.
    DeleteTask {
        id: ClientId,
    },
    MoveTask(Move<ClientId>),
    CreateList {
        id: ClientId,
        title: String,
    },
    RenameList {
        id: ClientId,
        title: String,
    },
    DeleteList {
        id: ClientId,
    },
    /// Reorder lists within the loaded board.
    MoveList(Move<ClientId>),
}

impl Mutation {
    fn describe(&self) -> String {
        match self {
            Mutation::CreateTask { id, title, .. } => format!("create task '{}' ({})", title, id),
            Mutation::RenameTask { id, .. } => format!("rename task {}", id),
            Mutation::DeleteTask { id } => format!("delete task {}", id),
            Mutation::MoveTask(mv) => format!("move task {} to {}", mv.item_id, mv.to),
            Mutation::CreateList { id, title } => format!("create list '{}' ({})", title, id),
            Mutation::RenameList { id, .. } => format!("rename list {}", id),
            Mutation::DeleteList { id } => format!("delete list {}", id),
            Mutation::MoveList(mv) => format!("move list {}", mv.item_id),
        }
    }

    /// Failures of these surface as a `Notice`; reorders and renames only log.
    fn notifies_on_failure(&self) -> bool {
        matches!(
            self,
            Mutation::CreateTask { .. }
                | Mutation::DeleteTask { .. }
                | Mutation::CreateList { .. }
                | Mutation::DeleteList { .. }
        )
    }

    fn created_id(&self) -> Option<ClientId> {
        match self {
            Mutation::CreateTask { id, .. } | Mutation::CreateList { id, .. } => Some(*id),
            _ => None,
        }
    }

    fn map_ids(&self, f: impl Fn(ClientId) -> ClientId) -> Mutation {
        let map_move = |mv: &Move<ClientId>| Move {
            item_id: f(mv.item_id),
            from: f(mv.from),
            to: f(mv.to),
            target_index: mv.target_index,
        };
        match self {
            Mutation::CreateTask {
                id,
                list_id,
                parent_id,
                title,
            } => Mutation::CreateTask {
                id: f(*id),
                list_id: f(*list_id),
                parent_id: parent_id.map(&f),
                title: title.clone(),
            },
            Mutation::RenameTask { id, title } => Mutation::RenameTask {
                id: f(*id),
                title: title.clone(),
            },
            Mutation::DeleteTask { id } => Mutation::DeleteTask { id: f(*id) },
            Mutation::MoveTask(mv) => Mutation::MoveTask(map_move(mv)),
            Mutation::CreateList { id, title } => Mutation::CreateList {
                id: f(*id),
                title: title.clone(),
            },
            Mutation::RenameList { id, title } => Mutation::RenameList {
                id: f(*id),
                title: title.clone(),
            },
            Mutation::DeleteList { id } => Mutation::DeleteList { id: f(*id) },
            Mutation::MoveList(mv) => Mutation::MoveList(map_move(mv)),
        }
    }

    /// Gate keys: the containers whose contents this mutation changes, sorted.
    fn containers(&self, state: &BoardState) -> BoardResult<Vec<ClientId>> {
        let mut keys = match self {
            Mutation::CreateTask { list_id, .. } => vec![*list_id],
            Mutation::RenameTask { id, .. } | Mutation::DeleteTask { id } => {
                vec![state
                    .list_of(id)
                    .ok_or_else(|| BoardError::NotFound(format!("Task {}", id)))?]
            }
            Mutation::MoveTask(mv) | Mutation::MoveList(mv) => vec![mv.from, mv.to],
            // The list's own key makes task mutations inside a new list wait for it.
            Mutation::CreateList { id, .. } | Mutation::DeleteList { id } => {
                vec![state.board_container()?, *id]
            }
            Mutation::RenameList { id, .. } => vec![*id],
        };
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn apply(&self, state: &mut BoardState) -> BoardResult<()> {
        match self {
            Mutation::CreateTask {
                id,
                list_id,
                parent_id,
                title,
            } => state.push_task(list_id, TaskCard::new(*id, title.clone(), *parent_id)),
            Mutation::RenameTask { id, title } => state.rename_task(id, title),
            Mutation::DeleteTask { id } => state.remove_task(id).map(|_| ()),
            Mutation::MoveTask(mv) => {
                let plan = plan_move(&state.task_seqs(), mv)?;
                state.apply_task_plan(&plan)
            }
            Mutation::CreateList { id, title } => {
                state.board_container()?;
                state.push_list(ListColumn {
                    id: *id,
                    title: title.clone(),
                    tasks: Vec::new(),
                });
                Ok(())
            }
            Mutation::RenameList { id, title } => state.rename_list(id, title),
            Mutation::DeleteList { id } => state.remove_list(id).map(|_| ()),
            Mutation::MoveList(mv) => {
                let plan = plan_move(&[state.list_seq()?], mv)?;
                state.apply_list_plan(&plan)
            }
        }
    }
}

/// Lifecycle of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    AppliedLocally,
    PendingPersist,
    Confirmed,
    RolledBack,
}

/// Terminal result of a mutation. Failures are values, never panics or errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Persisted. `server_id` is the id the server assigned to a created record.
    Confirmed { server_id: Option<Uuid> },
    RolledBack { error: BoardError },
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed { .. })
    }
}

/// User-visible failure report.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub error: BoardError,
}

struct PendingMutation {
    seq: u64,
    mutation: Mutation,
    phase: MutationPhase,
}

/// What `stage` hands to the dispatching half of `submit`.
struct Staged {
    seq: u64,
    gates: Vec<Arc<Mutex<()>>>,
}

#[derive(Default)]
struct ControllerState {
    confirmed: BoardState,
    local: BoardState,
    pending: Vec<PendingMutation>,
    /// Temporary id number -> server id, for every confirmed create.
    ids: HashMap<u64, Uuid>,
    gates: HashMap<ClientId, Arc<Mutex<()>>>,
    notices: Vec<Notice>,
    next_seq: u64,
}

impl ControllerState {
    fn resolve_id(&self, id: ClientId) -> ClientId {
        match id {
            ClientId::Temp(n) => self
                .ids
                .get(&n)
                .copied()
                .map(ClientId::Server)
                .unwrap_or(id),
            server => server,
        }
    }

    fn translate(&self, mutation: &Mutation) -> Mutation {
        mutation.map_ids(|id| self.resolve_id(id))
    }

    /// Apply locally and register as pending. `Ok(None)` means there is nothing to persist.
    fn stage(&mut self, mutation: &Mutation) -> BoardResult<Option<Staged>> {
        let keys = mutation.containers(&self.local)?;

        let seqs = match mutation {
            Mutation::MoveTask(mv) => Some((mv, self.local.task_seqs())),
            Mutation::MoveList(mv) => Some((mv, vec![self.local.list_seq()?])),
            _ => None,
        };
        if let Some((mv, seqs)) = seqs {
            if plan_move(&seqs, mv)?.is_noop(&seqs) {
                return Ok(None);
            }
        }

        mutation.apply(&mut self.local)?;

        self.next_seq += 1;
        let seq = self.next_seq;
        self.pending.push(PendingMutation {
            seq,
            mutation: mutation.clone(),
            phase: MutationPhase::AppliedLocally,
        });

        let gates = keys
            .into_iter()
            .map(|key| Arc::clone(self.gates.entry(key).or_default()))
            .collect();
        Ok(Some(Staged { seq, gates }))
    }

    fn set_phase(&mut self, seq: u64, phase: MutationPhase) {
        if let Some(p) = self.pending.iter_mut().find(|p| p.seq == seq) {
            p.phase = phase;
        }
    }

    /// Confirmed snapshot + the pending mutations numbered `through` or lower.
    fn replay(&self, through: u64) -> BoardState {
        let mut state = self.confirmed.clone();
        for pending in self.pending.iter().filter(|p| p.seq <= through) {
            let mutation = self.translate(&pending.mutation);
            if let Err(e) = mutation.apply(&mut state) {
                tracing::debug!(
                    mutation = %mutation.describe(),
                    error = %e,
                    "Pending mutation no longer applies"
                );
            }
        }
        state
    }

    /// Local state = confirmed snapshot + every mutation still pending.
    fn rebuild(&mut self) {
        self.local = self.replay(u64::MAX);
    }

    /// Order batch for a move, planned once its gates are held: the confirmed snapshot
    /// plus the mutations queued ahead of it, then the move itself.
    fn order_batch(&self, seq: u64, mutation: &Mutation) -> BoardResult<Option<OrderBatch>> {
        let (kind, mv) = match mutation {
            Mutation::MoveTask(mv) => (ItemKind::Task, mv),
            Mutation::MoveList(mv) => (ItemKind::List, mv),
            _ => return Ok(None),
        };
        let mut projected = self.replay(seq.saturating_sub(1));
        self.translate(mutation).apply(&mut projected)?;

        let seqs = match kind {
            ItemKind::Task => projected.task_seqs(),
            ItemKind::List => vec![projected.list_seq()?],
        };
        let touched = [self.resolve_id(mv.from), self.resolve_id(mv.to)];
        let entries = seqs
            .iter()
            .filter(|column| touched.contains(&column.container))
            .flat_map(|column| renumber(&column.container, &column.items))
            .collect();

        OrderBatch::new(kind, entries)
            .try_map(|id| id.server_id())
            .map(Some)
            .ok_or_else(|| {
                BoardError::NotFound(
                    "Order batch references a record that was never saved".to_string(),
                )
            })
    }

    fn reject(&mut self, mutation: &Mutation, error: &BoardError) {
        tracing::warn!(
            mutation = %mutation.describe(),
            error = %error,
            "Mutation rolled back"
        );
        if mutation.notifies_on_failure() {
            self.notices.push(Notice {
                message: format!("Could not {}: {}", mutation.describe(), error.message()),
                error: error.clone(),
            });
        }
    }

    fn finish(
        &mut self,
        seq: u64,
        mutation: &Mutation,
        result: BoardResult<Option<Uuid>>,
    ) -> MutationOutcome {
        self.pending.retain(|p| p.seq != seq);

        match result {
            Ok(server_id) => {
                if let (Some(created), Some(temp)) = (server_id, mutation.created_id()) {
                    if let ClientId::Temp(n) = temp {
                        self.ids.insert(n, created);
                    }
                    self.local.replace_id(temp, ClientId::Server(created));
                    self.gates.remove(&temp);
                }
                let settled = self.translate(mutation);
                if let Err(e) = settled.apply(&mut self.confirmed) {
                    tracing::warn!(
                        mutation = %settled.describe(),
                        error = %e,
                        "Confirmed mutation does not apply to the confirmed snapshot"
                    );
                }
                tracing::trace!(seq, phase = ?MutationPhase::Confirmed, "Mutation settled");
                MutationOutcome::Confirmed { server_id }
            }
            Err(error) => {
                self.reject(mutation, &error);
                self.rebuild();
                tracing::trace!(seq, phase = ?MutationPhase::RolledBack, "Mutation settled");
                MutationOutcome::RolledBack { error }
            }
        }
    }
}

fn persisted(id: ClientId) -> BoardResult<Uuid> {
    id.server_id()
        .ok_or_else(|| BoardError::NotFound(format!("{} was never saved", id)))
}

/// Client-side owner of one board's shadow state.
pub struct MutationController<T: Transport> {
    transport: T,
    state: Mutex<ControllerState>,
    next_temp: AtomicU64,
}

impl<T: Transport> MutationController<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: Mutex::new(ControllerState::default()),
            next_temp: AtomicU64::new(1),
        }
    }

    /// Replace both snapshots with the server's view of `board_id`.
    pub async fn load(&self, board_id: Uuid) -> BoardResult<()> {
        let snapshot = self.transport.load_board(board_id).await?;
        let mut state = self.state.lock().await;
        state.confirmed = BoardState::from_snapshot(&snapshot);
        state.rebuild();
        tracing::debug!(board = %board_id, lists = snapshot.lists.len(), "Loaded board");
        Ok(())
    }

    /// The optimistic view (confirmed + pending).
    pub async fn state(&self) -> BoardState {
        self.state.lock().await.local.clone()
    }

    pub async fn confirmed_state(&self) -> BoardState {
        self.state.lock().await.confirmed.clone()
    }

    /// Mutations not yet terminal, oldest first.
    pub async fn pending(&self) -> Vec<(Mutation, MutationPhase)> {
        self.state
            .lock()
            .await
            .pending
            .iter()
            .map(|p| (p.mutation.clone(), p.phase))
            .collect()
    }

    /// Drain the queued user-visible notices.
    pub async fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state.lock().await.notices)
    }

    pub fn allocate_id(&self) -> ClientId {
        ClientId::Temp(self.next_temp.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn create_task(
        &self,
        list_id: ClientId,
        parent_id: Option<ClientId>,
        title: &str,
    ) -> (ClientId, MutationOutcome) {
        let id = self.allocate_id();
        let outcome = self
            .submit(Mutation::CreateTask {
                id,
                list_id,
                parent_id,
                title: title.to_string(),
            })
            .await;
        (id, outcome)
    }

    pub async fn rename_task(&self, id: ClientId, title: &str) -> MutationOutcome {
        self.submit(Mutation::RenameTask {
            id,
            title: title.to_string(),
        })
        .await
    }

    pub async fn delete_task(&self, id: ClientId) -> MutationOutcome {
        self.submit(Mutation::DeleteTask { id }).await
    }

    pub async fn move_task(&self, mv: Move<ClientId>) -> MutationOutcome {
        self.submit(Mutation::MoveTask(mv)).await
    }

    pub async fn create_list(&self, title: &str) -> (ClientId, MutationOutcome) {
        let id = self.allocate_id();
        let outcome = self
            .submit(Mutation::CreateList {
                id,
                title: title.to_string(),
            })
            .await;
        (id, outcome)
    }

    pub async fn rename_list(&self, id: ClientId, title: &str) -> MutationOutcome {
        self.submit(Mutation::RenameList {
            id,
            title: title.to_string(),
        })
        .await
    }

    pub async fn delete_list(&self, id: ClientId) -> MutationOutcome {
        self.submit(Mutation::DeleteList { id }).await
    }

    pub async fn move_list(&self, mv: Move<ClientId>) -> MutationOutcome {
        self.submit(Mutation::MoveList(mv)).await
    }

    /// Run one mutation through apply, persist, and confirm or roll back.
    pub async fn submit(&self, mutation: Mutation) -> MutationOutcome {
        let staged = {
            let mut state = self.state.lock().await;
            match state.stage(&mutation) {
                Ok(Some(staged)) => staged,
                Ok(None) => return MutationOutcome::Confirmed { server_id: None },
                Err(error) => {
                    state.reject(&mutation, &error);
                    return MutationOutcome::RolledBack { error };
                }
            }
        };

        let mut held: Vec<OwnedMutexGuard<()>> = Vec::with_capacity(staged.gates.len());
        for gate in staged.gates {
            held.push(gate.lock_owned().await);
        }

        let prepared = {
            let mut state = self.state.lock().await;
            state.set_phase(staged.seq, MutationPhase::PendingPersist);
            let board_id = state.confirmed.board_id;
            let resolved = state.translate(&mutation);
            state
                .order_batch(staged.seq, &mutation)
                .map(|batch| (resolved, batch, board_id))
        };
        tracing::trace!(
            seq = staged.seq,
            phase = ?MutationPhase::PendingPersist,
            "Dispatching mutation"
        );

        let result = match prepared {
            Ok((resolved, batch, board_id)) => self.dispatch(&resolved, batch, board_id).await,
            Err(e) => Err(e),
        };

        let outcome = self.state.lock().await.finish(staged.seq, &mutation, result);
        drop(held);
        outcome
    }

    async fn dispatch(
        &self,
        mutation: &Mutation,
        batch: Option<OrderBatch>,
        board_id: Option<Uuid>,
    ) -> BoardResult<Option<Uuid>> {
        match mutation {
            Mutation::CreateTask {
                list_id,
                parent_id,
                title,
                ..
            } => {
                let task = NewTask {
                    title: title.clone(),
                    parent_id: parent_id.map(persisted).transpose()?,
                    ..NewTask::default()
                };
                let created = self
                    .transport
                    .create_task(persisted(*list_id)?, &task)
                    .await?;
                Ok(Some(created.id))
            }
            Mutation::RenameTask { id, title } => {
                self.transport
                    .update_task(persisted(*id)?, &TaskPatch::rename(title.clone()))
                    .await?;
                Ok(None)
            }
            Mutation::DeleteTask { id } => {
                self.transport.delete_task(persisted(*id)?, true).await?;
                Ok(None)
            }
            Mutation::MoveTask(_) | Mutation::MoveList(_) => {
                let batch = batch.ok_or_else(|| {
                    BoardError::MalformedInput("Move without an order batch".to_string())
                })?;
                self.transport.upsert_order(&batch).await?;
                Ok(None)
            }
            Mutation::CreateList { title, .. } => {
                let board_id =
                    board_id.ok_or_else(|| BoardError::NotFound("No board loaded".to_string()))?;
                let created = self.transport.create_list(board_id, title).await?;
                Ok(Some(created.id))
            }
            Mutation::RenameList { id, title } => {
                self.transport.rename_list(persisted(*id)?, title).await?;
                Ok(None)
            }
            Mutation::DeleteList { id } => {
                self.transport.delete_list(persisted(*id)?).await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoardSnapshot, Task, TaskList};
    use crate::store::{BoardStore, InMemoryBoardStore};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::Notify;

    /// Transport backed by the in-memory store, with injectable failures.
    #[derive(Default)]
    struct FakeTransport {
        store: InMemoryBoardStore,
        failing: std::sync::Mutex<HashSet<&'static str>>,
        failing_once: std::sync::Mutex<HashSet<&'static str>>,
        hold_updates: std::sync::Mutex<Option<Arc<Notify>>>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn fail(&self, op: &'static str) {
            self.failing.lock().unwrap().insert(op);
        }

        fn fail_next(&self, op: &'static str) {
            self.failing_once.lock().unwrap().insert(op);
        }

        async fn check(&self, op: &'static str, detail: String) -> BoardResult<()> {
            self.calls.lock().unwrap().push(format!("{} {}", op, detail));
            tokio::task::yield_now().await;
            if self.failing.lock().unwrap().contains(op)
                || self.failing_once.lock().unwrap().remove(op)
            {
                return Err(BoardError::PersistenceFailure(format!("{} unavailable", op)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn load_board(&self, board_id: Uuid) -> BoardResult<BoardSnapshot> {
            self.store.board_snapshot(board_id).await
        }

        async fn create_list(&self, board_id: Uuid, title: &str) -> BoardResult<TaskList> {
            self.check("create_list", title.to_string()).await?;
            self.store.create_list(board_id, title).await
        }

        async fn rename_list(&self, id: Uuid, title: &str) -> BoardResult<TaskList> {
            self.check("rename_list", title.to_string()).await?;
            self.store.rename_list(id, title).await
        }

        async fn delete_list(&self, id: Uuid) -> BoardResult<()> {
            self.check("delete_list", id.to_string()).await?;
            self.store.delete_list(id).await
        }

        async fn create_task(&self, list_id: Uuid, task: &NewTask) -> BoardResult<Task> {
            self.check("create_task", task.title.clone()).await?;
            self.store.create_task(list_id, task.clone()).await
        }

        async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> BoardResult<Task> {
            let hold = self.hold_updates.lock().unwrap().clone();
            if let Some(release) = hold {
                release.notified().await;
            }
            self.check("update_task", id.to_string()).await?;
            self.store.update_task(id, patch).await
        }

        async fn delete_task(&self, id: Uuid, cascade: bool) -> BoardResult<Vec<Uuid>> {
            self.check("delete_task", id.to_string()).await?;
            self.store.delete_task(id, cascade).await
        }

        async fn upsert_order(&self, batch: &OrderBatch) -> BoardResult<()> {
            self.check("upsert_order", batch.entries.len().to_string())
                .await?;
            self.store.upsert_order(batch).await
        }
    }

    struct Seed {
        board: Uuid,
        todo: Uuid,
        done: Uuid,
        a: Uuid,
        b: Uuid,
    }

    async fn seeded() -> (MutationController<FakeTransport>, Seed) {
        let transport = FakeTransport::default();
        let store = &transport.store;
        let ws = store.create_workspace("dana", "Home", None).await.unwrap();
        let board = store.create_board(ws.id, "Week").await.unwrap();
        let todo = store.create_list(board.id, "Todo").await.unwrap();
        let done = store.create_list(board.id, "Done").await.unwrap();
        let a = store
            .create_task(todo.id, NewTask::titled("A"))
            .await
            .unwrap();
        let b = store
            .create_task(todo.id, NewTask::titled("B"))
            .await
            .unwrap();
        let seed = Seed {
            board: board.id,
            todo: todo.id,
            done: done.id,
            a: a.id,
            b: b.id,
        };

        let controller = MutationController::new(transport);
        controller.load(board.id).await.unwrap();
        (controller, seed)
    }

    #[tokio::test]
    async fn test_create_confirms_and_swaps_temp_id() {
        let (controller, seed) = seeded().await;
        let (temp, outcome) = controller
            .create_task(seed.todo.into(), None, "C")
            .await;
        assert!(temp.is_temp());
        let created = match outcome {
            MutationOutcome::Confirmed {
                server_id: Some(created),
            } => created,
            other => panic!("expected confirmation, got {:?}", other),
        };

        let local = controller.state().await;
        assert!(local.task(&temp).is_none());
        assert_eq!(local.task(&created.into()).unwrap().title, "C");
        assert_eq!(local, controller.confirmed_state().await);
        assert!(controller.pending().await.is_empty());

        let stored = controller.transport.store.list_tasks(seed.todo).await.unwrap();
        assert_eq!(stored.last().map(|t| t.id), Some(created));
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back_with_notice() {
        let (controller, seed) = seeded().await;
        controller.transport.fail("create_task");

        let (temp, outcome) = controller
            .create_task(seed.todo.into(), None, "Doomed")
            .await;
        assert_eq!(temp, ClientId::Temp(1));
        assert!(matches!(
            outcome,
            MutationOutcome::RolledBack {
                error: BoardError::PersistenceFailure(_)
            }
        ));
        assert_eq!(
            controller.state().await.task_titles(&seed.todo.into()),
            vec!["A", "B"]
        );

        let notices = controller.take_notices().await;
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("temp-1"));
        assert!(controller.take_notices().await.is_empty());
    }

    #[tokio::test]
    async fn test_move_persists_one_batch() {
        let (controller, seed) = seeded().await;
        let outcome = controller
            .move_task(Move {
                item_id: seed.a.into(),
                from: seed.todo.into(),
                to: seed.done.into(),
                target_index: 0,
            })
            .await;
        tokio_test::assert_ok!(match outcome {
            MutationOutcome::Confirmed { .. } => Ok(()),
            MutationOutcome::RolledBack { error } => Err(error),
        });

        let local = controller.state().await;
        assert_eq!(local.task_titles(&seed.todo.into()), vec!["B"]);
        assert_eq!(local.task_titles(&seed.done.into()), vec!["A"]);

        let calls = controller.transport.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["upsert_order 2".to_string()]);

        controller.load(seed.board).await.unwrap();
        assert_eq!(controller.state().await, local);
    }

    #[tokio::test]
    async fn test_noop_move_skips_persistence() {
        let (controller, seed) = seeded().await;
        let outcome = controller
            .move_task(Move {
                item_id: seed.b.into(),
                from: seed.todo.into(),
                to: seed.todo.into(),
                target_index: 9,
            })
            .await;
        assert!(outcome.is_confirmed());
        assert!(controller.transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reorder_restores_order_without_notice() {
        let (controller, seed) = seeded().await;
        controller.transport.fail("upsert_order");

        let outcome = controller
            .move_task(Move {
                item_id: seed.b.into(),
                from: seed.todo.into(),
                to: seed.todo.into(),
                target_index: 0,
            })
            .await;
        assert!(!outcome.is_confirmed());
        assert_eq!(
            controller.state().await.task_titles(&seed.todo.into()),
            vec!["A", "B"]
        );
        assert!(controller.take_notices().await.is_empty());
    }

    #[tokio::test]
    async fn test_queued_move_after_failed_move_persists_only_itself() {
        let (controller, seed) = seeded().await;
        controller.transport.fail_next("upsert_order");

        let (first, second) = futures::future::join(
            controller.move_task(Move {
                item_id: seed.a.into(),
                from: seed.todo.into(),
                to: seed.done.into(),
                target_index: 0,
            }),
            controller.move_task(Move {
                item_id: seed.b.into(),
                from: seed.todo.into(),
                to: seed.done.into(),
                target_index: 1,
            }),
        )
        .await;
        assert!(!first.is_confirmed());
        assert!(second.is_confirmed());

        let local = controller.state().await;
        assert_eq!(local.task_titles(&seed.todo.into()), vec!["A"]);
        assert_eq!(local.task_titles(&seed.done.into()), vec!["B"]);
        assert_eq!(local, controller.confirmed_state().await);

        let store = &controller.transport.store;
        let todo: Vec<_> = store
            .list_tasks(seed.todo)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.title, t.order))
            .collect();
        let done: Vec<_> = store
            .list_tasks(seed.done)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.title, t.order))
            .collect();
        assert_eq!(todo, vec![("A".to_string(), 0)]);
        assert_eq!(done, vec![("B".to_string(), 0)]);

        controller.load(seed.board).await.unwrap();
        assert_eq!(controller.state().await, local);
    }

    #[tokio::test]
    async fn test_queued_moves_persist_in_submission_order() {
        let (controller, seed) = seeded().await;
        let (first, second) = futures::future::join(
            controller.move_task(Move {
                item_id: seed.a.into(),
                from: seed.todo.into(),
                to: seed.done.into(),
                target_index: 0,
            }),
            controller.move_task(Move {
                item_id: seed.b.into(),
                from: seed.todo.into(),
                to: seed.done.into(),
                target_index: 1,
            }),
        )
        .await;
        assert!(first.is_confirmed() && second.is_confirmed());

        let calls = controller.transport.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["upsert_order 2".to_string(), "upsert_order 2".to_string()]);
        let done = controller.transport.store.list_tasks(seed.done).await.unwrap();
        assert_eq!(
            done.iter().map(|t| (t.title.as_str(), t.order)).collect::<Vec<_>>(),
            vec![("A", 0), ("B", 1)]
        );
        assert_eq!(controller.state().await, controller.confirmed_state().await);
    }

    #[tokio::test]
    async fn test_rollback_keeps_unrelated_pending_mutation() {
        let (controller, seed) = seeded().await;
        let release = Arc::new(Notify::new());
        *controller.transport.hold_updates.lock().unwrap() = Some(release.clone());
        controller.transport.fail("create_task");

        let (renamed, (created, during)) = futures::future::join(
            controller.rename_task(seed.a.into(), "A (renamed)"),
            async {
                let created = controller
                    .create_task(seed.done.into(), None, "Doomed")
                    .await;
                let during = controller.state().await;
                release.notify_one();
                (created, during)
            },
        )
        .await;

        assert!(!created.1.is_confirmed());
        assert_eq!(during.task(&seed.a.into()).unwrap().title, "A (renamed)");
        assert!(during.task_titles(&seed.done.into()).is_empty());

        assert!(renamed.is_confirmed());
        let settled = controller.state().await;
        assert_eq!(settled.task(&seed.a.into()).unwrap().title, "A (renamed)");
        assert_eq!(settled, controller.confirmed_state().await);
    }

    #[tokio::test]
    async fn test_same_list_creates_are_serialized() {
        let (controller, seed) = seeded().await;
        let (first, second) = futures::future::join(
            controller.create_task(seed.todo.into(), None, "C"),
            controller.create_task(seed.todo.into(), None, "D"),
        )
        .await;
        assert!(first.1.is_confirmed() && second.1.is_confirmed());

        let stored: Vec<_> = controller
            .transport
            .store
            .list_tasks(seed.todo)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.title, t.order))
            .collect();
        assert_eq!(
            stored,
            vec![
                ("A".to_string(), 0),
                ("B".to_string(), 1),
                ("C".to_string(), 2),
                ("D".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_task_in_new_list_waits_for_the_list() {
        let (controller, _seed) = seeded().await;
        let list = ClientId::Temp(1);
        let (created_list, created_task) = futures::future::join(
            controller.create_list("Later"),
            controller.create_task(list, None, "Inside"),
        )
        .await;
        assert_eq!(created_list.0, list);
        assert!(created_list.1.is_confirmed());
        assert!(created_task.1.is_confirmed());

        let local = controller.state().await;
        assert_eq!(local.list_titles(), vec!["Todo", "Done", "Later"]);
        assert_eq!(local.lists[2].tasks[0].title, "Inside");
        assert!(!local.lists[2].id.is_temp());
    }

    #[tokio::test]
    async fn test_failed_list_create_rolls_back_dependent_task() {
        let (controller, _seed) = seeded().await;
        controller.transport.fail("create_list");
        let list = ClientId::Temp(1);

        let (created_list, created_task) = futures::future::join(
            controller.create_list("Later"),
            controller.create_task(list, None, "Inside"),
        )
        .await;
        assert!(!created_list.1.is_confirmed());
        assert!(matches!(
            created_task.1,
            MutationOutcome::RolledBack {
                error: BoardError::NotFound(_)
            }
        ));
        assert_eq!(
            controller.state().await.list_titles(),
            vec!["Todo", "Done"]
        );
        assert_eq!(controller.take_notices().await.len(), 2);
    }

    #[tokio::test]
    async fn test_list_reorder_and_delete() {
        let (controller, seed) = seeded().await;
        let board = ClientId::Server(seed.board);
        assert!(controller
            .move_list(Move {
                item_id: seed.done.into(),
                from: board,
                to: board,
                target_index: 0,
            })
            .await
            .is_confirmed());
        assert!(controller.delete_list(seed.todo.into()).await.is_confirmed());

        assert_eq!(controller.state().await.list_titles(), vec!["Done"]);
        let stored = controller.transport.store.list_lists(seed.board).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, seed.done);
    }
}
