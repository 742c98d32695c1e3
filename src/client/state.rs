//! Client-local shadow copy of one board.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::ClientId;
use crate::error::{BoardError, BoardResult};
use crate::model::{BoardSnapshot, MAX_TASK_DEPTH};
use crate::reconcile::{ContainerSeq, MovePlan};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskCard {
    pub id: ClientId,
    pub parent_id: Option<ClientId>,
    pub title: String,
    pub completed: bool,
    pub labels: Vec<String>,
}

impl TaskCard {
    pub fn new(id: ClientId, title: impl Into<String>, parent_id: Option<ClientId>) -> Self {
        Self {
            id,
            parent_id,
            title: title.into(),
            completed: false,
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListColumn {
    pub id: ClientId,
    pub title: String,
    /// Tasks in display order.
    pub tasks: Vec<TaskCard>,
}

/// Lists and tasks of one board in display order. Positions are implicit: a card's
/// order is its index in `tasks`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    pub board_id: Option<Uuid>,
    pub lists: Vec<ListColumn>,
}

impl BoardState {
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Self {
        let lists = snapshot
            .lists
            .iter()
            .map(|l| ListColumn {
                id: l.list.id.into(),
                title: l.list.title.clone(),
                tasks: l
                    .tasks
                    .iter()
                    .map(|t| TaskCard {
                        id: t.id.into(),
                        parent_id: t.parent_id.map(ClientId::Server),
                        title: t.title.clone(),
                        completed: t.completed,
                        labels: t.labels.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            board_id: Some(snapshot.board.id),
            lists,
        }
    }

    /// Container id lists are ordered within.
    pub fn board_container(&self) -> BoardResult<ClientId> {
        self.board_id
            .map(ClientId::Server)
            .ok_or_else(|| BoardError::NotFound("No board loaded".to_string()))
    }

    pub fn list(&self, id: &ClientId) -> Option<&ListColumn> {
        self.lists.iter().find(|l| &l.id == id)
    }

    fn list_mut(&mut self, id: &ClientId) -> BoardResult<&mut ListColumn> {
        self.lists
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("List {}", id)))
    }

    pub fn task(&self, id: &ClientId) -> Option<&TaskCard> {
        self.lists
            .iter()
            .flat_map(|l| l.tasks.iter())
            .find(|t| &t.id == id)
    }

    /// List currently holding `task`.
    pub fn list_of(&self, task: &ClientId) -> Option<ClientId> {
        self.lists
            .iter()
            .find(|l| l.tasks.iter().any(|t| &t.id == task))
            .map(|l| l.id)
    }

    pub fn task_titles(&self, list: &ClientId) -> Vec<&str> {
        self.list(list)
            .map(|l| l.tasks.iter().map(|t| t.title.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn list_titles(&self) -> Vec<&str> {
        self.lists.iter().map(|l| l.title.as_str()).collect()
    }

    /// Task sequences of every list.
    pub fn task_seqs(&self) -> Vec<ContainerSeq<ClientId>> {
        self.lists
            .iter()
            .map(|l| ContainerSeq::new(l.id, l.tasks.iter().map(|t| t.id).collect()))
            .collect()
    }

    /// List sequence of the board.
    pub fn list_seq(&self) -> BoardResult<ContainerSeq<ClientId>> {
        Ok(ContainerSeq::new(
            self.board_container()?,
            self.lists.iter().map(|l| l.id).collect(),
        ))
    }

    pub fn push_task(&mut self, list: &ClientId, card: TaskCard) -> BoardResult<()> {
        let column = self.list_mut(list)?;
        if let Some(parent) = &card.parent_id {
            if !column.tasks.iter().any(|t| &t.id == parent) {
                return Err(BoardError::MalformedInput(format!(
                    "Parent task {} is not in list {}",
                    parent, list
                )));
            }
        }
        column.tasks.push(card);
        Ok(())
    }

    pub fn rename_task(&mut self, id: &ClientId, title: &str) -> BoardResult<()> {
        let card = self
            .lists
            .iter_mut()
            .flat_map(|l| l.tasks.iter_mut())
            .find(|t| &t.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("Task {}", id)))?;
        card.title = title.to_string();
        Ok(())
    }

    /// Remove a task and its sub-tree. Returns the removed ids.
    pub fn remove_task(&mut self, id: &ClientId) -> BoardResult<Vec<ClientId>> {
        if self.task(id).is_none() {
            return Err(BoardError::NotFound(format!("Task {}", id)));
        }
        let mut removed = vec![*id];
        removed.extend(self.descendants(id));
        let doomed: HashSet<ClientId> = removed.iter().copied().collect();
        for list in &mut self.lists {
            list.tasks.retain(|t| !doomed.contains(&t.id));
        }
        Ok(removed)
    }

    pub fn push_list(&mut self, column: ListColumn) {
        self.lists.push(column);
    }

    pub fn rename_list(&mut self, id: &ClientId, title: &str) -> BoardResult<()> {
        self.list_mut(id)?.title = title.to_string();
        Ok(())
    }

    pub fn remove_list(&mut self, id: &ClientId) -> BoardResult<ListColumn> {
        let index = self
            .lists
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("List {}", id)))?;
        Ok(self.lists.remove(index))
    }

    /// Breadth-first sub-tree below `root`, bounded by `MAX_TASK_DEPTH`.
    pub fn descendants(&self, root: &ClientId) -> Vec<ClientId> {
        let mut children: HashMap<ClientId, Vec<ClientId>> = HashMap::new();
        for card in self.lists.iter().flat_map(|l| l.tasks.iter()) {
            if let Some(parent) = card.parent_id {
                children.entry(parent).or_default().push(card.id);
            }
        }

        let mut out = Vec::new();
        let mut visited = HashSet::from([*root]);
        let mut frontier = vec![*root];
        for _ in 0..MAX_TASK_DEPTH {
            let mut next = Vec::new();
            for id in frontier {
                for child in children.get(&id).into_iter().flatten() {
                    if visited.insert(*child) {
                        out.push(*child);
                        next.push(*child);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        out
    }

    /// Rearrange tasks to match a move plan. A task moved to another list takes its
    /// sub-tree along (appended at the end of the destination) and loses a parent left
    /// behind.
    pub fn apply_task_plan(&mut self, plan: &MovePlan<ClientId>) -> BoardResult<()> {
        for seq in &plan.touched {
            self.list_mut(&seq.container)?;
        }

        let mut pool: HashMap<ClientId, (ClientId, TaskCard)> = HashMap::new();
        for seq in &plan.touched {
            let column = self.list_mut(&seq.container)?;
            for card in column.tasks.drain(..) {
                pool.insert(card.id, (column.id, card));
            }
        }
        for seq in &plan.touched {
            let placed: Vec<TaskCard> = seq
                .items
                .iter()
                .filter_map(|id| pool.remove(id).map(|(_, card)| card))
                .collect();
            self.list_mut(&seq.container)?.tasks = placed;
        }
        // Cards a stale plan did not mention go back where they were.
        let mut leftovers: Vec<(ClientId, TaskCard)> = pool.into_values().collect();
        leftovers.sort_by(|a, b| a.1.id.cmp(&b.1.id));
        for (origin, card) in leftovers {
            self.list_mut(&origin)?.tasks.push(card);
        }

        if plan.is_cross_container() {
            let subtree: HashSet<ClientId> = self.descendants(&plan.item_id).into_iter().collect();
            if !subtree.is_empty() {
                let mut carried = Vec::new();
                for list in &mut self.lists {
                    if list.id == plan.to {
                        continue;
                    }
                    let (moving, staying): (Vec<_>, Vec<_>) = list
                        .tasks
                        .drain(..)
                        .partition(|t| subtree.contains(&t.id));
                    list.tasks = staying;
                    carried.extend(moving);
                }
                self.list_mut(&plan.to)?.tasks.extend(carried);
            }
        }

        let dest = self.list_mut(&plan.to)?;
        let present: HashSet<ClientId> = dest.tasks.iter().map(|t| t.id).collect();
        if let Some(card) = dest.tasks.iter_mut().find(|t| t.id == plan.item_id) {
            if card.parent_id.is_some_and(|p| !present.contains(&p)) {
                card.parent_id = None;
            }
        }
        Ok(())
    }

    /// Rearrange the board's lists to match a move plan.
    pub fn apply_list_plan(&mut self, plan: &MovePlan<ClientId>) -> BoardResult<()> {
        let board = self.board_container()?;
        let sequence = plan.sequence(&board).ok_or_else(|| {
            BoardError::NotFound(format!("Board {} is not part of the move", board))
        })?;
        let mut pool: HashMap<ClientId, ListColumn> =
            self.lists.drain(..).map(|l| (l.id, l)).collect();
        let mut lists: Vec<ListColumn> =
            sequence.iter().filter_map(|id| pool.remove(id)).collect();
        lists.extend(pool.into_values());
        self.lists = lists;
        Ok(())
    }

    /// Swap a temporary id for the server's id everywhere it appears.
    pub fn replace_id(&mut self, from: ClientId, to: ClientId) {
        for list in &mut self.lists {
            if list.id == from {
                list.id = to;
            }
            for card in &mut list.tasks {
                if card.id == from {
                    card.id = to;
                }
                if card.parent_id == Some(from) {
                    card.parent_id = Some(to);
                }
            }
        }
    }
}
