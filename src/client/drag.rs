//! Drag gesture state machine. Drag-over only updates a preview; the controller sees
//! exactly one `Move`, at drop.

use super::ClientId;
use crate::error::{BoardError, BoardResult};
use crate::reconcile::{locate, plan_move, resolve_drop_index, ContainerSeq, DropTarget, Move};

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub item: ClientId,
    /// Sequences as they were when the drag started.
    pub snapshot: Vec<ContainerSeq<ClientId>>,
    /// Sequences as they would be if the item were dropped now.
    pub preview: Vec<ContainerSeq<ClientId>>,
    pub pending: Option<Move<ClientId>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragSession {
    #[default]
    Idle,
    Dragging(DragState),
}

impl DragSession {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragSession::Dragging(_))
    }

    /// Start dragging `item`. A drag already in progress is abandoned.
    pub fn drag_start(
        &mut self,
        item: ClientId,
        containers: Vec<ContainerSeq<ClientId>>,
    ) -> BoardResult<()> {
        if locate(&containers, &item).is_none() {
            return Err(BoardError::NotFound(format!("Dragged item {}", item)));
        }
        if let DragSession::Dragging(previous) = self {
            tracing::debug!(item = %previous.item, "Abandoning unfinished drag");
        }
        *self = DragSession::Dragging(DragState {
            item,
            preview: containers.clone(),
            snapshot: containers,
            pending: None,
        });
        Ok(())
    }

    /// Hover over a target: recompute the preview from the start snapshot.
    pub fn drag_over(&mut self, target: &DropTarget<ClientId>) -> BoardResult<()> {
        let DragSession::Dragging(state) = self else {
            return Err(BoardError::MalformedInput("No drag in progress".to_string()));
        };
        if matches!(target, DropTarget::Item(over) if *over == state.item) {
            return Ok(());
        }

        let mv = resolve_drop_index(&state.snapshot, &state.item, target)?;
        let plan = plan_move(&state.snapshot, &mv)?;

        let mut preview = state.snapshot.clone();
        for seq in plan.touched {
            if let Some(slot) = preview.iter_mut().find(|s| s.container == seq.container) {
                *slot = seq;
            }
        }
        state.preview = preview;
        state.pending = Some(mv);
        Ok(())
    }

    pub fn preview(&self) -> Option<&[ContainerSeq<ClientId>]> {
        match self {
            DragSession::Dragging(state) => Some(&state.preview),
            DragSession::Idle => None,
        }
    }

    /// Release the item. Returns the move to submit, or `None` when nothing changed.
    pub fn drop_item(&mut self) -> Option<Move<ClientId>> {
        match std::mem::take(self) {
            DragSession::Dragging(state) => state.pending.filter(|mv| {
                state
                    .snapshot
                    .iter()
                    .find(|s| s.container == mv.from)
                    .map(|s| mv.from != mv.to || s.position(&mv.item_id) != Some(mv.target_index))
                    .unwrap_or(false)
            }),
            DragSession::Idle => None,
        }
    }

    /// Abort the drag. Returns the sequences from before it started.
    pub fn cancel(&mut self) -> Option<Vec<ContainerSeq<ClientId>>> {
        match std::mem::take(self) {
            DragSession::Dragging(state) => Some(state.snapshot),
            DragSession::Idle => None,
        }
    }
}
