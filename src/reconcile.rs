//! Reconciliation engine: turns a move into new container membership and order values.
//!
//! The engine is compute-only and generic over the identifier type so the server (UUIDs)
//! and the client shadow state (temporary or server ids) run the exact same logic.
//!
//! Every touched container is fully renumbered `0..N-1` in its new display sequence.
//! Renumbering is naturally idempotent: running a plan against its own output yields the
//! same order values, which is what lets the transport treat calls as non-idempotent.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BoardError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Item {item} not found in container {container}")]
    ItemNotFound { item: String, container: String },

    #[error("Container {0} not found")]
    ContainerNotFound(String),
}

impl From<ReconcileError> for BoardError {
    fn from(e: ReconcileError) -> Self {
        BoardError::NotFound(e.to_string())
    }
}

/// One row of the desired persisted state: an item, its position and its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderEntry<I> {
    pub item_id: I,
    pub order: i64,
    pub container_id: I,
}

/// The ordered item ids of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSeq<I> {
    pub container: I,
    pub items: Vec<I>,
}

impl<I: Clone + Eq + Display> ContainerSeq<I> {
    pub fn new(container: I, items: Vec<I>) -> Self {
        Self { container, items }
    }

    pub fn position(&self, item: &I) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    pub fn contains(&self, item: &I) -> bool {
        self.position(item).is_some()
    }
}

/// The unit of work the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move<I> {
    pub item_id: I,
    pub from: I,
    pub to: I,
    /// Final position of the item in the destination sequence. Clamped to append.
    pub target_index: usize,
}

/// Where a dragged item was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DropTarget<I> {
    /// Released over another item.
    Item(I),
    /// Released over the container's own drop zone (works for empty containers).
    Container(I),
}

/// Result of planning a move: the new sequence of every touched container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan<I> {
    pub item_id: I,
    pub to: I,
    /// Index the item landed at after clamping.
    pub index: usize,
    /// Source first, destination second (a same-container move touches one container).
    pub touched: Vec<ContainerSeq<I>>,
}

impl<I: Clone + Eq + Display> MovePlan<I> {
    /// Order triples to persist: every touched container renumbered independently.
    pub fn entries(&self) -> Vec<OrderEntry<I>> {
        self.touched
            .iter()
            .flat_map(|seq| renumber(&seq.container, &seq.items))
            .collect()
    }

    pub fn sequence(&self, container: &I) -> Option<&[I]> {
        self.touched
            .iter()
            .find(|seq| &seq.container == container)
            .map(|seq| seq.items.as_slice())
    }

    pub fn is_cross_container(&self) -> bool {
        self.touched.len() > 1
    }

    /// True when the plan leaves every sequence as it was.
    pub fn is_noop(&self, before: &[ContainerSeq<I>]) -> bool {
        self.touched.iter().all(|seq| {
            before
                .iter()
                .find(|b| b.container == seq.container)
                .map(|b| b.items == seq.items)
                .unwrap_or(false)
        })
    }
}

/// Assign `0..N-1` to every item in sequence order.
pub fn renumber<I: Clone>(container: &I, items: &[I]) -> Vec<OrderEntry<I>> {
    items
        .iter()
        .enumerate()
        .map(|(order, item)| OrderEntry {
            item_id: item.clone(),
            order: order as i64,
            container_id: container.clone(),
        })
        .collect()
}

/// Array move within one sequence: remove the item, reinsert it at `target_index`.
pub fn reorder_within<I: Clone + Eq + Display>(
    seq: &ContainerSeq<I>,
    item: &I,
    target_index: usize,
) -> Result<(Vec<I>, usize), ReconcileError> {
    let from = seq.position(item).ok_or_else(|| ReconcileError::ItemNotFound {
        item: item.to_string(),
        container: seq.container.to_string(),
    })?;
    let mut items = seq.items.clone();
    let moved = items.remove(from);
    let index = target_index.min(items.len());
    items.insert(index, moved);
    Ok((items, index))
}

fn find<'a, I: Clone + Eq + Display>(
    containers: &'a [ContainerSeq<I>],
    id: &I,
) -> Result<&'a ContainerSeq<I>, ReconcileError> {
    containers
        .iter()
        .find(|c| &c.container == id)
        .ok_or_else(|| ReconcileError::ContainerNotFound(id.to_string()))
}

/// Plan a move against the current sequences of the containers involved.
pub fn plan_move<I: Clone + Eq + Display>(
    containers: &[ContainerSeq<I>],
    mv: &Move<I>,
) -> Result<MovePlan<I>, ReconcileError> {
    let source = find(containers, &mv.from)?;
    if !source.contains(&mv.item_id) {
        return Err(ReconcileError::ItemNotFound {
            item: mv.item_id.to_string(),
            container: mv.from.to_string(),
        });
    }

    if mv.from == mv.to {
        let (items, index) = reorder_within(source, &mv.item_id, mv.target_index)?;
        return Ok(MovePlan {
            item_id: mv.item_id.clone(),
            to: mv.to.clone(),
            index,
            touched: vec![ContainerSeq::new(source.container.clone(), items)],
        });
    }

    let dest = find(containers, &mv.to)?;
    let source_items: Vec<I> = source
        .items
        .iter()
        .filter(|i| *i != &mv.item_id)
        .cloned()
        .collect();

    // A stale client may still list the item in the destination; never duplicate it.
    let mut dest_items: Vec<I> = dest
        .items
        .iter()
        .filter(|i| *i != &mv.item_id)
        .cloned()
        .collect();
    let index = mv.target_index.min(dest_items.len());
    dest_items.insert(index, mv.item_id.clone());

    Ok(MovePlan {
        item_id: mv.item_id.clone(),
        to: mv.to.clone(),
        index,
        touched: vec![
            ContainerSeq::new(source.container.clone(), source_items),
            ContainerSeq::new(dest.container.clone(), dest_items),
        ],
    })
}

/// Find the container currently holding `item`.
pub fn locate<'a, I: Clone + Eq + Display>(
    containers: &'a [ContainerSeq<I>],
    item: &I,
) -> Option<&'a ContainerSeq<I>> {
    containers.iter().find(|c| c.contains(item))
}

/// Translate a drop target into a `Move` for `dragged`.
///
/// Dropping over an item takes that item's slot; when dragging downward inside the same
/// container this lands the dragged item after it, otherwise before it. Dropping over the
/// container appends.
pub fn resolve_drop_index<I: Clone + Eq + Display>(
    containers: &[ContainerSeq<I>],
    dragged: &I,
    target: &DropTarget<I>,
) -> Result<Move<I>, ReconcileError> {
    let source = locate(containers, dragged).ok_or_else(|| ReconcileError::ItemNotFound {
        item: dragged.to_string(),
        container: "any".to_string(),
    })?;

    let (dest, index) = match target {
        DropTarget::Container(id) => {
            let dest = find(containers, id)?;
            let len = if dest.container == source.container {
                dest.items.len().saturating_sub(1)
            } else {
                dest.items.len()
            };
            (dest, len)
        }
        DropTarget::Item(over) => {
            let dest = locate(containers, over).ok_or_else(|| ReconcileError::ItemNotFound {
                item: over.to_string(),
                container: "any".to_string(),
            })?;
            // position() is Some: locate() matched on it
            let over_index = dest.position(over).unwrap_or(dest.items.len());
            (dest, over_index)
        }
    };

    Ok(Move {
        item_id: dragged.clone(),
        from: source.container.clone(),
        to: dest.container.clone(),
        target_index: index,
    })
}

/// Check that orders within each container are distinct and ascend in sequence order.
#[cfg(test)]
pub(crate) fn is_strictly_increasing<I>(entries: &[OrderEntry<I>]) -> bool
where
    I: Eq + Clone + std::hash::Hash,
{
    let mut last: std::collections::HashMap<I, i64> = std::collections::HashMap::new();
    for entry in entries {
        if let Some(prev) = last.get(&entry.container_id) {
            if entry.order <= *prev {
                return false;
            }
        }
        last.insert(entry.container_id.clone(), entry.order);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(container: &str, items: &[&str]) -> ContainerSeq<String> {
        ContainerSeq::new(
            container.to_string(),
            items.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn mv(item: &str, from: &str, to: &str, target_index: usize) -> Move<String> {
        Move {
            item_id: item.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            target_index,
        }
    }

    fn orders(entries: &[OrderEntry<String>], container: &str) -> Vec<(String, i64)> {
        entries
            .iter()
            .filter(|e| e.container_id == container)
            .map(|e| (e.item_id.clone(), e.order))
            .collect()
    }

    #[test]
    fn test_same_list_move_before_first() {
        let containers = vec![seq("todo", &["A", "B"])];
        let plan = plan_move(&containers, &mv("B", "todo", "todo", 0)).unwrap();
        let entries = plan.entries();
        assert_eq!(
            orders(&entries, "todo"),
            vec![("B".to_string(), 0), ("A".to_string(), 1)]
        );
        assert!(!plan.is_cross_container());
    }

    #[test]
    fn test_cross_list_move_to_front() {
        let containers = vec![seq("todo", &["A", "B"]), seq("doing", &["C"])];
        let plan = plan_move(&containers, &mv("A", "todo", "doing", 0)).unwrap();
        let entries = plan.entries();
        assert_eq!(orders(&entries, "todo"), vec![("B".to_string(), 0)]);
        assert_eq!(
            orders(&entries, "doing"),
            vec![("A".to_string(), 0), ("C".to_string(), 1)]
        );
        assert!(plan.is_cross_container());
    }

    #[test]
    fn test_cross_move_cardinality_and_landing_index() {
        let containers = vec![seq("a", &["1", "2", "3"]), seq("b", &["x", "y"])];
        let plan = plan_move(&containers, &mv("2", "a", "b", 1)).unwrap();
        let a = plan.sequence(&"a".to_string()).unwrap();
        let b = plan.sequence(&"b".to_string()).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
        assert_eq!(b[1], "2");
        assert_eq!(plan.index, 1);
    }

    #[test]
    fn test_target_index_beyond_length_appends() {
        let containers = vec![seq("a", &["1"]), seq("b", &["x", "y"])];
        let plan = plan_move(&containers, &mv("1", "a", "b", 99)).unwrap();
        assert_eq!(plan.sequence(&"b".to_string()).unwrap(), ["x", "y", "1"]);
        assert_eq!(plan.index, 2);

        let containers = vec![seq("a", &["1", "2", "3"])];
        let plan = plan_move(&containers, &mv("1", "a", "a", 42)).unwrap();
        assert_eq!(plan.sequence(&"a".to_string()).unwrap(), ["2", "3", "1"]);
    }

    #[test]
    fn test_move_into_empty_container() {
        let containers = vec![seq("a", &["1"]), seq("empty", &[])];
        let plan = plan_move(&containers, &mv("1", "a", "empty", 0)).unwrap();
        assert!(plan.sequence(&"a".to_string()).unwrap().is_empty());
        assert_eq!(plan.sequence(&"empty".to_string()).unwrap(), ["1"]);
    }

    #[test]
    fn test_unknown_item_and_container_are_reported() {
        let containers = vec![seq("a", &["1"]), seq("b", &[])];
        assert_eq!(
            plan_move(&containers, &mv("9", "a", "b", 0)),
            Err(ReconcileError::ItemNotFound {
                item: "9".to_string(),
                container: "a".to_string()
            })
        );
        assert_eq!(
            plan_move(&containers, &mv("1", "a", "zzz", 0)),
            Err(ReconcileError::ContainerNotFound("zzz".to_string()))
        );
        assert_eq!(
            plan_move(&containers, &mv("1", "nope", "b", 0)),
            Err(ReconcileError::ContainerNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_stale_destination_never_duplicates_item() {
        let containers = vec![seq("a", &["1", "2"]), seq("b", &["1", "x"])];
        let plan = plan_move(&containers, &mv("1", "a", "b", 0)).unwrap();
        assert_eq!(plan.sequence(&"b".to_string()).unwrap(), ["1", "x"]);
    }

    #[test]
    fn test_renumbering_is_idempotent() {
        let containers = vec![seq("a", &["1", "2", "3"]), seq("b", &["x"])];
        let first = plan_move(&containers, &mv("3", "a", "b", 0)).unwrap();
        let second = plan_move(&first.touched, &mv("3", "b", "b", 0)).unwrap();
        let first_b: Vec<_> = orders(&first.entries(), "b");
        let second_b: Vec<_> = orders(&second.entries(), "b");
        assert_eq!(first_b, second_b);
        assert!(second.is_noop(&first.touched));
    }

    #[test]
    fn test_orders_strictly_increase_after_many_moves() {
        let mut containers = vec![
            seq("a", &["1", "2", "3", "4"]),
            seq("b", &["5", "6"]),
            seq("c", &[]),
        ];
        let moves = [
            mv("1", "a", "c", 0),
            mv("5", "b", "a", 2),
            mv("4", "a", "a", 0),
            mv("6", "b", "c", 1),
            mv("1", "c", "b", 0),
        ];
        for m in &moves {
            let plan = plan_move(&containers, m).unwrap();
            for touched in plan.touched {
                let slot = containers
                    .iter_mut()
                    .find(|c| c.container == touched.container)
                    .unwrap();
                *slot = touched;
            }
        }
        let entries: Vec<_> = containers
            .iter()
            .flat_map(|c| renumber(&c.container, &c.items))
            .collect();
        assert!(is_strictly_increasing(&entries));
        let total: usize = containers.iter().map(|c| c.items.len()).sum();
        assert_eq!(total, 6);
        assert_eq!(containers[0].items, ["4", "2", "5", "3"]);
        assert_eq!(containers[1].items, ["1"]);
        assert_eq!(containers[2].items, ["6"]);
    }

    fn drop_on_item(containers: &[ContainerSeq<String>], item: &str, over: &str) -> Move<String> {
        resolve_drop_index(containers, &item.to_string(), &DropTarget::Item(over.to_string()))
            .unwrap()
    }

    #[test]
    fn test_drop_on_item_downward_lands_after_it() {
        let containers = vec![seq("a", &["1", "2", "3"])];
        let m = drop_on_item(&containers, "1", "3");
        let plan = plan_move(&containers, &m).unwrap();
        assert_eq!(plan.sequence(&"a".to_string()).unwrap(), ["2", "3", "1"]);
    }

    #[test]
    fn test_drop_on_item_upward_lands_before_it() {
        let containers = vec![seq("a", &["1", "2", "3"])];
        let m = drop_on_item(&containers, "3", "1");
        let plan = plan_move(&containers, &m).unwrap();
        assert_eq!(plan.sequence(&"a".to_string()).unwrap(), ["3", "1", "2"]);
    }

    #[test]
    fn test_drop_on_item_in_other_container_lands_before_it() {
        let containers = vec![seq("a", &["1"]), seq("b", &["x", "y"])];
        let m = drop_on_item(&containers, "1", "y");
        assert_eq!(m.to, "b");
        assert_eq!(m.target_index, 1);
    }

    #[test]
    fn test_drop_on_empty_container_zone() {
        let containers = vec![seq("a", &["1", "2"]), seq("empty", &[])];
        let m = resolve_drop_index(
            &containers,
            &"2".to_string(),
            &DropTarget::Container("empty".to_string()),
        )
        .unwrap();
        let plan = plan_move(&containers, &m).unwrap();
        assert_eq!(plan.sequence(&"empty".to_string()).unwrap(), ["2"]);
        assert_eq!(plan.sequence(&"a".to_string()).unwrap(), ["1"]);
    }

    #[test]
    fn test_drop_on_own_container_zone_moves_to_end() {
        let containers = vec![seq("a", &["1", "2", "3"])];
        let m = resolve_drop_index(
            &containers,
            &"1".to_string(),
            &DropTarget::Container("a".to_string()),
        )
        .unwrap();
        let plan = plan_move(&containers, &m).unwrap();
        assert_eq!(plan.sequence(&"a".to_string()).unwrap(), ["2", "3", "1"]);
    }

    #[test]
    fn test_is_strictly_increasing_detects_duplicates() {
        let entries = vec![
            OrderEntry {
                item_id: "1".to_string(),
                order: 0,
                container_id: "a".to_string(),
            },
            OrderEntry {
                item_id: "2".to_string(),
                order: 0,
                container_id: "a".to_string(),
            },
        ];
        assert!(!is_strictly_increasing(&entries));
    }
}
