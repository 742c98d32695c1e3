//! Backend-independent task placement: applying order batches and walking sub-trees.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::next_order;
use crate::error::{BoardError, BoardResult};
use crate::model::MAX_TASK_DEPTH;
use crate::sync::{ItemKind, OrderBatch};

/// Where a task sits: its list, its parent and its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub list_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub order: i64,
}

/// Breadth-first walk below `root`, stopping at `MAX_TASK_DEPTH` levels.
/// `root` itself is not included.
pub(crate) fn collect_descendants<F>(root: Uuid, mut children_of: F) -> BoardResult<Vec<Uuid>>
where
    F: FnMut(Uuid) -> BoardResult<Vec<Uuid>>,
{
    let mut out = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut frontier = vec![root];
    let mut depth = 0;

    while !frontier.is_empty() {
        if depth >= MAX_TASK_DEPTH {
            tracing::warn!(
                root = %root,
                "Sub-task traversal reached max depth {}, stopping",
                MAX_TASK_DEPTH
            );
            break;
        }
        let mut next = Vec::new();
        for id in frontier {
            for child in children_of(id)? {
                if visited.insert(child) {
                    out.push(child);
                    next.push(child);
                }
            }
        }
        frontier = next;
        depth += 1;
    }
    Ok(out)
}

/// Depth of a would-be child of `parent_id` (a top-level task has depth 0).
pub(crate) fn child_depth<F>(parent_id: Uuid, mut parent_of: F) -> BoardResult<usize>
where
    F: FnMut(Uuid) -> BoardResult<Option<Uuid>>,
{
    let mut depth = 1;
    let mut current = parent_id;
    while let Some(parent) = parent_of(current)? {
        depth += 1;
        if depth >= MAX_TASK_DEPTH {
            break;
        }
        current = parent;
    }
    if depth >= MAX_TASK_DEPTH {
        return Err(BoardError::MalformedInput(format!(
            "Sub-tasks cannot nest deeper than {} levels",
            MAX_TASK_DEPTH
        )));
    }
    Ok(depth)
}

/// Apply a task batch to `rows`, returning the ids whose placement changed.
///
/// `rows` must hold every task of every list the batch reads from or writes to. After the
/// explicit entries land, a sub-task that ended up outside its parent's list is detached,
/// and the sub-tree of every task that changed list follows it, appended at the end of
/// the destination. On error `rows` may be partially updated; callers discard it.
pub(crate) fn apply_task_batch(
    rows: &mut HashMap<Uuid, Placement>,
    batch: &OrderBatch,
) -> BoardResult<Vec<Uuid>> {
    let before = rows.clone();
    let mut moved = Vec::new();

    for entry in &batch.entries {
        let row = rows
            .get_mut(&entry.item_id)
            .ok_or_else(|| BoardError::task_not_found(entry.item_id))?;
        if row.list_id != entry.container_id {
            moved.push(entry.item_id);
        }
        row.list_id = entry.container_id;
        row.order = entry.order;
    }

    for id in &moved {
        let Some(row) = rows.get(id).copied() else {
            continue;
        };
        let parent_list = row
            .parent_id
            .map(|p| rows.get(&p).map(|parent| parent.list_id));
        if let Some(parent_list) = parent_list {
            if parent_list != Some(row.list_id) {
                if let Some(row) = rows.get_mut(id) {
                    row.parent_id = None;
                }
            }
        }
    }

    let mut children: HashMap<Uuid, Vec<(i64, Uuid)>> = HashMap::new();
    for (id, row) in rows.iter() {
        if let Some(parent) = row.parent_id {
            children.entry(parent).or_default().push((row.order, *id));
        }
    }
    for kids in children.values_mut() {
        kids.sort();
    }

    for id in &moved {
        let Some(list_id) = rows.get(id).map(|r| r.list_id) else {
            continue;
        };
        let descendants = collect_descendants(*id, |p| {
            Ok(children
                .get(&p)
                .map(|kids| kids.iter().map(|(_, k)| *k).collect())
                .unwrap_or_default())
        })?;
        for descendant in descendants {
            if rows.get(&descendant).map(|r| r.list_id) == Some(list_id) {
                continue;
            }
            let order = next_order(
                rows.values()
                    .filter(|r| r.list_id == list_id)
                    .map(|r| r.order),
            );
            if let Some(row) = rows.get_mut(&descendant) {
                row.list_id = list_id;
                row.order = order;
            }
        }
    }

    let containers = batch.containers();
    ensure_distinct_orders(
        ItemKind::Task,
        &containers,
        rows.values().map(|r| (r.list_id, r.order)),
    )?;

    let mut changed: Vec<Uuid> = rows
        .iter()
        .filter(|(id, row)| before.get(*id) != Some(*row))
        .map(|(id, _)| *id)
        .collect();
    changed.sort();
    Ok(changed)
}

/// Fail unless every container in `containers` holds distinct orders. `placed` yields
/// `(container, order)` for every item in those containers, not only the batch entries.
pub(crate) fn ensure_distinct_orders(
    kind: ItemKind,
    containers: &[Uuid],
    placed: impl IntoIterator<Item = (Uuid, i64)>,
) -> BoardResult<()> {
    let mut seen = HashSet::new();
    for (container, order) in placed {
        if containers.contains(&container) && !seen.insert((container, order)) {
            return Err(BoardError::MalformedInput(format!(
                "Order {} is already taken by another {} in {}",
                order, kind, container
            )));
        }
    }
    Ok(())
}
