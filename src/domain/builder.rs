use std::collections::HashMap;

use crate::domain::comment::{Comment, CommentId, CommentRecord};

/// Rebuilds the comment forest from flat storage records.
///
/// Roots and every sibling group come back newest-first by timestamp. A record whose
/// `parent_id` does not resolve becomes a root; records caught in a parent cycle are
/// promoted to roots as well, so nothing read from storage is dropped. Only exact
/// duplicate ids are collapsed (first record wins).
pub fn build_tree(records: Vec<CommentRecord>) -> Vec<Comment> {
    let mut index: HashMap<CommentId, usize> = HashMap::with_capacity(records.len());
    let mut slots: Vec<Option<CommentRecord>> = Vec::with_capacity(records.len());

    for record in records {
        if index.contains_key(&record.id) {
            tracing::warn!(comment_id = %record.id, "duplicate comment id in storage, keeping first");
            continue;
        }
        index.insert(record.id, slots.len());
        slots.push(Some(record));
    }

    let mut children: HashMap<CommentId, Vec<usize>> = HashMap::new();
    let mut root_slots = Vec::new();

    for (idx, slot) in slots.iter().enumerate() {
        let Some(record) = slot else { continue };
        match record.parent_id {
            Some(parent_id) if index.contains_key(&parent_id) => {
                children.entry(parent_id).or_default().push(idx);
            }
            Some(parent_id) => {
                tracing::debug!(comment_id = %record.id, %parent_id, "orphaned comment, treating as root");
                root_slots.push(idx);
            }
            None => root_slots.push(idx),
        }
    }

    let mut roots: Vec<Comment> = root_slots
        .into_iter()
        .filter_map(|idx| assemble(idx, &mut slots, &children))
        .collect();

    // Whatever is still unplaced sits on a parent cycle and was never reached from a root.
    for idx in 0..slots.len() {
        if let Some(comment) = assemble(idx, &mut slots, &children) {
            tracing::warn!(comment_id = %comment.id, "comment unreachable from any root, promoting to root");
            roots.push(comment);
        }
    }

    sort_newest_first(&mut roots);
    roots
}

/// Detaches the record at `idx` and everything below it into one subtree. Walks
/// breadth-first with an explicit queue so deep chains do not grow the call stack.
fn assemble(
    idx: usize,
    slots: &mut [Option<CommentRecord>],
    children: &HashMap<CommentId, Vec<usize>>,
) -> Option<Comment> {
    let record = slots[idx].take()?;
    // Each entry points at its parent's position; parents always precede their children.
    let mut order: Vec<(Comment, Option<usize>)> = vec![(Comment::from(record), None)];

    let mut cursor = 0;
    while cursor < order.len() {
        let id = order[cursor].0.id;
        if let Some(child_slots) = children.get(&id) {
            for &child in child_slots {
                if let Some(record) = slots[child].take() {
                    order.push((Comment::from(record), Some(cursor)));
                }
            }
        }
        cursor += 1;
    }

    while let Some((mut comment, parent)) = order.pop() {
        // Replies were attached last-first.
        comment.replies.reverse();
        sort_newest_first(&mut comment.replies);
        match parent {
            Some(parent) => order[parent].0.replies.push(comment),
            None => return Some(comment),
        }
    }
    None
}

fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
