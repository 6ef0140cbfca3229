//! Pure operations over a comment forest. Every function leaves its input untouched and
//! returns a freshly built structure.
//!
//! `flatten`, `count` and `contains` walk with an explicit stack. `insert_reply` and
//! `remove_by_id` recurse once per level, like the derived `Clone`, `PartialEq` and drop
//! glue of [`Comment`], so nesting depth is bounded by the thread's stack.

use crate::domain::comment::{Comment, CommentId, CommentRecord};

/// Flattens the forest into storage records in pre-order (parent before children).
///
/// Each record's `parent_id` is the id of the node that contains it in the tree, and is
/// `None` for roots.
pub fn flatten(comments: &[Comment]) -> Vec<CommentRecord> {
    let mut records = Vec::with_capacity(count(comments));
    let mut stack: Vec<(&Comment, Option<CommentId>)> =
        comments.iter().rev().map(|c| (c, None)).collect();

    while let Some((comment, parent_id)) = stack.pop() {
        records.push(CommentRecord {
            id: comment.id,
            text: comment.text.clone(),
            timestamp: comment.timestamp,
            parent_id,
        });
        stack.extend(comment.replies.iter().rev().map(|reply| (reply, Some(comment.id))));
    }

    records
}

/// Returns a copy of the forest with `reply` prepended to the replies of the node whose id
/// is `parent_id`. If no node matches, the copy is identical to the input.
pub fn insert_reply(comments: &[Comment], parent_id: CommentId, reply: Comment) -> Vec<Comment> {
    let mut updated = comments.to_vec();
    insert_into(&mut updated, parent_id, reply);
    updated
}

fn insert_into(comments: &mut [Comment], parent_id: CommentId, reply: Comment) -> Option<Comment> {
    let mut reply = reply;
    for comment in comments.iter_mut() {
        if comment.id == parent_id {
            comment.replies.insert(0, reply);
            return None;
        }
        match insert_into(&mut comment.replies, parent_id, reply) {
            Some(unplaced) => reply = unplaced,
            None => return None,
        }
    }
    Some(reply)
}

/// Returns a copy of the forest without the node `id` and its whole subtree.
pub fn remove_by_id(comments: &[Comment], id: CommentId) -> Vec<Comment> {
    comments
        .iter()
        .filter(|comment| comment.id != id)
        .map(|comment| Comment {
            id: comment.id,
            text: comment.text.clone(),
            timestamp: comment.timestamp,
            parent_id: comment.parent_id,
            replies: remove_by_id(&comment.replies, id),
        })
        .collect()
}

/// Total number of nodes, roots and nested replies alike.
pub fn count(comments: &[Comment]) -> usize {
    let mut total = 0;
    let mut stack: Vec<&Comment> = comments.iter().collect();
    while let Some(comment) = stack.pop() {
        total += 1;
        stack.extend(comment.replies.iter());
    }
    total
}

/// Whether a node with `id` exists at any depth.
pub fn contains(comments: &[Comment], id: CommentId) -> bool {
    let mut stack: Vec<&Comment> = comments.iter().collect();
    while let Some(comment) = stack.pop() {
        if comment.id == id {
            return true;
        }
        stack.extend(comment.replies.iter());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use proptest::prelude::*;
    use uuid::Uuid;

    use crate::domain::builder::build_tree;

    fn node(text: &str, timestamp: i64, parent_id: Option<CommentId>) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            text: text.to_string(),
            timestamp,
            parent_id,
            replies: vec![],
        }
    }

    /// root_a
    ///   reply_a1
    ///     reply_a1a
    ///   reply_a2
    /// root_b
    fn sample_forest() -> Vec<Comment> {
        let mut root_a = node("root a", 10, None);
        let mut reply_a1 = node("reply a1", 20, Some(root_a.id));
        let reply_a1a = node("reply a1a", 30, Some(reply_a1.id));
        let reply_a2 = node("reply a2", 15, Some(root_a.id));
        reply_a1.replies.push(reply_a1a);
        root_a.replies.push(reply_a1);
        root_a.replies.push(reply_a2);
        let root_b = node("root b", 5, None);
        vec![root_a, root_b]
    }

    #[test]
    fn test_flatten_is_pre_order_with_parent_ids() {
        let forest = sample_forest();
        let records = flatten(&forest);

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["root a", "reply a1", "reply a1a", "reply a2", "root b"]);

        assert_eq!(records[0].parent_id, None);
        assert_eq!(records[1].parent_id, Some(forest[0].id));
        assert_eq!(records[2].parent_id, Some(forest[0].replies[0].id));
        assert_eq!(records[3].parent_id, Some(forest[0].id));
        assert_eq!(records[4].parent_id, None);
    }

    #[test]
    fn test_flatten_visits_every_node_once() {
        let forest = sample_forest();
        let records = flatten(&forest);

        let mut ids: Vec<CommentId> = records.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count(&forest));
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_flatten_handles_deep_chains() {
        let depth = 1_000;
        let mut current = node("leaf", depth as i64, None);
        for i in (0..depth).rev() {
            let mut parent = node("link", i as i64, None);
            current.parent_id = Some(parent.id);
            parent.replies.push(current);
            current = parent;
        }
        let forest = vec![current];

        assert_eq!(flatten(&forest).len(), depth + 1);
        assert_eq!(count(&forest), depth + 1);
    }

    #[test]
    fn test_insert_and_remove_at_depth() {
        let depth = 1_000;
        let mut current = node("leaf", depth as i64, None);
        let leaf = current.id;
        for i in (0..depth).rev() {
            let mut parent = node("link", i as i64, None);
            current.parent_id = Some(parent.id);
            parent.replies.push(current);
            current = parent;
        }
        let forest = vec![current];
        let reply = node("deepest", 0, Some(leaf));
        let reply_id = reply.id;

        let inserted = insert_reply(&forest, leaf, reply);
        assert_eq!(count(&inserted), depth + 2);
        assert!(contains(&inserted, reply_id));

        let removed = remove_by_id(&inserted, leaf);
        assert_eq!(count(&removed), depth);
        assert!(!contains(&removed, reply_id));
    }

    #[test]
    fn test_flatten_empty_forest() {
        assert!(flatten(&[]).is_empty());
    }

    #[test]
    fn test_insert_reply_prepends_at_depth() {
        let forest = sample_forest();
        let target = forest[0].replies[0].id;
        let reply = node("new reply", 40, Some(target));

        let updated = insert_reply(&forest, target, reply.clone());

        let replies = &updated[0].replies[0].replies;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], reply);
        assert_eq!(count(&updated), 6);
        // input untouched
        assert_eq!(count(&forest), 5);
    }

    #[test]
    fn test_insert_reply_into_root() {
        let forest = sample_forest();
        let target = forest[1].id;
        let reply = node("under b", 40, Some(target));

        let updated = insert_reply(&forest, target, reply.clone());

        assert_eq!(updated[1].replies, vec![reply]);
    }

    #[test]
    fn test_insert_reply_unknown_parent_is_noop() {
        let forest = sample_forest();
        let reply = node("lost", 40, None);

        let updated = insert_reply(&forest, Uuid::new_v4(), reply);

        assert_eq!(updated, forest);
    }

    #[test]
    fn test_remove_by_id_drops_subtree() {
        let forest = sample_forest();
        let removed = forest[0].replies[0].id;
        let grandchild = forest[0].replies[0].replies[0].id;

        let updated = remove_by_id(&forest, removed);

        assert_eq!(count(&updated), 3);
        assert!(!contains(&updated, removed));
        assert!(!contains(&updated, grandchild));
        assert!(flatten(&updated).iter().all(|r| r.parent_id != Some(removed)));
    }

    #[test]
    fn test_remove_root_drops_everything_below() {
        let forest = sample_forest();

        let updated = remove_by_id(&forest, forest[0].id);

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].text, "root b");
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let forest = sample_forest();

        assert_eq!(remove_by_id(&forest, Uuid::new_v4()), forest);
    }

    #[test]
    fn test_insert_then_remove_restores_shape() {
        let forest = sample_forest();
        let target = forest[0].replies[1].id;
        let reply = node("temporary", 50, Some(target));
        let reply_id = reply.id;

        let inserted = insert_reply(&forest, target, reply);
        let restored = remove_by_id(&inserted, reply_id);

        assert_eq!(restored, forest);
    }

    /// Records whose parent is always an earlier record, so every forest is well formed.
    fn forest_strategy() -> impl Strategy<Value = Vec<CommentRecord>> {
        prop::collection::vec((any::<Option<prop::sample::Index>>(), 0i64..1_000), 0..40).prop_map(
            |nodes| {
                let mut records: Vec<CommentRecord> = Vec::with_capacity(nodes.len());
                for (parent, timestamp) in nodes {
                    let parent_id = match parent {
                        Some(index) if !records.is_empty() => {
                            Some(records[index.index(records.len())].id)
                        }
                        _ => None,
                    };
                    records.push(CommentRecord {
                        id: Uuid::new_v4(),
                        text: format!("comment {}", records.len()),
                        timestamp,
                        parent_id,
                    });
                }
                records
            },
        )
    }

    /// `id` plus every record below it.
    fn subtree_ids(records: &[CommentRecord], id: CommentId) -> HashSet<CommentId> {
        let mut ids = HashSet::from([id]);
        // parents precede children in generated records
        for record in records {
            if record.parent_id.is_some_and(|parent| ids.contains(&parent)) {
                ids.insert(record.id);
            }
        }
        ids
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn flatten_then_build_returns_same_forest(records in forest_strategy()) {
            let forest = build_tree(records.clone());
            let flattened = flatten(&forest);

            prop_assert_eq!(flattened.len(), records.len());
            let ids: HashSet<CommentId> = flattened.iter().map(|r| r.id).collect();
            prop_assert_eq!(ids.len(), records.len());
            prop_assert_eq!(build_tree(flattened), forest);
        }

        #[test]
        fn remove_drops_whole_subtree(
            records in forest_strategy(),
            target in any::<prop::sample::Index>(),
        ) {
            prop_assume!(!records.is_empty());
            let id = records[target.index(records.len())].id;
            let removed_ids = subtree_ids(&records, id);
            let forest = build_tree(records.clone());

            let updated = remove_by_id(&forest, id);

            prop_assert_eq!(count(&updated), records.len() - removed_ids.len());
            for record in flatten(&updated) {
                prop_assert!(!removed_ids.contains(&record.id));
                prop_assert!(record.parent_id.is_none_or(|parent| !removed_ids.contains(&parent)));
            }
        }

        #[test]
        fn insert_then_remove_restores_forest(
            records in forest_strategy(),
            target in any::<prop::sample::Index>(),
        ) {
            prop_assume!(!records.is_empty());
            let parent_id = records[target.index(records.len())].id;
            let forest = build_tree(records);
            let reply = Comment::new("reply", Some(parent_id));
            let reply_id = reply.id;

            let inserted = insert_reply(&forest, parent_id, reply);
            prop_assert_eq!(count(&inserted), count(&forest) + 1);

            prop_assert_eq!(remove_by_id(&inserted, reply_id), forest);
        }
    }

    #[test]
    fn test_contains_finds_nested_ids() {
        let forest = sample_forest();

        assert!(contains(&forest, forest[0].replies[0].replies[0].id));
        assert!(!contains(&forest, Uuid::new_v4()));
    }
}
