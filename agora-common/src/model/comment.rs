//! Comments and the threaded view of them.
//!
//! Comments are stored flat. `parent_id` points back at the comment being
//! replied to, and the thread structure only exists in the [`CommentNode`]
//! trees built per request by [`build_comment_tree`].

use crate::model::{Id, post::PostMarker, user::User};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

text_field!(CommentContent, field = "content", max_chars = None);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    /// `None` for top-level comments. Otherwise a comment on the same post
    /// that existed before this one.
    pub parent_id: Option<Id<CommentMarker>>,
    pub author: User,
    pub content: CommentContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateComment {
    pub content: CommentContent,
    #[serde(default)]
    pub parent_id: Option<Id<CommentMarker>>,
}

/// A comment and its replies, oldest first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this thread, including this one.
    #[must_use]
    pub fn thread_len(&self) -> usize {
        let mut len = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            len += 1;
            pending.extend(&node.replies);
        }
        len
    }
}

// Threads can be arbitrarily deep; the derived drop glue would recurse once
// per level.
impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

struct Frame {
    comment: Comment,
    children: std::vec::IntoIter<Comment>,
    replies: Vec<CommentNode>,
}

impl Frame {
    fn open(
        comment: Comment,
        children: &mut HashMap<Option<Id<CommentMarker>>, Vec<Comment>>,
    ) -> Self {
        let own_children = children.remove(&Some(comment.id)).unwrap_or_default();
        Self {
            comment,
            children: own_children.into_iter(),
            replies: Vec::new(),
        }
    }
}

/// Assembles the comments of `post_id` into threads.
///
/// Top-level comments and every list of replies are ordered by creation
/// time, then id. Comments of other posts, replies whose parent is not in
/// `comments`, and replies whose parent belongs to another post are left
/// out. Assembly uses an explicit stack, so thread depth is not limited by
/// the call stack.
#[must_use]
pub fn build_comment_tree(post_id: Id<PostMarker>, mut comments: Vec<Comment>) -> Vec<CommentNode> {
    comments.retain(|comment| comment.post_id == post_id);
    comments.sort_by_key(|comment| (comment.created_at, comment.id));

    let mut children: HashMap<Option<Id<CommentMarker>>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        children.entry(comment.parent_id).or_default().push(comment);
    }

    let mut roots = children.remove(&None).unwrap_or_default().into_iter();
    let mut tree = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let Some(mut frame) = stack.pop() else {
            match roots.next() {
                Some(root) => {
                    stack.push(Frame::open(root, &mut children));
                    continue;
                }
                None => break,
            }
        };

        if let Some(child) = frame.children.next() {
            let child_frame = Frame::open(child, &mut children);
            stack.push(frame);
            stack.push(child_frame);
        } else {
            let node = CommentNode {
                comment: frame.comment,
                replies: frame.replies,
            };
            match stack.last_mut() {
                Some(parent) => parent.replies.push(node),
                None => tree.push(node),
            }
        }
    }

    tree
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        comment::{Comment, CommentContent, CommentNode, build_comment_tree},
        post::PostMarker,
        user::{User, Username},
    };
    use time::{Duration, OffsetDateTime, macros::datetime};

    const POST: u64 = 1000;
    const OTHER_POST: u64 = 2000;

    fn comment(id: u64, post: u64, parent: Option<u64>, minute: i64) -> Comment {
        let start: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);
        Comment {
            id: Id::from(id),
            post_id: Id::from(post),
            parent_id: parent.map(Id::from),
            author: User {
                id: Id::from(1),
                username: Username::new("alice").unwrap(),
            },
            content: CommentContent::new(&format!("comment {id}")).unwrap(),
            created_at: start + Duration::minutes(minute),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<u64> {
        nodes.iter().map(|node| node.comment.id.into()).collect()
    }

    fn post() -> Id<PostMarker> {
        Id::from(POST)
    }

    #[test]
    fn no_comments_means_no_threads() {
        assert!(build_comment_tree(post(), Vec::new()).is_empty());
    }

    #[test]
    fn reply_is_nested_under_its_parent() {
        let root = comment(1, POST, None, 0);
        let reply = comment(2, POST, Some(1), 1);

        let tree = build_comment_tree(post(), vec![reply.clone(), root.clone()]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment, root);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment, reply);
        assert!(tree[0].replies[0].replies.is_empty());
    }

    #[test]
    fn siblings_are_ordered_by_creation_then_id() {
        let comments = vec![
            comment(5, POST, None, 3),
            comment(4, POST, None, 1),
            comment(3, POST, None, 1),
            comment(9, POST, Some(3), 10),
            comment(8, POST, Some(3), 10),
            comment(7, POST, Some(3), 5),
        ];

        let tree = build_comment_tree(post(), comments);

        assert_eq!(ids(&tree), [3, 4, 5]);
        assert_eq!(ids(&tree[0].replies), [7, 8, 9]);
    }

    #[test]
    fn other_posts_never_leak_into_the_tree() {
        let comments = vec![
            comment(1, POST, None, 0),
            comment(2, OTHER_POST, None, 1),
            // Claims a parent on this post while belonging to another one.
            comment(3, OTHER_POST, Some(1), 2),
            comment(4, POST, Some(1), 3),
        ];

        let tree = build_comment_tree(post(), comments);

        assert_eq!(ids(&tree), [1]);
        assert_eq!(ids(&tree[0].replies), [4]);
    }

    #[test]
    fn replies_without_a_known_parent_are_dropped() {
        let comments = vec![comment(1, POST, None, 0), comment(2, POST, Some(99), 1)];

        let tree = build_comment_tree(post(), comments);

        assert_eq!(ids(&tree), [1]);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn deep_threads_do_not_exhaust_the_stack() {
        const DEPTH: u64 = 50_000;
        let mut comments = vec![comment(1, POST, None, 0)];
        for id in 2..=DEPTH {
            comments.push(comment(id, POST, Some(id - 1), 0));
        }

        let tree = build_comment_tree(post(), comments);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].thread_len(), usize::try_from(DEPTH).unwrap());

        let mut depth = 1;
        let mut node = &tree[0];
        while let Some(reply) = node.replies.first() {
            depth += 1;
            node = reply;
        }
        assert_eq!(depth, DEPTH);
    }

    #[test]
    fn every_comment_appears_once() {
        let comments = vec![
            comment(1, POST, None, 0),
            comment(2, POST, Some(1), 1),
            comment(3, POST, Some(2), 2),
            comment(4, POST, Some(1), 3),
            comment(5, POST, None, 4),
            comment(6, POST, Some(5), 5),
        ];

        let tree = build_comment_tree(post(), comments);

        let total: usize = tree.iter().map(CommentNode::thread_len).sum();
        assert_eq!(total, 6);
        assert_eq!(ids(&tree), [1, 5]);
        assert_eq!(ids(&tree[0].replies), [2, 4]);
        assert_eq!(ids(&tree[0].replies[0].replies), [3]);
        assert_eq!(ids(&tree[1].replies), [6]);
    }
}
