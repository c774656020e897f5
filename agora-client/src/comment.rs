use std::{mem, slice, vec};

use crate::{
    api::{self, CommentId, PostId, Time, User, Vote},
    Operation,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Active,

    /// Terminal: the content is hidden, the replies stay
    Deleted,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fold {
    Expanded,
    Collapsed,
}

impl Fold {
    pub fn for_depth(depth: usize, expand_depth: usize) -> Fold {
        match depth < expand_depth {
            true => Fold::Expanded,
            false => Fold::Collapsed,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    Viewing,
    Editing { draft: String },
    Replying { draft: String },
}

/// Clones and drops walk the subtree iteratively, as nesting depth is
/// unbounded
#[derive(Debug, Eq, PartialEq)]
pub struct Comment {
    pub(crate) id: CommentId,
    pub(crate) post_id: PostId,
    pub(crate) author: User,
    pub(crate) content: String,
    pub(crate) created_at: Time,
    pub(crate) edited_at: Option<Time>,
    pub(crate) is_edited: bool,
    pub(crate) parent_id: Option<CommentId>,
    pub(crate) replies: Vec<Comment>,
    pub(crate) vote_count: i64,
    pub(crate) user_vote: Vote,
    pub(crate) status: Status,

    /// Set once the user showed or hid the replies; until then the depth decides
    pub(crate) fold: Option<Fold>,
    pub(crate) mode: Mode,
    pub(crate) pending: Option<Operation>,
}

impl Comment {
    /// `node` without its replies, which `build` attaches afterwards
    fn shallow(
        node: api::CommentNode,
        parent: Option<CommentId>,
    ) -> (Comment, vec::IntoIter<api::CommentNode>) {
        if node.parent_id != parent {
            tracing::warn!(
                comment = ?node.id,
                claimed = ?node.parent_id,
                actual = ?parent,
                "comment has a parent that does not match its position in the forest"
            );
        }
        let c = Comment {
            id: node.id,
            post_id: node.post_id,
            author: node.author,
            content: node.content,
            created_at: node.created_at,
            edited_at: node.edited_at,
            is_edited: node.is_edited || node.edited_at.is_some(),
            parent_id: parent,
            replies: Vec::with_capacity(node.replies.len()),
            vote_count: node.vote_count,
            user_vote: node.user_vote,
            status: match node.is_deleted {
                true => Status::Deleted,
                false => Status::Active,
            },
            fold: None,
            mode: Mode::Viewing,
            pending: None,
        };
        (c, node.replies.into_iter())
    }

    /// Everything but the replies
    fn clone_shallow(&self) -> Comment {
        Comment {
            id: self.id.clone(),
            post_id: self.post_id.clone(),
            author: self.author.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            edited_at: self.edited_at,
            is_edited: self.is_edited,
            parent_id: self.parent_id.clone(),
            replies: Vec::with_capacity(self.replies.len()),
            vote_count: self.vote_count,
            user_vote: self.user_vote,
            status: self.status,
            fold: self.fold,
            mode: self.mode.clone(),
            pending: self.pending,
        }
    }

    pub fn id(&self) -> &CommentId {
        &self.id
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn author(&self) -> &User {
        &self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> Time {
        self.created_at
    }

    pub fn edited_at(&self) -> Option<Time> {
        self.edited_at
    }

    pub fn is_edited(&self) -> bool {
        self.is_edited
    }

    pub fn parent_id(&self) -> Option<&CommentId> {
        self.parent_id.as_ref()
    }

    pub fn replies(&self) -> &[Comment] {
        &self.replies
    }

    pub fn vote_count(&self) -> i64 {
        self.vote_count
    }

    pub fn user_vote(&self) -> Vote {
        self.user_vote
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_deleted(&self) -> bool {
        self.status == Status::Deleted
    }

    pub fn fold_override(&self) -> Option<Fold> {
        self.fold
    }

    pub fn fold(&self, depth: usize, expand_depth: usize) -> Fold {
        self.fold
            .unwrap_or_else(|| Fold::for_depth(depth, expand_depth))
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn pending(&self) -> Option<Operation> {
        self.pending
    }

    /// Number of comments in this subtree, self included
    pub fn subtree_len(&self) -> usize {
        let mut res = 0;
        let mut stack = vec![self];
        while let Some(c) = stack.pop() {
            res += 1;
            stack.extend(c.replies.iter());
        }
        res
    }
}

impl Clone for Comment {
    fn clone(&self) -> Comment {
        let mut res = self.clone_shallow();
        res.replies = clone_forest(&self.replies);
        res
    }
}

impl Drop for Comment {
    fn drop(&mut self) {
        let mut stack = mem::take(&mut self.replies);
        while let Some(mut c) = stack.pop() {
            stack.append(&mut c.replies);
        }
    }
}

// Tree walks below use an explicit stack, as nesting depth is unbounded.

/// Builds the local trees for `forest`, whose roots are expected to be
/// children of `parent` (or top-level when `None`)
pub(crate) fn build(forest: Vec<api::CommentNode>, parent: Option<CommentId>) -> Vec<Comment> {
    let mut res = Vec::with_capacity(forest.len());
    let mut roots = forest.into_iter();
    let mut stack: Vec<(Comment, vec::IntoIter<api::CommentNode>)> = Vec::new();
    loop {
        let next = match stack.last_mut() {
            Some((c, rest)) => rest.next().map(|n| (n, Some(c.id.clone()))),
            None => match roots.next() {
                Some(n) => Some((n, parent.clone())),
                None => break,
            },
        };
        match next {
            Some((node, parent)) => stack.push(Comment::shallow(node, parent)),
            None => {
                // the top of the stack has all its replies
                if let Some((done, _)) = stack.pop() {
                    match stack.last_mut() {
                        Some((p, _)) => p.replies.push(done),
                        None => res.push(done),
                    }
                }
            }
        }
    }
    res
}

fn clone_forest(forest: &[Comment]) -> Vec<Comment> {
    let mut res = Vec::with_capacity(forest.len());
    let mut roots = forest.iter();
    let mut stack: Vec<(Comment, slice::Iter<'_, Comment>)> = Vec::new();
    loop {
        let next = match stack.last_mut() {
            Some((_, rest)) => rest.next(),
            None => match roots.next() {
                Some(c) => Some(c),
                None => break,
            },
        };
        match next {
            Some(c) => stack.push((c.clone_shallow(), c.replies.iter())),
            None => {
                if let Some((done, _)) = stack.pop() {
                    match stack.last_mut() {
                        Some((p, _)) => p.replies.push(done),
                        None => res.push(done),
                    }
                }
            }
        }
    }
    res
}

/// Finds comment `id` anywhere in `comments`, along with its depth
pub(crate) fn find<'a>(comments: &'a [Comment], id: &CommentId) -> Option<(usize, &'a Comment)> {
    let mut stack = comments.iter().map(|c| (0, c)).collect::<Vec<_>>();
    while let Some((depth, c)) = stack.pop() {
        if &c.id == id {
            return Some((depth, c));
        }
        stack.extend(c.replies.iter().map(|r| (depth + 1, r)));
    }
    None
}

pub(crate) fn find_mut<'a>(comments: &'a mut [Comment], id: &CommentId) -> Option<&'a mut Comment> {
    let mut stack = comments.iter_mut().collect::<Vec<_>>();
    while let Some(c) = stack.pop() {
        if &c.id == id {
            return Some(c);
        }
        stack.extend(c.replies.iter_mut());
    }
    None
}
