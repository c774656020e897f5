//! Turns a `Thread` into a view tree that front ends only need to draw.
//!
//! Rendering is pure: it reads the thread and the session and decides, for
//! each comment, what is shown and which controls are available.

use crate::{
    api::{CommentId, Time, User, Vote},
    Comment, Error, Fold, Mode, RenderConfig, Session, Thread,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadView {
    pub composer: ComposerView,
    pub comments: Vec<CommentView>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComposerView {
    /// Anonymous viewers get a "log in or sign up" prompt instead
    SignedOut,
    Open { draft: String, submitting: bool },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentView {
    pub id: CommentId,
    pub depth: usize,
    pub body: Body,
    pub replies: Replies,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Body {
    Tombstone,
    Live(Box<LiveBody>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LiveBody {
    pub author: User,
    pub content: String,
    pub created_at: Time,
    pub is_edited: bool,
    pub votes: VoteControls,

    /// `None` while the edit box replaces the action bar
    pub actions: Option<Actions>,
    pub mode: Mode,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VoteControls {
    pub count: i64,

    /// Which arrow to highlight
    pub viewer_vote: Vote,
    pub busy: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyControl {
    Available,
    LoginRequired,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Actions {
    pub reply: ReplyControl,
    pub can_edit: bool,
    pub can_delete: bool,
    pub busy: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Replies {
    None,
    Inline {
        comments: Vec<CommentView>,
        can_hide: bool,
    },
    /// "Show N replies"
    Hidden { count: usize },
    /// Too deep to nest further: links to `render_focus(from)`
    ContinueThread { from: CommentId, count: usize },
}

pub fn render(thread: &Thread, session: &Session) -> ThreadView {
    let composer = match session.is_signed_in() {
        true => ComposerView::Open {
            draft: String::from(thread.composer_draft()),
            submitting: thread.is_composer_pending(),
        },
        false => ComposerView::SignedOut,
    };
    let comments = thread
        .comments()
        .iter()
        .map(|c| render_comment(c, 0, thread.config(), session))
        .collect();
    ThreadView { composer, comments }
}

/// Renders the subtree rooted at `id` as if it were top-level
pub fn render_focus(
    thread: &Thread,
    session: &Session,
    id: &CommentId,
) -> Result<CommentView, Error> {
    let c = thread
        .get(id)
        .ok_or_else(|| Error::NotFound(id.clone()))?;
    Ok(render_comment(c, 0, thread.config(), session))
}

fn render_comment(c: &Comment, depth: usize, config: &RenderConfig, session: &Session) -> CommentView {
    let body = match c.is_deleted() {
        true => Body::Tombstone,
        false => Body::Live(Box::new(render_body(c, session))),
    };

    let count = c.replies().len();
    let inline = |can_hide| Replies::Inline {
        comments: c
            .replies()
            .iter()
            .map(|r| render_comment(r, depth + 1, config, session))
            .collect(),
        can_hide,
    };
    let replies = if count == 0 {
        Replies::None
    } else if depth >= config.max_depth {
        Replies::ContinueThread {
            from: c.id().clone(),
            count,
        }
    } else if c.is_deleted() {
        inline(false)
    } else {
        match c.fold(depth, config.expand_depth) {
            Fold::Expanded => inline(true),
            Fold::Collapsed => Replies::Hidden { count },
        }
    };

    CommentView {
        id: c.id().clone(),
        depth,
        body,
        replies,
    }
}

fn render_body(c: &Comment, session: &Session) -> LiveBody {
    let busy = c.pending().is_some();
    let actions = match c.mode() {
        Mode::Editing { .. } => None,
        Mode::Viewing | Mode::Replying { .. } => {
            let is_author = session.is_author(c.author());
            Some(Actions {
                reply: match session.is_signed_in() {
                    true => ReplyControl::Available,
                    false => ReplyControl::LoginRequired,
                },
                can_edit: is_author,
                can_delete: is_author,
                busy,
            })
        }
    };
    LiveBody {
        author: c.author().clone(),
        content: String::from(c.content()),
        created_at: c.created_at(),
        is_edited: c.is_edited(),
        votes: VoteControls {
            count: c.vote_count(),
            viewer_vote: c.user_vote(),
            busy,
        },
        actions,
        mode: c.mode().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::Direction,
        thread::tests::{alice, bob, chain_thread, cid, example_thread},
    };

    fn live(v: &CommentView) -> &LiveBody {
        match &v.body {
            Body::Live(b) => b,
            Body::Tombstone => panic!("comment {:?} unexpectedly deleted", v.id),
        }
    }

    fn inline(v: &CommentView) -> &[CommentView] {
        match &v.replies {
            Replies::Inline { comments, .. } => comments,
            r => panic!("replies of {:?} are not inline: {r:?}", v.id),
        }
    }

    #[test]
    fn example_thread_as_seen_by_its_author() {
        let t = example_thread();
        let view = render(&t, &Session::signed_in(alice()));
        assert_eq!(
            view.composer,
            ComposerView::Open {
                draft: String::new(),
                submitting: false
            }
        );
        assert_eq!(view.comments.len(), 1);

        let top = &view.comments[0];
        assert_eq!(top.depth, 0);
        assert_eq!(live(top).votes.count, 5);
        let actions = live(top).actions.unwrap();
        assert!(actions.can_edit && actions.can_delete);
        assert_eq!(actions.reply, ReplyControl::Available);

        let reply = &inline(top)[0];
        assert_eq!(reply.depth, 1);
        assert_eq!(live(reply).content, "B");
        let actions = live(reply).actions.unwrap();
        assert!(!actions.can_edit && !actions.can_delete);
        assert_eq!(reply.replies, Replies::None);
    }

    #[test]
    fn anonymous_viewers() {
        let t = example_thread();
        let view = render(&t, &Session::anonymous());
        assert_eq!(view.composer, ComposerView::SignedOut);
        let actions = live(&view.comments[0]).actions.unwrap();
        assert_eq!(actions.reply, ReplyControl::LoginRequired);
        assert!(!actions.can_edit && !actions.can_delete);
    }

    #[test]
    fn deep_replies_fold_then_continue() {
        let mut t = chain_thread(8);
        let s = Session::anonymous();
        let view = render(&t, &s);

        // depths 0 to 2 are expanded, depth 3 is collapsed
        let mut v = &view.comments[0];
        for _ in 0..3 {
            v = &inline(v)[0];
        }
        assert_eq!(v.depth, 3);
        assert_eq!(v.replies, Replies::Hidden { count: 1 });

        // expanding all the way down stops at the maximum depth
        for id in 13..18 {
            t.show_replies(cid(id)).unwrap();
        }
        let view = render(&t, &s);
        let mut v = &view.comments[0];
        for _ in 0..5 {
            v = &inline(v)[0];
        }
        assert_eq!(v.depth, 5);
        assert_eq!(
            v.replies,
            Replies::ContinueThread {
                from: cid(15),
                count: 1
            }
        );

        let focus = render_focus(&t, &s, &cid(15)).unwrap();
        assert_eq!(focus.depth, 0);
        assert_eq!(inline(&focus)[0].id, cid(16));
        assert!(matches!(
            render_focus(&t, &s, &cid(99)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn hidden_replies_by_choice() {
        let mut t = example_thread();
        t.hide_replies(cid(1)).unwrap();
        let view = render(&t, &Session::anonymous());
        assert_eq!(view.comments[0].replies, Replies::Hidden { count: 1 });
    }

    #[test]
    fn tombstones_keep_their_replies() {
        let mut t = example_thread();
        let s = Session::signed_in(alice());
        t.hide_replies(cid(1)).unwrap();
        let ticket = t.begin_delete(&s, cid(1), |_| true).unwrap().unwrap();
        t.finish_delete(ticket, Ok(())).unwrap();

        let view = render(&t, &s);
        let top = &view.comments[0];
        assert_eq!(top.body, Body::Tombstone);
        match &top.replies {
            Replies::Inline { comments, can_hide } => {
                assert!(!can_hide);
                assert_eq!(live(&comments[0]).content, "B");
            }
            r => panic!("unexpected replies {r:?}"),
        }
    }

    #[test]
    fn deleted_comments_still_stop_at_max_depth() {
        let mut t = chain_thread(8);
        for (id, author) in [(14, alice()), (15, bob())] {
            let s = Session::signed_in(author);
            let ticket = t.begin_delete(&s, cid(id), |_| true).unwrap().unwrap();
            t.finish_delete(ticket, Ok(())).unwrap();
        }
        t.show_replies(cid(13)).unwrap();
        // ignored for tombstones
        t.hide_replies(cid(14)).unwrap();

        let s = Session::anonymous();
        let view = render(&t, &s);
        let mut v = &view.comments[0];
        for _ in 0..5 {
            v = &inline(v)[0];
        }
        assert_eq!(v.depth, 5);
        assert_eq!(v.id, cid(15));
        assert_eq!(v.body, Body::Tombstone);
        assert_eq!(
            v.replies,
            Replies::ContinueThread {
                from: cid(15),
                count: 1
            }
        );

        let focus = render_focus(&t, &s, &cid(15)).unwrap();
        assert_eq!(focus.body, Body::Tombstone);
        assert_eq!(live(&inline(&focus)[0]).content, "level 6");
    }

    #[test]
    fn busy_and_editing_controls() {
        let mut t = example_thread();
        let s = Session::signed_in(bob());
        let ticket = t.begin_vote(&s, cid(1), Direction::Up).unwrap();
        t.start_editing(&s, cid(2)).unwrap();

        let view = render(&t, &s);
        let top = live(&view.comments[0]);
        assert!(top.votes.busy);
        assert!(top.actions.unwrap().busy);
        let reply = live(&inline(&view.comments[0])[0]);
        assert_eq!(reply.actions, None);
        assert_eq!(
            reply.mode,
            Mode::Editing {
                draft: String::from("B")
            }
        );

        t.finish_vote(ticket, Ok(())).unwrap();
        let view = render(&t, &s);
        let top = live(&view.comments[0]);
        assert!(!top.votes.busy);
        assert_eq!(top.votes.viewer_vote, Vote::Up);
        assert_eq!(top.votes.count, 6);
    }
}
