use std::fmt::Write;

use agora_client::{
    api::{PostId, Time, Vote},
    render::{Body, CommentView, ComposerView, LiveBody, ReplyControl, Replies, ThreadView},
    Mode,
};

const INDENT: &str = "    ";

pub fn age(then: Time, now: Time) -> String {
    let secs = (now - then).num_seconds().max(0);
    let (n, unit) = match secs {
        s if s < 60 => return String::from("just now"),
        s if s < 3600 => (s / 60, "minute"),
        s if s < 86400 => (s / 3600, "hour"),
        s if s < 30 * 86400 => (s / 86400, "day"),
        s if s < 365 * 86400 => (s / (30 * 86400), "month"),
        s => (s / (365 * 86400), "year"),
    };
    match n {
        1 => format!("1 {unit} ago"),
        n => format!("{n} {unit}s ago"),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    match n {
        1 => format!("1 {one}"),
        n => format!("{n} {many}"),
    }
}

pub fn thread(view: &ThreadView, post: &PostId, now: Time) -> String {
    let mut out = String::new();
    if view.composer == ComposerView::SignedOut {
        out.push_str("Log in or sign up to leave a comment\n\n");
    }
    if view.comments.is_empty() {
        out.push_str("No comments yet. Be the first to share what you think!\n");
    }
    for c in &view.comments {
        comment(&mut out, c, 0, post, now);
    }
    out
}

/// Renders `view` indented as if it were at `depth`, which differs from the
/// view's own depth for focused subtrees
pub fn comment(out: &mut String, view: &CommentView, depth: usize, post: &PostId, now: Time) {
    let indent = INDENT.repeat(depth);
    match &view.body {
        Body::Tombstone => {
            let _ = writeln!(out, "{indent}[deleted]  ({})", view.id.0);
        }
        Body::Live(body) => live(out, &indent, view, body, now),
    }

    match &view.replies {
        Replies::None => (),
        Replies::Inline { comments, .. } => {
            for c in comments {
                comment(out, c, depth + 1, post, now);
            }
        }
        Replies::Hidden { count } => {
            let _ = writeln!(out, "{indent}  Show {}", plural(*count, "reply", "replies"));
        }
        Replies::ContinueThread { from, .. } => {
            let _ = writeln!(
                out,
                "{indent}  Continue this thread → agora-ctl show {} --focus {}",
                post.0, from.0
            );
        }
    }
}

fn live(out: &mut String, indent: &str, view: &CommentView, body: &LiveBody, now: Time) {
    let (up, down) = match body.votes.viewer_vote {
        Vote::Up => ("[▲]", "▼"),
        Vote::Neutral => ("▲", "▼"),
        Vote::Down => ("▲", "[▼]"),
    };
    let edited = match body.is_edited {
        true => " (edited)",
        false => "",
    };
    let _ = writeln!(
        out,
        "{indent}{up} {} {down}  {} · {}{edited}  ({})",
        body.votes.count,
        body.author.username,
        age(body.created_at, now),
        view.id.0,
    );
    let text = match &body.mode {
        Mode::Editing { draft } => draft,
        Mode::Viewing | Mode::Replying { .. } => &body.content,
    };
    for line in text.lines() {
        let _ = writeln!(out, "{indent}  {line}");
    }
    if let Some(actions) = body.actions {
        let mut list = vec![match actions.reply {
            ReplyControl::Available => "reply",
            ReplyControl::LoginRequired => "reply (log in first)",
        }];
        if actions.can_edit {
            list.push("edit");
        }
        if actions.can_delete {
            list.push("delete");
        }
        let _ = writeln!(out, "{indent}  {}", list.join(" · "));
    }
}

#[cfg(test)]
mod tests {
    use agora_client::{
        api::{CommentId, CommentNode, User, UserId},
        render, RenderConfig, Session, Thread,
    };
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn ages() {
        let now = Utc::now();
        assert_eq!(age(now, now), "just now");
        assert_eq!(age(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(age(now - Duration::minutes(3), now), "3 minutes ago");
        assert_eq!(age(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(age(now - Duration::days(40), now), "1 month ago");
        assert_eq!(age(now - Duration::days(800), now), "2 years ago");
        // clock skew
        assert_eq!(age(now + Duration::minutes(3), now), "just now");
    }

    #[test]
    fn empty_thread() {
        let post = PostId(String::from("65f1a2b3c4d5e6f708190001"));
        let t = Thread::new(post.clone(), vec![], RenderConfig::default());
        let out = thread(&render(&t, &Session::anonymous()), &post, Utc::now());
        assert!(out.contains("Log in or sign up"));
        assert!(out.contains("No comments yet. Be the first to share what you think!"));
    }

    #[test]
    fn deep_thread() {
        let post = PostId(String::from("65f1a2b3c4d5e6f708190001"));
        let cid = |n: u32| CommentId(format!("65f1a2b3c4d5e6f7081a{n:04x}"));
        let author = User {
            id: UserId(String::from("65f1a2b3c4d5e6f7081900aa")),
            username: String::from("alice"),
            avatar: None,
        };
        let now = Utc::now();
        let mut tail: Option<CommentNode> = None;
        for i in (0..7).rev() {
            tail = Some(CommentNode {
                id: cid(100 + i),
                post_id: post.clone(),
                author: author.clone(),
                content: format!("level {i}"),
                created_at: now - Duration::minutes(3),
                edited_at: None,
                is_edited: i == 0,
                parent_id: (i > 0).then(|| cid(99 + i)),
                replies: tail.take().into_iter().collect(),
                vote_count: 2,
                user_vote: Vote::Up,
                is_deleted: false,
            });
        }
        let mut t = Thread::new(post.clone(), tail.into_iter().collect(), RenderConfig::default());
        let out = thread(&render(&t, &Session::signed_in(author.clone())), &post, now);
        assert!(out.contains("[▲] 2 ▼  alice · 3 minutes ago (edited)"));
        assert!(out.contains("reply · edit · delete"));
        assert!(out.contains(&format!("{INDENT}{INDENT}{INDENT}[▲] 2 ▼")));
        assert!(out.contains("Show 1 reply"));
        assert!(!out.contains("level 4"));

        for i in 103..106 {
            t.show_replies(cid(i)).unwrap();
        }
        let out = thread(&render(&t, &Session::anonymous()), &post, now);
        assert!(out.contains("level 5"));
        assert!(!out.contains("level 6"));
        assert!(out.contains(&format!(
            "Continue this thread → agora-ctl show {} --focus {}",
            post.0,
            cid(105).0
        )));
        assert!(out.contains("reply (log in first)"));
    }
}
