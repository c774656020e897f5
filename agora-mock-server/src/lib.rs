use std::{
    collections::{BTreeMap, HashMap, HashSet},
    slice,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use agora_api::{
    AuthApi, CommentApi, CommentId, CommentNode, Credentials, EditComment, Error, NewComment,
    PostId, Time, User, UserId, Vote, VoteRequest,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

mod http;
pub use http::{router, SESSION_COOKIE};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SessionToken(pub Uuid);

/// An in-memory backend that enforces the same rules as the real one
#[derive(Debug, Default)]
pub struct MockServer {
    users: BTreeMap<UserId, DbUser>,
    sessions: HashMap<SessionToken, UserId>,
    posts: HashSet<PostId>,

    // chronological
    comments: Vec<DbComment>,
    votes: HashMap<(UserId, CommentId), Vote>,
}

#[derive(Debug)]
struct DbUser {
    user: User,
    pass: String,
}

#[derive(Debug)]
struct DbComment {
    id: CommentId,
    post: PostId,
    author: UserId,
    content: String,
    created_at: Time,
    edited_at: Option<Time>,
    parent: Option<CommentId>,
    vote_count: i64,
    deleted: bool,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    /// Return the current number of comments, deleted ones included
    pub fn test_num_comments(&self) -> usize {
        self.comments.len()
    }

    /// Return the content currently stored for comment `id`
    pub fn test_comment_content(&self, id: &CommentId) -> Option<&str> {
        self.comments
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.content.as_str())
    }

    pub fn admin_create_user(&mut self, name: String, password: String) -> Result<User, Error> {
        agora_api::validate_string(&name)?;
        agora_api::validate_string(&password)?;
        if self.users.values().any(|u| u.user.username == name) {
            return Err(Error::NameAlreadyUsed(name));
        }
        let user = User {
            id: UserId(Uuid::new_v4().to_string()),
            username: name,
            avatar: None,
        };
        self.users.insert(
            user.id.clone(),
            DbUser {
                user: user.clone(),
                pass: password,
            },
        );
        Ok(user)
    }

    pub fn create_post(&mut self) -> PostId {
        let post = PostId(Uuid::new_v4().to_string());
        self.posts.insert(post.clone());
        post
    }

    pub fn login(&mut self, creds: &Credentials) -> Result<(SessionToken, User), Error> {
        creds.validate()?;
        let u = self
            .users
            .values()
            .find(|u| u.user.username == creds.username)
            .ok_or(Error::PermissionDenied)?;
        // no hashing, this is only ever used with test passwords
        if u.pass != creds.password {
            return Err(Error::PermissionDenied);
        }
        let tok = SessionToken(Uuid::new_v4());
        self.sessions.insert(tok, u.user.id.clone());
        Ok((tok, u.user.clone()))
    }

    fn resolve(&self, tok: Option<SessionToken>) -> Result<UserId, Error> {
        tok.and_then(|t| self.sessions.get(&t))
            .cloned()
            .ok_or(Error::NotAuthenticated)
    }

    fn user(&self, id: &UserId) -> Result<&User, Error> {
        self.users
            .get(id)
            .map(|u| &u.user)
            .ok_or_else(|| Error::Unknown(format!("comment author {id:?} does not exist")))
    }

    pub fn logout(&mut self, tok: Option<SessionToken>) -> Result<(), Error> {
        self.resolve(tok)?;
        if let Some(tok) = tok {
            self.sessions.remove(&tok);
        }
        Ok(())
    }

    pub fn whoami(&self, tok: Option<SessionToken>) -> Result<User, Error> {
        let uid = self.resolve(tok)?;
        self.user(&uid).cloned()
    }

    /// Comment `id`, provided it can still be acted upon
    fn live_comment(&mut self, id: &CommentId) -> Result<&mut DbComment, Error> {
        let c = self
            .comments
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| Error::CommentNotFound(id.clone()))?;
        if c.deleted {
            return Err(Error::CommentDeleted(id.clone()));
        }
        Ok(c)
    }

    /// Top-level comments come newest first, replies in chronological order.
    /// An invalid session is treated as anonymous.
    pub fn fetch_comments(
        &self,
        tok: Option<SessionToken>,
        post: PostId,
    ) -> Result<Vec<CommentNode>, Error> {
        if !self.posts.contains(&post) {
            return Err(Error::PostNotFound(post));
        }
        let viewer = self.resolve(tok).ok();
        let mut children = HashMap::<Option<&CommentId>, Vec<&DbComment>>::new();
        for c in self.comments.iter().filter(|c| c.post == post) {
            children.entry(c.parent.as_ref()).or_default().push(c);
        }
        let replies_of = |id: Option<_>| {
            children
                .get(&id)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
        };

        // depth is unbounded, so the forest is assembled with an explicit stack
        let mut res = Vec::new();
        let mut roots = replies_of(None);
        let mut stack: Vec<(CommentNode, slice::Iter<'_, &DbComment>)> = Vec::new();
        loop {
            let next = match stack.last_mut() {
                Some((_, rest)) => rest.next(),
                None => match roots.next() {
                    Some(c) => Some(c),
                    None => break,
                },
            };
            match next {
                Some(c) => {
                    let node = self.node(c, viewer.as_ref())?;
                    stack.push((node, replies_of(Some(&c.id))));
                }
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
        res.reverse();
        Ok(res)
    }

    /// `c` as seen by `viewer`, without its replies
    fn node(&self, c: &DbComment, viewer: Option<&UserId>) -> Result<CommentNode, Error> {
        let user_vote = viewer
            .and_then(|v| self.votes.get(&(v.clone(), c.id.clone())))
            .copied()
            .unwrap_or_default();
        Ok(CommentNode {
            id: c.id.clone(),
            post_id: c.post.clone(),
            author: self.user(&c.author)?.clone(),
            content: match c.deleted {
                true => String::new(),
                false => c.content.clone(),
            },
            created_at: c.created_at,
            edited_at: c.edited_at,
            is_edited: c.edited_at.is_some(),
            parent_id: c.parent.clone(),
            replies: Vec::new(),
            vote_count: c.vote_count,
            user_vote,
            is_deleted: c.deleted,
        })
    }

    pub fn create_comment(
        &mut self,
        tok: Option<SessionToken>,
        new: &NewComment,
    ) -> Result<CommentNode, Error> {
        let uid = self.resolve(tok)?;
        new.validate()?;
        if !self.posts.contains(&new.post_id) {
            return Err(Error::PostNotFound(new.post_id.clone()));
        }
        if let Some(parent) = &new.parent_id {
            let p = self.live_comment(parent)?;
            if p.post != new.post_id {
                return Err(Error::CommentNotFound(parent.clone()));
            }
        }
        let c = DbComment {
            id: CommentId(Uuid::new_v4().to_string()),
            post: new.post_id.clone(),
            author: uid.clone(),
            content: new.content.clone(),
            created_at: Utc::now(),
            edited_at: None,
            parent: new.parent_id.clone(),
            vote_count: 0,
            deleted: false,
        };
        let node = self.node(&c, Some(&uid))?;
        tracing::debug!(comment = ?c.id, post = ?c.post, parent = ?c.parent, "created comment");
        self.comments.push(c);
        Ok(node)
    }

    fn authored_comment(
        &mut self,
        tok: Option<SessionToken>,
        id: &CommentId,
    ) -> Result<&mut DbComment, Error> {
        let uid = self.resolve(tok)?;
        let c = self.live_comment(id)?;
        if c.author != uid {
            return Err(Error::PermissionDenied);
        }
        Ok(c)
    }

    pub fn edit_comment(
        &mut self,
        tok: Option<SessionToken>,
        id: CommentId,
        edit: &EditComment,
    ) -> Result<(), Error> {
        edit.validate()?;
        let c = self.authored_comment(tok, &id)?;
        c.content = edit.content.clone();
        c.edited_at = Some(Utc::now());
        Ok(())
    }

    pub fn delete_comment(&mut self, tok: Option<SessionToken>, id: CommentId) -> Result<(), Error> {
        let c = self.authored_comment(tok, &id)?;
        c.deleted = true;
        c.content.clear();
        Ok(())
    }

    pub fn vote_comment(
        &mut self,
        tok: Option<SessionToken>,
        id: CommentId,
        vote: VoteRequest,
    ) -> Result<(), Error> {
        let key = (self.resolve(tok)?, id);
        let previous = self.votes.get(&key).copied().unwrap_or_default();
        let c = self.live_comment(&key.1)?;
        c.vote_count = c.vote_count.saturating_add(previous.delta_to(vote.vote));
        match vote.vote {
            Vote::Neutral => self.votes.remove(&key),
            v => self.votes.insert(key, v),
        };
        Ok(())
    }
}

/// Gives in-process access to a `MockServer`, as one browser would
#[derive(Debug)]
pub struct MockApi {
    server: Arc<Mutex<MockServer>>,
    session: Mutex<Option<SessionToken>>,
    offline: AtomicBool,
}

impl MockApi {
    pub fn new(server: Arc<Mutex<MockServer>>) -> MockApi {
        MockApi {
            server,
            session: Mutex::new(None),
            offline: AtomicBool::new(false),
        }
    }

    /// While offline, every call fails with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    async fn connect(&self) -> Result<Option<SessionToken>, Error> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(Error::Transport(String::from("mock server is offline")));
        }
        Ok(*self.session.lock().await)
    }
}

#[async_trait]
impl CommentApi for MockApi {
    async fn fetch_comments(&self, post: PostId) -> Result<Vec<CommentNode>, Error> {
        let tok = self.connect().await?;
        self.server.lock().await.fetch_comments(tok, post)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<CommentNode, Error> {
        let tok = self.connect().await?;
        self.server.lock().await.create_comment(tok, comment)
    }

    async fn edit_comment(&self, id: CommentId, edit: &EditComment) -> Result<(), Error> {
        let tok = self.connect().await?;
        self.server.lock().await.edit_comment(tok, id, edit)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error> {
        let tok = self.connect().await?;
        self.server.lock().await.delete_comment(tok, id)
    }

    async fn vote_comment(&self, id: CommentId, vote: VoteRequest) -> Result<(), Error> {
        let tok = self.connect().await?;
        self.server.lock().await.vote_comment(tok, id, vote)
    }
}

#[async_trait]
impl AuthApi for MockApi {
    async fn login(&self, credentials: &Credentials) -> Result<User, Error> {
        self.connect().await?;
        let (tok, user) = self.server.lock().await.login(credentials)?;
        *self.session.lock().await = Some(tok);
        Ok(user)
    }

    async fn logout(&self) -> Result<(), Error> {
        let tok = self.connect().await?;
        self.session.lock().await.take();
        self.server.lock().await.logout(tok)
    }

    async fn whoami(&self) -> Result<Option<User>, Error> {
        let tok = self.connect().await?;
        match self.server.lock().await.whoami(tok) {
            Ok(u) => Ok(Some(u)),
            Err(Error::NotAuthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
