use chrono::Utc;

use crate::{
    api::{
        self, CommentApi, CommentId, CommentNode, Direction, EditComment, NewComment, PostId, Vote,
        VoteRequest,
    },
    comment::{self, Comment, Fold, Mode, Status},
    Error, Operation, RenderConfig, Session,
};

/// Returned by `Thread::begin_vote`, to be handed back to `Thread::finish_vote`
#[derive(Debug)]
#[must_use = "tickets must be passed back to the thread once the request completed"]
pub struct VoteTicket {
    generation: u64,
    id: CommentId,
    next: Vote,
}

impl VoteTicket {
    pub fn id(&self) -> &CommentId {
        &self.id
    }

    pub fn request(&self) -> VoteRequest {
        VoteRequest { vote: self.next }
    }
}

#[derive(Debug)]
#[must_use = "tickets must be passed back to the thread once the request completed"]
pub struct ReplyTicket {
    generation: u64,
    request: NewComment,
}

impl ReplyTicket {
    pub fn request(&self) -> &NewComment {
        &self.request
    }
}

#[derive(Debug)]
#[must_use = "tickets must be passed back to the thread once the request completed"]
pub struct EditTicket {
    generation: u64,
    id: CommentId,
    request: EditComment,
}

impl EditTicket {
    pub fn id(&self) -> &CommentId {
        &self.id
    }

    pub fn request(&self) -> &EditComment {
        &self.request
    }
}

#[derive(Debug)]
#[must_use = "tickets must be passed back to the thread once the request completed"]
pub struct DeleteTicket {
    generation: u64,
    id: CommentId,
}

impl DeleteTicket {
    pub fn id(&self) -> &CommentId {
        &self.id
    }
}

/// The comment forest of one post, as currently shown to the viewer.
///
/// Every mutation goes through a `begin_*` call, which checks the
/// preconditions and marks the comment as busy, and a `finish_*` call, which
/// applies the backend's answer. Nothing changes locally before the backend
/// acknowledged the request, and a failed request leaves the tree untouched.
/// The async helpers (`cast_vote`, `submit_reply`, ...) chain both around the
/// `CommentApi` call.
#[derive(Clone, Debug)]
pub struct Thread {
    post: PostId,
    comments: Vec<Comment>,
    config: RenderConfig,

    // bumped on every wholesale reload, so that late answers get dropped
    generation: u64,

    composer_draft: String,
    composer_pending: bool,
}

impl Thread {
    pub fn new(post: PostId, forest: Vec<CommentNode>, config: RenderConfig) -> Thread {
        Thread {
            post,
            comments: comment::build(forest, None),
            config,
            generation: 0,
            composer_draft: String::new(),
            composer_pending: false,
        }
    }

    pub async fn load<A: CommentApi + ?Sized>(
        api: &A,
        post: PostId,
        config: RenderConfig,
    ) -> Result<Thread, Error> {
        let forest = fetch(api, post.clone()).await?;
        tracing::debug!(?post, num_top_level = forest.len(), "loaded thread");
        Ok(Thread::new(post, forest, config))
    }

    /// Drops the local tree (including fold and edit state) for `forest`
    pub fn replace_all(&mut self, forest: Vec<CommentNode>) {
        self.comments = comment::build(forest, None);
        self.generation += 1;
        self.composer_pending = false;
        tracing::debug!(post = ?self.post, generation = self.generation, "thread reloaded");
    }

    pub async fn refresh<A: CommentApi + ?Sized>(&mut self, api: &A) -> Result<(), Error> {
        let forest = fetch(api, self.post.clone()).await?;
        self.replace_all(forest);
        Ok(())
    }

    pub fn post(&self) -> &PostId {
        &self.post
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Top-level comments, in display order
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        comment::find(&self.comments, id).map(|(_, c)| c)
    }

    pub fn depth_of(&self, id: &CommentId) -> Option<usize> {
        comment::find(&self.comments, id).map(|(d, _)| d)
    }

    /// Total number of comments, at any depth
    pub fn len(&self) -> usize {
        self.comments.iter().map(|c| c.subtree_len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn composer_draft(&self) -> &str {
        &self.composer_draft
    }

    pub fn is_composer_pending(&self) -> bool {
        self.composer_pending
    }

    fn get_mut(&mut self, id: &CommentId) -> Result<&mut Comment, Error> {
        comment::find_mut(&mut self.comments, id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Comment `id`, provided it can accept a new request
    fn ready_mut(&mut self, id: &CommentId) -> Result<&mut Comment, Error> {
        let c = self.get_mut(id)?;
        if c.status == Status::Deleted {
            return Err(Error::Deleted(id.clone()));
        }
        if c.pending.is_some() {
            return Err(Error::Busy(id.clone()));
        }
        Ok(c)
    }

    fn check_generation(&self, generation: u64) -> Result<(), Error> {
        if generation != self.generation {
            tracing::debug!(
                ticket = generation,
                current = self.generation,
                "dropping answer to a request sent before the thread was reloaded"
            );
            return Err(Error::Discarded);
        }
        Ok(())
    }

    fn ticket_target(&mut self, generation: u64, id: &CommentId) -> Result<&mut Comment, Error> {
        self.check_generation(generation)?;
        comment::find_mut(&mut self.comments, id).ok_or(Error::Discarded)
    }
}

async fn fetch<A: CommentApi + ?Sized>(api: &A, post: PostId) -> Result<Vec<CommentNode>, Error> {
    api.fetch_comments(post.clone()).await.map_err(|source| {
        tracing::error!(?post, error = %source, "failed to fetch comments");
        Error::Request {
            op: Operation::Load,
            source,
        }
    })
}

// Votes

impl Thread {
    pub fn begin_vote(
        &mut self,
        session: &Session,
        id: CommentId,
        direction: Direction,
    ) -> Result<VoteTicket, Error> {
        session.require_viewer()?;
        let generation = self.generation;
        let c = self.ready_mut(&id)?;
        let next = c.user_vote.toggle(direction);
        c.pending = Some(Operation::Vote);
        tracing::debug!(comment = ?id, previous = ?c.user_vote, ?next, "submitting vote");
        Ok(VoteTicket {
            generation,
            id,
            next,
        })
    }

    /// Returns the viewer's vote once recorded
    pub fn finish_vote(
        &mut self,
        ticket: VoteTicket,
        res: Result<(), api::Error>,
    ) -> Result<Vote, Error> {
        let c = self.ticket_target(ticket.generation, &ticket.id)?;
        c.pending = None;
        match res {
            Ok(()) => {
                c.vote_count = c
                    .vote_count
                    .saturating_add(c.user_vote.delta_to(ticket.next));
                c.user_vote = ticket.next;
                Ok(ticket.next)
            }
            Err(source) => {
                tracing::warn!(comment = ?ticket.id, error = %source, "vote was not recorded");
                Err(Error::Request {
                    op: Operation::Vote,
                    source,
                })
            }
        }
    }

    pub async fn cast_vote<A: CommentApi + ?Sized>(
        &mut self,
        api: &A,
        session: &Session,
        id: CommentId,
        direction: Direction,
    ) -> Result<Vote, Error> {
        let ticket = self.begin_vote(session, id, direction)?;
        let res = api.vote_comment(ticket.id.clone(), ticket.request()).await;
        self.finish_vote(ticket, res)
    }
}

// Replies and top-level comments

impl Thread {
    pub fn begin_reply(
        &mut self,
        session: &Session,
        parent: Option<CommentId>,
        content: &str,
    ) -> Result<ReplyTicket, Error> {
        session.require_viewer()?;
        api::validate_content(content).map_err(Error::Invalid)?;
        let generation = self.generation;
        match &parent {
            Some(id) => self.ready_mut(id)?.pending = Some(Operation::Reply),
            None if self.composer_pending => return Err(Error::ComposerBusy),
            None => self.composer_pending = true,
        }
        Ok(ReplyTicket {
            generation,
            request: NewComment {
                post_id: self.post.clone(),
                content: String::from(content),
                parent_id: parent,
            },
        })
    }

    /// Inserts the comment the backend created, returning its id
    pub fn finish_reply(
        &mut self,
        ticket: ReplyTicket,
        res: Result<CommentNode, api::Error>,
    ) -> Result<CommentId, Error> {
        self.check_generation(ticket.generation)?;
        let parent = ticket.request.parent_id;
        let op = match parent {
            Some(_) => Operation::Reply,
            None => Operation::Comment,
        };
        match &parent {
            Some(p) => self.get_mut(p).map_err(|_| Error::Discarded)?.pending = None,
            None => self.composer_pending = false,
        }
        let node = match res {
            Ok(node) => node,
            Err(source) => {
                tracing::error!(?parent, error = %source, "failed to post comment");
                return Err(Error::Request { op, source });
            }
        };

        let id = node.id.clone();
        let mut new = comment::build(vec![node], parent.clone());
        match &parent {
            Some(p) => {
                let p = self.get_mut(p).map_err(|_| Error::Discarded)?;
                p.replies.append(&mut new);
                p.fold = Some(Fold::Expanded);
                if matches!(p.mode, Mode::Replying { .. }) {
                    p.mode = Mode::Viewing;
                }
            }
            None => {
                new.append(&mut self.comments);
                self.comments = new;
            }
        }
        tracing::debug!(comment = ?id, ?parent, "comment added");
        Ok(id)
    }

    pub async fn submit_reply<A: CommentApi + ?Sized>(
        &mut self,
        api: &A,
        session: &Session,
        parent: Option<CommentId>,
        content: &str,
    ) -> Result<CommentId, Error> {
        let ticket = self.begin_reply(session, parent, content)?;
        let res = api.create_comment(&ticket.request).await;
        self.finish_reply(ticket, res)
    }

    pub fn set_composer_draft(&mut self, text: impl Into<String>) {
        self.composer_draft = text.into();
    }

    /// Posts the composer's draft as a new top-level comment
    pub async fn submit_composer<A: CommentApi + ?Sized>(
        &mut self,
        api: &A,
        session: &Session,
    ) -> Result<CommentId, Error> {
        let draft = self.composer_draft.clone();
        let id = self.submit_reply(api, session, None, &draft).await?;
        self.composer_draft.clear();
        Ok(id)
    }
}

// Edits

impl Thread {
    pub fn begin_edit(
        &mut self,
        session: &Session,
        id: CommentId,
        content: &str,
    ) -> Result<EditTicket, Error> {
        session.require_viewer()?;
        api::validate_content(content).map_err(Error::Invalid)?;
        let generation = self.generation;
        let c = self.ready_mut(&id)?;
        if !session.is_author(&c.author) {
            return Err(Error::NotAuthor(id));
        }
        c.pending = Some(Operation::Edit);
        Ok(EditTicket {
            generation,
            id,
            request: EditComment {
                content: String::from(content),
            },
        })
    }

    pub fn finish_edit(&mut self, ticket: EditTicket, res: Result<(), api::Error>) -> Result<(), Error> {
        let c = self.ticket_target(ticket.generation, &ticket.id)?;
        c.pending = None;
        match res {
            Ok(()) => {
                c.content = ticket.request.content;
                c.is_edited = true;
                c.edited_at = Some(Utc::now());
                if matches!(c.mode, Mode::Editing { .. }) {
                    c.mode = Mode::Viewing;
                }
                tracing::debug!(comment = ?ticket.id, "comment edited");
                Ok(())
            }
            Err(source) => {
                tracing::error!(comment = ?ticket.id, error = %source, "failed to edit comment");
                Err(Error::Request {
                    op: Operation::Edit,
                    source,
                })
            }
        }
    }

    pub async fn edit_content<A: CommentApi + ?Sized>(
        &mut self,
        api: &A,
        session: &Session,
        id: CommentId,
        content: &str,
    ) -> Result<(), Error> {
        let ticket = self.begin_edit(session, id, content)?;
        let res = api.edit_comment(ticket.id.clone(), &ticket.request).await;
        self.finish_edit(ticket, res)
    }
}

// Deletion

impl Thread {
    /// `confirm` is asked right before the request would be sent; returns
    /// `None` if it declined
    pub fn begin_delete<F>(
        &mut self,
        session: &Session,
        id: CommentId,
        confirm: F,
    ) -> Result<Option<DeleteTicket>, Error>
    where
        F: FnOnce(&Comment) -> bool,
    {
        session.require_viewer()?;
        let generation = self.generation;
        let c = self.ready_mut(&id)?;
        if !session.is_author(&c.author) {
            return Err(Error::NotAuthor(id));
        }
        if !confirm(c) {
            tracing::debug!(comment = ?id, "deletion not confirmed");
            return Ok(None);
        }
        c.pending = Some(Operation::Delete);
        Ok(Some(DeleteTicket { generation, id }))
    }

    pub fn finish_delete(
        &mut self,
        ticket: DeleteTicket,
        res: Result<(), api::Error>,
    ) -> Result<(), Error> {
        let c = self.ticket_target(ticket.generation, &ticket.id)?;
        c.pending = None;
        match res {
            Ok(()) => {
                c.status = Status::Deleted;
                c.mode = Mode::Viewing;
                tracing::debug!(comment = ?ticket.id, "comment deleted");
                Ok(())
            }
            Err(source) => {
                tracing::error!(comment = ?ticket.id, error = %source, "failed to delete comment");
                Err(Error::Request {
                    op: Operation::Delete,
                    source,
                })
            }
        }
    }

    /// Returns whether the comment was deleted
    pub async fn soft_delete<A, F>(
        &mut self,
        api: &A,
        session: &Session,
        id: CommentId,
        confirm: F,
    ) -> Result<bool, Error>
    where
        A: CommentApi + ?Sized,
        F: FnOnce(&Comment) -> bool,
    {
        let ticket = match self.begin_delete(session, id, confirm)? {
            Some(t) => t,
            None => return Ok(false),
        };
        let res = api.delete_comment(ticket.id.clone()).await;
        self.finish_delete(ticket, res)?;
        Ok(true)
    }
}

// Purely local state: folding and the edit / reply boxes

impl Thread {
    pub fn show_replies(&mut self, id: CommentId) -> Result<(), Error> {
        self.get_mut(&id)?.fold = Some(Fold::Expanded);
        Ok(())
    }

    pub fn hide_replies(&mut self, id: CommentId) -> Result<(), Error> {
        self.get_mut(&id)?.fold = Some(Fold::Collapsed);
        Ok(())
    }

    pub fn toggle_replies(&mut self, id: CommentId) -> Result<Fold, Error> {
        let expand_depth = self.config.expand_depth;
        let depth = self
            .depth_of(&id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        let c = self.get_mut(&id)?;
        let next = match c.fold(depth, expand_depth) {
            Fold::Expanded => Fold::Collapsed,
            Fold::Collapsed => Fold::Expanded,
        };
        c.fold = Some(next);
        Ok(next)
    }

    /// Opens the reply box of `id`, or closes it (dropping the draft) if it
    /// was already open
    pub fn toggle_reply_box(&mut self, session: &Session, id: CommentId) -> Result<(), Error> {
        session.require_viewer()?;
        let c = self.get_mut(&id)?;
        if c.status == Status::Deleted {
            return Err(Error::Deleted(id));
        }
        c.mode = match c.mode {
            Mode::Viewing => Mode::Replying {
                draft: String::new(),
            },
            Mode::Replying { .. } => Mode::Viewing,
            Mode::Editing { .. } => return Err(Error::ModeConflict(id)),
        };
        Ok(())
    }

    pub fn start_editing(&mut self, session: &Session, id: CommentId) -> Result<(), Error> {
        session.require_viewer()?;
        let c = self.get_mut(&id)?;
        if c.status == Status::Deleted {
            return Err(Error::Deleted(id));
        }
        if !session.is_author(&c.author) {
            return Err(Error::NotAuthor(id));
        }
        match c.mode {
            Mode::Viewing => {
                c.mode = Mode::Editing {
                    draft: c.content.clone(),
                }
            }
            Mode::Editing { .. } => (),
            Mode::Replying { .. } => return Err(Error::ModeConflict(id)),
        }
        Ok(())
    }

    pub fn update_draft(&mut self, id: CommentId, text: impl Into<String>) -> Result<(), Error> {
        let c = self.get_mut(&id)?;
        match &mut c.mode {
            Mode::Editing { draft } | Mode::Replying { draft } => *draft = text.into(),
            Mode::Viewing => return Err(Error::ModeConflict(id)),
        }
        Ok(())
    }

    /// Closes the edit or reply box of `id`, dropping its draft
    pub fn cancel(&mut self, id: CommentId) -> Result<(), Error> {
        self.get_mut(&id)?.mode = Mode::Viewing;
        Ok(())
    }

    /// Submits whichever of the edit or reply box of `id` is open
    pub async fn submit_draft<A: CommentApi + ?Sized>(
        &mut self,
        api: &A,
        session: &Session,
        id: CommentId,
    ) -> Result<(), Error> {
        let mode = self.get_mut(&id)?.mode.clone();
        match mode {
            Mode::Editing { draft } => self.edit_content(api, session, id, &draft).await,
            Mode::Replying { draft } => self
                .submit_reply(api, session, Some(id), &draft)
                .await
                .map(|_| ()),
            Mode::Viewing => Err(Error::ModeConflict(id)),
        }
    }
}
