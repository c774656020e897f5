use async_trait::async_trait;

use crate::{
    CommentId, CommentNode, Credentials, EditComment, Error, NewComment, PostId, User, VoteRequest,
};

/// The comment endpoints of the backend. Every mutating call acts on behalf
/// of the session the implementation carries.
#[async_trait]
pub trait CommentApi {
    async fn fetch_comments(&self, post: PostId) -> Result<Vec<CommentNode>, Error>;
    async fn create_comment(&self, comment: &NewComment) -> Result<CommentNode, Error>;
    async fn edit_comment(&self, id: CommentId, edit: &EditComment) -> Result<(), Error>;
    async fn delete_comment(&self, id: CommentId) -> Result<(), Error>;
    async fn vote_comment(&self, id: CommentId, vote: VoteRequest) -> Result<(), Error>;
}

#[async_trait]
pub trait AuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<User, Error>;
    async fn logout(&self) -> Result<(), Error>;

    /// Returns `None` when no user is signed in
    async fn whoami(&self) -> Result<Option<User>, Error>;
}
