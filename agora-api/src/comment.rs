use crate::{Time, User, Vote};

/// Opaque id chosen by the backend
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub String);

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

/// One comment as returned by the backend, with its replies already nested
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(rename = "_id")]
    pub id: CommentId,
    pub post_id: PostId,
    pub author: User,
    pub content: String,
    pub created_at: Time,
    #[serde(default)]
    pub edited_at: Option<Time>,
    #[serde(default)]
    pub is_edited: bool,

    /// None for top-level comments
    #[serde(default)]
    pub parent_id: Option<CommentId>,

    /// Server-provided order, usually chronological
    #[serde(default)]
    pub replies: Vec<CommentNode>,

    #[serde(default)]
    pub vote_count: i64,

    /// Vote of the user the forest was fetched for
    #[serde(default)]
    pub user_vote: Vote,

    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: PostId,
    pub content: String,
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_content(&self.content)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EditComment {
    pub content: String,
}

impl EditComment {
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_content(&self.content)
    }
}
