use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{CommentId, PostId};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Name already used {0}")]
    NameAlreadyUsed(String),

    #[error("Post not found {0:?}")]
    PostNotFound(PostId),

    #[error("Comment not found {0:?}")]
    CommentNotFound(CommentId),

    #[error("Comment was deleted {0:?}")]
    CommentDeleted(CommentId),

    #[error("Comment content is empty")]
    EmptyContent,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Invalid vote value {0}")]
    InvalidVote(i64),

    /// The request did not reach the server, or its answer did not reach us
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::NameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentDeleted(_) => StatusCode::GONE,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::InvalidVote(_) => StatusCode::BAD_REQUEST,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotAuthenticated => json!({
                "message": "not authenticated",
                "type": "not-authenticated",
            }),
            Error::NameAlreadyUsed(n) => json!({
                "message": "name already used",
                "type": "conflict-name",
                "name": n,
            }),
            Error::PostNotFound(p) => json!({
                "message": "post not found",
                "type": "post-not-found",
                "id": p.0,
            }),
            Error::CommentNotFound(c) => json!({
                "message": "comment not found",
                "type": "comment-not-found",
                "id": c.0,
            }),
            Error::CommentDeleted(c) => json!({
                "message": "comment was deleted",
                "type": "comment-deleted",
                "id": c.0,
            }),
            Error::EmptyContent => json!({
                "message": "comment content is empty",
                "type": "empty-content",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::InvalidVote(v) => json!({
                "message": "vote must be -1, 0 or 1",
                "type": "invalid-vote",
                "value": v,
            }),
            Error::Transport(msg) => json!({
                "message": msg,
                "type": "transport",
            }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let id = || {
            data.get("id")
                .and_then(|id| id.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error is about a post or comment without a proper id"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "not-authenticated" => Error::NotAuthenticated,
                "conflict-name" => Error::NameAlreadyUsed(String::from(
                    data.get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| anyhow!("error is a name conflict without a name"))?,
                )),
                "post-not-found" => Error::PostNotFound(PostId(id()?)),
                "comment-not-found" => Error::CommentNotFound(CommentId(id()?)),
                "comment-deleted" => Error::CommentDeleted(CommentId(id()?)),
                "empty-content" => Error::EmptyContent,
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "invalid-vote" => Error::InvalidVote(
                    data.get("value")
                        .and_then(|v| v.as_i64())
                        .ok_or_else(|| anyhow!("error is an invalid vote without a value"))?,
                ),
                "transport" => Error::Transport(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_back_what_it_sends() {
        let comment = CommentId(String::from("65f1a2b3c4d5e6f708192a3b"));
        for err in [
            Error::Unknown(String::from("boom")),
            Error::PermissionDenied,
            Error::NotAuthenticated,
            Error::NameAlreadyUsed(String::from("alice")),
            Error::PostNotFound(PostId(String::from("42"))),
            Error::CommentNotFound(comment.clone()),
            Error::CommentDeleted(comment),
            Error::EmptyContent,
            Error::NullByteInString(String::from("a\0")),
            Error::InvalidVote(3),
            Error::Transport(String::from("connection reset")),
        ] {
            assert_eq!(Error::parse(&err.contents()).unwrap(), err);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(Error::parse(b"<html>502</html>").is_err());
        assert!(Error::parse(br#"{"type":"no-such-error"}"#).is_err());
        assert!(Error::parse(br#"{"type":"comment-deleted"}"#).is_err());
        assert!(Error::parse(br#"{"type":"comment-deleted","id":12}"#).is_err());
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::NotAuthenticated.status_code(), 401);
        assert_eq!(
            Error::CommentDeleted(CommentId(String::from("c1"))).status_code(),
            http::StatusCode::GONE
        );
    }
}
