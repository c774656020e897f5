use crate::api::{self, CommentId};

/// The network operations a thread or session can run
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    Load,
    Login,
    Logout,
    Vote,
    Comment,
    Reply,
    Edit,
    Delete,
}

impl Operation {
    /// What to tell the user when the operation failed
    pub fn failure_notice(self) -> &'static str {
        match self {
            Operation::Load => "Failed to load comments. Please try again.",
            Operation::Login => "Failed to log in. Please check your credentials.",
            Operation::Logout => "Failed to log out.",
            Operation::Vote => "Failed to record your vote.",
            Operation::Comment => "Failed to post comment. Please try again.",
            Operation::Reply => "Failed to post reply. Please try again.",
            Operation::Edit => "Failed to edit comment. Please try again.",
            Operation::Delete => "Failed to delete comment. Please try again.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Log in or sign up to do that")]
    LoginRequired,

    #[error(transparent)]
    Invalid(api::Error),

    #[error("Comment {0:?} is not in this thread")]
    NotFound(CommentId),

    #[error("Comment {0:?} was deleted")]
    Deleted(CommentId),

    #[error("Only the author of comment {0:?} can do that")]
    NotAuthor(CommentId),

    #[error("A request for comment {0:?} is already in flight")]
    Busy(CommentId),

    #[error("A new comment is already being posted")]
    ComposerBusy,

    #[error("Comment {0:?} is not in a state that allows this")]
    ModeConflict(CommentId),

    #[error("The thread was reloaded before the request completed")]
    Discarded,

    #[error("{}", .op.failure_notice())]
    Request {
        op: Operation,
        #[source]
        source: api::Error,
    },
}

impl Error {
    /// Silent errors are only logged; the others should be shown to the user
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Error::Discarded
                | Error::Request {
                    op: Operation::Vote,
                    ..
                }
        )
    }

    /// Whether the front end should send the user to the login page
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Error::LoginRequired
                | Error::Request {
                    source: api::Error::NotAuthenticated,
                    ..
                }
        )
    }
}
