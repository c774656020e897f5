use chrono::Utc;

pub type Time = chrono::DateTime<Utc>;

mod backend;
pub use backend::{AuthApi, CommentApi};

mod comment;
pub use comment::{CommentId, CommentNode, EditComment, NewComment, PostId};

mod error;
pub use error::Error;

mod user;
pub use user::{Credentials, User, UserId};

mod vote;
pub use vote::{Direction, Vote, VoteRequest};

// The functions below are used to validate user-provided strings before they
// are sent to (or accepted by) the backend.

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

/// Comment bodies must contain something other than whitespace
pub fn validate_content(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    if s.trim().is_empty() {
        return Err(Error::EmptyContent);
    }
    Ok(())
}
