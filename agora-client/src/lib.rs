mod comment;
pub use comment::{Comment, Fold, Mode, Status};

mod config;
pub use config::{ClientConfig, RenderConfig};

mod error;
pub use error::{Error, Operation};

mod http;
pub use http::HttpApi;

pub mod render;
pub use render::{render, render_focus};

mod session;
pub use session::Session;

mod thread;
pub use thread::{DeleteTicket, EditTicket, ReplyTicket, Thread, VoteTicket};

pub mod api {
    pub use agora_api::*;
}
