use std::{io::Write, str::FromStr};

use agora_client::{
    api::{CommentId, Credentials, Direction, PostId},
    render, render_focus, ClientConfig, HttpApi, Session, Thread,
};
use anyhow::{anyhow, Context};
use chrono::Utc;

mod display;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base URL of the backend [env: AGORA_API_URL]
    #[structopt(short, long)]
    host: Option<String>,

    /// Log in as this user before running the command
    #[structopt(short, long, env = "AGORA_USER")]
    user: Option<String>,

    #[structopt(short, long, env = "AGORA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Comments shallower than this show their replies [env: AGORA_EXPAND_DEPTH, default: 3]
    #[structopt(long)]
    expand_depth: Option<usize>,

    /// Comments this deep link to their replies instead of nesting them
    /// [env: AGORA_MAX_DEPTH, default: 5]
    #[structopt(long)]
    max_depth: Option<usize>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the comments of a post
    Show {
        post: String,

        /// Only print the thread below this comment
        #[structopt(long)]
        focus: Option<String>,
    },

    /// Post a new top-level comment
    Comment { post: String, text: String },

    /// Reply to a comment
    Reply {
        post: String,
        parent: String,
        text: String,
    },

    /// Replace the content of one of your comments
    Edit {
        post: String,
        comment: String,
        text: String,
    },

    /// Delete one of your comments
    Delete {
        post: String,
        comment: String,

        /// Do not ask for confirmation
        #[structopt(long)]
        yes: bool,
    },

    /// Vote on a comment; voting the same way twice retracts the vote
    Vote {
        post: String,
        comment: String,
        direction: Arrow,
    },

    /// Print the user the backend knows us as
    Whoami,
}

struct Arrow(Direction);

impl FromStr for Arrow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Arrow> {
        match s {
            "up" => Ok(Arrow(Direction::Up)),
            "down" => Ok(Arrow(Direction::Down)),
            _ => Err(anyhow!("vote direction must be `up` or `down`, got {s:?}")),
        }
    }
}

fn confirm_delete(content: &str) -> anyhow::Result<bool> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{content}")?;
    write!(stdout, "Are you sure you want to delete this comment? [y/N] ")?;
    stdout.flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("reading confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Flags take precedence over the environment
fn client_config(opt: &Opt) -> anyhow::Result<ClientConfig> {
    ClientConfig::from_vars(|var| {
        let flag = match var {
            "AGORA_API_URL" => opt.host.clone(),
            "AGORA_EXPAND_DEPTH" => opt.expand_depth.map(|d| d.to_string()),
            "AGORA_MAX_DEPTH" => opt.max_depth.map(|d| d.to_string()),
            _ => None,
        };
        flag.or_else(|| std::env::var(var).ok())
    })
    .context("reading configuration; the backend URL is given with --host or AGORA_API_URL")
}

async fn open_session(api: &HttpApi, opt: &Opt) -> anyhow::Result<Session> {
    match (&opt.user, &opt.password) {
        (Some(username), Some(password)) => {
            let mut session = Session::anonymous();
            session
                .login(
                    api,
                    &Credentials {
                        username: username.clone(),
                        password: password.clone(),
                    },
                )
                .await
                .with_context(|| format!("logging in as {username}"))?;
            Ok(session)
        }
        (Some(_), None) => Err(anyhow!("--user requires --password")),
        _ => Ok(Session::restore(api).await),
    }
}

fn print_thread(thread: &Thread, session: &Session) {
    print!(
        "{}",
        display::thread(&render(thread, session), thread.post(), Utc::now())
    );
}

/// Silent errors are only logged, the others abort the command
fn check(res: Result<(), agora_client::Error>, what: &str) -> anyhow::Result<()> {
    match res {
        Ok(()) => Ok(()),
        Err(e) if e.is_silent() => {
            tracing::warn!(error = ?e, "{what} did not go through");
            Ok(())
        }
        Err(e) if e.needs_login() => Err(anyhow::Error::new(e)
            .context(format!("{what}: log in with --user and --password"))),
        Err(e) => Err(anyhow::Error::new(e).context(String::from(what))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let config = client_config(&opt)?;
    let api = HttpApi::new(&config)?;
    let session = open_session(&api, &opt).await?;

    let post = match &opt.cmd {
        Command::Whoami => {
            match session.viewer() {
                Some(u) => println!("{} ({})", u.username, u.id.0),
                None => println!("not signed in"),
            }
            return Ok(());
        }
        Command::Show { post, .. }
        | Command::Comment { post, .. }
        | Command::Reply { post, .. }
        | Command::Edit { post, .. }
        | Command::Delete { post, .. }
        | Command::Vote { post, .. } => PostId(post.clone()),
    };
    let mut thread = Thread::load(&api, post.clone(), config.render)
        .await
        .with_context(|| format!("loading comments of post {}", post.0))?;

    match opt.cmd {
        Command::Whoami | Command::Show { focus: None, .. } => (),
        Command::Show {
            focus: Some(id), ..
        } => {
            let id = CommentId(id);
            let view = render_focus(&thread, &session, &id)
                .with_context(|| format!("focusing comment {}", id.0))?;
            let mut out = String::new();
            display::comment(&mut out, &view, 0, &post, Utc::now());
            print!("{out}");
            return Ok(());
        }
        Command::Comment { text, .. } => {
            thread.set_composer_draft(text);
            let res = thread.submit_composer(&api, &session).await;
            check(res.map(|_| ()), "posting comment")?;
        }
        Command::Reply { parent, text, .. } => {
            let res = thread
                .submit_reply(&api, &session, Some(CommentId(parent)), &text)
                .await;
            check(res.map(|_| ()), "posting reply")?;
        }
        Command::Edit { comment, text, .. } => {
            let res = thread
                .edit_content(&api, &session, CommentId(comment), &text)
                .await;
            check(res, "editing comment")?;
        }
        Command::Delete { comment, yes, .. } => {
            let mut prompt_error = None;
            let res = thread
                .soft_delete(&api, &session, CommentId(comment), |c| {
                    yes || confirm_delete(c.content()).unwrap_or_else(|e| {
                        prompt_error = Some(e);
                        false
                    })
                })
                .await;
            if let Some(e) = prompt_error {
                return Err(e);
            }
            match res {
                Ok(false) => {
                    println!("Not deleted.");
                    return Ok(());
                }
                res => check(res.map(|_| ()), "deleting comment")?,
            }
        }
        Command::Vote {
            comment, direction, ..
        } => {
            let res = thread
                .cast_vote(&api, &session, CommentId(comment), direction.0)
                .await;
            check(res.map(|_| ()), "voting")?;
        }
    }

    print_thread(&thread, &session);
    Ok(())
}
