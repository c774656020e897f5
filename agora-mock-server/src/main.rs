use std::{net::SocketAddr, sync::Arc};

use agora_api::{CommentId, Credentials, NewComment, PostId, Vote, VoteRequest};
use agora_mock_server::{MockServer, SessionToken};
use anyhow::Context;
use tokio::sync::Mutex;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(short, long, default_value = "127.0.0.1:3001")]
    listen: SocketAddr,

    /// Password given to the demo users
    #[structopt(long, default_value = "demo")]
    password: String,
}

const DEMO_USERS: [&str; 3] = ["alice", "bob", "carol"];

fn say(
    s: &mut MockServer,
    tok: SessionToken,
    post: &PostId,
    parent: Option<&CommentId>,
    content: &str,
) -> anyhow::Result<CommentId> {
    let c = s
        .create_comment(
            Some(tok),
            &NewComment {
                post_id: post.clone(),
                content: String::from(content),
                parent_id: parent.cloned(),
            },
        )
        .with_context(|| format!("seeding comment {content:?}"))?;
    Ok(c.id)
}

/// Creates the demo users and one post with a discussion deep enough to be
/// folded and continued
fn seed(s: &mut MockServer, password: &str) -> anyhow::Result<PostId> {
    let mut toks = Vec::new();
    for name in DEMO_USERS {
        s.admin_create_user(String::from(name), String::from(password))
            .with_context(|| format!("creating demo user {name}"))?;
        let (tok, _) = s
            .login(&Credentials {
                username: String::from(name),
                password: String::from(password),
            })
            .with_context(|| format!("logging in demo user {name}"))?;
        toks.push(tok);
    }
    let (alice, bob, carol) = (toks[0], toks[1], toks[2]);

    let post = s.create_post();
    let root = say(s, alice, &post, None, "Has anyone tried the new release yet?")?;
    let mut parent = say(s, bob, &post, Some(&root), "Yes, upgrading went smoothly.")?;
    say(s, carol, &post, Some(&root), "Not yet, waiting for the changelog.")?;
    for (i, tok) in [alice, bob, carol, alice, bob, carol].into_iter().enumerate() {
        parent = say(s, tok, &post, Some(&parent), &format!("Follow-up number {}", i + 1))?;
    }
    let doomed = say(s, carol, &post, None, "This one will be deleted.")?;
    say(s, alice, &post, Some(&doomed), "Replies to deleted comments stay.")?;
    s.delete_comment(Some(carol), doomed)
        .context("deleting demo comment")?;
    say(s, bob, &post, None, "Latest comment, shown first.")?;

    s.vote_comment(Some(bob), root.clone(), VoteRequest { vote: Vote::Up })
        .context("seeding votes")?;
    s.vote_comment(Some(carol), root, VoteRequest { vote: Vote::Up })
        .context("seeding votes")?;
    for tok in toks {
        s.logout(Some(tok)).context("logging out demo user")?;
    }
    Ok(post)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let mut server = MockServer::new();
    let post = seed(&mut server, &opt.password)?;
    tracing::info!(post = %post.0, users = ?DEMO_USERS, "seeded demo data");

    let app = agora_mock_server::router(Arc::new(Mutex::new(server)));
    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}
