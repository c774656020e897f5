use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};

use crate::{
    api::{
        self, AuthApi, CommentApi, CommentId, CommentNode, Credentials, EditComment, NewComment,
        PostId, User, VoteRequest,
    },
    ClientConfig,
};

/// Talks to the REST backend. The session lives in the client's cookie
/// store, so one `HttpApi` is one signed-in (or anonymous) browser.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> anyhow::Result<HttpApi> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("building http client")?;
        Ok(HttpApi {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn transport(e: reqwest::Error) -> api::Error {
    api::Error::Transport(e.to_string())
}

/// Turns non-2xx answers into the error they carry
async fn check(res: Result<Response, reqwest::Error>) -> Result<Response, api::Error> {
    let res = res.map_err(transport)?;
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.bytes().await.map_err(transport)?;
    Err(api::Error::parse(&body).unwrap_or_else(|e| {
        tracing::debug!(%status, error = ?e, "server answered with an unparseable error body");
        api::Error::Unknown(format!("server answered {status}"))
    }))
}

fn undecodable(e: serde_json::Error) -> api::Error {
    api::Error::Transport(format!("decoding response body: {e}"))
}

/// Comment forests nest without bound, so the recursion limit is lifted and
/// the stack grows on demand while decoding
async fn json<T: serde::de::DeserializeOwned>(res: Response) -> Result<T, api::Error> {
    let body = res.bytes().await.map_err(transport)?;
    let mut de = serde_json::Deserializer::from_slice(&body);
    de.disable_recursion_limit();
    let value = <T as serde::Deserialize>::deserialize(serde_stacker::Deserializer::new(&mut de))
        .map_err(undecodable)?;
    de.end().map_err(undecodable)?;
    Ok(value)
}

#[async_trait]
impl CommentApi for HttpApi {
    async fn fetch_comments(&self, post: PostId) -> Result<Vec<CommentNode>, api::Error> {
        let url = self.url(&format!("/comments/post/{}", post.0));
        json(check(self.client.get(url).send().await).await?).await
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<CommentNode, api::Error> {
        let req = self.client.post(self.url("/comments")).json(comment);
        json(check(req.send().await).await?).await
    }

    async fn edit_comment(&self, id: CommentId, edit: &EditComment) -> Result<(), api::Error> {
        let url = self.url(&format!("/comments/{}", id.0));
        check(self.client.put(url).json(edit).send().await).await?;
        Ok(())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), api::Error> {
        let url = self.url(&format!("/comments/{}", id.0));
        check(self.client.delete(url).send().await).await?;
        Ok(())
    }

    async fn vote_comment(&self, id: CommentId, vote: VoteRequest) -> Result<(), api::Error> {
        let url = self.url(&format!("/comments/{}/vote", id.0));
        check(self.client.post(url).json(&vote).send().await).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<User, api::Error> {
        let req = self.client.post(self.url("/auth/login")).json(credentials);
        json(check(req.send().await).await?).await
    }

    async fn logout(&self) -> Result<(), api::Error> {
        let req = self.client.post(self.url("/auth/logout"));
        check(req.send().await).await?;
        Ok(())
    }

    async fn whoami(&self) -> Result<Option<User>, api::Error> {
        let res = self
            .client
            .get(self.url("/auth/me"))
            .send()
            .await
            .map_err(transport)?;
        if res.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        json(check(Ok(res)).await?).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use agora_mock_server::MockServer;
    use tokio::sync::Mutex;

    use super::*;
    use crate::{api::Direction, RenderConfig, Session, Thread};

    fn login(server: &mut MockServer, name: &str) -> agora_mock_server::SessionToken {
        server
            .login(&Credentials {
                username: String::from(name),
                password: String::from("hunter2"),
            })
            .unwrap()
            .0
    }

    async fn serve(server: MockServer) -> ClientConfig {
        let app = agora_mock_server::router(Arc::new(Mutex::new(server)));
        let listener = std::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .expect("binding test listener");
        let addr = listener.local_addr().expect("retrieving test listener address");
        let server = axum::Server::from_tcp(listener)
            .expect("building test server")
            .serve(app.into_make_service());
        tokio::spawn(server);
        ClientConfig::new(format!("http://{addr}/"))
    }

    fn creds(password: &str) -> Credentials {
        Credentials {
            username: String::from("alice"),
            password: String::from(password),
        }
    }

    #[tokio::test]
    async fn full_session() {
        let mut server = MockServer::new();
        let alice = server
            .admin_create_user(String::from("alice"), String::from("hunter2"))
            .unwrap();
        let post = server.create_post();
        let api = HttpApi::new(&serve(server).await).unwrap();

        assert_eq!(api.whoami().await, Ok(None));
        assert_eq!(
            api.create_comment(&NewComment {
                post_id: post.clone(),
                content: String::from("hi"),
                parent_id: None,
            })
            .await,
            Err(api::Error::NotAuthenticated)
        );
        assert_eq!(api.login(&creds("wrong")).await, Err(api::Error::PermissionDenied));

        let mut session = Session::restore(&api).await;
        session.login(&api, &creds("hunter2")).await.unwrap();
        assert_eq!(api.whoami().await, Ok(Some(alice.clone())));

        let mut t = Thread::load(&api, post.clone(), RenderConfig::default())
            .await
            .unwrap();
        let top = t.submit_reply(&api, &session, None, "hello").await.unwrap();
        let reply = t
            .submit_reply(&api, &session, Some(top.clone()), "hello to you")
            .await
            .unwrap();
        t.cast_vote(&api, &session, reply.clone(), Direction::Down)
            .await
            .unwrap();
        t.edit_content(&api, &session, top.clone(), "hello, world")
            .await
            .unwrap();

        let fresh = Thread::load(&api, post, RenderConfig::default())
            .await
            .unwrap();
        assert_eq!(fresh.get(&top).unwrap().content(), "hello, world");
        assert!(fresh.get(&top).unwrap().is_edited());
        assert_eq!(fresh.get(&reply).unwrap().vote_count(), -1);
        assert_eq!(fresh.get(&reply).unwrap().author(), &alice);

        session.logout(&api).await.unwrap();
        assert_eq!(api.whoami().await, Ok(None));
    }

    #[tokio::test]
    async fn errors_are_decoded() {
        let mut server = MockServer::new();
        server
            .admin_create_user(String::from("alice"), String::from("hunter2"))
            .unwrap();
        let post = server.create_post();
        let api = HttpApi::new(&serve(server).await).unwrap();
        api.login(&creds("hunter2")).await.unwrap();

        let missing = CommentId(String::from("65f1a2b3c4d5e6f708192a3b"));
        assert_eq!(
            api.delete_comment(missing.clone()).await,
            Err(api::Error::CommentNotFound(missing))
        );
        let missing_post = PostId(String::from("no-such-post"));
        assert_eq!(
            api.fetch_comments(missing_post.clone()).await,
            Err(api::Error::PostNotFound(missing_post))
        );
        assert_eq!(
            api.create_comment(&NewComment {
                post_id: post,
                content: String::from("  "),
                parent_id: None,
            })
            .await,
            Err(api::Error::EmptyContent)
        );
    }

    #[tokio::test]
    async fn unreachable_backend() {
        // nothing listens on the discard port
        let api = HttpApi::new(&ClientConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(matches!(
            api.fetch_comments(PostId(String::from("42"))).await,
            Err(api::Error::Transport(_))
        ));
        assert!(!Session::restore(&api).await.is_signed_in());
    }

    #[tokio::test]
    async fn deep_threads_load() {
        const DEPTH: usize = 300;

        let mut server = MockServer::new();
        server
            .admin_create_user(String::from("alice"), String::from("hunter2"))
            .unwrap();
        let post = server.create_post();
        let tok = login(&mut server, "alice");
        let mut chain = Vec::with_capacity(DEPTH);
        for i in 0..DEPTH {
            let c = server
                .create_comment(
                    Some(tok),
                    &NewComment {
                        post_id: post.clone(),
                        content: format!("level {i}"),
                        parent_id: chain.last().cloned(),
                    },
                )
                .unwrap();
            chain.push(c.id);
        }
        let api = HttpApi::new(&serve(server).await).unwrap();

        let t = Thread::load(&api, post, RenderConfig::default())
            .await
            .unwrap();
        assert_eq!(t.len(), DEPTH);
        assert_eq!(t.comments().len(), 1);
        let deepest = &chain[DEPTH - 1];
        assert_eq!(t.depth_of(deepest), Some(DEPTH - 1));
        assert_eq!(
            t.get(deepest).unwrap().content(),
            format!("level {}", DEPTH - 1)
        );
        assert_eq!(t.get(deepest).unwrap().parent_id(), Some(&chain[DEPTH - 2]));
    }
}
