use std::{convert::Infallible, sync::Arc};

use agora_api::{
    CommentId, CommentNode, Credentials, EditComment, Error as ApiError, NewComment, PostId, User,
    VoteRequest,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{header, request},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{MockServer, SessionToken};

pub const SESSION_COOKIE: &str = "agora_session";

type AppState = Arc<Mutex<MockServer>>;

struct Error(ApiError);

impl From<ApiError> for Error {
    fn from(e: ApiError) -> Error {
        Error(e)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::info!("returning error to client: {}", self.0);
        (self.0.status_code(), self.0.contents()).into_response()
    }
}

/// The session cookie, if the request carries one
struct Session(Option<SessionToken>);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        req: &mut request::Parts,
        _state: &S,
    ) -> Result<Session, Infallible> {
        let token = req
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|h| h.split(';'))
            .filter_map(|c| c.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::try_parse(value).ok())
            .map(SessionToken);
        Ok(Session(token))
    }
}

pub fn router(server: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(whoami))
        .route("/comments", post(create_comment))
        .route("/comments/post/:post_id", get(fetch_comments))
        .route("/comments/:id", put(edit_comment).delete(delete_comment))
        .route("/comments/:id/vote", post(vote_comment))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn login(
    State(server): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse, Error> {
    let (tok, user) = server.lock().await.login(&creds)?;
    let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly", tok.0);
    Ok(([(header::SET_COOKIE, cookie)], Json(user)))
}

async fn logout(
    State(server): State<AppState>,
    Session(tok): Session,
) -> Result<impl IntoResponse, Error> {
    server.lock().await.logout(tok)?;
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    Ok(([(header::SET_COOKIE, cookie)], ()))
}

async fn whoami(
    State(server): State<AppState>,
    Session(tok): Session,
) -> Result<Json<User>, Error> {
    Ok(Json(server.lock().await.whoami(tok)?))
}

async fn fetch_comments(
    State(server): State<AppState>,
    Session(tok): Session,
    Path(post): Path<String>,
) -> Result<Json<Vec<CommentNode>>, Error> {
    Ok(Json(server.lock().await.fetch_comments(tok, PostId(post))?))
}

async fn create_comment(
    State(server): State<AppState>,
    Session(tok): Session,
    Json(new): Json<NewComment>,
) -> Result<Json<CommentNode>, Error> {
    Ok(Json(server.lock().await.create_comment(tok, &new)?))
}

async fn edit_comment(
    State(server): State<AppState>,
    Session(tok): Session,
    Path(id): Path<String>,
    Json(edit): Json<EditComment>,
) -> Result<(), Error> {
    Ok(server.lock().await.edit_comment(tok, CommentId(id), &edit)?)
}

async fn delete_comment(
    State(server): State<AppState>,
    Session(tok): Session,
    Path(id): Path<String>,
) -> Result<(), Error> {
    Ok(server.lock().await.delete_comment(tok, CommentId(id))?)
}

async fn vote_comment(
    State(server): State<AppState>,
    Session(tok): Session,
    Path(id): Path<String>,
    Json(vote): Json<VoteRequest>,
) -> Result<(), Error> {
    Ok(server.lock().await.vote_comment(tok, CommentId(id), vote)?)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    fn request(
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn body(res: Response) -> Vec<u8> {
        hyper::body::to_bytes(res.into_body()).await.unwrap().to_vec()
    }

    fn setup() -> (Router, PostId) {
        let mut server = MockServer::new();
        server
            .admin_create_user(String::from("alice"), String::from("hunter2"))
            .unwrap();
        let post = server.create_post();
        (router(Arc::new(Mutex::new(server))), post)
    }

    async fn login(app: &Router) -> String {
        let res = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/auth/login",
                None,
                json!({ "username": "alice", "password": "hunter2" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("agora_session="));
        String::from(cookie.split(';').next().unwrap())
    }

    #[tokio::test]
    async fn errors_carry_their_type() {
        let (app, post) = setup();
        let res = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/comments",
                None,
                json!({ "postId": post.0, "content": "hi", "parentId": null }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::parse(&body(res).await).unwrap(),
            ApiError::NotAuthenticated
        );

        let res = app
            .oneshot(request(
                Method::GET,
                "/auth/me",
                Some("agora_session=garbage"),
                json!(null),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn comment_lifecycle() {
        let (app, post) = setup();
        let cookie = login(&app).await;

        let res = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/comments",
                Some(&cookie),
                json!({ "postId": post.0, "content": "hi", "parentId": null }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let created: CommentNode = serde_json::from_slice(&body(res).await).unwrap();
        assert_eq!(created.content, "hi");
        assert_eq!(created.author.username, "alice");

        let id = created.id.0.clone();
        for (method, uri, payload) in [
            (Method::POST, format!("/comments/{id}/vote"), json!({ "vote": 1 })),
            (Method::PUT, format!("/comments/{id}"), json!({ "content": "hello" })),
        ] {
            let res = app
                .clone()
                .oneshot(request(method, &uri, Some(&cookie), payload))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/comments/post/{}", post.0),
                Some(&cookie),
                json!(null),
            ))
            .await
            .unwrap();
        let forest: serde_json::Value = serde_json::from_slice(&body(res).await).unwrap();
        assert_eq!(forest[0]["content"], "hello");
        assert_eq!(forest[0]["voteCount"], 1);
        assert_eq!(forest[0]["userVote"], 1);
        assert_eq!(forest[0]["isEdited"], true);

        let res = app
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/comments/{id}"),
                Some(&cookie),
                json!(null),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let res = app
            .oneshot(request(
                Method::POST,
                &format!("/comments/{id}/vote"),
                Some(&cookie),
                json!({ "vote": -1 }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::GONE);
    }
}
