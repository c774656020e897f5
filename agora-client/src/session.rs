use crate::{
    api::{AuthApi, Credentials, User},
    Error, Operation,
};

/// Who is looking at the thread. Created at startup, refreshed on login and
/// logout, and handed to every operation that depends on the viewer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Session {
    viewer: Option<User>,
}

impl Session {
    pub fn anonymous() -> Session {
        Session { viewer: None }
    }

    pub fn signed_in(user: User) -> Session {
        Session { viewer: Some(user) }
    }

    /// Asks the backend who the current credentials belong to. Any failure
    /// leaves the session anonymous.
    pub async fn restore<A: AuthApi + ?Sized>(api: &A) -> Session {
        match api.whoami().await {
            Ok(viewer) => Session { viewer },
            Err(e) => {
                tracing::debug!(error = %e, "could not restore session, continuing anonymously");
                Session::anonymous()
            }
        }
    }

    pub fn viewer(&self) -> Option<&User> {
        self.viewer.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.viewer.is_some()
    }

    pub fn require_viewer(&self) -> Result<&User, Error> {
        self.viewer.as_ref().ok_or(Error::LoginRequired)
    }

    pub fn is_author(&self, author: &User) -> bool {
        matches!(&self.viewer, Some(v) if v.id == author.id)
    }

    pub async fn login<A: AuthApi + ?Sized>(
        &mut self,
        api: &A,
        credentials: &Credentials,
    ) -> Result<&User, Error> {
        credentials.validate().map_err(Error::Invalid)?;
        let user = api.login(credentials).await.map_err(|source| {
            tracing::info!(username = %credentials.username, error = %source, "login failed");
            Error::Request {
                op: Operation::Login,
                source,
            }
        })?;
        tracing::debug!(username = %user.username, "logged in");
        let user: &User = self.viewer.insert(user);
        Ok(user)
    }

    /// The local session is torn down even if the backend could not be told
    pub async fn logout<A: AuthApi + ?Sized>(&mut self, api: &A) -> Result<(), Error> {
        let viewer = self.viewer.take();
        match api.logout().await {
            Ok(()) => Ok(()),
            Err(source) => {
                tracing::warn!(?viewer, error = %source, "failed to log out from backend");
                Err(Error::Request {
                    op: Operation::Logout,
                    source,
                })
            }
        }
    }
}
