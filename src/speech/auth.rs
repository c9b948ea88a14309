use std::sync::Mutex;

use async_trait::async_trait;

use super::types::UserProfile;
use crate::error::{ReaderError, Result};

/// Source of the current reader's identity.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_current_user(&self) -> Result<UserProfile>;

    /// Send the reader through the login flow. Called when the synthesis
    /// service or the sentence service rejects the session.
    fn redirect_to_login(&self);

    /// Login URL the reader has been sent to, if any.
    fn pending_login(&self) -> Option<String> {
        None
    }
}

/// Builds the login URL and remembers that a login was requested, so the
/// terminal front-end can stop and show it.
#[derive(Debug)]
pub struct LoginRedirect {
    server_url: String,
    session_key: Option<String>,
    requested: Mutex<Option<String>>,
}

impl LoginRedirect {
    pub fn new(server_url: impl Into<String>, session_key: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            session_key,
            requested: Mutex::new(None),
        }
    }

    pub fn login_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        match &self.session_key {
            Some(key) => format!("{base}/login?key={key}"),
            None => format!("{base}/login"),
        }
    }

    pub fn request(&self) {
        let url = self.login_url();
        tracing::warn!(%url, "Login required");
        if let Ok(mut guard) = self.requested.lock() {
            *guard = Some(url);
        }
    }

    /// The login URL, once a redirect has been requested.
    pub fn requested(&self) -> Option<String> {
        self.requested.lock().ok().and_then(|g| g.clone())
    }
}

/// Profile taken from configuration or the environment.
#[derive(Debug)]
pub struct StaticProfile {
    profile: Option<UserProfile>,
    login: LoginRedirect,
}

impl StaticProfile {
    pub fn new(profile: Option<UserProfile>, login: LoginRedirect) -> Self {
        Self { profile, login }
    }

    pub fn login(&self) -> &LoginRedirect {
        &self.login
    }
}

#[async_trait]
impl AuthProvider for StaticProfile {
    async fn get_current_user(&self) -> Result<UserProfile> {
        match &self.profile {
            Some(profile) => Ok(profile.clone()),
            None => {
                self.login.request();
                Err(ReaderError::Authentication)
            }
        }
    }

    fn redirect_to_login(&self) {
        self.login.request();
    }

    fn pending_login(&self) -> Option<String> {
        self.login.requested()
    }
}

/// Profile fetched from the service's `/my_profile` endpoint using a stored
/// session cookie.
#[derive(Debug)]
pub struct HttpProfile {
    client: reqwest::Client,
    server_url: String,
    session: String,
    login: LoginRedirect,
}

impl HttpProfile {
    pub fn new(
        server_url: impl Into<String>,
        session: impl Into<String>,
        login: LoginRedirect,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.into(),
            session: session.into(),
            login,
        }
    }

    pub fn login(&self) -> &LoginRedirect {
        &self.login
    }
}

#[async_trait]
impl AuthProvider for HttpProfile {
    async fn get_current_user(&self) -> Result<UserProfile> {
        let url = format!("{}/my_profile", self.server_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::COOKIE, format!("session={}", self.session))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.login.request();
            return Err(ReaderError::Authentication);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReaderError::Service {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    fn redirect_to_login(&self) {
        self.login.request();
    }

    fn pending_login(&self) -> Option<String> {
        self.login.requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_carries_session_key() {
        let login = LoginRedirect::new("https://localhost:8000/", Some("k1".into()));
        assert_eq!(login.login_url(), "https://localhost:8000/login?key=k1");
        let login = LoginRedirect::new("https://localhost:8000", None);
        assert_eq!(login.login_url(), "https://localhost:8000/login");
    }

    #[tokio::test]
    async fn missing_profile_requests_login() {
        let provider = StaticProfile::new(None, LoginRedirect::new("https://h", None));
        assert!(provider.login().requested().is_none());
        let err = provider.get_current_user().await.unwrap_err();
        assert!(matches!(err, ReaderError::Authentication));
        assert_eq!(provider.login().requested().as_deref(), Some("https://h/login"));
    }

    #[tokio::test]
    async fn static_profile_is_returned() {
        let profile = UserProfile {
            token: "tok".into(),
            sub: "sub".into(),
            email: None,
            name: None,
        };
        let login = LoginRedirect::new("https://h", None);
        let provider = StaticProfile::new(Some(profile.clone()), login);
        assert_eq!(provider.get_current_user().await.unwrap(), profile);
    }
}
