//! Session management using browser cookies
//!
//! Nothing is stored server side: the access token and the pending
//! authorization state live in cookies and expire on the client.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;
use time::Duration;

/// Lifetime of the access token cookie
pub const ACCESS_TOKEN_MAX_AGE: Duration = Duration::hours(1);

/// Lifetime of a pending authorization
pub const AUTHORIZATION_STATE_MAX_AGE: Duration = Duration::minutes(10);

/// Values kept in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKey {
    /// Bearer token for the calendar API
    AccessToken,
    /// CSRF token and PKCE verifier of an authorization in progress
    AuthorizationState,
}

impl SessionKey {
    /// Name of the backing cookie
    pub fn cookie_name(&self) -> &'static str {
        match self {
            SessionKey::AccessToken => "accessToken",
            SessionKey::AuthorizationState => "oauthState",
        }
    }

    // The access token stays readable from scripts.
    fn http_only(&self) -> bool {
        matches!(self, SessionKey::AuthorizationState)
    }
}

/// Storage for per-browser session values
pub trait SessionStore {
    /// Get a value, if present and not expired
    fn get(&self, key: SessionKey) -> Option<String>;

    /// Store a value for `max_age`
    fn set(&mut self, key: SessionKey, value: String, max_age: Duration);

    /// Drop a value
    fn expire(&mut self, key: SessionKey);
}

/// Session store backed by the request's cookie jar
///
/// Changes are sent back to the browser when the session is part of the
/// response.
#[derive(Debug, Clone)]
pub struct CookieSession {
    jar: CookieJar,
}

impl CookieSession {
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }
}

impl SessionStore for CookieSession {
    fn get(&self, key: SessionKey) -> Option<String> {
        self.jar
            .get(key.cookie_name())
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn set(&mut self, key: SessionKey, value: String, max_age: Duration) {
        let cookie = Cookie::build((key.cookie_name(), value))
            .path("/")
            .max_age(max_age)
            .http_only(key.http_only())
            .same_site(SameSite::Lax)
            .build();

        self.jar = self.jar.clone().add(cookie);
    }

    fn expire(&mut self, key: SessionKey) {
        self.jar = self
            .jar
            .clone()
            .remove(Cookie::build(key.cookie_name()).path("/"));
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CookieSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state).await?;
        Ok(Self::new(jar))
    }
}

impl IntoResponseParts for CookieSession {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.jar.into_response_parts(res)
    }
}
