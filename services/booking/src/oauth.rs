//! OAuth2 authorization code flow against the identity provider

use anyhow::Result;
use common::error::{UpstreamError, UpstreamResult};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
    basic::{BasicClient, BasicErrorResponse},
};
use tracing::{error, info};

use crate::settings::AppConfig;

/// OAuth2 configuration for the identity provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl From<&AppConfig> for OAuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config.authorize_url(),
            token_url: config.token_url(),
            redirect_url: config.redirect_url(),
            scopes: config.scopes(),
        }
    }
}

/// Values that must survive the round-trip through the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationState {
    pub csrf_token: String,
    pub pkce_verifier: String,
}

impl AuthorizationState {
    /// Serialize for storage in the session
    pub fn encode(&self) -> String {
        format!("{}.{}", self.csrf_token, self.pkce_verifier)
    }

    /// Parse a value produced by [`AuthorizationState::encode`]
    pub fn decode(value: &str) -> Option<Self> {
        let (csrf_token, pkce_verifier) = value.split_once('.')?;
        if csrf_token.is_empty() || pkce_verifier.is_empty() {
            return None;
        }

        Some(Self {
            csrf_token: csrf_token.to_string(),
            pkce_verifier: pkce_verifier.to_string(),
        })
    }

    /// Whether the `state` echoed by the identity provider is ours
    pub fn matches(&self, state: &str) -> bool {
        self.csrf_token == state
    }
}

/// Authorization URL together with the state to remember for the callback
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: AuthorizationState,
}

/// OAuth2 client wrapper
#[derive(Clone)]
pub struct OAuthClient {
    client: BasicClient,
    scopes: Vec<String>,
}

impl OAuthClient {
    /// Create a new OAuth2 client
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id),
            Some(ClientSecret::new(config.client_secret)),
            AuthUrl::new(config.auth_url)?,
            Some(TokenUrl::new(config.token_url)?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_url)?)
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            client,
            scopes: config.scopes,
        })
    }

    /// Build the authorization URL the browser is sent to
    ///
    /// Besides `client_id`, `response_type`, `redirect_uri`, `scope` and
    /// `prompt=consent`, the URL carries a random `state` and a PKCE
    /// challenge; both are returned so the callback can check them.
    pub fn authorization_request(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("prompt", "consent");

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, csrf_token) = request.url();

        AuthorizationRequest {
            url: url.to_string(),
            state: AuthorizationState {
                csrf_token: csrf_token.secret().clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
            },
        }
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: String, pkce_verifier: String) -> UpstreamResult<String> {
        info!("Exchanging authorization code for access token");

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(token_error)?;

        Ok(token_response.access_token().secret().clone())
    }
}

fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> UpstreamError
where
    RE: std::error::Error + 'static,
{
    error!("Token exchange failed: {}", err);

    match err {
        // The token endpoint answers errors with 400 (RFC 6749, section 5.2)
        RequestTokenError::ServerResponse(response) => UpstreamError::Upstream {
            status: 400,
            body: serde_json::to_string(&response).unwrap_or_else(|_| response.to_string()),
        },
        RequestTokenError::Request(err) => UpstreamError::Network(err.to_string()),
        RequestTokenError::Parse(err, body) => UpstreamError::Malformed(format!(
            "{}: {}",
            err,
            String::from_utf8_lossy(&body)
        )),
        RequestTokenError::Other(message) => UpstreamError::Malformed(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth2::url::Url;
    use std::collections::HashMap;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    fn config(token_url: String) -> OAuthConfig {
        OAuthConfig {
            client_id: "client-123".to_string(),
            client_secret: "s3cret".to_string(),
            auth_url: "https://login.example.com/contoso/oauth2/v2.0/authorize".to_string(),
            token_url,
            redirect_url: "http://localhost:1337/callback".to_string(),
            scopes: vec!["User.Read".to_string(), "Calendars.ReadWrite.Shared".to_string()],
        }
    }

    #[test]
    fn test_authorization_url_has_fixed_parameters() {
        let client = OAuthClient::new(config("https://login.example.com/token".to_string())).unwrap();
        let request = client.authorization_request();

        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.path(), "/contoso/oauth2/v2.0/authorize");

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "http://localhost:1337/callback");
        assert_eq!(query["scope"], "User.Read Calendars.ReadWrite.Shared");
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["state"], request.state.csrf_token);
        assert_eq!(query["code_challenge_method"], "S256");
        assert!(query.contains_key("code_challenge"));
    }

    #[test]
    fn test_each_request_gets_a_fresh_state() {
        let client = OAuthClient::new(config("https://login.example.com/token".to_string())).unwrap();

        let first = client.authorization_request();
        let second = client.authorization_request();
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn test_state_encoding() {
        let state = AuthorizationState {
            csrf_token: "csrf-1".to_string(),
            pkce_verifier: "verifier-1".to_string(),
        };

        let decoded = AuthorizationState::decode(&state.encode()).unwrap();
        assert_eq!(decoded, state);
        assert!(decoded.matches("csrf-1"));
        assert!(!decoded.matches("csrf-2"));

        assert_eq!(AuthorizationState::decode("no-separator"), None);
        assert_eq!(AuthorizationState::decode(".verifier"), None);
    }

    #[tokio::test]
    async fn test_exchange_code_posts_grant() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=ABC"))
            .and(body_string_contains("client_secret=s3cret"))
            .and(body_string_contains("code_verifier=verifier-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-xyz",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(config(format!("{}/token", server.uri()))).unwrap();
        let token = client
            .exchange_code("ABC".to_string(), "verifier-1".to_string())
            .await
            .unwrap();

        assert_eq!(token, "tok-xyz");
    }

    #[tokio::test]
    async fn test_exchange_code_surfaces_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "AADSTS70008: The provided authorization code has expired."
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config(format!("{}/token", server.uri()))).unwrap();
        let err = client
            .exchange_code("ABC".to_string(), "verifier-1".to_string())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(err.body().contains("invalid_grant"));
        assert!(err.body().contains("AADSTS70008"));
    }
}
