//! Service configuration loaded from the process environment

use anyhow::{Context, Result};
use common::calendar::{CalendarConfig, DEFAULT_GRAPH_BASE_URL, DEFAULT_TIMEZONE};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 1337;

/// Scopes requested from the identity provider
pub const DEFAULT_SCOPES: &str = "User.Read Calendars.ReadWrite.Shared";

/// Path of the OAuth2 redirect target
pub const CALLBACK_PATH: &str = "/callback";

/// Booking service configuration
///
/// # Environment Variables
/// - `TENANT_ID`: directory tenant of the identity provider
/// - `CLIENT_ID`: application (client) identifier
/// - `CLIENT_SECRET`: application secret
/// - `APP_URL`: public base URL of this service
/// - `PORT`: listen port (default: 1337)
/// - `AUTH_BASE_URL`: identity provider root (default: derived from `TENANT_ID`)
/// - `GRAPH_BASE_URL`: calendar API root (default: Graph v1.0)
/// - `CALENDAR_TIMEZONE`: time zone of read and created events (default: Asia/Tokyo)
/// - `OAUTH_SCOPES`: space separated scopes
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub app_url: String,
    pub port: u16,
    #[serde(default)]
    pub auth_base_url: Option<String>,
    pub graph_base_url: String,
    pub calendar_timezone: String,
    pub oauth_scopes: String,
}

impl AppConfig {
    /// Load the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_source(Environment::default())
    }

    /// Load the configuration from an environment source
    pub fn from_source(environment: Environment) -> Result<Self> {
        let config: AppConfig = Config::builder()
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("graph_base_url", DEFAULT_GRAPH_BASE_URL)?
            .set_default("calendar_timezone", DEFAULT_TIMEZONE)?
            .set_default("oauth_scopes", DEFAULT_SCOPES)?
            .add_source(environment)
            .build()?
            .try_deserialize()
            .context("Invalid or incomplete booking service configuration")?;

        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.app_url = trim_slash(&self.app_url);
        self.graph_base_url = trim_slash(&self.graph_base_url);
        self.auth_base_url = self.auth_base_url.as_deref().map(trim_slash);
        self
    }

    /// Root of the identity provider's OAuth2 endpoints
    pub fn auth_base_url(&self) -> String {
        self.auth_base_url.clone().unwrap_or_else(|| {
            format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0",
                self.tenant_id
            )
        })
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.auth_base_url())
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.auth_base_url())
    }

    /// Redirect URI registered with the identity provider
    pub fn redirect_url(&self) -> String {
        format!("{}{}", self.app_url, CALLBACK_PATH)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.oauth_scopes
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    pub fn calendar_config(&self) -> CalendarConfig {
        CalendarConfig {
            base_url: self.graph_base_url.clone(),
            timezone: self.calendar_timezone.clone(),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn trim_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Environment::default().source(Some(source))
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("TENANT_ID", "contoso"),
        ("CLIENT_ID", "client-123"),
        ("CLIENT_SECRET", "s3cret"),
        ("APP_URL", "https://rooms.example.com/"),
    ];

    #[test]
    fn test_defaults_are_applied() {
        let config = AppConfig::from_source(environment(&REQUIRED)).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.graph_base_url, DEFAULT_GRAPH_BASE_URL);
        assert_eq!(config.calendar_timezone, "Asia/Tokyo");
        assert_eq!(
            config.scopes(),
            vec!["User.Read".to_string(), "Calendars.ReadWrite.Shared".to_string()]
        );
        assert_eq!(
            config.authorize_url(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize"
        );
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
        assert_eq!(config.redirect_url(), "https://rooms.example.com/callback");
    }

    #[test]
    fn test_overrides_are_read() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "8080"));
        vars.push(("AUTH_BASE_URL", "http://127.0.0.1:9000/idp/"));
        vars.push(("GRAPH_BASE_URL", "http://127.0.0.1:9001/"));
        vars.push(("CALENDAR_TIMEZONE", "Europe/Paris"));

        let config = AppConfig::from_source(environment(&vars)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(config.token_url(), "http://127.0.0.1:9000/idp/token");
        assert_eq!(config.calendar_config().base_url, "http://127.0.0.1:9001");
        assert_eq!(config.calendar_config().timezone, "Europe/Paris");
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(key, _)| *key != "CLIENT_SECRET")
            .collect();

        let err = AppConfig::from_source(environment(&vars)).unwrap_err();
        assert!(format!("{err:#}").contains("client_secret"));
    }
}
