//! Application state shared across handlers

use anyhow::Result;
use common::calendar::CalendarClient;

use crate::{
    oauth::{OAuthClient, OAuthConfig},
    settings::AppConfig,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub oauth_client: OAuthClient,
    pub calendar_client: CalendarClient,
}

impl AppState {
    /// Build the upstream clients from the configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let oauth_client = OAuthClient::new(OAuthConfig::from(config))?;
        let calendar_client = CalendarClient::new(config.calendar_config());

        Ok(Self {
            oauth_client,
            calendar_client,
        })
    }
}
