//! HTTP implementation of [`crate::services::analytics_api::AnalyticsApi`].

mod client;
mod decode;

pub use client::HttpAnalyticsClient;

use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::fetch::{BasicClient, auth::ApiKey};
use crate::services::analytics_api::AnalyticsApi;

/// Builds the analytics client described by `config`, with bearer auth when
/// a token is configured.
pub fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn AnalyticsApi>> {
    let http = BasicClient::with_timeouts(config.timeout, config.connect_timeout)?;
    info!(
        url = %config.api_url,
        authenticated = config.api_token.is_some(),
        timeout_secs = config.timeout.as_secs(),
        "Connecting to analytics service"
    );

    let api: Arc<dyn AnalyticsApi> = match &config.api_token {
        Some(token) => Arc::new(HttpAnalyticsClient::new(
            ApiKey::bearer(http, token)?,
            &config.api_url,
        )?),
        None => Arc::new(HttpAnalyticsClient::new(http, &config.api_url)?),
    };
    Ok(api)
}
