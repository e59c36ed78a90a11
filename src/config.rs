use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pages::PageCatalog;
use crate::services::analytics_api::DEFAULT_POSTS_LIMIT;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Runtime configuration, read from the environment (and `.env` when the
/// binary loaded one).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub posts_limit: u32,
    pub page_catalog_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            posts_limit: DEFAULT_POSTS_LIMIT,
            page_catalog_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so tests don't have to
    /// touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_url: get("ANALYTICS_API_URL").unwrap_or(defaults.api_url),
            api_token: get("ANALYTICS_API_TOKEN"),
            timeout: parse_or(get("ANALYTICS_TIMEOUT_SECS"), "ANALYTICS_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: parse_or(
                get("ANALYTICS_CONNECT_TIMEOUT_SECS"),
                "ANALYTICS_CONNECT_TIMEOUT_SECS",
            )?
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout),
            posts_limit: parse_or(get("POSTS_LIMIT"), "POSTS_LIMIT")?
                .unwrap_or(defaults.posts_limit),
            page_catalog_path: get("PAGE_CATALOG_PATH"),
        })
    }

    /// The configured page catalog, or the built-in default list.
    pub fn page_catalog(&self) -> Result<PageCatalog> {
        match &self.page_catalog_path {
            Some(path) => PageCatalog::load(path),
            None => Ok(PageCatalog::default()),
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map(|v| {
        v.trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got '{v}'"))
    })
    .transpose()
}
