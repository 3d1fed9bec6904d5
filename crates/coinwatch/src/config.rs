use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token_path: Option<PathBuf>,
    pub page_size: usize,
    pub currency: String,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("COINWATCH_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let token_path = match lookup("COINWATCH_TOKEN_PATH") {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => lookup("HOME").map(|home| PathBuf::from(home).join(".coinwatch").join("token")),
        };

        let page_size = match lookup("COINWATCH_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ClientError::Config(format!("COINWATCH_PAGE_SIZE must be a number, got {raw:?}")))?
                .max(1),
            None => DEFAULT_PAGE_SIZE,
        };

        let currency = lookup("COINWATCH_CURRENCY")
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| "usd".to_string());

        let request_timeout = match lookup("COINWATCH_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.parse().map_err(|_| {
                ClientError::Config(format!("COINWATCH_TIMEOUT_SECS must be a number, got {raw:?}"))
            })?)),
            None => None,
        };

        Ok(Self {
            api_url,
            token_path,
            page_size,
            currency,
            request_timeout,
        })
    }

    /// In-memory session, no token file. Used by tests and embedders.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            currency: "usd".to_string(),
            request_timeout: None,
        }
    }
}
