use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

use divtrack_core::store::DEFAULT_FILE_PATH;
use divtrack_core::util::is_remote_database_url;
use divtrack_core::{StoreBackend, StoreConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub store: StoreConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // StoreConfig redacts its own auth token.
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("store", &self.store)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "DIVTRACK_BIND_ADDR", "127.0.0.1:8080");

        let backend = value_or_default(&lookup, "DIVIDENDS_BACKEND", StoreBackend::File.label())
            .parse::<StoreBackend>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "DIVIDENDS_BACKEND must be one of file, document, relational".to_string(),
                )
            })?;

        let file_path = PathBuf::from(value_or_default(
            &lookup,
            "DIVIDENDS_FILE_PATH",
            DEFAULT_FILE_PATH,
        ));

        let database_url = if backend.needs_database() {
            Some(required_trimmed(&lookup, "DIVIDENDS_DATABASE_URL")?)
        } else {
            optional_trimmed(&lookup, "DIVIDENDS_DATABASE_URL")
        };
        let auth_token = optional_trimmed(&lookup, "DIVIDENDS_DATABASE_AUTH_TOKEN");

        if let Some(url) = database_url.as_deref() {
            if is_remote_database_url(url) && backend.needs_database() && auth_token.is_none() {
                return Err(ConfigError::MissingVar("DIVIDENDS_DATABASE_AUTH_TOKEN"));
            }
        }

        Ok(Self {
            bind_addr,
            store: StoreConfig {
                backend,
                file_path,
                database_url,
                auth_token,
            },
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
