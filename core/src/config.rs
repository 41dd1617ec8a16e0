//! Repository configuration.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const HOST_VAR: &str = "ASYNCLOAD_HOST";
pub const TIMEOUT_VAR: &str = "ASYNCLOAD_TIMEOUT_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Where a [`RemoteRepository`](crate::RemoteRepository) sends its calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryConfig {
    /// Authority of the API, e.g. `api.example.com` or `127.0.0.1:8080`.
    pub host: String,
    /// Overall per-request timeout. `None` waits indefinitely.
    #[serde(default, with = "secs")]
    pub timeout: Option<Duration>,
}

impl RepositoryConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: None,
        }
    }

    /// Read `ASYNCLOAD_HOST` and the optional `ASYNCLOAD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(HOST_VAR)
            .filter(|host| !host.trim().is_empty())
            .ok_or(ConfigError::Missing(HOST_VAR))?;

        let timeout = match lookup(TIMEOUT_VAR) {
            None => None,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: TIMEOUT_VAR,
                        value,
                    })
                }
            },
        };

        Ok(Self {
            host: host.trim().to_string(),
            timeout,
        })
    }
}

mod secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    /// Whole seconds, strictly positive, like `ASYNCLOAD_TIMEOUT_SECS`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<u64>::deserialize(deserializer)? {
            Some(0) => Err(D::Error::custom("timeout must be at least one second")),
            secs => Ok(secs.map(Duration::from_secs)),
        }
    }
}
