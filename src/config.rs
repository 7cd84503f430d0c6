use std::env;

use anyhow::Result;

use crate::client::{Client, DEFAULT_API_URL};
use crate::error::ConfigError;

/// Central configuration loaded from environment variables.
///
/// The API key comes from the environment (never hardcoded). The binary
/// loads a .env file first via dotenvy.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    /// Queries per second allowed for this project in the Google Cloud
    /// console. Enforced as `60 * qps` requests per minute.
    pub qps: u32,
    /// Ask Perspective not to store the submitted text. Use for
    /// confidential data or data from people under 13.
    pub do_not_store: bool,
    /// Base URL of the API (overridable for testing).
    pub api_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only the API key has no default, and it is only checked by
    /// `require_api_key` so that offline commands keep working without it.
    pub fn load() -> Result<Self> {
        Ok(Self::from_lookup(|name| env::var(name).ok())?)
    }

    /// Build a config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let qps = match lookup("PERSPECTIVE_QPS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(qps) if qps > 0 => qps,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "PERSPECTIVE_QPS",
                        value: raw,
                    })
                }
            },
            None => 1,
        };

        let do_not_store = match lookup("PERSPECTIVE_DO_NOT_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "PERSPECTIVE_DO_NOT_STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            api_key: lookup("PERSPECTIVE_API_KEY").unwrap_or_default(),
            qps,
            do_not_store,
            api_url: lookup("PERSPECTIVE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }

    /// Check that the Perspective API key is configured.
    /// Call this before any operation that talks to the API.
    pub fn require_api_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!(
                "PERSPECTIVE_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Build a client from this configuration.
    pub fn client(&self) -> Result<Client> {
        self.require_api_key()?;
        let client = Client::builder(&self.api_key)
            .qps(self.qps)
            .do_not_store(self.do_not_store)
            .base_url(&self.api_url)
            .build()?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.qps, 1);
        assert!(!config.do_not_store);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_key.is_empty());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_all_values() {
        let config = config_from(&[
            ("PERSPECTIVE_API_KEY", "abc"),
            ("PERSPECTIVE_QPS", "10"),
            ("PERSPECTIVE_DO_NOT_STORE", "true"),
            ("PERSPECTIVE_API_URL", "http://localhost:9000"),
        ])
        .unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.qps, 10);
        assert!(config.do_not_store);
        assert_eq!(config.api_url, "http://localhost:9000");
        assert!(config.require_api_key().is_ok());
    }

    #[test]
    fn test_rejects_zero_qps() {
        assert_eq!(
            config_from(&[("PERSPECTIVE_QPS", "0")]).unwrap_err(),
            ConfigError::InvalidValue {
                name: "PERSPECTIVE_QPS",
                value: "0".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_garbage_qps() {
        assert!(config_from(&[("PERSPECTIVE_QPS", "fast")]).is_err());
    }

    #[test]
    fn test_rejects_unknown_do_not_store_value() {
        assert!(config_from(&[("PERSPECTIVE_DO_NOT_STORE", "maybe")]).is_err());
        assert!(!config_from(&[("PERSPECTIVE_DO_NOT_STORE", "0")])
            .unwrap()
            .do_not_store);
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = config_from(&[]).unwrap();
        assert!(config.client().is_err());
    }
}
