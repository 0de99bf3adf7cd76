use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CALLING_CODE: &str = "91";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Supabase {
        url: String,
        anon_key: String,
        timeout: Duration,
    },
    /// No hosted backend configured, accounts and records live in memory.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dialogue_db: String,
    pub backend: BackendConfig,
    pub default_calling_code: Option<String>,
    pub shuffle_options: bool,
}

impl Config {
    /// Reads the process environment. `.env` has to be loaded before this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let timeout_secs = match get("BACKEND_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "BACKEND_TIMEOUT_SECS",
                value,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let backend = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::InvalidValue {
                        key: "SUPABASE_URL",
                        value: url,
                    });
                }
                BackendConfig::Supabase {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key,
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            (Some(_), None) => {
                return Err(ConfigError::MissingPair("SUPABASE_URL", "SUPABASE_ANON_KEY"))
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingPair("SUPABASE_ANON_KEY", "SUPABASE_URL"))
            }
            (None, None) => BackendConfig::Memory,
        };

        let default_calling_code = match get("DEFAULT_CALLING_CODE") {
            Some(code) if code.eq_ignore_ascii_case("none") => None,
            Some(code) => {
                let code = code.trim().trim_start_matches('+').to_string();
                if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::InvalidValue {
                        key: "DEFAULT_CALLING_CODE",
                        value: code,
                    });
                }
                Some(code)
            }
            None => Some(DEFAULT_CALLING_CODE.to_string()),
        };

        let shuffle_options = match get("SHUFFLE_OPTIONS").as_deref().map(str::trim) {
            None => true,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "SHUFFLE_OPTIONS",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            dialogue_db: get("DIALOGUE_DB").unwrap_or_else(|| DEFAULT_DIALOGUE_DB.to_string()),
            backend,
            default_calling_code,
            shuffle_options,
        })
    }
}
