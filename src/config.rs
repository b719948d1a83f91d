//! Environment-backed application configuration.
//!
//! Keys are resolved once at startup; a missing key is a hard error for
//! the operation that needs it rather than an empty string sent to the
//! API. `GEMINI_API_KEY` backs both pipeline stages unless a
//! stage-specific override is set.

use std::env;

use crate::generation::gemini::DEFAULT_BASE_URL;

pub const SHARED_KEY_VAR: &str = "GEMINI_API_KEY";
pub const TEXT_KEY_VAR: &str = "GEMINI_TEXT_API_KEY";
pub const IMAGE_KEY_VAR: &str = "GEMINI_IMAGE_API_KEY";
pub const BASE_URL_VAR: &str = "GEMINI_BASE_URL";
pub const DEMO_USERNAME_VAR: &str = "DEMO_USERNAME";
pub const DEMO_PASSWORD_VAR: &str = "DEMO_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingKey(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Key for the prompt-enhancement (text) model.
    pub text_api_key: String,
    /// Key for the image-generation model.
    pub image_api_key: String,
    /// Endpoint override, e.g. a dev proxy. Defaults to the public API.
    pub base_url: String,
    /// Demo login credentials. Optional at load time; login fails fast
    /// when they are absent.
    pub demo_username: Option<String>,
    pub demo_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary lookup, so tests can
    /// supply variables without touching process state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let shared = non_empty(lookup(SHARED_KEY_VAR));

        let text_api_key = non_empty(lookup(TEXT_KEY_VAR))
            .or_else(|| shared.clone())
            .ok_or(ConfigError::MissingKey(SHARED_KEY_VAR))?;
        let image_api_key = non_empty(lookup(IMAGE_KEY_VAR))
            .or(shared)
            .ok_or(ConfigError::MissingKey(SHARED_KEY_VAR))?;

        Ok(Self {
            text_api_key,
            image_api_key,
            base_url: non_empty(lookup(BASE_URL_VAR))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            demo_username: non_empty(lookup(DEMO_USERNAME_VAR)),
            demo_password: non_empty(lookup(DEMO_PASSWORD_VAR)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn shared_key_backs_both_stages() {
        let config = AppConfig::from_lookup(lookup(&[(SHARED_KEY_VAR, "k-shared")])).unwrap();
        assert_eq!(config.text_api_key, "k-shared");
        assert_eq!(config.image_api_key, "k-shared");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn stage_specific_keys_override_the_shared_one() {
        let config = AppConfig::from_lookup(lookup(&[
            (SHARED_KEY_VAR, "k-shared"),
            (IMAGE_KEY_VAR, "k-image"),
        ]))
        .unwrap();
        assert_eq!(config.text_api_key, "k-shared");
        assert_eq!(config.image_api_key, "k-image");
    }

    #[test]
    fn missing_key_fails_fast() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains(SHARED_KEY_VAR));
    }

    #[test]
    fn blank_values_count_as_missing() {
        assert!(AppConfig::from_lookup(lookup(&[(SHARED_KEY_VAR, "  ")])).is_err());

        let config = AppConfig::from_lookup(lookup(&[
            (SHARED_KEY_VAR, "k"),
            (DEMO_USERNAME_VAR, ""),
        ]))
        .unwrap();
        assert_eq!(config.demo_username, None);
    }
}
