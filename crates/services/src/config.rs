use std::env;
use std::time::Duration;

use assess_core::model::UserId;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the assessment backend.
#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    pub user_id: Option<UserId>,
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiConfig {
    /// Build a config with the default timeout. A leading `Bearer ` on `token` is
    /// stripped.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: &str) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: normalize_token(token),
            user_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `LEARN_API_BASE_URL`, `LEARN_API_TOKEN`, `LEARN_USER_ID` and
    /// `LEARN_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` without a token, and `ConfigError::Invalid`
    /// for a malformed user id or timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`ApiConfig::from_env`], with `token` standing in for
    /// `LEARN_API_TOKEN` when given. The other variables are still read.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_env_with_token(token: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_lookup(with_token(|name| env::var(name).ok(), token))
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let token = non_empty("LEARN_API_TOKEN").ok_or(ConfigError::Missing {
            name: "LEARN_API_TOKEN",
        })?;
        let base_url = non_empty("LEARN_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let mut config = Self::new(base_url, &token);

        if let Some(raw) = non_empty("LEARN_USER_ID") {
            let user_id = raw.parse::<UserId>().map_err(|err| ConfigError::Invalid {
                name: "LEARN_USER_ID",
                reason: err.to_string(),
            })?;
            config = config.with_user(user_id);
        }

        if let Some(raw) = non_empty("LEARN_API_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "LEARN_API_TIMEOUT_SECS",
                    reason: format!("expected a positive number of seconds, got {raw:?}"),
                })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn with_token<'a>(
    lookup: impl Fn(&str) -> Option<String> + 'a,
    token: Option<&'a str>,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |name| match token {
        Some(token) if name == "LEARN_API_TOKEN" => Some(token.to_string()),
        _ => lookup(name),
    }
}

fn normalize_token(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = ApiConfig::from_lookup(lookup(&[("LEARN_API_TOKEN", "Bearer abc")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token, "abc");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.user_id.is_none());
    }

    #[test]
    fn missing_token_is_an_error() {
        assert_eq!(
            ApiConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing {
                name: "LEARN_API_TOKEN"
            }
        );
    }

    #[test]
    fn token_override_keeps_the_other_variables() {
        let user_id = UserId::random();
        let user = user_id.to_string();
        let vars = lookup(&[
            ("LEARN_API_BASE_URL", "http://example.test/api"),
            ("LEARN_USER_ID", user.as_str()),
            ("LEARN_API_TIMEOUT_SECS", "3"),
        ]);

        let config = ApiConfig::from_lookup(with_token(vars, Some("t"))).unwrap();
        assert_eq!(config.base_url, "http://example.test/api");
        assert_eq!(config.token, "t");
        assert_eq!(config.user_id, Some(user_id));
        assert_eq!(config.timeout, Duration::from_secs(3));

        let env_token = lookup(&[("LEARN_API_TOKEN", "from-env")]);
        let config = ApiConfig::from_lookup(with_token(env_token, None)).unwrap();
        assert_eq!(config.token, "from-env");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[
            ("LEARN_API_TOKEN", "t"),
            ("LEARN_API_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LEARN_API_TIMEOUT_SECS", .. }));

        let err = ApiConfig::from_lookup(lookup(&[
            ("LEARN_API_TOKEN", "t"),
            ("LEARN_USER_ID", "nobody"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LEARN_USER_ID", .. }));
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let config = ApiConfig::new("http://host/api/", "t");
        assert_eq!(config.url("/assessments/1"), "http://host/api/assessments/1");
    }

    #[test]
    fn debug_output_hides_the_token() {
        let config = ApiConfig::new("http://host", "secret-token");
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
