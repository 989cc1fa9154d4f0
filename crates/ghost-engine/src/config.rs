use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ghost_contracts::RemoteError;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

const TIMEOUT_RANGE_S: (f64, f64) = (15.0, 600.0);
const TOOL_ROUNDS_RANGE: (usize, usize) = (1, 32);

#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
    pub max_tool_rounds: usize,
    pub events_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            events_path: None,
        }
    }
}

impl AuditConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Blank values count as unset; unparseable numbers keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(model) = lookup("GHOST_MODEL") {
            config.set_model(&model);
        }
        if let Some(api_base) = lookup("GEMINI_API_BASE") {
            config.set_api_base(&api_base);
        }
        if let Some(timeout) = lookup("GHOST_REQUEST_TIMEOUT").and_then(|raw| raw.trim().parse().ok())
        {
            config.set_request_timeout_secs(timeout);
        }
        if let Some(rounds) = lookup("GHOST_MAX_TOOL_ROUNDS").and_then(|raw| raw.trim().parse().ok())
        {
            config.set_max_tool_rounds(rounds);
        }
        if let Some(path) = lookup("GHOST_EVENTS") {
            config.events_path = Some(PathBuf::from(path));
        }
        config
    }

    pub fn set_model(&mut self, model: &str) {
        let trimmed = model.trim();
        if !trimmed.is_empty() {
            self.model = trimmed.to_string();
        }
    }

    pub fn set_api_base(&mut self, api_base: &str) {
        let trimmed = api_base.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_base = trimmed.to_string();
        }
    }

    pub fn set_request_timeout_secs(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() {
            seconds
        } else {
            DEFAULT_REQUEST_TIMEOUT_S
        };
        self.request_timeout =
            Duration::from_secs_f64(seconds.clamp(TIMEOUT_RANGE_S.0, TIMEOUT_RANGE_S.1));
    }

    pub fn set_max_tool_rounds(&mut self, rounds: usize) {
        self.max_tool_rounds = rounds.clamp(TOOL_ROUNDS_RANGE.0, TOOL_ROUNDS_RANGE.1);
    }
}

/// Credential for the remote model. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, RemoteError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RemoteError::fatal("API key is empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn from_env() -> Result<Self, RemoteError> {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RemoteError> {
        let Some(raw) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) else {
            return Err(RemoteError::fatal("GEMINI_API_KEY or GOOGLE_API_KEY not set"));
        };
        Self::new(raw)
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<String, String>>();
        move |key| {
            map.get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = AuditConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.model, "gemini-3-pro-preview");
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.max_tool_rounds, 10);
        assert!(config.events_path.is_none());
    }

    #[test]
    fn environment_overrides_and_clamps() {
        let config = AuditConfig::from_lookup(lookup_from(&[
            ("GHOST_MODEL", "gemini-2.5-pro"),
            ("GEMINI_API_BASE", "https://proxy.test/v1beta/"),
            ("GHOST_REQUEST_TIMEOUT", "5"),
            ("GHOST_MAX_TOOL_ROUNDS", "99"),
            ("GHOST_EVENTS", "/tmp/ghost/events.jsonl"),
        ]));
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.api_base, "https://proxy.test/v1beta");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.max_tool_rounds, 32);
        assert_eq!(
            config.events_path,
            Some(PathBuf::from("/tmp/ghost/events.jsonl"))
        );
    }

    #[test]
    fn unparseable_numbers_keep_defaults() {
        let config = AuditConfig::from_lookup(lookup_from(&[
            ("GHOST_REQUEST_TIMEOUT", "soon"),
            ("GHOST_MAX_TOOL_ROUNDS", "-1"),
            ("GHOST_MODEL", "   "),
        ]));
        assert_eq!(config, AuditConfig::default());
    }

    #[test]
    fn api_key_prefers_gemini_variable_and_is_redacted() {
        let key = ApiKey::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "primary-secret"),
            ("GOOGLE_API_KEY", "fallback-secret"),
        ]))
        .unwrap();
        assert_eq!(key.expose(), "primary-secret");
        assert!(!format!("{key:?}").contains("secret"));

        let fallback = ApiKey::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "fallback-secret")]))
            .unwrap();
        assert_eq!(fallback.expose(), "fallback-secret");
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = ApiKey::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message.contains("GEMINI_API_KEY"));
    }
}
