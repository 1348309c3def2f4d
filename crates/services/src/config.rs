use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_VOICE: &str = "alloy";
pub const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_LANGUAGE: &str = "Spanish";
pub const DEFAULT_DB_URL: &str = "sqlite://profe.sqlite3?mode=rwc";
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Connection settings for an OpenAI-compatible model endpoint.
#[derive(Clone, Debug)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub tts_model: String,
    pub tts_voice: String,
}

impl AiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`. Returns `None` when no API key is set.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = non_blank(lookup("PROFE_AI_API_KEY"))?;
        Some(Self {
            base_url: non_blank(lookup("PROFE_AI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_AI_BASE_URL.into()),
            api_key,
            model: non_blank(lookup("PROFE_AI_MODEL")).unwrap_or_else(|| DEFAULT_AI_MODEL.into()),
            tts_model: non_blank(lookup("PROFE_TTS_MODEL"))
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.into()),
            tts_voice: non_blank(lookup("PROFE_TTS_VOICE"))
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.into()),
        })
    }
}

/// Settings shared by every prompt flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowConfig {
    pub timeout: Duration,
    pub language: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FLOW_TIMEOUT,
            language: DEFAULT_LANGUAGE.into(),
        }
    }
}

impl FlowConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `PROFE_FLOW_TIMEOUT_SECS` is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if `PROFE_FLOW_TIMEOUT_SECS` is not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout = match non_blank(lookup("PROFE_FLOW_TIMEOUT_SECS")) {
            None => DEFAULT_FLOW_TIMEOUT,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        name: "PROFE_FLOW_TIMEOUT_SECS",
                        reason: e.to_string(),
                    }
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: "PROFE_FLOW_TIMEOUT_SECS",
                        reason: "must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
        };
        let language = non_blank(lookup("PROFE_LANGUAGE"))
            .map_or_else(|| DEFAULT_LANGUAGE.into(), |l| l.trim().to_owned());
        Ok(Self { timeout, language })
    }
}

/// Firebase Identity Toolkit settings.
#[derive(Clone, Debug)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub identity_base_url: String,
    pub token_base_url: String,
}

impl FirebaseConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            identity_base_url: IDENTITY_TOOLKIT_URL.into(),
            token_base_url: SECURE_TOKEN_URL.into(),
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        non_blank(lookup("PROFE_FIREBASE_API_KEY")).map(Self::new)
    }
}

/// Everything the app needs to wire services.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_url: String,
    pub ai: Option<AiConfig>,
    pub flows: FlowConfig,
    pub firebase: Option<FirebaseConfig>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for malformed values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            db_url: non_blank(lookup("PROFE_DB_URL")).unwrap_or_else(|| DEFAULT_DB_URL.into()),
            ai: AiConfig::from_lookup(&lookup),
            flows: FlowConfig::from_lookup(&lookup)?,
            firebase: FirebaseConfig::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn ai_config_requires_api_key() {
        assert!(AiConfig::from_lookup(lookup(&[])).is_none());
        assert!(AiConfig::from_lookup(lookup(&[("PROFE_AI_API_KEY", "  ")])).is_none());

        let config = AiConfig::from_lookup(lookup(&[("PROFE_AI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_AI_BASE_URL);
        assert_eq!(config.model, DEFAULT_AI_MODEL);
        assert_eq!(config.tts_voice, DEFAULT_TTS_VOICE);
    }

    #[test]
    fn flow_config_parses_timeout_and_language() {
        let config = FlowConfig::from_lookup(lookup(&[
            ("PROFE_FLOW_TIMEOUT_SECS", "15"),
            ("PROFE_LANGUAGE", " English "),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.language, "English");

        assert_eq!(FlowConfig::from_lookup(lookup(&[])).unwrap(), FlowConfig::default());
    }

    #[test]
    fn flow_config_rejects_bad_timeout() {
        for raw in ["0", "soon", "-3"] {
            let err = FlowConfig::from_lookup(lookup(&[("PROFE_FLOW_TIMEOUT_SECS", raw)]));
            assert!(matches!(
                err,
                Err(ConfigError::Invalid {
                    name: "PROFE_FLOW_TIMEOUT_SECS",
                    ..
                })
            ));
        }
    }

    #[test]
    fn app_config_defaults_db_url_and_optional_backends() {
        let config = AppConfig::from_lookup(lookup(&[("PROFE_FIREBASE_API_KEY", "fb")])).unwrap();
        assert_eq!(config.db_url, DEFAULT_DB_URL);
        assert!(config.ai.is_none());
        let firebase = config.firebase.unwrap();
        assert_eq!(firebase.api_key, "fb");
        assert_eq!(firebase.identity_base_url, IDENTITY_TOOLKIT_URL);
    }
}
