//! Client configuration from the environment

use crate::state_machine::RecoveryPolicy;
use crate::typewriter::TypewriterTimings;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_RECOVERY_DELAY_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a {expected} URL, got {value:?}")]
    InvalidUrl {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Everything the client needs at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Chat channel endpoint
    pub ws_url: String,
    /// Base URL of the auxiliary HTTP API
    pub api_url: String,
    pub recovery: RecoveryPolicy,
    pub typewriter: TypewriterTimings,
    /// Play the placeholder animation before the first prompt
    pub intro: bool,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ws_url = lookup("CHAT_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl {
                name: "CHAT_WS_URL",
                expected: "ws:// or wss://",
                value: ws_url,
            });
        }

        let api_url = lookup("CHAT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                name: "CHAT_API_URL",
                expected: "http:// or https://",
                value: api_url,
            });
        }

        let recovery = match lookup("CHAT_RECOVERY_DELAY_SECS").as_deref().map(str::trim) {
            None => RecoveryPolicy::AutoReset {
                delay: Duration::from_secs(DEFAULT_RECOVERY_DELAY_SECS),
            },
            Some("manual" | "0") => RecoveryPolicy::Manual,
            Some(value) => RecoveryPolicy::AutoReset {
                delay: Duration::from_secs(parse_number("CHAT_RECOVERY_DELAY_SECS", value)?),
            },
        };

        let defaults = TypewriterTimings::default();
        let millis = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            lookup(name).map_or(Ok(default), |value| {
                parse_number(name, value.trim()).map(Duration::from_millis)
            })
        };
        let typewriter = TypewriterTimings {
            typing: millis("CHAT_TYPEWRITER_TYPING_MS", defaults.typing)?,
            deleting: millis("CHAT_TYPEWRITER_DELETING_MS", defaults.deleting)?,
            pause: millis("CHAT_TYPEWRITER_PAUSE_MS", defaults.pause)?,
        };

        let intro = !matches!(lookup("CHAT_INTRO").as_deref().map(str::trim), Some("0"));

        Ok(Self {
            ws_url,
            api_url,
            recovery,
            typewriter,
            intro,
        })
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}
