//! Service configuration read from the environment (and `.env`).

use di::inject;
use di::injectable;
use log::warn;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_REPLY_DELAY_MS: u64 = 2_000;
const DEFAULT_REPLY_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_EVENT_CAPACITY: usize = 64;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

pub const DEFAULT_GREETING: &str = "Hello! I'm your AI documentation assistant. I can help you understand your docs, find information, and suggest improvements. What would you like to know?";

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub bind_address: String,
    /// Latency of the built-in answer generator.
    pub reply_delay: Duration,
    /// Upper bound on a single generator call.
    pub reply_timeout: Duration,
    pub event_capacity: usize,
    /// First assistant message of every conversation. `None` starts empty.
    pub greeting: Option<String>,
    pub cors_origins: Vec<String>,
}

#[injectable]
impl AssistantConfig {
    #[inject]
    pub fn create() -> AssistantConfig {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl AssistantConfig {
    /// Builds a config from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AssistantConfig {
        let greeting = match lookup("ASSISTANT_GREETING") {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text),
            None => Some(DEFAULT_GREETING.to_owned()),
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_owned())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect();

        AssistantConfig {
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned()),
            reply_delay: Duration::from_millis(parse_or(
                &lookup,
                "REPLY_DELAY_MS",
                DEFAULT_REPLY_DELAY_MS,
            )),
            reply_timeout: Duration::from_millis(parse_or(
                &lookup,
                "REPLY_TIMEOUT_MS",
                DEFAULT_REPLY_TIMEOUT_MS,
            )),
            event_capacity: parse_or(&lookup, "EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY).max(1),
            greeting,
            cors_origins,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => T::from_str(raw.trim()).unwrap_or_else(|_| {
            warn!("ignoring invalid {key}={raw:?}, using default");
            default
        }),
    }
}
