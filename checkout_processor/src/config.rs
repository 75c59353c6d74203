use std::time::Duration;

use log::*;
use tae_common::{parse_duration_secs, Secret};

/// Signed webhooks older than this are rejected.
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub webhook_tolerance: Duration,
    pub request_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.processor.example".to_string(),
            api_key: Secret::default(),
            webhook_secret: Secret::default(),
            webhook_tolerance: DEFAULT_WEBHOOK_TOLERANCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ProcessorConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("TAE_PROCESSOR_URL").unwrap_or_else(|_| {
            warn!("🪛️ TAE_PROCESSOR_URL not set, using {}", defaults.base_url);
            defaults.base_url.clone()
        });
        let api_key = Secret::new(std::env::var("TAE_PROCESSOR_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ TAE_PROCESSOR_API_KEY not set. Calls to the processor will be rejected.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("TAE_PROCESSOR_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ TAE_PROCESSOR_WEBHOOK_SECRET not set. Every webhook will fail verification.");
            String::default()
        }));
        let webhook_tolerance = duration_from_env("TAE_WEBHOOK_TOLERANCE", defaults.webhook_tolerance);
        let request_timeout = duration_from_env("TAE_PROCESSOR_TIMEOUT", defaults.request_timeout);
        Self { base_url, api_key, webhook_secret, webhook_tolerance, request_timeout }
    }
}

fn duration_from_env(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(s) => parse_duration_secs(&s).unwrap_or_else(|| {
            error!("🪛️ {key} is not a whole number of seconds: {s}. Using {}s", default.as_secs());
            default
        }),
        Err(_) => default,
    }
}
