//! Environment-driven configuration

use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_FALLBACK_WARN_AFTER: u32 = 3;
pub const DEFAULT_PORT: u16 = 8080;

/// Deployment environment (`APP_ENV`), defaults to `sandbox`.
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

/// Base URL of the farm REST API (`FARM_API_BASE_URL`).
pub fn get_api_base_url() -> String {
    env::var("FARM_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable environment variable");
            default
        }),
        Err(_) => default,
    }
}

/// Everything the binaries need, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub api_base_url: String,
    pub fetch_timeout: Duration,
    /// 0 disables the periodic refresh; change notifications still trigger cycles.
    pub refresh_interval_seconds: u64,
    pub fallback_warn_after: u32,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
            fallback_warn_after: DEFAULT_FALLBACK_WARN_AFTER,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Read from the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Self {
        Self {
            environment: get_environment(),
            api_base_url: get_api_base_url(),
            fetch_timeout: Duration::from_millis(parse_var(
                "FETCH_TIMEOUT_MS",
                DEFAULT_FETCH_TIMEOUT_MS,
            )),
            refresh_interval_seconds: parse_var(
                "REFRESH_INTERVAL_SECONDS",
                DEFAULT_REFRESH_INTERVAL_SECONDS,
            ),
            fallback_warn_after: parse_var("FALLBACK_WARN_AFTER", DEFAULT_FALLBACK_WARN_AFTER),
            port: parse_var("PORT", DEFAULT_PORT),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}
