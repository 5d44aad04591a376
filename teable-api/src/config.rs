//! Server settings read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `TEABLE_CORS_ORIGINS` | empty (any origin) |
//! | `TEABLE_CORS_ALLOW_CREDENTIALS` | `false` |
//! | `TEABLE_CORS_MAX_AGE_SECS` | `86400` |
//! | `TEABLE_EVENT_CAPACITY` | `1024` |
//! | `TEABLE_API_BIND` | `0.0.0.0` |
//! | `PORT` / `TEABLE_API_PORT` | `3000` |

use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult};

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Exact origins or `*.domain` wildcards. Empty allows every origin.
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,
    /// Capacity of the table event channel feeding the trigger listener.
    pub event_capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            event_capacity: 1024,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cors_origins: std::env::var("TEABLE_CORS_ORIGINS")
                .map(|raw| parse_origin_list(&raw))
                .unwrap_or(defaults.cors_origins),
            cors_allow_credentials: std::env::var("TEABLE_CORS_ALLOW_CREDENTIALS")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.cors_allow_credentials),
            cors_max_age_secs: env_parse("TEABLE_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            event_capacity: env_parse::<usize>("TEABLE_EVENT_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.event_capacity),
        }
    }

    /// Entries of the form `*.example.com` match any https subdomain.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            match (allowed.strip_prefix("*."), origin.strip_prefix("https://")) {
                (Some(domain), Some(host)) => host
                    .strip_suffix(domain)
                    .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
                _ => false,
            }
        })
    }
}

/// Listen address from `TEABLE_API_BIND` and `PORT`, falling back to
/// `TEABLE_API_PORT`.
pub fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("TEABLE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("TEABLE_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    bind_addr(&host, &port)
}

fn bind_addr(host: &str, port: &str) -> ApiResult<SocketAddr> {
    let port = port
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
