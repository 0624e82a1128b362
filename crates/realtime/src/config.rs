use std::time::Duration;

/// Realtime endpoint used when `REALTIME_URL` is unset.
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:5000/realtime";

/// Default interval between liveness pings.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 25;

/// Connection manager configuration.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket URL of the realtime endpoint.
    pub url: String,
    /// Interval between liveness pings while connected.
    pub ping_interval: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
        }
    }
}

impl RealtimeConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                          |
    /// |-------------------------------|----------------------------------|
    /// | `REALTIME_URL`                | `ws://localhost:5000/realtime`   |
    /// | `REALTIME_PING_INTERVAL_SECS` | `25`                             |
    ///
    /// Unparseable or zero intervals fall back to the default.
    pub fn from_env() -> Self {
        let url = std::env::var("REALTIME_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string());

        let ping_interval_secs: u64 = std::env::var("REALTIME_PING_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PING_INTERVAL_SECS);

        Self {
            url,
            ping_interval: Duration::from_secs(ping_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_endpoint() {
        let config = RealtimeConfig::default();
        assert_eq!(config.url, DEFAULT_REALTIME_URL);
        assert_eq!(config.ping_interval, Duration::from_secs(25));
    }
}
