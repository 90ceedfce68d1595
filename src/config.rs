//! Server configuration, read from the environment (and `.env` when present).

use std::{net::IpAddr, str::FromStr, time::Duration};

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 500;
pub const DEFAULT_ROOM_NAME: &str = "General";
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// A connection is idle once it has been inactive for longer than this.
    pub idle_threshold: Duration,
    /// Maximum number of messages replayed to a joining connection.
    pub history_limit: usize,
    pub default_room_name: String,
    /// Events queued per connection before further ones are dropped.
    pub outbox_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            idle_threshold: Duration::from_secs(DEFAULT_IDLE_THRESHOLD_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_room_name: DEFAULT_ROOM_NAME.to_owned(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let idle_secs = parse(&lookup, "IDLE_THRESHOLD_SECS", "a number of seconds")?
            .unwrap_or(DEFAULT_IDLE_THRESHOLD_SECS);

        Ok(Self {
            bind_addr: parse(&lookup, "BIND_ADDR", "an IP address")?.unwrap_or(defaults.bind_addr),
            port: parse(&lookup, "PORT", "a port number")?.unwrap_or(defaults.port),
            idle_threshold: Duration::from_secs(idle_secs),
            history_limit: parse(&lookup, "HISTORY_LIMIT", "a message count")?
                .unwrap_or(defaults.history_limit),
            default_room_name: lookup("DEFAULT_ROOM_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.default_room_name),
            outbox_capacity: parse(&lookup, "OUTBOX_CAPACITY", "an event count")?
                .unwrap_or(defaults.outbox_capacity),
        })
    }

    pub fn idle_threshold_ms(&self) -> i64 {
        i64::try_from(self.idle_threshold.as_millis()).unwrap_or(i64::MAX)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { key, expected, value: value.to_owned() })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.idle_threshold, Duration::from_secs(60));
        assert_eq!(config.history_limit, 500);
        assert_eq!(config.default_room_name, "General");
        assert_eq!(config.outbox_capacity, 256);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("IDLE_THRESHOLD_SECS", "5"),
            ("HISTORY_LIMIT", "20"),
            ("DEFAULT_ROOM_NAME", "Lobby"),
            ("BIND_ADDR", "127.0.0.1"),
            ("OUTBOX_CAPACITY", "16"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.idle_threshold_ms(), 5_000);
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.default_room_name, "Lobby");
        assert_eq!(config.bind_addr, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.outbox_capacity, 16);
    }

    #[test]
    fn garbage_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
