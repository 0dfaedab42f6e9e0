//! Server configuration from the environment.
//!
//! | Variable             | Default   | Meaning                          |
//! |----------------------|-----------|----------------------------------|
//! | `QUIK_HOST`          | `0.0.0.0` | Interface to listen on           |
//! | `QUIK_PORT`          | `5000`    | Port to listen on                |
//! | `QUIK_TIME_LIMIT`    | `10`      | Countdown units per turn         |
//! | `QUIK_TICK_MS`       | `1000`    | Length of one countdown unit     |
//! | `QUIK_WIN_THRESHOLD` | `3`       | Round wins that end a game       |
//! | `QUIK_MIN_PLAYERS`   | `2`       | Connected players to start round |
//! | `QUIK_ROOM_IDLE_SECS`| `60`      | Seconds a room may sit with no one connected |
//!
//! Unparseable values are logged and replaced by the default.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use quik_room::RoomConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns `None` for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RoomConfig::default();
        let tick_ms = parse_or(
            &lookup,
            "QUIK_TICK_MS",
            defaults.tick_interval.as_millis() as u64,
        );
        let room = RoomConfig {
            min_players: parse_or(&lookup, "QUIK_MIN_PLAYERS", defaults.min_players),
            win_threshold: parse_or(&lookup, "QUIK_WIN_THRESHOLD", defaults.win_threshold),
            time_limit: parse_or(&lookup, "QUIK_TIME_LIMIT", defaults.time_limit),
            tick_interval: Duration::from_millis(tick_ms),
            idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                "QUIK_ROOM_IDLE_SECS",
                defaults.idle_timeout.as_secs(),
            )),
        };

        Self {
            host: lookup("QUIK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "QUIK_PORT", DEFAULT_PORT),
            room,
        }
    }

    /// `host:port`, ready for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            room: RoomConfig::default(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, %default, "invalid setting, using default");
            default
        }
    }
}
