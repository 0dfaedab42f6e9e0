//! Room configuration.

use std::time::Duration;

use quik_timer::TimerConfig;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_WIN_THRESHOLD;

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Connected players required to start a round.
    pub min_players: usize,

    /// Round wins that end the game.
    pub win_threshold: u32,

    /// Countdown units per turn.
    pub time_limit: u32,

    /// Wall-clock length of one countdown unit.
    pub tick_interval: Duration,

    /// How long a room may go without a connected player before it closes.
    /// Covers rooms nobody joined and rooms whose players all dropped.
    pub idle_timeout: Duration,
}

impl RoomConfig {
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            time_limit: self.time_limit,
            tick_interval: self.tick_interval,
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        let timer = TimerConfig::default();
        Self {
            min_players: 2,
            win_threshold: DEFAULT_WIN_THRESHOLD,
            time_limit: timer.time_limit,
            tick_interval: timer.tick_interval,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }
}
