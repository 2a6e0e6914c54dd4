use serde::{Deserialize, Serialize};

/// Playback tuning. Every timing constant is a heuristic, so all of them
/// live here rather than in the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// 0..=100, applied to note-on velocities only.
    pub volume: u8,
    /// Events due within this many ms are sent on each tick.
    pub lookahead_ms: f64,
    /// Subtracted from the lookahead to get the tick interval (at least 1 ms).
    pub tick_margin_ms: f64,
    /// Lookahead multiplier while the host reports throttled timers.
    pub throttle_factor: f64,
    /// Added to the lookahead before the end callback fires.
    pub end_margin_ms: f64,
    /// Offset from the last dispatch at which flushed note-offs are stamped.
    pub release_offset_ms: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 100,
            lookahead_ms: 300.0,
            tick_margin_ms: 250.0,
            throttle_factor: 20.0,
            end_margin_ms: 250.0,
            release_offset_ms: 300.0,
        }
    }
}

impl PlayerConfig {
    pub fn tick_interval_ms(&self) -> f64 {
        (self.lookahead_ms - self.tick_margin_ms).max(1.0)
    }

    pub fn buffer_delay_ms(&self, throttled: bool) -> f64 {
        if throttled {
            self.lookahead_ms * self.throttle_factor
        } else {
            self.lookahead_ms
        }
    }
}
