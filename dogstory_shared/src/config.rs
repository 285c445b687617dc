//! Configuration system.
//!
//! Loads client configuration from JSON strings (file IO left to app).
//! Every field has a default so a partial file only overrides what it names.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::net::PlayerId;

/// Root client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the game server, e.g. `http://127.0.0.1:8080`.
    pub server_url: String,
    /// Name used when joining.
    pub user_name: String,
    /// Map to join.
    pub map_id: String,
    /// Existing session token; when set the client skips joining.
    pub auth_token: Option<String>,
    /// Local player, used for camera focus.
    pub player_id: Option<PlayerId>,
    /// Render tick rate.
    pub tick_hz: u32,
    /// Snapshot fetch cadence, in ticks.
    pub snapshot_every_ticks: u64,
    /// Roster sync cadence, in ticks.
    pub roster_every_ticks: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    pub tuning: Tuning,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            user_name: "Player".to_string(),
            map_id: "map1".to_string(),
            auth_token: None,
            player_id: None,
            tick_hz: 60,
            snapshot_every_ticks: 5,
            roster_every_ticks: 50,
            request_timeout_ms: 2000,
            tuning: Tuning::default(),
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Empirically tuned motion constants.
///
/// Times are in milliseconds unless the name says otherwise; distances are map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Angular rate of facing changes, radians per ms.
    pub rotation_speed: f64,
    /// Below this reported speed no position correction is attempted.
    pub correction_min_speed: f64,
    /// Local/authoritative disagreement that triggers a correction.
    pub correction_min_error: f64,
    /// Window over which a correction converges, seconds.
    pub correction_window_secs: f64,
    /// Approach rate of carried loot toward its slot, per ms.
    pub carry_rate: f64,
    /// Distance between consecutive carried items behind the player.
    pub carry_spacing: f64,
    /// Height of carried loot above the ground.
    pub carry_height: f64,
    /// Phase speed of the loot bobbing animation, radians per ms.
    pub bob_speed: f64,
    /// Amplitude of the loot bobbing animation.
    pub bob_amplitude: f64,
    /// Height of the road surface.
    pub road_height: f64,
    /// Height of world loot above the road surface.
    pub rest_lift: f64,
    /// Lifetime of dropped loot before it is released.
    pub decay_duration_ms: f64,
    /// Divisor of the quadratic rise of dropped loot.
    pub decay_rise_divisor: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            rotation_speed: PI / 300.0,
            correction_min_speed: 0.1,
            correction_min_error: 0.3,
            correction_window_secs: 0.1,
            carry_rate: 0.01,
            carry_spacing: 0.4,
            carry_height: 1.5,
            bob_speed: 0.005,
            bob_amplitude: 0.2,
            road_height: 0.55,
            rest_lift: 0.3,
            decay_duration_ms: 1000.0,
            decay_rise_divisor: 200_000.0,
        }
    }
}

impl Tuning {
    /// Height at which loot rests on the road, before bobbing.
    pub fn rest_height(&self) -> f64 {
        self.road_height + self.rest_lift
    }

    /// Vertical bobbing offset at a given clock time.
    pub fn bob(&self, now: f64) -> f64 {
        self.bob_amplitude * (now * self.bob_speed).sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ClientConfig::from_json_str(
            r#"{"server_url": "http://game:9000", "player_id": 3, "tuning": {"decay_duration_ms": 500}}"#,
        )
        .unwrap();
        assert_eq!(cfg.server_url, "http://game:9000");
        assert_eq!(cfg.player_id, Some(PlayerId(3)));
        assert_eq!(cfg.snapshot_every_ticks, 5);
        assert_eq!(cfg.roster_every_ticks, 50);
        assert_eq!(cfg.tuning.decay_duration_ms, 500.0);
        assert_eq!(cfg.tuning.carry_rate, 0.01);
    }

    #[test]
    fn rest_height_sits_above_road() {
        let t = Tuning::default();
        assert!((t.rest_height() - 0.85).abs() < 1e-12);
        assert_eq!(t.bob(0.0), 0.0);
    }
}
