use ts_rs::TS;

/// Simulation ticks per second for every room.
pub const TICK_RATE_HZ: u32 = 60;

/// Height of the ground plane. Nobody ends a tick below it.
pub const FLOOR_Y: f64 = 0.0;

/// Vertical speed applied by a jump that does not name one (m/s).
pub const DEFAULT_JUMP_SPEED: f64 = 2.0;

/// World parameters shared with clients so they can interpolate locally.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    pub tick_rate_hz: u32,
    /// Downward acceleration applied to non-flying people (m/s^2)
    pub gravity: f64,
    pub floor_y: f64,
    /// `people_state` goes out on ticks where `serverTime % n == 0`
    #[ts(type = "number")]
    pub broadcast_every_n_ticks: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            gravity: 9.8,
            floor_y: FLOOR_Y,
            broadcast_every_n_ticks: 2,
        }
    }
}

impl WorldConfig {
    /// Fixed simulation step in seconds.
    pub fn tick_length(&self) -> f64 {
        1.0 / self.tick_rate_hz as f64
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 {
            return Err("tick_rate_hz must be > 0".to_string());
        }
        if !self.gravity.is_finite() {
            return Err("gravity must be finite".to_string());
        }
        if !self.floor_y.is_finite() {
            return Err("floor_y must be finite".to_string());
        }
        if self.broadcast_every_n_ticks == 0 {
            return Err("broadcast_every_n_ticks must be > 0".to_string());
        }
        Ok(())
    }
}
