use crate::room_loop::RoomLoopConfig;
use presence_shared::config::WorldConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub world: WorldConfig,
    /// Capacity of each room's outbound event channel
    pub room_event_capacity: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            world: WorldConfig::default(),
            room_event_capacity: 64,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`:
    ///
    /// - `PRESENCE_LISTEN_ADDR` full bind address, or `PORT` to bind `0.0.0.0:PORT`
    /// - `PRESENCE_GRAVITY` (m/s^2)
    /// - `PRESENCE_MAX_CONNECTIONS`
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(addr) = lookup("PRESENCE_LISTEN_ADDR") {
            config.listen_addr = addr;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| format!("PORT must be a port number, got {:?}", port))?;
            config.listen_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(gravity) = lookup("PRESENCE_GRAVITY") {
            config.world.gravity = gravity
                .parse()
                .map_err(|_| format!("PRESENCE_GRAVITY must be a number, got {:?}", gravity))?;
        }
        if let Some(max) = lookup("PRESENCE_MAX_CONNECTIONS") {
            config.max_connections = max.parse().map_err(|_| {
                format!("PRESENCE_MAX_CONNECTIONS must be an integer, got {:?}", max)
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.world.validate()?;
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("listen_addr {:?} is not a socket address", self.listen_addr));
        }
        if self.room_event_capacity == 0 {
            return Err("room_event_capacity must be > 0".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }
        Ok(())
    }

    pub fn room_loop(&self) -> RoomLoopConfig {
        RoomLoopConfig {
            tick_rate_hz: self.world.tick_rate_hz,
            broadcast_every_n_ticks: self.world.broadcast_every_n_ticks,
            event_capacity: self.room_event_capacity,
        }
    }
}
