//! Configuration types for call negotiation

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for a [`CallCoordinator`](crate::CallCoordinator)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// WebSocket signaling relay URL (ws:// or wss://)
    pub signaling_url: String,

    /// STUN server URLs (empty for host candidates only)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// How long a caller waits for an answer (default: 30000ms)
    pub answer_timeout_ms: u64,

    /// How long a session may stay in Connecting (default: 15000ms)
    pub connect_timeout_ms: u64,

    /// How long to wait for local media permission (default: 10000ms)
    pub media_timeout_ms: u64,

    /// How long one outbound signaling message may take (default: 10000ms)
    pub send_timeout_ms: u64,

    /// Maximum simultaneous active calls (default: 1)
    pub max_active_calls: usize,

    /// Capacity of the call event broadcast channel (default: 64)
    pub event_capacity: usize,

    /// Capacity of inbound signaling channels (default: 128)
    pub signaling_capacity: usize,
}

/// TURN server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8080".to_string(),
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            answer_timeout_ms: 30_000,
            connect_timeout_ms: 15_000,
            media_timeout_ms: 10_000,
            send_timeout_ms: 10_000,
            max_active_calls: 1,
            event_capacity: 64,
            signaling_capacity: 128,
        }
    }
}

impl CallConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `signaling_url` is not a WebSocket URL
    /// - a STUN or TURN URL has the wrong scheme
    /// - any timeout is zero
    /// - `max_active_calls`, `event_capacity` or `signaling_capacity` is zero
    pub fn validate(&self) -> Result<()> {
        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        if let Some(bad) = self
            .stun_servers
            .iter()
            .find(|url| !url.starts_with("stun:") && !url.starts_with("stuns:"))
        {
            return Err(Error::InvalidConfig(format!(
                "STUN server URL must start with stun: or stuns:, got {}",
                bad
            )));
        }

        if let Some(bad) = self
            .turn_servers
            .iter()
            .find(|turn| !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:"))
        {
            return Err(Error::InvalidConfig(format!(
                "TURN server URL must start with turn: or turns:, got {}",
                bad.url
            )));
        }

        for (name, value) in [
            ("answer_timeout_ms", self.answer_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("media_timeout_ms", self.media_timeout_ms),
            ("send_timeout_ms", self.send_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }

        if self.max_active_calls == 0 {
            return Err(Error::InvalidConfig(
                "max_active_calls must be at least 1".to_string(),
            ));
        }

        if self.event_capacity == 0 || self.signaling_capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel capacities must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a YAML configuration document
    ///
    /// Missing fields take their default values.
    ///
    /// # Example
    ///
    /// ```
    /// use peercall::CallConfig;
    ///
    /// let config = CallConfig::from_yaml_str("answer_timeout_ms: 5000\n").unwrap();
    /// assert_eq!(config.answer_timeout_ms, 5000);
    /// assert_eq!(config.max_active_calls, 1);
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::SerializationError(format!("Invalid YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Create a configuration preset for calls on a local network
    ///
    /// No STUN/TURN servers are configured, so only host candidates are
    /// gathered and no external traffic is generated.
    ///
    /// # Example
    ///
    /// ```
    /// use peercall::CallConfig;
    ///
    /// let config = CallConfig::lan_preset("ws://127.0.0.1:8080");
    /// assert!(config.stun_servers.is_empty());
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn lan_preset(signaling_url: &str) -> Self {
        Self {
            signaling_url: signaling_url.to_string(),
            stun_servers: Vec::new(),
            turn_servers: Vec::new(),
            connect_timeout_ms: 5_000,
            ..Default::default()
        }
    }

    /// Add TURN servers to the configuration
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }

    /// Answer wait bound
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_millis(self.answer_timeout_ms)
    }

    /// Connectivity wait bound
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Media permission wait bound
    pub fn media_timeout(&self) -> Duration {
        Duration::from_millis(self.media_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
