use crate::engine::constants::{BOUNDS_CACHE_TTL, VISIBILITY_CACHE_TTL};
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables of the bridge agent.
///
/// Every field has a default, so a JSON file only needs to name what it overrides.
/// Durations are expressed in milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeOptions {
    /// Pointer travel (Euclidean, px) after which a press turns into a drag
    pub drag_threshold_px: f64,

    /// Minimum spacing between two hover emissions
    #[serde(with = "millis")]
    pub hover_interval: Duration,

    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,

    #[serde(with = "millis")]
    pub visibility_cache_ttl: Duration,

    #[serde(with = "millis")]
    pub bounds_cache_ttl: Duration,

    /// Delay between two lookups of the framework error portal's shadow root
    #[serde(with = "millis")]
    pub portal_poll_interval: Duration,

    pub portal_poll_attempts: u32,

    /// Advertised in the capabilities; the resolver still decides per lookup
    pub supports_react_context: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            drag_threshold_px: 4.0,
            hover_interval: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(10),
            visibility_cache_ttl: VISIBILITY_CACHE_TTL,
            bounds_cache_ttl: BOUNDS_CACHE_TTL,
            portal_poll_interval: Duration::from_millis(50),
            portal_poll_attempts: 10,
            supports_react_context: true,
        }
    }
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_threshold(mut self, px: f64) -> Self {
        self.drag_threshold_px = px;
        self
    }

    pub fn hover_interval(mut self, interval: Duration) -> Self {
        self.hover_interval = interval;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn cache_ttls(mut self, visibility: Duration, bounds: Duration) -> Self {
        self.visibility_cache_ttl = visibility;
        self.bounds_cache_ttl = bounds;
        self
    }

    pub fn portal_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.portal_poll_interval = interval;
        self.portal_poll_attempts = attempts;
        self
    }

    pub fn supports_react_context(mut self, supported: bool) -> Self {
        self.supports_react_context = supported;
        self
    }

    /// Parse options from JSON, filling in defaults, and validate them
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.drag_threshold_px.is_finite() || self.drag_threshold_px < 0.0 {
            return Err(BridgeError::InvalidConfig(format!(
                "dragThresholdPx must be a non-negative number, got {}",
                self.drag_threshold_px
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(BridgeError::InvalidConfig("heartbeatInterval must be positive".into()));
        }
        if self.portal_poll_interval.is_zero() && self.portal_poll_attempts > 0 {
            return Err(BridgeError::InvalidConfig(
                "portalPollInterval must be positive when polling is enabled".into(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.drag_threshold_px, 4.0);
        assert_eq!(options.hover_interval, Duration::from_millis(50));
        assert_eq!(options.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(options.portal_poll_attempts, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options =
            BridgeOptions::from_json(r#"{ "hoverInterval": 120, "dragThresholdPx": 8 }"#).unwrap();
        assert_eq!(options.hover_interval, Duration::from_millis(120));
        assert_eq!(options.drag_threshold_px, 8.0);
        assert_eq!(options.heartbeat_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let options = BridgeOptions::new()
            .drag_threshold(10.0)
            .heartbeat_interval(Duration::from_secs(1))
            .cache_ttls(Duration::from_millis(50), Duration::from_millis(25))
            .portal_polling(Duration::from_millis(20), 3)
            .supports_react_context(false);
        assert_eq!(options.drag_threshold_px, 10.0);
        assert_eq!(options.bounds_cache_ttl, Duration::from_millis(25));
        assert_eq!(options.portal_poll_attempts, 3);
        assert!(!options.supports_react_context);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            BridgeOptions::from_json(r#"{ "dragThresholdPx": -1 }"#),
            Err(BridgeError::InvalidConfig(_))
        ));
        assert!(matches!(
            BridgeOptions::from_json(r#"{ "heartbeatInterval": 0 }"#),
            Err(BridgeError::InvalidConfig(_))
        ));
        assert!(matches!(BridgeOptions::from_json("[]"), Err(BridgeError::Json(_))));
    }
}
