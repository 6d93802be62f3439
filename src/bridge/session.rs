use crate::protocol::BridgeConnectBootstrap;
use serde_json::Value;
use std::time::Instant;

/// Handshake message as observed on the window channel
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMessage {
    pub data: Value,
    /// Origin of the posting window
    pub origin: String,
    /// Whether the message was posted by the embedding parent window
    pub from_parent: bool,
    /// Number of transferred ports; the first one is adopted
    pub port_count: usize,
}

impl BootstrapMessage {
    pub fn from_parent(data: Value, origin: impl Into<String>) -> Self {
        Self { data, origin: origin.into(), from_parent: true, port_count: 1 }
    }
}

/// Why a bootstrap did not establish a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapRejection {
    NotABootstrap,
    ForeignSource,
    MissingPort,
    OriginMismatch { pinned: String, received: String },
}

/// Connection identity of the bridge
#[derive(Debug, Clone)]
pub struct Session {
    session_id: Option<String>,
    parent_origin: Option<String>,
    port_adopted: bool,
    started_at: Instant,
}

/// Result of a successful handshake
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub bootstrap: BridgeConnectBootstrap,
    /// A previously adopted port must be closed before adopting the new one
    pub replaced_port: bool,
}

impl Session {
    pub fn new(now: Instant) -> Self {
        Self { session_id: None, parent_origin: None, port_adopted: false, started_at: now }
    }

    pub fn accept(
        &mut self,
        message: &BootstrapMessage,
        now: Instant,
    ) -> std::result::Result<Accepted, BootstrapRejection> {
        let bootstrap = BridgeConnectBootstrap::from_value(&message.data)
            .ok_or(BootstrapRejection::NotABootstrap)?;
        if !message.from_parent {
            return Err(BootstrapRejection::ForeignSource);
        }
        if message.port_count == 0 {
            return Err(BootstrapRejection::MissingPort);
        }
        if let Some(pinned) = &self.parent_origin {
            if *pinned != message.origin {
                return Err(BootstrapRejection::OriginMismatch {
                    pinned: pinned.clone(),
                    received: message.origin.clone(),
                });
            }
        }

        let replaced_port = self.port_adopted;
        self.port_adopted = true;
        self.session_id = Some(bootstrap.session_id.clone());
        self.parent_origin = Some(message.origin.clone());
        self.started_at = now;

        Ok(Accepted { bootstrap, replaced_port })
    }

    /// Events may only be sent while a port and a session id are present
    pub fn is_connected(&self) -> bool {
        self.port_adopted && self.session_id.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn parent_origin(&self) -> Option<&str> {
        self.parent_origin.as_deref()
    }

    pub fn has_port(&self) -> bool {
        self.port_adopted
    }

    pub fn uptime(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Whether a command carrying `session_id` belongs to this session
    pub fn owns(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    /// Forget the identity and the port. Returns true when a port must be closed.
    pub fn dispose(&mut self) -> bool {
        self.session_id = None;
        self.parent_origin = None;
        std::mem::take(&mut self.port_adopted)
    }

    /// Release the port while keeping the identity
    pub fn release_port(&mut self) -> bool {
        std::mem::take(&mut self.port_adopted)
    }
}
