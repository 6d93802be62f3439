//! Wire protocol between the parent frame and the in-page bridge
//!
//! Every message after the handshake is a [`DesignBridgeEnvelope`]. Envelopes that do
//! not validate are treated as unrelated traffic and dropped; nothing in this module
//! reports them back to the parent.

pub mod snapshot;

pub use snapshot::{BridgeCapabilities, ElementBounds, ElementRect, ElementStyles};
pub use snapshot::{PreviewErrorInfo, PreviewErrorType, ReactSelectionContext};
pub use snapshot::{SelectionConfidence, SelectionFramework, SelectionMode, SelectionSnapshot};
pub use snapshot::css_property_name;

use crate::error::Result;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DESIGN_BRIDGE_PROTOCOL: &str = "wiblo.design-bridge.v1";

pub const DESIGN_BRIDGE_CONNECT_TYPE: &str = "BRIDGE_CONNECT";

pub const PARENT_COMMAND_TYPES: &[&str] = &[
    "DESIGN_MODE_SET_ENABLED",
    "DESIGN_MODE_SET_DISABLED",
    "SELECTION_HIGHLIGHT_SELECTOR",
    "SELECTION_APPLY_TEMP_STYLES",
    "SELECTION_CLEAR_TEMP_STYLES",
    "SELECTION_REQUEST_SNAPSHOT",
    "BRIDGE_DISPOSE",
];

pub const IFRAME_EVENT_TYPES: &[&str] = &[
    "BRIDGE_CONNECTED",
    "PREVIEW_READY",
    "ELEMENT_HOVERED",
    "ELEMENT_SELECTED",
    "ELEMENTS_SELECTED",
    "SELECTION_CONTEXT_ENRICHED",
    "PREVIEW_ERROR",
    "PREVIEW_ERROR_CLEAR",
    "BRIDGE_HEARTBEAT",
];

pub fn is_parent_command_type(value: &str) -> bool {
    PARENT_COMMAND_TYPES.contains(&value)
}

/// Versioned wrapper around every message exchanged over the bridge port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DesignBridgeEnvelope {
    pub protocol: String,
    pub session_id: String,
    pub message_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: Value,
}

impl DesignBridgeEnvelope {
    /// Wrap a typed message with a fresh message id and the current timestamp
    pub fn new(session_id: &str, message: &impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(message)?;
        let message_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = value
            .get("payload")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        Ok(Self {
            protocol: DESIGN_BRIDGE_PROTOCOL.to_string(),
            session_id: session_id.to_string(),
            message_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            message_type,
            payload,
        })
    }

    /// Validate an untyped message. Returns `None` for anything that is not a
    /// well-formed envelope of this protocol version.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        if record.get("protocol")?.as_str()? != DESIGN_BRIDGE_PROTOCOL {
            return None;
        }

        let payload = record.get("payload")?;
        if !payload.is_object() {
            return None;
        }

        Some(Self {
            protocol: DESIGN_BRIDGE_PROTOCOL.to_string(),
            session_id: record.get("sessionId")?.as_str()?.to_string(),
            message_id: record.get("messageId")?.as_str()?.to_string(),
            timestamp: record.get("timestamp")?.as_f64()? as i64,
            message_type: record.get("type")?.as_str()?.to_string(),
            payload: payload.clone(),
        })
    }

    /// Typed parent command carried by this envelope, if any
    pub fn command(&self) -> Option<ParentCommand> {
        if !is_parent_command_type(&self.message_type) {
            return None;
        }
        let tagged = serde_json::json!({ "type": self.message_type, "payload": self.payload });
        match serde_json::from_value(tagged) {
            Ok(command) => Some(command),
            Err(e) => {
                log::trace!("Dropping malformed {} payload: {}", self.message_type, e);
                None
            }
        }
    }

    /// Typed bridge event carried by this envelope, if any
    pub fn event(&self) -> Option<IframeEvent> {
        if !IFRAME_EVENT_TYPES.contains(&self.message_type.as_str()) {
            return None;
        }
        let tagged = serde_json::json!({ "type": self.message_type, "payload": self.payload });
        serde_json::from_value(tagged).ok()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// One-shot handshake posted on the window channel together with the bridge port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConnectBootstrap {
    pub protocol: String,
    pub session_id: String,
    pub session_token: String,
    pub timestamp: i64,
}

impl BridgeConnectBootstrap {
    pub fn new(session_id: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            protocol: DESIGN_BRIDGE_PROTOCOL.to_string(),
            session_id: session_id.into(),
            session_token: session_token.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        if record.get("type")?.as_str()? != DESIGN_BRIDGE_CONNECT_TYPE {
            return None;
        }
        if record.get("protocol")?.as_str()? != DESIGN_BRIDGE_PROTOCOL {
            return None;
        }

        Some(Self {
            protocol: DESIGN_BRIDGE_PROTOCOL.to_string(),
            session_id: record.get("sessionId")?.as_str()?.to_string(),
            session_token: record.get("sessionToken")?.as_str()?.to_string(),
            timestamp: record.get("timestamp")?.as_f64()? as i64,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": DESIGN_BRIDGE_CONNECT_TYPE,
            "protocol": self.protocol,
            "sessionId": self.session_id,
            "sessionToken": self.session_token,
            "timestamp": self.timestamp,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnableReason {
    Sidebar,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisableReason {
    Sidebar,
    Dispose,
}

/// Unrecognised values read as `None` instead of rejecting the whole command
fn lenient_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<Option<T>>(value).ok().flatten())
}

/// Parent → bridge commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentCommand {
    DesignModeSetEnabled {
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient_option"
        )]
        #[schemars(with = "Option<EnableReason>")]
        reason: Option<EnableReason>,
    },
    DesignModeSetDisabled {
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient_option"
        )]
        #[schemars(with = "Option<DisableReason>")]
        reason: Option<DisableReason>,
    },
    SelectionHighlightSelector {
        selector: Option<String>,
    },
    /// Style keys are camelCase (`backgroundColor`); non-string values are ignored
    SelectionApplyTempStyles {
        selector: String,
        styles: IndexMap<String, Value>,
    },
    SelectionClearTempStyles {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    SelectionRequestSnapshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    BridgeDispose {},
}

/// Bridge → parent events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IframeEvent {
    BridgeConnected {
        capabilities: BridgeCapabilities,
        #[serde(rename = "sessionToken")]
        session_token: String,
    },
    PreviewReady {
        capabilities: BridgeCapabilities,
    },
    ElementHovered {
        selection: Option<SelectionSnapshot>,
    },
    ElementSelected {
        selection: SelectionSnapshot,
    },
    ElementsSelected {
        selections: Vec<SelectionSnapshot>,
    },
    SelectionContextEnriched {
        selection: SelectionSnapshot,
        resolved: bool,
    },
    PreviewError {
        error: PreviewErrorInfo,
    },
    PreviewErrorClear {
        #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
        error_type: Option<PreviewErrorType>,
    },
    BridgeHeartbeat {
        #[serde(rename = "uptimeMs")]
        uptime_ms: u64,
        #[serde(rename = "designModeEnabled")]
        design_mode_enabled: bool,
        #[serde(rename = "selectionCount")]
        selection_count: usize,
    },
}

impl IframeEvent {
    /// Wire name of the event (`ELEMENT_SELECTED`, ...)
    pub fn type_name(&self) -> &'static str {
        match self {
            IframeEvent::BridgeConnected { .. } => "BRIDGE_CONNECTED",
            IframeEvent::PreviewReady { .. } => "PREVIEW_READY",
            IframeEvent::ElementHovered { .. } => "ELEMENT_HOVERED",
            IframeEvent::ElementSelected { .. } => "ELEMENT_SELECTED",
            IframeEvent::ElementsSelected { .. } => "ELEMENTS_SELECTED",
            IframeEvent::SelectionContextEnriched { .. } => "SELECTION_CONTEXT_ENRICHED",
            IframeEvent::PreviewError { .. } => "PREVIEW_ERROR",
            IframeEvent::PreviewErrorClear { .. } => "PREVIEW_ERROR_CLEAR",
            IframeEvent::BridgeHeartbeat { .. } => "BRIDGE_HEARTBEAT",
        }
    }
}

/// JSON Schema of every parent command
pub fn command_schema() -> schemars::Schema {
    schemars::schema_for!(ParentCommand)
}

/// JSON Schema of every bridge event
pub fn event_schema() -> schemars::Schema {
    schemars::schema_for!(IframeEvent)
}

/// JSON Schema of the envelope
pub fn envelope_schema() -> schemars::Schema {
    schemars::schema_for!(DesignBridgeEnvelope)
}
