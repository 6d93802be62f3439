use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised by the design bridge library
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A CSS selector could not be parsed
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A node handle does not belong to the document
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The document description could not be parsed
    #[error("Failed to parse document: {0}")]
    DocumentParseFailed(String),

    /// A transform string could not be interpreted
    #[error("Invalid transform '{0}'")]
    InvalidTransform(String),

    /// The duplex transport is closed
    #[error("Bridge port closed")]
    PortClosed,

    /// The component instrumentation failed to answer
    #[error("Context resolution failed: {0}")]
    ContextResolutionFailed(String),

    /// Invalid bridge options
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization failure
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, BridgeError>;
