//! # design-bridge
//!
//! An in-page design-selection bridge: a page embedded in an editor frame lets the user pick
//! elements visually, and the editor drives it over a versioned, session-scoped message protocol.
//!
//! ## Features
//!
//! - **Selection**: point and drag multi-select with overlay filtering and transform-aware geometry
//! - **Snapshots**: selector, geometry, computed styles and component source context per element
//! - **Freeze**: pauses animations and pins `:hover`/`:focus` looks while dragging
//! - **Error channel**: forwards runtime errors, unhandled rejections and the Next.js error overlay
//! - **Runtime**: a tokio host that executes the agent's effects (feature `runtime`)
//!
//! ## Driving the agent
//!
//! [`BridgeAgent`] performs no I/O. Feed it [`BridgeInput`]s and apply the returned
//! [`Effect`]s, or let [`runtime::BridgeRuntime`] do it:
//!
//! ```rust,no_run
//! use design_bridge::{BridgeAgent, BridgeInput, BridgeOptions, DomTree, ElementNode};
//! use design_bridge::bridge::BootstrapMessage;
//! use design_bridge::protocol::BridgeConnectBootstrap;
//! use std::time::Instant;
//!
//! let page = DomTree::new(
//!     ElementNode::new("body")
//!         .with_child(ElementNode::new("h1").with_bounding_box(0.0, 0.0, 200.0, 40.0)),
//! );
//! let mut agent = BridgeAgent::new(page, BridgeOptions::default(), Instant::now());
//!
//! let handshake = BridgeConnectBootstrap::new("session-1", "token").to_value();
//! let effects = agent.handle(
//!     BridgeInput::Bootstrap(BootstrapMessage::from_parent(handshake, "https://editor.example")),
//!     Instant::now(),
//! );
//! println!("{} effects", effects.len());
//! ```
//!
//! ## Module Overview
//!
//! - [`dom`]: host document interface and the in-memory [`DomTree`]
//! - [`engine`]: classification, hit testing, geometry, snapshots and caches
//! - [`context`]: component source context resolution
//! - [`freeze`]: animation and pseudo-state freezing
//! - [`overlay`]: hover, selection and drag highlights
//! - [`protocol`]: envelope, commands, events and JSON schemas
//! - [`bridge`]: the agent state machine
//! - [`config`]: [`BridgeOptions`]
//! - [`error`]: error types and result alias

pub mod bridge;
pub mod config;
pub mod context;
pub mod dom;
pub mod engine;
pub mod error;
pub mod freeze;
pub mod overlay;
pub mod protocol;

#[cfg(feature = "runtime")]
pub mod runtime;

pub use bridge::{BridgeAgent, BridgeInput, Effect, TimerKind};
pub use config::BridgeOptions;
pub use context::{ComponentContextProvider, NoopContextProvider, ReactContextResolver};
pub use dom::{DomTree, ElementNode, HostDocument, NodeId, Rect};
pub use error::{BridgeError, Result};
pub use protocol::{DesignBridgeEnvelope, IframeEvent, ParentCommand, SelectionSnapshot};

#[cfg(feature = "runtime")]
pub use runtime::{BridgePort, BridgeRuntime, ChannelPort};
