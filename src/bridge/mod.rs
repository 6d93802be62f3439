//! Bridge agent
//!
//! [`BridgeAgent`] is the in-page state machine. It never performs I/O: every call takes a
//! [`BridgeInput`] plus the current instant and returns the [`Effect`]s the host must carry
//! out (posting envelopes, arming timers, attaching listeners, resolving component context).
//! Document reads and writes go straight through the agent's
//! [`HostDocument`](crate::dom::HostDocument).

pub mod agent;
pub mod errors;
pub mod hover;
pub mod pointer;
pub mod session;
pub mod temp_styles;

pub use agent::BridgeAgent;
pub use errors::{ErrorReporter, OverlayCheck, OverlayDetector, PortalAction};
pub use errors::{RejectionReason, RuntimeErrorEvent};
pub use hover::HoverThrottle;
pub use pointer::{PointerInput, PointerState};
pub use session::{BootstrapMessage, BootstrapRejection, Session};
pub use temp_styles::TempStyleMemory;

use crate::dom::NodeId;
use crate::protocol::{DesignBridgeEnvelope, ReactSelectionContext};
use serde_json::Value;
use std::time::Duration;

/// One-shot timers owned by the agent; each kind has a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    HoverFlush,
    PortalPoll,
}

/// Everything the host feeds into the agent
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeInput {
    /// Window `message` event that may carry the handshake
    Bootstrap(BootstrapMessage),
    /// Message received on the adopted port
    PortMessage(Value),
    /// The adopted port failed to deserialize a message
    PortMessageError,
    /// The parent hung up the adopted port
    PortClosed,
    PointerDown(PointerInput),
    PointerMove(PointerInput),
    PointerUp(PointerInput),
    PointerCancel { pointer_id: i64 },
    Click,
    ContextMenu,
    TimerFired(TimerKind),
    HeartbeatTick,
    AnimationFrame,
    /// Child-list or attribute change below `<body>`
    DomMutated,
    Scrolled,
    Resized,
    /// Change inside the observed framework portal shadow root
    ShadowRootMutated,
    DocumentLoaded,
    RuntimeError(RuntimeErrorEvent),
    UnhandledRejection(RejectionReason),
    /// Outcome of an earlier [`Effect::ResolveContext`]
    ContextResolved { node: NodeId, context: Option<ReactSelectionContext> },
    /// The host is unmounting the bridge
    Teardown,
}

/// Side effects requested by the agent, to be applied in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send an envelope over the adopted port
    Post(DesignBridgeEnvelope),
    /// Take ownership of the first port transferred with the bootstrap
    AdoptPort,
    /// Stop listening on the current port and close it
    ClosePort,
    /// Arm (or re-arm) the timer slot
    ScheduleTimer { kind: TimerKind, delay: Duration },
    CancelTimer(TimerKind),
    /// Deliver [`BridgeInput::HeartbeatTick`] at this interval, replacing any running heartbeat
    StartHeartbeat(Duration),
    StopHeartbeat,
    /// Capture-phase pointer, click and context-menu listeners plus the mutation, scroll and
    /// resize observers feeding cache invalidation
    AttachInteractionListeners,
    DetachInteractionListeners,
    RequestAnimationFrame,
    CancelAnimationFrame,
    /// Resolve component context and answer with [`BridgeInput::ContextResolved`]
    ResolveContext { node: NodeId, is_next_project: bool },
    /// Drop cached context lookups of nodes that left the document
    EvictContextCache,
    ObserveShadowRoot(NodeId),
    DisconnectShadowObserver,
    /// Prevent the default action of the current event and stop its propagation
    ConsumeEvent,
}
