//! Tokio host for [`BridgeAgent`]
//!
//! [`BridgeRuntime`] turns the agent's [`Effect`]s into real timers, a heartbeat interval,
//! an animation-frame tick and concurrent component-context lookups, and feeds their
//! completions back as [`BridgeInput`]s. Messages travel over a [`BridgePort`].

use crate::bridge::{BootstrapMessage, BridgeAgent, BridgeInput, Effect, TimerKind};
use crate::context::{ComponentContextProvider, ReactContextResolver};
use crate::dom::{HostDocument, NodeId};
use crate::error::{BridgeError, Result};
use crate::protocol::ReactSelectionContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Delay standing in for the next animation frame
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Duplex transport to the parent frame
#[async_trait]
pub trait BridgePort: Send {
    /// Next message from the other side, `None` once it hung up
    async fn recv(&mut self) -> Option<Value>;

    fn post(&mut self, message: Value) -> Result<()>;

    fn close(&mut self);
}

/// In-process [`BridgePort`] over unbounded tokio channels
#[derive(Debug)]
pub struct ChannelPort {
    tx: Option<mpsc::UnboundedSender<Value>>,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl ChannelPort {
    /// Two connected ends, like the ports of a `MessageChannel`
    pub fn pair() -> (Self, Self) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (Self { tx: Some(left_tx), rx: right_rx }, Self { tx: Some(right_tx), rx: left_rx })
    }

    /// Messages already delivered to this end
    pub fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

#[async_trait]
impl BridgePort for ChannelPort {
    async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    fn post(&mut self, message: Value) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(BridgeError::PortClosed)?;
        tx.send(message).map_err(|_| BridgeError::PortClosed)
    }

    fn close(&mut self) {
        self.tx = None;
        self.rx.close();
    }
}

type ContextFuture = BoxFuture<'static, (NodeId, Option<ReactSelectionContext>)>;

enum Wake {
    Input(Option<BridgeInput>),
    Port(Option<Value>),
    Context(NodeId, Option<ReactSelectionContext>),
    Timer(TimerKind),
    Heartbeat,
    Frame,
    Deadline,
}

/// Drives a [`BridgeAgent`] on the current tokio runtime
pub struct BridgeRuntime<D, P, T>
where
    D: HostDocument,
    P: ComponentContextProvider + 'static,
    T: BridgePort,
{
    agent: BridgeAgent<D>,
    resolver: ReactContextResolver<P>,
    port: Option<T>,
    pending_port: Option<T>,
    timers: HashMap<TimerKind, Instant>,
    heartbeat: Option<Interval>,
    frame_at: Option<Instant>,
    lookups: FuturesUnordered<ContextFuture>,
    listening: bool,
    observed_shadow_root: Option<NodeId>,
}

impl<D, P, T> BridgeRuntime<D, P, T>
where
    D: HostDocument,
    P: ComponentContextProvider + 'static,
    T: BridgePort,
{
    /// Wrap an agent and run its startup checks
    pub fn new(agent: BridgeAgent<D>, provider: P) -> Self {
        let mut runtime = Self {
            agent,
            resolver: ReactContextResolver::new(provider),
            port: None,
            pending_port: None,
            timers: HashMap::new(),
            heartbeat: None,
            frame_at: None,
            lookups: FuturesUnordered::new(),
            listening: false,
            observed_shadow_root: None,
        };

        let effects = runtime.agent.start();
        runtime.apply(effects, Instant::now());
        runtime
    }

    pub fn agent(&self) -> &BridgeAgent<D> {
        &self.agent
    }

    pub fn document_mut(&mut self) -> &mut D {
        self.agent.document_mut()
    }

    pub fn has_port(&self) -> bool {
        self.port.is_some()
    }

    /// Whether interaction listeners are attached
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn observed_shadow_root(&self) -> Option<NodeId> {
        self.observed_shadow_root
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Deliver a handshake together with the port it transfers. An unadopted port is dropped.
    pub fn bootstrap(&mut self, mut message: BootstrapMessage, port: Option<T>) -> bool {
        message.port_count = usize::from(port.is_some());
        self.pending_port = port;
        let consumed = self.dispatch(BridgeInput::Bootstrap(message));
        self.pending_port = None;
        consumed
    }

    /// Feed one input. Returns true when the originating event must be consumed.
    pub fn dispatch(&mut self, input: BridgeInput) -> bool {
        let now = Instant::now();
        if let BridgeInput::TimerFired(kind) = &input {
            self.timers.remove(kind);
        }
        let effects = self.agent.handle(input, now.into_std());
        self.apply(effects, now)
    }

    /// Process inputs until the channel closes or the agent is torn down
    pub async fn run(&mut self, mut inputs: mpsc::UnboundedReceiver<BridgeInput>) {
        while !self.agent.is_torn_down() {
            match self.next_wake(Some(&mut inputs), None).await {
                Wake::Input(None) => break,
                wake => self.on_wake(wake),
            }
        }

        if !self.agent.is_torn_down() {
            self.dispatch(BridgeInput::Teardown);
        }
    }

    /// Serve port messages, timers and lookups for `duration`
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            match self.next_wake(None, Some(deadline)).await {
                Wake::Deadline => break,
                wake => self.on_wake(wake),
            }
        }
    }

    async fn next_wake(
        &mut self,
        inputs: Option<&mut mpsc::UnboundedReceiver<BridgeInput>>,
        deadline: Option<Instant>,
    ) -> Wake {
        let next_timer = self
            .timers
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(kind, at)| (*kind, *at));

        tokio::select! {
            biased;
            input = recv_input(inputs) => Wake::Input(input),
            message = recv_port(self.port.as_mut()) => Wake::Port(message),
            Some((node, context)) = self.lookups.next(), if !self.lookups.is_empty() => {
                Wake::Context(node, context)
            }
            kind = fire_timer(next_timer) => Wake::Timer(kind),
            _ = tick(self.heartbeat.as_mut()) => Wake::Heartbeat,
            _ = sleep_until(self.frame_at) => Wake::Frame,
            _ = sleep_until(deadline) => Wake::Deadline,
        }
    }

    fn on_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Input(Some(input)) => {
                self.dispatch(input);
            }
            Wake::Port(Some(message)) => {
                self.dispatch(BridgeInput::PortMessage(message));
            }
            Wake::Port(None) => {
                log::debug!("Parent hung up the bridge port");
                self.port = None;
                self.dispatch(BridgeInput::PortClosed);
            }
            Wake::Context(node, context) => {
                self.dispatch(BridgeInput::ContextResolved { node, context });
            }
            Wake::Timer(kind) => {
                self.dispatch(BridgeInput::TimerFired(kind));
            }
            Wake::Heartbeat => {
                self.dispatch(BridgeInput::HeartbeatTick);
            }
            Wake::Frame => {
                self.frame_at = None;
                self.dispatch(BridgeInput::AnimationFrame);
            }
            Wake::Input(None) | Wake::Deadline => {}
        }
    }

    fn apply(&mut self, effects: Vec<Effect>, now: Instant) -> bool {
        let mut consumed = false;

        for effect in effects {
            match effect {
                Effect::Post(envelope) => {
                    let Some(port) = self.port.as_mut() else {
                        log::warn!("No port to post {}", envelope.message_type);
                        continue;
                    };
                    if let Err(e) = envelope.to_value().and_then(|value| port.post(value)) {
                        log::warn!("Failed to post {}: {}", envelope.message_type, e);
                    }
                }
                Effect::AdoptPort => self.port = self.pending_port.take(),
                Effect::ClosePort => {
                    if let Some(mut port) = self.port.take() {
                        port.close();
                    }
                }
                Effect::ScheduleTimer { kind, delay } => {
                    self.timers.insert(kind, now + delay);
                }
                Effect::CancelTimer(kind) => {
                    self.timers.remove(&kind);
                }
                Effect::StartHeartbeat(period) => {
                    let mut interval = tokio::time::interval_at(now + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.heartbeat = Some(interval);
                }
                Effect::StopHeartbeat => self.heartbeat = None,
                Effect::AttachInteractionListeners => self.listening = true,
                Effect::DetachInteractionListeners => self.listening = false,
                Effect::RequestAnimationFrame => self.frame_at = Some(now + FRAME_INTERVAL),
                Effect::CancelAnimationFrame => self.frame_at = None,
                Effect::ResolveContext { node, is_next_project } => {
                    let lookup = self.resolver.resolve(node, is_next_project);
                    self.lookups.push(async move { (node, lookup.await) }.boxed());
                }
                Effect::EvictContextCache => {
                    self.resolver.evict_disconnected(self.agent.document())
                }
                Effect::ObserveShadowRoot(shadow_root) => {
                    self.observed_shadow_root = Some(shadow_root)
                }
                Effect::DisconnectShadowObserver => self.observed_shadow_root = None,
                Effect::ConsumeEvent => consumed = true,
            }
        }

        consumed
    }
}

async fn recv_input(
    inputs: Option<&mut mpsc::UnboundedReceiver<BridgeInput>>,
) -> Option<BridgeInput> {
    match inputs {
        Some(inputs) => inputs.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_port<T: BridgePort>(port: Option<&mut T>) -> Option<Value> {
    match port {
        Some(port) => port.recv().await,
        None => std::future::pending().await,
    }
}

async fn fire_timer(next: Option<(TimerKind, Instant)>) -> TimerKind {
    match next {
        Some((kind, at)) => {
            tokio::time::sleep_until(at).await;
            kind
        }
        None => std::future::pending().await,
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
