use crate::bridge::errors::{ErrorReporter, OverlayCheck, OverlayDetector, PortalAction};
use crate::bridge::hover::HoverThrottle;
use crate::bridge::pointer::{PointerInput, PointerState};
use crate::bridge::session::{BootstrapMessage, Session};
use crate::bridge::temp_styles::TempStyleMemory;
use crate::bridge::{BridgeInput, Effect, TimerKind};
use crate::config::BridgeOptions;
use crate::context::is_next_project;
use crate::dom::{HostDocument, NodeId};
use crate::engine::{InvalidationCause, SelectionCacheInvalidation, SelectionCaches};
use crate::engine::{create_selection_snapshot, element_at_position, elements_in_drag};
use crate::engine::is_valid_selectable_element;
use crate::freeze::{AnimationFreeze, PseudoStateFreeze};
use crate::overlay::HighlightRenderer;
use crate::protocol::{BridgeCapabilities, DesignBridgeEnvelope, IframeEvent, ParentCommand};
use crate::protocol::{PreviewErrorInfo, PreviewErrorType, ReactSelectionContext};
use crate::protocol::{SelectionMode, SelectionSnapshot, is_parent_command_type};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

const CROSSHAIR_CURSOR: &str = "crosshair";

/// In-page design-selection agent.
///
/// Owns the document it drives, the overlay renderer and all selection state. The host
/// delivers [`BridgeInput`]s and applies the returned [`Effect`]s.
pub struct BridgeAgent<D: HostDocument> {
    doc: D,
    options: BridgeOptions,
    capabilities: BridgeCapabilities,
    renderer: Option<HighlightRenderer>,
    session: Session,

    design_mode_enabled: bool,
    listeners_attached: bool,
    heartbeat_running: bool,
    torn_down: bool,

    selected: Vec<NodeId>,
    snapshots: Vec<SelectionSnapshot>,
    enriched: HashMap<NodeId, ReactSelectionContext>,
    /// Snapshot each outstanding context lookup was started for
    enrichment_requests: HashMap<NodeId, SelectionSnapshot>,

    hovered: Option<NodeId>,
    hover: HoverThrottle,
    pointer: PointerState,

    freeze_active: bool,
    pseudo_freeze: PseudoStateFreeze,
    animation_freeze: AnimationFreeze,

    caches: SelectionCaches,
    invalidation: SelectionCacheInvalidation,
    temp_styles: TempStyleMemory,
    errors: ErrorReporter,
    overlay: OverlayDetector,
}

impl<D: HostDocument> BridgeAgent<D> {
    /// Mount the overlay into `doc` and start in the disconnected state
    pub fn new(mut doc: D, options: BridgeOptions, now: Instant) -> Self {
        let renderer = HighlightRenderer::mount(&mut doc);
        let capabilities = BridgeCapabilities {
            supports_react_context: options.supports_react_context,
            ..BridgeCapabilities::default()
        };

        Self {
            doc,
            capabilities,
            renderer: Some(renderer),
            session: Session::new(now),
            design_mode_enabled: false,
            listeners_attached: false,
            heartbeat_running: false,
            torn_down: false,
            selected: Vec::new(),
            snapshots: Vec::new(),
            enriched: HashMap::new(),
            enrichment_requests: HashMap::new(),
            hovered: None,
            hover: HoverThrottle::new(options.hover_interval),
            pointer: PointerState::default(),
            freeze_active: false,
            pseudo_freeze: PseudoStateFreeze::new(),
            animation_freeze: AnimationFreeze::new(),
            caches: SelectionCaches::new(options.visibility_cache_ttl, options.bounds_cache_ttl),
            invalidation: SelectionCacheInvalidation::new(),
            temp_styles: TempStyleMemory::new(),
            errors: ErrorReporter::new(),
            overlay: OverlayDetector::new(
                options.portal_poll_interval,
                options.portal_poll_attempts,
            ),
            options,
        }
    }

    /// Look for the framework error portal and run a first overlay check
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.observe_portal(&mut effects);
        self.check_error_overlay(&mut effects);
        effects
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_design_mode_enabled(&self) -> bool {
        self.design_mode_enabled
    }

    pub fn is_freeze_active(&self) -> bool {
        self.freeze_active
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn selected_elements(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn selected_snapshots(&self) -> &[SelectionSnapshot] {
        &self.snapshots
    }

    pub fn hovered_element(&self) -> Option<NodeId> {
        self.hovered
    }

    /// Elements under the current drag rectangle
    pub fn drag_selected_elements(&self) -> &[NodeId] {
        self.pointer.drag_selected()
    }

    pub fn temp_styles(&self) -> &TempStyleMemory {
        &self.temp_styles
    }

    pub fn renderer(&self) -> Option<&HighlightRenderer> {
        self.renderer.as_ref()
    }

    /// Process one input
    pub fn handle(&mut self, input: BridgeInput, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.torn_down {
            log::trace!("Ignoring {:?} after teardown", input);
            return effects;
        }

        match input {
            BridgeInput::Bootstrap(message) => self.handle_bootstrap(&message, now, &mut effects),
            BridgeInput::PortMessage(data) => self.handle_port_message(&data, now, &mut effects),
            BridgeInput::PortMessageError => self.emit_preview_error(
                PreviewErrorInfo::new(PreviewErrorType::Runtime, "Bridge port message error"),
                &mut effects,
            ),
            BridgeInput::PortClosed => self.on_port_closed(&mut effects),
            BridgeInput::PointerDown(pointer) => self.on_pointer_down(&pointer, &mut effects),
            BridgeInput::PointerMove(pointer) => self.on_pointer_move(&pointer, now, &mut effects),
            BridgeInput::PointerUp(pointer) => self.on_pointer_up(&pointer, now, &mut effects),
            BridgeInput::PointerCancel { pointer_id } => {
                if self.pointer.is_tracking(pointer_id) {
                    self.reset_pointer_state();
                }
            }
            BridgeInput::Click | BridgeInput::ContextMenu => {
                if self.design_mode_enabled {
                    effects.push(Effect::ConsumeEvent);
                }
            }
            BridgeInput::TimerFired(TimerKind::HoverFlush) => self.flush_hover(now, &mut effects),
            BridgeInput::TimerFired(TimerKind::PortalPoll) => self.observe_portal(&mut effects),
            BridgeInput::HeartbeatTick => self.send_heartbeat(now, &mut effects),
            BridgeInput::AnimationFrame => self.run_invalidation_frame(now, &mut effects),
            BridgeInput::DomMutated => {
                self.request_invalidation(InvalidationCause::Mutation, &mut effects);
                self.observe_portal(&mut effects);
                self.check_error_overlay(&mut effects);
            }
            BridgeInput::Scrolled => {
                self.request_invalidation(InvalidationCause::Scroll, &mut effects)
            }
            BridgeInput::Resized => {
                self.request_invalidation(InvalidationCause::Resize, &mut effects)
            }
            BridgeInput::ShadowRootMutated | BridgeInput::DocumentLoaded => {
                self.check_error_overlay(&mut effects)
            }
            BridgeInput::RuntimeError(event) => {
                self.emit_preview_error(event.into_error_info(), &mut effects)
            }
            BridgeInput::UnhandledRejection(reason) => {
                self.emit_preview_error(reason.into_error_info(), &mut effects)
            }
            BridgeInput::ContextResolved { node, context } => {
                self.apply_context(node, context, &mut effects)
            }
            BridgeInput::Teardown => self.teardown(&mut effects),
        }

        effects
    }

    // ---- session ----

    fn handle_bootstrap(
        &mut self,
        message: &BootstrapMessage,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let accepted = match self.session.accept(message, now) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                log::debug!("Bootstrap rejected: {:?}", rejection);
                return;
            }
        };

        if accepted.replaced_port {
            effects.push(Effect::ClosePort);
        }
        effects.push(Effect::AdoptPort);
        log::info!("Design bridge connected (session {})", accepted.bootstrap.session_id);

        self.send(
            IframeEvent::BridgeConnected {
                capabilities: self.capabilities.clone(),
                session_token: accepted.bootstrap.session_token,
            },
            effects,
        );
        self.heartbeat_running = true;
        effects.push(Effect::StartHeartbeat(self.options.heartbeat_interval));
    }

    fn handle_port_message(&mut self, data: &Value, now: Instant, effects: &mut Vec<Effect>) {
        let Some(envelope) = DesignBridgeEnvelope::from_value(data) else {
            log::trace!("Dropping non-envelope port message");
            return;
        };
        if !is_parent_command_type(&envelope.message_type) {
            return;
        }
        if !self.session.owns(&envelope.session_id) {
            log::trace!(
                "Ignoring {} for foreign session {}",
                envelope.message_type,
                envelope.session_id
            );
            return;
        }
        if let Some(command) = envelope.command() {
            self.handle_command(command, now, effects);
        }
    }

    fn send(&self, event: IframeEvent, effects: &mut Vec<Effect>) {
        let connected = self.session.is_connected();
        let Some(session_id) = self.session.session_id().filter(|_| connected) else {
            log::trace!("Not connected, dropping {}", event.type_name());
            return;
        };

        match DesignBridgeEnvelope::new(session_id, &event) {
            Ok(envelope) => effects.push(Effect::Post(envelope)),
            Err(e) => log::warn!("Failed to encode {}: {}", event.type_name(), e),
        }
    }

    fn send_heartbeat(&self, now: Instant, effects: &mut Vec<Effect>) {
        if !self.heartbeat_running {
            return;
        }
        self.send(
            IframeEvent::BridgeHeartbeat {
                uptime_ms: self.session.uptime(now).as_millis() as u64,
                design_mode_enabled: self.design_mode_enabled,
                selection_count: self.snapshots.len(),
            },
            effects,
        );
    }

    fn stop_heartbeat(&mut self, effects: &mut Vec<Effect>) {
        if std::mem::take(&mut self.heartbeat_running) {
            effects.push(Effect::StopHeartbeat);
        }
    }

    fn on_port_closed(&mut self, effects: &mut Vec<Effect>) {
        if !self.session.release_port() {
            return;
        }
        log::info!("Bridge port closed by the parent");
        self.stop_heartbeat(effects);
    }

    // ---- commands ----

    fn handle_command(&mut self, command: ParentCommand, now: Instant, effects: &mut Vec<Effect>) {
        log::debug!("Handling command {:?}", command);

        match command {
            ParentCommand::DesignModeSetEnabled { .. } => {
                self.set_design_mode_enabled(true, effects)
            }
            ParentCommand::DesignModeSetDisabled { .. } => {
                self.set_design_mode_enabled(false, effects)
            }
            ParentCommand::SelectionHighlightSelector { selector } => {
                let Some(selector) = selector.filter(|selector| !selector.is_empty()) else {
                    self.clear_selection_state();
                    self.render_hover(None);
                    return;
                };

                match self.element_from_selector(&selector, now) {
                    Some(element) => {
                        self.select_elements(vec![element], SelectionMode::Point, now, effects)
                    }
                    None => self.clear_selection_state(),
                }
            }
            ParentCommand::SelectionApplyTempStyles { selector, styles } => {
                self.apply_temp_styles(&selector, &styles, now);
            }
            ParentCommand::SelectionClearTempStyles { selector } => {
                match selector.filter(|s| !s.is_empty()) {
                    Some(selector) => {
                        if let Some(element) = self.element_from_selector(&selector, now) {
                            self.temp_styles.restore(&mut self.doc, element);
                        }
                    }
                    None => self.temp_styles.restore_all(&mut self.doc),
                }
            }
            ParentCommand::SelectionRequestSnapshot { selector } => {
                if let Some(selector) = selector.filter(|s| !s.is_empty()) {
                    if let Some(element) = self.element_from_selector(&selector, now) {
                        let selection = self.snapshot_for(element, SelectionMode::Point, now);
                        self.send(IframeEvent::ElementSelected { selection }, effects);
                    }
                    return;
                }
                self.send_current_selection(effects);
            }
            ParentCommand::BridgeDispose {} => {
                self.set_design_mode_enabled(false, effects);
                if self.session.dispose() {
                    effects.push(Effect::ClosePort);
                }
                self.stop_heartbeat(effects);
                log::info!("Design bridge disposed");
            }
        }
    }

    fn set_design_mode_enabled(&mut self, enabled: bool, effects: &mut Vec<Effect>) {
        if enabled == self.design_mode_enabled {
            if enabled {
                let capabilities = self.capabilities.clone();
                self.send(IframeEvent::PreviewReady { capabilities }, effects);
            }
            return;
        }

        self.design_mode_enabled = enabled;
        let body = self.doc.body();

        if enabled {
            self.doc.set_inline_style(body, "cursor", CROSSHAIR_CURSOR);
            self.attach_listeners(effects);
            let capabilities = self.capabilities.clone();
            self.send(IframeEvent::PreviewReady { capabilities }, effects);
            log::debug!("Design mode enabled");
            return;
        }

        self.doc.remove_inline_style(body, "cursor");
        self.detach_listeners(effects);

        if self.hover.cancel() {
            effects.push(Effect::CancelTimer(TimerKind::HoverFlush));
        }
        self.hovered = None;
        self.hover.forget_last_selector();
        self.render_hover(None);
        self.render_drag_rect();

        self.reset_pointer_state();
        self.clear_selection_state();
        self.temp_styles.restore_all(&mut self.doc);
        log::debug!("Design mode disabled");
    }

    fn attach_listeners(&mut self, effects: &mut Vec<Effect>) {
        if self.listeners_attached {
            return;
        }
        self.listeners_attached = true;
        self.invalidation.attach();
        effects.push(Effect::AttachInteractionListeners);
    }

    fn detach_listeners(&mut self, effects: &mut Vec<Effect>) {
        if !std::mem::take(&mut self.listeners_attached) {
            return;
        }
        effects.push(Effect::DetachInteractionListeners);
        if self.invalidation.detach() {
            effects.push(Effect::CancelAnimationFrame);
        }
    }

    fn element_from_selector(&mut self, selector: &str, now: Instant) -> Option<NodeId> {
        let element = match self.doc.query_selector(selector) {
            Ok(element) => element?,
            Err(e) => {
                log::debug!("{}", e);
                return None;
            }
        };
        is_valid_selectable_element(&self.doc, &mut self.caches, element, now).then_some(element)
    }

    fn apply_temp_styles(
        &mut self,
        selector: &str,
        styles: &IndexMap<String, Value>,
        now: Instant,
    ) {
        match self.element_from_selector(selector, now) {
            Some(element) => self.temp_styles.apply(&mut self.doc, element, styles),
            None => log::debug!("No selectable element for temp styles on '{}'", selector),
        }
    }

    fn send_current_selection(&self, effects: &mut Vec<Effect>) {
        match self.snapshots.as_slice() {
            [] => {}
            [selection] => {
                let selection = selection.clone();
                self.send(IframeEvent::ElementSelected { selection }, effects)
            }
            selections => {
                let selections = selections.to_vec();
                self.send(IframeEvent::ElementsSelected { selections }, effects)
            }
        }
    }

    // ---- selection ----

    fn snapshot_for(
        &mut self,
        node: NodeId,
        mode: SelectionMode,
        now: Instant,
    ) -> SelectionSnapshot {
        let context = self.enriched.get(&node).cloned();
        create_selection_snapshot(&mut self.doc, &mut self.caches, node, mode, context, now)
    }

    fn select_elements(
        &mut self,
        elements: Vec<NodeId>,
        mode: SelectionMode,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let mut unique: Vec<NodeId> = Vec::with_capacity(elements.len());
        for element in elements {
            if !is_valid_selectable_element(&self.doc, &mut self.caches, element, now) {
                continue;
            }
            if !unique.contains(&element) {
                unique.push(element);
            }
        }

        let mut snapshots = Vec::with_capacity(unique.len());
        for element in &unique {
            snapshots.push(self.snapshot_for(*element, mode, now));
        }
        self.selected = unique;
        self.snapshots = snapshots;

        self.render_selection();
        self.render_hover(None);

        self.hovered = None;
        self.hover.forget_last_selector();
        self.queue_hover(None, now, effects);

        if self.snapshots.is_empty() {
            return;
        }
        log::debug!("Selected {} element(s) by {:?}", self.snapshots.len(), mode);
        self.send_current_selection(effects);

        let is_next = is_next_project(&self.doc);
        for (element, snapshot) in self.selected.iter().zip(&self.snapshots) {
            self.enrichment_requests.insert(*element, snapshot.clone());
            effects.push(Effect::ResolveContext { node: *element, is_next_project: is_next });
        }
    }

    fn apply_context(
        &mut self,
        node: NodeId,
        context: Option<ReactSelectionContext>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(snapshot) = self.enrichment_requests.remove(&node) else {
            log::trace!("Unsolicited context for {:?}", node);
            return;
        };
        let Some(index) = self.selected.iter().position(|selected| *selected == node) else {
            log::trace!("Discarding context for deselected {:?}", node);
            return;
        };

        let Some(context) = context else {
            self.send(
                IframeEvent::SelectionContextEnriched { selection: snapshot, resolved: false },
                effects,
            );
            return;
        };

        self.enriched.insert(node, context.clone());
        let enriched = SelectionSnapshot { react_context: Some(context), ..snapshot };
        self.snapshots[index] = enriched.clone();
        self.render_selection();

        self.send(
            IframeEvent::SelectionContextEnriched { selection: enriched, resolved: true },
            effects,
        );
    }

    fn clear_selection_state(&mut self) {
        self.selected.clear();
        self.snapshots.clear();
        self.render_selection();
    }

    fn update_selections_from_elements(&mut self, now: Instant) {
        let modes: HashMap<NodeId, SelectionMode> = self
            .selected
            .iter()
            .zip(&self.snapshots)
            .map(|(element, snapshot)| (*element, snapshot.selection_mode))
            .collect();

        let elements: Vec<NodeId> = std::mem::take(&mut self.selected)
            .into_iter()
            .filter(|element| {
                is_valid_selectable_element(&self.doc, &mut self.caches, *element, now)
            })
            .collect();

        let mut snapshots = Vec::with_capacity(elements.len());
        for element in &elements {
            let mode = modes.get(element).copied().unwrap_or_default();
            snapshots.push(self.snapshot_for(*element, mode, now));
        }
        self.selected = elements;
        self.snapshots = snapshots;
        self.render_selection();
    }

    // ---- hover ----

    fn queue_hover(
        &mut self,
        snapshot: Option<SelectionSnapshot>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if let Some(delay) = self.hover.queue(snapshot, now) {
            effects.push(Effect::ScheduleTimer { kind: TimerKind::HoverFlush, delay });
        }
    }

    fn flush_hover(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if !self.hover.is_armed() {
            return;
        }
        if let Some(selection) = self.hover.flush(now) {
            self.send(IframeEvent::ElementHovered { selection }, effects);
        }
    }

    // ---- pointer ----

    fn on_pointer_down(&mut self, pointer: &PointerInput, effects: &mut Vec<Effect>) {
        if !self.design_mode_enabled || pointer.button != 0 {
            return;
        }

        self.pointer.press(pointer);
        self.render_drag_rect();
        effects.push(Effect::ConsumeEvent);
    }

    fn on_pointer_move(&mut self, pointer: &PointerInput, now: Instant, effects: &mut Vec<Effect>) {
        if !self.design_mode_enabled {
            return;
        }

        if self.pointer.is_active(pointer.pointer_id) {
            if self.pointer.move_to(pointer.x, pointer.y, self.options.drag_threshold_px) {
                log::debug!("Drag selection started");
                self.enable_selection_freeze();
            }
            if self.pointer.is_dragging() {
                self.update_drag_preview(now);
            }
            effects.push(Effect::ConsumeEvent);
            return;
        }

        let element = element_at_position(&self.doc, &mut self.caches, pointer.x, pointer.y, now);
        let element = match element {
            Some(element) if !self.selected.contains(&element) => element,
            _ => {
                if self.hovered.take().is_some() {
                    self.render_hover(None);
                    self.queue_hover(None, now, effects);
                }
                return;
            }
        };

        if self.hovered == Some(element) {
            return;
        }
        self.hovered = Some(element);

        let snapshot = self.snapshot_for(element, SelectionMode::Point, now);
        self.render_hover(Some(&snapshot));
        self.queue_hover(Some(snapshot), now, effects);
    }

    fn on_pointer_up(&mut self, pointer: &PointerInput, now: Instant, effects: &mut Vec<Effect>) {
        if !self.design_mode_enabled || !self.pointer.is_tracking(pointer.pointer_id) {
            return;
        }
        effects.push(Effect::ConsumeEvent);

        if self.pointer.is_dragging() {
            let dragged = self.pointer.drag_selected().to_vec();
            self.reset_pointer_state();
            self.select_elements(dragged, SelectionMode::Drag, now, effects);
            return;
        }

        let element = element_at_position(&self.doc, &mut self.caches, pointer.x, pointer.y, now);
        self.reset_pointer_state();
        if let Some(element) = element {
            self.select_elements(vec![element], SelectionMode::Point, now, effects);
        }
    }

    fn update_drag_preview(&mut self, now: Instant) {
        let Some(rect) = self.pointer.drag_rect() else {
            return;
        };
        if let Some(renderer) = &self.renderer {
            renderer.set_drag_rect(&mut self.doc, Some(rect));
        }

        let elements = elements_in_drag(&self.doc, &mut self.caches, rect, now);
        let mut snapshots = Vec::with_capacity(elements.len());
        for element in &elements {
            snapshots.push(self.snapshot_for(*element, SelectionMode::Drag, now));
        }
        self.pointer.set_drag_selected(elements);

        if let Some(renderer) = &mut self.renderer {
            renderer.set_selection(&mut self.doc, &snapshots);
        }
    }

    fn reset_pointer_state(&mut self) {
        self.pointer.reset();
        self.render_drag_rect();
        self.disable_selection_freeze();
    }

    fn enable_selection_freeze(&mut self) {
        if self.freeze_active {
            return;
        }
        self.pseudo_freeze.enable(&mut self.doc);
        self.animation_freeze.freeze_global(&mut self.doc);
        self.freeze_active = true;
    }

    fn disable_selection_freeze(&mut self) {
        if !self.freeze_active {
            return;
        }
        self.pseudo_freeze.disable(&mut self.doc);
        self.animation_freeze.unfreeze_global(&mut self.doc);
        self.freeze_active = false;
    }

    // ---- rendering ----

    fn render_selection(&mut self) {
        if let Some(renderer) = &mut self.renderer {
            renderer.set_selection(&mut self.doc, &self.snapshots);
        }
    }

    fn render_hover(&mut self, snapshot: Option<&SelectionSnapshot>) {
        if let Some(renderer) = &self.renderer {
            renderer.set_hover(&mut self.doc, snapshot);
        }
    }

    /// Hide the drag rectangle
    fn render_drag_rect(&mut self) {
        if let Some(renderer) = &self.renderer {
            renderer.set_drag_rect(&mut self.doc, None);
        }
    }

    // ---- cache invalidation ----

    fn request_invalidation(&mut self, cause: InvalidationCause, effects: &mut Vec<Effect>) {
        if self.invalidation.notify(cause) {
            effects.push(Effect::RequestAnimationFrame);
        }
    }

    fn run_invalidation_frame(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if !self.invalidation.run_frame(&mut self.caches) {
            return;
        }

        let doc = &self.doc;
        self.enriched.retain(|node, _| doc.is_connected(*node));
        effects.push(Effect::EvictContextCache);

        let hovered = self
            .hovered
            .filter(|node| is_valid_selectable_element(&self.doc, &mut self.caches, *node, now));
        match hovered {
            Some(node) => {
                let snapshot = self.snapshot_for(node, SelectionMode::Point, now);
                self.render_hover(Some(&snapshot));
            }
            None => {
                self.hovered = None;
                self.render_hover(None);
            }
        }

        if self.pointer.is_dragging() {
            self.update_drag_preview(now);
        } else {
            self.update_selections_from_elements(now);
        }
    }

    // ---- error channel ----

    fn emit_preview_error(&mut self, error: PreviewErrorInfo, effects: &mut Vec<Effect>) {
        if !self.errors.report(&error) {
            log::trace!("Suppressing repeated {} error", error.error_type.as_str());
            return;
        }
        log::debug!("Forwarding {} error: {}", error.error_type.as_str(), error.message);
        self.send(IframeEvent::PreviewError { error }, effects);
    }

    fn clear_preview_error(
        &mut self,
        error_type: Option<PreviewErrorType>,
        effects: &mut Vec<Effect>,
    ) {
        self.errors.clear(error_type);
        self.send(IframeEvent::PreviewErrorClear { error_type }, effects);
    }

    fn observe_portal(&mut self, effects: &mut Vec<Effect>) {
        for action in self.overlay.observe_portal(&self.doc) {
            match action {
                PortalAction::Poll(delay) => {
                    effects.push(Effect::ScheduleTimer { kind: TimerKind::PortalPoll, delay });
                }
                PortalAction::Observe(shadow_root) => {
                    effects.push(Effect::ObserveShadowRoot(shadow_root));
                    self.check_error_overlay(effects);
                }
                PortalAction::Disconnect => effects.push(Effect::DisconnectShadowObserver),
            }
        }
    }

    fn check_error_overlay(&mut self, effects: &mut Vec<Effect>) {
        match self.overlay.check(&self.doc) {
            OverlayCheck::Present(error) => self.emit_preview_error(error, effects),
            OverlayCheck::Dismissed => {
                self.clear_preview_error(Some(PreviewErrorType::NextjsOverlay), effects)
            }
            OverlayCheck::Unchanged => {}
        }
    }

    // ---- teardown ----

    fn teardown(&mut self, effects: &mut Vec<Effect>) {
        if self.hover.cancel() {
            effects.push(Effect::CancelTimer(TimerKind::HoverFlush));
        }
        self.stop_heartbeat(effects);
        self.detach_listeners(effects);
        self.set_design_mode_enabled(false, effects);

        effects.push(Effect::CancelTimer(TimerKind::PortalPoll));
        if self.overlay.is_observing() {
            effects.push(Effect::DisconnectShadowObserver);
        }
        if self.session.release_port() {
            effects.push(Effect::ClosePort);
        }

        self.reset_pointer_state();
        self.temp_styles.restore_all(&mut self.doc);
        self.animation_freeze.dispose(&mut self.doc);
        if let Some(renderer) = self.renderer.take() {
            renderer.dispose(&mut self.doc);
        }

        self.torn_down = true;
        log::debug!("Design bridge torn down");
    }
}
