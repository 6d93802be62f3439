use crate::dom::NodeId;
use crate::engine::constants::{BOUNDS_CACHE_TTL, VISIBILITY_CACHE_TTL};
use crate::protocol::ElementBounds;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Element-at-point lookups within this distance of the previous lookup reuse its answer
pub const POSITION_CACHE_DISTANCE: f64 = 2.0;
pub const POSITION_CACHE_TTL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
struct TimedEntry<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> TimedEntry<T> {
    fn fresh(&self, now: Instant, ttl: Duration) -> Option<T> {
        (now.saturating_duration_since(self.stored_at) < ttl).then(|| self.value.clone())
    }
}

#[derive(Debug, Clone)]
struct PositionEntry {
    x: f64,
    y: f64,
    node: Option<NodeId>,
    stored_at: Instant,
}

/// Per-node caches shared by the classifier, the geometry engine and hit testing.
///
/// Entries expire by TTL; everything is dropped wholesale on invalidation ticks.
#[derive(Debug, Clone)]
pub struct SelectionCaches {
    visibility: HashMap<NodeId, TimedEntry<bool>>,
    bounds: HashMap<NodeId, TimedEntry<ElementBounds>>,
    position: Option<PositionEntry>,
    visibility_ttl: Duration,
    bounds_ttl: Duration,
}

impl Default for SelectionCaches {
    fn default() -> Self {
        Self::new(VISIBILITY_CACHE_TTL, BOUNDS_CACHE_TTL)
    }
}

impl SelectionCaches {
    pub fn new(visibility_ttl: Duration, bounds_ttl: Duration) -> Self {
        Self {
            visibility: HashMap::new(),
            bounds: HashMap::new(),
            position: None,
            visibility_ttl,
            bounds_ttl,
        }
    }

    pub fn visibility(&self, node: NodeId, now: Instant) -> Option<bool> {
        self.visibility.get(&node)?.fresh(now, self.visibility_ttl)
    }

    pub fn store_visibility(&mut self, node: NodeId, visible: bool, now: Instant) {
        self.visibility.insert(node, TimedEntry { value: visible, stored_at: now });
    }

    pub fn bounds(&self, node: NodeId, now: Instant) -> Option<ElementBounds> {
        self.bounds.get(&node)?.fresh(now, self.bounds_ttl)
    }

    pub fn store_bounds(&mut self, node: NodeId, bounds: ElementBounds, now: Instant) {
        self.bounds.insert(node, TimedEntry { value: bounds, stored_at: now });
    }

    /// Result of a recent element-at-point lookup close to `(x, y)`.
    ///
    /// The outer `Option` is the cache hit; the inner one is the cached answer, which may
    /// itself be "nothing selectable here".
    pub fn position(&self, x: f64, y: f64, now: Instant) -> Option<Option<NodeId>> {
        let entry = self.position.as_ref()?;
        let close = (entry.x - x).abs() < POSITION_CACHE_DISTANCE
            && (entry.y - y).abs() < POSITION_CACHE_DISTANCE;
        let fresh = now.saturating_duration_since(entry.stored_at) < POSITION_CACHE_TTL;
        (close && fresh).then_some(entry.node)
    }

    pub fn store_position(&mut self, x: f64, y: f64, node: Option<NodeId>, now: Instant) {
        self.position = Some(PositionEntry { x, y, node, stored_at: now });
    }

    pub fn clear_visibility(&mut self) {
        self.visibility.clear();
    }

    pub fn clear_bounds(&mut self) {
        self.bounds.clear();
    }

    pub fn clear_position(&mut self) {
        self.position = None;
    }

    pub fn clear_all(&mut self) {
        self.clear_position();
        self.clear_bounds();
        self.clear_visibility();
    }

    pub fn len(&self) -> usize {
        self.visibility.len() + self.bounds.len() + usize::from(self.position.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What triggered an invalidation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationCause {
    /// Child list or attribute change below `<body>`
    Mutation,
    /// Scroll anywhere in the document (capture phase)
    Scroll,
    Resize,
}

/// Coalesces DOM churn into at most one cache flush per animation frame
#[derive(Debug, Default)]
pub struct SelectionCacheInvalidation {
    attached: bool,
    frame_pending: bool,
}

impl SelectionCacheInvalidation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing; returns false when already attached
    pub fn attach(&mut self) -> bool {
        if self.attached {
            return false;
        }
        self.attached = true;
        true
    }

    /// Stop observing; returns true when a requested frame must be cancelled
    pub fn detach(&mut self) -> bool {
        self.attached = false;
        std::mem::take(&mut self.frame_pending)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_frame_pending(&self) -> bool {
        self.frame_pending
    }

    /// Record a change; returns true when the caller must request an animation frame
    pub fn notify(&mut self, cause: InvalidationCause) -> bool {
        if !self.attached || self.frame_pending {
            return false;
        }
        log::trace!("Scheduling selection cache invalidation ({:?})", cause);
        self.frame_pending = true;
        true
    }

    /// Run the coalesced tick. Returns true when caches were cleared and overlays must be
    /// refreshed against fresh geometry.
    pub fn run_frame(&mut self, caches: &mut SelectionCaches) -> bool {
        if !std::mem::take(&mut self.frame_pending) {
            return false;
        }
        caches.clear_all();
        self.attached
    }
}
