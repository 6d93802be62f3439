use std::time::Duration;

/// Marks every node owned by the highlight renderer
pub const OVERLAY_ROOT_ATTRIBUTE: &str = "data-wiblo-design-overlay";

/// Page authors opt subtrees out of selection with this attribute
pub const USER_IGNORE_ATTRIBUTE: &str = "data-wiblo-ignore";

/// Marks elements in the scoped animation-freeze working set
pub const FROZEN_ELEMENT_ATTRIBUTE: &str = "data-wiblo-design-frozen";

/// Stable element identity stamped on first snapshot
pub const DOM_ID_ATTRIBUTE: &str = "data-wiblo-dom-id";

/// Attributes with this prefix are bridge bookkeeping and never reported in snapshots
pub const BRIDGE_ATTRIBUTE_PREFIX: &str = "data-wiblo";

pub const IGNORE_TAGS: &[&str] = &[
    "html", "head", "meta", "title", "body", "script", "style", "link", "noscript", "base",
    "template",
];

pub const DEV_TOOLS_OVERLAY_Z_INDEX_THRESHOLD: i64 = 2_147_483_600;
pub const OVERLAY_Z_INDEX_THRESHOLD: i64 = 1000;
pub const VIEWPORT_COVERAGE_THRESHOLD: f64 = 0.9;

pub const VISIBILITY_CACHE_TTL: Duration = Duration::from_millis(50);
pub const BOUNDS_CACHE_TTL: Duration = Duration::from_millis(16);

pub const MAX_TRANSFORM_ANCESTOR_DEPTH: usize = 6;
pub const TRANSFORM_EARLY_BAIL_DEPTH: usize = 3;

/// Share of an element's own area that must lie inside the drag rectangle
pub const DRAG_COVERAGE_THRESHOLD: f64 = 0.75;

pub const MAX_TEXT_CONTENT_LENGTH: usize = 250;
pub const MAX_SELECTOR_CLASSES: usize = 2;
