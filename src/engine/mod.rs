//! Selection engine
//!
//! Pure functions over a [`HostDocument`](crate::dom::HostDocument) that decide what can be
//! selected, where it is on screen and how it is described to the parent frame.
//! Results that are expensive to compute are memoized in [`SelectionCaches`].

pub mod cache;
pub mod classifier;
pub mod constants;
pub mod geometry;
pub mod matrix;
pub mod snapshot;

pub use cache::{InvalidationCause, SelectionCacheInvalidation, SelectionCaches};
pub use classifier::{is_element_visible, is_valid_selectable_element};
pub use geometry::create_element_bounds;
pub use hit_test::{drag_rect, element_at_position, elements_in_drag};
pub use matrix::Matrix2D;
pub use snapshot::{create_selection_snapshot, ensure_dom_id, generate_selector};
