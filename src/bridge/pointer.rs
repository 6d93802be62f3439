use crate::dom::{NodeId, Rect};
use crate::engine::drag_rect;

/// Pointer event as delivered by the host, in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pointer_id: i64,
    /// 0 is the primary (left) button
    pub button: i16,
    pub x: f64,
    pub y: f64,
}

impl PointerInput {
    pub fn new(pointer_id: i64, x: f64, y: f64) -> Self {
        Self { pointer_id, button: 0, x, y }
    }

    pub fn with_button(mut self, button: i16) -> Self {
        self.button = button;
        self
    }
}

/// Pressed/dragging sub-state of design mode
#[derive(Debug, Default, Clone)]
pub struct PointerState {
    active_pointer_id: Option<i64>,
    down: Option<(f64, f64)>,
    current: Option<(f64, f64)>,
    dragging: bool,
    drag_selected: Vec<NodeId>,
}

impl PointerState {
    pub fn press(&mut self, input: &PointerInput) {
        self.active_pointer_id = Some(input.pointer_id);
        self.down = Some((input.x, input.y));
        self.current = Some((input.x, input.y));
        self.dragging = false;
        self.drag_selected.clear();
    }

    /// Whether `pointer_id` is the pressed pointer
    pub fn is_active(&self, pointer_id: i64) -> bool {
        self.active_pointer_id == Some(pointer_id) && self.down.is_some()
    }

    pub fn is_tracking(&self, pointer_id: i64) -> bool {
        self.active_pointer_id == Some(pointer_id)
    }

    /// Record a move of the pressed pointer. Returns true when this move crossed the drag
    /// threshold and the press became a drag.
    pub fn move_to(&mut self, x: f64, y: f64, threshold: f64) -> bool {
        self.current = Some((x, y));
        if self.dragging {
            return false;
        }

        let Some((down_x, down_y)) = self.down else {
            return false;
        };
        let travel = (x - down_x).hypot(y - down_y);
        if travel >= threshold {
            self.dragging = true;
            return true;
        }
        false
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Rectangle spanned by the press point and the current point
    pub fn drag_rect(&self) -> Option<Rect> {
        Some(drag_rect(self.down?, self.current?))
    }

    pub fn set_drag_selected(&mut self, elements: Vec<NodeId>) {
        self.drag_selected = elements;
    }

    pub fn drag_selected(&self) -> &[NodeId] {
        &self.drag_selected
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_starts_at_threshold() {
        let mut state = PointerState::default();
        state.press(&PointerInput::new(1, 10.0, 10.0));
        assert!(state.is_active(1));
        assert!(!state.is_active(2));

        assert!(!state.move_to(12.0, 11.0, 4.0));
        assert!(!state.is_dragging());
        assert!(state.move_to(13.0, 14.0, 4.0));
        assert!(state.is_dragging());
        assert!(!state.move_to(40.0, 40.0, 4.0));

        assert_eq!(state.drag_rect(), Some(Rect::new(10.0, 10.0, 30.0, 30.0)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = PointerState::default();
        state.press(&PointerInput::new(7, 0.0, 0.0));
        state.move_to(50.0, 50.0, 4.0);
        state.set_drag_selected(vec![NodeId(3)]);

        state.reset();
        assert!(!state.is_tracking(7));
        assert!(!state.is_dragging());
        assert!(state.drag_selected().is_empty());
        assert_eq!(state.drag_rect(), None);
    }
}
