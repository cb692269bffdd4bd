//! The floating launcher button: position, open state, and drag tracking.

use iced::{Point, Size, Vector};

use crate::placement::clamp_to_viewport;

/// How a finished press was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Short press; the panel was toggled.
    Click,
    /// The launcher was moved; open state untouched.
    Drag,
    /// Release without a matching press.
    Ignored,
}

/// Exists only between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub grab_offset: Vector,
    pub start: Point,
}

#[derive(Debug)]
pub struct Launcher {
    position: Point,
    size: Size,
    viewport: Size,
    open: bool,
    threshold: f32,
    drag: Option<DragState>,
}

impl Launcher {
    pub fn new(position: Point, size: Size, viewport: Size, threshold: f32) -> Self {
        Launcher {
            position: clamp_to_viewport(position, size, viewport),
            size,
            viewport,
            open: false,
            threshold,
            drag: None,
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_state(&self) -> Option<DragState> {
        self.drag
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Re-clamps the launcher after the window changed size.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.position = clamp_to_viewport(self.position, self.size, viewport);
    }

    pub fn pointer_down(&mut self, pointer: Point) {
        self.drag = Some(DragState {
            grab_offset: pointer - self.position,
            start: pointer,
        });
    }

    /// Returns whether the launcher moved.
    pub fn pointer_moved(&mut self, pointer: Point) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };

        let target = pointer - drag.grab_offset;
        let next = clamp_to_viewport(target, self.size, self.viewport);
        let moved = next != self.position;
        self.position = next;
        moved
    }

    pub fn pointer_up(&mut self, pointer: Point) -> Gesture {
        let Some(drag) = self.drag.take() else {
            return Gesture::Ignored;
        };

        if drag.start.distance(pointer) < self.threshold {
            self.toggle();
            Gesture::Click
        } else {
            Gesture::Drag
        }
    }

    /// Abandons an active drag without toggling.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }
}
