//! Where the chat panel goes relative to the launcher.

use iced::{Point, Size};

/// Layout constants for panel placement.
#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    /// Launchers lower than `viewport.height - bottom_threshold` open the panel above.
    pub bottom_threshold: f32,
    /// Space between launcher and panel.
    pub gap: f32,
    /// Distance from the viewport edge when the panel is pinned.
    pub edge_inset: f32,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            bottom_threshold: 250.0,
            gap: 16.0,
            edge_inset: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Above,
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Top-left corner of the panel.
    pub origin: Point,
    pub anchor: Anchor,
}

/// Clamps `value` into `[0, max]`, pinning to 0 when `max` is negative.
pub fn clamp_axis(value: f32, max: f32) -> f32 {
    value.min(max).max(0.0)
}

/// Keeps a box of `size` with its top-left at `origin` inside `viewport`.
pub fn clamp_to_viewport(origin: Point, size: Size, viewport: Size) -> Point {
    Point::new(
        clamp_axis(origin.x, viewport.width - size.width),
        clamp_axis(origin.y, viewport.height - size.height),
    )
}

pub fn place_panel(launcher: Point, launcher_size: Size, viewport: Size, panel: Size, metrics: Metrics) -> Placement {
    let near_bottom = launcher.y > viewport.height - metrics.bottom_threshold;
    let above_y = launcher.y - metrics.gap - panel.height;

    // Above only when the whole panel fits over the launcher; otherwise clamping would cover it.
    let (origin, anchor) = if near_bottom && above_y >= 0.0 {
        let centred = launcher.x + launcher_size.width / 2.0 - panel.width / 2.0;
        let x = if centred < 0.0 {
            metrics.edge_inset
        } else if centred + panel.width > viewport.width {
            viewport.width - metrics.edge_inset - panel.width
        } else {
            centred
        };
        (Point::new(x, above_y), Anchor::Above)
    } else if launcher.x + launcher_size.width / 2.0 < viewport.width / 2.0 {
        let x = launcher.x + launcher_size.width + metrics.gap;
        (Point::new(x, launcher.y), Anchor::Right)
    } else {
        let x = launcher.x - metrics.gap - panel.width;
        (Point::new(x, launcher.y), Anchor::Left)
    };

    Placement {
        origin: clamp_to_viewport(origin, panel, viewport),
        anchor,
    }
}
