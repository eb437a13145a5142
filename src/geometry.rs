use crate::page::PageEnvironment;

/// Viewport size assumed when the environment cannot report one.
pub const DEFAULT_VIEWPORT: Size = Size {
    width: 800.0,
    height: 600.0,
};

/// Default margin for in-viewport checks.
pub const VIEWPORT_MARGIN: f64 = 50.0;

/// Default editor/detail modal size.
pub const DEFAULT_MODAL_SIZE: Size = Size {
    width: 320.0,
    height: 200.0,
};

const MODAL_MARGIN: f64 = 20.0;

/// A point in document or viewport coordinates, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned box, `left`/`top` plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    /// Shift from page coordinates into viewport coordinates (or back, with a
    /// negated offset).
    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            left: self.left + dx,
            top: self.top + dy,
            ..*self
        }
    }
}

/// Clamp a ratio into [0, 1]. NaN is treated as absent.
pub fn clamp01(value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if !v.is_nan() => Some(v.min(1.0).max(0.0)),
        _ => None,
    }
}

pub fn viewport_or_default(env: &dyn PageEnvironment) -> Size {
    env.viewport_size().unwrap_or(DEFAULT_VIEWPORT)
}

pub fn scroll_or_origin(env: &dyn PageEnvironment) -> Point {
    env.scroll_offset().unwrap_or_default()
}

/// Whether a viewport-coordinate point sits inside the viewport, `margin`
/// pixels away from every edge.
pub fn is_in_viewport(point: Point, viewport: Size, margin: f64) -> bool {
    point.x >= margin
        && point.x <= viewport.width - margin
        && point.y >= margin
        && point.y <= viewport.height - margin
}

/// Scroll offset that places `point` a third of the viewport from the
/// top-left corner, clamped so the page never scrolls past its origin.
pub fn scroll_target(point: Point, viewport: Size) -> Point {
    Point {
        x: (point.x - viewport.width / 3.0).max(0.0),
        y: (point.y - viewport.height / 3.0).max(0.0),
    }
}

/// Ask the environment to scroll. Negative targets are clamped first; the
/// environment impl is responsible for swallowing scroll failures.
pub fn request_scroll(env: &dyn PageEnvironment, target: Point) {
    env.scroll_to(Point {
        x: target.x.max(0.0),
        y: target.y.max(0.0),
    });
}

/// Place a modal next to an anchor point (both in viewport coordinates).
/// Prefers the right side of the anchor, flips to the left when it would
/// overflow, and clamps into the viewport with a fixed margin.
pub fn modal_position(anchor: Point, dimensions: Size, viewport: Size) -> Point {
    let mut left = anchor.x + MODAL_MARGIN;
    if left + dimensions.width > viewport.width - MODAL_MARGIN {
        left = anchor.x - dimensions.width - MODAL_MARGIN;
    }
    left = left
        .min(viewport.width - dimensions.width - MODAL_MARGIN)
        .max(MODAL_MARGIN);

    let mut top = anchor.y - MODAL_MARGIN;
    if top + dimensions.height > viewport.height - MODAL_MARGIN {
        top = viewport.height - dimensions.height - MODAL_MARGIN;
    }
    top = top.max(MODAL_MARGIN);

    Point { x: left, y: top }
}
