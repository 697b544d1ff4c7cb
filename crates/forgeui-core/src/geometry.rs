//! Axis-aligned rectangle helpers for containment and clamping.
//!
//! All functions are pure and operate on kurbo primitives. Element geometry
//! inside a container is expressed in the container's local frame, where the
//! container occupies `(0, 0)..(width, height)`.

use kurbo::{Point, Rect, Size};

/// Smallest allowed element width/height.
pub const MIN_SIZE: f64 = 5.0;
/// Largest allowed element width/height.
pub const MAX_SIZE: f64 = 1500.0;

/// Tolerance used when comparing coordinates.
pub const EPSILON: f64 = 1e-6;

/// Clamp a single dimension into `[MIN_SIZE, MAX_SIZE]`.
///
/// Non-finite input falls back to `MIN_SIZE`.
pub fn clamp_dimension(value: f64) -> f64 {
    if !value.is_finite() {
        return MIN_SIZE;
    }
    value.clamp(MIN_SIZE, MAX_SIZE)
}

/// Clamp both dimensions of a size into `[MIN_SIZE, MAX_SIZE]`.
pub fn clamp_size(size: Size) -> Size {
    Size::new(clamp_dimension(size.width), clamp_dimension(size.height))
}

/// Fit a child rectangle inside a container of the given size.
///
/// `origin` is the child's top-left in the container's local frame. The
/// child is shrunk first if it is larger than the container, then moved so
/// that `0 <= x`, `0 <= y`, `x + width <= frame.width` and
/// `y + height <= frame.height`.
pub fn clamp_into(frame: Size, origin: Point, size: Size) -> (Point, Size) {
    let width = size.width.min(frame.width).max(0.0);
    let height = size.height.min(frame.height).max(0.0);
    let x = clamp_axis(origin.x, frame.width - width);
    let y = clamp_axis(origin.y, frame.height - height);
    (Point::new(x, y), Size::new(width, height))
}

/// Clamp only the position of a child, keeping its size.
///
/// Used during drags, where the size never changes and has already been
/// fitted to the container.
pub fn clamp_origin(frame: Size, origin: Point, size: Size) -> Point {
    Point::new(
        clamp_axis(origin.x, frame.width - size.width),
        clamp_axis(origin.y, frame.height - size.height),
    )
}

fn clamp_axis(value: f64, max: f64) -> f64 {
    let value = if value.is_finite() { value } else { 0.0 };
    value.min(max).max(0.0)
}

/// Whether `inner` lies fully inside `outer` (edges may touch).
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 - EPSILON
        && inner.y0 >= outer.y0 - EPSILON
        && inner.x1 <= outer.x1 + EPSILON
        && inner.y1 <= outer.y1 + EPSILON
}

/// Whether a point lies inside a rectangle (edges inclusive).
pub fn contains_point(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

/// Whether two rectangles overlap with a positive area.
pub fn intersects(a: Rect, b: Rect) -> bool {
    a.intersect(b).area() > 0.0
}

/// Build a rectangle from two arbitrary corner points.
pub fn rect_from_corners(a: Point, b: Point) -> Rect {
    Rect::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
}

/// Approximate equality for coordinates.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}
