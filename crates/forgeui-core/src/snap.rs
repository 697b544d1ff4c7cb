//! Grid snapping for element positions.

use kurbo::{Point, Size};

/// Default grid size (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;
/// Smallest configurable grid size.
pub const MIN_GRID_SIZE: f64 = 10.0;
/// Largest configurable grid size.
pub const MAX_GRID_SIZE: f64 = 100.0;
/// Grid size slider step.
pub const GRID_STEP: f64 = 5.0;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Clamp a requested grid size into the allowed range, rounded to the step.
pub fn clamp_grid_size(size: f64) -> f64 {
    if !size.is_finite() {
        return GRID_SIZE;
    }
    let stepped = (size / GRID_STEP).round() * GRID_STEP;
    stepped.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE)
}

/// Round a single coordinate to the nearest grid line.
pub fn snap_value(value: f64, grid_size: f64) -> f64 {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return value;
    }
    (value / grid_size).round() * grid_size
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return SnapResult::none(point);
    }
    let snapped = Point::new(snap_value(point.x, grid_size), snap_value(point.y, grid_size));
    SnapResult {
        point: snapped,
        snapped_x: snapped.x != point.x,
        snapped_y: snapped.y != point.y,
    }
}

/// Snap a point if snapping is enabled.
pub fn snap_point(point: Point, enabled: bool, grid_size: f64) -> SnapResult {
    if enabled {
        snap_to_grid(point, grid_size)
    } else {
        SnapResult::none(point)
    }
}

/// Snap an element origin, then pull it back inside `frame` if snapping
/// rounded it past an edge.
///
/// `frame` is the parent's size for a parented element and `None` at the
/// root, where positions are unbounded.
pub fn snap_within(origin: Point, size: Size, frame: Option<Size>, grid_size: f64) -> Point {
    let snapped = snap_to_grid(origin, grid_size).point;
    match frame {
        Some(frame) => crate::geometry::clamp_origin(frame, snapped, size),
        None => snapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        let result = snap_to_grid(Point::new(23.0, 47.0), 20.0);
        assert_eq!(result.point, Point::new(20.0, 40.0));
        assert!(result.snapped_x);
        assert!(result.snapped_y);
    }

    #[test]
    fn test_snap_to_grid_exact() {
        let result = snap_to_grid(Point::new(40.0, 60.0), 20.0);
        assert_eq!(result.point, Point::new(40.0, 60.0));
        assert!(!result.is_snapped());
    }

    #[test]
    fn test_snap_to_grid_round_up() {
        let result = snap_to_grid(Point::new(31.0, 51.0), 20.0);
        assert_eq!(result.point, Point::new(40.0, 60.0));
    }

    #[test]
    fn test_snap_disabled() {
        let result = snap_point(Point::new(31.0, 51.0), false, 20.0);
        assert_eq!(result.point, Point::new(31.0, 51.0));
        assert_eq!(snap_to_grid(Point::new(3.0, 3.0), 0.0).point, Point::new(3.0, 3.0));
    }

    #[test]
    fn test_snap_within_respects_frame() {
        // 95 would round to 100, pushing a 20-wide child past a 110 frame
        let origin = snap_within(
            Point::new(95.0, 12.0),
            Size::new(20.0, 20.0),
            Some(Size::new(110.0, 110.0)),
            20.0,
        );
        assert_eq!(origin, Point::new(90.0, 20.0));

        let root = snap_within(Point::new(95.0, 12.0), Size::new(20.0, 20.0), None, 20.0);
        assert_eq!(root, Point::new(100.0, 20.0));
    }

    #[test]
    fn test_clamp_grid_size() {
        assert_eq!(clamp_grid_size(3.0), MIN_GRID_SIZE);
        assert_eq!(clamp_grid_size(500.0), MAX_GRID_SIZE);
        assert_eq!(clamp_grid_size(27.0), 25.0);
        assert_eq!(clamp_grid_size(f64::NAN), GRID_SIZE);
    }
}
