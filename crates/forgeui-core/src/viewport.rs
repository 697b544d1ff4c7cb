//! Canvas viewport: pan and zoom.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest zoom factor.
pub const MIN_SCALE: f64 = 0.5;
/// Largest zoom factor.
pub const MAX_SCALE: f64 = 2.5;

/// The view transform of the design canvas.
///
/// Converts between screen coordinates (pointer events) and canvas
/// coordinates (element geometry).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    /// Current zoom factor, 1.0 = 100%
    pub scale: f64,
    /// Screen-space translation
    pub offset: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform from canvas to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    /// Transform from screen to canvas coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.offset)
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.transform() * canvas_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Set the zoom factor, clamped to the allowed range.
    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        }
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        let canvas_point = self.screen_to_canvas(screen_point);
        self.scale = new_scale;
        let new_screen = self.canvas_to_screen(canvas_point);
        self.offset += screen_point - new_screen;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Repair values read from storage.
    pub(crate) fn sanitized(self) -> Self {
        let offset = if self.offset.x.is_finite() && self.offset.y.is_finite() {
            self.offset
        } else {
            Vec2::ZERO
        };
        let scale = if self.scale.is_finite() {
            self.scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            1.0
        };
        Self { scale, offset }
    }
}
