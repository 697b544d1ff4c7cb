//! Design elements: the nodes of the layout tree.

mod color;
mod kind;

pub use color::{ColorParseError, RgbaColor};
pub use kind::ElementKind;

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an element.
pub type ElementId = Uuid;

/// Fill applied to newly placed widgets (`rgba(0, 0, 255, 0.5)`).
pub const DEFAULT_FILL: RgbaColor = RgbaColor::new(0, 0, 255, 128);
/// Border applied to newly placed widgets.
pub const DEFAULT_BORDER: RgbaColor = RgbaColor::white();
/// Largest accepted border width.
pub const MAX_BORDER_WIDTH: f64 = 10.0;

fn default_opacity() -> f64 {
    1.0
}

/// A positioned widget in the design tree.
///
/// `x`/`y` are relative to the parent's origin when `parent_id` is set and
/// absolute otherwise. Hierarchy fields are maintained by the
/// [`ElementStore`](crate::store::ElementStore); callers only ever read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<RgbaColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<RgbaColor>,
    #[serde(default)]
    pub border_width: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Identifier used by generated code; unique across the tree when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ElementId>,
    #[serde(default)]
    pub child_ids: Vec<ElementId>,
    #[serde(default)]
    pub is_container: bool,
}

impl Element {
    /// Top-left corner in the parent's frame.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Bounds in the parent's frame.
    pub fn local_bounds(&self) -> Rect {
        Rect::from_origin_size(self.origin(), self.size())
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Display name: the element's name if set, otherwise its kind.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.label())
    }
}

/// A request to create an element.
///
/// Coordinates are absolute canvas coordinates; the store converts them into
/// the parent's frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub parent_id: Option<ElementId>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub color: Option<RgbaColor>,
    pub border_color: Option<RgbaColor>,
    pub border_width: f64,
    pub opacity: f64,
    pub image_src: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub value: Option<f64>,
    pub checked: Option<bool>,
}

impl ElementSpec {
    /// A widget of `kind` at `position` with the palette defaults.
    pub fn new(kind: ElementKind, position: Point) -> Self {
        let size = kind.default_size();
        let is_slider = kind == ElementKind::Slider;
        Self {
            kind,
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
            parent_id: None,
            name: None,
            text: kind.default_text().map(str::to_string),
            color: Some(DEFAULT_FILL),
            border_color: Some(DEFAULT_BORDER),
            border_width: 1.0,
            opacity: 1.0,
            image_src: None,
            min_value: is_slider.then_some(0.0),
            max_value: is_slider.then_some(100.0),
            value: is_slider.then_some(50.0),
            checked: (kind == ElementKind::CheckButton).then_some(false),
        }
    }

    pub fn with_parent(mut self, parent_id: ElementId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_color(mut self, color: RgbaColor) -> Self {
        self.color = Some(color);
        self
    }
}

/// A partial set of attributes to merge into an element.
///
/// `None` leaves a field untouched. For clearable attributes the inner
/// `Option` distinguishes "set" from "clear". An empty `name` clears the name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub name: Option<String>,
    pub text: Option<Option<String>>,
    pub color: Option<Option<RgbaColor>>,
    pub border_color: Option<Option<RgbaColor>>,
    pub border_width: Option<f64>,
    pub opacity: Option<f64>,
    pub image_src: Option<Option<String>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub value: Option<f64>,
    pub checked: Option<bool>,
}

impl ElementUpdate {
    /// Move to a position in the parent's frame.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_x(mut self, x: f64) -> Self {
        self.x = Some(x);
        self
    }

    pub fn with_y(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn with_color(mut self, color: Option<RgbaColor>) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = Some(text);
        self
    }

    /// Merge the non-geometry, non-name attributes into `element`.
    pub(crate) fn apply_attributes(&self, element: &mut Element) {
        if let Some(text) = &self.text {
            element.text = text.clone();
        }
        if let Some(color) = self.color {
            element.color = color;
        }
        if let Some(border_color) = self.border_color {
            element.border_color = border_color;
        }
        if let Some(width) = self.border_width {
            element.border_width = clamp_unit(width, MAX_BORDER_WIDTH);
        }
        if let Some(opacity) = self.opacity {
            element.opacity = clamp_unit(opacity, 1.0);
        }
        if let Some(image_src) = &self.image_src {
            // An empty source is the same as removing the image
            element.image_src = image_src.clone().filter(|src| !src.is_empty());
        }
        if let Some(min) = self.min_value {
            element.min_value = Some(min);
        }
        if let Some(max) = self.max_value {
            element.max_value = Some(max);
        }
        if let Some(value) = self.value {
            element.value = Some(value);
        }
        if let Some(checked) = self.checked {
            element.checked = Some(checked);
        }
    }
}

pub(crate) fn clamp_unit(value: f64, max: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, max) } else { max }
}

/// Whether `name` is a valid identifier: a letter or underscore followed by
/// letters, digits, or underscores.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Normalize user-typed text into a candidate name: trim and replace
/// whitespace runs with underscores.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_widget_defaults_per_kind() {
        let button = ElementSpec::new(ElementKind::Button, Point::new(50.0, 50.0));
        assert_eq!((button.width, button.height), (120.0, 40.0));
        assert_eq!(button.text.as_deref(), Some("Click Me"));
        assert_eq!(button.color, Some(DEFAULT_FILL));

        let slider = ElementSpec::new(ElementKind::Slider, Point::ZERO);
        assert_eq!(slider.min_value, Some(0.0));
        assert_eq!(slider.max_value, Some(100.0));
        assert_eq!(slider.value, Some(50.0));
        assert_eq!(slider.text, None);
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("okButton"));
        assert!(is_valid_name("_private1"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("has-dash"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  main   frame "), "main_frame");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_apply_attributes_clamps() {
        let mut element = Element {
            id: Uuid::new_v4(),
            kind: ElementKind::Button,
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            color: None,
            border_color: None,
            border_width: 1.0,
            opacity: 1.0,
            image_src: Some("data:image/png;base64,AAAA".to_string()),
            text: None,
            name: None,
            min_value: None,
            max_value: None,
            value: None,
            checked: None,
            parent_id: None,
            child_ids: Vec::new(),
            is_container: false,
        };
        let update = ElementUpdate {
            opacity: Some(3.0),
            border_width: Some(-1.0),
            image_src: Some(Some(String::new())),
            ..ElementUpdate::default()
        };
        update.apply_attributes(&mut element);
        assert_eq!(element.opacity, 1.0);
        assert_eq!(element.border_width, 0.0);
        assert_eq!(element.image_src, None);
    }

    #[test]
    fn test_element_json_uses_camel_case() {
        let element = Element {
            id: Uuid::nil(),
            kind: ElementKind::Frame,
            x: 1.0,
            y: 2.0,
            width: 200.0,
            height: 150.0,
            color: Some(RgbaColor::white()),
            border_color: None,
            border_width: 0.0,
            opacity: 1.0,
            image_src: None,
            text: None,
            name: Some("main".to_string()),
            min_value: None,
            max_value: None,
            value: None,
            checked: None,
            parent_id: None,
            child_ids: Vec::new(),
            is_container: true,
        };
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "Frame");
        assert_eq!(json["isContainer"], true);
        assert_eq!(json["color"], "#ffffff");
        assert!(json.get("parentId").is_none());
    }
}
