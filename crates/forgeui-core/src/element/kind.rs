//! Widget kinds.

use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of widget kinds an element can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Frame,
    Section,
    Button,
    CheckButton,
    EditBox,
    ScrollFrame,
    Slider,
    Text,
}

impl ElementKind {
    /// Every kind, in palette order.
    pub const ALL: [ElementKind; 8] = [
        ElementKind::Frame,
        ElementKind::Section,
        ElementKind::Button,
        ElementKind::CheckButton,
        ElementKind::EditBox,
        ElementKind::ScrollFrame,
        ElementKind::Slider,
        ElementKind::Text,
    ];

    /// Containers may hold children and may live at the root.
    pub fn is_container(self) -> bool {
        matches!(self, ElementKind::Frame | ElementKind::Section)
    }

    /// Size given to a freshly placed widget of this kind.
    pub fn default_size(self) -> Size {
        match self {
            ElementKind::Button => Size::new(120.0, 40.0),
            _ => Size::new(200.0, 150.0),
        }
    }

    /// Placeholder text for kinds that display text.
    pub fn default_text(self) -> Option<&'static str> {
        match self {
            ElementKind::Button => Some("Click Me"),
            ElementKind::EditBox => Some("Enter text..."),
            ElementKind::Text => Some("Text"),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            ElementKind::Frame => "Frame",
            ElementKind::Section => "Section",
            ElementKind::Button => "Button",
            ElementKind::CheckButton => "CheckButton",
            ElementKind::EditBox => "EditBox",
            ElementKind::ScrollFrame => "ScrollFrame",
            ElementKind::Slider => "Slider",
            ElementKind::Text => "Text",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_frame_and_section_are_containers() {
        let containers: Vec<_> = ElementKind::ALL
            .iter()
            .filter(|k| k.is_container())
            .collect();
        assert_eq!(containers, vec![&ElementKind::Frame, &ElementKind::Section]);
    }

    #[test]
    fn test_default_sizes() {
        assert_eq!(ElementKind::Button.default_size(), Size::new(120.0, 40.0));
        assert_eq!(ElementKind::Frame.default_size(), Size::new(200.0, 150.0));
    }
}
