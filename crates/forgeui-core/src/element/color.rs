//! Element colors.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a color string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid color: {0}")]
pub struct ColorParseError(pub String);

/// RGBA8 color stored on elements.
///
/// Serialized as a hex string (`#rrggbb` or `#rrggbbaa`) so that stored
/// scenes stay readable and compatible with CSS-style color inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl RgbaColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    ///
    /// The alpha component of `rgba()` is a float in `[0, 1]`.
    pub fn parse(input: &str) -> Result<Self, ColorParseError> {
        let s = input.trim();
        let err = || ColorParseError(input.to_string());

        if let Some(hex) = s.strip_prefix('#') {
            let byte = |range: std::ops::Range<usize>| -> Result<u8, ColorParseError> {
                hex.get(range)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(err)
            };
            return match hex.len() {
                3 => Ok(Self::rgb(byte(0..1)? * 17, byte(1..2)? * 17, byte(2..3)? * 17)),
                6 => Ok(Self::rgb(byte(0..2)?, byte(2..4)?, byte(4..6)?)),
                8 => Ok(Self::new(byte(0..2)?, byte(2..4)?, byte(4..6)?, byte(6..8)?)),
                _ => Err(err()),
            };
        }

        let (args, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest.strip_suffix(')').ok_or_else(err)?, true)
        } else if let Some(rest) = s.strip_prefix("rgb(") {
            (rest.strip_suffix(')').ok_or_else(err)?, false)
        } else {
            return Err(err());
        };

        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != if has_alpha { 4 } else { 3 } {
            return Err(err());
        }
        let channel = |p: &str| p.parse::<u8>().map_err(|_| err());
        let alpha = if has_alpha {
            let a: f64 = parts[3].parse().map_err(|_| err())?;
            (a.clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            255
        };
        Ok(Self::new(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
            alpha,
        ))
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RgbaColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RgbaColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RgbaColor> for String {
    fn from(color: RgbaColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for RgbaColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<RgbaColor> for Color {
    fn from(color: RgbaColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(RgbaColor::parse("#fff").unwrap(), RgbaColor::white());
        assert_eq!(RgbaColor::parse("#102030").unwrap(), RgbaColor::rgb(16, 32, 48));
        assert_eq!(
            RgbaColor::parse("#10203080").unwrap(),
            RgbaColor::new(16, 32, 48, 128)
        );
    }

    #[test]
    fn test_parse_rgba_function() {
        let color: RgbaColor = "rgba(0, 0, 255, 0.5)".parse().unwrap();
        assert_eq!(color, RgbaColor::new(0, 0, 255, 128));
        let color: RgbaColor = "rgb(1,2,3)".parse().unwrap();
        assert_eq!(color, RgbaColor::rgb(1, 2, 3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RgbaColor::parse("blue").is_err());
        assert!(RgbaColor::parse("#12345").is_err());
        assert!(RgbaColor::parse("rgba(1, 2, 3)").is_err());
        assert!(RgbaColor::parse("rgb(300, 0, 0)").is_err());
    }

    #[test]
    fn test_hex_serialization() {
        let json = serde_json::to_string(&RgbaColor::new(0, 0, 255, 128)).unwrap();
        assert_eq!(json, "\"#0000ff80\"");
        let back: RgbaColor = serde_json::from_str("\"#ffffff\"").unwrap();
        assert_eq!(back, RgbaColor::white());
    }

    #[test]
    fn test_peniko_conversion() {
        let color = RgbaColor::new(10, 20, 30, 40);
        let peniko_color: Color = color.into();
        assert_eq!(RgbaColor::from(peniko_color), color);
    }
}
