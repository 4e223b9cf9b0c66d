//! Color parsing and conversion utilities

use crate::{error::BgRemovalError, error::Result, types::Color};

/// Utility for parsing and converting colors
pub struct ColorParser;

impl ColorParser {
    /// Parse a `#RRGGBB` hex color string
    ///
    /// A single leading `#` is optional. Exactly six hex digits are required;
    /// shorthand and alpha forms are rejected because alpha is handled per layer.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_compose::utils::ColorParser;
    ///
    /// let purple = ColorParser::parse_hex("#667EEA").unwrap();
    /// assert_eq!((purple.r, purple.g, purple.b), (0x66, 0x7E, 0xEA));
    /// assert!(ColorParser::parse_hex("#fff").is_err());
    /// ```
    ///
    /// # Errors
    /// - `InvalidColorFormat` on wrong length or non-hex characters
    pub fn parse_hex(input: &str) -> Result<Color> {
        let hex = input.strip_prefix('#').unwrap_or(input);

        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(BgRemovalError::invalid_color(format!(
                "'{}' is not a #RRGGBB color",
                input
            )));
        }

        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| BgRemovalError::invalid_color(input))
        };

        Ok(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Validate hex color format without parsing
    #[must_use]
    pub fn is_valid_hex(input: &str) -> bool {
        Self::parse_hex(input).is_ok()
    }
}
