//! Hex notation for [`Color32`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::Color32;

/// Failure to parse a `#RGB`, `#RRGGBB` or `#AARRGGBB` color.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseColorError {
    #[error("color must start with '#': {0:?}")]
    MissingHash(String),

    #[error("expected 3, 6 or 8 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex digit in {0:?}")]
    InvalidDigit(String),
}

impl FromStr for Color32 {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ParseColorError::MissingHash(s.to_string()))?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseColorError::InvalidDigit(s.to_string()));
        }
        let value = u32::from_str_radix(digits, 16).unwrap_or_default();
        match digits.len() {
            3 => {
                let expand = |nibble: u32| ((nibble & 0xF) * 0x11) as u8;
                Ok(Color32::from_rgb(
                    expand(value >> 8),
                    expand(value >> 4),
                    expand(value),
                ))
            }
            6 => Ok(Color32::from_argb_u32(0xFF00_0000 | value)),
            8 => Ok(Color32::from_argb_u32(value)),
            n => Err(ParseColorError::InvalidLength(n)),
        }
    }
}

/// Formats as `#RRGGBB` when opaque, `#AARRGGBB` otherwise.
impl fmt::Display for Color32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:08X}", self.to_argb_u32())
        }
    }
}
