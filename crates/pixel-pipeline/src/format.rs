//! Pixel format descriptors
//!
//! [`PixelFormatInfo`] is the immutable metadata every bitmap carries:
//! bits per pixel, channel count and a handful of flags. The
//! [`KnownPixelFormat`] enum lists the memory layouts this crate can read
//! and write without caller-supplied accessors.
//!
//! # Layouts
//!
//! All multi-byte values are little-endian, matching the GDI conventions:
//!
//! | Format | Bytes per pixel | Memory order |
//! |--------|-----------------|--------------|
//! | 1/4/8bpp indexed | 1/8, 1/2, 1 | palette index, MSB-first within a byte |
//! | 16bpp RGB 555/565/ARGB 1555 | 2 | `u16`, blue in the lowest bits |
//! | 24bpp RGB | 3 | B, G, R |
//! | 32bpp (P)ARGB / RGB | 4 | `u32` 0xAARRGGBB |
//! | 48/64bpp | 6/8 | `u16` B, G, R(, A) |
//! | 96/128bpp | 12/16 | `f32` R, G, B(, A), linear |

use std::fmt;
use std::str::FromStr;

use crate::error::{DrawingError, Result};

const INDEXED: u8 = 1;
const ALPHA: u8 = 1 << 1;
const PREMULTIPLIED: u8 = 1 << 2;
const GRAYSCALE: u8 = 1 << 3;
const CUSTOM: u8 = 1 << 4;
const LINEAR: u8 = 1 << 5;
const WIDE: u8 = 1 << 6;

/// Channel precision used when converting pixels of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColorPrecision {
    /// 8 bits or fewer per channel, handled as [`Color32`](crate::Color32).
    Bits8,
    /// 16 bits per channel, handled as [`Color64`](crate::Color64).
    Bits16,
    /// Linear floating point, handled as [`ColorF`](crate::ColorF).
    Float,
}

/// Immutable description of a pixel layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormatInfo {
    bits_per_pixel: u8,
    channel_count: u8,
    flags: u8,
}

impl PixelFormatInfo {
    /// A direct (non-indexed) format with the given size.
    pub const fn new(bits_per_pixel: u8, channel_count: u8) -> Self {
        Self {
            bits_per_pixel,
            channel_count,
            flags: 0,
        }
    }

    /// An indexed format; one channel holding a palette index.
    pub const fn new_indexed(bits_per_pixel: u8) -> Self {
        Self {
            bits_per_pixel,
            channel_count: 1,
            flags: INDEXED,
        }
    }

    const fn with_flag(mut self, flag: u8, on: bool) -> Self {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
        self
    }

    pub const fn with_alpha(self, on: bool) -> Self {
        self.with_flag(ALPHA, on)
    }

    /// Premultiplied implies an alpha channel.
    pub const fn with_premultiplied_alpha(self, on: bool) -> Self {
        let this = self.with_flag(PREMULTIPLIED, on);
        if on {
            this.with_flag(ALPHA, true)
        } else {
            this
        }
    }

    pub const fn with_grayscale(self, on: bool) -> Self {
        self.with_flag(GRAYSCALE, on)
    }

    pub const fn with_custom(self, on: bool) -> Self {
        self.with_flag(CUSTOM, on)
    }

    /// Channels hold linear-light values (float formats).
    pub const fn with_linear_gamma(self, on: bool) -> Self {
        self.with_flag(LINEAR, on)
    }

    /// Channels carry more than 8 bits of precision.
    pub const fn with_wide_channels(self, on: bool) -> Self {
        self.with_flag(WIDE, on)
    }

    #[inline]
    pub const fn bits_per_pixel(&self) -> u8 {
        self.bits_per_pixel
    }

    #[inline]
    pub const fn channel_count(&self) -> u8 {
        self.channel_count
    }

    #[inline]
    pub const fn is_indexed(&self) -> bool {
        self.flags & INDEXED != 0
    }

    #[inline]
    pub const fn has_alpha(&self) -> bool {
        self.flags & ALPHA != 0
    }

    #[inline]
    pub const fn has_premultiplied_alpha(&self) -> bool {
        self.flags & PREMULTIPLIED != 0
    }

    #[inline]
    pub const fn is_grayscale(&self) -> bool {
        self.flags & GRAYSCALE != 0
    }

    #[inline]
    pub const fn is_custom(&self) -> bool {
        self.flags & CUSTOM != 0
    }

    #[inline]
    pub const fn is_linear_gamma(&self) -> bool {
        self.flags & LINEAR != 0
    }

    pub const fn precision(&self) -> ColorPrecision {
        if self.is_linear_gamma() {
            ColorPrecision::Float
        } else if self.flags & WIDE != 0 {
            ColorPrecision::Bits16
        } else {
            ColorPrecision::Bits8
        }
    }

    /// Palette capacity of an indexed format, 0 for direct formats.
    pub const fn max_palette_entries(&self) -> usize {
        if self.is_indexed() {
            1 << self.bits_per_pixel
        } else {
            0
        }
    }

    /// Bytes needed to store `width` pixels.
    #[inline]
    pub const fn bytes_for_width(&self, width: usize) -> usize {
        (width * self.bits_per_pixel as usize).div_ceil(8)
    }

    /// Whole pixels start at byte boundaries.
    #[inline]
    pub const fn is_byte_aligned(&self) -> bool {
        self.bits_per_pixel % 8 == 0
    }

    /// Check the descriptor invariants.
    pub fn validate(&self) -> Result<()> {
        if self.bits_per_pixel == 0 || self.bits_per_pixel > 128 {
            return Err(DrawingError::out_of_range(format!(
                "bits per pixel must be in 1..=128, got {}",
                self.bits_per_pixel
            )));
        }
        if self.channel_count == 0 {
            return Err(DrawingError::out_of_range("channel count must be positive"));
        }
        if self.is_indexed() && self.bits_per_pixel > 16 {
            return Err(DrawingError::out_of_range(format!(
                "indexed formats support at most 16 bits per pixel, got {}",
                self.bits_per_pixel
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for PixelFormatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelFormatInfo")
            .field("bits_per_pixel", &self.bits_per_pixel)
            .field("channel_count", &self.channel_count)
            .field("indexed", &self.is_indexed())
            .field("alpha", &self.has_alpha())
            .field("premultiplied", &self.has_premultiplied_alpha())
            .field("grayscale", &self.is_grayscale())
            .field("custom", &self.is_custom())
            .field("precision", &self.precision())
            .finish()
    }
}

/// Pixel layouts with built-in accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownPixelFormat {
    Format1bppIndexed,
    Format4bppIndexed,
    Format8bppIndexed,
    Format8bppGrayScale,
    Format16bppGrayScale,
    Format16bppRgb555,
    Format16bppRgb565,
    Format16bppArgb1555,
    Format24bppRgb,
    Format32bppRgb,
    Format32bppArgb,
    Format32bppPArgb,
    Format48bppRgb,
    Format64bppArgb,
    Format64bppPArgb,
    Format96bppRgb,
    Format128bppRgba,
    Format128bppPRgba,
}

impl KnownPixelFormat {
    pub const ALL: [KnownPixelFormat; 18] = [
        KnownPixelFormat::Format1bppIndexed,
        KnownPixelFormat::Format4bppIndexed,
        KnownPixelFormat::Format8bppIndexed,
        KnownPixelFormat::Format8bppGrayScale,
        KnownPixelFormat::Format16bppGrayScale,
        KnownPixelFormat::Format16bppRgb555,
        KnownPixelFormat::Format16bppRgb565,
        KnownPixelFormat::Format16bppArgb1555,
        KnownPixelFormat::Format24bppRgb,
        KnownPixelFormat::Format32bppRgb,
        KnownPixelFormat::Format32bppArgb,
        KnownPixelFormat::Format32bppPArgb,
        KnownPixelFormat::Format48bppRgb,
        KnownPixelFormat::Format64bppArgb,
        KnownPixelFormat::Format64bppPArgb,
        KnownPixelFormat::Format96bppRgb,
        KnownPixelFormat::Format128bppRgba,
        KnownPixelFormat::Format128bppPRgba,
    ];

    pub const fn info(self) -> PixelFormatInfo {
        use KnownPixelFormat::*;
        match self {
            Format1bppIndexed => PixelFormatInfo::new_indexed(1),
            Format4bppIndexed => PixelFormatInfo::new_indexed(4),
            Format8bppIndexed => PixelFormatInfo::new_indexed(8),
            Format8bppGrayScale => PixelFormatInfo::new(8, 1).with_grayscale(true),
            Format16bppGrayScale => PixelFormatInfo::new(16, 1)
                .with_grayscale(true)
                .with_wide_channels(true),
            Format16bppRgb555 | Format16bppRgb565 | Format24bppRgb | Format32bppRgb => {
                PixelFormatInfo::new(self.bits(), 3)
            }
            Format16bppArgb1555 | Format32bppArgb => {
                PixelFormatInfo::new(self.bits(), 4).with_alpha(true)
            }
            Format32bppPArgb => PixelFormatInfo::new(32, 4).with_premultiplied_alpha(true),
            Format48bppRgb => PixelFormatInfo::new(48, 3).with_wide_channels(true),
            Format64bppArgb => PixelFormatInfo::new(64, 4)
                .with_alpha(true)
                .with_wide_channels(true),
            Format64bppPArgb => PixelFormatInfo::new(64, 4)
                .with_premultiplied_alpha(true)
                .with_wide_channels(true),
            Format96bppRgb => PixelFormatInfo::new(96, 3).with_linear_gamma(true),
            Format128bppRgba => PixelFormatInfo::new(128, 4)
                .with_alpha(true)
                .with_linear_gamma(true),
            Format128bppPRgba => PixelFormatInfo::new(128, 4)
                .with_premultiplied_alpha(true)
                .with_linear_gamma(true),
        }
    }

    const fn bits(self) -> u8 {
        use KnownPixelFormat::*;
        match self {
            Format1bppIndexed => 1,
            Format4bppIndexed => 4,
            Format8bppIndexed | Format8bppGrayScale => 8,
            Format16bppGrayScale | Format16bppRgb555 | Format16bppRgb565
            | Format16bppArgb1555 => 16,
            Format24bppRgb => 24,
            Format32bppRgb | Format32bppArgb | Format32bppPArgb => 32,
            Format48bppRgb => 48,
            Format64bppArgb | Format64bppPArgb => 64,
            Format96bppRgb => 96,
            Format128bppRgba | Format128bppPRgba => 128,
        }
    }

    /// Variant name without the `Format` prefix, e.g. `8bppIndexed`.
    pub fn name(self) -> &'static str {
        use KnownPixelFormat::*;
        match self {
            Format1bppIndexed => "1bppIndexed",
            Format4bppIndexed => "4bppIndexed",
            Format8bppIndexed => "8bppIndexed",
            Format8bppGrayScale => "8bppGrayScale",
            Format16bppGrayScale => "16bppGrayScale",
            Format16bppRgb555 => "16bppRgb555",
            Format16bppRgb565 => "16bppRgb565",
            Format16bppArgb1555 => "16bppArgb1555",
            Format24bppRgb => "24bppRgb",
            Format32bppRgb => "32bppRgb",
            Format32bppArgb => "32bppArgb",
            Format32bppPArgb => "32bppPArgb",
            Format48bppRgb => "48bppRgb",
            Format64bppArgb => "64bppArgb",
            Format64bppPArgb => "64bppPArgb",
            Format96bppRgb => "96bppRgb",
            Format128bppRgba => "128bppRgba",
            Format128bppPRgba => "128bppPRgba",
        }
    }
}

impl From<KnownPixelFormat> for PixelFormatInfo {
    fn from(format: KnownPixelFormat) -> Self {
        format.info()
    }
}

impl fmt::Display for KnownPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the variant name with or without the `Format` prefix, ignoring case.
impl FromStr for KnownPixelFormat {
    type Err = DrawingError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bare = match s.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("format") => &s[6..],
            _ => s,
        };
        KnownPixelFormat::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(bare))
            .ok_or_else(|| DrawingError::out_of_range(format!("unknown pixel format: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_format_is_valid() {
        for format in KnownPixelFormat::ALL {
            let info = format.info();
            assert!(info.validate().is_ok(), "{format}");
            assert_eq!(info.bits_per_pixel(), format.bits(), "{format}");
            assert!(!info.is_custom());
        }
    }

    #[test]
    fn test_indexed_capacity() {
        assert_eq!(KnownPixelFormat::Format1bppIndexed.info().max_palette_entries(), 2);
        assert_eq!(KnownPixelFormat::Format4bppIndexed.info().max_palette_entries(), 16);
        assert_eq!(KnownPixelFormat::Format8bppIndexed.info().max_palette_entries(), 256);
        assert_eq!(KnownPixelFormat::Format24bppRgb.info().max_palette_entries(), 0);
    }

    #[test]
    fn test_validate_rejects_wide_indexed() {
        assert!(PixelFormatInfo::new_indexed(16).validate().is_ok());
        assert!(matches!(
            PixelFormatInfo::new_indexed(24).validate(),
            Err(DrawingError::ArgumentOutOfRange(_))
        ));
        assert!(PixelFormatInfo::new(0, 1).validate().is_err());
    }

    #[test]
    fn test_bytes_for_width() {
        let one = KnownPixelFormat::Format1bppIndexed.info();
        assert_eq!(one.bytes_for_width(9), 2);
        let four = KnownPixelFormat::Format4bppIndexed.info();
        assert_eq!(four.bytes_for_width(3), 2);
        let rgb = KnownPixelFormat::Format24bppRgb.info();
        assert_eq!(rgb.bytes_for_width(5), 15);
        assert!(!four.is_byte_aligned());
        assert!(rgb.is_byte_aligned());
    }

    #[test]
    fn test_flags_and_precision() {
        let pargb = KnownPixelFormat::Format32bppPArgb.info();
        assert!(pargb.has_alpha() && pargb.has_premultiplied_alpha());
        assert_eq!(pargb.precision(), ColorPrecision::Bits8);
        assert_eq!(
            KnownPixelFormat::Format64bppArgb.info().precision(),
            ColorPrecision::Bits16
        );
        assert_eq!(
            KnownPixelFormat::Format128bppPRgba.info().precision(),
            ColorPrecision::Float
        );
        let custom = PixelFormatInfo::new(16, 4)
            .with_premultiplied_alpha(true)
            .with_custom(true);
        assert!(custom.has_alpha() && custom.is_custom());
        assert!(!custom.with_premultiplied_alpha(false).has_premultiplied_alpha());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "Format8bppIndexed".parse::<KnownPixelFormat>(),
            Ok(KnownPixelFormat::Format8bppIndexed)
        );
        assert_eq!(
            "32bppargb".parse::<KnownPixelFormat>(),
            Ok(KnownPixelFormat::Format32bppArgb)
        );
        assert!("12bppMagic".parse::<KnownPixelFormat>().is_err());
        for format in KnownPixelFormat::ALL {
            assert_eq!(format.to_string().parse::<KnownPixelFormat>(), Ok(format));
        }
    }
}
