//! Fixed palettes and direct per-channel reductions.

use super::{QuantizerOptions, QuantizingSession};
use crate::color::{Color32, WorkingColorSpace};
use crate::palette::Palette;

/// The fixed color sets of [`Quantizer::Predefined`](super::Quantizer::Predefined).
#[derive(Debug, Clone, PartialEq)]
pub enum PredefinedQuantizer {
    BlackAndWhite,
    Grayscale4,
    Grayscale16,
    Grayscale256,
    SystemDefault4Bpp,
    SystemDefault8Bpp,
    Rgb332,
    /// 24-bit opaque colors, no palette.
    Rgb888,
    /// 5-6-5 bit opaque colors, no palette.
    Rgb565,
    /// 5-5-5 bit opaque colors, no palette.
    Rgb555,
    /// 5-5-5 bit colors with 1-bit alpha, no palette.
    Argb1555,
    /// Every 32-bit color as is.
    Argb8888,
    /// 256 gray shades, no palette.
    Grayscale,
    FromPalette(Palette),
}

impl PredefinedQuantizer {
    pub fn name(&self) -> &'static str {
        match self {
            PredefinedQuantizer::BlackAndWhite => "black-and-white",
            PredefinedQuantizer::Grayscale4 => "grayscale4",
            PredefinedQuantizer::Grayscale16 => "grayscale16",
            PredefinedQuantizer::Grayscale256 => "grayscale256",
            PredefinedQuantizer::SystemDefault4Bpp => "system-4bpp",
            PredefinedQuantizer::SystemDefault8Bpp => "system-8bpp",
            PredefinedQuantizer::Rgb332 => "rgb332",
            PredefinedQuantizer::Rgb888 => "rgb888",
            PredefinedQuantizer::Rgb565 => "rgb565",
            PredefinedQuantizer::Rgb555 => "rgb555",
            PredefinedQuantizer::Argb1555 => "argb1555",
            PredefinedQuantizer::Argb8888 => "argb8888",
            PredefinedQuantizer::Grayscale => "grayscale",
            PredefinedQuantizer::FromPalette(_) => "custom-palette",
        }
    }

    fn palette(&self) -> Option<Palette> {
        Some(match self {
            PredefinedQuantizer::BlackAndWhite => Palette::black_and_white(),
            PredefinedQuantizer::Grayscale4 => Palette::grayscale4(),
            PredefinedQuantizer::Grayscale16 => Palette::grayscale16(),
            PredefinedQuantizer::Grayscale256 => Palette::grayscale256(),
            PredefinedQuantizer::SystemDefault4Bpp => Palette::system_4bpp(),
            PredefinedQuantizer::SystemDefault8Bpp => Palette::system_8bpp(),
            PredefinedQuantizer::Rgb332 => Palette::rgb332(),
            PredefinedQuantizer::FromPalette(palette) => palette.clone(),
            _ => return None,
        })
    }

    fn direct(&self) -> Option<DirectMapping> {
        Some(match self {
            PredefinedQuantizer::Rgb888 => DirectMapping::Rgb888,
            PredefinedQuantizer::Rgb565 => DirectMapping::Rgb565,
            PredefinedQuantizer::Rgb555 => DirectMapping::Rgb555,
            PredefinedQuantizer::Argb1555 => DirectMapping::Argb1555,
            PredefinedQuantizer::Argb8888 => DirectMapping::Argb8888,
            PredefinedQuantizer::Grayscale => DirectMapping::Grayscale,
            _ => return None,
        })
    }
}

pub(super) fn session(
    kind: &PredefinedQuantizer,
    options: &QuantizerOptions,
    space: WorkingColorSpace,
) -> QuantizingSession {
    if let Some(palette) = kind.palette() {
        let palette = palette
            .with_back_color(options.back_color.to_opaque())
            .with_alpha_threshold(options.alpha_threshold)
            .with_working_color_space(space);
        return QuantizingSession::with_palette(palette, space);
    }
    // every kind without a palette has a direct mapping
    let mapping = kind.direct().unwrap_or(DirectMapping::Argb8888);
    QuantizingSession::direct(mapping, options, space)
}

/// Per-pixel reductions that need no palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectMapping {
    Rgb888,
    Rgb565,
    Rgb555,
    Argb1555,
    Argb8888,
    Grayscale,
}

/// Keep the top `bits` bits of `v` and replicate them into the low bits,
/// matching how 16-bit layouts widen their channels back to 8 bits.
#[inline]
fn truncate_bits(v: u8, bits: u32) -> u8 {
    let q = v >> (8 - bits);
    (q << (8 - bits)) | (q >> (2 * bits - 8))
}

impl DirectMapping {
    #[inline]
    pub fn apply(
        self,
        c: Color32,
        back: Color32,
        alpha_threshold: u8,
        space: WorkingColorSpace,
    ) -> Color32 {
        let flatten = |c: Color32| {
            if c.a == 255 {
                c
            } else {
                c.blend_with_background(back, space)
            }
        };
        match self {
            DirectMapping::Argb8888 => c,
            DirectMapping::Rgb888 => flatten(c),
            DirectMapping::Rgb565 => {
                let c = flatten(c);
                Color32::from_rgb(
                    truncate_bits(c.r, 5),
                    truncate_bits(c.g, 6),
                    truncate_bits(c.b, 5),
                )
            }
            DirectMapping::Rgb555 => {
                let c = flatten(c);
                Color32::from_rgb(
                    truncate_bits(c.r, 5),
                    truncate_bits(c.g, 5),
                    truncate_bits(c.b, 5),
                )
            }
            DirectMapping::Argb1555 if c.a < alpha_threshold => Color32::TRANSPARENT,
            DirectMapping::Argb1555 => DirectMapping::Rgb555.apply(c, back, alpha_threshold, space),
            DirectMapping::Grayscale => flatten(c).to_gray(space),
        }
    }

    pub fn is_grayscale(self) -> bool {
        self == DirectMapping::Grayscale
    }

    pub fn color_levels(self) -> u16 {
        match self {
            DirectMapping::Rgb565 | DirectMapping::Rgb555 | DirectMapping::Argb1555 => 32,
            DirectMapping::Rgb888 | DirectMapping::Argb8888 | DirectMapping::Grayscale => 256,
        }
    }
}
