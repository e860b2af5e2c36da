//! Floating-point colors in linear light.

use super::color32::{Color32, PColor32};
use super::color64::{Color64, PColor64};
use super::lut::{linear_to_srgb16, linear_to_srgb8, srgb16_to_linear, srgb8_to_linear};
use super::{to_byte, to_word};

/// A straight-alpha color with linear `f32` channels in 0.0..=1.0.
///
/// Values outside the range are allowed while computing (error diffusion
/// overshoots, for example) and are clipped when converted back to an
/// integer color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorF {
    pub a: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColorF {
    pub const TRANSPARENT: ColorF = ColorF::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: ColorF = ColorF::new(1.0, 0.0, 0.0, 0.0);
    pub const WHITE: ColorF = ColorF::new(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(a: f32, r: f32, g: f32, b: f32) -> Self {
        Self { a, r, g, b }
    }

    #[inline]
    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(1.0, r, g, b)
    }

    /// Clamp every channel to 0.0..=1.0. NaN becomes 0.
    #[inline]
    pub fn clip(self) -> Self {
        let c = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self::new(c(self.a), c(self.r), c(self.g), c(self.b))
    }

    #[inline]
    pub fn to_opaque(self) -> Self {
        Self::new(1.0, self.r, self.g, self.b)
    }

    #[inline]
    pub fn to_premultiplied(self) -> PColorF {
        PColorF::from(self)
    }

    /// Blend over an opaque background in linear light.
    pub fn blend_with_background(self, back: ColorF) -> Self {
        let alpha = self.a.clamp(0.0, 1.0);
        if alpha >= 1.0 {
            return self;
        }
        let inv = 1.0 - alpha;
        ColorF::from_rgb(
            self.r * alpha + back.r * inv,
            self.g * alpha + back.g * inv,
            self.b * alpha + back.b * inv,
        )
    }

    /// Relative luminance (BT.709).
    #[inline]
    pub fn luminance(self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

impl From<Color32> for ColorF {
    #[inline]
    fn from(c: Color32) -> Self {
        ColorF::new(
            c.a as f32 / 255.0,
            srgb8_to_linear(c.r),
            srgb8_to_linear(c.g),
            srgb8_to_linear(c.b),
        )
    }
}

impl From<ColorF> for Color32 {
    #[inline]
    fn from(c: ColorF) -> Self {
        Color32::new(
            to_byte(c.a * 255.0),
            linear_to_srgb8(c.r),
            linear_to_srgb8(c.g),
            linear_to_srgb8(c.b),
        )
    }
}

impl From<Color64> for ColorF {
    #[inline]
    fn from(c: Color64) -> Self {
        ColorF::new(
            c.a as f32 / 65535.0,
            srgb16_to_linear(c.r),
            srgb16_to_linear(c.g),
            srgb16_to_linear(c.b),
        )
    }
}

impl From<ColorF> for Color64 {
    #[inline]
    fn from(c: ColorF) -> Self {
        Color64::new(
            to_word(c.a * 65535.0),
            linear_to_srgb16(c.r),
            linear_to_srgb16(c.g),
            linear_to_srgb16(c.b),
        )
    }
}

/// A premultiplied color with linear `f32` channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PColorF {
    pub a: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl PColorF {
    #[inline]
    pub const fn new(a: f32, r: f32, g: f32, b: f32) -> Self {
        Self { a, r, g, b }
    }

    #[inline]
    pub fn to_straight(self) -> ColorF {
        ColorF::from(self)
    }
}

impl From<ColorF> for PColorF {
    #[inline]
    fn from(c: ColorF) -> Self {
        let a = c.a.clamp(0.0, 1.0);
        PColorF::new(a, c.r * a, c.g * a, c.b * a)
    }
}

impl From<PColorF> for ColorF {
    #[inline]
    fn from(c: PColorF) -> Self {
        if c.a <= 0.0 {
            return ColorF::TRANSPARENT;
        }
        ColorF::new(c.a, c.r / c.a, c.g / c.a, c.b / c.a)
    }
}

/// `From` between two types by way of a third one.
macro_rules! convert_via {
    ($($from:ident => $to:ident via $mid:ident;)*) => {
        $(
            impl From<$from> for $to {
                #[inline]
                fn from(c: $from) -> Self {
                    $to::from($mid::from(c))
                }
            }
        )*
    };
}

convert_via! {
    Color32 => PColor64 via Color64;
    PColor64 => Color32 via Color64;
    Color32 => PColorF via ColorF;
    PColorF => Color32 via ColorF;
    PColor32 => Color64 via Color32;
    Color64 => PColor32 via Color32;
    Color64 => PColorF via ColorF;
    PColorF => Color64 via ColorF;
    PColor32 => ColorF via Color32;
    ColorF => PColor32 via Color32;
    PColor64 => ColorF via Color64;
    ColorF => PColor64 via Color64;
    PColor32 => PColorF via ColorF;
    PColorF => PColor32 via Color32;
    PColor64 => PColorF via ColorF;
    PColorF => PColor64 via Color64;
}
