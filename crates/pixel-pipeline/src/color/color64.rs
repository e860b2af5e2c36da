//! 16-bit per channel colors.

use super::color32::{Color32, PColor32};
use super::space::WorkingColorSpace;

#[inline]
pub(crate) const fn widen(c: u8) -> u16 {
    c as u16 * 257
}

#[inline]
pub(crate) const fn narrow(c: u16) -> u8 {
    ((c as u32 + 128) / 257) as u8
}

/// A 64-bit ARGB color with straight alpha, sRGB encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color64 {
    pub a: u16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Color64 {
    pub const TRANSPARENT: Color64 = Color64::new(0, 0, 0, 0);
    pub const BLACK: Color64 = Color64::new(u16::MAX, 0, 0, 0);
    pub const WHITE: Color64 = Color64::new(u16::MAX, u16::MAX, u16::MAX, u16::MAX);

    #[inline]
    pub const fn new(a: u16, r: u16, g: u16, b: u16) -> Self {
        Self { a, r, g, b }
    }

    #[inline]
    pub const fn from_rgb(r: u16, g: u16, b: u16) -> Self {
        Self::new(u16::MAX, r, g, b)
    }

    #[inline]
    pub const fn to_opaque(self) -> Self {
        Self::new(u16::MAX, self.r, self.g, self.b)
    }

    #[inline]
    pub fn to_premultiplied(self) -> PColor64 {
        PColor64::from(self)
    }

    /// Blend over an opaque background, see [`Color32::blend_with_background`].
    pub fn blend_with_background(self, back: Color64, space: WorkingColorSpace) -> Self {
        match self.a {
            u16::MAX => self,
            0 => back.to_opaque(),
            _ if space.is_linear() => {
                let fore = super::ColorF::from(self);
                let back = super::ColorF::from(back);
                Color64::from(fore.blend_with_background(back))
            }
            a => {
                let alpha = a as u64;
                let inv = 65535 - alpha;
                let mix = |fore: u16, back: u16| {
                    ((fore as u64 * alpha + back as u64 * inv + 32767) / 65535) as u16
                };
                Color64::from_rgb(
                    mix(self.r, back.r),
                    mix(self.g, back.g),
                    mix(self.b, back.b),
                )
            }
        }
    }
}

impl From<Color32> for Color64 {
    #[inline]
    fn from(c: Color32) -> Self {
        Color64::new(widen(c.a), widen(c.r), widen(c.g), widen(c.b))
    }
}

impl From<Color64> for Color32 {
    #[inline]
    fn from(c: Color64) -> Self {
        Color32::new(narrow(c.a), narrow(c.r), narrow(c.g), narrow(c.b))
    }
}

/// A 64-bit ARGB color with premultiplied alpha.
///
/// Invariant: `r`, `g` and `b` never exceed `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PColor64 {
    pub a: u16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl PColor64 {
    /// Create a premultiplied color; channels above `a` are clipped to `a`.
    #[inline]
    pub fn new(a: u16, r: u16, g: u16, b: u16) -> Self {
        Self {
            a,
            r: r.min(a),
            g: g.min(a),
            b: b.min(a),
        }
    }

    #[inline]
    pub fn to_straight(self) -> Color64 {
        Color64::from(self)
    }
}

impl From<Color64> for PColor64 {
    #[inline]
    fn from(c: Color64) -> Self {
        match c.a {
            u16::MAX => PColor64 {
                a: u16::MAX,
                r: c.r,
                g: c.g,
                b: c.b,
            },
            0 => PColor64::default(),
            a => {
                let alpha = a as u32;
                let mul = |v: u16| ((v as u32 * alpha + 32767) / 65535) as u16;
                PColor64 {
                    a,
                    r: mul(c.r),
                    g: mul(c.g),
                    b: mul(c.b),
                }
            }
        }
    }
}

impl From<PColor64> for Color64 {
    #[inline]
    fn from(c: PColor64) -> Self {
        match c.a {
            u16::MAX => Color64::new(u16::MAX, c.r, c.g, c.b),
            0 => Color64::TRANSPARENT,
            a => {
                let alpha = a as u32;
                let div = |v: u16| ((v as u32 * 65535 + alpha / 2) / alpha).min(65535) as u16;
                Color64::new(a, div(c.r), div(c.g), div(c.b))
            }
        }
    }
}

impl From<PColor32> for PColor64 {
    #[inline]
    fn from(c: PColor32) -> Self {
        PColor64 {
            a: widen(c.a),
            r: widen(c.r),
            g: widen(c.g),
            b: widen(c.b),
        }
    }
}

impl From<PColor64> for PColor32 {
    #[inline]
    fn from(c: PColor64) -> Self {
        // narrow() is monotonic, so the alpha bound survives
        PColor32::new(narrow(c.a), narrow(c.r), narrow(c.g), narrow(c.b))
    }
}
