//! 8-bit per channel colors.

use super::lut::{linear_to_srgb8, srgb8_to_linear};
use super::space::WorkingColorSpace;
use super::to_byte;

/// A 32-bit ARGB color with straight (non-premultiplied) alpha, sRGB encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Color32 {
    /// Alpha channel (0 = transparent, 255 = opaque)
    pub a: u8,
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Color32 {
    pub const TRANSPARENT: Color32 = Color32::new(0, 0, 0, 0);
    pub const BLACK: Color32 = Color32::from_rgb(0, 0, 0);
    pub const WHITE: Color32 = Color32::from_rgb(255, 255, 255);

    #[inline]
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// An opaque color.
    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(255, r, g, b)
    }

    /// An opaque gray shade.
    #[inline]
    pub const fn from_gray(value: u8) -> Self {
        Self::new(255, value, value, value)
    }

    /// Decode a `0xAARRGGBB` value.
    #[inline]
    pub const fn from_argb_u32(argb: u32) -> Self {
        Self::new(
            (argb >> 24) as u8,
            (argb >> 16) as u8,
            (argb >> 8) as u8,
            argb as u8,
        )
    }

    /// Encode as `0xAARRGGBB`.
    #[inline]
    pub const fn to_argb_u32(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    #[inline]
    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }

    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    #[inline]
    pub const fn to_opaque(self) -> Self {
        Self::new(255, self.r, self.g, self.b)
    }

    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(a, self.r, self.g, self.b)
    }

    /// Scale the color channels by alpha.
    #[inline]
    pub fn to_premultiplied(self) -> PColor32 {
        PColor32::from(self)
    }

    /// Blend this color over an opaque background.
    ///
    /// The alpha of `back` is ignored; the result is always opaque.
    pub fn blend_with_background(self, back: Color32, space: WorkingColorSpace) -> Self {
        match self.a {
            255 => self,
            0 => back.to_opaque(),
            a if space.is_linear() => {
                let alpha = a as f32 / 255.0;
                let inv = 1.0 - alpha;
                let mix = |fore: u8, back: u8| {
                    linear_to_srgb8(srgb8_to_linear(fore) * alpha + srgb8_to_linear(back) * inv)
                };
                Color32::from_rgb(
                    mix(self.r, back.r),
                    mix(self.g, back.g),
                    mix(self.b, back.b),
                )
            }
            a => {
                let alpha = a as u32;
                let inv = 255 - alpha;
                let mix =
                    |fore: u8, back: u8| ((fore as u32 * alpha + back as u32 * inv + 127) / 255) as u8;
                Color32::from_rgb(
                    mix(self.r, back.r),
                    mix(self.g, back.g),
                    mix(self.b, back.b),
                )
            }
        }
    }

    /// Perceived brightness as an 8-bit level, ignoring alpha.
    pub fn brightness(self, space: WorkingColorSpace) -> u8 {
        if self.r == self.g && self.g == self.b {
            return self.r;
        }
        let [wr, wg, wb] = space.brightness_weights();
        if space.is_linear() {
            let y = srgb8_to_linear(self.r) * wr
                + srgb8_to_linear(self.g) * wg
                + srgb8_to_linear(self.b) * wb;
            linear_to_srgb8(y)
        } else {
            to_byte(self.r as f32 * wr + self.g as f32 * wg + self.b as f32 * wb)
        }
    }

    /// Gray shade of the same brightness, alpha preserved.
    #[inline]
    pub fn to_gray(self, space: WorkingColorSpace) -> Self {
        let v = self.brightness(space);
        Self::new(self.a, v, v, v)
    }
}

impl From<u32> for Color32 {
    fn from(argb: u32) -> Self {
        Color32::from_argb_u32(argb)
    }
}

/// A 32-bit ARGB color with premultiplied alpha.
///
/// Invariant: `r`, `g` and `b` never exceed `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PColor32 {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PColor32 {
    /// Create a premultiplied color; channels above `a` are clipped to `a`.
    #[inline]
    pub fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self {
            a,
            r: r.min(a),
            g: g.min(a),
            b: b.min(a),
        }
    }

    /// Undo the premultiplication.
    ///
    /// A fully transparent color has no recoverable channels and becomes
    /// [`Color32::TRANSPARENT`].
    #[inline]
    pub fn to_straight(self) -> Color32 {
        Color32::from(self)
    }
}

impl From<Color32> for PColor32 {
    #[inline]
    fn from(c: Color32) -> Self {
        match c.a {
            255 => PColor32 {
                a: 255,
                r: c.r,
                g: c.g,
                b: c.b,
            },
            0 => PColor32::default(),
            a => {
                let alpha = a as u32;
                let mul = |v: u8| ((v as u32 * alpha + 127) / 255) as u8;
                PColor32 {
                    a,
                    r: mul(c.r),
                    g: mul(c.g),
                    b: mul(c.b),
                }
            }
        }
    }
}

impl From<PColor32> for Color32 {
    #[inline]
    fn from(c: PColor32) -> Self {
        match c.a {
            255 => Color32::new(255, c.r, c.g, c.b),
            0 => Color32::TRANSPARENT,
            a => {
                let alpha = a as u32;
                let div = |v: u8| ((v as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
                Color32::new(a, div(c.r), div(c.g), div(c.b))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_u32_round_trip() {
        let c = Color32::from_argb_u32(0x80FF4020);
        assert_eq!(c, Color32::new(0x80, 0xFF, 0x40, 0x20));
        assert_eq!(c.to_argb_u32(), 0x80FF4020);
    }

    /// Premultiplied channels must never exceed alpha, for any input.
    #[test]
    fn test_premultiplied_invariant_exhaustive_alpha() {
        for a in 0..=255u8 {
            for v in [0u8, 1, 64, 127, 128, 200, 254, 255] {
                let p = Color32::new(a, v, 255, 255 - v).to_premultiplied();
                assert!(p.r <= p.a && p.g <= p.a && p.b <= p.a, "{p:?}");
            }
        }
    }

    #[test]
    fn test_premultiply_rounds() {
        let p = Color32::new(128, 255, 100, 1).to_premultiplied();
        assert_eq!(p, PColor32::new(128, 128, 50, 1));
    }

    #[test]
    fn test_unpremultiply_zero_alpha_is_zeroed() {
        let p = PColor32::new(0, 0, 0, 0);
        assert_eq!(p.to_straight(), Color32::TRANSPARENT);
    }

    #[test]
    fn test_premultiply_round_trip_opaque_and_high_alpha() {
        for v in 0..=255u8 {
            let c = Color32::from_rgb(v, v / 3, 255 - v);
            assert_eq!(c.to_premultiplied().to_straight(), c);
        }
        // High alpha is lossless within one level.
        let c = Color32::new(250, 13, 77, 201);
        let back = c.to_premultiplied().to_straight();
        assert!((back.r as i32 - c.r as i32).abs() <= 1);
        assert!((back.b as i32 - c.b as i32).abs() <= 1);
    }

    #[test]
    fn test_pcolor_new_clips_to_alpha() {
        let p = PColor32::new(100, 255, 50, 101);
        assert_eq!((p.r, p.g, p.b), (100, 50, 100));
    }

    #[test]
    fn test_blend_srgb() {
        let half_red = Color32::new(128, 255, 0, 0);
        let blended = half_red.blend_with_background(Color32::WHITE, WorkingColorSpace::Srgb);
        assert_eq!(blended, Color32::from_rgb(255, 127, 127));
    }

    #[test]
    fn test_blend_linear_is_brighter_than_srgb_over_black() {
        let c = Color32::new(128, 255, 255, 255);
        let srgb = c.blend_with_background(Color32::BLACK, WorkingColorSpace::Srgb);
        let linear = c.blend_with_background(Color32::BLACK, WorkingColorSpace::Linear);
        assert!(linear.r > srgb.r);
        assert!(linear.is_opaque() && srgb.is_opaque());
    }

    #[test]
    fn test_blend_edge_alphas() {
        let back = Color32::new(10, 1, 2, 3);
        assert_eq!(
            Color32::TRANSPARENT.blend_with_background(back, WorkingColorSpace::Srgb),
            Color32::from_rgb(1, 2, 3)
        );
        let opaque = Color32::from_rgb(9, 9, 9);
        assert_eq!(
            opaque.blend_with_background(back, WorkingColorSpace::Linear),
            opaque
        );
    }

    #[test]
    fn test_brightness() {
        assert_eq!(Color32::WHITE.brightness(WorkingColorSpace::Srgb), 255);
        assert_eq!(Color32::from_gray(77).brightness(WorkingColorSpace::Linear), 77);
        assert_eq!(Color32::from_rgb(255, 0, 0).brightness(WorkingColorSpace::Srgb), 76);
        let green = Color32::from_rgb(0, 255, 0);
        assert!(
            green.brightness(WorkingColorSpace::Linear) > green.brightness(WorkingColorSpace::Srgb)
        );
    }
}
