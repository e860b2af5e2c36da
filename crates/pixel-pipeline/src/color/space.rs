//! Working color space selection.

use super::lut::{linear_to_srgb8, srgb8_to_linear};
use super::{to_byte, Color32};

/// Selects whether blending and quantization distance math operates on
/// gamma-encoded or linearized channel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkingColorSpace {
    /// Srgb for 8/16-bit data, linear for floating-point pixel formats.
    #[default]
    Default,
    /// Operate on gamma-encoded sRGB values.
    Srgb,
    /// Operate on linear-light values.
    Linear,
}

impl WorkingColorSpace {
    /// Returns true if math happens on linear values.
    ///
    /// `Default` is treated as sRGB; callers that know the data is floating
    /// point should resolve it first with [`resolve`](Self::resolve).
    #[inline]
    pub fn is_linear(self) -> bool {
        matches!(self, WorkingColorSpace::Linear)
    }

    /// Replace `Default` with the space that fits the pixel data.
    #[inline]
    pub fn resolve(self, prefers_linear: bool) -> Self {
        match self {
            WorkingColorSpace::Default if prefers_linear => WorkingColorSpace::Linear,
            WorkingColorSpace::Default => WorkingColorSpace::Srgb,
            other => other,
        }
    }

    /// RGB channels of `color` in this space, scaled to 0.0..=1.0.
    #[inline]
    pub fn to_working(self, color: Color32) -> [f32; 3] {
        if self.is_linear() {
            [
                srgb8_to_linear(color.r),
                srgb8_to_linear(color.g),
                srgb8_to_linear(color.b),
            ]
        } else {
            [
                color.r as f32 / 255.0,
                color.g as f32 / 255.0,
                color.b as f32 / 255.0,
            ]
        }
    }

    /// Inverse of [`to_working`](Self::to_working); values are clamped.
    #[inline]
    pub fn from_working(self, rgb: [f32; 3], a: u8) -> Color32 {
        if self.is_linear() {
            Color32::new(
                a,
                linear_to_srgb8(rgb[0]),
                linear_to_srgb8(rgb[1]),
                linear_to_srgb8(rgb[2]),
            )
        } else {
            Color32::new(
                a,
                to_byte(rgb[0] * 255.0),
                to_byte(rgb[1] * 255.0),
                to_byte(rgb[2] * 255.0),
            )
        }
    }

    /// Perceived brightness weights for this space.
    ///
    /// BT.601 luma weights for gamma-encoded values, BT.709 luminance
    /// coefficients for linear values.
    #[inline]
    pub fn brightness_weights(self) -> [f32; 3] {
        if self.is_linear() {
            [0.2126, 0.7152, 0.0722]
        } else {
            [0.299, 0.587, 0.114]
        }
    }
}
