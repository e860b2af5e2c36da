//! sRGB transfer function
//!
//! 8-bit decoding goes through a lookup table generated at compile time by
//! build.rs. Every other direction uses the IEC 61966-2-1 formula directly.

// Include the generated LUT from build.rs
include!(concat!(env!("OUT_DIR"), "/gamma_lut.rs"));

/// Linear value of an 8-bit sRGB level, read straight from the exact table.
#[inline]
pub fn srgb8_to_linear(value: u8) -> f32 {
    SRGB8_TO_LINEAR[value as usize]
}

/// Convert an sRGB value (0.0..=1.0) to linear light.
///
/// Out-of-range inputs are clamped.
#[inline]
pub fn srgb_to_linear(srgb: f32) -> f32 {
    let srgb = srgb.clamp(0.0, 1.0);
    if srgb <= 0.040_45 {
        srgb / 12.92
    } else {
        ((srgb + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert a linear value (0.0..=1.0) to gamma-encoded sRGB.
///
/// Out-of-range inputs are clamped.
#[inline]
pub fn linear_to_srgb(linear: f32) -> f32 {
    let linear = linear.clamp(0.0, 1.0);
    if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// Encode a linear value as an 8-bit sRGB level.
///
/// Every value produced by [`srgb8_to_linear`] maps back to its original level.
#[inline]
pub fn linear_to_srgb8(linear: f32) -> u8 {
    super::to_byte(linear_to_srgb(linear) * 255.0)
}

#[inline]
pub fn srgb16_to_linear(value: u16) -> f32 {
    srgb_to_linear(value as f32 / 65535.0)
}

#[inline]
pub fn linear_to_srgb16(linear: f32) -> u16 {
    super::to_word(linear_to_srgb(linear) * 65535.0)
}
