//! Color types and conversion utilities
//!
//! Three precisions are available, each in a straight-alpha and a
//! premultiplied-alpha flavor:
//!
//! - [`Color32`] / [`PColor32`]: 8 bits per channel, sRGB encoded.
//! - [`Color64`] / [`PColor64`]: 16 bits per channel, sRGB encoded.
//! - [`ColorF`] / [`PColorF`]: `f32` per channel, *linear* light.
//!
//! Every type converts to and from the others with `From`. The 8-bit
//! round trip through any of the wider types is lossless.
//!
//! # Example
//!
//! ```
//! use pixel_pipeline::{Color32, ColorF};
//!
//! let c = Color32::new(255, 128, 64, 32);
//! let linear = ColorF::from(c);
//! assert!(linear.r < 0.5);
//! assert_eq!(Color32::from(linear), c);
//! ```

mod color32;
mod color64;
mod color_f;
pub(crate) mod lut;
mod hex;
mod space;

pub use color32::{Color32, PColor32};
pub use color64::{Color64, PColor64};
pub use color_f::{ColorF, PColorF};
pub use hex::ParseColorError;
pub use space::WorkingColorSpace;

/// Round half away from zero, then clamp to 0..=255.
#[inline]
pub(crate) fn to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Round half away from zero, then clamp to 0..=65535.
#[inline]
pub(crate) fn to_word(value: f32) -> u16 {
    value.round().clamp(0.0, 65535.0) as u16
}
