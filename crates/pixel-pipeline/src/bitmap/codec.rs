//! Per-format pixel encoding and decoding on row slices.
//!
//! Everything here works on one row of bytes and a pixel offset within it,
//! so the same code serves the bitmap accessors, the row cursors and the
//! row-parallel pipeline workers. The format is resolved once when the
//! bitmap is created; the hot path is a single `match` on a closed enum.

use std::fmt;
use std::sync::Arc;

use crate::color::lut::{linear_to_srgb16, srgb16_to_linear};
use crate::color::{
    to_word, Color32, Color64, ColorF, PColor32, PColor64, PColorF, WorkingColorSpace,
};
use crate::error::{DrawingError, Result};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::palette::Palette;

type Getter<T> = Arc<dyn Fn(&[u8], usize) -> T + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut [u8], usize, T) + Send + Sync>;

#[derive(Clone)]
pub(crate) enum CustomAccessors {
    Color32(Getter<Color32>, Setter<Color32>),
    Color64(Getter<Color64>, Setter<Color64>),
    ColorF(Getter<ColorF>, Setter<ColorF>),
    Indexed(Getter<u32>, Setter<u32>),
}

/// A caller-defined pixel layout.
///
/// The accessors receive one row of the buffer and the x coordinate of the
/// pixel; they must only touch the bytes of that pixel. Colors written to a
/// format without alpha are blended against the bitmap's back color before
/// the setter sees them.
///
/// # Example
///
/// ```
/// use pixel_pipeline::{BitmapData, Color32, CustomPixelFormat, PixelFormatInfo};
///
/// // 8-bit "red only" layout
/// let format = CustomPixelFormat::color32(
///     PixelFormatInfo::new(8, 1),
///     |row, x| Color32::from_rgb(row[x], 0, 0),
///     |row, x, c| row[x] = c.r,
/// );
/// let mut buffer = [0u8; 4];
/// let mut bitmap = BitmapData::from_custom(&mut buffer, 2, 2, 2, format).unwrap();
/// bitmap.set_color32(1, 0, Color32::from_rgb(200, 10, 10)).unwrap();
/// assert_eq!(bitmap.get_color32(1, 0).unwrap(), Color32::from_rgb(200, 0, 0));
/// ```
#[derive(Clone)]
pub struct CustomPixelFormat {
    info: PixelFormatInfo,
    accessors: CustomAccessors,
}

impl CustomPixelFormat {
    /// A direct format accessed as [`Color32`].
    pub fn color32(
        info: PixelFormatInfo,
        get: impl Fn(&[u8], usize) -> Color32 + Send + Sync + 'static,
        set: impl Fn(&mut [u8], usize, Color32) + Send + Sync + 'static,
    ) -> Self {
        Self {
            info: info.with_custom(true),
            accessors: CustomAccessors::Color32(Arc::new(get), Arc::new(set)),
        }
    }

    /// A direct format accessed as [`Color64`].
    pub fn color64(
        info: PixelFormatInfo,
        get: impl Fn(&[u8], usize) -> Color64 + Send + Sync + 'static,
        set: impl Fn(&mut [u8], usize, Color64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            info: info.with_custom(true).with_wide_channels(true),
            accessors: CustomAccessors::Color64(Arc::new(get), Arc::new(set)),
        }
    }

    /// A direct format accessed as linear [`ColorF`].
    pub fn color_f(
        info: PixelFormatInfo,
        get: impl Fn(&[u8], usize) -> ColorF + Send + Sync + 'static,
        set: impl Fn(&mut [u8], usize, ColorF) + Send + Sync + 'static,
    ) -> Self {
        Self {
            info: info.with_custom(true).with_linear_gamma(true),
            accessors: CustomAccessors::ColorF(Arc::new(get), Arc::new(set)),
        }
    }

    /// An indexed format; the accessors read and write palette indices.
    pub fn indexed(
        bits_per_pixel: u8,
        get: impl Fn(&[u8], usize) -> u32 + Send + Sync + 'static,
        set: impl Fn(&mut [u8], usize, u32) + Send + Sync + 'static,
    ) -> Self {
        Self {
            info: PixelFormatInfo::new_indexed(bits_per_pixel).with_custom(true),
            accessors: CustomAccessors::Indexed(Arc::new(get), Arc::new(set)),
        }
    }

    pub fn info(&self) -> PixelFormatInfo {
        self.info
    }
}

impl fmt::Debug for CustomPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPixelFormat")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) enum Codec {
    Known(KnownPixelFormat),
    Custom(CustomAccessors),
}

impl Codec {
    pub(crate) fn custom(format: CustomPixelFormat) -> (Codec, PixelFormatInfo) {
        (Codec::Custom(format.accessors), format.info)
    }
}

/// Settings used to write colors a format cannot represent exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Background {
    /// Always opaque.
    pub color: Color32,
    pub alpha_threshold: u8,
    /// Already resolved, never `Default`.
    pub space: WorkingColorSpace,
}

impl Background {
    #[inline]
    fn flatten32(&self, c: Color32) -> Color32 {
        if c.a == 255 {
            c
        } else {
            c.blend_with_background(self.color, self.space)
        }
    }

    #[inline]
    fn flatten64(&self, c: Color64) -> Color64 {
        if c.a == u16::MAX {
            c
        } else {
            c.blend_with_background(Color64::from(self.color), self.space)
        }
    }

    #[inline]
    fn flatten_f(&self, c: ColorF) -> ColorF {
        if c.a >= 1.0 {
            c
        } else if self.space.is_linear() {
            c.blend_with_background(ColorF::from(self.color))
        } else {
            ColorF::from(self.flatten64(Color64::from(c)))
        }
    }
}

/// Resolved pixel access for one bitmap.
pub(crate) struct PixelAccessor {
    pub codec: Codec,
    pub info: PixelFormatInfo,
    pub width: usize,
    pub palette: Option<Palette>,
    pub background: Background,
}

#[inline]
fn le_u16(row: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([row[offset], row[offset + 1]])
}

#[inline]
fn put_u16(row: &mut [u8], offset: usize, value: u16) {
    row[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn le_f32(row: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([row[offset], row[offset + 1], row[offset + 2], row[offset + 3]])
}

#[inline]
fn put_f32(row: &mut [u8], offset: usize, value: f32) {
    row[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn expand5(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

#[inline]
fn expand6(v: u16) -> u8 {
    let v = (v & 0x3F) as u8;
    (v << 2) | (v >> 4)
}

#[inline]
fn pack555(c: Color32) -> u16 {
    (c.r as u16 >> 3) << 10 | (c.g as u16 >> 3) << 5 | c.b as u16 >> 3
}

/// 16-bit gray level of `c`, see [`Color32::brightness`].
fn gray16(c: Color64, space: WorkingColorSpace) -> u16 {
    if c.r == c.g && c.g == c.b {
        return c.r;
    }
    let [wr, wg, wb] = space.brightness_weights();
    if space.is_linear() {
        let y = srgb16_to_linear(c.r) * wr + srgb16_to_linear(c.g) * wg + srgb16_to_linear(c.b) * wb;
        linear_to_srgb16(y)
    } else {
        to_word(c.r as f32 * wr + c.g as f32 * wg + c.b as f32 * wb)
    }
}

impl PixelAccessor {
    #[inline]
    fn palette_color(&self, index: u32) -> Color32 {
        self.palette
            .as_ref()
            .and_then(|p| p.get(index as usize))
            .unwrap_or(Color32::TRANSPARENT)
    }

    #[inline]
    fn nearest_index(&self, c: Color32) -> u32 {
        self.palette
            .as_ref()
            .map_or(0, |p| p.get_nearest_color_index(c) as u32)
    }

    /// Fail unless `index` is a valid entry of the palette and the format.
    pub fn check_index(&self, index: u32) -> Result<()> {
        if !self.info.is_indexed() {
            return Err(DrawingError::NotSupported(
                "color index access requires an indexed pixel format",
            ));
        }
        let palette_len = self.palette.as_ref().map_or(0, Palette::len);
        let max = palette_len.min(self.info.max_palette_entries());
        if index as usize >= max {
            return Err(DrawingError::IndexOutOfRange {
                index,
                max: max.saturating_sub(1) as u32,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn read_index(&self, row: &[u8], x: usize) -> u32 {
        match &self.codec {
            Codec::Known(KnownPixelFormat::Format1bppIndexed) => {
                ((row[x >> 3] >> (7 - (x & 7))) & 1) as u32
            }
            Codec::Known(KnownPixelFormat::Format4bppIndexed) => {
                let byte = row[x >> 1];
                (if x & 1 == 0 { byte >> 4 } else { byte & 0x0F }) as u32
            }
            Codec::Known(KnownPixelFormat::Format8bppIndexed) => row[x] as u32,
            Codec::Custom(CustomAccessors::Indexed(get, _)) => get(row, x),
            _ => 0,
        }
    }

    /// Store an index that already passed [`check_index`](Self::check_index).
    #[inline]
    pub fn write_index(&self, row: &mut [u8], x: usize, index: u32) {
        match &self.codec {
            Codec::Known(KnownPixelFormat::Format1bppIndexed) => {
                let mask = 0x80u8 >> (x & 7);
                if index & 1 != 0 {
                    row[x >> 3] |= mask;
                } else {
                    row[x >> 3] &= !mask;
                }
            }
            Codec::Known(KnownPixelFormat::Format4bppIndexed) => {
                let byte = &mut row[x >> 1];
                let nibble = (index & 0x0F) as u8;
                *byte = if x & 1 == 0 {
                    (*byte & 0x0F) | (nibble << 4)
                } else {
                    (*byte & 0xF0) | nibble
                };
            }
            Codec::Known(KnownPixelFormat::Format8bppIndexed) => row[x] = index as u8,
            Codec::Custom(CustomAccessors::Indexed(_, set)) => set(row, x, index),
            _ => {}
        }
    }

    pub fn read32(&self, row: &[u8], x: usize) -> Color32 {
        use KnownPixelFormat::*;
        let format = match &self.codec {
            Codec::Known(format) => *format,
            Codec::Custom(CustomAccessors::Color32(get, _)) => return get(row, x),
            Codec::Custom(CustomAccessors::Color64(..)) => {
                return Color32::from(self.read64(row, x))
            }
            Codec::Custom(CustomAccessors::ColorF(..)) => {
                return Color32::from(self.read_f(row, x))
            }
            Codec::Custom(CustomAccessors::Indexed(get, _)) => {
                return self.palette_color(get(row, x))
            }
        };
        match format {
            Format1bppIndexed | Format4bppIndexed | Format8bppIndexed => {
                self.palette_color(self.read_index(row, x))
            }
            Format8bppGrayScale => Color32::from_gray(row[x]),
            Format16bppRgb555 => {
                let v = le_u16(row, x * 2);
                Color32::from_rgb(expand5(v >> 10), expand5(v >> 5), expand5(v))
            }
            Format16bppRgb565 => {
                let v = le_u16(row, x * 2);
                Color32::from_rgb(expand5(v >> 11), expand6(v >> 5), expand5(v))
            }
            Format16bppArgb1555 => {
                let v = le_u16(row, x * 2);
                let a = if v & 0x8000 != 0 { 255 } else { 0 };
                Color32::new(a, expand5(v >> 10), expand5(v >> 5), expand5(v))
            }
            Format24bppRgb | Format32bppRgb => {
                let o = x * if format == Format24bppRgb { 3 } else { 4 };
                Color32::from_rgb(row[o + 2], row[o + 1], row[o])
            }
            Format32bppArgb => {
                let o = x * 4;
                Color32::new(row[o + 3], row[o + 2], row[o + 1], row[o])
            }
            Format32bppPArgb => {
                let o = x * 4;
                PColor32::new(row[o + 3], row[o + 2], row[o + 1], row[o]).to_straight()
            }
            Format16bppGrayScale | Format48bppRgb | Format64bppArgb | Format64bppPArgb => {
                Color32::from(self.read64(row, x))
            }
            Format96bppRgb | Format128bppRgba | Format128bppPRgba => {
                Color32::from(self.read_f(row, x))
            }
        }
    }

    pub fn read64(&self, row: &[u8], x: usize) -> Color64 {
        use KnownPixelFormat::*;
        match &self.codec {
            Codec::Known(Format16bppGrayScale) => {
                let v = le_u16(row, x * 2);
                Color64::from_rgb(v, v, v)
            }
            Codec::Known(Format48bppRgb) => {
                let o = x * 6;
                Color64::from_rgb(le_u16(row, o + 4), le_u16(row, o + 2), le_u16(row, o))
            }
            Codec::Known(format @ (Format64bppArgb | Format64bppPArgb)) => {
                let o = x * 8;
                let (b, g, r, a) = (
                    le_u16(row, o),
                    le_u16(row, o + 2),
                    le_u16(row, o + 4),
                    le_u16(row, o + 6),
                );
                if *format == Format64bppArgb {
                    Color64::new(a, r, g, b)
                } else {
                    PColor64::new(a, r, g, b).to_straight()
                }
            }
            Codec::Known(Format96bppRgb | Format128bppRgba | Format128bppPRgba)
            | Codec::Custom(CustomAccessors::ColorF(..)) => Color64::from(self.read_f(row, x)),
            Codec::Custom(CustomAccessors::Color64(get, _)) => get(row, x),
            _ => Color64::from(self.read32(row, x)),
        }
    }

    pub fn read_f(&self, row: &[u8], x: usize) -> ColorF {
        use KnownPixelFormat::*;
        match &self.codec {
            Codec::Known(Format96bppRgb) => {
                let o = x * 12;
                ColorF::from_rgb(le_f32(row, o), le_f32(row, o + 4), le_f32(row, o + 8))
            }
            Codec::Known(format @ (Format128bppRgba | Format128bppPRgba)) => {
                let o = x * 16;
                let (r, g, b, a) = (
                    le_f32(row, o),
                    le_f32(row, o + 4),
                    le_f32(row, o + 8),
                    le_f32(row, o + 12),
                );
                if *format == Format128bppRgba {
                    ColorF::new(a, r, g, b)
                } else {
                    PColorF::new(a, r, g, b).to_straight()
                }
            }
            Codec::Known(Format16bppGrayScale | Format48bppRgb | Format64bppArgb | Format64bppPArgb)
            | Codec::Custom(CustomAccessors::Color64(..)) => ColorF::from(self.read64(row, x)),
            Codec::Custom(CustomAccessors::ColorF(get, _)) => get(row, x),
            _ => ColorF::from(self.read32(row, x)),
        }
    }

    pub fn write32(&self, row: &mut [u8], x: usize, c: Color32) {
        use KnownPixelFormat::*;
        let bg = &self.background;
        let format = match &self.codec {
            Codec::Known(format) => *format,
            Codec::Custom(CustomAccessors::Color32(_, set)) => {
                let c = if self.info.has_alpha() { c } else { bg.flatten32(c) };
                return set(row, x, c);
            }
            Codec::Custom(CustomAccessors::Color64(..)) => {
                return self.write64(row, x, Color64::from(c))
            }
            Codec::Custom(CustomAccessors::ColorF(..)) => {
                return self.write_f(row, x, ColorF::from(c))
            }
            Codec::Custom(CustomAccessors::Indexed(_, set)) => {
                return set(row, x, self.nearest_index(c))
            }
        };
        match format {
            Format1bppIndexed | Format4bppIndexed | Format8bppIndexed => {
                self.write_index(row, x, self.nearest_index(c))
            }
            Format8bppGrayScale => row[x] = bg.flatten32(c).brightness(bg.space),
            Format16bppRgb555 => put_u16(row, x * 2, pack555(bg.flatten32(c))),
            Format16bppRgb565 => {
                let c = bg.flatten32(c);
                let v = (c.r as u16 >> 3) << 11 | (c.g as u16 >> 2) << 5 | c.b as u16 >> 3;
                put_u16(row, x * 2, v);
            }
            Format16bppArgb1555 => {
                let v = if c.a < bg.alpha_threshold {
                    0
                } else {
                    0x8000 | pack555(bg.flatten32(c))
                };
                put_u16(row, x * 2, v);
            }
            Format24bppRgb => {
                let c = bg.flatten32(c);
                row[x * 3..x * 3 + 3].copy_from_slice(&[c.b, c.g, c.r]);
            }
            Format32bppRgb => {
                let c = bg.flatten32(c);
                row[x * 4..x * 4 + 4].copy_from_slice(&[c.b, c.g, c.r, 255]);
            }
            Format32bppArgb => row[x * 4..x * 4 + 4].copy_from_slice(&[c.b, c.g, c.r, c.a]),
            Format32bppPArgb => {
                let p = c.to_premultiplied();
                row[x * 4..x * 4 + 4].copy_from_slice(&[p.b, p.g, p.r, p.a]);
            }
            Format16bppGrayScale | Format48bppRgb | Format64bppArgb | Format64bppPArgb => {
                self.write64(row, x, Color64::from(c))
            }
            Format96bppRgb | Format128bppRgba | Format128bppPRgba => {
                self.write_f(row, x, ColorF::from(c))
            }
        }
    }

    pub fn write64(&self, row: &mut [u8], x: usize, c: Color64) {
        use KnownPixelFormat::*;
        let bg = &self.background;
        match &self.codec {
            Codec::Known(Format16bppGrayScale) => {
                put_u16(row, x * 2, gray16(bg.flatten64(c), bg.space))
            }
            Codec::Known(Format48bppRgb) => {
                let c = bg.flatten64(c);
                let o = x * 6;
                put_u16(row, o, c.b);
                put_u16(row, o + 2, c.g);
                put_u16(row, o + 4, c.r);
            }
            Codec::Known(format @ (Format64bppArgb | Format64bppPArgb)) => {
                let o = x * 8;
                let (a, r, g, b) = if *format == Format64bppArgb {
                    (c.a, c.r, c.g, c.b)
                } else {
                    let p = c.to_premultiplied();
                    (p.a, p.r, p.g, p.b)
                };
                put_u16(row, o, b);
                put_u16(row, o + 2, g);
                put_u16(row, o + 4, r);
                put_u16(row, o + 6, a);
            }
            Codec::Known(Format96bppRgb | Format128bppRgba | Format128bppPRgba)
            | Codec::Custom(CustomAccessors::ColorF(..)) => self.write_f(row, x, ColorF::from(c)),
            Codec::Custom(CustomAccessors::Color64(_, set)) => {
                let c = if self.info.has_alpha() { c } else { bg.flatten64(c) };
                set(row, x, c)
            }
            _ => self.write32(row, x, Color32::from(c)),
        }
    }

    pub fn write_f(&self, row: &mut [u8], x: usize, c: ColorF) {
        use KnownPixelFormat::*;
        let bg = &self.background;
        match &self.codec {
            Codec::Known(Format96bppRgb) => {
                let c = bg.flatten_f(c).clip();
                let o = x * 12;
                put_f32(row, o, c.r);
                put_f32(row, o + 4, c.g);
                put_f32(row, o + 8, c.b);
            }
            Codec::Known(format @ (Format128bppRgba | Format128bppPRgba)) => {
                let c = c.clip();
                let (a, r, g, b) = if *format == Format128bppRgba {
                    (c.a, c.r, c.g, c.b)
                } else {
                    let p = c.to_premultiplied();
                    (p.a, p.r, p.g, p.b)
                };
                let o = x * 16;
                put_f32(row, o, r);
                put_f32(row, o + 4, g);
                put_f32(row, o + 8, b);
                put_f32(row, o + 12, a);
            }
            Codec::Known(Format16bppGrayScale | Format48bppRgb | Format64bppArgb | Format64bppPArgb)
            | Codec::Custom(CustomAccessors::Color64(..)) => {
                self.write64(row, x, Color64::from(c))
            }
            Codec::Custom(CustomAccessors::ColorF(_, set)) => {
                let c = if self.info.has_alpha() { c } else { bg.flatten_f(c) };
                set(row, x, c)
            }
            _ => self.write32(row, x, Color32::from(c)),
        }
    }
}
