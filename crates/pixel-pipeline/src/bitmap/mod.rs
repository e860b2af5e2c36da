//! Format-agnostic bitmap buffers
//!
//! [`BitmapData`] wraps a byte buffer laid out as rows of `stride` bytes and
//! exposes typed pixel access for any [`KnownPixelFormat`] or
//! [`CustomPixelFormat`]. The buffer is either owned by the bitmap or
//! borrowed from the caller.
//!
//! # Lifecycle
//!
//! A bitmap is disposed exactly once, either explicitly with
//! [`BitmapData::dispose`] or when it is dropped. Disposal releases an owned
//! buffer and runs the dispose callback, if one was registered. Any access
//! after that fails with [`DrawingError::Disposed`]. Row cursors borrow the
//! bitmap, so a cursor can never outlive it.
//!
//! # Example
//!
//! ```
//! use pixel_pipeline::{BitmapData, Color32, KnownPixelFormat};
//!
//! let mut bitmap = BitmapData::new(4, 2, KnownPixelFormat::Format24bppRgb).unwrap();
//! bitmap.set_color32(3, 1, Color32::from_rgb(10, 20, 30)).unwrap();
//!
//! let mut row = bitmap.first_row().unwrap();
//! assert!(row.move_next_row());
//! assert_eq!(row.get_color32(3).unwrap(), Color32::from_rgb(10, 20, 30));
//! assert!(!row.move_next_row());
//! ```

mod codec;
mod row;
mod traits;

use std::collections::HashSet;
use std::fmt;

use bytemuck::Pod;

pub use codec::CustomPixelFormat;
pub use row::{RowCursor, RowCursorMut};
pub use traits::{ReadWriteBitmapData, ReadableBitmapData, WritableBitmapData};

pub(crate) use codec::PixelAccessor;

use codec::{Background, Codec};

use crate::color::{Color32, Color64, ColorF, WorkingColorSpace};
use crate::error::{DrawingError, Result};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::palette::{Palette, DEFAULT_ALPHA_THRESHOLD};

enum Buffer<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl Buffer<'_> {
    #[inline]
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Borrowed(s) => s,
        }
    }

    #[inline]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Borrowed(s) => s,
        }
    }
}

/// Which direction of pixel access a bitmap allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

type DisposeCallback<'a> = Box<dyn FnOnce() + Send + Sync + 'a>;

/// Mutable view of all rows, handed to the pipeline workers.
pub(crate) struct RowsMut<'b> {
    pub accessor: &'b PixelAccessor,
    pub data: &'b mut [u8],
    pub stride: usize,
}

/// A rectangular pixel buffer of any supported format.
pub struct BitmapData<'a> {
    buffer: Buffer<'a>,
    height: usize,
    stride: usize,
    accessor: PixelAccessor,
    known_format: Option<KnownPixelFormat>,
    working_color_space: WorkingColorSpace,
    access: AccessMode,
    on_dispose: Option<DisposeCallback<'a>>,
    disposed: bool,
}

impl BitmapData<'static> {
    /// Allocate a zeroed bitmap with tightly packed rows.
    ///
    /// Indexed formats get a default palette: black and white for 1bpp,
    /// the 16 system colors for 4bpp and the 256-color system palette for
    /// 8bpp.
    pub fn new(width: usize, height: usize, format: KnownPixelFormat) -> Result<Self> {
        let stride = row_bytes(width, format.info())?;
        let len = checked_len(stride, height)?;
        Self::from_vec(vec![0; len], width, height, stride, format)
    }

    /// Take ownership of an existing buffer.
    pub fn from_vec(
        buffer: Vec<u8>,
        width: usize,
        height: usize,
        stride: usize,
        format: KnownPixelFormat,
    ) -> Result<Self> {
        Self::build(
            Buffer::Owned(buffer),
            width,
            height,
            stride,
            Codec::Known(format),
            format.info(),
        )
    }
}

impl<'a> BitmapData<'a> {
    /// Wrap a caller-owned buffer of a known format.
    ///
    /// # Errors
    ///
    /// [`DrawingError::ArgumentOutOfRange`] if `stride` is too small for
    /// `width` pixels or the buffer is shorter than `stride * height`.
    pub fn from_buffer(
        buffer: &'a mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        format: KnownPixelFormat,
    ) -> Result<Self> {
        Self::build(
            Buffer::Borrowed(buffer),
            width,
            height,
            stride,
            Codec::Known(format),
            format.info(),
        )
    }

    /// Wrap a caller-owned buffer with caller-supplied pixel accessors.
    pub fn from_custom(
        buffer: &'a mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        format: CustomPixelFormat,
    ) -> Result<Self> {
        let (codec, info) = Codec::custom(format);
        Self::build(Buffer::Borrowed(buffer), width, height, stride, codec, info)
    }

    fn build(
        buffer: Buffer<'a>,
        width: usize,
        height: usize,
        stride: usize,
        codec: Codec,
        info: PixelFormatInfo,
    ) -> Result<Self> {
        info.validate()?;
        let needed = row_bytes(width, info)?;
        if stride < needed {
            return Err(DrawingError::out_of_range(format!(
                "stride {stride} is smaller than the {needed} bytes a row of {width} pixels needs"
            )));
        }
        let len = checked_len(stride, height)?;
        if buffer.as_slice().len() < len {
            return Err(DrawingError::out_of_range(format!(
                "buffer of {} bytes is shorter than stride * height = {len}",
                buffer.as_slice().len()
            )));
        }

        let known_format = match codec {
            Codec::Known(format) => Some(format),
            Codec::Custom(_) => None,
        };
        let working_color_space = WorkingColorSpace::Default;
        let background = Background {
            color: Color32::BLACK,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            space: working_color_space.resolve(info.is_linear_gamma()),
        };
        let palette = info
            .is_indexed()
            .then(|| Palette::for_format(info.bits_per_pixel()));

        tracing::trace!(
            width,
            height,
            stride,
            bits_per_pixel = info.bits_per_pixel(),
            custom = info.is_custom(),
            "Bitmap data created"
        );

        let mut bitmap = Self {
            buffer,
            height,
            stride,
            accessor: PixelAccessor {
                codec,
                info,
                width,
                palette: None,
                background,
            },
            known_format,
            working_color_space,
            access: AccessMode::ReadWrite,
            on_dispose: None,
            disposed: false,
        };
        bitmap.accessor.palette = palette.map(|p| bitmap.adapt_palette(p));
        Ok(bitmap)
    }

    /// Palette carrying this bitmap's back color, threshold and color space.
    fn adapt_palette(&self, palette: Palette) -> Palette {
        let bg = &self.accessor.background;
        if palette.back_color() == bg.color
            && palette.alpha_threshold() == bg.alpha_threshold
            && palette.working_color_space() == self.working_color_space
        {
            return palette;
        }
        palette
            .with_back_color(bg.color)
            .with_alpha_threshold(bg.alpha_threshold)
            .with_working_color_space(self.working_color_space)
    }

    fn sync_palette(&mut self) {
        if let Some(palette) = self.accessor.palette.take() {
            self.accessor.palette = Some(self.adapt_palette(palette));
        }
    }

    /// Use `palette` for an indexed format.
    ///
    /// The bitmap adopts the palette's back color, alpha threshold and
    /// working color space.
    ///
    /// # Errors
    ///
    /// [`DrawingError::InvalidOperation`] if the format is not indexed or the
    /// palette has more entries than the format can address.
    pub fn with_palette(mut self, palette: Palette) -> Result<Self> {
        let info = self.accessor.info;
        if !info.is_indexed() {
            return Err(DrawingError::invalid_operation(
                "only indexed pixel formats have a palette",
            ));
        }
        if palette.len() > info.max_palette_entries() {
            return Err(DrawingError::invalid_operation(format!(
                "palette of {} entries is too large for a {}bpp format",
                palette.len(),
                info.bits_per_pixel()
            )));
        }
        self.accessor.background.color = palette.back_color();
        self.accessor.background.alpha_threshold = palette.alpha_threshold();
        self.working_color_space = palette.working_color_space();
        self.accessor.background.space = self
            .working_color_space
            .resolve(info.is_linear_gamma());
        self.accessor.palette = Some(palette);
        Ok(self)
    }

    /// Color that partially transparent pixels are blended against when the
    /// format cannot store them. Stored opaque.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.accessor.background.color = color.to_opaque();
        self.sync_palette();
        self
    }

    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.accessor.background.alpha_threshold = threshold;
        self.sync_palette();
        self
    }

    pub fn with_working_color_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_color_space = space;
        self.accessor.background.space = space.resolve(self.accessor.info.is_linear_gamma());
        self.sync_palette();
        self
    }

    /// Run `callback` once when the bitmap is disposed or dropped.
    pub fn with_dispose_callback(mut self, callback: impl FnOnce() + Send + Sync + 'a) -> Self {
        self.on_dispose = Some(Box::new(callback));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.access = AccessMode::ReadOnly;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.access = AccessMode::WriteOnly;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.accessor.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormatInfo {
        self.accessor.info
    }

    pub fn known_format(&self) -> Option<KnownPixelFormat> {
        self.known_format
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.accessor.palette.as_ref()
    }

    pub fn back_color(&self) -> Color32 {
        self.accessor.background.color
    }

    pub fn alpha_threshold(&self) -> u8 {
        self.accessor.background.alpha_threshold
    }

    /// The configured space; `Default` is kept as is.
    pub fn working_color_space(&self) -> WorkingColorSpace {
        self.working_color_space
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The `stride * height` bytes holding the pixels; empty once disposed.
    pub fn as_bytes(&self) -> &[u8] {
        let len = if self.disposed { 0 } else { self.stride * self.height };
        &self.buffer.as_slice()[..len]
    }

    /// Release the buffer and run the dispose callback. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.buffer = Buffer::Owned(Vec::new());
        if let Some(callback) = self.on_dispose.take() {
            callback();
        }
    }

    pub(crate) fn check_readable(&self) -> Result<()> {
        if self.disposed {
            return Err(DrawingError::Disposed);
        }
        if self.access == AccessMode::WriteOnly {
            return Err(DrawingError::NotSupported("bitmap data is write-only"));
        }
        Ok(())
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.disposed {
            return Err(DrawingError::Disposed);
        }
        if self.access == AccessMode::ReadOnly {
            return Err(DrawingError::NotSupported("bitmap data is read-only"));
        }
        Ok(())
    }

    fn check_point(&self, x: usize, y: usize) -> Result<()> {
        if x >= self.width() || y >= self.height {
            return Err(DrawingError::out_of_range(format!(
                "pixel ({x}, {y}) is outside the {}x{} bitmap",
                self.width(),
                self.height
            )));
        }
        Ok(())
    }

    fn check_row(&self, y: usize) -> Result<()> {
        if y >= self.height {
            return Err(DrawingError::out_of_range(format!(
                "row {y} is outside a bitmap of height {}",
                self.height
            )));
        }
        Ok(())
    }

    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.buffer.as_slice()[start..start + self.stride]
    }

    #[inline]
    fn row_mut(&mut self, y: usize) -> (&PixelAccessor, &mut [u8]) {
        let start = y * self.stride;
        let stride = self.stride;
        (
            &self.accessor,
            &mut self.buffer.as_mut_slice()[start..start + stride],
        )
    }

    pub(crate) fn accessor(&self) -> &PixelAccessor {
        &self.accessor
    }

    pub(crate) fn rows_mut(&mut self) -> Result<RowsMut<'_>> {
        self.check_writable()?;
        let len = self.stride * self.height;
        Ok(RowsMut {
            accessor: &self.accessor,
            data: &mut self.buffer.as_mut_slice()[..len],
            stride: self.stride,
        })
    }

    pub fn get_color32(&self, x: usize, y: usize) -> Result<Color32> {
        self.check_readable()?;
        self.check_point(x, y)?;
        Ok(self.accessor.read32(self.row(y), x))
    }

    pub fn get_color64(&self, x: usize, y: usize) -> Result<Color64> {
        self.check_readable()?;
        self.check_point(x, y)?;
        Ok(self.accessor.read64(self.row(y), x))
    }

    pub fn get_color_f(&self, x: usize, y: usize) -> Result<ColorF> {
        self.check_readable()?;
        self.check_point(x, y)?;
        Ok(self.accessor.read_f(self.row(y), x))
    }

    /// Palette index of a pixel.
    ///
    /// # Errors
    ///
    /// [`DrawingError::NotSupported`] for direct formats.
    pub fn get_color_index(&self, x: usize, y: usize) -> Result<u32> {
        self.check_readable()?;
        self.check_point(x, y)?;
        if !self.accessor.info.is_indexed() {
            return Err(DrawingError::NotSupported(
                "color index access requires an indexed pixel format",
            ));
        }
        Ok(self.accessor.read_index(self.row(y), x))
    }

    /// Store `color`; indexed formats store the nearest palette entry.
    pub fn set_color32(&mut self, x: usize, y: usize, color: Color32) -> Result<()> {
        self.check_writable()?;
        self.check_point(x, y)?;
        let (accessor, row) = self.row_mut(y);
        accessor.write32(row, x, color);
        Ok(())
    }

    pub fn set_color64(&mut self, x: usize, y: usize, color: Color64) -> Result<()> {
        self.check_writable()?;
        self.check_point(x, y)?;
        let (accessor, row) = self.row_mut(y);
        accessor.write64(row, x, color);
        Ok(())
    }

    pub fn set_color_f(&mut self, x: usize, y: usize, color: ColorF) -> Result<()> {
        self.check_writable()?;
        self.check_point(x, y)?;
        let (accessor, row) = self.row_mut(y);
        accessor.write_f(row, x, color);
        Ok(())
    }

    /// Store a palette index.
    ///
    /// # Errors
    ///
    /// [`DrawingError::IndexOutOfRange`] if `index` is not below the palette
    /// size (and the format's capacity). The buffer is left untouched.
    pub fn set_color_index(&mut self, x: usize, y: usize, index: u32) -> Result<()> {
        self.check_writable()?;
        self.check_point(x, y)?;
        self.accessor.check_index(index)?;
        let (accessor, row) = self.row_mut(y);
        accessor.write_index(row, x, index);
        Ok(())
    }

    /// Read the `x`-th value of type `T` in row `y`, in native byte order.
    ///
    /// `x` counts `T`-sized elements, so `read_raw::<u32>(2, 0)` reads bytes
    /// 8..12 of the first row.
    pub fn read_raw<T: Pod>(&self, x: usize, y: usize) -> Result<T> {
        self.check_readable()?;
        self.check_row(y)?;
        let range = self.raw_range::<T>(x)?;
        Ok(bytemuck::pod_read_unaligned(&self.row(y)[range]))
    }

    /// Write the `x`-th value of type `T` in row `y`, see [`read_raw`](Self::read_raw).
    pub fn write_raw<T: Pod>(&mut self, x: usize, y: usize, value: T) -> Result<()> {
        self.check_writable()?;
        self.check_row(y)?;
        let range = self.raw_range::<T>(x)?;
        let (_, row) = self.row_mut(y);
        row[range].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }

    fn raw_range<T>(&self, x: usize) -> Result<std::ops::Range<usize>> {
        let size = std::mem::size_of::<T>();
        let start = x.checked_mul(size);
        match start {
            Some(start) if start + size <= self.stride => Ok(start..start + size),
            _ => Err(DrawingError::out_of_range(format!(
                "raw element {x} of {size} bytes is outside a row of {} bytes",
                self.stride
            ))),
        }
    }

    /// Read cursor positioned on the first row.
    pub fn first_row(&self) -> Result<RowCursor<'_>> {
        self.get_movable_row(0)
    }

    /// Read cursor positioned on row `y`.
    pub fn get_movable_row(&self, y: usize) -> Result<RowCursor<'_>> {
        self.check_readable()?;
        self.check_row(y)?;
        Ok(RowCursor::new(self, y))
    }

    /// Read/write cursor positioned on the first row.
    pub fn first_row_mut(&mut self) -> Result<RowCursorMut<'_, 'a>> {
        self.get_movable_row_mut(0)
    }

    /// Read/write cursor positioned on row `y`.
    pub fn get_movable_row_mut(&mut self, y: usize) -> Result<RowCursorMut<'_, 'a>> {
        self.check_writable()?;
        self.check_row(y)?;
        Ok(RowCursorMut::new(self, y))
    }

    /// Fill every pixel with `color`.
    pub fn clear(&mut self, color: Color32) -> Result<()> {
        self.check_writable()?;
        let width = self.width();
        let RowsMut {
            accessor,
            data,
            stride,
        } = self.rows_mut()?;
        if stride == 0 {
            return Ok(());
        }
        if accessor.info.is_indexed() {
            let index = accessor
                .palette
                .as_ref()
                .map_or(0, |p| p.get_nearest_color_index(color) as u32);
            for row in data.chunks_mut(stride) {
                for x in 0..width {
                    accessor.write_index(row, x, index);
                }
            }
        } else {
            for row in data.chunks_mut(stride) {
                for x in 0..width {
                    accessor.write32(row, x, color);
                }
            }
        }
        Ok(())
    }

    /// Every pixel in row-major order.
    pub fn to_vec_color32(&self) -> Result<Vec<Color32>> {
        self.check_readable()?;
        let width = self.width();
        let mut colors = Vec::with_capacity(width * self.height);
        for y in 0..self.height {
            let row = self.row(y);
            colors.extend((0..width).map(|x| self.accessor.read32(row, x)));
        }
        Ok(colors)
    }

    /// Distinct colors in order of first appearance.
    pub fn get_colors(&self) -> Result<Vec<Color32>> {
        let mut seen = HashSet::new();
        Ok(self
            .to_vec_color32()?
            .into_iter()
            .filter(|c| seen.insert(*c))
            .collect())
    }

    pub fn color_count(&self) -> Result<usize> {
        Ok(self.get_colors()?.len())
    }
}

/// Bytes of one tightly packed row, with overflow checking.
fn row_bytes(width: usize, info: PixelFormatInfo) -> Result<usize> {
    width
        .checked_mul(info.bits_per_pixel() as usize)
        .map(|bits| bits.div_ceil(8))
        .ok_or_else(|| DrawingError::out_of_range(format!("width {width} is too large")))
}

fn checked_len(stride: usize, height: usize) -> Result<usize> {
    stride
        .checked_mul(height)
        .ok_or_else(|| DrawingError::out_of_range("stride * height overflows"))
}

impl Drop for BitmapData<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for BitmapData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapData")
            .field("width", &self.width())
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.accessor.info)
            .field("known_format", &self.known_format)
            .field("access", &self.access)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl ReadableBitmapData for BitmapData<'_> {
    fn width(&self) -> usize {
        BitmapData::width(self)
    }

    fn height(&self) -> usize {
        self.height
    }

    fn pixel_format(&self) -> PixelFormatInfo {
        self.accessor.info
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        self.known_format
    }

    fn palette(&self) -> Option<&Palette> {
        self.accessor.palette.as_ref()
    }

    fn back_color(&self) -> Color32 {
        self.accessor.background.color
    }

    fn alpha_threshold(&self) -> u8 {
        self.accessor.background.alpha_threshold
    }

    fn working_color_space(&self) -> WorkingColorSpace {
        self.working_color_space
    }

    fn get_color32(&self, x: usize, y: usize) -> Result<Color32> {
        BitmapData::get_color32(self, x, y)
    }

    fn get_color64(&self, x: usize, y: usize) -> Result<Color64> {
        BitmapData::get_color64(self, x, y)
    }

    fn get_color_f(&self, x: usize, y: usize) -> Result<ColorF> {
        BitmapData::get_color_f(self, x, y)
    }

    fn get_color_index(&self, x: usize, y: usize) -> Result<u32> {
        BitmapData::get_color_index(self, x, y)
    }

    fn read_row32(&self, x: usize, y: usize, out: &mut [Color32]) -> Result<()> {
        self.check_readable()?;
        self.check_span(x, y, out.len())?;
        let row = self.row(y);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.accessor.read32(row, x + i);
        }
        Ok(())
    }

    fn read_row64(&self, x: usize, y: usize, out: &mut [Color64]) -> Result<()> {
        self.check_readable()?;
        self.check_span(x, y, out.len())?;
        let row = self.row(y);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.accessor.read64(row, x + i);
        }
        Ok(())
    }

    fn read_row_f(&self, x: usize, y: usize, out: &mut [ColorF]) -> Result<()> {
        self.check_readable()?;
        self.check_span(x, y, out.len())?;
        let row = self.row(y);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.accessor.read_f(row, x + i);
        }
        Ok(())
    }

    fn raw_row(&self, y: usize) -> Option<&[u8]> {
        if self.check_readable().is_err() || y >= self.height {
            return None;
        }
        Some(self.row(y))
    }
}

impl BitmapData<'_> {
    fn check_span(&self, x: usize, y: usize, len: usize) -> Result<()> {
        self.check_row(y)?;
        if x.checked_add(len).map_or(true, |end| end > self.width()) {
            return Err(DrawingError::out_of_range(format!(
                "span {x}..{} is outside a row of {} pixels",
                x.saturating_add(len),
                self.width()
            )));
        }
        Ok(())
    }
}

impl WritableBitmapData for BitmapData<'_> {
    fn set_color32(&mut self, x: usize, y: usize, color: Color32) -> Result<()> {
        BitmapData::set_color32(self, x, y, color)
    }

    fn set_color64(&mut self, x: usize, y: usize, color: Color64) -> Result<()> {
        BitmapData::set_color64(self, x, y, color)
    }

    fn set_color_f(&mut self, x: usize, y: usize, color: ColorF) -> Result<()> {
        BitmapData::set_color_f(self, x, y, color)
    }

    fn set_color_index(&mut self, x: usize, y: usize, index: u32) -> Result<()> {
        BitmapData::set_color_index(self, x, y, index)
    }

    fn clear(&mut self, color: Color32) -> Result<()> {
        BitmapData::clear(self, color)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_new_allocates_packed_rows() {
        let bitmap = BitmapData::new(9, 3, KnownPixelFormat::Format1bppIndexed).unwrap();
        assert_eq!(bitmap.stride(), 2);
        assert_eq!(bitmap.as_bytes().len(), 6);
        assert_eq!(bitmap.palette().map(Palette::len), Some(2));
    }

    #[test]
    fn test_from_buffer_validates_geometry() {
        let mut buffer = [0u8; 10];
        assert!(matches!(
            BitmapData::from_buffer(&mut buffer, 4, 1, 11, KnownPixelFormat::Format24bppRgb),
            Err(DrawingError::ArgumentOutOfRange(_))
        ));
        assert!(matches!(
            BitmapData::from_buffer(&mut buffer, 4, 1, 8, KnownPixelFormat::Format24bppRgb),
            Err(DrawingError::ArgumentOutOfRange(_))
        ));
        assert!(
            BitmapData::from_buffer(&mut buffer, 3, 1, 9, KnownPixelFormat::Format24bppRgb).is_ok()
        );
    }

    #[test]
    fn test_borrowed_buffer_sees_writes() {
        let mut buffer = [0u8; 8];
        {
            let mut bitmap =
                BitmapData::from_buffer(&mut buffer, 2, 1, 8, KnownPixelFormat::Format32bppArgb)
                    .unwrap();
            bitmap.set_color32(1, 0, Color32::from_argb_u32(0x11223344)).unwrap();
        }
        assert_eq!(&buffer[4..], &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn test_palette_too_large_is_rejected() {
        let bitmap = BitmapData::new(2, 2, KnownPixelFormat::Format1bppIndexed).unwrap();
        assert!(matches!(
            bitmap.with_palette(Palette::grayscale4()),
            Err(DrawingError::InvalidOperation(_))
        ));
        let direct = BitmapData::new(2, 2, KnownPixelFormat::Format24bppRgb).unwrap();
        assert!(direct.with_palette(Palette::black_and_white()).is_err());
    }

    #[test]
    fn test_index_access() {
        let mut bitmap = BitmapData::new(3, 1, KnownPixelFormat::Format4bppIndexed)
            .unwrap()
            .with_palette(Palette::grayscale4())
            .unwrap();
        bitmap.set_color_index(2, 0, 3).unwrap();
        assert_eq!(bitmap.get_color_index(2, 0).unwrap(), 3);
        assert_eq!(bitmap.get_color32(2, 0).unwrap(), Color32::WHITE);

        let before = bitmap.as_bytes().to_vec();
        assert_eq!(
            bitmap.set_color_index(0, 0, 4),
            Err(DrawingError::IndexOutOfRange { index: 4, max: 3 })
        );
        assert_eq!(bitmap.as_bytes(), &before[..]);
    }

    #[test]
    fn test_index_access_on_direct_format() {
        let mut bitmap = BitmapData::new(1, 1, KnownPixelFormat::Format32bppArgb).unwrap();
        assert!(matches!(
            bitmap.get_color_index(0, 0),
            Err(DrawingError::NotSupported(_))
        ));
        assert!(matches!(
            bitmap.set_color_index(0, 0, 0),
            Err(DrawingError::NotSupported(_))
        ));
    }

    #[test]
    fn test_access_modes() {
        let mut read_only = BitmapData::new(1, 1, KnownPixelFormat::Format24bppRgb)
            .unwrap()
            .read_only();
        assert!(read_only.get_color32(0, 0).is_ok());
        assert_eq!(
            read_only.set_color32(0, 0, Color32::WHITE),
            Err(DrawingError::NotSupported("bitmap data is read-only"))
        );

        let mut write_only = BitmapData::new(1, 1, KnownPixelFormat::Format24bppRgb)
            .unwrap()
            .write_only();
        assert!(write_only.set_color32(0, 0, Color32::WHITE).is_ok());
        assert_eq!(
            write_only.get_color32(0, 0),
            Err(DrawingError::NotSupported("bitmap data is write-only"))
        );
        assert!(write_only.first_row().is_err());
    }

    #[test]
    fn test_out_of_bounds() {
        let bitmap = BitmapData::new(2, 2, KnownPixelFormat::Format8bppGrayScale).unwrap();
        assert!(matches!(
            bitmap.get_color32(2, 0),
            Err(DrawingError::ArgumentOutOfRange(_))
        ));
        assert!(bitmap.get_movable_row(2).is_err());
    }

    #[test]
    fn test_dispose_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut bitmap = BitmapData::new(2, 2, KnownPixelFormat::Format24bppRgb)
            .unwrap()
            .with_dispose_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        bitmap.dispose();
        bitmap.dispose();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bitmap.get_color32(0, 0), Err(DrawingError::Disposed));
        assert!(bitmap.as_bytes().is_empty());
        drop(bitmap);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_disposes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let bitmap = BitmapData::new(1, 1, KnownPixelFormat::Format24bppRgb)
            .unwrap()
            .with_dispose_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        drop(bitmap);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_raw_access() {
        let mut bitmap = BitmapData::new(2, 2, KnownPixelFormat::Format32bppArgb).unwrap();
        bitmap.write_raw::<u32>(1, 1, 0xFF102030).unwrap();
        assert_eq!(bitmap.read_raw::<u32>(1, 1).unwrap(), 0xFF102030);
        assert_eq!(bitmap.read_raw::<[u8; 2]>(0, 1).unwrap(), [0, 0]);
        assert!(bitmap.read_raw::<u32>(2, 0).is_err());
        if cfg!(target_endian = "little") {
            assert_eq!(
                bitmap.get_color32(1, 1).unwrap(),
                Color32::from_argb_u32(0xFF102030)
            );
        }
    }

    #[test]
    fn test_clear_and_distinct_colors() {
        let mut bitmap = BitmapData::new(3, 2, KnownPixelFormat::Format16bppRgb565).unwrap();
        bitmap.clear(Color32::WHITE).unwrap();
        bitmap.set_color32(1, 1, Color32::BLACK).unwrap();
        assert_eq!(bitmap.get_colors().unwrap(), vec![Color32::WHITE, Color32::BLACK]);
        assert_eq!(bitmap.color_count().unwrap(), 2);
        assert_eq!(bitmap.to_vec_color32().unwrap().len(), 6);
    }

    #[test]
    fn test_settings_propagate_to_palette() {
        let bitmap = BitmapData::new(1, 1, KnownPixelFormat::Format8bppIndexed)
            .unwrap()
            .with_back_color(Color32::new(0, 1, 2, 3))
            .with_alpha_threshold(7);
        let palette = bitmap.palette().unwrap();
        assert_eq!(palette.back_color(), Color32::from_rgb(1, 2, 3));
        assert_eq!(palette.alpha_threshold(), 7);
    }

    #[test]
    fn test_empty_bitmap() {
        let bitmap = BitmapData::new(0, 0, KnownPixelFormat::Format32bppArgb).unwrap();
        assert!(bitmap.to_vec_color32().unwrap().is_empty());
        assert!(bitmap.first_row().is_err());
    }
}
