//! Bitmap access contracts.

use crate::color::{Color32, Color64, ColorF, WorkingColorSpace};
use crate::error::Result;
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::palette::Palette;

/// Read access to a bitmap.
///
/// [`BitmapData`](super::BitmapData) is the implementation shipped with the
/// crate; other implementations (platform bitmap adapters, for example) can
/// be used as the source of every pipeline operation.
///
/// Only [`get_color32`](Self::get_color32) and the metadata methods are
/// required. The wider accessors and the row readers default to converting
/// from it pixel by pixel.
pub trait ReadableBitmapData {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn pixel_format(&self) -> PixelFormatInfo;

    /// The built-in layout, if the data uses one.
    fn known_format(&self) -> Option<KnownPixelFormat> {
        None
    }

    /// Palette of an indexed format.
    fn palette(&self) -> Option<&Palette>;

    fn back_color(&self) -> Color32;

    fn alpha_threshold(&self) -> u8;

    fn working_color_space(&self) -> WorkingColorSpace;

    fn get_color32(&self, x: usize, y: usize) -> Result<Color32>;

    fn get_color64(&self, x: usize, y: usize) -> Result<Color64> {
        self.get_color32(x, y).map(Color64::from)
    }

    fn get_color_f(&self, x: usize, y: usize) -> Result<ColorF> {
        self.get_color32(x, y).map(ColorF::from)
    }

    fn get_color_index(&self, x: usize, y: usize) -> Result<u32>;

    /// Read `out.len()` pixels of row `y`, starting at column `x`.
    fn read_row32(&self, x: usize, y: usize, out: &mut [Color32]) -> Result<()> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get_color32(x + i, y)?;
        }
        Ok(())
    }

    fn read_row64(&self, x: usize, y: usize, out: &mut [Color64]) -> Result<()> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get_color64(x + i, y)?;
        }
        Ok(())
    }

    fn read_row_f(&self, x: usize, y: usize, out: &mut [ColorF]) -> Result<()> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get_color_f(x + i, y)?;
        }
        Ok(())
    }

    /// Raw bytes of row `y`, when the data lives in one addressable buffer.
    fn raw_row(&self, _y: usize) -> Option<&[u8]> {
        None
    }
}

/// Write access to a bitmap.
pub trait WritableBitmapData {
    fn set_color32(&mut self, x: usize, y: usize, color: Color32) -> Result<()>;

    fn set_color64(&mut self, x: usize, y: usize, color: Color64) -> Result<()> {
        self.set_color32(x, y, Color32::from(color))
    }

    fn set_color_f(&mut self, x: usize, y: usize, color: ColorF) -> Result<()> {
        self.set_color32(x, y, Color32::from(color))
    }

    fn set_color_index(&mut self, x: usize, y: usize, index: u32) -> Result<()>;

    /// Fill every pixel with `color`.
    fn clear(&mut self, color: Color32) -> Result<()>;
}

/// Both read and write access.
pub trait ReadWriteBitmapData: ReadableBitmapData + WritableBitmapData {}

impl<T: ReadableBitmapData + WritableBitmapData + ?Sized> ReadWriteBitmapData for T {}
