//! Movable row cursors.

use bytemuck::Pod;

use super::BitmapData;
use crate::color::{Color32, Color64, ColorF};
use crate::error::{DrawingError, Result};

/// Read cursor over the rows of a [`BitmapData`].
///
/// The cursor borrows the bitmap, so it cannot outlive it; disposal while a
/// cursor exists is ruled out at compile time.
#[derive(Debug, Clone, Copy)]
pub struct RowCursor<'b> {
    bitmap: &'b BitmapData<'b>,
    y: usize,
}

impl<'b> RowCursor<'b> {
    pub(super) fn new(bitmap: &'b BitmapData<'b>, y: usize) -> Self {
        Self { bitmap, y }
    }

    /// Current row.
    #[inline]
    pub fn index(&self) -> usize {
        self.y
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.bitmap.width()
    }

    /// Advance one row. Returns `false` (and stays put) on the last row.
    pub fn move_next_row(&mut self) -> bool {
        advance(&mut self.y, self.bitmap.height())
    }

    pub fn move_to_row(&mut self, y: usize) -> Result<()> {
        seek(&mut self.y, y, self.bitmap.height())
    }

    pub fn get_color32(&self, x: usize) -> Result<Color32> {
        self.bitmap.get_color32(x, self.y)
    }

    pub fn get_color64(&self, x: usize) -> Result<Color64> {
        self.bitmap.get_color64(x, self.y)
    }

    pub fn get_color_f(&self, x: usize) -> Result<ColorF> {
        self.bitmap.get_color_f(x, self.y)
    }

    pub fn get_color_index(&self, x: usize) -> Result<u32> {
        self.bitmap.get_color_index(x, self.y)
    }

    pub fn read_raw<T: Pod>(&self, x: usize) -> Result<T> {
        self.bitmap.read_raw(x, self.y)
    }
}

/// Read/write cursor over the rows of a [`BitmapData`].
#[derive(Debug)]
pub struct RowCursorMut<'b, 'a> {
    bitmap: &'b mut BitmapData<'a>,
    y: usize,
}

impl<'b, 'a> RowCursorMut<'b, 'a> {
    pub(super) fn new(bitmap: &'b mut BitmapData<'a>, y: usize) -> Self {
        Self { bitmap, y }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.y
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.bitmap.width()
    }

    pub fn move_next_row(&mut self) -> bool {
        advance(&mut self.y, self.bitmap.height())
    }

    pub fn move_to_row(&mut self, y: usize) -> Result<()> {
        seek(&mut self.y, y, self.bitmap.height())
    }

    pub fn get_color32(&self, x: usize) -> Result<Color32> {
        self.bitmap.get_color32(x, self.y)
    }

    pub fn get_color64(&self, x: usize) -> Result<Color64> {
        self.bitmap.get_color64(x, self.y)
    }

    pub fn get_color_f(&self, x: usize) -> Result<ColorF> {
        self.bitmap.get_color_f(x, self.y)
    }

    pub fn get_color_index(&self, x: usize) -> Result<u32> {
        self.bitmap.get_color_index(x, self.y)
    }

    pub fn set_color32(&mut self, x: usize, color: Color32) -> Result<()> {
        self.bitmap.set_color32(x, self.y, color)
    }

    pub fn set_color64(&mut self, x: usize, color: Color64) -> Result<()> {
        self.bitmap.set_color64(x, self.y, color)
    }

    pub fn set_color_f(&mut self, x: usize, color: ColorF) -> Result<()> {
        self.bitmap.set_color_f(x, self.y, color)
    }

    pub fn set_color_index(&mut self, x: usize, index: u32) -> Result<()> {
        self.bitmap.set_color_index(x, self.y, index)
    }

    pub fn read_raw<T: Pod>(&self, x: usize) -> Result<T> {
        self.bitmap.read_raw(x, self.y)
    }

    pub fn write_raw<T: Pod>(&mut self, x: usize, value: T) -> Result<()> {
        self.bitmap.write_raw(x, self.y, value)
    }
}

#[inline]
fn advance(y: &mut usize, height: usize) -> bool {
    if *y + 1 < height {
        *y += 1;
        true
    } else {
        false
    }
}

fn seek(y: &mut usize, target: usize, height: usize) -> Result<()> {
    if target >= height {
        return Err(DrawingError::out_of_range(format!(
            "row {target} is outside a bitmap of height {height}"
        )));
    }
    *y = target;
    Ok(())
}
