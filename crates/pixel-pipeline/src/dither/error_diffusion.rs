//! Error diffusion dithering.
//!
//! The quantization error of every pixel is spread over its unprocessed
//! neighbors according to a [`Kernel`]. The carried error lives in a small
//! ring of rows, so a session depends on every pixel before it in scan order
//! and has to run on a single thread.

use super::clamp_strength;
use super::kernel::{self, Kernel};
use crate::color::Color32;
use crate::quantize::QuantizingSession;

/// Error diffusion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDiffusionDitherer {
    kernel: Kernel,
    serpentine: bool,
    by_brightness: Option<bool>,
    strength: f32,
}

impl ErrorDiffusionDitherer {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            serpentine: false,
            by_brightness: None,
            strength: 1.0,
        }
    }

    pub fn floyd_steinberg() -> Self {
        Self::new(kernel::FLOYD_STEINBERG)
    }

    pub fn atkinson() -> Self {
        Self::new(kernel::ATKINSON)
    }

    pub fn jarvis_judice_ninke() -> Self {
        Self::new(kernel::JARVIS_JUDICE_NINKE)
    }

    pub fn stucki() -> Self {
        Self::new(kernel::STUCKI)
    }

    pub fn burkes() -> Self {
        Self::new(kernel::BURKES)
    }

    pub fn sierra3() -> Self {
        Self::new(kernel::SIERRA_3)
    }

    pub fn sierra2() -> Self {
        Self::new(kernel::SIERRA_2)
    }

    pub fn sierra_lite() -> Self {
        Self::new(kernel::SIERRA_LITE)
    }

    /// Alternate the scan direction every row.
    pub fn with_serpentine(mut self, serpentine: bool) -> Self {
        self.serpentine = serpentine;
        self
    }

    /// Measure the error on brightness only instead of per channel. When not
    /// set, grayscale quantizers use brightness.
    pub fn with_by_brightness(mut self, by_brightness: bool) -> Self {
        self.by_brightness = Some(by_brightness);
        self
    }

    /// Share of the error passed on, `0.0..=1.0`. Zero disables dithering.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = clamp_strength(strength);
        self
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn serpentine(&self) -> bool {
        self.serpentine
    }

    pub fn by_brightness(&self) -> Option<bool> {
        self.by_brightness
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub(super) fn session(&self, width: usize, quantizer: &QuantizingSession) -> ErrorDiffusionSession {
        ErrorDiffusionSession {
            quantizer: quantizer.clone(),
            kernel: self.kernel,
            serpentine: self.serpentine,
            by_brightness: self.by_brightness.unwrap_or_else(|| quantizer.is_grayscale()),
            strength: self.strength,
            buffer: ErrorBuffer::new(width, self.kernel.max_dy + 1),
            row: 0,
        }
    }
}

/// Sliding window of carried error rows: `rows[0]` is the current row.
#[derive(Debug)]
struct ErrorBuffer {
    rows: Vec<Vec<[f32; 3]>>,
    width: usize,
}

impl ErrorBuffer {
    fn new(width: usize, row_depth: usize) -> Self {
        Self {
            rows: (0..row_depth).map(|_| vec![[0.0; 3]; width]).collect(),
            width,
        }
    }

    #[inline]
    fn get_accumulated(&self, x: usize) -> [f32; 3] {
        self.rows[0].get(x).copied().unwrap_or_default()
    }

    /// Out of bounds targets are ignored.
    #[inline]
    fn add_error(&mut self, x: usize, row_offset: usize, error: [f32; 3]) {
        if x < self.width && row_offset < self.rows.len() {
            for (carried, e) in self.rows[row_offset][x].iter_mut().zip(error) {
                *carried += e;
            }
        }
    }

    fn advance_row(&mut self) {
        self.rows.rotate_left(1);
        if let Some(last) = self.rows.last_mut() {
            last.fill([0.0; 3]);
        }
    }

    fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill([0.0; 3]);
        }
    }
}

/// Error diffusion bound to one operation.
///
/// Pixels must be requested row by row from the top, each row in the
/// direction given by [`is_reversed_row`](Self::is_reversed_row).
#[derive(Debug)]
pub struct ErrorDiffusionSession {
    quantizer: QuantizingSession,
    kernel: Kernel,
    serpentine: bool,
    by_brightness: bool,
    strength: f32,
    buffer: ErrorBuffer,
    row: usize,
}

impl ErrorDiffusionSession {
    pub fn is_reversed_row(&self, y: usize) -> bool {
        self.serpentine && y % 2 == 1
    }

    pub fn quantizer(&self) -> &QuantizingSession {
        &self.quantizer
    }

    pub fn get_dithered_color(&mut self, color: Color32, x: usize, y: usize) -> Color32 {
        if self.strength == 0.0 || color.a < self.quantizer.alpha_threshold() {
            return self.quantizer.get_quantized_color(color);
        }
        self.seek_row(y);

        let space = self.quantizer.working_color_space();
        let color = if color.a == 255 || self.quantizer.preserves_alpha() {
            color
        } else {
            color.blend_with_background(self.quantizer.back_color(), space)
        };
        let carried = self.buffer.get_accumulated(x);
        let working = space.to_working(color);
        let wanted: [f32; 3] = std::array::from_fn(|i| (working[i] + carried[i]).clamp(0.0, 1.0));
        let result = self
            .quantizer
            .get_quantized_color(space.from_working(wanted, color.a));

        let actual = space.to_working(result);
        let mut error: [f32; 3] = std::array::from_fn(|i| (wanted[i] - actual[i]) * self.strength);
        if self.by_brightness {
            let weights = space.brightness_weights();
            let e = error.iter().zip(weights).map(|(e, w)| e * w).sum::<f32>();
            error = [e; 3];
        }
        self.diffuse(x, y, error);
        result
    }

    fn seek_row(&mut self, y: usize) {
        if y < self.row {
            // a new pass over the area
            self.buffer.clear();
        } else {
            for _ in 0..(y - self.row).min(self.buffer.rows.len()) {
                self.buffer.advance_row();
            }
        }
        self.row = y;
    }

    fn diffuse(&mut self, x: usize, y: usize, error: [f32; 3]) {
        let direction = if self.is_reversed_row(y) { -1 } else { 1 };
        let divisor = self.kernel.divisor as f32;
        for &(dx, dy, weight) in self.kernel.entries {
            let Some(target) = x.checked_add_signed((dx * direction) as isize) else {
                continue;
            };
            let share = weight as f32 / divisor;
            self.buffer
                .add_error(target, dy as usize, error.map(|e| e * share));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bitmap::BitmapData;
    use crate::color::WorkingColorSpace;
    use crate::context::OperationContext;
    use crate::format::KnownPixelFormat;
    use crate::quantize::Quantizer;

    fn session_of(quantizer: Quantizer) -> QuantizingSession {
        let source = BitmapData::new(1, 1, KnownPixelFormat::Format32bppArgb).unwrap();
        quantizer
            .with_working_color_space(WorkingColorSpace::Srgb)
            .initialize(&source, &OperationContext::new())
            .unwrap()
    }

    fn dither_row(session: &mut ErrorDiffusionSession, color: Color32, width: usize, y: usize) -> Vec<Color32> {
        let mut row = vec![Color32::TRANSPARENT; width];
        let columns: Vec<usize> = if session.is_reversed_row(y) {
            (0..width).rev().collect()
        } else {
            (0..width).collect()
        };
        for x in columns {
            row[x] = session.get_dithered_color(color, x, y);
        }
        row
    }

    #[test]
    fn test_error_buffer_window() {
        let mut buffer = ErrorBuffer::new(3, 2);
        buffer.add_error(1, 1, [0.5; 3]);
        buffer.add_error(7, 0, [1.0; 3]);
        buffer.add_error(0, 5, [1.0; 3]);
        assert_eq!(buffer.get_accumulated(1), [0.0; 3]);
        buffer.advance_row();
        assert_eq!(buffer.get_accumulated(1), [0.5; 3]);
        buffer.advance_row();
        assert_eq!(buffer.get_accumulated(1), [0.0; 3]);
    }

    #[test]
    fn test_mid_gray_alternates() {
        let quantizer = session_of(Quantizer::black_and_white());
        let mut session = ErrorDiffusionDitherer::floyd_steinberg().session(16, &quantizer);
        let row = dither_row(&mut session, Color32::from_gray(128), 16, 0);
        let white = row.iter().filter(|&&c| c == Color32::WHITE).count();
        assert!((7..=9).contains(&white), "{white} white pixels");
        // no two neighbors alike on a single row of mid gray
        assert!(row.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_zero_strength_is_plain_quantization() {
        let quantizer = session_of(Quantizer::black_and_white());
        let mut session = ErrorDiffusionDitherer::atkinson()
            .with_strength(0.0)
            .session(8, &quantizer);
        for y in 0..3 {
            let row = dither_row(&mut session, Color32::from_gray(100), 8, y);
            assert!(row.iter().all(|&c| c == Color32::BLACK));
        }
    }

    #[test]
    fn test_serpentine_reverses_odd_rows() {
        let quantizer = session_of(Quantizer::black_and_white());
        let session = ErrorDiffusionDitherer::floyd_steinberg()
            .with_serpentine(true)
            .session(4, &quantizer);
        assert!(!session.is_reversed_row(0));
        assert!(session.is_reversed_row(1));
        let plain = ErrorDiffusionDitherer::floyd_steinberg().session(4, &quantizer);
        assert!(!plain.is_reversed_row(1));
    }

    #[test]
    fn test_brightness_mode_follows_quantizer() {
        let gray = session_of(Quantizer::grayscale16());
        let color = session_of(Quantizer::system_default_8bpp());
        let ditherer = ErrorDiffusionDitherer::burkes();
        assert!(ditherer.session(1, &gray).by_brightness);
        assert!(!ditherer.session(1, &color).by_brightness);
        assert!(!ditherer.with_by_brightness(false).session(1, &gray).by_brightness);
    }

    #[test]
    fn test_strength_is_clamped() {
        assert_eq!(ErrorDiffusionDitherer::stucki().with_strength(3.0).strength(), 1.0);
        assert_eq!(ErrorDiffusionDitherer::stucki().with_strength(f32::NAN).strength(), 0.0);
    }

    #[test]
    fn test_transparent_pixels_carry_no_error() {
        let quantizer = session_of(Quantizer::black_and_white().with_alpha_threshold(128));
        let mut session = ErrorDiffusionDitherer::floyd_steinberg().session(4, &quantizer);
        let c = session.get_dithered_color(Color32::new(0, 255, 255, 255), 0, 0);
        assert_eq!(c, quantizer.get_quantized_color(Color32::new(0, 255, 255, 255)));
        assert_eq!(session.buffer.get_accumulated(1), [0.0; 3]);
    }
}
