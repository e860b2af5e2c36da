//! Moving pixels between bitmaps through a quantizer and a ditherer.
//!
//! Every operation validates its geometry before touching a pixel, then
//! walks the target rows in chunks. A chunk checks the stop token before it
//! starts and reports progress when it is done, so a canceled operation
//! never writes past a chunk boundary. Rows are independent unless an error
//! diffusion ditherer is involved, which forces a single thread; otherwise
//! the chunks run on rayon workers as
//! [`OperationContext::max_parallelism`] allows.
//!
//! # Example
//!
//! ```
//! use pixel_pipeline::{clone_bitmap, BitmapData, Color32, KnownPixelFormat, OperationContext,
//!     Quantizer};
//!
//! let mut source = BitmapData::new(4, 1, KnownPixelFormat::Format32bppArgb).unwrap();
//! let red = Color32::from_rgb(255, 0, 0);
//! let blue = Color32::from_rgb(0, 0, 255);
//! for (x, c) in [red, red, blue, blue].into_iter().enumerate() {
//!     source.set_color32(x, 0, c).unwrap();
//! }
//!
//! let indexed = clone_bitmap(
//!     &source,
//!     KnownPixelFormat::Format8bppIndexed,
//!     Some(&Quantizer::octree(2)),
//!     None,
//!     &OperationContext::new(),
//! )
//! .unwrap()
//! .expect("not canceled");
//! let indices: Vec<u32> = (0..4).map(|x| indexed.get_color_index(x, 0).unwrap()).collect();
//! assert_eq!(indices, [0, 0, 1, 1]);
//! ```

use std::time::Instant;

use rayon::prelude::*;

use crate::bitmap::{BitmapData, PixelAccessor, ReadableBitmapData, RowsMut};
use crate::color::{Color32, Color64, ColorF};
use crate::context::{DrawingOperation, OperationContext};
use crate::dither::{Ditherer, DitheringSession, ErrorDiffusionSession};
use crate::error::{DrawingError, Result};
use crate::format::{ColorPrecision, KnownPixelFormat};
use crate::palette::Palette;
use crate::quantize::{Quantizer, QuantizingSession};

/// Chunks scheduled per worker thread.
const CHUNKS_PER_THREAD: usize = 4;
const MAX_CHUNK_ROWS: usize = 64;

/// An axis-aligned area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole area of a `width` x `height` bitmap.
    pub const fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn right(&self) -> usize {
        self.x + self.width
    }

    pub const fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies within `0..width` x `0..height`.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.x.checked_add(self.width).is_some_and(|right| right <= width)
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }
}

/// How a pipeline operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CopyOutcome {
    Completed,
    /// The stop token fired. Rows of finished chunks are written, the rest
    /// of the target is untouched.
    Canceled,
}

impl CopyOutcome {
    pub fn is_completed(self) -> bool {
        self == CopyOutcome::Completed
    }
}

fn finish(result: Result<()>) -> Result<CopyOutcome> {
    match result {
        Ok(()) => Ok(CopyOutcome::Completed),
        Err(DrawingError::Canceled) => Ok(CopyOutcome::Canceled),
        Err(e) => Err(e),
    }
}

/// Copy `source_rect` of `source` to `target` at `target_offset`.
///
/// With neither a quantizer nor a ditherer the colors are converted as
/// exactly as the formats allow. A ditherer without a quantizer dithers
/// against the target's own palette, or the color resolution of its pixel
/// format.
///
/// Both rectangles must lie completely within their bitmaps, otherwise
/// nothing is written and [`DrawingError::ArgumentOutOfRange`] is returned.
pub fn copy_to<S>(
    source: &S,
    target: &mut BitmapData<'_>,
    source_rect: Rectangle,
    target_offset: (usize, usize),
    quantizer: Option<&Quantizer>,
    ditherer: Option<&Ditherer>,
    ctx: &OperationContext<'_>,
) -> Result<CopyOutcome>
where
    S: ReadableBitmapData + Sync + ?Sized,
{
    check_area(source, target, source_rect, target_offset)?;
    target.check_writable()?;
    if source_rect.is_empty() {
        return Ok(CopyOutcome::Completed);
    }
    // fails early on unreadable sources
    source.get_color32(source_rect.x, source_rect.y)?;

    let started = Instant::now();
    let (offset_x, offset_y) = target_offset;
    let result = if quantizer.is_none() && ditherer.is_none() {
        copy_rows(source, target, source_rect, target_offset, ctx)
    } else {
        let fallback;
        let quantizer = match quantizer {
            Some(quantizer) => quantizer,
            None => {
                fallback = default_quantizer(target);
                &fallback
            }
        };
        quantizer
            .initialize_region(source, source_rect, ctx)
            .and_then(|session| {
                let dithering = initialize_ditherer(ditherer, source_rect.width, &session, ctx);
                let rows = TargetRows::new(target, offset_y, source_rect.height)?;
                let input = RowInput::Source {
                    source,
                    rect: source_rect,
                };
                convert(&input, rows, offset_x, source_rect.width, &session, dithering, ctx)
            })
    };
    let outcome = finish(result)?;

    tracing::debug!(
        width = source_rect.width,
        height = source_rect.height,
        quantizer = quantizer.map(Quantizer::name),
        ditherer = ditherer.map(Ditherer::name),
        ?outcome,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Copy finished"
    );
    Ok(outcome)
}

/// A new bitmap of `format` with the content of `source`.
///
/// An indexed target takes the palette of the quantizer. Optimizing
/// quantizers are limited to the palette size of the format; a fixed
/// palette that does not fit fails with [`DrawingError::InvalidOperation`].
/// Returns `None` when the operation was canceled.
pub fn clone_bitmap<S>(
    source: &S,
    format: KnownPixelFormat,
    quantizer: Option<&Quantizer>,
    ditherer: Option<&Ditherer>,
    ctx: &OperationContext<'_>,
) -> Result<Option<BitmapData<'static>>>
where
    S: ReadableBitmapData + Sync + ?Sized,
{
    let rect = Rectangle::from_size(source.width(), source.height());
    let mut target = BitmapData::new(rect.width, rect.height, format)?
        .with_back_color(source.back_color())
        .with_alpha_threshold(source.alpha_threshold())
        .with_working_color_space(source.working_color_space());
    if rect.is_empty() {
        return Ok(Some(target));
    }
    source.get_color32(0, 0)?;

    let started = Instant::now();
    let result = if quantizer.is_none() && ditherer.is_none() {
        copy_rows(source, &mut target, rect, (0, 0), ctx)
    } else {
        let fallback;
        let quantizer = match quantizer {
            Some(quantizer) => quantizer,
            None => {
                fallback = default_quantizer(&target);
                &fallback
            }
        };
        let limited;
        let limit = format.info().max_palette_entries();
        let quantizer = if format.info().is_indexed()
            && quantizer.needs_statistics()
            && quantizer.options().max_colors > limit
        {
            tracing::debug!(
                requested = quantizer.options().max_colors,
                limit,
                "Palette size limited by the target format"
            );
            limited = quantizer.clone().with_max_colors(limit);
            &limited
        } else {
            quantizer
        };
        match quantizer.initialize_region(source, rect, ctx) {
            Ok(session) => {
                if let (true, Some(palette)) = (format.info().is_indexed(), session.palette()) {
                    target = target.with_palette(palette.clone())?;
                }
                let dithering = initialize_ditherer(ditherer, rect.width, &session, ctx);
                let rows = TargetRows::new(&mut target, 0, rect.height)?;
                let input = RowInput::Source { source, rect };
                convert(&input, rows, 0, rect.width, &session, dithering, ctx)
            }
            Err(e) => Err(e),
        }
    };
    let outcome = finish(result)?;

    tracing::debug!(
        format = format.name(),
        width = rect.width,
        height = rect.height,
        ?outcome,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Clone finished"
    );
    Ok(match outcome {
        CopyOutcome::Completed => Some(target),
        CopyOutcome::Canceled => None,
    })
}

/// Reduce the colors of `bitmap` in place.
pub fn quantize(
    bitmap: &mut BitmapData<'_>,
    quantizer: &Quantizer,
    ctx: &OperationContext<'_>,
) -> Result<CopyOutcome> {
    process_in_place(bitmap, quantizer, None, ctx)
}

/// Reduce the colors of `bitmap` in place, dithering the result.
pub fn dither(
    bitmap: &mut BitmapData<'_>,
    quantizer: &Quantizer,
    ditherer: &Ditherer,
    ctx: &OperationContext<'_>,
) -> Result<CopyOutcome> {
    process_in_place(bitmap, quantizer, Some(ditherer), ctx)
}

fn process_in_place(
    bitmap: &mut BitmapData<'_>,
    quantizer: &Quantizer,
    ditherer: Option<&Ditherer>,
    ctx: &OperationContext<'_>,
) -> Result<CopyOutcome> {
    bitmap.check_readable()?;
    bitmap.check_writable()?;
    let rect = Rectangle::from_size(bitmap.width(), bitmap.height());
    if rect.is_empty() {
        return Ok(CopyOutcome::Completed);
    }

    let result = quantizer
        .initialize_region(&*bitmap, rect, ctx)
        .and_then(|session| {
            let dithering = initialize_ditherer(ditherer, rect.width, &session, ctx);
            let rows = TargetRows::new(bitmap, 0, rect.height)?;
            convert(
                &RowInput::<BitmapData<'static>>::InPlace,
                rows,
                0,
                rect.width,
                &session,
                dithering,
                ctx,
            )
        });
    let outcome = finish(result)?;
    tracing::debug!(
        quantizer = quantizer.name(),
        ditherer = ditherer.map(Ditherer::name),
        ?outcome,
        "In-place conversion finished"
    );
    Ok(outcome)
}

fn check_area<S>(
    source: &S,
    target: &BitmapData<'_>,
    source_rect: Rectangle,
    (offset_x, offset_y): (usize, usize),
) -> Result<()>
where
    S: ReadableBitmapData + ?Sized,
{
    if !source_rect.fits(source.width(), source.height()) {
        return Err(DrawingError::out_of_range(format!(
            "source rectangle {source_rect:?} exceeds the {}x{} source",
            source.width(),
            source.height()
        )));
    }
    let target_rect = Rectangle::new(offset_x, offset_y, source_rect.width, source_rect.height);
    if !target_rect.fits(target.width(), target.height()) {
        return Err(DrawingError::out_of_range(format!(
            "target area {target_rect:?} exceeds the {}x{} target",
            target.width(),
            target.height()
        )));
    }
    Ok(())
}

/// The quantizer a ditherer works with when none was given.
fn default_quantizer(target: &BitmapData<'_>) -> Quantizer {
    match (target.palette(), target.known_format()) {
        (Some(palette), _) => Quantizer::from_palette(palette.clone()),
        (None, Some(format)) => Quantizer::for_pixel_format(format),
        (None, None) => Quantizer::for_format_info(target.pixel_format()),
    }
}

fn initialize_ditherer(
    ditherer: Option<&Ditherer>,
    width: usize,
    session: &QuantizingSession,
    ctx: &OperationContext<'_>,
) -> Option<DitheringSession> {
    ditherer.map(|ditherer| {
        ctx.new_operation(DrawingOperation::InitializingDitherer, 1);
        let session = ditherer.initialize_for_width(width, session);
        ctx.increment(1);
        session
    })
}

/// The target rows an operation writes.
struct TargetRows<'b> {
    accessor: &'b PixelAccessor,
    rows: &'b mut [u8],
    stride: usize,
}

impl<'b> TargetRows<'b> {
    fn new(target: &'b mut BitmapData<'_>, top: usize, height: usize) -> Result<Self> {
        let RowsMut {
            accessor,
            data,
            stride,
        } = target.rows_mut()?;
        Ok(Self {
            accessor,
            rows: &mut data[top * stride..(top + height) * stride],
            stride,
        })
    }

    fn height(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.rows.len() / self.stride
        }
    }
}

fn chunk_rows(height: usize, threads: usize) -> usize {
    height
        .div_ceil(threads.max(1) * CHUNKS_PER_THREAD)
        .clamp(1, MAX_CHUNK_ROWS)
}

/// Run `process(accessor, y, row)` for every row in order on this thread.
/// `y` counts from the first row of the area.
fn run_sequential<F>(rows: TargetRows<'_>, ctx: &OperationContext<'_>, mut process: F) -> Result<()>
where
    F: FnMut(&PixelAccessor, usize, &mut [u8]) -> Result<()>,
{
    let height = rows.height();
    if height == 0 {
        return Ok(());
    }
    let TargetRows {
        accessor,
        rows,
        stride,
    } = rows;
    let chunk = chunk_rows(height, 1);
    ctx.new_operation(DrawingOperation::ProcessingPixels, height);
    for (i, data) in rows.chunks_mut(chunk * stride).enumerate() {
        ctx.check()?;
        for (j, row) in data.chunks_mut(stride).enumerate() {
            process(accessor, i * chunk + j, row)?;
        }
        ctx.increment(data.len() / stride);
    }
    Ok(())
}

/// Like [`run_sequential`], spreading the chunks over worker threads.
fn run_parallel<F>(rows: TargetRows<'_>, ctx: &OperationContext<'_>, process: F) -> Result<()>
where
    F: Fn(&PixelAccessor, usize, &mut [u8]) -> Result<()> + Sync,
{
    let threads = match ctx.max_parallelism() {
        0 => rayon::current_num_threads(),
        n => n,
    };
    let height = rows.height();
    let chunk = chunk_rows(height, threads);
    if threads <= 1 || height <= chunk {
        return run_sequential(rows, ctx, process);
    }

    let TargetRows {
        accessor,
        rows,
        stride,
    } = rows;
    ctx.new_operation(DrawingOperation::ProcessingPixels, height);
    tracing::trace!(threads, chunk, height, "Processing rows in parallel");
    let process = &process;
    let mut work = move || {
        rows.par_chunks_mut(chunk * stride)
            .enumerate()
            .try_for_each(|(i, data)| {
                ctx.check()?;
                for (j, row) in data.chunks_mut(stride).enumerate() {
                    process(accessor, i * chunk + j, row)?;
                }
                ctx.increment(data.len() / stride);
                Ok(())
            })
    };
    if ctx.max_parallelism() == 0 {
        work()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| DrawingError::invalid_operation(format!("cannot start worker pool: {e}")))?;
        pool.install(work)
    }
}

/// Where the colors of a row come from.
enum RowInput<'s, S: ?Sized> {
    Source { source: &'s S, rect: Rectangle },
    /// The target row itself.
    InPlace,
}

impl<S: ReadableBitmapData + ?Sized> RowInput<'_, S> {
    fn read(&self, accessor: &PixelAccessor, row: &[u8], y: usize, out: &mut [Color32]) -> Result<()> {
        match self {
            RowInput::Source { source, rect } => source.read_row32(rect.x, rect.y + y, out),
            RowInput::InPlace => {
                for (x, slot) in out.iter_mut().enumerate() {
                    *slot = accessor.read32(row, x);
                }
                Ok(())
            }
        }
    }
}

/// Quantize, and optionally dither, `width` pixels per row into `rows`
/// starting at column `offset_x`.
fn convert<S>(
    input: &RowInput<'_, S>,
    rows: TargetRows<'_>,
    offset_x: usize,
    width: usize,
    session: &QuantizingSession,
    dithering: Option<DitheringSession>,
    ctx: &OperationContext<'_>,
) -> Result<()>
where
    S: ReadableBitmapData + Sync + ?Sized,
{
    match dithering {
        None => {
            // same entries in the same order: write the indices directly
            let by_index = match (session.palette(), rows.accessor.palette.as_ref()) {
                (Some(own), Some(target)) => own.entries() == target.entries(),
                _ => false,
            };
            run_parallel(rows, ctx, |accessor, y, row| {
                let mut colors = vec![Color32::TRANSPARENT; width];
                input.read(accessor, row, y, &mut colors)?;
                for (x, c) in colors.into_iter().enumerate() {
                    if by_index {
                        let index = session.get_palette_index(c).unwrap_or_default();
                        accessor.write_index(row, offset_x + x, index as u32);
                    } else {
                        accessor.write32(row, offset_x + x, session.get_quantized_color(c));
                    }
                }
                Ok(())
            })
        }
        Some(DitheringSession::Stateless(dither)) => run_parallel(rows, ctx, |accessor, y, row| {
            let mut colors = vec![Color32::TRANSPARENT; width];
            input.read(accessor, row, y, &mut colors)?;
            for (x, c) in colors.into_iter().enumerate() {
                accessor.write32(row, offset_x + x, dither.get_dithered_color(c, x, y));
            }
            Ok(())
        }),
        Some(DitheringSession::Diffusing(mut diffusion)) => {
            run_sequential(rows, ctx, |accessor, y, row| {
                let mut colors = vec![Color32::TRANSPARENT; width];
                input.read(accessor, row, y, &mut colors)?;
                diffuse_row(&mut diffusion, &mut colors, y);
                for (x, c) in colors.into_iter().enumerate() {
                    accessor.write32(row, offset_x + x, c);
                }
                Ok(())
            })
        }
    }
}

fn diffuse_row(session: &mut ErrorDiffusionSession, colors: &mut [Color32], y: usize) {
    if session.is_reversed_row(y) {
        for x in (0..colors.len()).rev() {
            colors[x] = session.get_dithered_color(colors[x], x, y);
        }
    } else {
        for (x, c) in colors.iter_mut().enumerate() {
            *c = session.get_dithered_color(*c, x, y);
        }
    }
}

/// Plain conversion, through raw bytes when both sides share the layout.
fn copy_rows<S>(
    source: &S,
    target: &mut BitmapData<'_>,
    rect: Rectangle,
    (offset_x, offset_y): (usize, usize),
    ctx: &OperationContext<'_>,
) -> Result<()>
where
    S: ReadableBitmapData + Sync + ?Sized,
{
    let info = target.pixel_format();
    let same_layout = source.known_format().is_some()
        && source.known_format() == target.known_format()
        && info.is_byte_aligned()
        && source.palette().map(Palette::entries) == target.palette().map(Palette::entries)
        && source.raw_row(rect.y).is_some();
    let precision = source.pixel_format().precision().max(info.precision());
    let rows = TargetRows::new(target, offset_y, rect.height)?;

    if same_layout {
        let bytes = info.bits_per_pixel() as usize / 8;
        let (start, len, to) = (rect.x * bytes, rect.width * bytes, offset_x * bytes);
        return run_parallel(rows, ctx, |_, y, row| {
            let source_row = source
                .raw_row(rect.y + y)
                .ok_or(DrawingError::NotSupported("source rows are not addressable"))?;
            row[to..to + len].copy_from_slice(&source_row[start..start + len]);
            Ok(())
        });
    }

    match precision {
        ColorPrecision::Bits8 => run_parallel(rows, ctx, |accessor, y, row| {
            let mut colors = vec![Color32::TRANSPARENT; rect.width];
            source.read_row32(rect.x, rect.y + y, &mut colors)?;
            for (x, c) in colors.into_iter().enumerate() {
                accessor.write32(row, offset_x + x, c);
            }
            Ok(())
        }),
        ColorPrecision::Bits16 => run_parallel(rows, ctx, |accessor, y, row| {
            let mut colors = vec![Color64::TRANSPARENT; rect.width];
            source.read_row64(rect.x, rect.y + y, &mut colors)?;
            for (x, c) in colors.into_iter().enumerate() {
                accessor.write64(row, offset_x + x, c);
            }
            Ok(())
        }),
        ColorPrecision::Float => run_parallel(rows, ctx, |accessor, y, row| {
            let mut colors = vec![ColorF::TRANSPARENT; rect.width];
            source.read_row_f(rect.x, rect.y + y, &mut colors)?;
            for (x, c) in colors.into_iter().enumerate() {
                accessor.write_f(row, offset_x + x, c);
            }
            Ok(())
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::context::{CancellationFlag, DrawingProgress};
    use crate::dither::{ErrorDiffusionDitherer, OrderedDitherer};

    fn hue_strip(width: usize, height: usize) -> BitmapData<'static> {
        let mut bitmap = BitmapData::new(width, height, KnownPixelFormat::Format32bppArgb).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = (x * 255 / width.max(1)) as u8;
                let w = (y * 255 / height.max(1)) as u8;
                bitmap
                    .set_color32(x, y, Color32::from_rgb(v, 255 - v, w))
                    .unwrap();
            }
        }
        bitmap
    }

    #[test]
    fn test_rectangle() {
        let rect = Rectangle::new(1, 2, 3, 4);
        assert_eq!((rect.right(), rect.bottom()), (4, 6));
        assert!(rect.fits(4, 6));
        assert!(!rect.fits(3, 6));
        assert!(!Rectangle::new(usize::MAX, 0, 2, 1).fits(usize::MAX, 1));
        assert!(Rectangle::new(5, 5, 0, 3).is_empty());
    }

    #[test]
    fn test_bad_rectangles_write_nothing() {
        let source = hue_strip(4, 4);
        let mut target = BitmapData::new(4, 4, KnownPixelFormat::Format32bppArgb).unwrap();
        let ctx = OperationContext::new();
        for (rect, offset) in [
            (Rectangle::new(2, 0, 3, 1), (0, 0)),
            (Rectangle::new(0, 0, 2, 2), (3, 0)),
            (Rectangle::new(0, 0, 4, 4), (0, 1)),
        ] {
            let result = copy_to(&source, &mut target, rect, offset, None, None, &ctx);
            assert!(matches!(result, Err(DrawingError::ArgumentOutOfRange(_))), "{rect:?}");
        }
        assert!(target.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_raw_copy_of_a_region() {
        let source = hue_strip(6, 5);
        let mut target = BitmapData::new(4, 4, KnownPixelFormat::Format32bppArgb).unwrap();
        let outcome = copy_to(
            &source,
            &mut target,
            Rectangle::new(2, 1, 3, 2),
            (1, 2),
            None,
            None,
            &OperationContext::new(),
        )
        .unwrap();
        assert_eq!(outcome, CopyOutcome::Completed);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(
                    target.get_color32(x + 1, y + 2).unwrap(),
                    source.get_color32(x + 2, y + 1).unwrap()
                );
            }
        }
        assert_eq!(target.get_color32(0, 0).unwrap(), Color32::TRANSPARENT);
    }

    #[test]
    fn test_conversion_between_formats() {
        let mut source = BitmapData::new(2, 1, KnownPixelFormat::Format32bppArgb).unwrap();
        source.set_color32(0, 0, Color32::from_rgb(10, 20, 30)).unwrap();
        source.set_color32(1, 0, Color32::new(0, 1, 2, 3)).unwrap();
        let mut target = BitmapData::new(2, 1, KnownPixelFormat::Format64bppArgb)
            .unwrap();
        copy_to(
            &source,
            &mut target,
            Rectangle::from_size(2, 1),
            (0, 0),
            None,
            None,
            &OperationContext::new(),
        )
        .unwrap();
        assert_eq!(target.get_color32(0, 0).unwrap(), Color32::from_rgb(10, 20, 30));
        assert_eq!(target.get_color32(1, 0).unwrap().a, 0);
    }

    #[test]
    fn test_octree_scenario_indices() {
        let mut source = BitmapData::new(4, 1, KnownPixelFormat::Format32bppArgb).unwrap();
        let red = Color32::from_rgb(255, 0, 0);
        let blue = Color32::from_rgb(0, 0, 255);
        for (x, c) in [red, red, blue, blue].into_iter().enumerate() {
            source.set_color32(x, 0, c).unwrap();
        }
        let target = clone_bitmap(
            &source,
            KnownPixelFormat::Format8bppIndexed,
            Some(&Quantizer::octree(2)),
            None,
            &OperationContext::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(target.palette().unwrap().entries(), &[red, blue]);
        let indices: Vec<u32> = (0..4).map(|x| target.get_color_index(x, 0).unwrap()).collect();
        assert_eq!(indices, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_palette_limited_by_target_format() {
        let source = hue_strip(32, 8);
        for quantizer in [Quantizer::wu(64), Quantizer::octree(64), Quantizer::median_cut(200)] {
            let target = clone_bitmap(
                &source,
                KnownPixelFormat::Format4bppIndexed,
                Some(&quantizer),
                None,
                &OperationContext::new(),
            )
            .unwrap()
            .unwrap();
            let len = target.palette().unwrap().len();
            assert!((2..=16).contains(&len), "{}: {len}", quantizer.name());
            if quantizer.name() == "wu" {
                assert_eq!(len, 16);
            }
        }
    }

    #[test]
    fn test_fixed_palette_too_large_for_target() {
        let source = hue_strip(32, 8);
        let result = clone_bitmap(
            &source,
            KnownPixelFormat::Format4bppIndexed,
            Some(&Quantizer::system_default_8bpp()),
            None,
            &OperationContext::new(),
        );
        assert!(matches!(result, Err(DrawingError::InvalidOperation(_))));
    }

    #[test]
    fn test_thread_count_does_not_change_output() {
        let source = hue_strip(37, 150);
        let cases: Vec<(Quantizer, Option<Ditherer>)> = vec![
            (Quantizer::wu(32), None),
            (Quantizer::octree(16), Some(OrderedDitherer::bayer8x8().into())),
            (
                Quantizer::system_default_4bpp(),
                Some(crate::dither::RandomNoiseDitherer::new().with_seed(3).into()),
            ),
        ];
        for (quantizer, ditherer) in cases {
            let run = |threads: usize| {
                let ctx = OperationContext::new().with_max_parallelism(threads);
                clone_bitmap(
                    &source,
                    KnownPixelFormat::Format8bppIndexed,
                    Some(&quantizer),
                    ditherer.as_ref(),
                    &ctx,
                )
                .unwrap()
                .unwrap()
                .as_bytes()
                .to_vec()
            };
            let single = run(1);
            assert_eq!(single, run(4), "{}", quantizer.name());
            assert_eq!(single, run(0), "{}", quantizer.name());
        }
    }

    #[test]
    fn test_error_diffusion_is_repeatable() {
        let source = hue_strip(40, 20);
        let ditherer: Ditherer = ErrorDiffusionDitherer::floyd_steinberg()
            .with_serpentine(true)
            .into();
        let run = || {
            clone_bitmap(
                &source,
                KnownPixelFormat::Format4bppIndexed,
                Some(&Quantizer::system_default_4bpp()),
                Some(&ditherer),
                &OperationContext::new().with_max_parallelism(8),
            )
            .unwrap()
            .unwrap()
            .as_bytes()
            .to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cancellation_before_start() {
        let source = hue_strip(8, 8);
        let flag = CancellationFlag::new();
        flag.cancel();
        let ctx = OperationContext::new().with_stop(&flag);

        let mut target = BitmapData::new(8, 8, KnownPixelFormat::Format24bppRgb).unwrap();
        let outcome = copy_to(
            &source,
            &mut target,
            Rectangle::from_size(8, 8),
            (0, 0),
            Some(&Quantizer::rgb565()),
            None,
            &ctx,
        )
        .unwrap();
        assert_eq!(outcome, CopyOutcome::Canceled);
        assert!(target.as_bytes().iter().all(|&b| b == 0));

        let cloned = clone_bitmap(
            &source,
            KnownPixelFormat::Format8bppIndexed,
            Some(&Quantizer::octree(8)),
            None,
            &ctx,
        )
        .unwrap();
        assert!(cloned.is_none());
    }

    #[derive(Default)]
    struct RowCounter {
        maximum: AtomicUsize,
        done: AtomicUsize,
    }

    impl DrawingProgress for RowCounter {
        fn new_operation(&self, operation: DrawingOperation, maximum: usize) {
            if operation == DrawingOperation::ProcessingPixels {
                self.maximum.store(maximum, Ordering::Relaxed);
                self.done.store(0, Ordering::Relaxed);
            }
        }

        fn increment(&self, count: usize) {
            self.done.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_progress_covers_every_row() {
        let source = hue_strip(10, 100);
        let progress = RowCounter::default();
        let ctx = OperationContext::new()
            .with_progress(&progress)
            .with_max_parallelism(3);
        let mut target = BitmapData::new(10, 100, KnownPixelFormat::Format8bppGrayScale).unwrap();
        copy_to(
            &source,
            &mut target,
            Rectangle::from_size(10, 100),
            (0, 0),
            Some(&Quantizer::grayscale()),
            None,
            &ctx,
        )
        .unwrap();
        assert_eq!(progress.maximum.load(Ordering::Relaxed), 100);
        assert_eq!(progress.done.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_ditherer_alone_uses_target_palette() {
        let source = hue_strip(16, 16);
        let mut target = BitmapData::new(16, 16, KnownPixelFormat::Format1bppIndexed).unwrap();
        copy_to(
            &source,
            &mut target,
            Rectangle::from_size(16, 16),
            (0, 0),
            None,
            Some(&ErrorDiffusionDitherer::atkinson().into()),
            &OperationContext::new(),
        )
        .unwrap();
        let colors = target.get_colors().unwrap();
        assert!(colors.iter().all(|&c| c == Color32::BLACK || c == Color32::WHITE));
        assert_eq!(colors.len(), 2);
    }

    #[test]
    fn test_in_place_quantize_and_dither() {
        let mut bitmap = hue_strip(12, 12);
        let outcome = quantize(&mut bitmap, &Quantizer::black_and_white(), &OperationContext::new()).unwrap();
        assert!(outcome.is_completed());
        assert!(bitmap.color_count().unwrap() <= 2);

        let mut bitmap = hue_strip(12, 12);
        dither(
            &mut bitmap,
            &Quantizer::grayscale4(),
            &OrderedDitherer::bayer4x4().into(),
            &OperationContext::new(),
        )
        .unwrap();
        let allowed = Palette::grayscale4();
        for c in bitmap.get_colors().unwrap() {
            assert!(allowed.entries().contains(&c), "{c}");
        }
    }

    #[test]
    fn test_read_only_target_is_rejected() {
        let source = hue_strip(2, 2);
        let mut target = BitmapData::new(2, 2, KnownPixelFormat::Format32bppArgb)
            .unwrap()
            .read_only();
        let result = copy_to(
            &source,
            &mut target,
            Rectangle::from_size(2, 2),
            (0, 0),
            None,
            None,
            &OperationContext::new(),
        );
        assert!(matches!(result, Err(DrawingError::NotSupported(_))));
    }
}
