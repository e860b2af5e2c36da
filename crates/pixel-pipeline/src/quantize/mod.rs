//! Color quantization.
//!
//! A [`Quantizer`] is a description: a predefined palette or direct color
//! reduction, or one of the palette-optimizing algorithms (Octree, Median
//! Cut, Wu). [`Quantizer::initialize`] turns it into a
//! [`QuantizingSession`] for one operation. Optimizing quantizers scan the
//! source once to build their palette, the others are ready immediately.
//!
//! # Example
//!
//! ```
//! use pixel_pipeline::{BitmapData, Color32, KnownPixelFormat, OperationContext, Quantizer};
//!
//! let mut source = BitmapData::new(4, 1, KnownPixelFormat::Format32bppArgb).unwrap();
//! let red = Color32::from_rgb(255, 0, 0);
//! let blue = Color32::from_rgb(0, 0, 255);
//! for (x, c) in [red, red, blue, blue].into_iter().enumerate() {
//!     source.set_color32(x, 0, c).unwrap();
//! }
//!
//! let session = Quantizer::octree(2)
//!     .initialize(&source, &OperationContext::new())
//!     .unwrap();
//! assert_eq!(session.palette().unwrap().entries(), &[red, blue]);
//! assert_eq!(session.get_palette_index(blue), Some(1));
//! ```

mod median_cut;
mod octree;
mod predefined;
mod wu;

use std::collections::HashMap;

pub use predefined::PredefinedQuantizer;

use predefined::DirectMapping;

use crate::bitmap::ReadableBitmapData;
use crate::color::{Color32, WorkingColorSpace};
use crate::context::{DrawingOperation, OperationContext};
use crate::error::Result;
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::palette::{Palette, DEFAULT_ALPHA_THRESHOLD};
use crate::pipeline::Rectangle;

/// Largest palette an optimizing quantizer produces.
pub const MAX_OPTIMIZED_COLORS: usize = 256;

/// Settings shared by every quantizer.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizerOptions {
    /// Opaque color partially transparent pixels are blended against.
    pub back_color: Color32,
    /// Pixels with alpha below this are transparent; `0` disables
    /// transparency.
    pub alpha_threshold: u8,
    pub working_color_space: WorkingColorSpace,
    /// Palette size limit of the optimizing quantizers, `1..=256`.
    pub max_colors: usize,
    /// Resolution of the optimizing quantizers' statistics: tree depth for
    /// Octree, histogram bits per channel for Wu. `None` picks the default.
    pub bit_level: Option<u8>,
}

impl Default for QuantizerOptions {
    fn default() -> Self {
        Self {
            back_color: Color32::BLACK,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            working_color_space: WorkingColorSpace::Default,
            max_colors: MAX_OPTIMIZED_COLORS,
            bit_level: None,
        }
    }
}

/// How a quantizer picks its colors.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantizer {
    /// A fixed palette or a direct per-channel reduction; no statistics pass.
    Predefined(PredefinedQuantizer, QuantizerOptions),
    /// Octree color reduction.
    Octree(QuantizerOptions),
    /// Median cut over the distinct source colors.
    MedianCut(QuantizerOptions),
    /// Xiaolin Wu's variance-minimizing box splitting.
    Wu(QuantizerOptions),
}

impl Quantizer {
    pub fn predefined(kind: PredefinedQuantizer) -> Self {
        Quantizer::Predefined(kind, QuantizerOptions::default())
    }

    pub fn black_and_white() -> Self {
        Self::predefined(PredefinedQuantizer::BlackAndWhite)
    }

    pub fn grayscale4() -> Self {
        Self::predefined(PredefinedQuantizer::Grayscale4)
    }

    pub fn grayscale16() -> Self {
        Self::predefined(PredefinedQuantizer::Grayscale16)
    }

    pub fn grayscale256() -> Self {
        Self::predefined(PredefinedQuantizer::Grayscale256)
    }

    pub fn system_default_4bpp() -> Self {
        Self::predefined(PredefinedQuantizer::SystemDefault4Bpp)
    }

    pub fn system_default_8bpp() -> Self {
        Self::predefined(PredefinedQuantizer::SystemDefault8Bpp)
    }

    pub fn rgb332() -> Self {
        Self::predefined(PredefinedQuantizer::Rgb332)
    }

    pub fn rgb888() -> Self {
        Self::predefined(PredefinedQuantizer::Rgb888)
    }

    pub fn rgb565() -> Self {
        Self::predefined(PredefinedQuantizer::Rgb565)
    }

    pub fn rgb555() -> Self {
        Self::predefined(PredefinedQuantizer::Rgb555)
    }

    pub fn argb1555() -> Self {
        Self::predefined(PredefinedQuantizer::Argb1555)
    }

    pub fn argb8888() -> Self {
        Self::predefined(PredefinedQuantizer::Argb8888)
    }

    /// 256 gray shades without a palette.
    pub fn grayscale() -> Self {
        Self::predefined(PredefinedQuantizer::Grayscale)
    }

    /// Map to an arbitrary palette.
    ///
    /// The options start out as the palette's own back color, alpha
    /// threshold and working color space.
    pub fn from_palette(palette: Palette) -> Self {
        let options = QuantizerOptions {
            back_color: palette.back_color(),
            alpha_threshold: palette.alpha_threshold(),
            working_color_space: palette.working_color_space(),
            ..QuantizerOptions::default()
        };
        Quantizer::Predefined(PredefinedQuantizer::FromPalette(palette), options)
    }

    pub fn octree(max_colors: usize) -> Self {
        Quantizer::Octree(QuantizerOptions::default()).with_max_colors(max_colors)
    }

    pub fn median_cut(max_colors: usize) -> Self {
        Quantizer::MedianCut(QuantizerOptions::default()).with_max_colors(max_colors)
    }

    pub fn wu(max_colors: usize) -> Self {
        Quantizer::Wu(QuantizerOptions::default()).with_max_colors(max_colors)
    }

    /// A predefined quantizer producing exactly the colors `format` can
    /// store.
    pub fn for_pixel_format(format: KnownPixelFormat) -> Self {
        match format {
            KnownPixelFormat::Format16bppRgb565 => Self::rgb565(),
            KnownPixelFormat::Format16bppRgb555 => Self::rgb555(),
            KnownPixelFormat::Format16bppArgb1555 => Self::argb1555(),
            other => Self::for_format_info(other.info()),
        }
    }

    /// Like [`for_pixel_format`](Self::for_pixel_format) for a format known
    /// only by its descriptor. 16-bit direct formats are assumed to have 5
    /// bits per channel.
    pub fn for_format_info(info: PixelFormatInfo) -> Self {
        if info.is_indexed() {
            return match info.bits_per_pixel() {
                1 => Self::black_and_white(),
                4 => Self::system_default_4bpp(),
                8 => Self::system_default_8bpp(),
                bpp => Self::from_palette(Palette::for_format(bpp)),
            };
        }
        if info.is_grayscale() {
            return Self::grayscale();
        }
        match (info.bits_per_pixel(), info.has_alpha()) {
            (16, true) => Self::argb1555(),
            (16, false) => Self::rgb555(),
            (_, true) => Self::argb8888(),
            (_, false) => Self::rgb888(),
        }
    }

    pub fn options(&self) -> &QuantizerOptions {
        match self {
            Quantizer::Predefined(_, options)
            | Quantizer::Octree(options)
            | Quantizer::MedianCut(options)
            | Quantizer::Wu(options) => options,
        }
    }

    fn options_mut(&mut self) -> &mut QuantizerOptions {
        match self {
            Quantizer::Predefined(_, options)
            | Quantizer::Octree(options)
            | Quantizer::MedianCut(options)
            | Quantizer::Wu(options) => options,
        }
    }

    /// Stored opaque.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.options_mut().back_color = color.to_opaque();
        self
    }

    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.options_mut().alpha_threshold = threshold;
        self
    }

    pub fn with_working_color_space(mut self, space: WorkingColorSpace) -> Self {
        self.options_mut().working_color_space = space;
        self
    }

    /// Clamped to `1..=256`.
    pub fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.options_mut().max_colors = max_colors.clamp(1, MAX_OPTIMIZED_COLORS);
        self
    }

    pub fn with_bit_level(mut self, bit_level: u8) -> Self {
        self.options_mut().bit_level = Some(bit_level);
        self
    }

    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Quantizer::Predefined(kind, _) => kind.name(),
            Quantizer::Octree(_) => "octree",
            Quantizer::MedianCut(_) => "median-cut",
            Quantizer::Wu(_) => "wu",
        }
    }

    /// Whether [`initialize`](Self::initialize) reads the source.
    pub fn needs_statistics(&self) -> bool {
        !matches!(self, Quantizer::Predefined(..))
    }

    /// Start a session for `source`.
    pub fn initialize<S>(&self, source: &S, ctx: &OperationContext<'_>) -> Result<QuantizingSession>
    where
        S: ReadableBitmapData + ?Sized,
    {
        let rect = Rectangle::new(0, 0, source.width(), source.height());
        self.initialize_region(source, rect, ctx)
    }

    /// Start a session whose statistics only cover `rect` of `source`.
    pub(crate) fn initialize_region<S>(
        &self,
        source: &S,
        rect: Rectangle,
        ctx: &OperationContext<'_>,
    ) -> Result<QuantizingSession>
    where
        S: ReadableBitmapData + ?Sized,
    {
        let options = self.options();
        let space = options
            .working_color_space
            .resolve(source.pixel_format().is_linear_gamma());

        let session = match self {
            Quantizer::Predefined(kind, _) => predefined::session(kind, options, space),
            optimized => {
                let histogram = ColorHistogram::collect(source, rect, options, space, ctx)?;
                let has_transparent = histogram.has_transparent && options.max_colors > 1;
                let budget = options.max_colors - usize::from(has_transparent);

                let mut entries = if histogram.colors.is_empty() {
                    if has_transparent {
                        Vec::new()
                    } else {
                        vec![options.back_color.to_opaque()]
                    }
                } else {
                    match optimized {
                        Quantizer::Octree(_) => {
                            let levels = options.bit_level.unwrap_or(8).clamp(1, 8);
                            octree::reduce(&histogram.colors, budget, levels, space)
                        }
                        Quantizer::MedianCut(_) => {
                            median_cut::reduce(&histogram.colors, budget, space)
                        }
                        _ => {
                            let bits = options.bit_level.unwrap_or(wu::DEFAULT_BITS);
                            wu::reduce(&histogram.colors, budget, bits, space)
                        }
                    }
                };
                if has_transparent {
                    entries.push(Color32::TRANSPARENT);
                }
                // non-empty by construction and at most 256 entries
                let palette = Palette::from_entries(entries)
                    .with_back_color(options.back_color.to_opaque())
                    .with_alpha_threshold(options.alpha_threshold)
                    .with_working_color_space(space);

                tracing::debug!(
                    algorithm = self.name(),
                    distinct = histogram.colors.len(),
                    colors = palette.len(),
                    transparent = has_transparent,
                    "Palette generated"
                );
                QuantizingSession::with_palette(palette, space)
            }
        };
        Ok(session)
    }
}

/// Distinct opaque colors of a source region with their pixel counts, in
/// order of first appearance.
pub(crate) struct ColorHistogram {
    pub colors: Vec<(Color32, u32)>,
    pub has_transparent: bool,
}

impl ColorHistogram {
    fn collect<S>(
        source: &S,
        rect: Rectangle,
        options: &QuantizerOptions,
        space: WorkingColorSpace,
        ctx: &OperationContext<'_>,
    ) -> Result<Self>
    where
        S: ReadableBitmapData + ?Sized,
    {
        ctx.new_operation(DrawingOperation::InitializingQuantizer, rect.height);
        let back = options.back_color.to_opaque();
        let mut index: HashMap<Color32, usize> = HashMap::new();
        let mut colors: Vec<(Color32, u32)> = Vec::new();
        let mut has_transparent = false;
        let mut row = vec![Color32::TRANSPARENT; rect.width];

        for y in rect.y..rect.bottom() {
            ctx.check()?;
            source.read_row32(rect.x, y, &mut row)?;
            for &c in &row {
                if c.a < options.alpha_threshold {
                    has_transparent = true;
                    continue;
                }
                let c = if c.a == 255 {
                    c
                } else {
                    c.blend_with_background(back, space)
                };
                let slot = *index.entry(c).or_insert_with(|| {
                    colors.push((c, 0));
                    colors.len() - 1
                });
                colors[slot].1 += 1;
            }
            ctx.increment(1);
        }

        Ok(Self {
            colors,
            has_transparent,
        })
    }
}

/// Weighted mean of working-space channel sums, back in sRGB bytes.
pub(crate) fn mean_color(sums: [f64; 3], weight: f64, space: WorkingColorSpace) -> Color32 {
    let rgb = sums.map(|s| (s / weight) as f32);
    space.from_working(rgb, 255)
}

#[derive(Debug, Clone)]
enum Mapping {
    Palette(Palette),
    Direct(DirectMapping),
}

/// A quantizer bound to one operation.
///
/// Owned by the operation that created it and dropped when it ends, so a
/// session can never be reused across operations.
#[derive(Debug, Clone)]
pub struct QuantizingSession {
    mapping: Mapping,
    back_color: Color32,
    alpha_threshold: u8,
    working_color_space: WorkingColorSpace,
}

impl QuantizingSession {
    fn with_palette(palette: Palette, space: WorkingColorSpace) -> Self {
        Self {
            back_color: palette.back_color(),
            alpha_threshold: palette.alpha_threshold(),
            working_color_space: space,
            mapping: Mapping::Palette(palette),
        }
    }

    fn direct(mapping: DirectMapping, options: &QuantizerOptions, space: WorkingColorSpace) -> Self {
        Self {
            mapping: Mapping::Direct(mapping),
            back_color: options.back_color.to_opaque(),
            alpha_threshold: options.alpha_threshold,
            working_color_space: space,
        }
    }

    /// The palette, for palette-based quantizers.
    pub fn palette(&self) -> Option<&Palette> {
        match &self.mapping {
            Mapping::Palette(palette) => Some(palette),
            Mapping::Direct(_) => None,
        }
    }

    /// The color `color` is reduced to.
    #[inline]
    pub fn get_quantized_color(&self, color: Color32) -> Color32 {
        match &self.mapping {
            Mapping::Palette(palette) => palette.get_nearest_color(color),
            Mapping::Direct(mapping) => mapping.apply(
                color,
                self.back_color,
                self.alpha_threshold,
                self.working_color_space,
            ),
        }
    }

    /// Palette index of `color`, for palette-based quantizers.
    #[inline]
    pub fn get_palette_index(&self, color: Color32) -> Option<usize> {
        self.palette().map(|p| p.get_nearest_color_index(color))
    }

    pub fn back_color(&self) -> Color32 {
        self.back_color
    }

    pub fn alpha_threshold(&self) -> u8 {
        self.alpha_threshold
    }

    /// Always resolved, never `Default`.
    pub fn working_color_space(&self) -> WorkingColorSpace {
        self.working_color_space
    }

    pub fn is_grayscale(&self) -> bool {
        match &self.mapping {
            Mapping::Palette(palette) => palette.is_grayscale(),
            Mapping::Direct(mapping) => mapping.is_grayscale(),
        }
    }

    /// Whether partially transparent colors keep their alpha.
    pub(crate) fn preserves_alpha(&self) -> bool {
        match &self.mapping {
            Mapping::Palette(palette) => palette.has_multi_level_alpha(),
            Mapping::Direct(mapping) => *mapping == DirectMapping::Argb8888,
        }
    }

    /// Approximate number of levels per channel the output can take.
    pub fn color_levels(&self) -> u16 {
        match &self.mapping {
            Mapping::Palette(palette) if palette.is_grayscale() => palette.len().max(2) as u16,
            Mapping::Palette(palette) => {
                let opaque = palette.entries().iter().filter(|c| c.a != 0).count();
                ((opaque as f64).cbrt().round() as u16).max(2)
            }
            Mapping::Direct(mapping) => mapping.color_levels(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bitmap::BitmapData;
    use crate::context::CancellationFlag;
    use crate::error::DrawingError;

    fn bitmap_of(colors: &[Color32], width: usize) -> BitmapData<'static> {
        let height = colors.len() / width;
        let mut bitmap = BitmapData::new(width, height, KnownPixelFormat::Format32bppArgb).unwrap();
        for (i, &c) in colors.iter().enumerate() {
            bitmap.set_color32(i % width, i / width, c).unwrap();
        }
        bitmap
    }

    fn gradient() -> BitmapData<'static> {
        let colors: Vec<Color32> = (0..256u32)
            .map(|i| Color32::from_rgb(i as u8, (i * 7 % 256) as u8, 255 - i as u8))
            .collect();
        bitmap_of(&colors, 16)
    }

    fn all_optimizing(max_colors: usize) -> [Quantizer; 3] {
        [
            Quantizer::octree(max_colors),
            Quantizer::median_cut(max_colors),
            Quantizer::wu(max_colors),
        ]
    }

    #[test]
    fn test_max_colors_is_clamped() {
        assert_eq!(Quantizer::octree(0).options().max_colors, 1);
        assert_eq!(Quantizer::wu(1000).options().max_colors, 256);
    }

    #[test]
    fn test_palette_bound() {
        let source = gradient();
        let ctx = OperationContext::new();
        for k in [1, 2, 3, 16, 255, 256] {
            for quantizer in all_optimizing(k) {
                let session = quantizer.initialize(&source, &ctx).unwrap();
                let len = session.palette().unwrap().len();
                assert!(len >= 1 && len <= k, "{} produced {len} for {k}", quantizer.name());
            }
        }
    }

    #[test]
    fn test_few_colors_give_exact_palette() {
        let colors = [
            Color32::from_rgb(10, 20, 30),
            Color32::from_rgb(200, 100, 0),
            Color32::from_rgb(10, 20, 30),
            Color32::from_rgb(0, 255, 0),
        ];
        let source = bitmap_of(&colors, 2);
        for quantizer in all_optimizing(8) {
            let session = quantizer
                .initialize(&source, &OperationContext::new())
                .unwrap();
            let mut entries = session.palette().unwrap().entries().to_vec();
            entries.sort();
            let mut expected = vec![colors[0], colors[1], colors[3]];
            expected.sort();
            assert_eq!(entries, expected, "{}", quantizer.name());
        }
    }

    #[test]
    fn test_empty_source_yields_back_color() {
        let source = BitmapData::new(0, 0, KnownPixelFormat::Format32bppArgb).unwrap();
        for quantizer in all_optimizing(16) {
            let quantizer = quantizer.with_back_color(Color32::from_rgb(1, 2, 3));
            let session = quantizer
                .initialize(&source, &OperationContext::new())
                .unwrap();
            assert_eq!(
                session.palette().unwrap().entries(),
                &[Color32::from_rgb(1, 2, 3)]
            );
        }
    }

    #[test]
    fn test_single_pixel_source() {
        let source = bitmap_of(&[Color32::from_rgb(9, 8, 7)], 1);
        for quantizer in all_optimizing(4) {
            let session = quantizer
                .initialize(&source, &OperationContext::new())
                .unwrap();
            assert_eq!(
                session.palette().unwrap().entries(),
                &[Color32::from_rgb(9, 8, 7)]
            );
        }
    }

    #[test]
    fn test_transparent_entry_is_reserved() {
        let colors = [
            Color32::from_rgb(255, 0, 0),
            Color32::TRANSPARENT,
            Color32::from_rgb(0, 0, 255),
            Color32::new(10, 0, 255, 0),
        ];
        let source = bitmap_of(&colors, 4);
        for quantizer in all_optimizing(3) {
            let session = quantizer
                .initialize(&source, &OperationContext::new())
                .unwrap();
            let palette = session.palette().unwrap();
            assert_eq!(palette.len(), 3);
            assert_eq!(palette.get(2), Some(Color32::TRANSPARENT));
            assert_eq!(session.get_palette_index(Color32::new(5, 1, 1, 1)), Some(2));
        }
    }

    #[test]
    fn test_canceled_statistics() {
        let source = gradient();
        let flag = CancellationFlag::new();
        flag.cancel();
        let ctx = OperationContext::new().with_stop(&flag);
        assert_eq!(
            Quantizer::wu(8).initialize(&source, &ctx).unwrap_err(),
            DrawingError::Canceled
        );
        // predefined quantizers never read the source
        assert!(Quantizer::rgb565().initialize(&source, &ctx).is_ok());
    }

    #[test]
    fn test_for_pixel_format() {
        use KnownPixelFormat::*;
        let cases = [
            (Format1bppIndexed, "black-and-white"),
            (Format4bppIndexed, "system-4bpp"),
            (Format8bppIndexed, "system-8bpp"),
            (Format8bppGrayScale, "grayscale"),
            (Format16bppGrayScale, "grayscale"),
            (Format16bppRgb565, "rgb565"),
            (Format16bppRgb555, "rgb555"),
            (Format16bppArgb1555, "argb1555"),
            (Format24bppRgb, "rgb888"),
            (Format32bppArgb, "argb8888"),
            (Format64bppPArgb, "argb8888"),
        ];
        for (format, name) in cases {
            assert_eq!(Quantizer::for_pixel_format(format).name(), name, "{format}");
        }
    }

    #[test]
    fn test_color_levels() {
        let ctx = OperationContext::new();
        let source = gradient();
        let levels = |q: Quantizer| q.initialize(&source, &ctx).unwrap().color_levels();
        assert_eq!(levels(Quantizer::black_and_white()), 2);
        assert_eq!(levels(Quantizer::grayscale16()), 16);
        assert_eq!(levels(Quantizer::rgb565()), 32);
        assert_eq!(levels(Quantizer::rgb888()), 256);
        assert_eq!(levels(Quantizer::system_default_8bpp()), 6);
    }
}
