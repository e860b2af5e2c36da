//! Dithering.
//!
//! A [`Ditherer`] perturbs the decisions of a quantizer so that areas of
//! one color are approximated by a mix of palette entries. Ordered and
//! noise ditherers add a position dependent offset to every pixel before
//! quantizing it and keep no state, so rows can be processed in any order
//! and in parallel. Error diffusion carries the error of every pixel to its
//! neighbors and has to see the pixels in scan order.
//!
//! # Example
//!
//! ```
//! use pixel_pipeline::{BitmapData, Color32, Ditherer, KnownPixelFormat, OperationContext,
//!     OrderedDitherer, Quantizer};
//!
//! let source = BitmapData::new(2, 2, KnownPixelFormat::Format32bppArgb).unwrap();
//! let quantizer = Quantizer::black_and_white()
//!     .initialize(&source, &OperationContext::new())
//!     .unwrap();
//! let mut session = Ditherer::from(OrderedDitherer::bayer2x2()).initialize(&source, &quantizer);
//!
//! let gray = Color32::from_gray(128);
//! let row: Vec<Color32> = (0..2).map(|x| session.get_dithered_color(gray, x, 0)).collect();
//! assert_eq!(row, [Color32::BLACK, Color32::WHITE]);
//! ```

mod error_diffusion;
mod kernel;
mod noise;
mod ordered;

use std::sync::Arc;

pub use error_diffusion::{ErrorDiffusionDitherer, ErrorDiffusionSession};
pub use kernel::{kernel_by_name, Kernel, KERNELS};
pub use noise::{InterleavedGradientNoiseDitherer, RandomNoiseDitherer};
pub use ordered::OrderedDitherer;

use ordered::ThresholdMatrix;

use crate::bitmap::ReadableBitmapData;
use crate::color::Color32;
use crate::quantize::QuantizingSession;

pub(crate) fn clamp_strength(strength: f32) -> f32 {
    if strength.is_nan() {
        0.0
    } else {
        strength.clamp(0.0, 1.0)
    }
}

/// Offset range that lets a flat area reach the neighboring output levels.
fn auto_strength(quantizer: &QuantizingSession) -> f32 {
    1.0 / (quantizer.color_levels().max(2) - 1) as f32
}

/// How a ditherer perturbs the quantizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Ditherer {
    Ordered(OrderedDitherer),
    ErrorDiffusion(ErrorDiffusionDitherer),
    RandomNoise(RandomNoiseDitherer),
    InterleavedGradientNoise(InterleavedGradientNoiseDitherer),
}

impl From<OrderedDitherer> for Ditherer {
    fn from(ditherer: OrderedDitherer) -> Self {
        Ditherer::Ordered(ditherer)
    }
}

impl From<ErrorDiffusionDitherer> for Ditherer {
    fn from(ditherer: ErrorDiffusionDitherer) -> Self {
        Ditherer::ErrorDiffusion(ditherer)
    }
}

impl From<RandomNoiseDitherer> for Ditherer {
    fn from(ditherer: RandomNoiseDitherer) -> Self {
        Ditherer::RandomNoise(ditherer)
    }
}

impl From<InterleavedGradientNoiseDitherer> for Ditherer {
    fn from(ditherer: InterleavedGradientNoiseDitherer) -> Self {
        Ditherer::InterleavedGradientNoise(ditherer)
    }
}

impl Ditherer {
    pub fn name(&self) -> &'static str {
        match self {
            Ditherer::Ordered(d) => d.name(),
            Ditherer::ErrorDiffusion(d) => d.kernel().name,
            Ditherer::RandomNoise(_) => "random-noise",
            Ditherer::InterleavedGradientNoise(_) => "interleaved-gradient-noise",
        }
    }

    /// Set the strength of whichever ditherer this is.
    pub fn with_strength(self, strength: f32) -> Self {
        match self {
            Ditherer::Ordered(d) => Ditherer::Ordered(d.with_strength(strength)),
            Ditherer::ErrorDiffusion(d) => Ditherer::ErrorDiffusion(d.with_strength(strength)),
            Ditherer::RandomNoise(d) => Ditherer::RandomNoise(d.with_strength(strength)),
            Ditherer::InterleavedGradientNoise(d) => {
                Ditherer::InterleavedGradientNoise(d.with_strength(strength))
            }
        }
    }

    /// Whether sessions must see the pixels in scan order on one thread.
    pub fn is_sequential(&self) -> bool {
        matches!(self, Ditherer::ErrorDiffusion(_))
    }

    /// Bind the ditherer to a quantizing session for an operation over
    /// `source`.
    pub fn initialize<S>(&self, source: &S, quantizer: &QuantizingSession) -> DitheringSession
    where
        S: ReadableBitmapData + ?Sized,
    {
        self.initialize_for_width(source.width(), quantizer)
    }

    /// Like [`initialize`](Self::initialize) for an area `width` pixels wide.
    pub(crate) fn initialize_for_width(&self, width: usize, quantizer: &QuantizingSession) -> DitheringSession {
        let stateless = |source: ThresholdSource, strength: Option<f32>| {
            let strength = strength.unwrap_or_else(|| auto_strength(quantizer));
            tracing::debug!(ditherer = self.name(), strength, "Ditherer initialized");
            DitheringSession::Stateless(StatelessDitheringSession {
                quantizer: quantizer.clone(),
                source,
                strength,
            })
        };
        match self {
            Ditherer::Ordered(d) => stateless(ThresholdSource::Matrix(Arc::clone(d.matrix())), d.strength()),
            Ditherer::RandomNoise(d) => {
                let seed = d.seed().unwrap_or_else(rand::random::<u64>);
                stateless(ThresholdSource::WhiteNoise(seed), d.strength())
            }
            Ditherer::InterleavedGradientNoise(d) => {
                stateless(ThresholdSource::InterleavedGradient, d.strength())
            }
            Ditherer::ErrorDiffusion(d) => {
                tracing::debug!(
                    ditherer = self.name(),
                    serpentine = d.serpentine(),
                    strength = d.strength(),
                    "Ditherer initialized"
                );
                DitheringSession::Diffusing(d.session(width, quantizer))
            }
        }
    }
}

#[derive(Debug, Clone)]
enum ThresholdSource {
    Matrix(Arc<ThresholdMatrix>),
    WhiteNoise(u64),
    InterleavedGradient,
}

impl ThresholdSource {
    #[inline]
    fn threshold(&self, x: usize, y: usize) -> f32 {
        match self {
            ThresholdSource::Matrix(matrix) => matrix.threshold(x, y),
            ThresholdSource::WhiteNoise(seed) => noise::white_noise(*seed, x, y),
            ThresholdSource::InterleavedGradient => noise::interleaved_gradient(x, y),
        }
    }
}

/// Session of an ordered or noise ditherer. Shareable between threads.
#[derive(Debug, Clone)]
pub struct StatelessDitheringSession {
    quantizer: QuantizingSession,
    source: ThresholdSource,
    strength: f32,
}

impl StatelessDitheringSession {
    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn quantizer(&self) -> &QuantizingSession {
        &self.quantizer
    }

    #[inline]
    pub fn get_dithered_color(&self, color: Color32, x: usize, y: usize) -> Color32 {
        if self.strength == 0.0 || color.a < self.quantizer.alpha_threshold() {
            return self.quantizer.get_quantized_color(color);
        }
        let offset = self.source.threshold(x, y) * self.strength;
        let space = self.quantizer.working_color_space();
        let shifted = space.to_working(color).map(|v| v + offset);
        self.quantizer
            .get_quantized_color(space.from_working(shifted, color.a))
    }
}

/// A ditherer bound to one operation.
#[derive(Debug)]
pub enum DitheringSession {
    Stateless(StatelessDitheringSession),
    Diffusing(ErrorDiffusionSession),
}

impl DitheringSession {
    /// The output color for `color` at `x`, `y` of the processed area.
    ///
    /// Diffusing sessions expect the calls in scan order, see
    /// [`is_reversed_row`](Self::is_reversed_row).
    #[inline]
    pub fn get_dithered_color(&mut self, color: Color32, x: usize, y: usize) -> Color32 {
        match self {
            DitheringSession::Stateless(session) => session.get_dithered_color(color, x, y),
            DitheringSession::Diffusing(session) => session.get_dithered_color(color, x, y),
        }
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, DitheringSession::Diffusing(_))
    }

    /// Whether row `y` is scanned right to left.
    pub fn is_reversed_row(&self, y: usize) -> bool {
        match self {
            DitheringSession::Stateless(_) => false,
            DitheringSession::Diffusing(session) => session.is_reversed_row(y),
        }
    }

    pub fn quantizer(&self) -> &QuantizingSession {
        match self {
            DitheringSession::Stateless(session) => session.quantizer(),
            DitheringSession::Diffusing(session) => session.quantizer(),
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

    fn source() -> BitmapData<'static> {
        BitmapData::new(8, 8, KnownPixelFormat::Format32bppArgb).unwrap()
    }

    fn session_of(quantizer: Quantizer) -> QuantizingSession {
        quantizer
            .with_working_color_space(WorkingColorSpace::Srgb)
            .initialize(&source(), &OperationContext::new())
            .unwrap()
    }

    fn all_ditherers() -> Vec<Ditherer> {
        vec![
            OrderedDitherer::bayer2x2().into(),
            OrderedDitherer::bayer4x4().into(),
            OrderedDitherer::bayer8x8().into(),
            OrderedDitherer::dotted_halftone().into(),
            OrderedDitherer::blue_noise().into(),
            ErrorDiffusionDitherer::floyd_steinberg().into(),
            ErrorDiffusionDitherer::sierra_lite().with_serpentine(true).into(),
            RandomNoiseDitherer::new().with_seed(1).into(),
            InterleavedGradientNoiseDitherer::new().into(),
        ]
    }

    #[test]
    fn test_zero_strength_is_a_no_op() {
        let colors = [
            Color32::from_rgb(10, 200, 30),
            Color32::from_gray(128),
            Color32::new(200, 90, 90, 250),
            Color32::TRANSPARENT,
        ];
        for quantizer in [
            Quantizer::black_and_white(),
            Quantizer::system_default_4bpp(),
            Quantizer::rgb565(),
        ] {
            let quantizing = session_of(quantizer);
            for ditherer in all_ditherers() {
                let mut session = ditherer.with_strength(0.0).initialize(&source(), &quantizing);
                for y in 0..4 {
                    for x in 0..4 {
                        for c in colors {
                            assert_eq!(
                                session.get_dithered_color(c, x, y),
                                quantizing.get_quantized_color(c)
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_auto_strength() {
        let bw = session_of(Quantizer::black_and_white());
        let rgb565 = session_of(Quantizer::rgb565());
        assert_eq!(auto_strength(&bw), 1.0);
        assert_eq!(auto_strength(&rgb565), 1.0 / 31.0);
        match Ditherer::from(OrderedDitherer::bayer4x4()).initialize(&source(), &bw) {
            DitheringSession::Stateless(session) => assert_eq!(session.strength(), 1.0),
            DitheringSession::Diffusing(_) => panic!("ordered dithering is stateless"),
        }
    }

    #[test]
    fn test_ordered_mid_gray_is_half_white() {
        let quantizing = session_of(Quantizer::black_and_white());
        let mut session = Ditherer::from(OrderedDitherer::bayer4x4()).initialize(&source(), &quantizing);
        let gray = Color32::from_gray(128);
        let mut white = 0;
        for y in 0..4 {
            for x in 0..4 {
                if session.get_dithered_color(gray, x, y) == Color32::WHITE {
                    white += 1;
                }
            }
        }
        assert_eq!(white, 8);
    }

    #[test]
    fn test_sequential_only_for_error_diffusion() {
        let quantizing = session_of(Quantizer::black_and_white());
        for ditherer in all_ditherers() {
            let session = ditherer.initialize(&source(), &quantizing);
            assert_eq!(ditherer.is_sequential(), session.is_sequential(), "{}", ditherer.name());
        }
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let quantizing = session_of(Quantizer::grayscale4());
        let ditherer = Ditherer::from(RandomNoiseDitherer::new().with_seed(99));
        let mut a = ditherer.initialize(&source(), &quantizing);
        let mut b = ditherer.initialize(&source(), &quantizing);
        for x in 0..16 {
            let c = Color32::from_gray(x as u8 * 16);
            assert_eq!(a.get_dithered_color(c, x, 3), b.get_dithered_color(c, x, 3));
        }
    }

    #[test]
    fn test_names() {
        let names: Vec<&str> = all_ditherers().iter().map(Ditherer::name).collect();
        assert_eq!(
            names,
            [
                "bayer2x2",
                "bayer4x4",
                "bayer8x8",
                "dotted-halftone",
                "blue-noise",
                "floyd-steinberg",
                "sierra-lite",
                "random-noise",
                "interleaved-gradient-noise",
            ]
        );
    }
}
