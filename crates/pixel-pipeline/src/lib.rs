#![allow(clippy::excessive_precision, clippy::needless_range_loop)]

//! pixel-pipeline: format-agnostic bitmap data, color quantization and
//! dithering.
//!
//! The crate works on raw pixel buffers described by a pixel format. It never
//! reads or writes image files.
//!
//! # Quick Start
//!
//! ```
//! use pixel_pipeline::{clone_bitmap, BitmapData, Color32, Ditherer, ErrorDiffusionDitherer,
//!     KnownPixelFormat, OperationContext, Quantizer};
//!
//! let mut source = BitmapData::new(16, 4, KnownPixelFormat::Format32bppArgb).unwrap();
//! for y in 0..4 {
//!     for x in 0..16 {
//!         source.set_color32(x, y, Color32::from_gray((x * 17) as u8)).unwrap();
//!     }
//! }
//!
//! let ditherer: Ditherer = ErrorDiffusionDitherer::floyd_steinberg().into();
//! let result = clone_bitmap(
//!     &source,
//!     KnownPixelFormat::Format1bppIndexed,
//!     Some(&Quantizer::black_and_white()),
//!     Some(&ditherer),
//!     &OperationContext::new(),
//! )
//! .unwrap()
//! .expect("not canceled");
//!
//! assert_eq!(result.color_count().unwrap(), 2);
//! ```
//!
//! # Building blocks
//!
//! - [`color`]: 32, 64 and 128 bit colors, straight and premultiplied, with
//!   sRGB/linear conversions.
//! - [`format`]: pixel format descriptors and the built-in layouts.
//! - [`bitmap`]: [`BitmapData`] over owned or borrowed buffers, row cursors
//!   and the [`ReadableBitmapData`] contract for foreign sources.
//! - [`palette`]: palettes with a thread safe nearest-color cache.
//! - [`quantize`]: predefined color sets and the Octree, Median Cut and Wu
//!   optimizers.
//! - [`dither`]: ordered, error diffusion and noise ditherers.
//! - [`pipeline`]: copying between bitmaps with cancellation, progress and
//!   row parallelism, configured by an [`OperationContext`].
//!
//! # Cancellation
//!
//! Cancellation uses the [`Stop`] trait of the `enough` crate.
//! [`CancellationFlag`] is a ready-made token; any other `Stop + Sync` type
//! works too. A canceled pipeline operation returns
//! [`CopyOutcome::Canceled`] instead of an error.

pub mod bitmap;
pub mod color;
pub mod context;
pub mod dither;
pub mod error;
pub mod format;
pub mod palette;
pub mod pipeline;
pub mod quantize;


pub use bitmap::{
    AccessMode, BitmapData, CustomPixelFormat, ReadWriteBitmapData, ReadableBitmapData, RowCursor,
    RowCursorMut, WritableBitmapData,
};
pub use color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, ParseColorError, WorkingColorSpace};
pub use context::{CancellationFlag, DrawingOperation, DrawingProgress, OperationContext};
pub use dither::{
    kernel_by_name, Ditherer, DitheringSession, ErrorDiffusionDitherer, ErrorDiffusionSession,
    InterleavedGradientNoiseDitherer, Kernel, OrderedDitherer, RandomNoiseDitherer,
    StatelessDitheringSession, KERNELS,
};
pub use error::{DrawingError, Result};
pub use format::{ColorPrecision, KnownPixelFormat, PixelFormatInfo};
pub use palette::{
    ColorIndexCache, DistanceMetric, Palette, RwLockColorCache, DEFAULT_ALPHA_THRESHOLD,
    DEFAULT_CACHE_CAPACITY, MAX_PALETTE_ENTRIES,
};
pub use pipeline::{clone_bitmap, copy_to, dither, quantize, CopyOutcome, Rectangle};
pub use quantize::{PredefinedQuantizer, Quantizer, QuantizerOptions, QuantizingSession, MAX_OPTIMIZED_COLORS};

pub use enough::{Stop, StopReason, Unstoppable};
