//! Palettes and nearest-color matching
//!
//! A [`Palette`] is an ordered table of [`Color32`] entries. The position of
//! an entry is its color index. Besides the entries a palette carries the
//! settings needed to map an arbitrary color to an index:
//!
//! - a back color that partially transparent colors are blended against,
//! - an alpha threshold under which a color is treated as transparent,
//! - the working color space the distance is measured in,
//! - a [`DistanceMetric`].
//!
//! # Precomputation
//!
//! Working-space channels of every entry and an exact-match map are computed
//! once at construction. Other lookups are memoized in a [`ColorIndexCache`]
//! that is shared by clones of the palette and safe to use from several
//! threads at once.
//!
//! # Example
//!
//! ```
//! use pixel_pipeline::{Color32, Palette};
//!
//! let palette = Palette::new(vec![Color32::BLACK, Color32::WHITE]).unwrap();
//! assert_eq!(palette.get_nearest_color_index(Color32::from_gray(200)), 1);
//! ```

mod cache;
mod predefined;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use cache::{ColorIndexCache, RwLockColorCache, DEFAULT_CACHE_CAPACITY};

use crate::color::{Color32, WorkingColorSpace};
use crate::error::{DrawingError, Result};

/// Largest palette supported (16-bit indexed formats).
pub const MAX_PALETTE_ENTRIES: usize = 1 << 16;

/// Default alpha threshold of palettes and bitmaps.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// How the distance between two colors is measured.
///
/// Either way the channels are first converted to the palette's working
/// color space and the squared distance is compared. On exact ties the
/// entry with the lowest index wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Plain squared Euclidean distance of the R, G and B channels.
    #[default]
    Euclidean,

    /// Channels weighted by their contribution to brightness (BT.601 in
    /// sRGB, BT.709 in linear space).
    LuminanceWeighted,
}

/// An ordered color table with memoized nearest-color lookup.
#[derive(Clone)]
pub struct Palette {
    entries: Arc<[Color32]>,
    // Working-space R, G, B and alpha (0..=1) of every entry
    working: Arc<[[f32; 4]]>,
    exact: Arc<HashMap<Color32, usize>>,
    back_color: Color32,
    alpha_threshold: u8,
    working_color_space: WorkingColorSpace,
    metric: DistanceMetric,
    transparent_index: Option<usize>,
    is_grayscale: bool,
    has_alpha: bool,
    has_multi_level_alpha: bool,
    cache: Arc<dyn ColorIndexCache>,
}

impl Palette {
    /// Create a palette from its entries.
    ///
    /// # Errors
    ///
    /// [`DrawingError::ArgumentOutOfRange`] if `entries` is empty or longer
    /// than [`MAX_PALETTE_ENTRIES`].
    pub fn new(entries: impl Into<Vec<Color32>>) -> Result<Self> {
        let entries: Vec<Color32> = entries.into();
        if entries.is_empty() || entries.len() > MAX_PALETTE_ENTRIES {
            return Err(DrawingError::out_of_range(format!(
                "palette must have 1..={MAX_PALETTE_ENTRIES} entries, got {}",
                entries.len()
            )));
        }
        Ok(Self::from_entries(entries))
    }

    /// Build a palette from entries already known to be in range.
    pub(crate) fn from_entries(entries: Vec<Color32>) -> Self {
        let mut exact = HashMap::with_capacity(entries.len());
        for (i, &c) in entries.iter().enumerate() {
            exact.entry(c).or_insert(i);
        }

        let transparent_index = entries.iter().position(|c| c.a == 0);
        let is_grayscale = entries.iter().all(|c| c.r == c.g && c.g == c.b);
        let has_alpha = entries.iter().any(|c| c.a != 255);
        let has_multi_level_alpha = entries.iter().any(|c| c.a != 0 && c.a != 255);

        let mut palette = Self {
            entries: entries.into(),
            working: Arc::from(Vec::new()),
            exact: Arc::new(exact),
            back_color: Color32::BLACK,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            working_color_space: WorkingColorSpace::Default,
            metric: DistanceMetric::default(),
            transparent_index,
            is_grayscale,
            has_alpha,
            has_multi_level_alpha,
            cache: Arc::new(RwLockColorCache::default()),
        };
        palette.working = palette.compute_working();
        palette
    }

    fn compute_working(&self) -> Arc<[[f32; 4]]> {
        let space = self.space();
        self.entries
            .iter()
            .map(|&c| {
                let [r, g, b] = space.to_working(c);
                [r, g, b, c.a as f32 / 255.0]
            })
            .collect()
    }

    fn reset_cache(&mut self) {
        self.cache = Arc::new(RwLockColorCache::default());
    }

    /// Color that partially transparent colors are blended against. Stored opaque.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.back_color = color.to_opaque();
        self.reset_cache();
        self
    }

    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self.reset_cache();
        self
    }

    pub fn with_working_color_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_color_space = space;
        self.working = self.compute_working();
        self.reset_cache();
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self.reset_cache();
        self
    }

    /// Replace the nearest-color cache, e.g. with a shared or unbounded one.
    pub fn with_cache(mut self, cache: Arc<dyn ColorIndexCache>) -> Self {
        self.cache = cache;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for the `len`/`is_empty` convention.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Color32> {
        self.entries.get(index).copied()
    }

    #[inline]
    pub fn entries(&self) -> &[Color32] {
        &self.entries
    }

    pub fn back_color(&self) -> Color32 {
        self.back_color
    }

    pub fn alpha_threshold(&self) -> u8 {
        self.alpha_threshold
    }

    pub fn working_color_space(&self) -> WorkingColorSpace {
        self.working_color_space
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Index of the first fully transparent entry.
    pub fn transparent_index(&self) -> Option<usize> {
        self.transparent_index
    }

    pub fn is_grayscale(&self) -> bool {
        self.is_grayscale
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// True if some entry is neither opaque nor fully transparent.
    pub fn has_multi_level_alpha(&self) -> bool {
        self.has_multi_level_alpha
    }

    pub fn cache(&self) -> &Arc<dyn ColorIndexCache> {
        &self.cache
    }

    #[inline]
    fn space(&self) -> WorkingColorSpace {
        self.working_color_space.resolve(false)
    }

    /// Index of the entry closest to `color`.
    ///
    /// - Colors present in the palette return their first index.
    /// - Colors with alpha under the threshold return the transparent index
    ///   if there is one, and are blended against the back color otherwise.
    /// - Other partially transparent colors are blended against the back
    ///   color, unless the palette itself has partially transparent entries,
    ///   in which case alpha takes part in the distance.
    pub fn get_nearest_color_index(&self, color: Color32) -> usize {
        if let Some(&index) = self.exact.get(&color) {
            return index;
        }
        if color.a < self.alpha_threshold {
            if let Some(index) = self.transparent_index {
                return index;
            }
        }
        if let Some(index) = self.cache.get(color) {
            return index;
        }
        let index = self.find_nearest(color);
        self.cache.insert(color, index);
        index
    }

    /// Entry closest to `color`, see [`get_nearest_color_index`](Self::get_nearest_color_index).
    #[inline]
    pub fn get_nearest_color(&self, color: Color32) -> Color32 {
        self.entries[self.get_nearest_color_index(color)]
    }

    fn find_nearest(&self, color: Color32) -> usize {
        let space = self.space();
        let with_alpha = color.a != 255 && color.a >= self.alpha_threshold && self.has_multi_level_alpha;
        let mut color = if with_alpha {
            color
        } else {
            color.blend_with_background(self.back_color, space)
        };
        if self.is_grayscale {
            color = color.to_gray(space);
        }

        let [r, g, b] = space.to_working(color);
        let alpha = color.a as f32 / 255.0;
        let [wr, wg, wb] = match self.metric {
            DistanceMetric::Euclidean => [1.0, 1.0, 1.0],
            DistanceMetric::LuminanceWeighted => space.brightness_weights(),
        };

        let mut best_index = None;
        let mut best_distance = f32::MAX;
        for (i, &[er, eg, eb, ea]) in self.working.iter().enumerate() {
            let distance = if with_alpha {
                // premultiplied channels plus the alpha difference
                let dr = r * alpha - er * ea;
                let dg = g * alpha - eg * ea;
                let db = b * alpha - eb * ea;
                let da = alpha - ea;
                wr * dr * dr + wg * dg * dg + wb * db * db + da * da
            } else {
                // opaque lookups never land on transparent entries
                if ea == 0.0 {
                    continue;
                }
                let (dr, dg, db) = (r - er, g - eg, b - eb);
                wr * dr * dr + wg * dg * dg + wb * db * db
            };
            if distance < best_distance {
                best_distance = distance;
                best_index = Some(i);
            }
        }
        best_index.unwrap_or(0)
    }
}

impl PartialEq for Palette {
    /// Entries and mapping settings; the cache is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
            && self.back_color == other.back_color
            && self.alpha_threshold == other.alpha_threshold
            && self.working_color_space == other.working_color_space
            && self.metric == other.metric
    }
}

impl fmt::Debug for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Palette")
            .field("len", &self.entries.len())
            .field("back_color", &self.back_color)
            .field("alpha_threshold", &self.alpha_threshold)
            .field("working_color_space", &self.working_color_space)
            .field("metric", &self.metric)
            .field("transparent_index", &self.transparent_index)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_palette() -> Palette {
        Palette::new(vec![
            Color32::BLACK,
            Color32::from_rgb(255, 0, 0),
            Color32::from_rgb(0, 255, 0),
            Color32::from_rgb(0, 0, 255),
            Color32::WHITE,
        ])
        .unwrap()
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(
            Palette::new(Vec::new()),
            Err(DrawingError::ArgumentOutOfRange(_))
        ));
        assert!(Palette::new(vec![Color32::BLACK; MAX_PALETTE_ENTRIES]).is_ok());
        assert!(Palette::new(vec![Color32::BLACK; MAX_PALETTE_ENTRIES + 1]).is_err());
    }

    #[test]
    fn test_exact_match_returns_first_index() {
        let palette =
            Palette::new(vec![Color32::WHITE, Color32::BLACK, Color32::WHITE]).unwrap();
        assert_eq!(palette.get_nearest_color_index(Color32::WHITE), 0);
        assert_eq!(palette.get_nearest_color_index(Color32::BLACK), 1);
    }

    #[test]
    fn test_nearest_color() {
        let palette = rgb_palette();
        assert_eq!(
            palette.get_nearest_color(Color32::from_rgb(200, 30, 20)),
            Color32::from_rgb(255, 0, 0)
        );
        assert_eq!(palette.get_nearest_color_index(Color32::from_gray(220)), 4);
        assert_eq!(palette.get_nearest_color_index(Color32::from_gray(20)), 0);
    }

    #[test]
    fn test_tie_resolves_to_lowest_index() {
        // Green is exactly as far from red as from blue.
        let palette = Palette::new(vec![
            Color32::from_rgb(255, 0, 0),
            Color32::from_rgb(0, 0, 255),
        ])
        .unwrap();
        assert_eq!(palette.get_nearest_color_index(Color32::from_rgb(0, 255, 0)), 0);
        let linear = palette.with_working_color_space(WorkingColorSpace::Linear);
        assert_eq!(linear.get_nearest_color_index(Color32::from_rgb(0, 255, 0)), 0);
    }

    #[test]
    fn test_lookup_is_memoized_and_repeatable() {
        let palette = rgb_palette();
        let query = Color32::from_rgb(10, 200, 30);
        let first = palette.get_nearest_color_index(query);
        assert_eq!(palette.cache().len(), 1);
        for _ in 0..10 {
            assert_eq!(palette.get_nearest_color_index(query), first);
        }
        assert_eq!(palette.cache().len(), 1);
    }

    #[test]
    fn test_transparent_below_threshold() {
        let palette = Palette::new(vec![
            Color32::BLACK,
            Color32::WHITE,
            Color32::TRANSPARENT,
        ])
        .unwrap();
        assert_eq!(palette.transparent_index(), Some(2));
        assert_eq!(palette.get_nearest_color_index(Color32::new(10, 255, 255, 255)), 2);
        // Opaque black never maps to the transparent entry.
        assert_eq!(palette.get_nearest_color_index(Color32::from_rgb(1, 1, 1)), 0);
    }

    #[test]
    fn test_blend_against_back_color_without_transparent_entry() {
        let palette = Palette::new(vec![Color32::BLACK, Color32::WHITE])
            .unwrap()
            .with_back_color(Color32::WHITE);
        assert_eq!(palette.get_nearest_color_index(Color32::new(10, 0, 0, 0)), 1);
        let palette = palette.with_back_color(Color32::BLACK);
        assert_eq!(palette.get_nearest_color_index(Color32::new(10, 255, 255, 255)), 0);
    }

    #[test]
    fn test_grayscale_palette_matches_by_brightness() {
        let palette = Palette::grayscale4();
        assert!(palette.is_grayscale());
        // Pure blue is dark: BT.601 brightness 29
        assert_eq!(palette.get_nearest_color_index(Color32::from_rgb(0, 0, 255)), 0);
        // Pure green is bright: brightness 150
        assert_eq!(palette.get_nearest_color_index(Color32::from_rgb(0, 255, 0)), 2);
    }

    #[test]
    fn test_multi_level_alpha_palette() {
        let half = Color32::new(128, 255, 255, 255);
        let palette = Palette::new(vec![Color32::WHITE, half, Color32::BLACK]).unwrap();
        assert!(palette.has_multi_level_alpha());
        assert_eq!(palette.get_nearest_color_index(Color32::new(140, 250, 250, 250)), 1);
    }

    #[test]
    fn test_luminance_weighted_metric() {
        let palette = Palette::new(vec![
            Color32::from_rgb(0, 100, 0),
            Color32::from_rgb(0, 0, 255),
        ])
        .unwrap()
        .with_working_color_space(WorkingColorSpace::Srgb);
        let query = Color32::from_rgb(0, 0, 100);
        assert_eq!(palette.get_nearest_color_index(query), 0);
        // Blue barely contributes to brightness, so its difference is cheap.
        let weighted = palette.with_metric(DistanceMetric::LuminanceWeighted);
        assert_eq!(weighted.get_nearest_color_index(query), 1);
    }

    #[test]
    fn test_builders_reset_cache() {
        let palette = rgb_palette();
        palette.get_nearest_color_index(Color32::from_rgb(1, 2, 3));
        assert_eq!(palette.cache().len(), 1);
        let palette = palette.with_alpha_threshold(5);
        assert_eq!(palette.cache().len(), 0);
    }

    #[test]
    fn test_clones_share_cache() {
        let palette = rgb_palette();
        let clone = palette.clone();
        clone.get_nearest_color_index(Color32::from_rgb(1, 2, 3));
        assert_eq!(palette.cache().len(), 1);
        assert_eq!(palette, clone);
    }
}
