//! Ordered dithering with threshold matrices tiled over the image.

use std::sync::{Arc, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::clamp_strength;

use crate::error::{DrawingError, Result};

/// Largest side of a custom matrix.
const MAX_MATRIX_SIDE: usize = 256;

/// Thresholds of one matrix, already mapped to `-0.5..0.5`.
#[derive(Debug, PartialEq)]
pub(super) struct ThresholdMatrix {
    width: usize,
    height: usize,
    thresholds: Vec<f32>,
}

impl ThresholdMatrix {
    /// `values` hold ranks `0..levels` in row-major order.
    fn from_ranks(width: usize, height: usize, values: &[u32], levels: u32) -> Self {
        let levels = levels as f32;
        Self {
            width,
            height,
            thresholds: values
                .iter()
                .map(|&v| (v as f32 + 0.5) / levels - 0.5)
                .collect(),
        }
    }

    #[inline]
    pub(super) fn threshold(&self, x: usize, y: usize) -> f32 {
        self.thresholds[(y % self.height) * self.width + x % self.width]
    }
}

/// Ordered dithering settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedDitherer {
    name: &'static str,
    matrix: Arc<ThresholdMatrix>,
    strength: Option<f32>,
}

impl OrderedDitherer {
    pub fn bayer2x2() -> Self {
        Self::bayer("bayer2x2", 2)
    }

    pub fn bayer4x4() -> Self {
        Self::bayer("bayer4x4", 4)
    }

    pub fn bayer8x8() -> Self {
        Self::bayer("bayer8x8", 8)
    }

    /// Clustered dots growing from two centers, like print halftoning.
    pub fn dotted_halftone() -> Self {
        let ranks: Vec<u32> = DOTTED_HALFTONE.iter().flatten().map(|&v| v as u32).collect();
        Self::with_matrix("dotted-halftone", ThresholdMatrix::from_ranks(8, 8, &ranks, 64))
    }

    /// 64x64 void-and-cluster tile. Its thresholds carry little low
    /// frequency energy, so the pattern reads as fine grain. The tile is
    /// generated on first use and shared afterwards.
    pub fn blue_noise() -> Self {
        Self {
            name: "blue-noise",
            matrix: blue_noise_matrix(),
            strength: None,
        }
    }

    /// A custom matrix of ranks. Thresholds are spread evenly between the
    /// lowest possible rank `0` and the largest rank in the matrix.
    pub fn from_matrix(rows: &[Vec<u8>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 || height == 0 || width > MAX_MATRIX_SIDE || height > MAX_MATRIX_SIDE {
            return Err(DrawingError::out_of_range(format!(
                "matrix must be between 1x1 and {MAX_MATRIX_SIDE}x{MAX_MATRIX_SIDE}, got {width}x{height}"
            )));
        }
        if rows.iter().any(|row| row.len() != width) {
            return Err(DrawingError::out_of_range("matrix rows differ in length"));
        }
        let ranks: Vec<u32> = rows.iter().flatten().map(|&v| v as u32).collect();
        let levels = ranks.iter().copied().max().unwrap_or(0) + 1;
        Ok(Self::with_matrix(
            "custom",
            ThresholdMatrix::from_ranks(width, height, &ranks, levels),
        ))
    }

    fn bayer(name: &'static str, size: usize) -> Self {
        let ranks = bayer_ranks(size);
        Self::with_matrix(
            name,
            ThresholdMatrix::from_ranks(size, size, &ranks, (size * size) as u32),
        )
    }

    fn with_matrix(name: &'static str, matrix: ThresholdMatrix) -> Self {
        Self {
            name,
            matrix: Arc::new(matrix),
            strength: None,
        }
    }

    /// Scale of the thresholds relative to the full channel range. `None`
    /// derives it from the quantizer's color levels, `0.0` disables
    /// dithering.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(clamp_strength(strength));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strength(&self) -> Option<f32> {
        self.strength
    }

    /// Width and height of the tiled matrix.
    pub fn size(&self) -> (usize, usize) {
        (self.matrix.width, self.matrix.height)
    }

    pub(super) fn matrix(&self) -> &Arc<ThresholdMatrix> {
        &self.matrix
    }
}

/// Bayer index matrix of side `size`, a power of two.
fn bayer_ranks(size: usize) -> Vec<u32> {
    let mut ranks = vec![0u32];
    let mut side = 1;
    while side < size {
        let next_side = side * 2;
        let mut next = vec![0u32; next_side * next_side];
        for y in 0..side {
            for x in 0..side {
                let v = 4 * ranks[y * side + x];
                next[y * next_side + x] = v;
                next[y * next_side + x + side] = v + 2;
                next[(y + side) * next_side + x] = v + 3;
                next[(y + side) * next_side + x + side] = v + 1;
            }
        }
        ranks = next;
        side = next_side;
    }
    ranks
}

#[rustfmt::skip]
const DOTTED_HALFTONE: [[u8; 8]; 8] = [
    [24, 10, 12, 26, 35, 47, 49, 37],
    [ 8,  0,  2, 14, 45, 59, 61, 51],
    [22,  6,  4, 16, 43, 57, 63, 53],
    [30, 20, 18, 28, 33, 41, 55, 39],
    [34, 46, 48, 36, 25, 11, 13, 27],
    [44, 58, 60, 50,  9,  1,  3, 15],
    [42, 56, 62, 52, 23,  7,  5, 17],
    [32, 40, 54, 38, 31, 21, 19, 29],
];

/// Side of the blue noise tile.
const BLUE_NOISE_SIDE: usize = 64;
/// Width of the Gaussian used to measure clusters and voids.
const BLUE_NOISE_SIGMA: f32 = 1.5;
const BLUE_NOISE_SEED: u64 = 0x5eed_b1e0;

/// Threshold ranks of a tileable blue noise square, built by Ulichney's
/// void-and-cluster method. Every rank in `0..side * side` appears once.
fn void_and_cluster(side: usize, sigma: f32, seed: u64) -> Vec<u32> {
    let n = side * side;
    let mut field = EnergyField::new(side, sigma);

    // initial pattern: about a tenth of the cells, at distinct positions
    let mut rng = StdRng::seed_from_u64(seed);
    let mut prototype = vec![false; n];
    let initial = (n / 10).max(1);
    let mut placed = 0;
    while placed < initial {
        let i = rng.gen_range(0..n);
        if !prototype[i] {
            prototype[i] = true;
            field.toggle(i, true);
            placed += 1;
        }
    }

    // spread it out: move the tightest cluster into the largest void
    for _ in 0..n {
        let cluster = field.tightest_cluster(&prototype);
        prototype[cluster] = false;
        field.toggle(cluster, false);
        let void = field.largest_void(&prototype);
        prototype[void] = true;
        field.toggle(void, true);
        if void == cluster {
            break;
        }
    }

    let mut ranks = vec![0u32; n];
    let ones = placed;

    // ranks below the prototype: peel off clusters
    let mut pattern = prototype.clone();
    let mut removal = field.clone();
    for rank in (0..ones).rev() {
        let cluster = removal.tightest_cluster(&pattern);
        pattern[cluster] = false;
        removal.toggle(cluster, false);
        ranks[cluster] = rank as u32;
    }

    // ranks above: fill voids; the emptiest cell among the zeros is also the
    // tightest cluster of zeros, so one rule covers both halves
    let mut pattern = prototype;
    for rank in ones..n {
        let void = field.largest_void(&pattern);
        pattern[void] = true;
        field.toggle(void, true);
        ranks[void] = rank as u32;
    }
    ranks
}

/// Gaussian-weighted density of the set cells, on a torus.
#[derive(Clone)]
struct EnergyField {
    side: usize,
    kernel: Vec<f32>,
    energy: Vec<f32>,
}

impl EnergyField {
    fn new(side: usize, sigma: f32) -> Self {
        let wrap = |d: usize| d.min(side - d) as f32;
        let mut kernel = vec![0.0; side * side];
        for dy in 0..side {
            for dx in 0..side {
                let (x, y) = (wrap(dx), wrap(dy));
                kernel[dy * side + dx] = (-(x * x + y * y) / (2.0 * sigma * sigma)).exp();
            }
        }
        Self {
            side,
            kernel,
            energy: vec![0.0; side * side],
        }
    }

    fn toggle(&mut self, cell: usize, on: bool) {
        let side = self.side;
        let sign = if on { 1.0 } else { -1.0 };
        let (cx, cy) = (cell % side, cell / side);
        for y in 0..side {
            let dy = (y + side - cy) % side;
            for x in 0..side {
                let dx = (x + side - cx) % side;
                self.energy[y * side + x] += sign * self.kernel[dy * side + dx];
            }
        }
    }

    /// Set cell with the highest energy; ties go to the first.
    fn tightest_cluster(&self, pattern: &[bool]) -> usize {
        let mut best = None;
        for (i, &e) in self.energy.iter().enumerate() {
            if pattern[i] && best.map_or(true, |(_, b)| e > b) {
                best = Some((i, e));
            }
        }
        best.map_or(0, |(i, _)| i)
    }

    /// Unset cell with the lowest energy; ties go to the first.
    fn largest_void(&self, pattern: &[bool]) -> usize {
        let mut best = None;
        for (i, &e) in self.energy.iter().enumerate() {
            if !pattern[i] && best.map_or(true, |(_, b)| e < b) {
                best = Some((i, e));
            }
        }
        best.map_or(0, |(i, _)| i)
    }
}

fn blue_noise_matrix() -> Arc<ThresholdMatrix> {
    static MATRIX: OnceLock<Arc<ThresholdMatrix>> = OnceLock::new();
    MATRIX
        .get_or_init(|| {
            let ranks = void_and_cluster(BLUE_NOISE_SIDE, BLUE_NOISE_SIGMA, BLUE_NOISE_SEED);
            tracing::debug!(side = BLUE_NOISE_SIDE, "Generated blue noise tile");
            Arc::new(ThresholdMatrix::from_ranks(
                BLUE_NOISE_SIDE,
                BLUE_NOISE_SIDE,
                &ranks,
                (BLUE_NOISE_SIDE * BLUE_NOISE_SIDE) as u32,
            ))
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_bayer2x2() {
        assert_eq!(bayer_ranks(2), vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_bayer_ranks_are_permutations() {
        for size in [2, 4, 8] {
            let mut ranks = bayer_ranks(size);
            ranks.sort_unstable();
            assert_eq!(ranks, (0..(size * size) as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_halftone_ranks_are_permutation() {
        let mut ranks: Vec<u8> = DOTTED_HALFTONE.iter().flatten().copied().collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (0..64).collect::<Vec<u8>>());
    }

    #[test]
    fn test_thresholds_are_centered() {
        for ditherer in [
            OrderedDitherer::bayer2x2(),
            OrderedDitherer::bayer8x8(),
            OrderedDitherer::dotted_halftone(),
        ] {
            let matrix = ditherer.matrix();
            let sum: f32 = matrix.thresholds.iter().sum();
            assert!(sum.abs() < 1e-3, "{}", ditherer.name());
            assert!(matrix
                .thresholds
                .iter()
                .all(|t| (-0.5..0.5).contains(t)));
        }
    }

    #[test]
    fn test_matrix_tiles() {
        let matrix = OrderedDitherer::bayer4x4().matrix().clone();
        assert_eq!(matrix.threshold(1, 2), matrix.threshold(5, 6));
        assert_eq!(matrix.threshold(0, 0), -0.5 + 0.5 / 16.0);
    }

    #[test]
    fn test_void_and_cluster_ranks_are_permutation() {
        let mut ranks = void_and_cluster(16, BLUE_NOISE_SIGMA, 7);
        ranks.sort_unstable();
        assert_eq!(ranks, (0..256).collect::<Vec<u32>>());
        assert_eq!(OrderedDitherer::blue_noise().size(), (64, 64));
    }

    #[test]
    fn test_blue_noise_suppresses_low_frequencies() {
        // For white noise the means of 4x4 blocks keep 1/16 of the pixel
        // variance; a blue noise tile spreads every block over the range.
        let matrix = OrderedDitherer::blue_noise().matrix().clone();
        let side = BLUE_NOISE_SIDE;
        let values: Vec<f64> = (0..side * side)
            .map(|i| f64::from(matrix.threshold(i % side, i / side)))
            .collect();
        let variance = |v: &[f64]| {
            let mean = v.iter().sum::<f64>() / v.len() as f64;
            v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / v.len() as f64
        };
        let blocks: Vec<f64> = (0..(side / 4) * (side / 4))
            .map(|b| {
                let (bx, by) = (b % (side / 4) * 4, b / (side / 4) * 4);
                (0..16)
                    .map(|k| values[(by + k / 4) * side + bx + k % 4])
                    .sum::<f64>()
                    / 16.0
            })
            .collect();
        let ratio = variance(&blocks) / variance(&values);
        assert!(ratio < 0.025, "block variance ratio {ratio}");
    }

    #[test]
    fn test_blue_noise_is_shared() {
        let a = OrderedDitherer::blue_noise();
        let b = OrderedDitherer::blue_noise();
        assert!(Arc::ptr_eq(a.matrix(), b.matrix()));
    }

    #[test]
    fn test_custom_matrix() {
        let ditherer = OrderedDitherer::from_matrix(&[vec![0, 1, 2], vec![3, 4, 5]]).unwrap();
        assert_eq!(ditherer.size(), (3, 2));
        assert_eq!(ditherer.matrix().threshold(0, 0), -0.5 + 0.5 / 6.0);

        assert!(OrderedDitherer::from_matrix(&[]).is_err());
        assert!(OrderedDitherer::from_matrix(&[vec![0, 1], vec![2]]).is_err());
    }

    #[test]
    fn test_strength_setting() {
        assert_eq!(OrderedDitherer::bayer8x8().strength(), None);
        assert_eq!(
            OrderedDitherer::bayer8x8().with_strength(0.25).strength(),
            Some(0.25)
        );
    }
}
