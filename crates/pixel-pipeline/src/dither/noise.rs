//! Noise ditherers: thresholds that depend only on the pixel position.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::clamp_strength;

/// White noise from a seeded generator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RandomNoiseDitherer {
    strength: Option<f32>,
    seed: Option<u64>,
}

impl RandomNoiseDitherer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed seed for reproducible output. Without one, every session draws
    /// its own.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(clamp_strength(strength));
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn strength(&self) -> Option<f32> {
        self.strength
    }
}

/// Jorge Jimenez' interleaved gradient noise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterleavedGradientNoiseDitherer {
    strength: Option<f32>,
}

impl InterleavedGradientNoiseDitherer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(clamp_strength(strength));
        self
    }

    pub fn strength(&self) -> Option<f32> {
        self.strength
    }
}

/// SplitMix64 finalizer over the seed and the position.
#[inline]
fn mix(seed: u64, x: usize, y: usize) -> u64 {
    let mut z = seed ^ (((x as u64) << 32) | (y as u64 & 0xffff_ffff));
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Threshold in `-0.5..0.5` of the white noise seeded with `seed`.
#[inline]
pub(super) fn white_noise(seed: u64, x: usize, y: usize) -> f32 {
    let mut rng = SmallRng::seed_from_u64(mix(seed, x, y));
    rng.gen::<f32>() - 0.5
}

/// Threshold in `-0.5..0.5` of interleaved gradient noise.
#[inline]
pub(super) fn interleaved_gradient(x: usize, y: usize) -> f32 {
    let v = 0.067_110_56 * x as f64 + 0.005_837_15 * y as f64;
    let v = 52.982_918_9 * v.fract();
    v.fract() as f32 - 0.5
}
