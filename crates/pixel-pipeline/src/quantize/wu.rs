//! Xiaolin Wu's color quantizer.
//!
//! Colors are binned into a `2^bits` per channel grid holding the pixel
//! count, the working-space channel sums and the sum of squared channels of
//! every cell. After turning these into cumulative moments, the volume of
//! any box is eight lookups. The box with the largest variance is split
//! repeatedly, along the axis and at the position that maximizes the
//! separation of the two halves.

use std::ops::{Add, Sub};

use super::mean_color;
use crate::color::{Color32, WorkingColorSpace};

pub(super) const DEFAULT_BITS: u8 = 5;
const MAX_BITS: u8 = 7;

#[derive(Debug, Clone, Copy, Default)]
struct Moment {
    weight: f64,
    r: f64,
    g: f64,
    b: f64,
    sq: f64,
}

impl Moment {
    fn distance(&self) -> f64 {
        (self.r * self.r + self.g * self.g + self.b * self.b) / self.weight
    }
}

impl Add for Moment {
    type Output = Moment;

    fn add(self, o: Moment) -> Moment {
        Moment {
            weight: self.weight + o.weight,
            r: self.r + o.r,
            g: self.g + o.g,
            b: self.b + o.b,
            sq: self.sq + o.sq,
        }
    }
}

impl Sub for Moment {
    type Output = Moment;

    fn sub(self, o: Moment) -> Moment {
        Moment {
            weight: self.weight - o.weight,
            r: self.r - o.r,
            g: self.g - o.g,
            b: self.b - o.b,
            sq: self.sq - o.sq,
        }
    }
}

/// Half-open on the low side: cells `lo+1..=hi` of every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cube {
    lo: [usize; 3],
    hi: [usize; 3],
}

impl Cube {
    fn cells(&self) -> usize {
        (0..3).map(|axis| self.hi[axis] - self.lo[axis]).product()
    }
}

struct Histogram {
    side: usize,
    moments: Vec<Moment>,
}

impl Histogram {
    fn new(colors: &[(Color32, u32)], bits: u8, space: WorkingColorSpace) -> Self {
        let side = (1usize << bits) + 1;
        let mut histogram = Self {
            side,
            moments: vec![Moment::default(); side * side * side],
        };
        let shift = 8 - bits;
        for &(color, count) in colors {
            let index = histogram.index(
                (color.r >> shift) as usize + 1,
                (color.g >> shift) as usize + 1,
                (color.b >> shift) as usize + 1,
            );
            let weight = count as f64;
            let [r, g, b] = space.to_working(color).map(f64::from);
            let cell = &mut histogram.moments[index];
            cell.weight += weight;
            cell.r += r * weight;
            cell.g += g * weight;
            cell.b += b * weight;
            cell.sq += (r * r + g * g + b * b) * weight;
        }
        histogram.accumulate();
        histogram
    }

    #[inline]
    fn index(&self, r: usize, g: usize, b: usize) -> usize {
        (r * self.side + g) * self.side + b
    }

    /// Turn per-cell moments into moments of the box from the origin.
    fn accumulate(&mut self) {
        let side = self.side;
        // area[b]: cells r, 1..=g, 1..=b of the current r slice
        let mut area = vec![Moment::default(); side];
        for r in 1..side {
            area.fill(Moment::default());
            for g in 1..side {
                let mut line = Moment::default();
                for b in 1..side {
                    let at = self.index(r, g, b);
                    line = line + self.moments[at];
                    area[b] = area[b] + line;
                    self.moments[at] = self.moments[self.index(r - 1, g, b)] + area[b];
                }
            }
        }
    }

    fn volume(&self, cube: &Cube) -> Moment {
        let [r0, g0, b0] = cube.lo;
        let [r1, g1, b1] = cube.hi;
        let m = |r, g, b| self.moments[self.index(r, g, b)];
        m(r1, g1, b1) - m(r1, g1, b0) - m(r1, g0, b1) + m(r1, g0, b0) - m(r0, g1, b1)
            + m(r0, g1, b0)
            + m(r0, g0, b1)
            - m(r0, g0, b0)
    }

    fn variance(&self, cube: &Cube) -> f64 {
        let v = self.volume(cube);
        if v.weight == 0.0 {
            0.0
        } else {
            v.sq - v.distance()
        }
    }

    /// Best cut along `axis`: the score and the last cell of the lower half.
    fn maximize(&self, cube: &Cube, axis: usize, whole: Moment) -> (f64, Option<usize>) {
        let mut best = (0.0, None);
        for position in cube.lo[axis] + 1..cube.hi[axis] {
            let mut lower = *cube;
            lower.hi[axis] = position;
            let half = self.volume(&lower);
            if half.weight == 0.0 {
                continue;
            }
            let other = whole - half;
            if other.weight == 0.0 {
                continue;
            }
            let score = half.distance() + other.distance();
            if score > best.0 {
                best = (score, Some(position));
            }
        }
        best
    }

    fn cut(&self, cube: &Cube) -> Option<(Cube, Cube)> {
        let whole = self.volume(cube);
        let scores = [0, 1, 2].map(|axis| self.maximize(cube, axis, whole));
        let mut axis = 0;
        for candidate in 1..3 {
            if scores[candidate].0 > scores[axis].0 {
                axis = candidate;
            }
        }
        let position = scores[axis].1?;
        let mut lower = *cube;
        let mut upper = *cube;
        lower.hi[axis] = position;
        upper.lo[axis] = position;
        Some((lower, upper))
    }
}

/// Reduce `colors` to at most `max_colors` box means, in box creation order.
pub(super) fn reduce(
    colors: &[(Color32, u32)],
    max_colors: usize,
    bits: u8,
    space: WorkingColorSpace,
) -> Vec<Color32> {
    let histogram = Histogram::new(colors, bits.clamp(1, MAX_BITS), space);
    let top = histogram.side - 1;
    let mut cubes = vec![Cube {
        lo: [0; 3],
        hi: [top; 3],
    }];
    let mut variances = vec![0.0];
    let mut next = 0;

    while cubes.len() < max_colors {
        match histogram.cut(&cubes[next]) {
            Some((lower, upper)) => {
                let score = |cube: &Cube| {
                    if cube.cells() > 1 {
                        histogram.variance(cube)
                    } else {
                        0.0
                    }
                };
                variances[next] = score(&lower);
                variances.push(score(&upper));
                cubes[next] = lower;
                cubes.push(upper);
            }
            None => variances[next] = 0.0,
        }

        let mut best = 0;
        for (i, &v) in variances.iter().enumerate() {
            if v > variances[best] {
                best = i;
            }
        }
        if variances[best] <= 0.0 {
            break;
        }
        next = best;
    }

    cubes
        .iter()
        .map(|cube| histogram.volume(cube))
        .filter(|m| m.weight > 0.0)
        .map(|m| mean_color([m.r, m.g, m.b], m.weight, space))
        .collect()
}
