//! Median cut over the distinct colors of the source.

use std::ops::Range;

use super::mean_color;
use crate::color::{Color32, WorkingColorSpace};

struct Entry {
    color: Color32,
    weight: u32,
    working: [f32; 3],
}

/// Widest channel of `entries` and its extent, ties going to R, then G.
fn widest_axis(entries: &[Entry]) -> (usize, f32) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for entry in entries {
        for axis in 0..3 {
            min[axis] = min[axis].min(entry.working[axis]);
            max[axis] = max[axis].max(entry.working[axis]);
        }
    }
    let mut best = (0, max[0] - min[0]);
    for axis in 1..3 {
        let extent = max[axis] - min[axis];
        if extent > best.1 {
            best = (axis, extent);
        }
    }
    best
}

/// Sort a bucket along `axis` and split it at its weighted median.
fn split(entries: &mut [Entry], axis: usize) -> usize {
    entries.sort_by_key(|e| {
        let rgb = [e.color.r, e.color.g, e.color.b];
        (rgb[axis], rgb[0], rgb[1], rgb[2])
    });
    let total: u64 = entries.iter().map(|e| e.weight as u64).sum();
    let mut acc = 0u64;
    let mut mid = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        acc += entry.weight as u64;
        if acc * 2 >= total {
            mid = i + 1;
            break;
        }
    }
    mid.clamp(1, entries.len() - 1)
}

fn bucket_color(entries: &[Entry], space: WorkingColorSpace) -> Color32 {
    let mut sums = [0.0f64; 3];
    let mut weight = 0.0;
    for entry in entries {
        let w = entry.weight as f64;
        for (sum, v) in sums.iter_mut().zip(entry.working) {
            *sum += v as f64 * w;
        }
        weight += w;
    }
    mean_color(sums, weight, space)
}

/// Reduce `colors` to at most `max_colors` bucket means, in bucket order.
pub(super) fn reduce(
    colors: &[(Color32, u32)],
    max_colors: usize,
    space: WorkingColorSpace,
) -> Vec<Color32> {
    let mut entries: Vec<Entry> = colors
        .iter()
        .map(|&(color, weight)| Entry {
            color,
            weight,
            working: space.to_working(color),
        })
        .collect();
    let mut buckets: Vec<Range<usize>> = vec![0..entries.len()];

    while buckets.len() < max_colors {
        let mut chosen: Option<(usize, usize, f32)> = None;
        for (position, bucket) in buckets.iter().enumerate() {
            if bucket.len() < 2 {
                continue;
            }
            let (axis, extent) = widest_axis(&entries[bucket.clone()]);
            if chosen.map_or(true, |(_, _, best)| extent > best) {
                chosen = Some((position, axis, extent));
            }
        }
        let Some((position, axis, _)) = chosen else {
            break;
        };

        let bucket = buckets[position].clone();
        let mid = bucket.start + split(&mut entries[bucket.clone()], axis);
        buckets[position] = bucket.start..mid;
        buckets.push(mid..bucket.end);
    }

    buckets
        .into_iter()
        .map(|bucket| bucket_color(&entries[bucket], space))
        .collect()
}
