//! Octree color reduction.
//!
//! Each level of the tree consumes one bit of every RGB channel, most
//! significant first. Leaves accumulate pixel counts and working-space
//! channel sums. While there are too many leaves, the children of an
//! internal node are folded into it, choosing nodes from the deepest level
//! first, then by lowest pixel count, then by creation order.

use super::mean_color;
use crate::color::{Color32, WorkingColorSpace};

// index 0 is the root, which is never a child
const NO_CHILD: u32 = 0;

#[derive(Debug)]
struct Node {
    children: [u32; 8],
    level: u8,
    is_leaf: bool,
    count: u64,
    sums: [f64; 3],
    // position of the first color that reached this node
    first_seen: usize,
}

impl Node {
    fn new(level: u8, first_seen: usize, is_leaf: bool) -> Self {
        Self {
            children: [NO_CHILD; 8],
            level,
            is_leaf,
            count: 0,
            sums: [0.0; 3],
            first_seen,
        }
    }
}

struct Octree {
    nodes: Vec<Node>,
    levels: u8,
    leaf_count: usize,
}

impl Octree {
    fn new(levels: u8) -> Self {
        Self {
            nodes: vec![Node::new(0, 0, false)],
            levels,
            leaf_count: 0,
        }
    }

    fn insert(&mut self, color: Color32, count: u32, order: usize, space: WorkingColorSpace) {
        let mut node = 0;
        for level in 0..self.levels {
            let shift = 7 - level;
            let child = (((color.r >> shift) & 1) << 2
                | ((color.g >> shift) & 1) << 1
                | ((color.b >> shift) & 1)) as usize;
            self.nodes[node].count += count as u64;
            node = match self.nodes[node].children[child] {
                NO_CHILD => {
                    let id = self.nodes.len();
                    let is_leaf = level + 1 == self.levels;
                    self.nodes.push(Node::new(level + 1, order, is_leaf));
                    self.nodes[node].children[child] = id as u32;
                    self.leaf_count += usize::from(is_leaf);
                    id
                }
                existing => existing as usize,
            };
        }

        let weight = count as f64;
        let working = space.to_working(color);
        let leaf = &mut self.nodes[node];
        leaf.count += count as u64;
        for (sum, v) in leaf.sums.iter_mut().zip(working) {
            *sum += v as f64 * weight;
        }
    }

    /// Fold `node`'s children into it.
    fn merge(&mut self, node: usize) {
        let children = std::mem::replace(&mut self.nodes[node].children, [NO_CHILD; 8]);
        let mut merged = 0;
        let mut sums = [0.0; 3];
        let mut first_seen = self.nodes[node].first_seen;
        for child in children.into_iter().filter(|&c| c != NO_CHILD) {
            let child = &self.nodes[child as usize];
            for (sum, s) in sums.iter_mut().zip(child.sums) {
                *sum += s;
            }
            first_seen = first_seen.min(child.first_seen);
            merged += 1;
        }
        let target = &mut self.nodes[node];
        target.sums = sums;
        target.first_seen = first_seen;
        target.is_leaf = true;
        self.leaf_count = self.leaf_count + 1 - merged;
    }

    fn reduce_to(&mut self, max_leaves: usize) {
        for level in (0..self.levels).rev() {
            if self.leaf_count <= max_leaves {
                return;
            }
            // every node below `level` is a leaf by now
            let mut candidates: Vec<usize> = (0..self.nodes.len())
                .filter(|&i| self.nodes[i].level == level && !self.nodes[i].is_leaf)
                .collect();
            candidates.sort_by_key(|&i| (self.nodes[i].count, i));
            for node in candidates {
                if self.leaf_count <= max_leaves {
                    return;
                }
                self.merge(node);
            }
        }
    }

    fn leaves(&self) -> Vec<&Node> {
        let mut leaves = Vec::with_capacity(self.leaf_count);
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if node.is_leaf {
                leaves.push(node);
            } else {
                stack.extend(
                    node.children
                        .iter()
                        .filter(|&&c| c != NO_CHILD)
                        .map(|&c| c as usize),
                );
            }
        }
        leaves.sort_by_key(|leaf| leaf.first_seen);
        leaves
    }
}

/// Reduce `colors` to at most `max_colors` entries ordered by first
/// appearance.
pub(super) fn reduce(
    colors: &[(Color32, u32)],
    max_colors: usize,
    levels: u8,
    space: WorkingColorSpace,
) -> Vec<Color32> {
    let mut tree = Octree::new(levels);
    for (order, &(color, count)) in colors.iter().enumerate() {
        tree.insert(color, count, order, space);
    }
    tree.reduce_to(max_colors.max(1));
    tree.leaves()
        .into_iter()
        .map(|leaf| mean_color(leaf.sums, leaf.count as f64, space))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SRGB: WorkingColorSpace = WorkingColorSpace::Srgb;

    #[test]
    fn test_distinct_colors_within_budget_are_exact() {
        let colors = [
            (Color32::from_rgb(255, 0, 0), 2),
            (Color32::from_rgb(0, 0, 255), 2),
        ];
        assert_eq!(
            reduce(&colors, 2, 8, SRGB),
            vec![Color32::from_rgb(255, 0, 0), Color32::from_rgb(0, 0, 255)]
        );
    }

    #[test]
    fn test_lowest_count_siblings_merge_first() {
        let colors = [
            (Color32::from_rgb(0, 0, 0), 5),
            (Color32::from_rgb(100, 100, 100), 3),
            (Color32::from_rgb(101, 100, 100), 1),
        ];
        assert_eq!(
            reduce(&colors, 2, 8, SRGB),
            vec![Color32::from_rgb(0, 0, 0), Color32::from_rgb(100, 100, 100)]
        );
    }

    #[test]
    fn test_single_color_budget_averages_everything() {
        let colors = [
            (Color32::from_rgb(0, 0, 0), 1),
            (Color32::from_rgb(200, 100, 50), 1),
        ];
        assert_eq!(
            reduce(&colors, 1, 8, SRGB),
            vec![Color32::from_rgb(100, 50, 25)]
        );
    }

    #[test]
    fn test_shallow_tree_groups_by_high_bits() {
        let colors = [
            (Color32::from_rgb(10, 10, 10), 1),
            (Color32::from_rgb(20, 20, 20), 1),
            (Color32::from_rgb(250, 250, 250), 1),
        ];
        // with one level only the top bit of each channel matters
        assert_eq!(
            reduce(&colors, 256, 1, SRGB),
            vec![Color32::from_rgb(15, 15, 15), Color32::from_rgb(250, 250, 250)]
        );
    }

    #[test]
    fn test_result_respects_budget() {
        let colors: Vec<(Color32, u32)> = (0..=255u8)
            .map(|v| (Color32::from_rgb(v, 255 - v, v / 2), 1))
            .collect();
        for k in [1, 2, 7, 64, 255] {
            let palette = reduce(&colors, k, 8, SRGB);
            assert!(!palette.is_empty() && palette.len() <= k);
        }
    }
}
