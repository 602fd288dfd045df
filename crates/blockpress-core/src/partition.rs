//! Block partitioner: recursive quadtree over a plane.
//!
//! The plane is tiled by superblocks of the maximum block size, each split
//! top-down into four half-size children while a residual-energy heuristic
//! stays above threshold. Blocks crossing the right/bottom plane edge are
//! force-split down to the minimum size, where the leaf is clipped to the
//! plane; leaves therefore tile the plane exactly, with no gaps or overlaps,
//! by construction. Nodes live in an index arena rather than a pointer tree.

use thiserror::Error;

use crate::plane::Plane;
use crate::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Split-cost threshold used by the frame pipeline: a block whose sample
/// variance exceeds this is split further.
pub const DEFAULT_SPLIT_THRESHOLD: u64 = 100;

/// Partitioner configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    /// Block size bounds are not powers of two inside the supported range,
    /// or the minimum exceeds the maximum.
    #[error("Invalid block size range: min {min}, max {max} (powers of two in {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE} required)")]
    InvalidBlockRange { min: u32, max: u32 },
}

/// A rectangular coding unit within one plane.
///
/// `size` is the nominal power-of-two block size; `width`/`height` are the
/// extents clipped to the plane and equal `size` everywhere except at the
/// right/bottom frame edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub width: u32,
    pub height: u32,
}

impl Block {
    fn new(x: u32, y: u32, size: u32, plane_w: u32, plane_h: u32) -> Self {
        Self {
            x,
            y,
            size,
            width: size.min(plane_w - x),
            height: size.min(plane_h - y),
        }
    }

    /// Clipped area in samples.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the nominal square extends past the plane edge.
    pub fn is_clipped(&self) -> bool {
        self.width < self.size || self.height < self.size
    }
}

/// One node of the partition tree.
#[derive(Debug, Clone)]
pub struct PartitionNode {
    pub block: Block,
    /// Child indices in TL, TR, BL, BR order; `None` entries are children
    /// that would lie entirely outside the plane. Leaf nodes have no array.
    pub children: Option<[Option<usize>; 4]>,
}

impl PartitionNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Quadtree partition of one plane, stored as an index arena.
#[derive(Debug, Clone)]
pub struct PartitionTree {
    nodes: Vec<PartitionNode>,
    roots: Vec<usize>,
    min_block: u32,
}

impl PartitionTree {
    /// All nodes in arena order.
    pub fn nodes(&self) -> &[PartitionNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &PartitionNode {
        &self.nodes[idx]
    }

    /// Superblock roots in raster order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Minimum leaf size this tree was built with.
    pub fn min_block(&self) -> u32 {
        self.min_block
    }

    /// Leaf blocks in coding order: superblocks in raster order, children
    /// depth-first in TL, TR, BL, BR order.
    pub fn leaves(&self) -> Vec<Block> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.collect_leaves(root, &mut out);
        }
        out
    }

    fn collect_leaves(&self, idx: usize, out: &mut Vec<Block>) {
        match self.nodes[idx].children {
            None => out.push(self.nodes[idx].block),
            Some(children) => {
                for child in children.into_iter().flatten() {
                    self.collect_leaves(child, out);
                }
            }
        }
    }
}

/// Sample variance of a block's clipped region, in integer arithmetic.
///
/// Returns floor of the mean squared deviation. Used as the split-cost
/// heuristic: high variance predicts high residual energy.
fn region_variance(plane: &Plane, block: &Block) -> u64 {
    let n = block.area();
    debug_assert!(n > 0);
    let mut sum = 0u64;
    for row in 0..block.height {
        for col in 0..block.width {
            sum += plane.get_clamped(block.x + col, block.y + row) as u64;
        }
    }
    let mean = sum / n;
    let mut sq = 0u64;
    for row in 0..block.height {
        for col in 0..block.width {
            let v = plane.get_clamped(block.x + col, block.y + row) as u64;
            let d = v.abs_diff(mean);
            sq += d * d;
        }
    }
    sq / n
}

fn validate_range(min: u32, max: u32) -> Result<(), PartitionError> {
    let valid = |s: u32| s.is_power_of_two() && (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&s);
    if !valid(min) || !valid(max) || min > max {
        return Err(PartitionError::InvalidBlockRange { min, max });
    }
    Ok(())
}

/// Partition one plane into a quadtree of coding blocks.
///
/// A block is split when its variance strictly exceeds `threshold` and it is
/// still above `min_block`; a variance exactly at threshold keeps the block
/// whole, bounding the worst-case block count. Blocks crossing the plane
/// edge are always split until the minimum size.
pub fn partition_plane(
    plane: &Plane,
    max_block: u32,
    min_block: u32,
    threshold: u64,
) -> Result<PartitionTree, PartitionError> {
    validate_range(min_block, max_block)?;

    let mut tree = PartitionTree {
        nodes: Vec::new(),
        roots: Vec::new(),
        min_block,
    };

    let mut y = 0;
    while y < plane.height() {
        let mut x = 0;
        while x < plane.width() {
            let root = build_node(&mut tree, plane, x, y, max_block, min_block, threshold);
            tree.roots.push(root);
            x += max_block;
        }
        y += max_block;
    }
    Ok(tree)
}

fn build_node(
    tree: &mut PartitionTree,
    plane: &Plane,
    x: u32,
    y: u32,
    size: u32,
    min_block: u32,
    threshold: u64,
) -> usize {
    let block = Block::new(x, y, size, plane.width(), plane.height());

    let must_split = block.is_clipped() && size > min_block;
    let want_split =
        size > min_block && region_variance(plane, &block) > threshold;

    let idx = tree.nodes.len();
    tree.nodes.push(PartitionNode {
        block,
        children: None,
    });

    if must_split || want_split {
        let half = size / 2;
        let offsets = [(0, 0), (half, 0), (0, half), (half, half)];
        let mut children = [None; 4];
        for (i, (dx, dy)) in offsets.into_iter().enumerate() {
            let cx = x + dx;
            let cy = y + dy;
            if cx < plane.width() && cy < plane.height() {
                children[i] = Some(build_node(tree, plane, cx, cy, half, min_block, threshold));
            }
        }
        tree.nodes[idx].children = Some(children);
    }
    idx
}
