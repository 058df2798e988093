//! Two-dimensional k-d tree over latitude/longitude pairs.
//!
//! The tree alternates its splitting axis per level: latitude at even depths,
//! longitude at odd depths. For a node splitting on axis `a`, every point in the
//! left subtree is strictly less than the node on `a` and every point in the
//! right subtree is greater than or equal to it.
//!
//! Insertion never rebalances, so the shape follows insertion order. A balanced
//! tree can be produced from a known point set with [`SpatialIndex::bulk_load`].
//! Nodes are never removed individually; owners drop stale nodes by rebuilding.
//!
//! ```rust
//! use locus::SpatialIndex;
//!
//! let mut index = SpatialIndex::new();
//! index.insert(1u64, 27.7000, 83.4500)?;
//! index.insert(2u64, 27.7010, 83.4510)?;
//!
//! let nearest = index.nearest(27.7000, 83.4500, 1);
//! assert_eq!(nearest[0].id, 1);
//! # Ok::<(), locus::LocusError>(())
//! ```

mod search;

pub use search::Neighbor;

use crate::compute::validation::validate_coordinate;
use crate::error::Result;

/// Splitting axis of a tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Axis used by nodes at `depth` (root is depth 0).
    pub fn at_depth(depth: usize) -> Self {
        if depth.is_multiple_of(2) {
            Axis::Latitude
        } else {
            Axis::Longitude
        }
    }

    #[inline]
    pub fn select(self, latitude: f64, longitude: f64) -> f64 {
        match self {
            Axis::Latitude => latitude,
            Axis::Longitude => longitude,
        }
    }
}

/// A single point of the tree. Children are owned exclusively by their parent.
#[derive(Debug)]
pub struct SpatialNode<I> {
    id: I,
    latitude: f64,
    longitude: f64,
    left: Option<Box<SpatialNode<I>>>,
    right: Option<Box<SpatialNode<I>>>,
}

impl<I> SpatialNode<I> {
    fn new(id: I, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
            left: None,
            right: None,
        }
    }

    pub fn id(&self) -> &I {
        &self.id
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn left(&self) -> Option<&SpatialNode<I>> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&SpatialNode<I>> {
        self.right.as_deref()
    }

    #[inline]
    fn split_value(&self, axis: Axis) -> f64 {
        axis.select(self.latitude, self.longitude)
    }
}

/// Unbalanced 2-d tree keyed by an opaque entity id.
///
/// Contains no knowledge of entity attributes; the same id may appear in
/// several nodes if the owner inserts it more than once.
#[derive(Debug)]
pub struct SpatialIndex<I> {
    root: Option<Box<SpatialNode<I>>>,
    len: usize,
}

impl<I> Default for SpatialIndex<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> SpatialIndex<I> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of nodes, including any the owner considers stale.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root(&self) -> Option<&SpatialNode<I>> {
        self.root.as_deref()
    }

    /// Inserts a point as a new leaf.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` for non-finite or out-of-range input; the
    /// tree is left untouched in that case.
    pub fn insert(&mut self, id: I, latitude: f64, longitude: f64) -> Result<()> {
        validate_coordinate(latitude, longitude)?;

        let mut slot = &mut self.root;
        let mut depth = 0;
        while let Some(node) = slot {
            let axis = Axis::at_depth(depth);
            slot = if axis.select(latitude, longitude) < node.split_value(axis) {
                &mut node.left
            } else {
                &mut node.right
            };
            depth += 1;
        }

        *slot = Some(Box::new(SpatialNode::new(id, latitude, longitude)));
        self.len += 1;
        Ok(())
    }

    /// Builds a balanced tree by splitting on the median of alternating axes.
    ///
    /// Points sharing the median value are kept on the right so the
    /// strictly-less-left ordering holds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if any point is invalid; nothing is built.
    pub fn bulk_load(mut points: Vec<(I, f64, f64)>) -> Result<Self> {
        for (_, latitude, longitude) in &points {
            validate_coordinate(*latitude, *longitude)?;
        }

        // Pre-order of medians; inserting in this order reproduces the balanced layout.
        let mut order = Vec::with_capacity(points.len());
        let mut pending = vec![(0, points.len(), 0usize)];
        while let Some((start, end, depth)) = pending.pop() {
            if start >= end {
                continue;
            }
            let axis = Axis::at_depth(depth);
            let range = &mut points[start..end];
            range.sort_by(|a, b| axis.select(a.1, a.2).total_cmp(&axis.select(b.1, b.2)));

            let mut mid = range.len() / 2;
            let pivot = axis.select(range[mid].1, range[mid].2);
            while mid > 0 && axis.select(range[mid - 1].1, range[mid - 1].2) == pivot {
                mid -= 1;
            }

            order.push(start + mid);
            pending.push((start + mid + 1, end, depth + 1));
            pending.push((start, start + mid, depth + 1));
        }

        let mut slots: Vec<Option<(I, f64, f64)>> = points.into_iter().map(Some).collect();
        let mut index = Self::new();
        for position in order {
            if let Some((id, latitude, longitude)) = slots[position].take() {
                index.insert(id, latitude, longitude)?;
            }
        }
        Ok(index)
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&SpatialNode<I>, usize)> =
            self.root().map(|n| (n, 1)).into_iter().collect();
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(node.left().map(|n| (n, depth + 1)));
            pending.extend(node.right().map(|n| (n, depth + 1)));
        }
        deepest
    }

    /// Pre-order iterator over every node.
    pub fn iter(&self) -> Iter<'_, I> {
        Iter {
            pending: self.root().into_iter().collect(),
        }
    }

    pub fn clear(&mut self) {
        drain(self.root.take());
        self.len = 0;
    }

    /// Checks the axis-ordering invariant over the whole tree.
    pub fn check_invariants(&self) -> bool {
        // Per axis: inclusive lower bound, exclusive upper bound.
        #[derive(Clone, Copy)]
        struct Bounds {
            lat: (f64, f64),
            lon: (f64, f64),
        }

        let unbounded = Bounds {
            lat: (f64::NEG_INFINITY, f64::INFINITY),
            lon: (f64::NEG_INFINITY, f64::INFINITY),
        };
        let mut pending: Vec<(&SpatialNode<I>, usize, Bounds)> =
            self.root().map(|n| (n, 0, unbounded)).into_iter().collect();
        let mut visited = 0;

        while let Some((node, depth, bounds)) = pending.pop() {
            visited += 1;
            let inside = |value: f64, (lo, hi): (f64, f64)| value >= lo && value < hi;
            if !inside(node.latitude, bounds.lat) || !inside(node.longitude, bounds.lon) {
                return false;
            }

            let axis = Axis::at_depth(depth);
            let split = node.split_value(axis);
            if let Some(left) = node.left() {
                let mut child = bounds;
                match axis {
                    Axis::Latitude => child.lat.1 = split,
                    Axis::Longitude => child.lon.1 = split,
                }
                pending.push((left, depth + 1, child));
            }
            if let Some(right) = node.right() {
                let mut child = bounds;
                match axis {
                    Axis::Latitude => child.lat.0 = split,
                    Axis::Longitude => child.lon.0 = split,
                }
                pending.push((right, depth + 1, child));
            }
        }

        visited == self.len
    }
}

impl<I> Drop for SpatialIndex<I> {
    fn drop(&mut self) {
        drain(self.root.take());
    }
}

/// Frees a subtree without recursion; degenerate trees can be very deep.
fn drain<I>(root: Option<Box<SpatialNode<I>>>) {
    let mut pending: Vec<Box<SpatialNode<I>>> = root.into_iter().collect();
    while let Some(mut node) = pending.pop() {
        pending.extend(node.left.take());
        pending.extend(node.right.take());
    }
}

/// Pre-order iterator returned by [`SpatialIndex::iter`].
#[derive(Debug)]
pub struct Iter<'a, I> {
    pending: Vec<&'a SpatialNode<I>>,
}

impl<'a, I> Iterator for Iter<'a, I> {
    type Item = &'a SpatialNode<I>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.pending.pop()?;
        self.pending.extend(node.right());
        self.pending.extend(node.left());
        Some(node)
    }
}

impl<'a, I> IntoIterator for &'a SpatialIndex<I> {
    type Item = &'a SpatialNode<I>;
    type IntoIter = Iter<'a, I>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
