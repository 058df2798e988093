//! Bounded best-k search with branch pruning.

use super::{Axis, SpatialIndex, SpatialNode};
use crate::compute::distance::{haversine_km, latitude_gap_km, longitude_gap_km};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;

/// A point returned by a nearest-neighbor search.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<I> {
    pub id: I,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

/// Helper struct for heap-based top-k selection (max-heap by distance)
struct Candidate<'a, I> {
    node: &'a SpatialNode<I>,
    distance: f64,
}

impl<I> PartialEq for Candidate<'_, I> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl<I> Eq for Candidate<'_, I> {}

impl<I> PartialOrd for Candidate<'_, I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I> Ord for Candidate<'_, I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Larger distances have higher priority so the worst kept entry is popped first.
        self.distance.total_cmp(&other.distance)
    }
}

/// Max-heap of at most `capacity` candidates holding one entry per id.
struct BestK<'a, I> {
    capacity: usize,
    heap: BinaryHeap<Candidate<'a, I>>,
    kept: FxHashMap<&'a I, f64>,
}

impl<'a, I: Eq + Hash> BestK<'a, I> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            kept: FxHashMap::default(),
        }
    }

    fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    fn worst(&self) -> f64 {
        self.heap.peek().map_or(f64::INFINITY, |c| c.distance)
    }

    fn offer(&mut self, node: &'a SpatialNode<I>, distance: f64) {
        let id = node.id();

        if let Some(&previous) = self.kept.get(id) {
            // Same id seen again: keep only its closest occurrence.
            if distance < previous {
                self.heap.retain(|c| c.node.id() != id);
                self.heap.push(Candidate { node, distance });
                self.kept.insert(id, distance);
            }
            return;
        }

        if self.heap.len() < self.capacity {
            self.heap.push(Candidate { node, distance });
            self.kept.insert(id, distance);
        } else if let Some(worst) = self.heap.peek()
            && distance < worst.distance
        {
            if let Some(evicted) = self.heap.pop() {
                self.kept.remove(evicted.node.id());
            }
            self.heap.push(Candidate { node, distance });
            self.kept.insert(id, distance);
        }
    }

    fn into_sorted(self) -> Vec<Candidate<'a, I>> {
        self.heap.into_sorted_vec()
    }
}

impl<I: Clone + Eq + Hash> SpatialIndex<I> {
    /// Up to `k` distinct ids nearest to the query, ascending by haversine distance.
    ///
    /// An empty tree or `k == 0` yields an empty vector. When an id was inserted
    /// more than once only its closest node is reported.
    pub fn nearest(&self, latitude: f64, longitude: f64, k: usize) -> Vec<Neighbor<I>> {
        self.nearest_filtered(latitude, longitude, k, |_| true)
    }

    /// Like [`nearest`](Self::nearest), skipping nodes rejected by `accept`.
    ///
    /// Rejected nodes never occupy a result slot, so a caller hiding stale
    /// entries still receives `k` results when enough accepted nodes exist.
    pub fn nearest_filtered<F>(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
        mut accept: F,
    ) -> Vec<Neighbor<I>>
    where
        F: FnMut(&SpatialNode<I>) -> bool,
    {
        let Some(root) = self.root() else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut best = BestK::new(k.min(self.len()));

        // (node, depth, lower bound on the distance to anything in its subtree)
        let mut pending: Vec<(&SpatialNode<I>, usize, f64)> = vec![(root, 0, 0.0)];

        while let Some((node, depth, bound)) = pending.pop() {
            if best.is_full() && bound >= best.worst() {
                continue;
            }

            if accept(node) {
                let distance = haversine_km(latitude, longitude, node.latitude, node.longitude);
                if distance.is_finite() {
                    best.offer(node, distance);
                }
            }

            let axis = Axis::at_depth(depth);
            let (near, far) = if axis.select(latitude, longitude) < node.split_value(axis) {
                (node.left(), node.right())
            } else {
                (node.right(), node.left())
            };

            // Far side is pushed first so the near side is explored first.
            if let Some(far) = far {
                let gap = match axis {
                    Axis::Latitude => latitude_gap_km(latitude, node.latitude),
                    Axis::Longitude => longitude_gap_km(latitude, longitude, node.longitude),
                };
                pending.push((far, depth + 1, bound.max(gap)));
            }
            if let Some(near) = near {
                pending.push((near, depth + 1, bound));
            }
        }

        best.into_sorted()
            .into_iter()
            .map(|c| Neighbor {
                id: c.node.id().clone(),
                latitude: c.node.latitude,
                longitude: c.node.longitude,
                distance_km: c.distance,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn brute_force(points: &[(u64, f64, f64)], lat: f64, lon: f64, k: usize) -> Vec<(u64, f64)> {
        let mut best: FxHashMap<u64, f64> = FxHashMap::default();
        for &(id, plat, plon) in points {
            let d = haversine_km(lat, lon, plat, plon);
            let entry = best.entry(id).or_insert(d);
            if d < *entry {
                *entry = d;
            }
        }
        let mut all: Vec<(u64, f64)> = best.into_iter().collect();
        all.sort_by(|a, b| a.1.total_cmp(&b.1));
        all.truncate(k);
        all
    }

    fn random_point(rng: &mut StdRng) -> (f64, f64) {
        (rng.gen_range(-90.0..=90.0), rng.gen_range(-180.0..=180.0))
    }

    #[test]
    fn test_empty_tree() {
        let index: SpatialIndex<u64> = SpatialIndex::new();
        assert!(index.nearest(10.0, 10.0, 5).is_empty());
    }

    #[test]
    fn test_zero_k() {
        let mut index = SpatialIndex::new();
        index.insert(1u64, 10.0, 10.0).unwrap();
        assert!(index.nearest(10.0, 10.0, 0).is_empty());
    }

    #[test]
    fn test_nearest_scenario() {
        let mut index = SpatialIndex::new();
        index.insert(1u64, 27.7000, 83.4500).unwrap();
        index.insert(2u64, 27.7010, 83.4510).unwrap();
        index.insert(3u64, 27.6990, 83.4490).unwrap();

        let results = index.nearest(27.7000, 83.4500, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!(results[0].distance_km < 1e-6);
        assert!(results[1].id == 2 || results[1].id == 3);
    }

    #[test]
    fn test_fewer_points_than_k() {
        let mut index = SpatialIndex::new();
        index.insert(1u64, 1.0, 1.0).unwrap();
        index.insert(2u64, 2.0, 2.0).unwrap();
        index.insert(3u64, 3.0, 3.0).unwrap();

        let results = index.nearest(0.0, 0.0, 5);
        let ids: Vec<u64> = results.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_ids_reported_once() {
        let mut index = SpatialIndex::new();
        index.insert(7u64, 10.0, 10.0).unwrap();
        index.insert(7u64, 10.5, 10.5).unwrap();
        index.insert(8u64, 11.0, 11.0).unwrap();

        let results = index.nearest(10.5, 10.5, 3);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 7);
        assert_eq!(results[0].latitude, 10.5);
        assert_eq!(results[1].id, 8);
    }

    #[test]
    fn test_filter_does_not_consume_slots() {
        let mut index = SpatialIndex::new();
        for i in 0..10u64 {
            index.insert(i, i as f64 * 0.01, 0.0).unwrap();
        }

        // Hide the three closest points; the next three must take their place.
        let results = index.nearest_filtered(0.0, 0.0, 3, |n| *n.id() >= 3);
        let ids: Vec<u64> = results.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_matches_brute_force_random() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let points: Vec<(u64, f64, f64)> = (0..2_000u64)
            .map(|i| {
                let (lat, lon) = random_point(&mut rng);
                (i, lat, lon)
            })
            .collect();

        let mut index = SpatialIndex::new();
        for &(id, lat, lon) in &points {
            index.insert(id, lat, lon).unwrap();
        }

        for _ in 0..200 {
            let (lat, lon) = random_point(&mut rng);
            let k = rng.gen_range(1..=25);

            let expected = brute_force(&points, lat, lon, k);
            let actual = index.nearest(lat, lon, k);

            assert_eq!(actual.len(), expected.len());
            // Compare distances rather than ids so exact ties cannot flake.
            for (a, e) in actual.iter().zip(&expected) {
                assert!(
                    (a.distance_km - e.1).abs() < 1e-9,
                    "query ({}, {})",
                    lat,
                    lon
                );
            }
            let ids: HashSet<u64> = actual.iter().map(|n| n.id).collect();
            assert_eq!(ids.len(), actual.len());
        }
    }

    #[test]
    fn test_matches_brute_force_clustered_with_duplicates() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut points = Vec::new();
        for i in 0..1_500u64 {
            let id = i % 600;
            points.push((id, rng.gen_range(27.0..28.5), rng.gen_range(83.0..85.0)));
        }

        let index = SpatialIndex::bulk_load(points.clone()).unwrap();

        for _ in 0..100 {
            let lat = rng.gen_range(26.5..29.0);
            let lon = rng.gen_range(82.5..85.5);
            let expected = brute_force(&points, lat, lon, 10);
            let actual = index.nearest(lat, lon, 10);

            assert_eq!(actual.len(), 10);
            for (a, e) in actual.iter().zip(&expected) {
                assert!((a.distance_km - e.1).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_across_antimeridian() {
        let mut index = SpatialIndex::new();
        index.insert(1u64, 0.0, 0.0).unwrap();
        index.insert(2u64, 0.0, -179.5).unwrap();
        index.insert(3u64, 0.0, 90.0).unwrap();
        index.insert(4u64, 0.0, 170.0).unwrap();

        let results = index.nearest(0.0, 179.5, 1);
        assert_eq!(results[0].id, 2);
    }

    #[test]
    fn test_results_are_ascending() {
        let mut index = SpatialIndex::new();
        for i in 0..100u64 {
            let lat = ((i * 37) % 100) as f64 * 0.1;
            let lon = ((i * 53) % 100) as f64 * 0.1;
            index.insert(i, lat, lon).unwrap();
        }
        let results = index.nearest(5.0, 5.0, 30);
        assert_eq!(results.len(), 30);
        let ascending = results
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km);
        assert!(ascending);
    }
}
