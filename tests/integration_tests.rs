use locus::{EntityId, IndexedEntity, IndexedEntityCache, SpatialIndex, haversine_km};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn hotel(id: EntityId, lat: f64, lon: f64) -> IndexedEntity {
    IndexedEntity::new(id, format!("Hotel {}", id))
        .with_address(format!("{} Lakeside Road", id))
        .with_capacity(20)
        .with_coordinates(lat, lon)
}

fn three_hotels() -> IndexedEntityCache {
    let cache = IndexedEntityCache::new();
    cache.upsert(hotel(1, 27.7000, 83.4500)).unwrap();
    cache.upsert(hotel(2, 27.7010, 83.4510)).unwrap();
    cache.upsert(hotel(3, 27.6990, 83.4490)).unwrap();
    cache
}

#[test]
fn test_nearest_two_of_three() {
    let cache = three_hotels();

    let results = cache.find_nearest(27.7000, 83.4500, 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, 1);
    assert!(results[0].distance_km.abs() < 1e-6);
    // 2 and 3 sit at the same distance from 1; either may come second.
    assert!(results[1].id == 2 || results[1].id == 3);
}

#[test]
fn test_more_requested_than_indexed() {
    let cache = three_hotels();

    let results = cache.find_nearest(27.7000, 83.4500, 5).unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn test_removed_entity_never_returned() {
    let cache = three_hotels();
    cache.remove(2).expect("hotel 2 should exist");

    let results = cache.find_nearest(27.7000, 83.4500, 3).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.id != 2));

    // The node is still physically in the tree.
    assert_eq!(cache.stats().tree_nodes, 3);
}

#[test]
fn test_reupsert_appears_once() {
    let cache = three_hotels();
    cache.upsert(hotel(2, 27.7005, 83.4505)).unwrap();
    cache.upsert(hotel(2, 27.7002, 83.4502)).unwrap();

    let results = cache.find_nearest(27.7000, 83.4500, 3).unwrap();
    let ids: Vec<EntityId> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids.iter().filter(|&&id| id == 2).count(), 1);
    assert_eq!(ids.len(), 3);

    let two = results.iter().find(|r| r.id == 2).unwrap();
    assert_eq!(two.latitude, 27.7002);
    assert_eq!(two.longitude, 83.4502);
}

#[test]
fn test_zero_distance_self_query() {
    let cache = three_hotels();
    for (id, lat, lon) in [
        (1, 27.7000, 83.4500),
        (2, 27.7010, 83.4510),
        (3, 27.6990, 83.4490),
    ] {
        let results = cache.find_nearest(lat, lon, 1).unwrap();
        assert_eq!(results[0].id, id);
        assert!(results[0].distance_km < 1e-6);
    }
}

#[test]
fn test_read_is_idempotent() {
    let cache = IndexedEntityCache::new();
    let mut rng = StdRng::seed_from_u64(7);
    for id in 0..500 {
        cache
            .upsert(hotel(id, rng.gen_range(26.0..30.0), rng.gen_range(80.0..88.0)))
            .unwrap();
    }

    let first = cache.find_nearest(28.0, 84.0, 50).unwrap();
    let second = cache.find_nearest(28.0, 84.0, 50).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_results_match_brute_force() {
    let cache = IndexedEntityCache::new();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut live: Vec<(EntityId, f64, f64)> = Vec::new();

    for id in 0..1_000 {
        let (lat, lon) = (rng.gen_range(-60.0..60.0), rng.gen_range(-180.0..180.0));
        cache.upsert(hotel(id, lat, lon)).unwrap();
        live.push((id, lat, lon));
    }
    // Move some, remove some.
    for id in (0..1_000).step_by(7) {
        let (lat, lon) = (rng.gen_range(-60.0..60.0), rng.gen_range(-180.0..180.0));
        cache.upsert(hotel(id, lat, lon)).unwrap();
        live[id as usize] = (id, lat, lon);
    }
    let removed: HashSet<EntityId> = (0..1_000).step_by(11).collect();
    for &id in &removed {
        cache.remove(id);
    }
    live.retain(|(id, _, _)| !removed.contains(id));

    for _ in 0..100 {
        let (lat, lon) = (rng.gen_range(-70.0..70.0), rng.gen_range(-180.0..180.0));
        let k = rng.gen_range(1..=100);

        let mut expected: Vec<f64> = live
            .iter()
            .map(|&(_, plat, plon)| haversine_km(lat, lon, plat, plon))
            .collect();
        expected.sort_by(f64::total_cmp);
        expected.truncate(k);

        let actual = cache.find_nearest(lat, lon, k).unwrap();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a.distance_km - e).abs() < 1e-9);
            assert!(!removed.contains(&a.id));
        }
    }
}

#[test]
fn test_k_bound_and_ordering() {
    let cache = IndexedEntityCache::new();
    for id in 0..40 {
        cache
            .upsert(hotel(id, 27.0 + id as f64 * 0.01, 83.0 + (id % 5) as f64 * 0.01))
            .unwrap();
    }
    for id in 0..10 {
        cache.remove(id);
    }

    for k in [1, 10, 30, 31, 100] {
        let results = cache.find_nearest(27.2, 83.02, k).unwrap();
        assert_eq!(results.len(), k.min(30));
        let ascending = results
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km);
        assert!(ascending);
    }
}

#[test]
fn test_axis_invariant_after_random_inserts() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut index = SpatialIndex::new();
    for id in 0..5_000u64 {
        // Coarse grid so ties on both axes are common.
        let lat = (rng.gen_range(-900..=900) as f64) / 10.0;
        let lon = (rng.gen_range(-1800..=1800) as f64) / 10.0;
        index.insert(id, lat, lon).unwrap();
    }
    assert!(index.check_invariants());
}

#[test]
fn test_full_entity_results() {
    let cache = three_hotels();
    let results = cache.find_nearest_entities(27.6990, 83.4490, 1).unwrap();
    assert_eq!(results[0].entity.id, 3);
    assert_eq!(results[0].entity.address, "3 Lakeside Road");
    assert_eq!(results[0].entity.capacity, Some(20));
}

#[test]
fn test_rebuild_preserves_answers() {
    let cache = IndexedEntityCache::new();
    let mut rng = StdRng::seed_from_u64(3);
    for round in 0..3 {
        for id in 0..300 {
            let lat = rng.gen_range(40.0..41.0);
            let lon = rng.gen_range(-74.5..-73.5) + round as f64 * 0.001;
            cache.upsert(hotel(id, lat, lon)).unwrap();
        }
    }

    let before = cache.find_nearest(40.5, -74.0, 25).unwrap();
    let stats = cache.stats();
    assert_eq!(stats.tree_nodes, 900);
    assert_eq!(stats.stale_nodes, 600);

    assert_eq!(cache.rebuild().unwrap(), 600);
    let after = cache.find_nearest(40.5, -74.0, 25).unwrap();
    assert_eq!(before, after);
    assert!(cache.check_invariants());
    assert!(cache.stats().tree_depth <= 12);
}
