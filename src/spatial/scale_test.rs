//! Scale tests for the spatial hash engine.
//!
//! These build real engines with a million entities, drive full update/remove
//! cycles and time radius queries against them.
//!
//! Run: cargo test --release -- --nocapture --ignored

#[cfg(test)]
mod tests {
    use crate::core::config::HashConfig;
    use crate::spatial::{Entity, Position, QueryRequest, SpatialEngine};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Instant;

    fn scatter(rng: &mut StdRng, n: usize, width: f32) -> Vec<Entity> {
        (0..n)
            .map(|_| {
                Entity::new(
                    rng.gen_range(100..1000),
                    rng.gen_range(0.0..width),
                    rng.gen_range(0.0..width),
                )
            })
            .collect()
    }

    /// 1M entities: build, jitter + update, 10k removals, 10k queries.
    #[test]
    #[ignore]
    fn scale_1m_full_cycle() {
        let sep = "=".repeat(80);
        println!("\n{}", sep);
        println!("  SPATIAL HASH: 1M ENTITY CYCLE");
        println!("{}\n", sep);

        let mut rng = StdRng::seed_from_u64(2024);
        let entities = scatter(&mut rng, 1_000_000, 10_000.0);

        println!("[1/4] Building 1,000,000 entities into 2^18 buckets...");
        let t0 = Instant::now();
        let mut engine =
            SpatialEngine::build(&entities, HashConfig::new(1 << 18, 10.0)).unwrap();
        println!("  Time: {:?}  |  {:?}", t0.elapsed(), engine.stats().unwrap());

        println!("\n[2/4] Jittering every entity and re-bucketing...");
        for index in 0..engine.len().unwrap() {
            let pos = engine.position_of(index).unwrap();
            let jitter = Position::new(
                pos.x + rng.gen_range(-5.0..5.0),
                pos.y + rng.gen_range(-5.0..5.0),
            );
            engine.set_position(index, jitter).unwrap();
        }
        let t1 = Instant::now();
        let moved = engine.update(engine.len().unwrap()).unwrap();
        println!("  Time: {:?}  |  Moved cell: {}", t1.elapsed(), moved);
        assert!(moved > 0);

        println!("\n[3/4] Removing 10,000 entities...");
        let t2 = Instant::now();
        for _ in 0..10_000 {
            let index = rng.gen_range(0..engine.len().unwrap());
            engine.remove(index).unwrap();
        }
        println!("  Time: {:?}  |  Live: {}", t2.elapsed(), engine.len().unwrap());
        assert_eq!(engine.len().unwrap(), 990_000);
        assert!(engine.is_consistent());

        println!("\n[4/4] Running 10,000 radius queries in parallel...");
        let requests: Vec<QueryRequest> = (0..10_000)
            .map(|_| {
                QueryRequest::new(
                    Position::new(rng.gen_range(0.0..10_000.0), rng.gen_range(0.0..10_000.0)),
                    25.0,
                    16,
                )
            })
            .collect();
        let t3 = Instant::now();
        let results = engine.query_many(&requests);
        let hits: usize = results.iter().map(|r| r.as_ref().map_or(0, Vec::len)).sum();
        println!("  Time: {:?}  |  Total hits: {}", t3.elapsed(), hits);
        assert!(results.iter().all(|r| r.is_ok()));

        println!("\n{}", sep);
        println!("  1M RESULT: PASSED");
        println!("{}\n", sep);
    }

    /// Everything in one cell: the accepted worst case for chain length.
    #[test]
    #[ignore]
    fn scale_clustered_worst_case() {
        let mut rng = StdRng::seed_from_u64(1);
        let entities: Vec<Entity> = (0..100_000)
            .map(|i| Entity::new(i, 500.0 + rng.gen_range(0.0..5.0), 500.0 + rng.gen_range(0.0..5.0)))
            .collect();

        let t0 = Instant::now();
        let engine = SpatialEngine::build(&entities, HashConfig::new(4, 10.0)).unwrap();
        let stats = engine.stats().unwrap();
        println!("Build: {:?}  |  longest chain {}", t0.elapsed(), stats.longest_chain);
        assert_eq!(stats.longest_chain, 100_000);

        let t1 = Instant::now();
        let hits = engine.query(Position::new(500.0, 500.0), 10.0, 5).unwrap();
        println!("Query: {:?}  |  {} hits", t1.elapsed(), hits.len());
        assert_eq!(hits.len(), 5);
    }
}
