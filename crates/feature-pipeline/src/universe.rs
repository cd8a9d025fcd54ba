use std::collections::{BTreeSet, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use research_core::{PricePoint, UniverseSampling};

/// Deterministic subset of `instruments`.
///
/// Instruments are de-duplicated and sorted before shuffling with the seeded
/// generator, so the same (universe, seed, size) always yields the same subset
/// regardless of input order. The result is sorted.
pub fn sample_universe(instruments: &[String], sampling: &UniverseSampling) -> Vec<String> {
    let mut pool: Vec<String> = instruments
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if sampling.sample_size < pool.len() {
        let mut rng = StdRng::seed_from_u64(sampling.seed);
        pool.shuffle(&mut rng);
        pool.truncate(sampling.sample_size);
        pool.sort();
    }
    pool
}

/// Keep only prices for instruments in the sampled universe.
pub fn filter_universe(prices: Vec<PricePoint>, sampling: Option<&UniverseSampling>) -> Vec<PricePoint> {
    let sampling = match sampling {
        Some(s) => s,
        None => return prices,
    };
    let all: Vec<String> = prices.iter().map(|p| p.instrument.clone()).collect();
    let keep: HashSet<String> = sample_universe(&all, sampling).into_iter().collect();
    tracing::info!("Sampled {} instruments (seed {})", keep.len(), sampling.seed);
    prices.into_iter().filter(|p| keep.contains(&p.instrument)).collect()
}
