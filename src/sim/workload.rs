use rand::prelude::*;

use crate::core::Ticks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    pub priority: i64,
    pub pages: i64,
    pub burst: Ticks,
}

pub const SHORT_BURST: Ticks = 2;
pub const LONG_BURST: Ticks = 6;
pub const MAX_PRIORITY: i64 = 9;
pub const MAX_PAGES: i64 = 3;

/// `count` jobs whose bursts are short with probability `p_short`, long
/// otherwise. The same seed yields the same jobs.
pub fn bernoulli_jobs(count: usize, p_short: f64, seed: u64) -> Vec<Job> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|i| {
            let burst = if rng.random::<f64>() < p_short {
                SHORT_BURST
            } else {
                LONG_BURST
            };
            Job {
                name: format!("job{i}"),
                priority: rng.random_range(0..=MAX_PRIORITY),
                pages: rng.random_range(1..=MAX_PAGES),
                burst,
            }
        })
        .collect()
}
