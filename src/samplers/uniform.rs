//! Uniform random sampler drawing minimal samples without replacement.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws `sample_size` distinct indices from `[0, num_data)` per call,
/// uniformly and independently across calls.
///
/// The sampler keeps a persistent index pool and runs `sample_size` steps of
/// a Fisher–Yates shuffle over it on every draw; the permutation residual
/// carries over between calls, which keeps each draw uniform without
/// re-initializing the pool. Deterministic for a fixed seed and call
/// sequence.
pub struct UniformSampler {
    rng: StdRng,
    indices: Vec<usize>,
    sample_size: usize,
}

impl UniformSampler {
    /// Create a sampler over `[0, num_data)` drawing `sample_size` indices
    /// per call.
    pub fn new(seed: u64, num_data: usize, sample_size: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            indices: (0..num_data).collect(),
            sample_size,
        }
    }

    /// Draw the next sample into `sample` (cleared first).
    pub fn sample(&mut self, sample: &mut Vec<usize>) {
        let n = self.indices.len();
        let k = self.sample_size.min(n);
        for i in 0..k {
            let j = self.rng.gen_range(i..n);
            self.indices.swap(i, j);
        }
        sample.clear();
        sample.extend_from_slice(&self.indices[..k]);
    }
}

#[cfg(test)]
mod tests {
    use super::UniformSampler;

    #[test]
    fn samples_are_distinct_and_in_range() {
        let mut sampler = UniformSampler::new(0, 20, 5);
        let mut sample = Vec::new();

        for _ in 0..200 {
            sampler.sample(&mut sample);
            assert_eq!(sample.len(), 5);
            assert!(sample.iter().all(|&i| i < 20));

            let mut sorted = sample.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 5, "sample contains duplicates: {sample:?}");
        }
    }

    #[test]
    fn identical_seeds_produce_identical_streams() {
        let mut a = UniformSampler::new(123, 50, 4);
        let mut b = UniformSampler::new(123, 50, 4);
        let mut sa = Vec::new();
        let mut sb = Vec::new();

        for _ in 0..50 {
            a.sample(&mut sa);
            b.sample(&mut sb);
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = UniformSampler::new(1, 100, 6);
        let mut b = UniformSampler::new(2, 100, 6);
        let mut sa = Vec::new();
        let mut sb = Vec::new();

        let mut all_equal = true;
        for _ in 0..10 {
            a.sample(&mut sa);
            b.sample(&mut sb);
            if sa != sb {
                all_equal = false;
            }
        }
        assert!(!all_equal);
    }

    #[test]
    fn sample_size_equal_to_pool_returns_everything() {
        let mut sampler = UniformSampler::new(9, 3, 3);
        let mut sample = Vec::new();
        sampler.sample(&mut sample);

        let mut sorted = sample.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
    }

    #[test]
    fn every_index_is_eventually_drawn() {
        let mut sampler = UniformSampler::new(5, 10, 2);
        let mut sample = Vec::new();
        let mut seen = [false; 10];

        for _ in 0..500 {
            sampler.sample(&mut sample);
            for &i in &sample {
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }
}
