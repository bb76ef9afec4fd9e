//! Index-shuffling utilities shared by the sampler and the local optimizer.

use rand::Rng;

/// Partially shuffle `indices` so that its first `num_samples` elements form
/// a uniform random subset of that size, then truncate to `num_samples`.
///
/// This is a partial Fisher–Yates shuffle; the elements beyond the requested
/// prefix are the permutation residual and carry no guarantee. When
/// `num_samples >= indices.len()` the whole vector is shuffled and its length
/// is unchanged.
pub fn random_shuffle_and_resize(num_samples: usize, rng: &mut impl Rng, indices: &mut Vec<usize>) {
    let n = indices.len();
    let k = num_samples.min(n);
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
}
