//! Algorithms that build views in a [`SubsampleRegistry`](crate::registry::SubsampleRegistry).
//!
//! Every function draws randomness from the caller's [`Rng`], so a seeded
//! `StdRng` makes a run reproducible.
use rand::seq::index;
use rand::Rng;

pub mod cohorts;
pub mod individuals;
pub mod loci;
pub mod populations;
pub mod relateds;
pub mod scheme;

/// Draws `amount` items of `items` uniformly without replacement.
///
/// `amount` is capped at `items.len()`.
pub(crate) fn sample_from<R: Rng + ?Sized>(items: &[usize], amount: usize, rng: &mut R) -> Vec<usize> {
    let amount = amount.min(items.len());
    index::sample(rng, items.len(), amount)
        .into_iter()
        .map(|i| items[i])
        .collect()
}

/// `round(size * proportion)`, half away from zero, never above `size`.
pub(crate) fn proportion_of(size: usize, proportion: f64) -> usize {
    ((size as f64 * proportion).round().max(0.0) as usize).min(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_from_is_a_capped_subset() {
        let mut rng = StdRng::seed_from_u64(42);
        let items = vec![3, 5, 7, 9];
        let picked = sample_from(&items, 2, &mut rng);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|p| items.contains(p)));
        assert_eq!(sample_from(&items, 10, &mut rng).len(), 4);
        assert!(sample_from(&[], 3, &mut rng).is_empty());
    }

    #[test]
    fn test_proportion_of() {
        assert_eq!(proportion_of(4, 0.5), 2);
        assert_eq!(proportion_of(5, 0.5), 3);
        assert_eq!(proportion_of(4, 1.5), 4);
        assert_eq!(proportion_of(4, 0.0), 0);
    }
}
