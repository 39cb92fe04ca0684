//! Locus views drawn from a window of locus positions.
use crate::error::{GenepopError, Result};
use crate::registry::{LocusSubsample, SubsampleRegistry};
use crate::sampling::sample_from;
use crate::sampling::scheme::{subsample_tag, Scheme};
use crate::source::GenepopSource;
use log::debug;
use rand::Rng;

/// A 1-based, inclusive window of locus positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocusWindow {
    pub min: usize,
    pub max: usize,
    /// Lower `max` to the file's locus count instead of failing.
    pub truncate_to_total: bool,
}

impl LocusWindow {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min,
            max,
            truncate_to_total: true,
        }
    }

    /// The positions of this window in a file with `total` loci.
    pub fn positions(&self, operation: &'static str, total: usize) -> Result<Vec<usize>> {
        let max = if self.truncate_to_total {
            self.max.min(total)
        } else {
            self.max
        };
        if self.min < 1 || self.min > max || max > total {
            return Err(GenepopError::InvalidLocusWindow {
                operation,
                min: self.min,
                max: self.max,
                total,
            });
        }
        Ok((self.min..=max).collect())
    }
}

fn check_floor(operation: &'static str, size: usize, min_total: Option<usize>) -> Result<()> {
    match min_total {
        Some(minimum) if size < minimum => Err(GenepopError::BelowMinimum {
            operation,
            size,
            minimum,
        }),
        _ => Ok(()),
    }
}

/// Every locus of `window`, or a random `max_total` of them when the window
/// is larger. A window smaller than `min_total` is an error.
pub fn by_range_and_max<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    window: LocusWindow,
    min_total: Option<usize>,
    max_total: Option<usize>,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    let operation = "locus range sampling";
    let positions = window.positions(operation, source.locus_count())?;
    check_floor(operation, positions.len(), min_total)?;
    let size = max_total.map_or(positions.len(), |max| max.min(positions.len()));
    debug!("{}: {} of {} loci in window", tag, size, positions.len());
    registry.insert_loci(tag, LocusSubsample::new(sample_from(&positions, size, rng)));
    Ok(())
}

/// A random `round(window size * proportion)` loci of `window`.
pub fn by_range_and_proportion<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    window: LocusWindow,
    proportion: f64,
    min_total: Option<usize>,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    let operation = "locus proportion sampling";
    if proportion.is_nan() || proportion < 0.0 {
        return Err(GenepopError::InvalidParameter {
            operation,
            reason: format!("proportion {} is negative or not a number", proportion),
        });
    }
    let positions = window.positions(operation, source.locus_count())?;
    let size = super::proportion_of(positions.len(), proportion);
    check_floor(operation, size, min_total)?;
    registry.insert_loci(tag, LocusSubsample::new(sample_from(&positions, size, rng)));
    Ok(())
}

/// One view of exactly `total` random loci of `window` for each entry of
/// `totals`, tagged `[prefix_]s_<total>_<replicate>`.
pub fn by_range_and_totals<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    window: LocusWindow,
    totals: &[usize],
    replicate: usize,
    tag_prefix: Option<&str>,
    rng: &mut R,
) -> Result<Vec<String>> {
    let mut tags = Vec::with_capacity(totals.len());
    for &total in totals {
        let tag = subsample_tag(Scheme::LociTotals, &total.to_string(), replicate, tag_prefix);
        by_range_and_max(source, registry, window, Some(total), Some(total), &tag, rng)?;
        tags.push(tag);
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::source_from;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::error::Error;

    const FIVE_LOCI: &str = "title\nA, B, C, D, E\npop\na, 0101 0102 0103 0104 0105\n";

    #[test]
    fn test_window_positions() {
        assert_eq!(LocusWindow::new(2, 4).positions("t", 5).ok(), Some(vec![2, 3, 4]));
        assert_eq!(LocusWindow::new(3, 3).positions("t", 5).ok(), Some(vec![3]));
        assert_eq!(LocusWindow::new(4, 99).positions("t", 5).ok(), Some(vec![4, 5]));
        assert!(LocusWindow::new(0, 3).positions("t", 5).is_err());
        assert!(LocusWindow::new(4, 3).positions("t", 5).is_err());
        assert!(LocusWindow::new(6, 9).positions("t", 5).is_err());

        let strict = LocusWindow {
            truncate_to_total: false,
            ..LocusWindow::new(1, 6)
        };
        assert!(matches!(
            strict.positions("t", 5),
            Err(GenepopError::InvalidLocusWindow { max: 6, total: 5, .. })
        ));
    }

    #[test]
    fn test_range_and_max() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(FIVE_LOCI)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(31);

        by_range_and_max(&source, &mut registry, LocusWindow::new(1, 3), None, Some(2), "l", &mut rng)?;
        let positions = registry.loci("l")?.positions();
        assert_eq!(positions.len(), 2);
        assert!(positions.iter().all(|p| (1..=3).contains(p)));

        by_range_and_max(&source, &mut registry, LocusWindow::new(2, 5), None, None, "w", &mut rng)?;
        assert_eq!(registry.loci("w")?.positions(), &[2, 3, 4, 5]);

        assert!(matches!(
            by_range_and_max(&source, &mut registry, LocusWindow::new(1, 2), Some(3), None, "x", &mut rng),
            Err(GenepopError::BelowMinimum { size: 2, minimum: 3, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_range_and_proportion_and_totals() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(FIVE_LOCI)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(32);

        by_range_and_proportion(&source, &mut registry, LocusWindow::new(1, 4), 0.5, Some(1), "i", &mut rng)?;
        assert_eq!(registry.loci("i")?.positions().len(), 2);
        assert!(
            by_range_and_proportion(&source, &mut registry, LocusWindow::new(1, 4), 0.1, Some(1), "z", &mut rng)
                .is_err()
        );

        let tags = by_range_and_totals(&source, &mut registry, LocusWindow::new(1, 5), &[1, 3], 0, None, &mut rng)?;
        assert_eq!(tags, vec!["s_1_0", "s_3_0"]);
        assert_eq!(registry.loci("s_3_0")?.positions().len(), 3);
        assert!(by_range_and_totals(&source, &mut registry, LocusWindow::new(1, 2), &[3], 0, None, &mut rng).is_err());
        Ok(())
    }
}
