use crate::error::{GenepopError, Result};
use crate::registry::{PopulationSubsample, SubsampleRegistry};
use crate::source::GenepopSource;

/// Registers the populations in `numbers` under `tag`.
///
/// Every number must lie in `1..=population_count`.
pub fn by_list(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    numbers: &[usize],
    tag: &str,
) -> Result<()> {
    let total = source.population_count();
    if let Some(&population) = numbers.iter().find(|&&p| p < 1 || p > total) {
        return Err(GenepopError::PopulationOutOfRange {
            operation: "population list",
            population,
            total,
        });
    }
    registry.insert_populations(tag, PopulationSubsample::new(numbers.iter().copied()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::{source_from, PER_LINE};
    use std::error::Error;

    #[test]
    fn test_by_list_sorts_and_validates() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        by_list(&source, &mut registry, &[2, 1, 2], "pops")?;
        assert_eq!(registry.populations("pops")?.numbers(), &[1, 2]);

        assert!(matches!(
            by_list(&source, &mut registry, &[0, 1], "bad"),
            Err(GenepopError::PopulationOutOfRange { population: 0, .. })
        ));
        assert!(by_list(&source, &mut registry, &[3], "bad").is_err());
        assert!(registry.populations("bad").is_err());
        Ok(())
    }
}
