//! Individual views built per population over the whole file.
//!
//! Each function fills one [`IndividualSubsample`] with an entry for every
//! population in the source, so a population list applied later at write
//! time only filters.
use crate::criteria::{Criteria, Expr};
use crate::error::{GenepopError, Result};
use crate::identifier::{FieldValue, IdSchema};
use crate::registry::{IndividualSubsample, SubsampleRegistry};
use crate::sampling::scheme::{subsample_tag, Scheme};
use crate::sampling::{proportion_of, sample_from};
use crate::source::GenepopSource;
use log::debug;
use rand::Rng;
use std::collections::BTreeMap;

/// Optional floor and ceiling on a population's selected count.
///
/// Below `min` the selection is emptied; above `max` a uniform random
/// subset of `max` individuals is kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl SizeBounds {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    fn apply<R: Rng + ?Sized>(&self, selected: Vec<usize>, rng: &mut R) -> Vec<usize> {
        match (self.min, self.max) {
            (Some(min), _) if selected.len() < min => vec![],
            (_, Some(max)) if selected.len() > max => sample_from(&selected, max, rng),
            _ => selected,
        }
    }
}

fn every_population<F>(source: &GenepopSource, mut select: F) -> Result<IndividualSubsample>
where
    F: FnMut(usize, usize) -> Result<Vec<usize>>,
{
    let mut view = IndividualSubsample::new();
    for (idx, count) in source.individual_counts().into_iter().enumerate() {
        let population = idx + 1;
        view.insert(population, select(population, count)?);
    }
    Ok(view)
}

fn all_of(count: usize) -> Vec<usize> {
    (1..=count).collect()
}

/// Samples `round(size * proportion)` individuals from every population,
/// capped at the population size.
pub fn by_proportion<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    proportion: f64,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    if proportion.is_nan() || proportion < 0.0 {
        return Err(GenepopError::InvalidParameter {
            operation: "proportion sampling",
            reason: format!("proportion {} is negative or not a number", proportion),
        });
    }
    let view = every_population(source, |_, count| {
        Ok(sample_from(&all_of(count), proportion_of(count, proportion), rng))
    })?;
    registry.insert_individuals(tag, view);
    Ok(())
}

/// Samples `min(n, size)` individuals from every population.
pub fn n_from_each<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    n: usize,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    let view = every_population(source, |_, count| Ok(sample_from(&all_of(count), n, rng)))?;
    registry.insert_individuals(tag, view);
    Ok(())
}

/// Removes `n` random individuals from every population. A population
/// with `n` or fewer individuals ends up empty.
pub fn remove_n<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    n: usize,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    let view = every_population(source, |_, count| {
        Ok(sample_from(&all_of(count), count.saturating_sub(n), rng))
    })?;
    registry.insert_individuals(tag, view);
    Ok(())
}

/// Keeps every individual except the `n`th of each population.
///
/// A population smaller than `n` gets an empty selection.
pub fn leave_nth_out(source: &GenepopSource, registry: &mut SubsampleRegistry, n: usize, tag: &str) -> Result<()> {
    if n < 1 {
        return Err(GenepopError::InvalidParameter {
            operation: "leave nth out",
            reason: "individuals are numbered from 1".into(),
        });
    }
    let view = every_population(source, |_, count| {
        Ok(if n > count {
            vec![]
        } else {
            (1..=count).filter(|&i| i != n).collect()
        })
    })?;
    registry.insert_individuals(tag, view);
    Ok(())
}

/// Registers explicit per-population lists.
///
/// Populations absent from `numbers` select no one.
pub fn by_number_list(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    numbers: &BTreeMap<usize, Vec<usize>>,
    tag: &str,
) -> Result<()> {
    let mut view = IndividualSubsample::new();
    for (&population, individuals) in numbers {
        let total = source.individual_count(population)?;
        if let Some(&individual) = individuals.iter().find(|&&i| i < 1 || i > total) {
            return Err(GenepopError::IndividualOutOfRange {
                operation: "individual list",
                population,
                individual,
                total,
            });
        }
        view.insert(population, individuals.iter().copied());
    }
    registry.insert_individuals(tag, view);
    Ok(())
}

/// Takes every population whole, emptied below `min` and randomly
/// trimmed to `max` above it.
pub fn by_population_size<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    min: usize,
    max: usize,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    if min > max {
        return Err(GenepopError::InvalidParameter {
            operation: "population size sampling",
            reason: format!("minimum {} exceeds maximum {}", min, max),
        });
    }
    let bounds = SizeBounds::new(Some(min), Some(max));
    let view = every_population(source, |_, count| Ok(bounds.apply(all_of(count), rng)))?;
    registry.insert_individuals(tag, view);
    Ok(())
}

fn matching(source: &GenepopSource, schema: &IdSchema, criteria: &Criteria, population: usize) -> Result<Vec<usize>> {
    let mut selected = vec![];
    for (individual, values) in schema.parse_population(source, population)? {
        if criteria.all_true(&values)? {
            selected.push(individual);
        }
    }
    Ok(selected)
}

/// Selects the individuals whose identifier passes every criterion.
pub fn by_criteria<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    schema: &IdSchema,
    criteria: &Criteria,
    bounds: SizeBounds,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    criteria.validate(schema)?;
    let view = every_population(source, |population, _| {
        let selected = matching(source, schema, criteria, population)?;
        debug!("{}: population {} has {} matches", tag, population, selected.len());
        Ok(bounds.apply(selected, rng))
    })?;
    registry.insert_individuals(tag, view);
    Ok(())
}

/// The distinct value tuples of `fields` across every identifier in the
/// file, in order of first appearance.
pub fn distinct_field_values(source: &GenepopSource, schema: &IdSchema, fields: &[&str]) -> Result<Vec<Vec<FieldValue>>> {
    schema.require(fields)?;
    let mut distinct: Vec<Vec<FieldValue>> = vec![];
    for population in 1..=source.population_count() {
        for (_, values) in schema.parse_population(source, population)? {
            let tuple: Vec<FieldValue> = fields.iter().filter_map(|f| values.get(f).cloned()).collect();
            if !distinct.contains(&tuple) {
                distinct.push(tuple);
            }
        }
    }
    Ok(distinct)
}

/// One view per distinct value tuple of `fields`, each selecting the
/// individuals that pass `criteria` and carry that tuple.
///
/// Returns the created tags, `[prefix_]g_combo_<n>_0` for n from 1.
#[allow(clippy::too_many_arguments)]
pub fn by_criteria_grouped<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    schema: &IdSchema,
    criteria: &Criteria,
    fields: &[&str],
    bounds: SizeBounds,
    tag_prefix: Option<&str>,
    rng: &mut R,
) -> Result<Vec<String>> {
    let mut tags = vec![];
    for (idx, tuple) in distinct_field_values(source, schema, fields)?.into_iter().enumerate() {
        let group = fields
            .iter()
            .zip(tuple)
            .map(|(field, value)| Expr::equals(field, value))
            .reduce(Expr::and)
            .ok_or(GenepopError::EmptySelection {
                operation: "grouped criteria",
            })?;
        let mut grouped = criteria.clone();
        grouped.add("group", group);
        let tag = subsample_tag(Scheme::CriteriaGrouped, &format!("combo_{}", idx + 1), 0, tag_prefix);
        by_criteria(source, registry, schema, &grouped, bounds, &tag, rng)?;
        tags.push(tag);
    }
    Ok(tags)
}

/// Samples each criterion separately, trimmed to `max`, then stores the
/// per-population union under `tag`.
pub fn by_criteria_factored<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    schema: &IdSchema,
    criteria: &Criteria,
    max: Option<usize>,
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    if criteria.is_empty() {
        return Err(GenepopError::EmptySelection {
            operation: "factored criteria",
        });
    }
    let temporaries: Vec<String> = (0..criteria.len()).map(|i| format!("{}temp_{}", tag, i)).collect();
    for (idx, temporary) in temporaries.iter().enumerate() {
        let single = criteria.subset(&[idx])?;
        by_criteria(source, registry, schema, &single, SizeBounds::new(None, max), temporary, rng)?;
    }
    let names: Vec<&str> = temporaries.iter().map(|t| t.as_str()).collect();
    registry.combine_individuals(source, &names, tag)?;
    registry.remove_individuals(&names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{FieldType, IdSchemaBuilder};
    use crate::source::tests::{source_from, PER_LINE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::error::Error;

    const AGED: &str = "\
sim nbne=1
l1
l2
pop
1;1;10;20;1, 0101 0202
2;2;10;20;1, 0101 0101
3;1;10;20;2, 0102 0202
4;2;11;21;1, 0202 0202
5;1;11;21;3, 0101 0102
pop
6;1;12;22;1, 0101 0202
7;2;12;22;2, 0101 0101
";

    fn schema() -> IdSchema {
        IdSchemaBuilder::new()
            .field("id", FieldType::Int)
            .field("sex", FieldType::Int)
            .field("father", FieldType::Int)
            .field("mother", FieldType::Int)
            .field("age", FieldType::Int)
            .build()
    }

    #[test]
    fn test_proportion_and_removal_sizes() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(7);

        by_proportion(&source, &mut registry, 0.5, "half", &mut rng)?;
        remove_n(&source, &mut registry, 4, "none", &mut rng)?;
        remove_n(&source, &mut registry, 1, "three", &mut rng)?;
        n_from_each(&source, &mut registry, 9, "all", &mut rng)?;

        for population in 1..=2 {
            assert_eq!(registry.individuals("half")?.selected(population).len(), 2);
            assert_eq!(registry.individuals("none")?.numbers(population), &[0]);
            assert_eq!(registry.individuals("three")?.selected(population).len(), 3);
            assert_eq!(registry.individuals("all")?.selected(population), &[1, 2, 3, 4]);
        }
        assert!(by_proportion(&source, &mut registry, -0.1, "bad", &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn test_leave_nth_out() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(AGED)?;
        let mut registry = SubsampleRegistry::new();
        leave_nth_out(&source, &mut registry, 3, "minus3")?;
        let view = registry.individuals("minus3")?;
        assert_eq!(view.selected(1), &[1, 2, 4, 5]);
        assert!(view.selected(2).is_empty());
        assert!(leave_nth_out(&source, &mut registry, 0, "bad").is_err());
        Ok(())
    }

    #[test]
    fn test_number_list_validates() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut numbers = BTreeMap::new();
        numbers.insert(2, vec![4, 1]);
        by_number_list(&source, &mut registry, &numbers, "list")?;
        assert_eq!(registry.individuals("list")?.numbers(2), &[0, 1, 4]);
        assert_eq!(registry.individuals("list")?.numbers(1), &[0]);

        numbers.insert(1, vec![5]);
        assert!(matches!(
            by_number_list(&source, &mut registry, &numbers, "bad"),
            Err(GenepopError::IndividualOutOfRange { population: 1, individual: 5, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_population_size_bounds() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(AGED)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(1);
        by_population_size(&source, &mut registry, 3, 4, "sized", &mut rng)?;
        let view = registry.individuals("sized")?;
        assert_eq!(view.selected(1).len(), 4);
        assert!(view.selected(2).is_empty());
        assert!(by_population_size(&source, &mut registry, 5, 4, "bad", &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn test_criteria_sampling() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(AGED)?;
        let schema = schema();
        let mut criteria = Criteria::new();
        criteria.add_expression("newborn", "%age% == 1")?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(3);

        by_criteria(&source, &mut registry, &schema, &criteria, SizeBounds::default(), "c", &mut rng)?;
        assert_eq!(registry.individuals("c")?.selected(1), &[1, 2, 4]);
        assert_eq!(registry.individuals("c")?.selected(2), &[1]);

        by_criteria(&source, &mut registry, &schema, &criteria, SizeBounds::new(Some(2), Some(2)), "b", &mut rng)?;
        assert_eq!(registry.individuals("b")?.selected(1).len(), 2);
        assert!(registry.individuals("b")?.selected(2).is_empty());
        Ok(())
    }

    #[test]
    fn test_grouped_and_factored_criteria() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(AGED)?;
        let schema = schema();
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(5);

        let parents = distinct_field_values(&source, &schema, &["father", "mother"])?;
        assert_eq!(parents.len(), 3);
        assert_eq!(parents[0], vec![FieldValue::Int(10), FieldValue::Int(20)]);

        let mut newborn = Criteria::new();
        newborn.add_expression("newborn", "%age% == 1")?;
        let tags = by_criteria_grouped(
            &source,
            &mut registry,
            &schema,
            &newborn,
            &["father", "mother"],
            SizeBounds::default(),
            Some("sib"),
            &mut rng,
        )?;
        assert_eq!(tags, vec!["sib_g_combo_1_0", "sib_g_combo_2_0", "sib_g_combo_3_0"]);
        assert_eq!(registry.individuals("sib_g_combo_1_0")?.selected(1), &[1, 2]);
        assert_eq!(registry.individuals("sib_g_combo_2_0")?.selected(1), &[4]);

        let mut cohorts = Criteria::new();
        cohorts
            .add_expression("age1", "%age% == 1")?
            .add_expression("age3", "%age% == 3")?;
        by_criteria_factored(&source, &mut registry, &schema, &cohorts, Some(1), "f", &mut rng)?;
        let factored = registry.individuals("f")?;
        assert_eq!(factored.selected(1).len(), 2);
        assert!(factored.selected(1).contains(&5));
        assert_eq!(factored.selected(2), &[1]);
        assert!(registry.individuals("ftemp_0").is_err());
        Ok(())
    }
}
