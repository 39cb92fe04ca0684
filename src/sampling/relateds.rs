//! Samples that mix full-sibling pairs with unrelated individuals.
use crate::error::{GenepopError, Result};
use crate::identifier::{FieldValue, IdSchema};
use crate::registry::{IndividualSubsample, SubsampleRegistry};
use crate::sampling::sample_from;
use crate::source::GenepopSource;
use log::debug;
use rand::Rng;

#[derive(Clone, Debug, PartialEq)]
pub struct RelatedsParams {
    age_field: String,
    mother_field: String,
    father_field: String,
    sibling_age: i64,
    min_size: usize,
    max_size: usize,
    fraction: f64,
}

impl RelatedsParams {
    /// A target where `fraction` of each sample are full siblings, drawn from
    /// individuals of age 1 under the fields `age`, `mother` and `father`.
    pub fn new(fraction: f64) -> Self {
        Self {
            age_field: "age".to_owned(),
            mother_field: "mother".to_owned(),
            father_field: "father".to_owned(),
            sibling_age: 1,
            min_size: 0,
            max_size: usize::MAX,
            fraction,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn fields(&mut self, age: &str, mother: &str, father: &str) -> &mut Self {
        self.age_field = age.to_owned();
        self.mother_field = mother.to_owned();
        self.father_field = father.to_owned();
        self
    }

    pub fn sibling_age(&mut self, age: i64) -> &mut Self {
        self.sibling_age = age;
        self
    }

    /// Fewer eligible individuals than `min` is an error; more than `max`
    /// caps the target at `max`.
    pub fn size(&mut self, min: usize, max: usize) -> &mut Self {
        self.min_size = min;
        self.max_size = max;
        self
    }
}

/// Eligible individuals of one population grouped by parent pair, groups in
/// order of first appearance.
struct Families {
    eligible: Vec<usize>,
    groups: Vec<((FieldValue, FieldValue), Vec<usize>)>,
}

fn families(source: &GenepopSource, schema: &IdSchema, params: &RelatedsParams, population: usize) -> Result<Families> {
    let mut eligible = vec![];
    let mut groups: Vec<((FieldValue, FieldValue), Vec<usize>)> = vec![];
    for (individual, values) in schema.parse_population(source, population)? {
        if values.get(&params.age_field).and_then(|v| v.as_i64()) != Some(params.sibling_age) {
            continue;
        }
        let parents = match (values.get(&params.mother_field), values.get(&params.father_field)) {
            (Some(m), Some(f)) => (m.clone(), f.clone()),
            _ => continue,
        };
        eligible.push(individual);
        match groups.iter_mut().find(|(key, _)| *key == parents) {
            Some((_, siblings)) => siblings.push(individual),
            None => groups.push((parents, vec![individual])),
        }
    }
    Ok(Families { eligible, groups })
}

/// Takes the first two siblings of each parent pair, parent pairs in file
/// order, until at least `target` relateds are collected. A parent pair
/// gives at most one sibling pair.
fn sibling_pairs(population: usize, groups: &[((FieldValue, FieldValue), Vec<usize>)], target: f64) -> Result<Vec<usize>> {
    let mut collected = vec![];
    let mut missing = target;
    let mut pairs = groups.iter().filter(|(_, siblings)| siblings.len() > 1);
    while missing > 0.0 {
        match pairs.next() {
            Some((_, siblings)) => {
                collected.extend_from_slice(&siblings[..2]);
                missing -= 2.0;
            }
            None => {
                return Err(GenepopError::InsufficientRelateds {
                    population,
                    target,
                    missing,
                })
            }
        }
    }
    Ok(collected)
}

/// For each population in `populations`, collects full-sibling pairs until
/// `target * fraction` relateds are reached, then pads with randomly drawn
/// unrelated individuals up to the target size.
pub fn by_relateds<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    schema: &IdSchema,
    params: &RelatedsParams,
    populations: &[usize],
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    schema.require(&[
        params.age_field.as_str(),
        params.mother_field.as_str(),
        params.father_field.as_str(),
    ])?;
    if !(0.0..=1.0).contains(&params.fraction) {
        return Err(GenepopError::InvalidParameter {
            operation: "relateds sampling",
            reason: format!("fraction of relateds {} outside 0..=1", params.fraction),
        });
    }

    let mut view = IndividualSubsample::new();
    for &population in populations {
        let family = families(source, schema, params, population)?;
        if family.eligible.len() < params.min_size {
            return Err(GenepopError::BelowMinimum {
                operation: "relateds sampling",
                size: family.eligible.len(),
                minimum: params.min_size,
            });
        }
        let target = family.eligible.len().min(params.max_size);
        let relateds = sibling_pairs(population, &family.groups, target as f64 * params.fraction)?;
        if relateds.len() > target {
            return Err(GenepopError::InvalidParameter {
                operation: "relateds sampling",
                reason: format!(
                    "population {}: {} relateds collected exceeds the sample size {}",
                    population,
                    relateds.len(),
                    target
                ),
            });
        }

        let unrelated: Vec<usize> = family
            .eligible
            .iter()
            .copied()
            .filter(|i| !relateds.contains(i))
            .collect();
        let padding = sample_from(&unrelated, target - relateds.len(), rng);
        debug!(
            "{}: population {} takes {} relateds and {} unrelated",
            tag,
            population,
            relateds.len(),
            padding.len()
        );
        view.insert(population, relateds.into_iter().chain(padding));
    }
    registry.insert_individuals(tag, view);
    Ok(())
}
