//! Equal-size sampling across age classes.
use crate::error::{GenepopError, Result};
use crate::identifier::IdSchema;
use crate::registry::{IndividualSubsample, SubsampleRegistry};
use crate::sampling::scheme::tag_number;
use crate::sampling::{proportion_of, sample_from};
use crate::source::GenepopSource;
use log::{debug, warn};
use rand::Rng;
use std::collections::BTreeMap;

/// A further reduction of the per-cohort sample size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CohortValue {
    /// `round(smallest cohort * p)`.
    Proportion(f64),
    /// Exactly this many per cohort; an error if the smallest cohort is smaller.
    Count(usize),
    /// This many per cohort, or the smallest cohort's size if that is less.
    CountOrAvailable(usize),
}

impl CohortValue {
    /// The number sampled per cohort when the smallest in-range cohort has
    /// `smallest` individuals.
    pub fn per_cohort(&self, smallest: usize) -> Result<usize> {
        match *self {
            Self::Proportion(p) => Ok(proportion_of(smallest, p)),
            Self::Count(n) if n > smallest => Err(GenepopError::InvalidParameter {
                operation: "cohort sampling",
                reason: format!(
                    "count of {} per age class exceeds the smallest age class, {}",
                    n, smallest
                ),
            }),
            Self::Count(n) => Ok(n),
            Self::CountOrAvailable(n) => {
                if n > smallest {
                    warn!(
                        "cohort count {} exceeds smallest age class {}; sampling {}",
                        n, smallest, smallest
                    );
                }
                Ok(n.min(smallest))
            }
        }
    }

    /// The value as it appears in a subsample tag.
    pub fn tag_value(&self) -> String {
        match self {
            Self::Proportion(p) => tag_number(*p),
            Self::Count(n) | Self::CountOrAvailable(n) => n.to_string(),
        }
    }
}

/// Which identifier field holds the age, which ages count, and the bounds
/// on each population's pooled total.
#[derive(Clone, Debug, PartialEq)]
pub struct CohortParams {
    age_field: String,
    max_age: i64,
    min_size: usize,
    max_size: usize,
}

impl CohortParams {
    /// Cohorts aged at most `max_age`, read from the field `age`, with no
    /// bounds on the pooled total.
    pub fn new(max_age: i64) -> Self {
        Self {
            age_field: "age".to_owned(),
            max_age,
            min_size: 0,
            max_size: usize::MAX,
        }
    }

    pub fn age_field(&mut self, name: &str) -> &mut Self {
        self.age_field = name.to_owned();
        self
    }

    /// Pooled totals below `min` are an error; above `max` they are trimmed.
    pub fn pooled_size(&mut self, min: usize, max: usize) -> &mut Self {
        self.min_size = min;
        self.max_size = max;
        self
    }
}

/// Individual numbers of `population` keyed by integer age, ages above
/// `max_age` left out.
pub fn group_by_age(
    source: &GenepopSource,
    schema: &IdSchema,
    params: &CohortParams,
    population: usize,
) -> Result<BTreeMap<i64, Vec<usize>>> {
    let mut cohorts: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (individual, values) in schema.parse_population(source, population)? {
        let age = values
            .get(&params.age_field)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| GenepopError::IdentifierField {
                identifier: values.values().iter().map(|v| v.to_string()).collect::<Vec<_>>().join(";"),
                reason: format!("field \"{}\" is missing or not an integer age", params.age_field),
            })?;
        if age <= params.max_age {
            cohorts.entry(age).or_default().push(individual);
        }
    }
    Ok(cohorts)
}

/// Samples the same number of individuals from every in-range age class of
/// each population in `populations`, then checks the pooled total.
///
/// With no `value` the per-class number is the size of the smallest class.
#[allow(clippy::too_many_arguments)]
pub fn by_cohorts<R: Rng + ?Sized>(
    source: &GenepopSource,
    registry: &mut SubsampleRegistry,
    schema: &IdSchema,
    params: &CohortParams,
    value: Option<CohortValue>,
    populations: &[usize],
    tag: &str,
    rng: &mut R,
) -> Result<()> {
    schema.require(&[params.age_field.as_str()])?;
    if params.min_size > params.max_size {
        return Err(GenepopError::InvalidParameter {
            operation: "cohort sampling",
            reason: format!(
                "minimum pooled size {} exceeds maximum {}",
                params.min_size, params.max_size
            ),
        });
    }

    let mut view = IndividualSubsample::new();
    for &population in populations {
        let cohorts = group_by_age(source, schema, params, population)?;
        let smallest = cohorts.values().map(|c| c.len()).min().unwrap_or(0);
        let per_cohort = match value {
            Some(v) => v.per_cohort(smallest)?,
            None => smallest,
        };
        debug!(
            "{}: population {} has {} age classes, sampling {} from each",
            tag,
            population,
            cohorts.len(),
            per_cohort
        );

        let pooled: Vec<usize> = cohorts
            .values()
            .flat_map(|c| sample_from(c, per_cohort, rng))
            .collect();
        if pooled.len() < params.min_size {
            return Err(GenepopError::BelowMinimum {
                operation: "cohort sampling",
                size: pooled.len(),
                minimum: params.min_size,
            });
        }
        let pooled = if pooled.len() > params.max_size {
            sample_from(&pooled, params.max_size, rng)
        } else {
            pooled
        };
        view.insert(population, pooled);
    }
    registry.insert_individuals(tag, view);
    Ok(())
}
