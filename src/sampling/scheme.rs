//! Subsample tag naming and sweeps over sampling parameters.
//!
//! A tag reads `[prefix_]<initial>_<value>_<replicate>`, e.g. `run1_p_0.5_2`
//! for the third replicate of a 50% proportion sample. Downstream tools
//! recover the value and replicate from the tag alone.
use crate::criteria::Criteria;
use crate::error::{GenepopError, Result};
use crate::identifier::IdSchema;
use crate::registry::SubsampleRegistry;
use crate::sampling::cohorts::{by_cohorts, CohortParams, CohortValue};
use crate::sampling::individuals::{self, SizeBounds};
use crate::sampling::loci::{self, LocusWindow};
use crate::sampling::populations;
use crate::sampling::relateds::{by_relateds, RelatedsParams};
use crate::source::GenepopSource;
use log::info;
use rand::Rng;

const TAG_DELIMITER: char = '_';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    None,
    Proportion,
    Removal,
    Criteria,
    CriteriaGrouped,
    Cohorts,
    Relateds,
    LociMax,
    LociProportion,
    LociTotals,
}

impl Scheme {
    pub fn initial(self) -> &'static str {
        match self {
            Self::None => "o",
            Self::Proportion => "p",
            Self::Removal => "n",
            Self::Criteria => "c",
            Self::CriteriaGrouped => "g",
            Self::Cohorts => "h",
            Self::Relateds => "r",
            Self::LociMax => "l",
            Self::LociProportion => "i",
            Self::LociTotals => "s",
        }
    }
}

pub fn subsample_tag(scheme: Scheme, value: &str, replicate: usize, prefix: Option<&str>) -> String {
    let body = format!(
        "{}{d}{}{d}{}",
        scheme.initial(),
        value,
        replicate,
        d = TAG_DELIMITER
    );
    match prefix {
        Some(prefix) => format!("{}{}{}", prefix, TAG_DELIMITER, body),
        None => body,
    }
}

/// Formats a fractional parameter for a tag, keeping one decimal place on
/// whole numbers so `1.0` reads `1.0` rather than `1`.
pub fn tag_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Splits a tag made by [`subsample_tag`] back into its value and replicate.
pub fn parse_subsample_tag(tag: &str, scheme: Scheme, prefix: Option<&str>) -> Result<(String, usize)> {
    let malformed = |why: &str| GenepopError::InvalidParameter {
        operation: "subsample tag",
        reason: format!("\"{}\" {}", tag, why),
    };
    let rest = match prefix {
        Some(prefix) => tag
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix(TAG_DELIMITER))
            .ok_or_else(|| malformed("lacks the expected prefix"))?,
        None => tag,
    };
    let rest = rest
        .strip_prefix(scheme.initial())
        .and_then(|r| r.strip_prefix(TAG_DELIMITER))
        .ok_or_else(|| malformed("does not name the expected scheme"))?;
    let (value, replicate) = rest
        .rsplit_once(TAG_DELIMITER)
        .ok_or_else(|| malformed("has no replicate number"))?;
    let replicate = replicate
        .parse()
        .map_err(|_| malformed("has a non-numeric replicate"))?;
    Ok((value.to_owned(), replicate))
}

/// What a [`SamplePlan`] sweeps over.
#[derive(Clone, Debug)]
pub enum SamplingScheme {
    /// Whole populations within size bounds.
    None { min_size: usize, max_size: usize },
    Proportion(Vec<f64>),
    /// Remove each count in turn. With `leave_one_out`, a count of 1 makes
    /// one view per individual position instead of random replicates.
    Removal { counts: Vec<usize>, leave_one_out: bool },
    Criteria {
        schema: IdSchema,
        criteria: Criteria,
        bounds: SizeBounds,
    },
    CriteriaGrouped {
        schema: IdSchema,
        criteria: Criteria,
        fields: Vec<String>,
        bounds: SizeBounds,
    },
    CriteriaFactored {
        schema: IdSchema,
        criteria: Criteria,
        max: Option<usize>,
    },
    /// One sweep per value; an empty list samples by smallest cohort only.
    Cohorts {
        schema: IdSchema,
        params: CohortParams,
        values: Vec<CohortValue>,
    },
    Relateds { schema: IdSchema, params: RelatedsParams },
    LociMax {
        window: LocusWindow,
        min_total: Option<usize>,
        max_total: Option<usize>,
    },
    LociProportion {
        window: LocusWindow,
        proportions: Vec<f64>,
        min_total: Option<usize>,
    },
    LociTotals { window: LocusWindow, totals: Vec<usize> },
}

/// A sampling scheme applied to a population list with replicates.
#[derive(Clone, Debug)]
pub struct SamplePlan {
    populations: Vec<usize>,
    population_tag: String,
    tag_prefix: Option<String>,
    replicates: usize,
    scheme: SamplingScheme,
}

impl SamplePlan {
    /// A single-replicate plan registering `populations` as `population_numbers`.
    pub fn new(populations: &[usize], scheme: SamplingScheme) -> Self {
        Self {
            populations: populations.to_vec(),
            population_tag: "population_numbers".to_owned(),
            tag_prefix: None,
            replicates: 1,
            scheme,
        }
    }

    pub fn population_tag(&mut self, tag: &str) -> &mut Self {
        self.population_tag = tag.to_owned();
        self
    }

    pub fn tag_prefix(&mut self, prefix: &str) -> &mut Self {
        self.tag_prefix = Some(prefix.to_owned());
        self
    }

    pub fn replicates(&mut self, replicates: usize) -> &mut Self {
        self.replicates = replicates;
        self
    }

    /// Tag under which [`run`](Self::run) registers the population list.
    pub fn population_subsample_tag(&self) -> &str {
        &self.population_tag
    }

    fn tag(&self, scheme: Scheme, value: &str, replicate: usize) -> String {
        subsample_tag(scheme, value, replicate, self.tag_prefix.as_deref())
    }

    /// Registers the population list, then one view per parameter value and
    /// replicate. Returns the tags of the created individual or locus views.
    pub fn run<R: Rng + ?Sized>(
        &self,
        source: &GenepopSource,
        registry: &mut SubsampleRegistry,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        populations::by_list(source, registry, &self.populations, &self.population_tag)?;
        let mut tags = vec![];
        let replicates = 0..self.replicates;

        match &self.scheme {
            SamplingScheme::None { min_size, max_size } => {
                for replicate in replicates {
                    let tag = self.tag(Scheme::None, "n", replicate);
                    individuals::by_population_size(source, registry, *min_size, *max_size, &tag, rng)?;
                    tags.push(tag);
                }
            }
            SamplingScheme::Proportion(proportions) => {
                for proportion in proportions {
                    for replicate in replicates.clone() {
                        let tag = self.tag(Scheme::Proportion, &tag_number(*proportion), replicate);
                        individuals::by_proportion(source, registry, *proportion, &tag, rng)?;
                        tags.push(tag);
                    }
                }
            }
            SamplingScheme::Removal { counts, leave_one_out } => {
                for &n in counts {
                    if n == 1 && *leave_one_out {
                        let largest = source.individual_counts().into_iter().max().unwrap_or(0);
                        for individual in 1..=largest {
                            let tag = self.tag(Scheme::Removal, "1", individual - 1);
                            individuals::leave_nth_out(source, registry, individual, &tag)?;
                            tags.push(tag);
                        }
                    } else {
                        for replicate in replicates.clone() {
                            let tag = self.tag(Scheme::Removal, &n.to_string(), replicate);
                            individuals::remove_n(source, registry, n, &tag, rng)?;
                            tags.push(tag);
                        }
                    }
                }
            }
            SamplingScheme::Criteria {
                schema,
                criteria,
                bounds,
            } => {
                let value = format!("c{}", criteria.len());
                for replicate in replicates {
                    let tag = self.tag(Scheme::Criteria, &value, replicate);
                    individuals::by_criteria(source, registry, schema, criteria, *bounds, &tag, rng)?;
                    tags.push(tag);
                }
            }
            SamplingScheme::CriteriaGrouped {
                schema,
                criteria,
                fields,
                bounds,
            } => {
                let fields: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
                tags.extend(individuals::by_criteria_grouped(
                    source,
                    registry,
                    schema,
                    criteria,
                    &fields,
                    *bounds,
                    self.tag_prefix.as_deref(),
                    rng,
                )?);
            }
            SamplingScheme::CriteriaFactored { schema, criteria, max } => {
                let value = format!("c{}", criteria.len());
                for replicate in replicates {
                    let tag = self.tag(Scheme::Criteria, &value, replicate);
                    individuals::by_criteria_factored(source, registry, schema, criteria, *max, &tag, rng)?;
                    tags.push(tag);
                }
            }
            SamplingScheme::Cohorts { schema, params, values } => {
                let values: Vec<Option<CohortValue>> = if values.is_empty() {
                    vec![None]
                } else {
                    values.iter().copied().map(Some).collect()
                };
                for value in values {
                    let tag_value = value.map_or_else(|| "n".to_owned(), |v| v.tag_value());
                    for replicate in replicates.clone() {
                        let tag = self.tag(Scheme::Cohorts, &tag_value, replicate);
                        by_cohorts(source, registry, schema, params, value, &self.populations, &tag, rng)?;
                        tags.push(tag);
                    }
                }
            }
            SamplingScheme::Relateds { schema, params } => {
                for replicate in replicates {
                    let tag = self.tag(Scheme::Relateds, &tag_number(params.fraction()), replicate);
                    by_relateds(source, registry, schema, params, &self.populations, &tag, rng)?;
                    tags.push(tag);
                }
            }
            SamplingScheme::LociMax {
                window,
                min_total,
                max_total,
            } => {
                for replicate in replicates {
                    let tag = self.tag(Scheme::LociMax, "rt", replicate);
                    loci::by_range_and_max(source, registry, *window, *min_total, *max_total, &tag, rng)?;
                    tags.push(tag);
                }
            }
            SamplingScheme::LociProportion {
                window,
                proportions,
                min_total,
            } => {
                for proportion in proportions {
                    for replicate in replicates.clone() {
                        let tag = self.tag(Scheme::LociProportion, &tag_number(*proportion), replicate);
                        loci::by_range_and_proportion(source, registry, *window, *proportion, *min_total, &tag, rng)?;
                        tags.push(tag);
                    }
                }
            }
            SamplingScheme::LociTotals { window, totals } => {
                for &total in totals {
                    for replicate in replicates.clone() {
                        tags.extend(loci::by_range_and_totals(
                            source,
                            registry,
                            *window,
                            &[total],
                            replicate,
                            self.tag_prefix.as_deref(),
                            rng,
                        )?);
                    }
                }
            }
        }

        info!(
            "sampled {} views over populations {:?}",
            tags.len(),
            self.populations
        );
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::{source_from, PER_LINE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::error::Error;

    #[test]
    fn test_tag_round_trip_with_prefix() -> std::result::Result<(), Box<dyn Error>> {
        let tag = subsample_tag(Scheme::Proportion, "0.5", 2, Some("run_1"));
        assert_eq!(tag, "run_1_p_0.5_2");
        assert_eq!(
            parse_subsample_tag(&tag, Scheme::Proportion, Some("run_1"))?,
            ("0.5".to_owned(), 2)
        );
        assert_eq!(
            parse_subsample_tag("g_combo_3_0", Scheme::CriteriaGrouped, None)?,
            ("combo_3".to_owned(), 0)
        );
        assert!(parse_subsample_tag("p_0.5_2", Scheme::Removal, None).is_err());
        assert!(parse_subsample_tag("p_0.5_x", Scheme::Proportion, None).is_err());
        Ok(())
    }

    #[test]
    fn test_whole_proportions_keep_a_decimal() -> std::result::Result<(), Box<dyn Error>> {
        assert_eq!(tag_number(1.0), "1.0");
        assert_eq!(tag_number(0.25), "0.25");
        assert_eq!(tag_number(2.0), "2.0");

        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(44);
        let tags = SamplePlan::new(&[1], SamplingScheme::Proportion(vec![1.0, 0.5]))
            .run(&source, &mut registry, &mut rng)?;
        assert_eq!(tags, vec!["p_1.0_0", "p_0.5_0"]);
        assert_eq!(parse_subsample_tag(&tags[0], Scheme::Proportion, None)?, ("1.0".to_owned(), 0));
        assert_eq!(registry.individuals("p_1.0_0")?.selected(1).len(), 4);
        Ok(())
    }

    #[test]
    fn test_proportion_sweep_registers_populations() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(41);

        let tags = SamplePlan::new(&[2], SamplingScheme::Proportion(vec![0.25, 0.5]))
            .replicates(2)
            .tag_prefix("t")
            .run(&source, &mut registry, &mut rng)?;
        assert_eq!(tags, vec!["t_p_0.25_0", "t_p_0.25_1", "t_p_0.5_0", "t_p_0.5_1"]);
        assert_eq!(registry.populations("population_numbers")?.numbers(), &[2]);
        assert_eq!(registry.individuals("t_p_0.5_1")?.selected(2).len(), 2);
        assert_eq!(registry.individuals("t_p_0.25_0")?.selected(1).len(), 1);
        Ok(())
    }

    #[test]
    fn test_leave_one_out_series() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(42);

        let scheme = SamplingScheme::Removal {
            counts: vec![1, 2],
            leave_one_out: true,
        };
        let tags = SamplePlan::new(&[1, 2], scheme).run(&source, &mut registry, &mut rng)?;
        assert_eq!(tags, vec!["n_1_0", "n_1_1", "n_1_2", "n_1_3", "n_2_0"]);
        assert_eq!(registry.individuals("n_1_2")?.selected(1), &[1, 2, 4]);
        assert_eq!(registry.individuals("n_2_0")?.selected(2).len(), 2);
        Ok(())
    }

    #[test]
    fn test_loci_totals_sweep() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(43);

        let scheme = SamplingScheme::LociTotals {
            window: LocusWindow::new(1, 3),
            totals: vec![1, 2],
        };
        let tags = SamplePlan::new(&[1], scheme)
            .replicates(2)
            .run(&source, &mut registry, &mut rng)?;
        assert_eq!(tags, vec!["s_1_0", "s_1_1", "s_2_0", "s_2_1"]);
        assert_eq!(registry.loci("s_2_1")?.positions().len(), 2);
        Ok(())
    }

    #[test]
    fn test_bad_population_list_stops_the_plan() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(44);
        let plan = SamplePlan::new(&[3], SamplingScheme::Proportion(vec![0.5]));
        assert!(plan.run(&source, &mut registry, &mut rng).is_err());
        assert_eq!(registry.individual_tags().count(), 0);
        Ok(())
    }
}
