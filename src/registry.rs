//! Named views over a [`GenepopSource`].
//!
//! A view never copies records. Population and locus views are sorted
//! lists of 1-based numbers; an individual view maps population numbers
//! to sorted individual numbers that always start with the sentinel 0
//! (the `pop` line).
use crate::error::{GenepopError, Result, SubsampleKind};
use crate::source::GenepopSource;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

const SENTINEL: [usize; 1] = [0];

fn sorted_unique<I: IntoIterator<Item = usize>>(numbers: I) -> Vec<usize> {
    numbers.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopulationSubsample {
    numbers: Vec<usize>,
}

impl PopulationSubsample {
    pub fn new<I: IntoIterator<Item = usize>>(numbers: I) -> Self {
        Self {
            numbers: sorted_unique(numbers),
        }
    }

    pub fn numbers(&self) -> &[usize] {
        &self.numbers
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndividualSubsample {
    populations: BTreeMap<usize, Vec<usize>>,
}

impl IndividualSubsample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the selection for `population`, replacing any earlier one.
    ///
    /// Numbers are sorted and deduplicated; the sentinel is added if absent.
    pub fn insert<I: IntoIterator<Item = usize>>(&mut self, population: usize, individuals: I) -> &mut Self {
        let numbers = sorted_unique(std::iter::once(0).chain(individuals));
        self.populations.insert(population, numbers);
        self
    }

    /// Stored numbers for `population`, sentinel included.
    ///
    /// A population with no entry reads as the sentinel alone.
    pub fn numbers(&self, population: usize) -> &[usize] {
        self.populations
            .get(&population)
            .map(|v| v.as_slice())
            .unwrap_or(&SENTINEL)
    }

    /// Selected individuals of `population`, sentinel excluded.
    pub fn selected(&self, population: usize) -> &[usize] {
        &self.numbers(population)[1..]
    }

    pub fn populations(&self) -> impl Iterator<Item = usize> + '_ {
        self.populations.keys().copied()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocusSubsample {
    positions: Vec<usize>,
}

impl LocusSubsample {
    pub fn new<I: IntoIterator<Item = usize>>(positions: I) -> Self {
        Self {
            positions: sorted_unique(positions),
        }
    }

    /// 1-based locus positions, ascending.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }
}

/// The (population, individual, locus) tags a read applies. `None` means all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    population: Option<String>,
    individual: Option<String>,
    locus: Option<String>,
}

impl Selection {
    /// Construct a selection of everything in the file
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populations(&mut self, tag: &str) -> &mut Self {
        self.population = Some(tag.to_owned());
        self
    }

    pub fn individuals(&mut self, tag: &str) -> &mut Self {
        self.individual = Some(tag.to_owned());
        self
    }

    pub fn loci(&mut self, tag: &str) -> &mut Self {
        self.locus = Some(tag.to_owned());
        self
    }

    pub fn population_tag(&self) -> Option<&str> {
        self.population.as_deref()
    }

    pub fn individual_tag(&self) -> Option<&str> {
        self.individual.as_deref()
    }

    pub fn locus_tag(&self) -> Option<&str> {
        self.locus.as_deref()
    }
}

/// A [`Selection`] checked against the source and expanded to numbers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedView {
    /// `(population, selected individuals)` in ascending population order.
    pub populations: Vec<(usize, Vec<usize>)>,
    /// 1-based locus positions, ascending.
    pub loci: Vec<usize>,
    /// True when no locus subsample applies.
    pub all_loci: bool,
}

/// Tag-keyed storage for every view built over one source.
#[derive(Clone, Debug, Default)]
pub struct SubsampleRegistry {
    populations: BTreeMap<String, PopulationSubsample>,
    individuals: BTreeMap<String, IndividualSubsample>,
    loci: BTreeMap<String, LocusSubsample>,
}

fn unknown(kind: SubsampleKind, tag: &str) -> GenepopError {
    GenepopError::UnknownSubsample {
        kind,
        tag: tag.to_owned(),
    }
}

impl SubsampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_populations(&mut self, tag: &str, subsample: PopulationSubsample) {
        debug!("population subsample {}: {:?}", tag, subsample.numbers());
        self.populations.insert(tag.to_owned(), subsample);
    }

    pub fn insert_individuals(&mut self, tag: &str, subsample: IndividualSubsample) {
        debug!(
            "individual subsample {}: {} populations",
            tag,
            subsample.populations.len()
        );
        self.individuals.insert(tag.to_owned(), subsample);
    }

    pub fn insert_loci(&mut self, tag: &str, subsample: LocusSubsample) {
        debug!("locus subsample {}: {:?}", tag, subsample.positions());
        self.loci.insert(tag.to_owned(), subsample);
    }

    pub fn populations(&self, tag: &str) -> Result<&PopulationSubsample> {
        self.populations
            .get(tag)
            .ok_or_else(|| unknown(SubsampleKind::Population, tag))
    }

    pub fn individuals(&self, tag: &str) -> Result<&IndividualSubsample> {
        self.individuals
            .get(tag)
            .ok_or_else(|| unknown(SubsampleKind::Individual, tag))
    }

    pub fn loci(&self, tag: &str) -> Result<&LocusSubsample> {
        self.loci.get(tag).ok_or_else(|| unknown(SubsampleKind::Locus, tag))
    }

    pub fn population_tags(&self) -> impl Iterator<Item = &str> {
        self.populations.keys().map(|k| k.as_str())
    }

    pub fn individual_tags(&self) -> impl Iterator<Item = &str> {
        self.individuals.keys().map(|k| k.as_str())
    }

    pub fn locus_tags(&self) -> impl Iterator<Item = &str> {
        self.loci.keys().map(|k| k.as_str())
    }

    /// Stores under `new_tag` the per-population union of the views in `tags`.
    pub fn combine_individuals(&mut self, source: &GenepopSource, tags: &[&str], new_tag: &str) -> Result<()> {
        let views = tags
            .iter()
            .map(|tag| self.individuals(tag))
            .collect::<Result<Vec<_>>>()?;
        let mut combined = IndividualSubsample::new();
        for population in 1..=source.population_count() {
            let union: Vec<usize> = views
                .iter()
                .flat_map(|v| v.selected(population).iter().copied())
                .collect();
            combined.insert(population, union);
        }
        self.insert_individuals(new_tag, combined);
        Ok(())
    }

    /// Removes each tag in `tags`. The first unknown tag is an error and
    /// stops the removal.
    pub fn remove_individuals(&mut self, tags: &[&str]) -> Result<()> {
        for tag in tags {
            self.individuals
                .remove(*tag)
                .ok_or_else(|| unknown(SubsampleKind::Individual, tag))?;
        }
        Ok(())
    }

    pub fn remove_populations(&mut self, tags: &[&str]) -> Result<()> {
        for tag in tags {
            self.populations
                .remove(*tag)
                .ok_or_else(|| unknown(SubsampleKind::Population, tag))?;
        }
        Ok(())
    }

    pub fn remove_loci(&mut self, tags: &[&str]) -> Result<()> {
        for tag in tags {
            self.loci
                .remove(*tag)
                .ok_or_else(|| unknown(SubsampleKind::Locus, tag))?;
        }
        Ok(())
    }

    /// Drops every view, e.g. after [`GenepopSource::repoint`].
    pub fn clear(&mut self) {
        self.populations.clear();
        self.individuals.clear();
        self.loci.clear();
    }

    /// Population numbers selected by `selection`, validated against `source`.
    pub fn population_numbers(&self, source: &GenepopSource, selection: &Selection) -> Result<Vec<usize>> {
        let total = source.population_count();
        match selection.population_tag() {
            None => Ok((1..=total).collect()),
            Some(tag) => {
                let numbers = self.populations(tag)?.numbers();
                match numbers.iter().find(|&&p| p < 1 || p > total) {
                    Some(&population) => Err(GenepopError::PopulationOutOfRange {
                        operation: "population subsample",
                        population,
                        total,
                    }),
                    None => Ok(numbers.to_vec()),
                }
            }
        }
    }

    /// Individuals of `population` selected by `selection`, sentinel excluded.
    pub fn individual_numbers(
        &self,
        source: &GenepopSource,
        population: usize,
        selection: &Selection,
    ) -> Result<Vec<usize>> {
        let total = source.individual_count(population)?;
        match selection.individual_tag() {
            None => Ok((1..=total).collect()),
            Some(tag) => {
                let selected = self.individuals(tag)?.selected(population);
                match selected.iter().find(|&&i| i > total) {
                    Some(&individual) => Err(GenepopError::IndividualOutOfRange {
                        operation: "individual subsample",
                        population,
                        individual,
                        total,
                    }),
                    None => Ok(selected.to_vec()),
                }
            }
        }
    }

    /// Locus positions selected by `selection`, validated against `source`.
    pub fn locus_positions(&self, source: &GenepopSource, selection: &Selection) -> Result<Vec<usize>> {
        let total = source.locus_count();
        match selection.locus_tag() {
            None => Ok((1..=total).collect()),
            Some(tag) => {
                let positions = self.loci(tag)?.positions();
                match positions.iter().find(|&&l| l < 1 || l > total) {
                    Some(&locus) => Err(GenepopError::LocusOutOfRange {
                        operation: "locus subsample",
                        locus,
                        total,
                    }),
                    None => Ok(positions.to_vec()),
                }
            }
        }
    }

    /// Selected individual count of every selected population.
    pub fn individual_counts(&self, source: &GenepopSource, selection: &Selection) -> Result<Vec<(usize, usize)>> {
        self.population_numbers(source, selection)?
            .into_iter()
            .map(|p| Ok((p, self.individual_numbers(source, p, selection)?.len())))
            .collect()
    }

    /// Selected populations with no selected individuals.
    pub fn empty_populations(&self, source: &GenepopSource, selection: &Selection) -> Result<Vec<usize>> {
        Ok(self
            .individual_counts(source, selection)?
            .into_iter()
            .filter(|(_, count)| *count == 0)
            .map(|(p, _)| p)
            .collect())
    }

    /// Checks every tag in `selection` and expands it to numbers.
    ///
    /// Nothing is read from the file beyond the index, so callers can
    /// resolve before creating any output.
    pub fn resolve(&self, source: &GenepopSource, selection: &Selection) -> Result<ResolvedView> {
        let loci = self.locus_positions(source, selection)?;
        let populations = self
            .population_numbers(source, selection)?
            .into_iter()
            .map(|p| Ok((p, self.individual_numbers(source, p, selection)?)))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "resolved {:?}: {} populations, {} loci",
            selection,
            populations.len(),
            loci.len()
        );
        Ok(ResolvedView {
            populations,
            loci,
            all_loci: selection.locus_tag().is_none(),
        })
    }
}
