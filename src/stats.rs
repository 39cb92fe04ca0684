//! Allele counts, frequencies and expected heterozygosity over a selection.
//!
//! Results are nested maps keyed `population -> locus -> ...`, with loci
//! numbered by their 1-based position in the file. Nothing is cached: every
//! call reads the selected records again.
use crate::error::{GenepopError, Result};
use crate::registry::{ResolvedView, Selection, SubsampleRegistry};
use crate::source::GenepopSource;
use log::{debug, warn};
use ndarray::{s, Array2, Zip};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

pub type Allele = u32;
pub type AlleleCount = u32;
pub type AlleleCounts = BTreeMap<usize, BTreeMap<usize, BTreeMap<Allele, AlleleCount>>>;
pub type AlleleFrequencies = BTreeMap<usize, BTreeMap<usize, BTreeMap<Allele, f64>>>;
pub type Heterozygosity = BTreeMap<usize, BTreeMap<usize, f64>>;

/// The allele code meaning "not typed".
pub const MISSING: Allele = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsOptions {
    skip_partial_missing: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsOptions {
    /// Skips any genotype with a missing allele
    pub fn new() -> Self {
        Self {
            skip_partial_missing: true,
        }
    }

    /// When false, a genotype with one missing allele still counts its
    /// other allele. Genotypes with both alleles missing are always skipped.
    pub fn skip_partial_missing(&mut self, skip: bool) -> &mut Self {
        self.skip_partial_missing = skip;
        self
    }
}

/// Splits a diploid code such as `0102` or `101103` into its two alleles.
pub fn parse_genotype(code: &str, population: usize, individual: usize, locus: usize) -> Result<(Allele, Allele)> {
    let invalid = |reason: &'static str| GenepopError::InvalidGenotype {
        population,
        individual,
        locus,
        code: code.to_owned(),
        reason,
    };
    if code.is_empty() {
        return Err(invalid("is empty"));
    }
    if code.len() % 2 != 0 {
        return Err(invalid("has an odd number of digits"));
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("contains a non-digit"));
    }
    let (first, second) = code.split_at(code.len() / 2);
    let parse = |allele: &str| allele.parse::<Allele>().map_err(|_| invalid("has an allele too large to read"));
    Ok((parse(first)?, parse(second)?))
}

/// Allele counts of every selected population in one matrix.
///
/// Rows are populations; columns are alleles grouped into one contiguous
/// span per locus.
pub struct AlleleMatrix {
    data: Array2<AlleleCount>,
    populations: Vec<usize>,
    loci: Vec<(usize, usize)>,
    positions: Vec<usize>,
    alleles: Vec<Allele>,
}

impl AlleleMatrix {
    pub fn from_counts(counts: &AlleleCounts) -> Self {
        let populations: Vec<usize> = counts.keys().copied().collect();
        let mut observed: BTreeMap<usize, BTreeSet<Allele>> = BTreeMap::new();
        for by_locus in counts.values() {
            for (&locus, by_allele) in by_locus {
                observed.entry(locus).or_default().extend(by_allele.keys().copied());
            }
        }

        let mut loci = vec![];
        let mut positions = vec![];
        let mut alleles = vec![];
        for (locus, set) in &observed {
            let start = alleles.len();
            alleles.extend(set.iter().copied());
            loci.push((start, alleles.len()));
            positions.push(*locus);
        }

        let mut data = Array2::<AlleleCount>::zeros((populations.len(), alleles.len()));
        for (row, by_locus) in counts.values().enumerate() {
            for (span, locus) in positions.iter().enumerate() {
                let (start, end) = loci[span];
                if let Some(by_allele) = by_locus.get(locus) {
                    for col in start..end {
                        data[[row, col]] = by_allele.get(&alleles[col]).copied().unwrap_or(0);
                    }
                }
            }
        }

        Self {
            data,
            populations,
            loci,
            positions,
            alleles,
        }
    }

    pub fn counts(&self) -> &Array2<AlleleCount> {
        &self.data
    }

    /// Typed allele total per population (rows) and locus (columns).
    pub fn totals(&self) -> Array2<AlleleCount> {
        let mut totals = Array2::<AlleleCount>::zeros((self.data.nrows(), self.loci.len()));
        Zip::from(totals.rows_mut())
            .and(self.data.rows())
            .for_each(|mut totals, row| {
                for (idx, &(start, end)) in self.loci.iter().enumerate() {
                    totals[idx] = row.slice(s![start..end]).sum();
                }
            });
        totals
    }

    /// Computes the frequency matrix from allele counts
    ///
    /// A locus with no typed alleles in a population keeps zero frequencies.
    pub fn frequency(&self) -> Array2<f64> {
        let mut freqs = Array2::<f64>::zeros(self.data.dim());
        Zip::from(freqs.rows_mut())
            .and(self.data.rows())
            .for_each(|mut freqs, row| {
                for &(start, end) in &self.loci {
                    let total = row.slice(s![start..end]).sum();
                    if total > 0 {
                        let span = row.slice(s![start..end]).mapv(|x| f64::from(x) / f64::from(total));
                        freqs.slice_mut(s![start..end]).assign(&span);
                    }
                }
            });
        freqs
    }

    /// `1 - sum(f^2)` per population and locus; zero where nothing was typed.
    pub fn heterozygosity(&self) -> Array2<f64> {
        let freqs = self.frequency();
        let totals = self.totals();
        let mut he = Array2::<f64>::zeros(totals.dim());
        for ((row, idx), value) in he.indexed_iter_mut() {
            if totals[[row, idx]] > 0 {
                let (start, end) = self.loci[idx];
                *value = 1.0 - freqs.slice(s![row, start..end]).mapv(|f| f * f).sum();
            }
        }
        he
    }

    fn frequencies(&self) -> AlleleFrequencies {
        let freqs = self.frequency();
        let totals = self.totals();
        let mut out = AlleleFrequencies::new();
        for (row, population) in self.populations.iter().enumerate() {
            let by_locus = out.entry(*population).or_default();
            for (idx, &(start, end)) in self.loci.iter().enumerate() {
                if totals[[row, idx]] == 0 {
                    continue;
                }
                let by_allele = by_locus.entry(self.positions[idx]).or_default();
                for col in start..end {
                    if self.data[[row, col]] > 0 {
                        by_allele.insert(self.alleles[col], freqs[[row, col]]);
                    }
                }
            }
        }
        out
    }

    fn expected_heterozygosity(&self) -> Heterozygosity {
        let he = self.heterozygosity();
        let totals = self.totals();
        let mut out = Heterozygosity::new();
        for (row, population) in self.populations.iter().enumerate() {
            let by_locus = out.entry(*population).or_default();
            for (idx, locus) in self.positions.iter().enumerate() {
                if totals[[row, idx]] > 0 {
                    by_locus.insert(*locus, he[[row, idx]]);
                }
            }
        }
        out
    }
}

fn count_view(source: &GenepopSource, view: &ResolvedView, options: &StatsOptions) -> Result<AlleleCounts> {
    let mut counts = AlleleCounts::new();
    for (population, individuals) in &view.populations {
        let by_locus = counts.entry(*population).or_default();
        for locus in &view.loci {
            by_locus.entry(*locus).or_default();
        }
        for &individual in individuals {
            let (_, codes) = source.genotypes(*population, individual)?;
            if codes.len() != source.locus_count() {
                return Err(GenepopError::LocusCountMismatch {
                    population: *population,
                    individual,
                    expected: source.locus_count(),
                    found: codes.len(),
                });
            }
            for &locus in &view.loci {
                let (a, b) = parse_genotype(&codes[locus - 1], *population, individual, locus)?;
                let typed = match (a == MISSING, b == MISSING) {
                    (true, true) => vec![],
                    (true, false) | (false, true) if options.skip_partial_missing => vec![],
                    (true, false) => vec![b],
                    (false, true) => vec![a],
                    (false, false) => vec![a, b],
                };
                let by_allele = by_locus.entry(locus).or_default();
                for allele in typed {
                    *by_allele.entry(allele).or_insert(0) += 1;
                }
            }
        }
        for (locus, by_allele) in by_locus.iter() {
            if by_allele.is_empty() {
                warn!("population {}, locus {}: no typed alleles, skipped", population, locus);
            }
        }
    }
    Ok(counts)
}

/// Allele statistics over a (population, individual, locus) selection.
pub trait AlleleStatistics {
    /// Counts per population, locus and allele. Loci with nothing typed
    /// stay in the table as empty maps.
    fn allele_counts(
        &self,
        registry: &SubsampleRegistry,
        selection: &Selection,
        options: &StatsOptions,
    ) -> Result<AlleleCounts>;

    /// Frequencies per population, locus and allele. Loci with nothing
    /// typed are left out.
    fn allele_frequencies(
        &self,
        registry: &SubsampleRegistry,
        selection: &Selection,
        options: &StatsOptions,
    ) -> Result<AlleleFrequencies>;

    /// Expected heterozygosity `1 - sum(f^2)` per population and locus.
    fn expected_heterozygosity(
        &self,
        registry: &SubsampleRegistry,
        selection: &Selection,
        options: &StatsOptions,
    ) -> Result<Heterozygosity>;
}

impl AlleleStatistics for GenepopSource {
    fn allele_counts(
        &self,
        registry: &SubsampleRegistry,
        selection: &Selection,
        options: &StatsOptions,
    ) -> Result<AlleleCounts> {
        let view = registry.resolve(self, selection)?;
        let counts = count_view(self, &view, options)?;
        debug!("counted alleles at {} loci in {} populations", view.loci.len(), counts.len());
        Ok(counts)
    }

    fn allele_frequencies(
        &self,
        registry: &SubsampleRegistry,
        selection: &Selection,
        options: &StatsOptions,
    ) -> Result<AlleleFrequencies> {
        let counts = self.allele_counts(registry, selection, options)?;
        Ok(AlleleMatrix::from_counts(&counts).frequencies())
    }

    fn expected_heterozygosity(
        &self,
        registry: &SubsampleRegistry,
        selection: &Selection,
        options: &StatsOptions,
    ) -> Result<Heterozygosity> {
        let counts = self.allele_counts(registry, selection, options)?;
        Ok(AlleleMatrix::from_counts(&counts).expected_heterozygosity())
    }
}

/// Writes `population,locus,heterozygosity` rows.
pub fn write_heterozygosity_csv<W: Write>(heterozygosity: &Heterozygosity, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&["population", "locus", "heterozygosity"])?;
    for (population, by_locus) in heterozygosity {
        for (locus, he) in by_locus {
            writer.write_record(&[population.to_string(), locus.to_string(), he.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes `population,locus,allele,frequency` rows.
pub fn write_frequencies_csv<W: Write>(frequencies: &AlleleFrequencies, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&["population", "locus", "allele", "frequency"])?;
    for (population, by_locus) in frequencies {
        for (locus, by_allele) in by_locus {
            for (allele, frequency) in by_allele {
                writer.write_record(&[
                    population.to_string(),
                    locus.to_string(),
                    allele.to_string(),
                    frequency.to_string(),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
