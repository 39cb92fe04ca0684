use crate::error::{GenepopError, Result};
use crate::index::{Offset, PopulationEntries, RecordIndex, FIELD_SEPARATOR};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// How the locus names are declared above the first `pop` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocusLayout {
    /// One locus name per line.
    PerLine,
    /// A single line of comma-separated names.
    CommaJoined,
}

/// An indexed, read-only Genepop file.
///
/// Holds no open file handle: every read opens the file, seeks to the
/// indexed offsets and closes it again.
#[derive(Clone, Debug)]
pub struct GenepopSource {
    path: PathBuf,
    index: RecordIndex,
    layout: LocusLayout,
    locus_count: usize,
}

pub(crate) fn trim_terminator(line: &str) -> &str {
    line.trim_end_matches(|c| c == '\n' || c == '\r')
}

impl GenepopSource {
    /// Indexes the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = RecordIndex::build(&path)?;
        let mut source = Self {
            path,
            index,
            layout: LocusLayout::PerLine,
            locus_count: 0,
        };
        source.count_loci()?;
        info!(
            "opened {}: {} populations, {} loci",
            source.path.display(),
            source.population_count(),
            source.locus_count
        );
        Ok(source)
    }

    /// Rebuilds the index over a different file.
    ///
    /// Subsamples registered against the old file no longer apply and
    /// should be cleared by the caller.
    pub fn repoint<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        *self = Self::open(path)?;
        Ok(())
    }

    fn count_loci(&mut self) -> Result<()> {
        let declaration_lines = self.index.header().len().saturating_sub(1);
        if declaration_lines == 1 {
            let line = self.read_line(self.index.header()[1])?;
            self.layout = LocusLayout::CommaJoined;
            self.locus_count = line.trim().split(',').count();
        } else {
            self.layout = LocusLayout::PerLine;
            self.locus_count = declaration_lines;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &RecordIndex {
        &self.index
    }

    pub fn locus_layout(&self) -> LocusLayout {
        self.layout
    }

    pub fn population_count(&self) -> usize {
        self.index.population_count()
    }

    pub fn locus_count(&self) -> usize {
        self.locus_count
    }

    pub(crate) fn entries(&self, operation: &'static str, population: usize) -> Result<&PopulationEntries> {
        self.index
            .population(population)
            .ok_or_else(|| GenepopError::PopulationOutOfRange {
                operation,
                population,
                total: self.population_count(),
            })
    }

    /// Individuals in population `population`, excluding the `pop` line.
    pub fn individual_count(&self, population: usize) -> Result<usize> {
        Ok(self.entries("individual_count", population)?.count())
    }

    /// Individual counts of every population, in file order.
    pub fn individual_counts(&self) -> Vec<usize> {
        self.index.populations().map(|(_, p)| p.count()).collect()
    }

    fn read_line(&self, offset: Offset) -> Result<String> {
        Ok(self.read_lines(&[offset])?.remove(0))
    }

    /// Reads the line starting at each offset, terminators stripped.
    pub(crate) fn read_lines(&self, offsets: &[Offset]) -> Result<Vec<String>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut lines = Vec::with_capacity(offsets.len());
        for offset in offsets {
            reader.seek(SeekFrom::Start(*offset))?;
            let mut line = String::new();
            reader.read_line(&mut line)?;
            lines.push(trim_terminator(&line).to_owned());
        }
        Ok(lines)
    }

    /// The header line, terminator stripped.
    pub fn header(&self) -> Result<String> {
        match self.index.header().first() {
            Some(offset) => self.read_line(*offset),
            None => Ok(String::new()),
        }
    }

    /// The raw locus declaration lines, terminators stripped.
    pub fn locus_lines(&self) -> Result<Vec<String>> {
        self.read_lines(self.index.header().get(1..).unwrap_or(&[]))
    }

    pub fn locus_names(&self) -> Result<Vec<String>> {
        let lines = self.locus_lines()?;
        Ok(match self.layout {
            LocusLayout::CommaJoined => lines[0]
                .trim()
                .split(',')
                .map(|name| name.trim().to_owned())
                .collect(),
            LocusLayout::PerLine => lines.into_iter().map(|l| l.trim().to_owned()).collect(),
        })
    }

    /// Physical lines of one record, terminators stripped.
    ///
    /// Individual 0 is the `pop` line.
    pub fn record_lines(&self, population: usize, individual: usize) -> Result<Vec<String>> {
        let entries = self.entries("record_lines", population)?;
        let offsets = entries
            .lines(individual)
            .ok_or_else(|| GenepopError::IndividualOutOfRange {
                operation: "record_lines",
                population,
                individual,
                total: entries.count(),
            })?;
        self.read_lines(offsets)
    }

    /// The full text of one record, its physical lines joined by spaces.
    pub fn record(&self, population: usize, individual: usize) -> Result<String> {
        Ok(self.record_lines(population, individual)?.join(" "))
    }

    /// The identifier of one individual.
    pub fn identifier(&self, population: usize, individual: usize) -> Result<String> {
        let lines = self.record_lines(population, individual)?;
        split_record(population, individual, &lines[0]).map(|(id, _)| id.to_owned())
    }

    /// Identifiers of every individual in `population`, in file order.
    pub fn identifiers(&self, population: usize) -> Result<Vec<String>> {
        let entries = self.entries("identifiers", population)?;
        let first_lines: Vec<Offset> = (1..=entries.count())
            .filter_map(|i| entries.lines(i).map(|l| l[0]))
            .collect();
        self.read_lines(&first_lines)?
            .iter()
            .enumerate()
            .map(|(idx, line)| split_record(population, idx + 1, line).map(|(id, _)| id.to_owned()))
            .collect()
    }

    /// Identifier and genotype codes of one individual, across all its lines.
    pub fn genotypes(&self, population: usize, individual: usize) -> Result<(String, Vec<String>)> {
        let lines = self.record_lines(population, individual)?;
        let (id, first) = split_record(population, individual, &lines[0])?;
        let codes = std::iter::once(first)
            .chain(lines[1..].iter().map(|l| l.as_str()))
            .flat_map(|l| l.split_whitespace())
            .map(|c| c.to_owned())
            .collect();
        Ok((id.to_owned(), codes))
    }
}

/// Splits a record's first line at its single comma.
fn split_record(population: usize, individual: usize, line: &str) -> Result<(&str, &str)> {
    let mut parts = line.split(FIELD_SEPARATOR as char);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(rest), None) => Ok((id.trim(), rest)),
        (_, None, _) => Err(GenepopError::MalformedRecord {
            population,
            individual,
            reason: format!("no comma between identifier and genotypes in \"{}\"", line),
        }),
        _ => Err(GenepopError::MalformedRecord {
            population,
            individual,
            reason: format!("more than one comma in \"{}\"", line),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::error::Error;
    use std::io::Write;

    /// Writes `text` to a temporary file and indexes it.
    pub(crate) fn source_from(text: &str) -> Result<(tempfile::NamedTempFile, GenepopSource)> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        let source = GenepopSource::open(file.path())?;
        Ok((file, source))
    }

    pub(crate) const PER_LINE: &str = "\
Title line nbne=0.5
loc1
loc2
loc3
pop
ind1, 0101 0102 0000
ind2, 0202 0101 0303
ind3, 0101 0202 0303
ind4, 0102 0000 0303
Pop
ind5, 0101 0101 0101
ind6, 0102 0102 0102
ind7, 0202 0202 0101
ind8, 0101 0102 0202
";

    #[test]
    fn test_counts_with_per_line_loci() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        assert_eq!(source.population_count(), 2);
        assert_eq!(source.locus_count(), 3);
        assert_eq!(source.locus_layout(), LocusLayout::PerLine);
        assert_eq!(source.individual_counts(), vec![4, 4]);
        assert_eq!(source.header()?, "Title line nbne=0.5");
        assert_eq!(source.locus_names()?, vec!["loc1", "loc2", "loc3"]);
        Ok(())
    }

    #[test]
    fn test_counts_with_comma_joined_loci() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from("t\r\nA, B, C, D, E\r\npop\r\nx, 0101 0101 0101 0101 0101\r\n")?;
        assert_eq!(source.locus_layout(), LocusLayout::CommaJoined);
        assert_eq!(source.locus_count(), 5);
        assert_eq!(source.locus_names()?, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(source.identifiers(1)?, vec!["x"]);
        Ok(())
    }

    #[test]
    fn test_identifiers_and_genotypes() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        assert_eq!(source.identifiers(2)?, vec!["ind5", "ind6", "ind7", "ind8"]);
        let (id, codes) = source.genotypes(1, 2)?;
        assert_eq!(id, "ind2");
        assert_eq!(codes, vec!["0202", "0101", "0303"]);
        assert_eq!(source.record_lines(2, 0)?, vec!["Pop"]);
        Ok(())
    }

    #[test]
    fn test_multi_line_record_is_concatenated() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from("t\nl1\nl2\nl3\npop\na, 0101\n0202\n0303\n")?;
        let (_, codes) = source.genotypes(1, 1)?;
        assert_eq!(codes, vec!["0101", "0202", "0303"]);
        assert_eq!(source.record(1, 1)?, "a, 0101 0202 0303");
        Ok(())
    }

    #[test]
    fn test_out_of_range_reads() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from(PER_LINE)?;
        assert!(matches!(
            source.individual_count(3),
            Err(GenepopError::PopulationOutOfRange { population: 3, total: 2, .. })
        ));
        assert!(matches!(
            source.record(1, 5),
            Err(GenepopError::IndividualOutOfRange { individual: 5, total: 4, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_identifier_with_two_commas_is_malformed() -> std::result::Result<(), Box<dyn Error>> {
        let (_file, source) = source_from("t\nl1\npop\na,b, 0101\n")?;
        assert!(matches!(
            source.identifiers(1),
            Err(GenepopError::MalformedRecord { population: 1, individual: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_repoint_rebuilds_index() -> std::result::Result<(), Box<dyn Error>> {
        let (_first, mut source) = source_from(PER_LINE)?;
        let (second, _) = source_from("t\nl1\npop\na, 0101\npop\npop\n")?;
        source.repoint(second.path())?;
        assert_eq!(source.population_count(), 3);
        assert_eq!(source.locus_count(), 1);
        Ok(())
    }
}
