//! One-pass byte-offset index over a Genepop file.
//!
//! The index classifies lines only: everything before the first `pop`
//! line is a header or locus declaration, a `pop` line opens a new
//! population, a line with a comma opens a new individual record and any
//! other line continues the current record.
use crate::error::{GenepopError, Result};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Byte offset of the first byte of a line.
pub type Offset = u64;

/// Field separator between an individual's identifier and its genotypes.
pub const FIELD_SEPARATOR: u8 = b',';

/// Offsets of a single population block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopulationEntries {
    marker: [Offset; 1],
    individuals: Vec<Vec<Offset>>,
}

impl PopulationEntries {
    fn new(marker: Offset) -> Self {
        Self {
            marker: [marker],
            individuals: vec![],
        }
    }

    /// Number of individuals, not counting the `pop` line.
    pub fn count(&self) -> usize {
        self.individuals.len()
    }

    /// Offset of the `pop` line itself.
    pub fn marker(&self) -> Offset {
        self.marker[0]
    }

    /// Line offsets of individual `individual`, in line order.
    ///
    /// Individual 0 is the `pop` line.
    pub fn lines(&self, individual: usize) -> Option<&[Offset]> {
        if individual == 0 {
            Some(&self.marker)
        } else {
            self.individuals.get(individual - 1).map(|v| v.as_slice())
        }
    }
}

/// Byte offsets of every header line and every population record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordIndex {
    header: Vec<Offset>,
    populations: Vec<PopulationEntries>,
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// True for a line reading exactly `pop` in any case.
pub fn is_pop_marker(line: &[u8]) -> bool {
    strip_terminator(line).eq_ignore_ascii_case(b"pop")
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

impl RecordIndex {
    /// Scans `path` once and records the offset of every line.
    ///
    /// Fails if the file has no `pop` line.
    pub fn build<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = vec![];
        let mut populations: Vec<PopulationEntries> = vec![];
        let mut line = Vec::new();
        let mut offset: Offset = 0;
        let mut line_number = 0;

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            line_number += 1;
            let start = offset;
            offset += read as Offset;

            if is_pop_marker(&line) {
                populations.push(PopulationEntries::new(start));
                continue;
            }

            match populations.last_mut() {
                None if !header.is_empty() && is_blank(&line) => {}
                None => header.push(start),
                Some(_) if is_blank(&line) => {}
                Some(population) => {
                    if line.contains(&FIELD_SEPARATOR) {
                        population.individuals.push(vec![start]);
                    } else {
                        match population.individuals.last_mut() {
                            Some(lines) => lines.push(start),
                            None => {
                                return Err(GenepopError::OrphanContinuation {
                                    path: path.to_path_buf(),
                                    line: line_number,
                                    population: populations.len(),
                                })
                            }
                        }
                    }
                }
            }
        }

        if populations.is_empty() {
            return Err(GenepopError::NoPopMarker(path.to_path_buf()));
        }

        debug!(
            "indexed {}: {} header lines, {} populations",
            path.display(),
            header.len(),
            populations.len()
        );

        Ok(Self {
            header,
            populations,
        })
    }

    /// Offsets of the header line and the locus declaration lines.
    pub fn header(&self) -> &[Offset] {
        &self.header
    }

    pub fn population_count(&self) -> usize {
        self.populations.len()
    }

    /// Population `population`, numbered from 1.
    pub fn population(&self, population: usize) -> Option<&PopulationEntries> {
        population
            .checked_sub(1)
            .and_then(|idx| self.populations.get(idx))
    }

    pub fn populations(&self) -> impl Iterator<Item = (usize, &PopulationEntries)> {
        self.populations.iter().enumerate().map(|(i, p)| (i + 1, p))
    }
}
