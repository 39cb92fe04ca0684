//! Normalized Genepop output over a selection of views.
use crate::error::{GenepopError, Result};
use crate::registry::{ResolvedView, Selection, SubsampleRegistry};
use crate::source::{GenepopSource, LocusLayout};
use log::{info, warn};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineTerminator {
    Lf,
    CrLf,
}

impl LineTerminator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Output settings for [`write_to`] and [`write_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    min_population_size: usize,
    line_terminator: LineTerminator,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteOptions {
    /// Writes every selected population with `\n` line endings
    pub fn new() -> Self {
        Self {
            min_population_size: 0,
            line_terminator: LineTerminator::Lf,
        }
    }

    /// Skip populations with fewer selected individuals than `size`.
    pub fn min_population_size(&mut self, size: usize) -> &mut Self {
        self.min_population_size = size;
        self
    }

    pub fn line_terminator(&mut self, terminator: LineTerminator) -> &mut Self {
        self.line_terminator = terminator;
        self
    }
}

fn locus_declaration(source: &GenepopSource, view: &ResolvedView) -> Result<Vec<String>> {
    let lines = source.locus_lines()?;
    if view.all_loci {
        return Ok(lines);
    }
    Ok(match source.locus_layout() {
        LocusLayout::CommaJoined => {
            let names = source.locus_names()?;
            let kept: Vec<&str> = view.loci.iter().map(|&l| names[l - 1].as_str()).collect();
            vec![kept.join(",")]
        }
        LocusLayout::PerLine => view.loci.iter().map(|&l| lines[l - 1].clone()).collect(),
    })
}

fn reduced_record(source: &GenepopSource, view: &ResolvedView, population: usize, individual: usize) -> Result<String> {
    let (id, codes) = source.genotypes(population, individual)?;
    if codes.len() != source.locus_count() {
        return Err(GenepopError::LocusCountMismatch {
            population,
            individual,
            expected: source.locus_count(),
            found: codes.len(),
        });
    }
    let kept: Vec<&str> = view.loci.iter().map(|&l| codes[l - 1].as_str()).collect();
    Ok(format!("{}, {}", id, kept.join(" ")))
}

/// Streams the selected part of `source` to `out`.
///
/// Every tag in `selection` is resolved before the first byte is written.
pub fn write_to<W: Write>(
    source: &GenepopSource,
    registry: &SubsampleRegistry,
    selection: &Selection,
    options: &WriteOptions,
    mut out: W,
) -> Result<()> {
    let view = registry.resolve(source, selection)?;
    let eol = options.line_terminator.as_str();

    write!(out, "{}{}", source.header()?, eol)?;
    for line in locus_declaration(source, &view)? {
        write!(out, "{}{}", line, eol)?;
    }

    for (population, individuals) in &view.populations {
        if individuals.len() < options.min_population_size {
            warn!(
                "skipping population {}: {} individuals selected, minimum {}",
                population,
                individuals.len(),
                options.min_population_size
            );
            continue;
        }
        for marker in source.record_lines(*population, 0)? {
            write!(out, "{}{}", marker, eol)?;
        }
        for &individual in individuals {
            if view.all_loci {
                for line in source.record_lines(*population, individual)? {
                    write!(out, "{}{}", line, eol)?;
                }
            } else {
                write!(out, "{}{}", reduced_record(source, &view, *population, individual)?, eol)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Writes a new Genepop file at `destination`.
///
/// Fails if `destination` exists. Output goes to a temporary file in the
/// same directory and is moved into place only once complete, so a failed
/// write leaves no destination file.
pub fn write_file<P: AsRef<Path>>(
    source: &GenepopSource,
    registry: &SubsampleRegistry,
    selection: &Selection,
    options: &WriteOptions,
    destination: P,
) -> Result<()> {
    let destination = destination.as_ref();
    if destination.exists() {
        return Err(GenepopError::DestinationExists(destination.to_path_buf()));
    }
    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staging = tempfile::NamedTempFile::new_in(directory)?;
    write_to(source, registry, selection, options, BufWriter::new(staging.as_file_mut()))?;
    staging.persist_noclobber(destination)?;
    info!("wrote {}", destination.display());
    Ok(())
}
