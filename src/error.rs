use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which kind of subsample a tag was looked up in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubsampleKind {
    Population,
    Individual,
    Locus,
}

impl fmt::Display for SubsampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Population => write!(f, "population"),
            Self::Individual => write!(f, "individual"),
            Self::Locus => write!(f, "locus"),
        }
    }
}

/// Errors raised while indexing, sampling, writing or summarizing a Genepop file.
#[derive(Debug, Error)]
pub enum GenepopError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not move finished output into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("no \"pop\" line found in {}; not a Genepop file", .0.display())]
    NoPopMarker(PathBuf),

    #[error("line {line} of {}: continuation line with no preceding individual in population {population}", .path.display())]
    OrphanContinuation {
        path: PathBuf,
        line: usize,
        population: usize,
    },

    #[error("population {population}, individual {individual}: {reason}")]
    MalformedRecord {
        population: usize,
        individual: usize,
        reason: String,
    },

    #[error("population {population}, individual {individual}, locus {locus}: genotype code \"{code}\" {reason}")]
    InvalidGenotype {
        population: usize,
        individual: usize,
        locus: usize,
        code: String,
        reason: &'static str,
    },

    #[error("population {population}, individual {individual}: expected {expected} genotype codes, found {found}")]
    LocusCountMismatch {
        population: usize,
        individual: usize,
        expected: usize,
        found: usize,
    },

    #[error("identifier \"{identifier}\": {reason}")]
    IdentifierField { identifier: String, reason: String },

    #[error("criteria expression \"{expression}\": {reason}")]
    Expression { expression: String, reason: String },

    #[error("{operation}: population {population} out of range 1..={total}")]
    PopulationOutOfRange {
        operation: &'static str,
        population: usize,
        total: usize,
    },

    #[error("{operation}: individual {individual} out of range 1..={total} in population {population}")]
    IndividualOutOfRange {
        operation: &'static str,
        population: usize,
        individual: usize,
        total: usize,
    },

    #[error("{operation}: locus {locus} out of range 1..={total}")]
    LocusOutOfRange {
        operation: &'static str,
        locus: usize,
        total: usize,
    },

    #[error("{operation}: locus window {min}-{max} invalid for a file with {total} loci")]
    InvalidLocusWindow {
        operation: &'static str,
        min: usize,
        max: usize,
        total: usize,
    },

    #[error("{operation}: sample size {size} is below the minimum {minimum}")]
    BelowMinimum {
        operation: &'static str,
        size: usize,
        minimum: usize,
    },

    #[error("population {population}: not enough full siblings, target {target}, still missing {missing}")]
    InsufficientRelateds {
        population: usize,
        target: f64,
        missing: f64,
    },

    #[error("{operation}: {reason}")]
    InvalidParameter {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation}: empty selection")]
    EmptySelection { operation: &'static str },

    #[error("no {kind} subsample with tag \"{tag}\"")]
    UnknownSubsample { kind: SubsampleKind, tag: String },

    #[error("refusing to overwrite existing file {}", .0.display())]
    DestinationExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, GenepopError>;
