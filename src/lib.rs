#![crate_name = "genepop"]
//! Reading, subsampling and summarizing Genepop population genetics files.
//!
//! A [`GenepopSource`](source::GenepopSource) indexes a file by byte offset
//! and reads records on demand. Sampling functions register named views in a
//! [`SubsampleRegistry`](registry::SubsampleRegistry); a
//! [`Selection`](registry::Selection) of tags then drives writing and
//! statistics without copying any genotype data.

pub mod prelude;

pub mod criteria;
pub mod error;
pub mod identifier;
pub mod index;
pub mod registry;
pub mod sampling;
pub mod source;
pub mod stats;
pub mod writer;

pub use error::{GenepopError, Result};
