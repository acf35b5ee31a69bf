//! Design spaces of sketches
//!
//! A sketch describes a finite set of Markov decision processes through holes:
//! parameters that can each be instantiated with one of finitely many options.
//! All members are encoded in a single quotient model whose choices are
//! colored with the hole options they require.
//!
//! This crate provides:
//! - [`hole::Hole`]: a hole and the options it still allows,
//! - [`family::Family`] and [`family::DesignSpace`]: subsets of the design
//!   space, obtained by restricting holes, and the root family,
//! - [`coloring::Coloring`]: the map from quotient choices to required hole
//!   options, used to compute the choices legal in a family.

use std::fmt;

use qsynth_model::ChoiceId;

pub mod coloring;
pub mod family;
pub mod hole;

pub use coloring::Coloring;
pub use family::{DesignSpace, Family};
pub use hole::Hole;

/// Errors that can occur when working with holes, families and colorings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyError {
    /// A hole index or name that does not exist
    UnknownHole(String),
    /// An option index that does not exist for the named hole
    UnknownOption(String, usize),
    /// A restriction that would leave the named hole without options
    EmptyHole(String),
    /// A choice requires two options of the same hole
    ConflictingColors(ChoiceId, String),
    /// A family or assignment does not match the number of holes
    HoleCountMismatch {
        /// Number of holes of the design space
        expected: usize,
        /// Number of holes supplied
        actual: usize,
    },
}

impl std::error::Error for FamilyError {}

impl fmt::Display for FamilyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyError::UnknownHole(h) => write!(f, "Unknown hole: {h}"),
            FamilyError::UnknownOption(h, o) => write!(f, "Hole {h} has no option {o}"),
            FamilyError::EmptyHole(h) => write!(f, "Hole {h} would have no options left"),
            FamilyError::ConflictingColors(c, h) => {
                write!(f, "Choice {c} requires multiple options of hole {h}")
            }
            FamilyError::HoleCountMismatch { expected, actual } => {
                write!(f, "Expected {expected} holes but got {actual}")
            }
        }
    }
}
