//! Probabilistic models for quotient-based synthesis
//!
//! This crate contains the model layer used by all other `qsynth` crates:
//!
//! - [`bitvector::BitVector`], fixed-size boolean vectors over states or
//!   choices,
//! - [`mdp::SparseMdp`], a Markov decision process with a row-grouped sparse
//!   transition matrix, choice and state labelings and state valuations,
//! - [`builder::MdpBuilder`], a validating factory for models,
//! - [`submodel::SubMdp`], the fragment of a model induced by a choice mask.
//!
//! Choices are identified by their global row index, states by their row
//! group index. Both are plain `usize` values so that they can be used to
//! index bit-vectors and vectors directly.

pub mod bitvector;
pub mod builder;
pub mod labeling;
pub mod mdp;
pub mod submodel;

pub use bitvector::BitVector;
pub use mdp::{ActionId, ChoiceId, SparseMdp, StateId};
pub use submodel::SubMdp;
