//! Quotient container for families of Markov decision processes
//!
//! A family of MDPs that differ only in some of their choices can be encoded
//! as a single *quotient* MDP whose choices are colored with the hole options
//! that enable them. This crate wraps such a quotient in a
//! [`MdpFamilyQuotient`], which
//!
//! - derives a canonical action labeling from the choice labels
//!   ([`labeling`]),
//! - indexes the choices of every state by action,
//! - constructs and repairs policies for a sub-family and applies them
//!   ([`MdpFamilyQuotient::fix_policy_for_family`],
//!   [`MdpFamilyQuotient::apply_policy_to_family`]),
//! - checks that policies applied to single members are deterministic,
//! - sets up the game abstraction solver for a [`property::Property`].
//!
//! On top of the container, [`synthesizer::PolicySynthesizer`] searches the
//! design space for families that are solved by a single policy.
//!
//! # Example
//!
//! ```
//! use qsynth_family::{Coloring, Hole};
//! use qsynth_model::builder::{ChoiceBuilder, MdpBuilder};
//! use qsynth_quotient::{MdpFamilyQuotient, config::QuotientConfig};
//!
//! let mdp = MdpBuilder::new(2)
//!     .with_initial_state(0)
//!     .unwrap()
//!     .with_choices(vec![
//!         ChoiceBuilder::new(0).with_label("b").with_transition(1, 1.0).build(),
//!         ChoiceBuilder::new(0).with_label("a").with_transition(0, 1.0).build(),
//!         ChoiceBuilder::new(1).with_label("b").with_transition(1, 1.0).build(),
//!     ])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let coloring = Coloring::new(vec![Hole::new("h", vec!["x", "y"])], vec![vec![]; 3]).unwrap();
//!
//! let quotient = MdpFamilyQuotient::new(mdp, coloring, vec![], QuotientConfig::default()).unwrap();
//! assert_eq!(quotient.action_labels(), &["a".to_string(), "b".to_string()]);
//! assert_eq!(quotient.choice_to_action(), &[1, 0, 1]);
//! ```

pub mod config;
pub mod error;
pub mod labeling;
pub mod policy;
pub mod property;
pub mod quotient;
pub mod synthesizer;

pub use error::{NondeterminismError, PolicyError, QuotientError};
pub use policy::Policy;
pub use quotient::MdpFamilyQuotient;
