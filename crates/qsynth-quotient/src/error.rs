//! Errors of the quotient container

use std::fmt::{self, Display};

use qsynth_family::FamilyError;
use qsynth_model::{ActionId, ChoiceId, StateId};

/// Error that can occur when constructing a quotient container
#[derive(Debug, Clone, PartialEq)]
pub enum QuotientError {
    /// The quotient MDP does not carry a choice labeling
    MissingChoiceLabeling,
    /// A choice carries no label or more than one label
    NonCanonicalChoiceLabel {
        /// The offending choice
        choice: ChoiceId,
        /// Labels of the choice, sorted
        labels: Vec<String>,
    },
    /// The quotient MDP does not have exactly one initial state
    InitialStates(usize),
    /// The coloring is defined over a different number of choices
    ColoringMismatch {
        /// Number of choices of the quotient
        expected: usize,
        /// Number of choices of the coloring
        actual: usize,
    },
    /// Error in the design space
    Family(FamilyError),
}

impl std::error::Error for QuotientError {}

impl Display for QuotientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotientError::MissingChoiceLabeling => {
                write!(f, "The quotient MDP does not have a choice labeling")
            }
            QuotientError::NonCanonicalChoiceLabel { choice, labels } => write!(
                f,
                "Expected exactly one label for choice {choice}, found {} ([{}])",
                labels.len(),
                labels.join(", ")
            ),
            QuotientError::InitialStates(n) => {
                write!(f, "Expected exactly one initial state, found {n}")
            }
            QuotientError::ColoringMismatch { expected, actual } => write!(
                f,
                "The quotient has {expected} choices but the coloring colors {actual}"
            ),
            QuotientError::Family(err) => write!(f, "Invalid design space: {err}"),
        }
    }
}

impl From<FamilyError> for QuotientError {
    fn from(value: FamilyError) -> Self {
        QuotientError::Family(value)
    }
}

/// Error that can occur when fixing a policy for a family
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// The action picked in `state` has no choice that is legal in the family
    ///
    /// Only reported when infeasible actions are rejected, see
    /// [`crate::config::InfeasibleActionMode`].
    NoLegalChoice {
        /// Reached state
        state: StateId,
        /// Action of the policy in `state`
        action: ActionId,
    },
    /// The policy does not cover exactly the states of the quotient
    PolicySizeMismatch {
        /// Number of states of the quotient
        expected: usize,
        /// Number of states of the policy
        actual: usize,
    },
    /// The policy picks an action that does not exist
    UnknownAction {
        /// State of the policy
        state: StateId,
        /// Action picked in `state`
        action: ActionId,
        /// Number of actions of the quotient
        num_actions: usize,
    },
    /// The legal choices of the family could not be computed
    Family(FamilyError),
}

impl std::error::Error for PolicyError {}

impl Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::NoLegalChoice { state, action } => write!(
                f,
                "Action {action} picked in state {state} has no choice legal in the family"
            ),
            PolicyError::PolicySizeMismatch { expected, actual } => write!(
                f,
                "Policy defines {actual} states but the quotient has {expected} states"
            ),
            PolicyError::UnknownAction {
                state,
                action,
                num_actions,
            } => write!(
                f,
                "Policy picks action {action} in state {state}, but there are only {num_actions} actions"
            ),
            PolicyError::Family(err) => write!(f, "Failed to select choices: {err}"),
        }
    }
}

impl From<FamilyError> for PolicyError {
    fn from(value: FamilyError) -> Self {
        PolicyError::Family(value)
    }
}

/// A state of a sub-model that kept more than one choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NondeterministicState {
    /// State in the quotient
    pub state: StateId,
    /// Valuation of the state without whitespace
    pub valuation: String,
    /// Action labels of the choices of the state
    pub actions: Vec<String>,
}

impl Display for NondeterministicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.valuation, self.actions.join(", "))
    }
}

/// Applying a policy to a singleton family produced a nondeterministic model
///
/// This indicates a bug in the construction of the policy or of the coloring
/// rather than an error in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NondeterminismError {
    /// The family the policy was applied to
    pub family: String,
    /// Every state with more than one choice
    pub states: Vec<NondeterministicState>,
}

impl std::error::Error for NondeterminismError {}

impl Display for NondeterminismError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Applying the policy to family {} yields {} nondeterministic state(s): {}",
            self.family,
            self.states.len(),
            self.states
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}
