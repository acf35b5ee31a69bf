//! Factory methods for building a valid [`SparseMdp`]
//!
//! The builder [`MdpBuilder`] validates every choice before adding it to the
//! model: choices must be added grouped by state in ascending state order,
//! successor states must exist and every distribution must sum up to one.

use std::fmt;

use log::trace;

use crate::{
    bitvector::BitVector,
    labeling::{ChoiceLabeling, StateLabeling, StateValuations},
    mdp::{SparseMdp, StateId, Transition},
};

/// Tolerance when checking that a distribution sums up to one
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Choice that can be added to an [`MdpBuilder`]
///
/// Use [`ChoiceBuilder`] to construct it.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// State the choice belongs to
    state: StateId,
    /// Labels attached to the choice
    labels: Vec<String>,
    /// Distribution over successor states
    transitions: Vec<Transition>,
}

impl Choice {
    /// State the choice belongs to
    pub fn state(&self) -> StateId {
        self.state
    }

    /// Labels of the choice
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Distribution of the choice
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

/// Builder for a single [`Choice`]
///
/// # Example
///
/// ```
/// use qsynth_model::builder::ChoiceBuilder;
///
/// let choice = ChoiceBuilder::new(0)
///     .with_label("left")
///     .with_transition(1, 0.25)
///     .with_transition(2, 0.75)
///     .build();
///
/// assert_eq!(choice.state(), 0);
/// assert_eq!(choice.labels(), &["left".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceBuilder {
    choice: Choice,
}

impl ChoiceBuilder {
    /// Start a new choice of `state`
    pub fn new(state: StateId) -> Self {
        Self {
            choice: Choice {
                state,
                labels: Vec::new(),
                transitions: Vec::new(),
            },
        }
    }

    /// Attach a label to the choice
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.choice.labels.push(label.into());
        self
    }

    /// Add a successor with the given probability
    pub fn with_transition(mut self, target: StateId, probability: f64) -> Self {
        self.choice.transitions.push((target, probability));
        self
    }

    /// Add several successors
    pub fn with_transitions(mut self, transitions: impl IntoIterator<Item = Transition>) -> Self {
        self.choice.transitions.extend(transitions);
        self
    }

    /// Finish the choice
    pub fn build(self) -> Choice {
        self.choice
    }
}

/// Builder for constructing a [`SparseMdp`]
///
/// # Example
///
/// ```
/// use qsynth_model::builder::{ChoiceBuilder, MdpBuilder};
///
/// let mdp = MdpBuilder::new(2)
///     .with_initial_state(0).unwrap()
///     .with_choice(ChoiceBuilder::new(0).with_label("go").with_transition(1, 1.0).build()).unwrap()
///     .with_choice(ChoiceBuilder::new(1).with_label("stay").with_transition(1, 1.0).build()).unwrap()
///     .with_state_label("goal", [1]).unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(mdp.nr_states(), 2);
/// assert_eq!(mdp.nr_choices(), 2);
/// assert!(mdp.state_labeling().get_items("goal").unwrap().get(1));
/// ```
#[derive(Debug, Clone)]
pub struct MdpBuilder {
    nr_states: usize,
    row_group_indices: Vec<usize>,
    rows: Vec<Vec<Transition>>,
    choice_labels: Vec<Vec<String>>,
    initial_states: BitVector,
    state_labeling: StateLabeling,
    state_valuations: Option<StateValuations>,
}

impl MdpBuilder {
    /// Create a new builder for a model with `nr_states` states
    pub fn new(nr_states: usize) -> Self {
        Self {
            nr_states,
            row_group_indices: vec![0],
            rows: Vec::new(),
            choice_labels: Vec::new(),
            initial_states: BitVector::new(nr_states, false),
            state_labeling: StateLabeling::new(nr_states),
            state_valuations: None,
        }
    }

    fn check_state(&self, state: StateId) -> Result<(), BuilderError> {
        if state >= self.nr_states {
            return Err(BuilderError::StateOutOfRange(state, self.nr_states));
        }
        Ok(())
    }

    /// Mark `state` as initial
    pub fn with_initial_state(mut self, state: StateId) -> Result<Self, BuilderError> {
        self.check_state(state)?;
        self.initial_states.set(state, true);
        Ok(self)
    }

    /// Normalize the distribution of `choice`: merge duplicate successors and
    /// sort by successor state
    fn validate_distribution(&self, choice: &Choice) -> Result<Vec<Transition>, BuilderError> {
        if choice.transitions.is_empty() {
            return Err(BuilderError::EmptyDistribution(choice.state));
        }

        let mut dist: Vec<Transition> = Vec::with_capacity(choice.transitions.len());
        for &(target, probability) in choice.transitions.iter() {
            self.check_state(target)?;
            if !(probability > 0.0 && probability <= 1.0) {
                return Err(BuilderError::InvalidProbability {
                    state: choice.state,
                    target,
                    probability,
                });
            }
            match dist.iter_mut().find(|(t, _)| *t == target) {
                Some((_, p)) => *p += probability,
                None => dist.push((target, probability)),
            }
        }

        let sum: f64 = dist.iter().map(|(_, p)| p).sum();
        if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
            return Err(BuilderError::DistributionNotNormalized {
                state: choice.state,
                sum,
            });
        }

        dist.sort_by_key(|(t, _)| *t);
        Ok(dist)
    }

    /// Add a choice
    ///
    /// Choices have to be added in ascending order of their states. All
    /// choices of a state are numbered consecutively in the order they are
    /// added.
    pub fn with_choice(mut self, choice: Choice) -> Result<Self, BuilderError> {
        self.check_state(choice.state)?;

        // groups of all states below the last opened one are closed
        let nr_opened_groups = self.row_group_indices.len() - 1;
        if choice.state + 1 < nr_opened_groups {
            return Err(BuilderError::ChoiceOutOfOrder {
                state: choice.state,
                current_state: nr_opened_groups - 1,
            });
        }

        let dist = self.validate_distribution(&choice)?;

        // close the groups of all states up to the state of the choice
        while self.row_group_indices.len() - 1 <= choice.state {
            self.row_group_indices.push(self.rows.len());
        }
        self.rows.push(dist);
        self.choice_labels.push(choice.labels);
        let nr_rows = self.rows.len();
        if let Some(end) = self.row_group_indices.last_mut() {
            *end = nr_rows;
        }

        Ok(self)
    }

    /// Add multiple choices, see [`MdpBuilder::with_choice`]
    pub fn with_choices(self, choices: impl IntoIterator<Item = Choice>) -> Result<Self, BuilderError> {
        choices.into_iter().try_fold(self, |b, c| b.with_choice(c))
    }

    /// Attach `label` to all given states
    ///
    /// The label is registered even if `states` is empty.
    pub fn with_state_label(
        mut self,
        label: impl Into<String>,
        states: impl IntoIterator<Item = StateId>,
    ) -> Result<Self, BuilderError> {
        let label = label.into();
        self.state_labeling.add_label(label.clone());
        for state in states {
            self.check_state(state)?;
            self.state_labeling.add_label_to_item(label.clone(), state);
        }
        Ok(self)
    }

    /// Add a human readable valuation for every state
    pub fn with_state_valuations(mut self, valuations: Vec<String>) -> Result<Self, BuilderError> {
        if valuations.len() != self.nr_states {
            return Err(BuilderError::ValuationCountMismatch {
                expected: self.nr_states,
                actual: valuations.len(),
            });
        }
        self.state_valuations = Some(StateValuations::new(valuations));
        Ok(self)
    }

    /// Build the model
    ///
    /// States without any choice are kept as deadlock states.
    pub fn build(mut self) -> Result<SparseMdp, BuilderError> {
        if self.nr_states == 0 || self.initial_states.is_all_zero() {
            return Err(BuilderError::NoInitialState);
        }

        while self.row_group_indices.len() <= self.nr_states {
            self.row_group_indices.push(self.rows.len());
        }

        let choice_labeling = if self.choice_labels.iter().any(|l| !l.is_empty()) {
            let mut labeling = ChoiceLabeling::new(self.rows.len());
            for (choice, labels) in self.choice_labels.into_iter().enumerate() {
                for label in labels {
                    labeling.add_label_to_item(label, choice);
                }
            }
            Some(labeling)
        } else {
            None
        };

        trace!(
            "Built MDP with {} states and {} choices",
            self.nr_states,
            self.rows.len()
        );

        Ok(SparseMdp {
            row_group_indices: self.row_group_indices,
            rows: self.rows,
            initial_states: self.initial_states,
            choice_labeling,
            state_labeling: self.state_labeling,
            state_valuations: self.state_valuations,
        })
    }
}

/// Errors that can occur while building a [`SparseMdp`]
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderError {
    /// A state index is not smaller than the number of states
    StateOutOfRange(StateId, usize),
    /// A choice was added for a state whose row group is already closed
    ChoiceOutOfOrder {
        /// State of the rejected choice
        state: StateId,
        /// State whose choices were added last
        current_state: StateId,
    },
    /// A choice without successors
    EmptyDistribution(StateId),
    /// A probability outside of `(0, 1]`
    InvalidProbability {
        /// State of the choice
        state: StateId,
        /// Successor with the invalid probability
        target: StateId,
        /// The invalid probability
        probability: f64,
    },
    /// A distribution that does not sum up to one
    DistributionNotNormalized {
        /// State of the choice
        state: StateId,
        /// Actual sum of the distribution
        sum: f64,
    },
    /// Number of state valuations differs from the number of states
    ValuationCountMismatch {
        /// Number of states
        expected: usize,
        /// Number of valuations supplied
        actual: usize,
    },
    /// The model has no initial state
    NoInitialState,
}

impl std::error::Error for BuilderError {}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::StateOutOfRange(s, n) => {
                write!(f, "State {s} out of range, model has {n} states")
            }
            BuilderError::ChoiceOutOfOrder {
                state,
                current_state,
            } => write!(
                f,
                "Choice of state {state} added after choices of state {current_state}; choices must be added in ascending state order"
            ),
            BuilderError::EmptyDistribution(s) => {
                write!(f, "Choice of state {s} has no successor")
            }
            BuilderError::InvalidProbability {
                state,
                target,
                probability,
            } => write!(
                f,
                "Choice of state {state} has invalid probability {probability} for successor {target}"
            ),
            BuilderError::DistributionNotNormalized { state, sum } => {
                write!(f, "Distribution of a choice of state {state} sums up to {sum}")
            }
            BuilderError::ValuationCountMismatch { expected, actual } => write!(
                f,
                "Expected {expected} state valuations but {actual} were given"
            ),
            BuilderError::NoInitialState => write!(f, "Model has no initial state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BuilderError, ChoiceBuilder, MdpBuilder};

    #[test]
    fn test_builder_groups_with_gaps() {
        let mdp = MdpBuilder::new(4)
            .with_initial_state(0)
            .unwrap()
            .with_choices(vec![
                ChoiceBuilder::new(0).with_transition(2, 1.0).build(),
                ChoiceBuilder::new(2).with_transition(3, 1.0).build(),
                ChoiceBuilder::new(2).with_transition(0, 1.0).build(),
            ])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(mdp.get_rows_for_group(0), 0..1);
        assert_eq!(mdp.get_rows_for_group(1), 1..1);
        assert_eq!(mdp.get_rows_for_group(2), 1..3);
        assert_eq!(mdp.get_rows_for_group(3), 3..3);
        assert!(!mdp.has_choice_labeling());
    }

    #[test]
    fn test_builder_merges_duplicate_successors() {
        let mdp = MdpBuilder::new(2)
            .with_initial_state(0)
            .unwrap()
            .with_choice(
                ChoiceBuilder::new(0)
                    .with_transitions(vec![(1, 0.25), (0, 0.5), (1, 0.25)])
                    .build(),
            )
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(mdp.get_row(0), &[(0, 0.5), (1, 0.5)]);
    }

    #[test]
    fn test_builder_rejects_out_of_order_choice() {
        let res = MdpBuilder::new(3)
            .with_choice(ChoiceBuilder::new(1).with_transition(0, 1.0).build())
            .unwrap()
            .with_choice(ChoiceBuilder::new(0).with_transition(0, 1.0).build());

        assert_eq!(
            res.unwrap_err(),
            BuilderError::ChoiceOutOfOrder {
                state: 0,
                current_state: 1
            }
        );
    }

    #[test]
    fn test_builder_rejects_bad_distributions() {
        let res = MdpBuilder::new(2).with_choice(ChoiceBuilder::new(0).build());
        assert_eq!(res.unwrap_err(), BuilderError::EmptyDistribution(0));

        let res = MdpBuilder::new(2).with_choice(
            ChoiceBuilder::new(0)
                .with_transition(0, 0.5)
                .with_transition(1, 0.4)
                .build(),
        );
        assert!(matches!(
            res.unwrap_err(),
            BuilderError::DistributionNotNormalized { state: 0, .. }
        ));

        let res = MdpBuilder::new(2)
            .with_choice(ChoiceBuilder::new(0).with_transition(1, -1.0).build());
        assert!(matches!(
            res.unwrap_err(),
            BuilderError::InvalidProbability { target: 1, .. }
        ));

        let res = MdpBuilder::new(2)
            .with_choice(ChoiceBuilder::new(0).with_transition(2, 1.0).build());
        assert_eq!(res.unwrap_err(), BuilderError::StateOutOfRange(2, 2));
    }

    #[test]
    fn test_builder_requires_initial_state() {
        let res = MdpBuilder::new(1)
            .with_choice(ChoiceBuilder::new(0).with_transition(0, 1.0).build())
            .unwrap()
            .build();
        assert_eq!(res.unwrap_err(), BuilderError::NoInitialState);
    }

    #[test]
    fn test_builder_valuations() {
        let res = MdpBuilder::new(2).with_state_valuations(vec!["[x=0]".into()]);
        assert_eq!(
            res.unwrap_err(),
            BuilderError::ValuationCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
