//! Sparse representation of a Markov decision process
//!
//! The transition structure is stored row-grouped: every state owns a
//! contiguous range of rows (choices) and every row is a probability
//! distribution over successor states. This mirrors the usual sparse matrix
//! layout of probabilistic model checkers, so that choice indices are global
//! and can be used as indices into bit-vectors.

use std::{fmt, ops::Range};

use crate::{
    bitvector::BitVector,
    labeling::{ChoiceLabeling, StateLabeling, StateValuations},
};

/// Index of a state
pub type StateId = usize;

/// Index of a choice, i.e., a row of the transition matrix
pub type ChoiceId = usize;

/// Index of an action, i.e., of a choice label after canonical numbering
pub type ActionId = usize;

/// Single entry of a row: successor state and probability
pub type Transition = (StateId, f64);

/// Markov decision process with row-grouped sparse transition matrix
///
/// Use [`crate::builder::MdpBuilder`] to construct a validated instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMdp {
    /// `row_group_indices[s]..row_group_indices[s + 1]` are the rows of `s`
    pub(crate) row_group_indices: Vec<usize>,
    /// Distribution of every row, sorted by successor state
    pub(crate) rows: Vec<Vec<Transition>>,
    /// Initial states
    pub(crate) initial_states: BitVector,
    /// Labels of the choices, if any choice is labeled
    pub(crate) choice_labeling: Option<ChoiceLabeling>,
    /// Labels of the states
    pub(crate) state_labeling: StateLabeling,
    /// Human readable valuations of the states
    pub(crate) state_valuations: Option<StateValuations>,
}

impl SparseMdp {
    /// Number of states
    pub fn nr_states(&self) -> usize {
        self.row_group_indices.len() - 1
    }

    /// Number of choices (rows) over all states
    pub fn nr_choices(&self) -> usize {
        self.rows.len()
    }

    /// Number of non-zero entries of the transition matrix
    pub fn nr_transitions(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// Rows belonging to `state`
    pub fn get_rows_for_group(&self, state: StateId) -> Range<ChoiceId> {
        self.row_group_indices[state]..self.row_group_indices[state + 1]
    }

    /// Distribution of `choice`
    pub fn get_row(&self, choice: ChoiceId) -> &[Transition] {
        &self.rows[choice]
    }

    /// Successor states of `choice`
    pub fn choice_destinations(&self, choice: ChoiceId) -> impl Iterator<Item = StateId> + '_ {
        self.rows[choice].iter().map(|(dst, _)| *dst)
    }

    /// Initial states of the model
    pub fn initial_states(&self) -> &BitVector {
        &self.initial_states
    }

    /// Check whether choices carry labels
    pub fn has_choice_labeling(&self) -> bool {
        self.choice_labeling.is_some()
    }

    /// Choice labeling, if any choice is labeled
    pub fn choice_labeling(&self) -> Option<&ChoiceLabeling> {
        self.choice_labeling.as_ref()
    }

    /// State labeling
    pub fn state_labeling(&self) -> &StateLabeling {
        &self.state_labeling
    }

    /// Human readable state valuations, if available
    pub fn state_valuations(&self) -> Option<&StateValuations> {
        self.state_valuations.as_ref()
    }

    /// Check that every state has at most one choice
    pub fn is_deterministic(&self) -> bool {
        (0..self.nr_states()).all(|s| self.get_rows_for_group(s).len() <= 1)
    }

    /// States without any choice
    pub fn deadlock_states(&self) -> impl Iterator<Item = StateId> + '_ {
        (0..self.nr_states()).filter(|s| self.get_rows_for_group(*s).is_empty())
    }
}

impl fmt::Display for SparseMdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "MDP with {} states, {} choices and {} transitions",
            self.nr_states(),
            self.nr_choices(),
            self.nr_transitions()
        )?;
        writeln!(f, "initial states: {}", self.initial_states)?;
        for state in 0..self.nr_states() {
            for choice in self.get_rows_for_group(state) {
                let labels = self
                    .choice_labeling
                    .as_ref()
                    .map(|l| {
                        let mut labels = l.get_labels_of_item(choice).into_iter().collect::<Vec<_>>();
                        labels.sort();
                        labels.join(",")
                    })
                    .unwrap_or_default();
                let dist = self.rows[choice]
                    .iter()
                    .map(|(dst, p)| format!("{p}:{dst}"))
                    .collect::<Vec<_>>()
                    .join(" + ");
                writeln!(f, "  {state} --[{labels}]--> {dist}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{ChoiceBuilder, MdpBuilder};

    fn small_mdp() -> crate::mdp::SparseMdp {
        MdpBuilder::new(3)
            .with_initial_state(0)
            .unwrap()
            .with_choices(vec![
                ChoiceBuilder::new(0)
                    .with_label("a")
                    .with_transition(1, 0.5)
                    .with_transition(2, 0.5)
                    .build(),
                ChoiceBuilder::new(0)
                    .with_label("b")
                    .with_transition(2, 1.0)
                    .build(),
                ChoiceBuilder::new(1)
                    .with_label("a")
                    .with_transition(1, 1.0)
                    .build(),
            ])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_row_groups() {
        let mdp = small_mdp();
        assert_eq!(mdp.nr_states(), 3);
        assert_eq!(mdp.nr_choices(), 3);
        assert_eq!(mdp.nr_transitions(), 4);
        assert_eq!(mdp.get_rows_for_group(0), 0..2);
        assert_eq!(mdp.get_rows_for_group(1), 2..3);
        assert_eq!(mdp.get_rows_for_group(2), 3..3);
    }

    #[test]
    fn test_destinations_and_determinism() {
        let mdp = small_mdp();
        assert_eq!(mdp.choice_destinations(0).collect::<Vec<_>>(), vec![1, 2]);
        assert!(!mdp.is_deterministic());
        assert_eq!(mdp.deadlock_states().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_display() {
        let mdp = small_mdp();
        let out = mdp.to_string();
        assert!(out.starts_with("MDP with 3 states, 3 choices and 4 transitions"));
        assert!(out.contains("0 --[a]--> 0.5:1 + 0.5:2"));
        assert!(out.contains("1 --[a]--> 1:1"));
    }
}
