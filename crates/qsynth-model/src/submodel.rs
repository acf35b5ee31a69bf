//! Construction of sub-models induced by a set of choices
//!
//! Restricting a model to a subset of its choices yields a [`SubMdp`]: the
//! fragment of the model that is reachable from the initial states using only
//! the selected choices, together with the maps that translate its state and
//! choice indices back to the full model.

use std::collections::VecDeque;

use log::trace;

use crate::{
    bitvector::BitVector,
    labeling::{ChoiceLabeling, StateLabeling},
    mdp::{ChoiceId, SparseMdp, StateId},
};

/// Model obtained by restricting another model to a choice mask
#[derive(Debug, Clone, PartialEq)]
pub struct SubMdp {
    /// The restricted model
    pub model: SparseMdp,
    /// For every state of `model`, the corresponding state of the full model
    pub quotient_state_map: Vec<StateId>,
    /// For every choice of `model`, the corresponding choice of the full model
    pub quotient_choice_map: Vec<ChoiceId>,
}

impl SubMdp {
    /// Check whether every state of the sub-model has at most one choice
    pub fn is_deterministic(&self) -> bool {
        self.model.is_deterministic()
    }
}

impl SparseMdp {
    /// States reachable from the initial states using only choices in
    /// `choice_mask`
    pub fn reachable_states(&self, choice_mask: &BitVector) -> BitVector {
        let mut reachable = self.initial_states.clone();
        let mut queue: VecDeque<StateId> = reachable.iter_ones().collect();

        while let Some(state) = queue.pop_front() {
            for choice in self.get_rows_for_group(state) {
                if !choice_mask.get(choice) {
                    continue;
                }
                for dst in self.choice_destinations(choice) {
                    if !reachable.get(dst) {
                        reachable.set(dst, true);
                        queue.push_back(dst);
                    }
                }
            }
        }

        reachable
    }

    /// Build the sub-model induced by the choices in `choice_mask`
    ///
    /// Only states reachable from the initial states via selected choices are
    /// kept, numbered in ascending order of their index in the full model. A
    /// kept state without any selected choice becomes a deadlock state. Choice
    /// labels, state labels and state valuations are carried over.
    pub fn restrict_to_choices(&self, choice_mask: &BitVector) -> SubMdp {
        let reachable = self.reachable_states(choice_mask);
        let quotient_state_map: Vec<StateId> = reachable.iter_ones().collect();

        let mut state_to_sub_state = vec![None; self.nr_states()];
        for (sub_state, state) in quotient_state_map.iter().enumerate() {
            state_to_sub_state[*state] = Some(sub_state);
        }

        let mut row_group_indices = Vec::with_capacity(quotient_state_map.len() + 1);
        let mut rows = Vec::new();
        let mut quotient_choice_map = Vec::new();

        for state in quotient_state_map.iter() {
            row_group_indices.push(rows.len());
            for choice in self.get_rows_for_group(*state) {
                if !choice_mask.get(choice) {
                    continue;
                }
                // successors of a selected choice of a reachable state are reachable
                let row = self.rows[choice]
                    .iter()
                    .filter_map(|(dst, p)| state_to_sub_state[*dst].map(|d| (d, *p)))
                    .collect();
                rows.push(row);
                quotient_choice_map.push(choice);
            }
        }
        row_group_indices.push(rows.len());

        let choice_labeling = self.choice_labeling.as_ref().map(|labeling| {
            let mut sub_labeling = ChoiceLabeling::new(quotient_choice_map.len());
            for label in labeling.get_labels() {
                sub_labeling.add_label(label);
            }
            for (sub_choice, choice) in quotient_choice_map.iter().enumerate() {
                for label in labeling.get_labels_of_item(*choice) {
                    sub_labeling.add_label_to_item(label, sub_choice);
                }
            }
            sub_labeling
        });

        let mut state_labeling = StateLabeling::new(quotient_state_map.len());
        for label in self.state_labeling.get_labels() {
            state_labeling.add_label(label);
            if let Some(states) = self.state_labeling.get_items(label) {
                for (sub_state, state) in quotient_state_map.iter().enumerate() {
                    if states.get(*state) {
                        state_labeling.add_label_to_item(label, sub_state);
                    }
                }
            }
        }

        let initial_states = BitVector::from_indices(
            quotient_state_map.len(),
            self.initial_states
                .iter_ones()
                .filter_map(|s| state_to_sub_state[s]),
        );

        let state_valuations = self
            .state_valuations
            .as_ref()
            .map(|v| v.restrict(&quotient_state_map));

        trace!(
            "Restricted model with {} states to {} states and {} choices",
            self.nr_states(),
            quotient_state_map.len(),
            quotient_choice_map.len()
        );

        SubMdp {
            model: SparseMdp {
                row_group_indices,
                rows,
                initial_states,
                choice_labeling,
                state_labeling,
                state_valuations,
            },
            quotient_state_map,
            quotient_choice_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bitvector::BitVector,
        builder::{ChoiceBuilder, MdpBuilder},
        mdp::SparseMdp,
    };

    /// 0 -a-> 1, 0 -b-> 2, 1 -a-> 3, 2 -a-> 2, 3 -a-> 3
    fn chain() -> SparseMdp {
        MdpBuilder::new(4)
            .with_initial_state(0)
            .unwrap()
            .with_choices(vec![
                ChoiceBuilder::new(0).with_label("a").with_transition(1, 1.0).build(),
                ChoiceBuilder::new(0).with_label("b").with_transition(2, 1.0).build(),
                ChoiceBuilder::new(1).with_label("a").with_transition(3, 1.0).build(),
                ChoiceBuilder::new(2).with_label("a").with_transition(2, 1.0).build(),
                ChoiceBuilder::new(3).with_label("a").with_transition(3, 1.0).build(),
            ])
            .unwrap()
            .with_state_label("goal", [3])
            .unwrap()
            .with_state_valuations(vec!["s0".into(), "s1".into(), "s2".into(), "s3".into()])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_reachable_states() {
        let mdp = chain();
        let mask = BitVector::from_indices(5, [0, 2, 4]);
        assert_eq!(
            mdp.reachable_states(&mask).iter_ones().collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
    }

    #[test]
    fn test_restrict_keeps_reachable_fragment() {
        let mdp = chain();
        let mask = BitVector::from_indices(5, [0, 2, 3, 4]);
        let sub = mdp.restrict_to_choices(&mask);

        assert_eq!(sub.quotient_state_map, vec![0, 1, 3]);
        assert_eq!(sub.quotient_choice_map, vec![0, 2, 4]);
        assert_eq!(sub.model.nr_states(), 3);
        assert_eq!(sub.model.get_row(1), &[(2, 1.0)]);
        assert!(sub.is_deterministic());
        assert!(sub.model.initial_states().get(0));
        assert!(sub.model.state_labeling().get_items("goal").unwrap().get(2));
        assert_eq!(sub.model.state_valuations().unwrap().get_string(2), Some("s3"));
        assert!(
            sub.model
                .choice_labeling()
                .unwrap()
                .get_labels_of_item(1)
                .contains("a")
        );
    }

    #[test]
    fn test_restrict_with_deadlock() {
        let mdp = chain();
        let mask = BitVector::from_indices(5, [0]);
        let sub = mdp.restrict_to_choices(&mask);

        assert_eq!(sub.quotient_state_map, vec![0, 1]);
        assert_eq!(sub.model.deadlock_states().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_restrict_nondeterministic() {
        let mdp = chain();
        let sub = mdp.restrict_to_choices(&BitVector::new(5, true));
        assert_eq!(sub.model.nr_states(), 4);
        assert!(!sub.is_deterministic());
    }
}
