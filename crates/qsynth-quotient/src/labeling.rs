//! Canonical action labeling of a quotient MDP
//!
//! The choices of a quotient carry exactly one label each. The functions in
//! this module number the labels in a canonical way and derive the tables that
//! the quotient container needs to look up the choices of an action in a state
//! in constant time.

use std::collections::HashMap;

use qsynth_model::{ActionId, ChoiceId, SparseMdp};

use crate::error::QuotientError;

/// Extract the action labels of `mdp` and the action executed by every choice
///
/// The labels are sorted lexicographically before numbering them, since the
/// labeling store enumerates its labels in no particular order and the
/// numbering must be identical across runs.
///
/// Fails if the model has no choice labeling or if a choice carries no label
/// or more than one label.
pub fn extract_choice_labels(
    mdp: &SparseMdp,
) -> Result<(Vec<String>, Vec<ActionId>), QuotientError> {
    let labeling = mdp
        .choice_labeling()
        .ok_or(QuotientError::MissingChoiceLabeling)?;

    let mut action_labels: Vec<String> = labeling
        .get_labels()
        .into_iter()
        .map(|l| l.to_string())
        .collect();
    action_labels.sort();

    let label_to_action: HashMap<&str, ActionId> = action_labels
        .iter()
        .enumerate()
        .map(|(action, label)| (label.as_str(), action))
        .collect();

    let mut choice_to_action = vec![0; mdp.nr_choices()];
    for state in 0..mdp.nr_states() {
        for choice in mdp.get_rows_for_group(state) {
            let labels = labeling.get_labels_of_item(choice);
            match labels.iter().next() {
                Some(label) if labels.len() == 1 => {
                    choice_to_action[choice] = label_to_action[label];
                }
                _ => {
                    let mut labels: Vec<String> =
                        labels.iter().map(|l| l.to_string()).collect();
                    labels.sort();
                    return Err(QuotientError::NonCanonicalChoiceLabel { choice, labels });
                }
            }
        }
    }

    Ok((action_labels, choice_to_action))
}

/// For every state and every action, the choices of the state executing the
/// action
pub fn map_state_action_to_choices(
    mdp: &SparseMdp,
    num_actions: usize,
    choice_to_action: &[ActionId],
) -> Vec<Vec<Vec<ChoiceId>>> {
    (0..mdp.nr_states())
        .map(|state| {
            let mut action_choices = vec![Vec::new(); num_actions];
            for choice in mdp.get_rows_for_group(state) {
                action_choices[choice_to_action[choice]].push(choice);
            }
            action_choices
        })
        .collect()
}

/// For every state, the actions with at least one choice, in ascending order
pub fn map_state_to_available_actions(
    state_action_choices: &[Vec<Vec<ChoiceId>>],
) -> Vec<Vec<ActionId>> {
    state_action_choices
        .iter()
        .map(|action_choices| {
            action_choices
                .iter()
                .enumerate()
                .filter(|(_, choices)| !choices.is_empty())
                .map(|(action, _)| action)
                .collect()
        })
        .collect()
}
