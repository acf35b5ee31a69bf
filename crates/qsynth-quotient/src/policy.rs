//! Memoryless policies over the states of a quotient

use std::fmt::{self, Display};

use qsynth_model::{ActionId, StateId};

/// Partial map from quotient states to actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    actions: Vec<Option<ActionId>>,
}

impl Policy {
    /// Policy over `nr_states` states that is undefined everywhere
    pub fn empty(nr_states: usize) -> Self {
        Self {
            actions: vec![None; nr_states],
        }
    }

    /// Action of `state`, if defined
    ///
    /// States beyond the length of the policy are undefined.
    pub fn get(&self, state: StateId) -> Option<ActionId> {
        self.actions.get(state).copied().flatten()
    }

    /// Set or clear the action of `state`
    pub fn set(&mut self, state: StateId, action: Option<ActionId>) {
        self.actions[state] = action;
    }

    /// Number of states
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check whether the policy has no states
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// States where the policy is defined, with their action
    pub fn defined_states(&self) -> impl Iterator<Item = (StateId, ActionId)> + '_ {
        self.actions
            .iter()
            .enumerate()
            .filter_map(|(s, a)| a.map(|a| (s, a)))
    }
}

impl From<Vec<Option<ActionId>>> for Policy {
    fn from(actions: Vec<Option<ActionId>>) -> Self {
        Self { actions }
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defined = self
            .defined_states()
            .map(|(s, a)| format!("{s}->{a}"))
            .collect::<Vec<_>>();
        write!(f, "{{{}}}", defined.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::Policy;

    #[test]
    fn test_policy() {
        let mut policy = Policy::empty(3);
        assert_eq!(policy.len(), 3);
        assert_eq!(policy.defined_states().count(), 0);

        policy.set(2, Some(1));
        policy.set(0, Some(0));
        assert_eq!(policy.get(1), None);
        assert_eq!(policy.get(2), Some(1));
        assert_eq!(policy.to_string(), "{0->0, 2->1}");

        policy.set(2, None);
        assert_eq!(policy, Policy::from(vec![Some(0), None, None]));
    }
}
