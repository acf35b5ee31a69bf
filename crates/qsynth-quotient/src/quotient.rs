//! Quotient container for families of MDPs
//!
//! [`MdpFamilyQuotient`] wraps a quotient MDP whose choices are labeled with
//! actions and colored with the hole options they require. It derives a
//! canonical numbering of the actions once at construction and offers the
//! operations the synthesis loop needs: constructing and repairing policies
//! for a family, applying them, and setting up the game abstraction solver.

use std::borrow::Cow;

use log::{debug, error, trace};
use qsynth_family::{Coloring, DesignSpace, Family};
use qsynth_game_solver::{GameAbstractionSolver, GameSolverError};
use qsynth_model::{ActionId, BitVector, ChoiceId, SparseMdp, StateId, SubMdp};

use crate::{
    config::{InfeasibleActionMode, QuotientConfig},
    error::{NondeterminismError, NondeterministicState, PolicyError, QuotientError},
    labeling::{extract_choice_labels, map_state_action_to_choices, map_state_to_available_actions},
    policy::Policy,
    property::Property,
};

/// Quotient MDP of a family of MDPs with a canonical action labeling
///
/// The derived indices are computed in [`MdpFamilyQuotient::new`] and never
/// change afterwards.
#[derive(Debug, Clone)]
pub struct MdpFamilyQuotient {
    /// The quotient MDP
    quotient_mdp: SparseMdp,
    /// Hole options required by every choice
    coloring: Coloring,
    /// Root family
    design_space: DesignSpace,
    /// Properties to synthesize for
    specification: Vec<Property>,
    /// Configuration
    config: QuotientConfig,
    /// The unique initial state of the quotient
    initial_state: StateId,
    /// Sorted action labels, the index of a label is its action
    action_labels: Vec<String>,
    /// For every choice, the executed action
    choice_to_action: Vec<ActionId>,
    /// For every state and every action, the choices executing the action
    state_action_choices: Vec<Vec<Vec<ChoiceId>>>,
    /// For every state, the actions with at least one choice
    state_to_actions: Vec<Vec<ActionId>>,
}

impl MdpFamilyQuotient {
    /// Create a quotient container
    ///
    /// Fails if the MDP does not label every choice with exactly one action,
    /// does not have exactly one initial state, or if the coloring does not
    /// cover exactly the choices of the MDP.
    pub fn new(
        quotient_mdp: SparseMdp,
        coloring: Coloring,
        specification: Vec<Property>,
        config: QuotientConfig,
    ) -> Result<Self, QuotientError> {
        if coloring.nr_choices() != quotient_mdp.nr_choices() {
            return Err(QuotientError::ColoringMismatch {
                expected: quotient_mdp.nr_choices(),
                actual: coloring.nr_choices(),
            });
        }

        let nr_initial = quotient_mdp.initial_states().count_ones();
        let initial_state = match quotient_mdp.initial_states().iter_ones().next() {
            Some(s) if nr_initial == 1 => s,
            _ => return Err(QuotientError::InitialStates(nr_initial)),
        };

        let (action_labels, choice_to_action) = extract_choice_labels(&quotient_mdp)?;
        let state_action_choices =
            map_state_action_to_choices(&quotient_mdp, action_labels.len(), &choice_to_action);
        let state_to_actions = map_state_to_available_actions(&state_action_choices);
        let design_space = coloring.design_space();

        debug!(
            "Built quotient with {} states, {} choices and {} actions ({}); design space of size {}",
            quotient_mdp.nr_states(),
            quotient_mdp.nr_choices(),
            action_labels.len(),
            action_labels.join(", "),
            design_space.size()
        );

        Ok(Self {
            quotient_mdp,
            coloring,
            design_space,
            specification,
            config,
            initial_state,
            action_labels,
            choice_to_action,
            state_action_choices,
            state_to_actions,
        })
    }

    /// The quotient MDP
    pub fn quotient_mdp(&self) -> &SparseMdp {
        &self.quotient_mdp
    }

    /// Coloring of the quotient choices
    pub fn coloring(&self) -> &Coloring {
        &self.coloring
    }

    /// Root family of the quotient
    pub fn design_space(&self) -> &DesignSpace {
        &self.design_space
    }

    /// Properties to synthesize for
    pub fn specification(&self) -> &[Property] {
        &self.specification
    }

    /// Configuration of the quotient
    pub fn config(&self) -> &QuotientConfig {
        &self.config
    }

    /// The unique initial state
    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    /// Number of distinct actions
    pub fn num_actions(&self) -> usize {
        self.action_labels.len()
    }

    /// Sorted action labels
    pub fn action_labels(&self) -> &[String] {
        &self.action_labels
    }

    /// Action executed by every choice
    pub fn choice_to_action(&self) -> &[ActionId] {
        &self.choice_to_action
    }

    /// Choices of `state` that execute `action`
    pub fn state_action_choices(&self, state: StateId, action: ActionId) -> &[ChoiceId] {
        &self.state_action_choices[state][action]
    }

    /// Actions with at least one choice in `state`, in ascending order
    pub fn state_to_actions(&self, state: StateId) -> &[ActionId] {
        &self.state_to_actions[state]
    }

    /// Policy that is undefined in every state of the quotient
    pub fn empty_policy(&self) -> Policy {
        Policy::empty(self.quotient_mdp.nr_states())
    }

    /// Translate a memoryless scheduler of a sub-model into a policy of the
    /// quotient
    ///
    /// `state_to_choice` maps every state of `sub_mdp.model` to the selected
    /// choice of the sub-model, if any. States of the quotient that are not
    /// part of the sub-model stay undefined.
    pub fn scheduler_to_policy(
        &self,
        state_to_choice: &[Option<ChoiceId>],
        sub_mdp: &SubMdp,
    ) -> Policy {
        let mut policy = self.empty_policy();
        for (sub_state, choice) in state_to_choice.iter().enumerate() {
            if let Some(choice) = choice {
                let state = sub_mdp.quotient_state_map[sub_state];
                let quotient_choice = sub_mdp.quotient_choice_map[*choice];
                policy.set(state, Some(self.choice_to_action[quotient_choice]));
            }
        }
        policy
    }

    /// Apply `policy` to the quotient restricted to `family`
    ///
    /// Explores the states reachable from the initial state. In every reached
    /// state where `policy` is undefined, the first available action is
    /// picked. Every choice of the resolved action that is legal in `family`
    /// is marked and its successors are explored.
    ///
    /// A reached state without any action is a leaf: its policy stays
    /// undefined and nothing is marked.
    ///
    /// Returns the repaired policy together with the mask of marked choices.
    /// The repaired policy agrees with `policy` on all states that are not
    /// reached. If the family does not carry its legal choices yet, they are
    /// computed from the coloring.
    pub fn fix_policy_for_family(
        &self,
        family: &Family,
        policy: &Policy,
    ) -> Result<(Policy, BitVector), PolicyError> {
        if policy.len() != self.quotient_mdp.nr_states() {
            return Err(PolicyError::PolicySizeMismatch {
                expected: self.quotient_mdp.nr_states(),
                actual: policy.len(),
            });
        }
        if let Some((state, action)) = policy
            .defined_states()
            .find(|(_, action)| *action >= self.num_actions())
        {
            return Err(PolicyError::UnknownAction {
                state,
                action,
                num_actions: self.num_actions(),
            });
        }

        let selected = match family.selected_actions_bv() {
            Some(bv) => Cow::Borrowed(bv),
            None => Cow::Owned(self.coloring.select_compatible(family)?),
        };

        let mut choice_mask = BitVector::new(self.quotient_mdp.nr_choices(), false);
        let mut policy_fixed = policy.clone();

        let mut state_visited = BitVector::new(self.quotient_mdp.nr_states(), false);
        state_visited.set(self.initial_state, true);
        let mut state_queue = vec![self.initial_state];

        while let Some(state) = state_queue.pop() {
            let action = match policy.get(state) {
                Some(action) => action,
                None => match self.state_to_actions[state].first() {
                    Some(action) => *action,
                    None => {
                        trace!("State {state} has no action");
                        continue;
                    }
                },
            };
            policy_fixed.set(state, Some(action));

            let mut legal_choices = 0;
            for &choice in self.state_action_choices[state][action].iter() {
                if !selected.get(choice) {
                    continue;
                }
                legal_choices += 1;
                choice_mask.set(choice, true);
                for dst in self.quotient_mdp.choice_destinations(choice) {
                    if !state_visited.get(dst) {
                        state_visited.set(dst, true);
                        state_queue.push(dst);
                    }
                }
            }

            if legal_choices == 0 {
                trace!("Action {action} has no legal choice in state {state}");
                if self.config.infeasible_action() == InfeasibleActionMode::Reject {
                    return Err(PolicyError::NoLegalChoice { state, action });
                }
            }
        }

        debug!(
            "Fixed policy for family {family}: {} reachable states, {} choices",
            state_visited.count_ones(),
            choice_mask.count_ones()
        );
        Ok((policy_fixed, choice_mask))
    }

    /// Apply `policy` to `family` and build the induced sub-model
    pub fn apply_policy_to_family(
        &self,
        family: &Family,
        policy: &Policy,
    ) -> Result<SubMdp, PolicyError> {
        let (_, choice_mask) = self.fix_policy_for_family(family, policy)?;
        Ok(self.build_from_choice_mask(&choice_mask))
    }

    /// Sub-model of the quotient induced by the choices in `choice_mask`
    pub fn build_from_choice_mask(&self, choice_mask: &BitVector) -> SubMdp {
        self.quotient_mdp.restrict_to_choices(choice_mask)
    }

    /// Check that a sub-model obtained by applying a policy to a singleton
    /// family is deterministic
    ///
    /// Every state with more than one choice is logged together with the
    /// action labels of its choices and reported in the returned error.
    pub fn assert_mdp_is_deterministic(
        &self,
        sub_mdp: &SubMdp,
        family: &Family,
    ) -> Result<(), NondeterminismError> {
        if sub_mdp.is_deterministic() {
            return Ok(());
        }

        error!("Applied policy to a singleton family {family} and obtained MDP with nondeterminism");
        let model = &sub_mdp.model;
        let mut states = Vec::new();
        for sub_state in 0..model.nr_states() {
            let choices = model.get_rows_for_group(sub_state);
            if choices.len() <= 1 {
                continue;
            }

            let state = sub_mdp.quotient_state_map[sub_state];
            let valuation = self
                .quotient_mdp
                .state_valuations()
                .and_then(|v| v.get_string(state))
                .map(|v| v.replace([' ', '\t'], ""))
                .unwrap_or_else(|| state.to_string());
            let actions = choices
                .map(|c| {
                    let action = self.choice_to_action[sub_mdp.quotient_choice_map[c]];
                    self.action_labels[action].clone()
                })
                .collect::<Vec<_>>();

            error!(
                "The following state {valuation} has multiple actions [{}]",
                actions.join(", ")
            );
            states.push(NondeterministicState {
                state,
                valuation,
                actions,
            });
        }

        Err(NondeterminismError {
            family: family.to_string(),
            states,
        })
    }

    /// Set up the game abstraction solver for `prop`
    pub fn build_game_abstraction_solver(
        &self,
        prop: &Property,
    ) -> Result<GameAbstractionSolver<'_>, GameSolverError> {
        GameAbstractionSolver::new(
            &self.quotient_mdp,
            self.num_actions(),
            self.choice_to_action.clone(),
            prop.get_target_label(),
            self.config.model_checking_precision(),
        )
    }
}

#[cfg(test)]
mod tests {
    use qsynth_family::{Coloring, Hole};
    use qsynth_model::{
        BitVector,
        builder::{ChoiceBuilder, MdpBuilder},
    };

    use crate::{
        config::{InfeasibleActionMode, QuotientConfig},
        error::{PolicyError, QuotientError},
        policy::Policy,
        property::{OptimizationDirection, Property},
    };

    use super::MdpFamilyQuotient;

    /// state 0: `go` to 1 (hole h=0) or `go` to 2 (h=1), `stay` in 0
    /// state 1: `stay`, state 2: `stay`
    fn quotient(config: QuotientConfig) -> MdpFamilyQuotient {
        let mdp = MdpBuilder::new(3)
            .with_initial_state(0)
            .unwrap()
            .with_state_label("goal", [1])
            .unwrap()
            .with_choices(vec![
                ChoiceBuilder::new(0).with_label("go").with_transition(1, 1.0).build(),
                ChoiceBuilder::new(0).with_label("go").with_transition(2, 1.0).build(),
                ChoiceBuilder::new(0).with_label("stay").with_transition(0, 1.0).build(),
                ChoiceBuilder::new(1).with_label("stay").with_transition(1, 1.0).build(),
                ChoiceBuilder::new(2).with_label("stay").with_transition(2, 1.0).build(),
            ])
            .unwrap()
            .with_state_valuations(vec!["[x=0]".into(), "[x=1]".into(), "[x = 2]".into()])
            .unwrap()
            .build()
            .unwrap();
        let coloring = Coloring::new(
            vec![Hole::new("h", vec!["left", "right"])],
            vec![vec![(0, 0)], vec![(0, 1)], vec![], vec![], vec![]],
        )
        .unwrap();
        let spec = vec![Property::new(
            "reach",
            "goal",
            OptimizationDirection::Maximize,
            0.9,
        )];
        MdpFamilyQuotient::new(mdp, coloring, spec, config).unwrap()
    }

    #[test]
    fn test_derived_indices() {
        let q = quotient(QuotientConfig::default());
        assert_eq!(q.action_labels(), &["go".to_string(), "stay".to_string()]);
        assert_eq!(q.choice_to_action(), &[0, 0, 1, 1, 1]);
        assert_eq!(q.state_action_choices(0, 0), &[0, 1]);
        assert_eq!(q.state_action_choices(0, 1), &[2]);
        assert_eq!(q.state_to_actions(0), &[0, 1]);
        assert_eq!(q.state_to_actions(1), &[1]);
        assert_eq!(q.initial_state(), 0);
    }

    #[test]
    fn test_fix_policy_whole_design_space() {
        let q = quotient(QuotientConfig::default());
        let family = q.design_space().family().clone();
        let (policy, mask) = q.fix_policy_for_family(&family, &q.empty_policy()).unwrap();

        assert_eq!(policy, Policy::from(vec![Some(0), Some(1), Some(1)]));
        assert_eq!(mask, BitVector::from_indices(5, [0, 1, 3, 4]));
    }

    #[test]
    fn test_fix_policy_keeps_unreached_states() {
        let q = quotient(QuotientConfig::default());
        let family = q.design_space().family().assume_hole_options(0, [0]).unwrap();
        let input = Policy::from(vec![None, None, Some(0)]);
        let (policy, mask) = q.fix_policy_for_family(&family, &input).unwrap();

        // state 2 is not reached and keeps its (infeasible) action
        assert_eq!(policy, Policy::from(vec![Some(0), Some(1), Some(0)]));
        assert_eq!(mask, BitVector::from_indices(5, [0, 3]));
    }

    #[test]
    fn test_infeasible_action_modes() {
        // state 2 has only `stay`, forcing `go` there is infeasible
        let policy = Policy::from(vec![Some(0), Some(1), Some(0)]);

        let q = quotient(QuotientConfig::default());
        let family = q.design_space().family().assume_hole_options(0, [1]).unwrap();
        let (fixed, mask) = q.fix_policy_for_family(&family, &policy).unwrap();
        assert_eq!(fixed, policy);
        assert_eq!(mask, BitVector::from_indices(5, [1]));

        let q = quotient(QuotientConfig::new(1e-4, InfeasibleActionMode::Reject));
        assert_eq!(
            q.fix_policy_for_family(&family, &policy).unwrap_err(),
            PolicyError::NoLegalChoice {
                state: 2,
                action: 0
            }
        );
    }

    #[test]
    fn test_invalid_policies_are_rejected() {
        let q = quotient(QuotientConfig::default());
        let family = q.design_space().family().clone();

        assert_eq!(
            q.fix_policy_for_family(&family, &Policy::empty(2)).unwrap_err(),
            PolicyError::PolicySizeMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            q.fix_policy_for_family(&family, &Policy::from(vec![None, Some(2), None]))
                .unwrap_err(),
            PolicyError::UnknownAction {
                state: 1,
                action: 2,
                num_actions: 2
            }
        );
    }

    #[test]
    fn test_state_without_actions_is_a_leaf() {
        // the goal 1 has no choice at all
        let mdp = MdpBuilder::new(2)
            .with_initial_state(0)
            .unwrap()
            .with_state_label("goal", [1])
            .unwrap()
            .with_choice(ChoiceBuilder::new(0).with_label("go").with_transition(1, 1.0).build())
            .unwrap()
            .build()
            .unwrap();
        let coloring = Coloring::new(vec![], vec![vec![]]).unwrap();
        let q = MdpFamilyQuotient::new(mdp, coloring, vec![], QuotientConfig::default()).unwrap();
        let family = q.design_space().family().clone();

        let (policy, mask) = q.fix_policy_for_family(&family, &q.empty_policy()).unwrap();
        assert_eq!(policy, Policy::from(vec![Some(0), None]));
        assert_eq!(mask, BitVector::from_indices(1, [0]));

        let sub = q.apply_policy_to_family(&family, &policy).unwrap();
        assert_eq!(sub.model.nr_states(), 2);
        assert!(q.assert_mdp_is_deterministic(&sub, &family).is_ok());
    }

    #[test]
    fn test_scheduler_to_policy() {
        let q = quotient(QuotientConfig::default());
        let sub = q.build_from_choice_mask(&BitVector::from_indices(5, [1, 2, 4]));
        // sub-model states: 0 and 2; choices: 1, 2 (state 0) and 4 (state 2)
        assert_eq!(sub.quotient_state_map, vec![0, 2]);
        let policy = q.scheduler_to_policy(&[Some(1), Some(2)], &sub);
        assert_eq!(policy, Policy::from(vec![Some(1), None, Some(1)]));
    }

    #[test]
    fn test_nondeterminism_is_reported_per_state() {
        let q = quotient(QuotientConfig::default());
        let family = q.design_space().family().assume_hole_options(0, [1]).unwrap();
        let sub = q.build_from_choice_mask(&BitVector::from_indices(5, [1, 2, 4]));

        let err = q.assert_mdp_is_deterministic(&sub, &family).unwrap_err();
        assert_eq!(err.family, "[h=right]");
        assert_eq!(err.states.len(), 1);
        assert_eq!(err.states[0].state, 0);
        assert_eq!(err.states[0].valuation, "[x=0]");
        assert_eq!(err.states[0].actions, vec!["go", "stay"]);

        let sub = q.apply_policy_to_family(&family, &q.empty_policy()).unwrap();
        assert!(q.assert_mdp_is_deterministic(&sub, &family).is_ok());
    }

    #[test]
    fn test_game_solver_factory() {
        let q = quotient(QuotientConfig::new(1e-8, InfeasibleActionMode::Accept));
        let solver = q.build_game_abstraction_solver(&q.specification()[0]).unwrap();
        assert_eq!(solver.num_actions(), 2);
        assert_eq!(solver.precision(), 1e-8);
        assert_eq!(solver.target_states(), &BitVector::from_indices(3, [1]));

        let missing = Property::new("p", "nowhere", OptimizationDirection::Minimize, 0.1);
        assert!(q.build_game_abstraction_solver(&missing).is_err());
    }

    #[test]
    fn test_construction_errors() {
        let mdp = MdpBuilder::new(2)
            .with_initial_state(0)
            .unwrap()
            .with_initial_state(1)
            .unwrap()
            .with_choice(ChoiceBuilder::new(0).with_label("a").with_transition(1, 1.0).build())
            .unwrap()
            .build()
            .unwrap();
        let coloring = Coloring::new(vec![], vec![vec![]]).unwrap();
        assert_eq!(
            MdpFamilyQuotient::new(mdp.clone(), coloring, vec![], QuotientConfig::default())
                .unwrap_err(),
            QuotientError::InitialStates(2)
        );

        let coloring = Coloring::new(vec![], vec![vec![], vec![]]).unwrap();
        assert_eq!(
            MdpFamilyQuotient::new(mdp, coloring, vec![], QuotientConfig::default())
                .unwrap_err(),
            QuotientError::ColoringMismatch {
                expected: 1,
                actual: 2
            }
        );
    }
}
