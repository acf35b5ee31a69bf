//! Synthesis of policies for sub-families of a quotient
//!
//! [`PolicySynthesizer`] explores the design space of a quotient by
//! refinement. For every family it solves the game abstraction twice:
//!
//! - with the family playing against the policy, the solver bounds the
//!   probability its policy guarantees for every member of the family; if the
//!   bound satisfies the property, the family is solved by that policy,
//! - with the family cooperating, the solver bounds the probability of every
//!   member; if even this bound violates the property, no member of the family
//!   satisfies it.
//!
//! Which end of the computed interval is used depends on the direction of the
//! property, so that value iteration stopping early never certifies a family
//! that violates it.
//!
//! Families that are neither solved nor refuted are split on their first hole
//! that still allows multiple options.

use std::fmt::{self, Display};

use log::{debug, info};
use qsynth_family::{Family, FamilyError};
use qsynth_game_solver::{GameAbstractionSolver, GameSolverError};
use qsynth_model::BitVector;

use crate::{
    config::{SynthesisConfig, SynthesisMethod},
    error::{NondeterminismError, PolicyError},
    policy::Policy,
    property::Property,
    quotient::MdpFamilyQuotient,
};

/// A family together with a policy satisfying the property in every member
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedFamily {
    /// The solved family
    pub family: Family,
    /// Policy that works for every member of `family`
    pub policy: Policy,
    /// Bound on the probability `policy` achieves in the worst member: a lower
    /// bound for maximizing properties, an upper bound for minimizing ones
    pub value: f64,
}

/// Outcome of a synthesis run for one property
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// The property synthesized for
    pub property: Property,
    /// Families solved by a single policy
    pub solved: Vec<SolvedFamily>,
    /// Families in which no member satisfies the property
    pub unsatisfiable: Vec<Family>,
    /// Number of families that were analyzed
    pub families_explored: usize,
}

impl SynthesisResult {
    /// Number of members of the design space covered by solved families
    pub fn solved_members(&self) -> u64 {
        self.solved
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.family.size()))
    }
}

impl Display for SynthesisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} solved families ({} members), {} unsatisfiable families, {} families explored",
            self.property,
            self.solved.len(),
            self.solved_members(),
            self.unsatisfiable.len(),
            self.families_explored
        )?;
        for solved in self.solved.iter() {
            writeln!(
                f,
                "  {} with value {}: {}",
                solved.family, solved.value, solved.policy
            )?;
        }
        Ok(())
    }
}

/// Policy synthesis by game-based refinement of the design space
#[derive(Debug, Clone)]
pub struct PolicySynthesizer<'q> {
    quotient: &'q MdpFamilyQuotient,
    config: SynthesisConfig,
}

impl<'q> PolicySynthesizer<'q> {
    /// Create a new synthesizer for `quotient`
    pub fn new(quotient: &'q MdpFamilyQuotient, config: SynthesisConfig) -> Self {
        Self { quotient, config }
    }

    /// Synthesize policies for `prop`
    ///
    /// Unless the search is configured to be incomplete, every member of the
    /// design space ends up either in a solved or in an unsatisfiable family.
    pub fn synthesize(&self, prop: &Property) -> Result<SynthesisResult, SynthesisError> {
        let mut solver = self.quotient.build_game_abstraction_solver(prop)?;
        let mut result = SynthesisResult {
            property: prop.clone(),
            solved: Vec::new(),
            unsatisfiable: Vec::new(),
            families_explored: 0,
        };

        info!(
            "Synthesizing policies for {prop} using {}",
            self.config.method()
        );
        match self.config.method() {
            SynthesisMethod::OneByOne => self.explore_members(&mut solver, prop, &mut result)?,
            SynthesisMethod::AbstractionRefinement => {
                self.explore_families(&mut solver, prop, &mut result)?
            }
        }

        info!("{result}");
        Ok(result)
    }

    /// Analyze every member of the design space separately
    fn explore_members(
        &self,
        solver: &mut GameAbstractionSolver<'_>,
        prop: &Property,
        result: &mut SynthesisResult,
    ) -> Result<(), SynthesisError> {
        let root = self.quotient.design_space().family();
        for member in root.members() {
            let mut family = root.assume_assignment(&member)?;
            result.families_explored += 1;

            match self.solve_robust(solver, prop, &mut family)? {
                Some((policy, value)) => {
                    info!("Member {family} is solved with value {value}");
                    result.solved.push(SolvedFamily {
                        family,
                        policy,
                        value,
                    });
                    if self.config.incomplete_search() {
                        break;
                    }
                }
                None => {
                    debug!("Member {family} is unsatisfiable");
                    result.unsatisfiable.push(family);
                }
            }
        }
        Ok(())
    }

    /// Refine the design space until every family is solved or refuted
    fn explore_families(
        &self,
        solver: &mut GameAbstractionSolver<'_>,
        prop: &Property,
        result: &mut SynthesisResult,
    ) -> Result<(), SynthesisError> {
        let player1_maximizing = prop.direction().is_maximizing();

        let mut families = vec![self.quotient.design_space().family().clone()];
        while let Some(mut family) = families.pop() {
            result.families_explored += 1;

            if let Some((policy, value)) = self.solve_robust(solver, prop, &mut family)? {
                info!("Family {family} is solved with value {value}");
                result.solved.push(SolvedFamily {
                    family,
                    policy,
                    value,
                });
                if self.config.incomplete_search() {
                    break;
                }
                continue;
            }

            let Some(selected) = family.selected_actions_bv() else {
                continue;
            };
            solver.solve(selected, player1_maximizing, player1_maximizing);
            let bound = match player1_maximizing {
                true => solver.solution_upper_bound,
                false => solver.solution_value,
            };
            if !prop.satisfied_by(bound) {
                debug!("Family {family} is unsatisfiable, best member achieves {bound}");
                result.unsatisfiable.push(family);
                continue;
            }

            match family
                .first_splittable_hole()
                .and_then(|hole| family.split(hole))
            {
                Some((left, right)) => {
                    debug!("Splitting family {family} into {left} and {right}");
                    families.push(right);
                    families.push(left);
                }
                None => {
                    debug!("Singleton family {family} is not solved within precision");
                    result.unsatisfiable.push(family);
                }
            }
        }
        Ok(())
    }

    /// Solve the game of `family` with the family playing against the policy
    ///
    /// Computes the legal choices of `family`. Returns the repaired policy and
    /// its guaranteed value if that value satisfies `prop`. The model induced
    /// by a singleton family has to be deterministic.
    fn solve_robust(
        &self,
        solver: &mut GameAbstractionSolver<'_>,
        prop: &Property,
        family: &mut Family,
    ) -> Result<Option<(Policy, f64)>, SynthesisError> {
        let quotient = self.quotient;
        let player1_maximizing = prop.direction().is_maximizing();
        let player2_adversarial = prop.direction().negate().is_maximizing();

        let selected = quotient.coloring().select_compatible(family)?;
        solver.solve(&selected, player1_maximizing, player2_adversarial);
        family.set_selected_actions_bv(selected);

        // the bound on the side of the threshold the policy is judged by
        let robust_value = match player1_maximizing {
            true => solver.solution_value,
            false => solver.solution_upper_bound,
        };
        debug!("Family {family}: robust value {robust_value}");
        if !prop.satisfied_by(robust_value) {
            return Ok(None);
        }

        let Some(selected) = family.selected_actions_bv() else {
            return Ok(None);
        };
        let policy = self.complete_policy(
            solver.solution_state_to_player1_action.clone().into(),
            selected,
        );
        let (policy, _) = quotient.fix_policy_for_family(family, &policy)?;
        if family.is_singleton() {
            let sub_mdp = quotient.apply_policy_to_family(family, &policy)?;
            quotient.assert_mdp_is_deterministic(&sub_mdp, family)?;
        }
        Ok(Some((policy, robust_value)))
    }

    /// Define `policy` in the states where the game left it open, using the
    /// first action with a selected choice
    fn complete_policy(&self, mut policy: Policy, selected: &BitVector) -> Policy {
        for state in 0..policy.len() {
            if policy.get(state).is_some() {
                continue;
            }
            let action = self
                .quotient
                .state_to_actions(state)
                .iter()
                .find(|a| {
                    self.quotient
                        .state_action_choices(state, **a)
                        .iter()
                        .any(|c| selected.get(*c))
                })
                .copied();
            policy.set(state, action);
        }
        policy
    }
}

/// Error that can occur during synthesis
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// The game abstraction solver could not be set up
    GameSolver(GameSolverError),
    /// The legal choices of a family could not be computed
    Family(FamilyError),
    /// Policy repair failed
    Policy(PolicyError),
    /// A solved singleton family yielded a nondeterministic model
    Nondeterminism(NondeterminismError),
}

impl std::error::Error for SynthesisError {}

impl Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::GameSolver(err) => write!(f, "Game abstraction solver: {err}"),
            SynthesisError::Family(err) => write!(f, "Design space: {err}"),
            SynthesisError::Policy(err) => write!(f, "Policy repair: {err}"),
            SynthesisError::Nondeterminism(err) => write!(f, "{err}"),
        }
    }
}

impl From<GameSolverError> for SynthesisError {
    fn from(value: GameSolverError) -> Self {
        SynthesisError::GameSolver(value)
    }
}

impl From<FamilyError> for SynthesisError {
    fn from(value: FamilyError) -> Self {
        SynthesisError::Family(value)
    }
}

impl From<PolicyError> for SynthesisError {
    fn from(value: PolicyError) -> Self {
        SynthesisError::Policy(value)
    }
}

impl From<NondeterminismError> for SynthesisError {
    fn from(value: NondeterminismError) -> Self {
        SynthesisError::Nondeterminism(value)
    }
}

#[cfg(test)]
mod tests {
    use qsynth_family::{Coloring, Hole};
    use qsynth_model::builder::{ChoiceBuilder, MdpBuilder};

    use crate::{
        config::{QuotientConfig, SynthesisConfig, SynthesisMethod},
        policy::Policy,
        property::{OptimizationDirection, Property},
        quotient::MdpFamilyQuotient,
    };

    use super::PolicySynthesizer;

    /// From state 0, action `go` reaches the goal (1) with probability 0.3,
    /// 0.6 or 0.95 depending on hole `h`; `wait` loops.
    fn quotient() -> MdpFamilyQuotient {
        let mut choices = Vec::new();
        for p in [0.3, 0.6, 0.95] {
            choices.push(
                ChoiceBuilder::new(0)
                    .with_label("go")
                    .with_transition(1, p)
                    .with_transition(2, 1.0 - p)
                    .build(),
            );
        }
        choices.push(ChoiceBuilder::new(0).with_label("wait").with_transition(0, 1.0).build());
        choices.push(ChoiceBuilder::new(1).with_label("wait").with_transition(1, 1.0).build());
        choices.push(ChoiceBuilder::new(2).with_label("wait").with_transition(2, 1.0).build());

        let mdp = MdpBuilder::new(3)
            .with_initial_state(0)
            .unwrap()
            .with_state_label("goal", [1])
            .unwrap()
            .with_choices(choices)
            .unwrap()
            .build()
            .unwrap();
        let coloring = Coloring::new(
            vec![Hole::new("h", vec!["low", "mid", "high"])],
            vec![vec![(0, 0)], vec![(0, 1)], vec![(0, 2)], vec![], vec![], vec![]],
        )
        .unwrap();
        MdpFamilyQuotient::new(mdp, coloring, vec![], QuotientConfig::default()).unwrap()
    }

    #[test]
    fn test_synthesis_splits_design_space() {
        let q = quotient();
        let prop = Property::new("reach", "goal", OptimizationDirection::Maximize, 0.5);
        let result = PolicySynthesizer::new(&q, SynthesisConfig::default())
            .synthesize(&prop)
            .unwrap();

        // h=low fails, h=mid and h=high are solved
        assert_eq!(result.solved_members(), 2);
        assert_eq!(
            result.unsatisfiable.iter().map(|f| f.size()).sum::<u64>(),
            1
        );
        for solved in result.solved.iter() {
            assert_eq!(solved.policy.get(0), Some(0));
            assert!(solved.value >= 0.5);
        }
    }

    #[test]
    fn test_robust_family_is_solved_without_splitting() {
        let q = quotient();
        let prop = Property::new("reach", "goal", OptimizationDirection::Maximize, 0.2);
        let result = PolicySynthesizer::new(&q, SynthesisConfig::default())
            .synthesize(&prop)
            .unwrap();

        assert_eq!(result.families_explored, 1);
        assert_eq!(result.solved.len(), 1);
        assert!((result.solved[0].value - 0.3).abs() < 1e-3);
    }

    #[test]
    fn test_unsatisfiable_design_space() {
        let q = quotient();
        let prop = Property::new("reach", "goal", OptimizationDirection::Maximize, 0.99);
        let result = PolicySynthesizer::new(&q, SynthesisConfig::default())
            .synthesize(&prop)
            .unwrap();

        assert!(result.solved.is_empty());
        assert_eq!(result.families_explored, 1);
        assert_eq!(result.unsatisfiable.len(), 1);
    }

    #[test]
    fn test_minimizing_with_incomplete_search() {
        let q = quotient();
        // waiting forever never reaches the goal
        let prop = Property::new("avoid", "goal", OptimizationDirection::Minimize, 0.1);
        let result = PolicySynthesizer::new(&q, SynthesisConfig::new(true, SynthesisMethod::AbstractionRefinement))
            .synthesize(&prop)
            .unwrap();

        assert_eq!(result.solved.len(), 1);
        assert_eq!(result.solved[0].policy.get(0), Some(1));
        assert!(result.solved[0].value.abs() < 1e-9);
    }

    #[test]
    fn test_one_by_one_checks_every_member() {
        let q = quotient();
        let prop = Property::new("reach", "goal", OptimizationDirection::Maximize, 0.5);
        let config = SynthesisConfig::new(false, SynthesisMethod::OneByOne);
        let result = PolicySynthesizer::new(&q, config).synthesize(&prop).unwrap();

        assert_eq!(result.families_explored, 3);
        assert_eq!(
            result
                .solved
                .iter()
                .map(|s| s.family.to_string())
                .collect::<Vec<_>>(),
            vec!["[h=mid]", "[h=high]"]
        );
        assert_eq!(result.unsatisfiable.len(), 1);
        assert_eq!(result.unsatisfiable[0].to_string(), "[h=low]");
        for solved in result.solved.iter() {
            assert_eq!(solved.policy.get(0), Some(0));
        }

        let config = SynthesisConfig::new(true, SynthesisMethod::OneByOne);
        let result = PolicySynthesizer::new(&q, config).synthesize(&prop).unwrap();
        assert_eq!(result.families_explored, 2);
        assert_eq!(result.solved_members(), 1);
    }

    /// State 0 executes `go`, returning to itself with probability `stay` and
    /// reaching the goal 1 otherwise; the goal has no choice
    fn looping_quotient(stay: f64) -> MdpFamilyQuotient {
        let mdp = MdpBuilder::new(2)
            .with_initial_state(0)
            .unwrap()
            .with_state_label("goal", [1])
            .unwrap()
            .with_choice(
                ChoiceBuilder::new(0)
                    .with_label("go")
                    .with_transitions([(0, stay), (1, 1.0 - stay)].into_iter().filter(|(_, p)| *p > 0.0))
                    .build(),
            )
            .unwrap()
            .build()
            .unwrap();
        let coloring = Coloring::new(vec![], vec![vec![]]).unwrap();
        MdpFamilyQuotient::new(mdp, coloring, vec![], QuotientConfig::default()).unwrap()
    }

    #[test]
    fn test_slowly_converging_loop_is_not_certified() {
        // the goal is reached almost surely, value iteration from below stalls
        // around 0.9 with the default precision
        let q = looping_quotient(0.999);
        let prop = Property::new("avoid", "goal", OptimizationDirection::Minimize, 0.95);
        let result = PolicySynthesizer::new(&q, SynthesisConfig::default())
            .synthesize(&prop)
            .unwrap();

        assert!(result.solved.is_empty());
        assert_eq!(result.unsatisfiable.len(), 1);
        assert_eq!(result.solved_members(), 0);
    }

    #[test]
    fn test_goal_without_choices() {
        let q = looping_quotient(0.0);
        let prop = Property::new("reach", "goal", OptimizationDirection::Maximize, 0.9);
        let result = PolicySynthesizer::new(&q, SynthesisConfig::default())
            .synthesize(&prop)
            .unwrap();

        assert_eq!(result.solved_members(), 1);
        assert_eq!(result.solved[0].policy, Policy::from(vec![Some(0), None]));
        assert_eq!(result.solved[0].value, 1.0);
    }
}
