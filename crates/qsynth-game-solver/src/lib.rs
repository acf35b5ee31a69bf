//! Game abstraction of quotient MDPs
//!
//! The quotient of a family of MDPs can be viewed as a two-player stochastic
//! game: in every state player 1 (the policy) picks an action, then player 2
//! (the family) picks one of the choices that implement this action and are
//! legal in the current family, then the successor is sampled from the
//! distribution of the choice.
//!
//! Solving the game with an adversarial player 2 yields, for every state, the
//! value player 1 can guarantee for *every* member of the family, together
//! with a policy achieving it. Solving it with a cooperative player 2 yields a
//! bound that no member of the family can exceed.
//!
//! [`GameAbstractionSolver`] computes reachability probabilities of a target
//! label by value iteration. Every solve yields an interval: the lower bound
//! comes from iterating upwards from 0 after fixing the states that reach the
//! target almost surely, the upper bound from iterating downwards from 1 with
//! end components collapsed. Both bounds are sound when iteration stops
//! early.

use std::fmt;

use log::{debug, trace, warn};
use qsynth_model::{ActionId, BitVector, ChoiceId, SparseMdp, StateId};

use crate::end_components::EndComponents;

mod end_components;

/// Maximal number of value iteration sweeps before giving up on convergence
pub const MAX_ITERATIONS: usize = 100_000;

/// Actions of every state with their choices, ordered by action
type StateActions = Vec<Vec<(ActionId, Vec<ChoiceId>)>>;

/// Solver for reachability objectives in the game abstraction of a quotient
#[derive(Debug, Clone)]
pub struct GameAbstractionSolver<'a> {
    /// The quotient MDP
    quotient: &'a SparseMdp,
    /// Number of distinct actions
    num_actions: usize,
    /// For every choice of the quotient, the action it executes
    choice_to_action: Vec<ActionId>,
    /// States carrying the target label
    target_states: BitVector,
    /// Convergence threshold of value iteration
    precision: f64,
    /// Lower bound on the value of every state after the last call to
    /// [`Self::solve`]
    pub solution_state_values: Vec<f64>,
    /// Lower bound on the value of the initial state after the last call to
    /// [`Self::solve`]
    ///
    /// If player 1 maximizes, this is a lower bound on the probability
    /// [`Self::solution_state_to_player1_action`] guarantees.
    pub solution_value: f64,
    /// Upper bound on the value of every state after the last call to
    /// [`Self::solve`]
    pub solution_state_upper_bounds: Vec<f64>,
    /// Upper bound on the value of the initial state after the last call to
    /// [`Self::solve`]
    ///
    /// If player 1 minimizes, this is an upper bound on the probability
    /// [`Self::solution_state_to_player1_action`] allows.
    pub solution_upper_bound: f64,
    /// Action picked by player 1 in every state after the last call to
    /// [`Self::solve`]
    ///
    /// `None` for target states and states without any legal choice.
    pub solution_state_to_player1_action: Vec<Option<ActionId>>,
    /// Number of sweeps performed by the last call to [`Self::solve`]
    pub iterations: usize,
}

impl<'a> GameAbstractionSolver<'a> {
    /// Create a new solver
    ///
    /// Fails if the target label is not a state label of the quotient or if
    /// `choice_to_action` does not assign an action in `0..num_actions` to
    /// every choice.
    pub fn new(
        quotient: &'a SparseMdp,
        num_actions: usize,
        choice_to_action: Vec<ActionId>,
        target_label: &str,
        precision: f64,
    ) -> Result<Self, GameSolverError> {
        if choice_to_action.len() != quotient.nr_choices() {
            return Err(GameSolverError::ChoiceCountMismatch {
                expected: quotient.nr_choices(),
                actual: choice_to_action.len(),
            });
        }
        if let Some((choice, action)) = choice_to_action
            .iter()
            .enumerate()
            .find(|(_, a)| **a >= num_actions)
        {
            return Err(GameSolverError::ActionOutOfRange {
                choice,
                action: *action,
                num_actions,
            });
        }
        if precision.is_nan() || precision <= 0.0 {
            return Err(GameSolverError::InvalidPrecision(precision));
        }

        let target_states = quotient
            .state_labeling()
            .get_items(target_label)
            .ok_or_else(|| GameSolverError::UnknownTargetLabel(target_label.to_string()))?
            .clone();

        let nr_states = quotient.nr_states();
        Ok(Self {
            quotient,
            num_actions,
            choice_to_action,
            target_states,
            precision,
            solution_state_values: vec![0.0; nr_states],
            solution_value: 0.0,
            solution_state_upper_bounds: vec![1.0; nr_states],
            solution_upper_bound: 1.0,
            solution_state_to_player1_action: vec![None; nr_states],
            iterations: 0,
        })
    }

    /// Number of actions of the game
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Convergence threshold of value iteration
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// States carrying the target label
    pub fn target_states(&self) -> &BitVector {
        &self.target_states
    }

    /// For every state, the actions with at least one selected choice and
    /// their selected choices, ordered by action
    fn selected_actions(&self, selected_choices: &BitVector) -> StateActions {
        (0..self.quotient.nr_states())
            .map(|state| {
                let mut action_choices: Vec<(ActionId, Vec<ChoiceId>)> = Vec::new();
                for choice in self.quotient.get_rows_for_group(state) {
                    if !selected_choices.get(choice) {
                        continue;
                    }
                    let action = self.choice_to_action[choice];
                    match action_choices.iter_mut().find(|(a, _)| *a == action) {
                        Some((_, choices)) => choices.push(choice),
                        None => action_choices.push((action, vec![choice])),
                    }
                }
                action_choices.sort_by_key(|(a, _)| *a);
                action_choices
            })
            .collect()
    }

    /// States from which the target can be reached with positive
    /// probability using the choices of `state_actions`
    fn can_reach_target(&self, state_actions: &StateActions) -> BitVector {
        let nr_states = self.quotient.nr_states();

        let mut predecessors: Vec<Vec<StateId>> = vec![Vec::new(); nr_states];
        for (state, actions) in state_actions.iter().enumerate() {
            for (_, choices) in actions.iter() {
                for choice in choices {
                    for dst in self.quotient.choice_destinations(*choice) {
                        predecessors[dst].push(state);
                    }
                }
            }
        }

        let mut reach = self.target_states.clone();
        let mut stack: Vec<StateId> = reach.iter_ones().collect();
        while let Some(state) = stack.pop() {
            for pred in predecessors[state].iter() {
                if !reach.get(*pred) {
                    reach.set(*pred, true);
                    stack.push(*pred);
                }
            }
        }
        reach
    }

    /// States from which player 1 can force reaching the target with
    /// probability 1, together with an action of player 1 that does so
    ///
    /// Nested fixpoint: the outer iteration shrinks the set of states the play
    /// may stay in, the inner one collects states that make progress towards
    /// the target without leaving it. The recorded action is the one that made
    /// progress, so following it cannot cycle forever.
    fn almost_sure_states(
        &self,
        state_actions: &StateActions,
        player1_maximizing: bool,
        player2_maximizing: bool,
    ) -> (BitVector, Vec<Option<ActionId>>) {
        let nr_states = self.quotient.nr_states();
        let mut stay = BitVector::new(nr_states, true);

        loop {
            let mut progress = self.target_states.clone();
            let mut witness: Vec<Option<ActionId>> = vec![None; nr_states];
            loop {
                let mut changed = false;
                for state in 0..nr_states {
                    if progress.get(state) || state_actions[state].is_empty() {
                        continue;
                    }

                    let choice_progresses = |choice: &ChoiceId| {
                        self.quotient
                            .choice_destinations(*choice)
                            .all(|dst| stay.get(dst))
                            && self
                                .quotient
                                .choice_destinations(*choice)
                                .any(|dst| progress.get(dst))
                    };
                    let action_progresses = |choices: &Vec<ChoiceId>| match player2_maximizing {
                        true => choices.iter().any(choice_progresses),
                        false => choices.iter().all(choice_progresses),
                    };

                    let action = match player1_maximizing {
                        true => state_actions[state]
                            .iter()
                            .find(|(_, choices)| action_progresses(choices))
                            .map(|(a, _)| *a),
                        false => state_actions[state]
                            .iter()
                            .all(|(_, choices)| action_progresses(choices))
                            .then_some(state_actions[state][0].0),
                    };

                    if let Some(action) = action {
                        progress.set(state, true);
                        witness[state] = Some(action);
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }

            if progress == stay {
                return (progress, witness);
            }
            stay = progress;
        }
    }

    /// Value iteration from below on the game given by `state_actions`
    ///
    /// Returns the values, the actions of player 1 and the number of sweeps.
    /// On ties player 1 keeps its previous action, and otherwise picks the
    /// smallest optimal one.
    fn iterate_from_below(
        &self,
        state_actions: &StateActions,
        player1_maximizing: bool,
        player2_maximizing: bool,
    ) -> (Vec<f64>, Vec<Option<ActionId>>, usize) {
        let nr_states = self.quotient.nr_states();
        let can_reach = self.can_reach_target(state_actions);
        let (almost_sure, witness) =
            self.almost_sure_states(state_actions, player1_maximizing, player2_maximizing);
        trace!("States reaching the target almost surely: {almost_sure}");

        let better = |maximizing: bool, new: f64, old: f64| {
            if maximizing { new > old } else { new < old }
        };

        let mut values: Vec<f64> = (0..nr_states)
            .map(|s| if almost_sure.get(s) { 1.0 } else { 0.0 })
            .collect();
        let mut player1_action: Vec<Option<ActionId>> = witness;
        for state in 0..nr_states {
            if !can_reach.get(state) && !self.target_states.get(state) {
                // value stays 0, but player 1 still needs an action
                player1_action[state] = state_actions[state].first().map(|(a, _)| *a);
            }
        }

        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut new_values = values.clone();
            let mut max_diff: f64 = 0.0;

            for state in 0..nr_states {
                if almost_sure.get(state) || !can_reach.get(state) {
                    continue;
                }

                let action_values: Vec<(ActionId, f64)> = state_actions[state]
                    .iter()
                    .filter_map(|(action, choices)| {
                        choices
                            .iter()
                            .map(|choice| {
                                self.quotient
                                    .get_row(*choice)
                                    .iter()
                                    .map(|(dst, p)| p * values[*dst])
                                    .sum::<f64>()
                            })
                            .reduce(|old, v| if better(player2_maximizing, v, old) { v } else { old })
                            .map(|v| (*action, v))
                    })
                    .collect();
                let Some(best) = action_values
                    .iter()
                    .map(|(_, v)| *v)
                    .reduce(|old, v| if better(player1_maximizing, v, old) { v } else { old })
                else {
                    continue;
                };

                let optimal = |(_, v): &&(ActionId, f64)| !better(player1_maximizing, best, *v);
                let previous = player1_action[state];
                let action = action_values
                    .iter()
                    .filter(optimal)
                    .find(|(a, _)| Some(*a) == previous)
                    .or_else(|| action_values.iter().find(optimal))
                    .map(|(a, _)| *a);

                player1_action[state] = action;
                max_diff = max_diff.max((best - values[state]).abs());
                new_values[state] = best;
            }

            values = new_values;
            trace!("Value iteration sweep {iterations}: maximal change {max_diff}");

            if max_diff < self.precision {
                break;
            }
            if iterations >= MAX_ITERATIONS {
                warn!(
                    "Value iteration did not converge within {MAX_ITERATIONS} sweeps (last change {max_diff})"
                );
                break;
            }
        }
        (values, player1_action, iterations)
    }

    /// Value iteration from above for the maximal reachability probability
    /// using any choice of `state_actions`
    ///
    /// End components are collapsed: every state of an end component gets the
    /// best value among the choices leaving it. Iteration stops once the
    /// values settle or once the bound at the initial state is within the
    /// precision of `lower`.
    fn iterate_from_above(&self, state_actions: &StateActions, lower: &[f64]) -> Vec<f64> {
        let nr_states = self.quotient.nr_states();
        let can_reach = self.can_reach_target(state_actions);
        let state_choices: Vec<Vec<ChoiceId>> = state_actions
            .iter()
            .map(|actions| {
                actions
                    .iter()
                    .flat_map(|(_, choices)| choices.iter().copied())
                    .collect()
            })
            .collect();

        let candidates = BitVector::from_indices(
            nr_states,
            (0..nr_states).filter(|s| can_reach.get(*s) && !self.target_states.get(*s)),
        );
        let ecs = EndComponents::compute(self.quotient, &state_choices, &candidates);
        debug!("Collapsing {} end components", ecs.nr_components);

        let mut upper: Vec<f64> = (0..nr_states)
            .map(|s| if can_reach.get(s) { 1.0 } else { 0.0 })
            .collect();
        let initial = self.quotient.initial_states().iter_ones().next();

        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut new_upper = upper.clone();
            let mut component_values = vec![0.0f64; ecs.nr_components];
            let mut max_diff: f64 = 0.0;

            for state in candidates.iter_ones() {
                let best = state_choices[state]
                    .iter()
                    .filter(|c| !ecs.internal_choices.get(**c))
                    .map(|choice| {
                        self.quotient
                            .get_row(*choice)
                            .iter()
                            .map(|(dst, p)| p * upper[*dst])
                            .sum::<f64>()
                    })
                    .fold(0.0f64, f64::max);
                match ecs.component_of_state[state] {
                    Some(c) => component_values[c] = component_values[c].max(best),
                    None => new_upper[state] = best,
                }
            }
            for state in candidates.iter_ones() {
                if let Some(c) = ecs.component_of_state[state] {
                    new_upper[state] = component_values[c];
                }
                max_diff = max_diff.max((upper[state] - new_upper[state]).abs());
            }

            upper = new_upper;
            trace!("Upper value iteration sweep {iterations}: maximal change {max_diff}");

            if max_diff < self.precision
                || initial.is_some_and(|s| upper[s] - lower[s] < self.precision)
            {
                break;
            }
            if iterations >= MAX_ITERATIONS {
                warn!(
                    "Upper value iteration did not converge within {MAX_ITERATIONS} sweeps (last change {max_diff})"
                );
                break;
            }
        }
        upper
    }

    /// Solve the game restricted to `selected_choices`
    ///
    /// Player 1 maximizes the reachability probability if
    /// `player1_maximizing` is set and minimizes it otherwise, likewise for
    /// player 2. The results are stored in the public `solution_*` fields.
    ///
    /// The bounds are tied to the policy of player 1 where it matters: a
    /// maximizing player 1 is guaranteed at least `solution_value` by
    /// following `solution_state_to_player1_action`, and a minimizing player 1
    /// is guaranteed at most `solution_upper_bound`.
    pub fn solve(
        &mut self,
        selected_choices: &BitVector,
        player1_maximizing: bool,
        player2_maximizing: bool,
    ) {
        let state_actions = self.selected_actions(selected_choices);
        let (values, player1_action, iterations) =
            self.iterate_from_below(&state_actions, player1_maximizing, player2_maximizing);

        // the game in which player 1 follows its policy
        let policy_actions: StateActions = state_actions
            .iter()
            .zip(player1_action.iter())
            .map(|(actions, picked)| {
                actions
                    .iter()
                    .filter(|(a, _)| Some(*a) == *picked)
                    .cloned()
                    .collect()
            })
            .collect();

        let lower = match player1_maximizing {
            true => {
                self.iterate_from_below(&policy_actions, player1_maximizing, player2_maximizing)
                    .0
            }
            false => values,
        };
        let upper = match player1_maximizing {
            true => self.iterate_from_above(&state_actions, &lower),
            false => self.iterate_from_above(&policy_actions, &lower),
        };

        let initial = self.quotient.initial_states().iter_ones().next();
        self.solution_value = initial.map(|s| lower[s]).unwrap_or(0.0);
        self.solution_upper_bound = initial.map(|s| upper[s]).unwrap_or(0.0);
        debug!(
            "Game abstraction solved in {iterations} sweeps, value at initial state in [{}, {}]",
            self.solution_value, self.solution_upper_bound
        );

        self.solution_state_values = lower;
        self.solution_state_upper_bounds = upper;
        self.solution_state_to_player1_action = player1_action;
        self.iterations = iterations;
    }
}

/// Errors that can occur when creating a [`GameAbstractionSolver`]
#[derive(Debug, Clone, PartialEq)]
pub enum GameSolverError {
    /// The target label is not a state label of the quotient
    UnknownTargetLabel(String),
    /// The choice to action map does not cover exactly the quotient choices
    ChoiceCountMismatch {
        /// Number of choices of the quotient
        expected: usize,
        /// Length of the choice to action map
        actual: usize,
    },
    /// A choice is mapped to an action that does not exist
    ActionOutOfRange {
        /// The offending choice
        choice: ChoiceId,
        /// Action assigned to it
        action: ActionId,
        /// Number of actions
        num_actions: usize,
    },
    /// Precision is not a positive number
    InvalidPrecision(f64),
}

impl std::error::Error for GameSolverError {}

impl fmt::Display for GameSolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameSolverError::UnknownTargetLabel(l) => {
                write!(f, "Target label '{l}' is not a state label of the quotient")
            }
            GameSolverError::ChoiceCountMismatch { expected, actual } => write!(
                f,
                "Quotient has {expected} choices but {actual} choices are mapped to actions"
            ),
            GameSolverError::ActionOutOfRange {
                choice,
                action,
                num_actions,
            } => write!(
                f,
                "Choice {choice} is mapped to action {action}, but there are only {num_actions} actions"
            ),
            GameSolverError::InvalidPrecision(p) => {
                write!(f, "Precision must be positive, got {p}")
            }
        }
    }
}
