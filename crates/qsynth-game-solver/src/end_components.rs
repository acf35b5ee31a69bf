//! Graph analysis of the choices the solver works on
//!
//! Value iteration from above only converges to the reachability probability
//! once end components are collapsed: inside an end component the play may
//! stay forever, so the probability of the component is the best probability
//! among the choices leaving it.

use qsynth_model::{BitVector, ChoiceId, SparseMdp, StateId};

/// Maximal end components of a model restricted to a set of choices
#[derive(Debug, Clone)]
pub(crate) struct EndComponents {
    /// Index of the end component containing each state, if any
    pub(crate) component_of_state: Vec<Option<usize>>,
    /// Choices that stay inside the end component of their state
    pub(crate) internal_choices: BitVector,
    /// Number of end components
    pub(crate) nr_components: usize,
}

impl EndComponents {
    /// Decompose the states in `candidates` using only the choices listed in
    /// `state_choices`
    ///
    /// Choices leaving their strongly connected component are removed, and
    /// states without remaining choices are dropped, until the decomposition
    /// is stable.
    pub(crate) fn compute(
        mdp: &SparseMdp,
        state_choices: &[Vec<ChoiceId>],
        candidates: &BitVector,
    ) -> Self {
        let nr_states = mdp.nr_states();
        let mut alive_states = candidates.clone();
        let mut alive_choices = BitVector::new(mdp.nr_choices(), false);
        for state in candidates.iter_ones() {
            for choice in state_choices[state].iter() {
                alive_choices.set(*choice, true);
            }
        }

        loop {
            let successors: Vec<Vec<StateId>> = (0..nr_states)
                .map(|state| {
                    if !alive_states.get(state) {
                        return Vec::new();
                    }
                    state_choices[state]
                        .iter()
                        .filter(|c| alive_choices.get(**c))
                        .flat_map(|c| mdp.choice_destinations(*c))
                        .collect()
                })
                .collect();
            let component = strongly_connected_components(&successors, &alive_states);

            let mut changed = false;
            for state in alive_states.iter_ones().collect::<Vec<_>>() {
                let mut has_internal_choice = false;
                for choice in state_choices[state].iter() {
                    if !alive_choices.get(*choice) {
                        continue;
                    }
                    let leaves = mdp
                        .choice_destinations(*choice)
                        .any(|dst| !alive_states.get(dst) || component[dst] != component[state]);
                    if leaves {
                        alive_choices.set(*choice, false);
                        changed = true;
                    } else {
                        has_internal_choice = true;
                    }
                }
                if !has_internal_choice {
                    alive_states.set(state, false);
                    changed = true;
                }
            }

            if changed {
                continue;
            }

            // renumber densely, components of dropped states are gone
            let mut index: Vec<Option<usize>> = vec![None; nr_states];
            let mut nr_components = 0;
            let component_of_state = (0..nr_states)
                .map(|state| {
                    let c = component[state].filter(|_| alive_states.get(state))?;
                    Some(*index[c].get_or_insert_with(|| {
                        nr_components += 1;
                        nr_components - 1
                    }))
                })
                .collect();

            return Self {
                component_of_state,
                internal_choices: alive_choices,
                nr_components,
            };
        }
    }
}

/// Strongly connected components of the graph given by `successors`,
/// restricted to the nodes in `alive`
///
/// Iterative version of Tarjan's algorithm. Nodes outside of `alive` are
/// mapped to `None`.
pub(crate) fn strongly_connected_components(
    successors: &[Vec<StateId>],
    alive: &BitVector,
) -> Vec<Option<usize>> {
    let n = successors.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut low = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<StateId> = Vec::new();
    let mut component: Vec<Option<usize>> = vec![None; n];
    let mut next_index = 0;
    let mut next_component = 0;

    for root in alive.iter_ones() {
        if index[root].is_some() {
            continue;
        }
        index[root] = Some(next_index);
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        // (node, position of the next successor to visit)
        let mut call_stack: Vec<(StateId, usize)> = vec![(root, 0)];
        while let Some(frame) = call_stack.last_mut() {
            let node = frame.0;
            if let Some(&succ) = successors[node].get(frame.1) {
                frame.1 += 1;
                if !alive.get(succ) {
                    continue;
                }
                match index[succ] {
                    None => {
                        index[succ] = Some(next_index);
                        low[succ] = next_index;
                        next_index += 1;
                        stack.push(succ);
                        on_stack[succ] = true;
                        call_stack.push((succ, 0));
                    }
                    Some(i) if on_stack[succ] => low[node] = low[node].min(i),
                    Some(_) => {}
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if Some(low[node]) == index[node] {
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component[member] = Some(next_component);
                    if member == node {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }
    component
}

#[cfg(test)]
mod tests {
    use qsynth_model::{
        BitVector,
        builder::{ChoiceBuilder, MdpBuilder},
    };

    use super::{EndComponents, strongly_connected_components};

    #[test]
    fn test_strongly_connected_components() {
        // 0 <-> 1 -> 2 -> 3 -> 2, node 4 is not alive
        let successors = vec![vec![1], vec![0, 2], vec![3], vec![2, 4], vec![0]];
        let alive = BitVector::from_indices(5, [0, 1, 2, 3]);
        let component = strongly_connected_components(&successors, &alive);

        assert_eq!(component[0], component[1]);
        assert_eq!(component[2], component[3]);
        assert_ne!(component[0], component[2]);
        assert!(component[0].is_some() && component[2].is_some());
        assert_eq!(component[4], None);
    }

    #[test]
    fn test_end_components() {
        // 0 and 1 can swap forever or leave to the goal 2; 3 loops once to
        // itself and then has to leave
        let mdp = MdpBuilder::new(4)
            .with_initial_state(0)
            .unwrap()
            .with_choices(vec![
                ChoiceBuilder::new(0).with_transition(1, 1.0).build(),
                ChoiceBuilder::new(0)
                    .with_transitions(vec![(2, 0.5), (3, 0.5)])
                    .build(),
                ChoiceBuilder::new(1).with_transition(0, 1.0).build(),
                ChoiceBuilder::new(2).with_transition(2, 1.0).build(),
                ChoiceBuilder::new(3)
                    .with_transitions(vec![(3, 0.5), (2, 0.5)])
                    .build(),
            ])
            .unwrap()
            .build()
            .unwrap();
        let state_choices = vec![vec![0, 1], vec![2], vec![3], vec![4]];
        let candidates = BitVector::from_indices(4, [0, 1, 3]);

        let ecs = EndComponents::compute(&mdp, &state_choices, &candidates);
        assert_eq!(ecs.nr_components, 1);
        assert_eq!(ecs.component_of_state, vec![Some(0), Some(0), None, None]);
        assert_eq!(ecs.internal_choices, BitVector::from_indices(5, [0, 2]));
    }
}
