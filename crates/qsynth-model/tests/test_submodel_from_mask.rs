//! Integration tests for building models and restricting them to choice masks

#[cfg(test)]
mod test_submodel_from_mask {
    use qsynth_model::{
        BitVector, SparseMdp,
        builder::{ChoiceBuilder, MdpBuilder},
    };

    /// Grid-like model in which the robot at every cell either moves right or
    /// down with some probability of slipping back
    fn grid(n: usize) -> SparseMdp {
        let nr_states = n * n;
        let mut builder = MdpBuilder::new(nr_states)
            .with_initial_state(0)
            .unwrap()
            .with_state_label("goal", [nr_states - 1])
            .unwrap()
            .with_state_valuations(
                (0..nr_states)
                    .map(|s| format!("[x={}\t& y={}]", s % n, s / n))
                    .collect(),
            )
            .unwrap();

        for s in 0..nr_states {
            let (x, y) = (s % n, s / n);
            if x + 1 < n {
                builder = builder
                    .with_choice(
                        ChoiceBuilder::new(s)
                            .with_label("right")
                            .with_transition(s + 1, 0.9)
                            .with_transition(s, 0.1)
                            .build(),
                    )
                    .unwrap();
            }
            if y + 1 < n {
                builder = builder
                    .with_choice(
                        ChoiceBuilder::new(s)
                            .with_label("down")
                            .with_transition(s + n, 0.9)
                            .with_transition(s, 0.1)
                            .build(),
                    )
                    .unwrap();
            }
            if x + 1 == n && y + 1 == n {
                builder = builder
                    .with_choice(ChoiceBuilder::new(s).with_label("stay").with_transition(s, 1.0).build())
                    .unwrap();
            }
        }

        builder.build().unwrap()
    }

    #[test]
    fn test_grid_shape() {
        let mdp = grid(3);
        assert_eq!(mdp.nr_states(), 9);
        // 6 right, 6 down, 1 stay
        assert_eq!(mdp.nr_choices(), 13);
        assert!(mdp.has_choice_labeling());
        assert_eq!(
            mdp.state_valuations().unwrap().get_string(4),
            Some("[x=1\t& y=1]")
        );
    }

    #[test]
    fn test_only_right_moves_reach_first_row() {
        let mdp = grid(3);
        let labeling = mdp.choice_labeling().unwrap();
        let mask = BitVector::from_indices(
            mdp.nr_choices(),
            labeling
                .get_items("right")
                .unwrap()
                .iter_ones()
                .chain(labeling.get_items("stay").unwrap().iter_ones()),
        );

        let sub = mdp.restrict_to_choices(&mask);
        assert_eq!(sub.quotient_state_map, vec![0, 1, 2]);
        assert!(sub.is_deterministic());
        assert_eq!(sub.model.deadlock_states().collect::<Vec<_>>(), vec![2]);
        for (sub_state, state) in sub.quotient_state_map.iter().enumerate() {
            for sub_choice in sub.model.get_rows_for_group(sub_state) {
                assert!(mdp
                    .get_rows_for_group(*state)
                    .contains(&sub.quotient_choice_map[sub_choice]));
            }
        }
    }

    #[test]
    fn test_full_mask_keeps_model() {
        let mdp = grid(2);
        let sub = mdp.restrict_to_choices(&BitVector::new(mdp.nr_choices(), true));
        assert_eq!(sub.model.nr_states(), mdp.nr_states());
        assert_eq!(sub.model.nr_choices(), mdp.nr_choices());
        assert_eq!(sub.quotient_choice_map, (0..mdp.nr_choices()).collect::<Vec<_>>());
        assert!(!sub.is_deterministic());
    }
}
