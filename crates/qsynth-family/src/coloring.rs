//! Coloring of the choices of a quotient
//!
//! The coloring states for every choice of the quotient which hole options it
//! requires. A choice is legal in a family iff the family allows every option
//! the choice requires; choices without requirements are legal in every
//! family.

use log::debug;
use qsynth_model::{BitVector, ChoiceId};

use crate::{
    FamilyError,
    family::{DesignSpace, Family},
    hole::{Hole, HoleId, OptionId},
};

/// Hole options required by each choice of a quotient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coloring {
    /// Holes of the sketch, allowing all their options
    holes: Vec<Hole>,
    /// For every choice, the `(hole, option)` pairs it requires
    choice_to_assignment: Vec<Vec<(HoleId, OptionId)>>,
}

impl Coloring {
    /// Create a coloring
    ///
    /// Every hole needs at least one option, every referenced hole and option
    /// has to exist, and a choice may require at most one option of each hole.
    pub fn new(
        holes: Vec<Hole>,
        choice_to_assignment: Vec<Vec<(HoleId, OptionId)>>,
    ) -> Result<Self, FamilyError> {
        if let Some(h) = holes.iter().find(|h| h.option_labels().is_empty()) {
            return Err(FamilyError::EmptyHole(h.name().to_string()));
        }
        for (choice, assignment) in choice_to_assignment.iter().enumerate() {
            for (i, (hole, option)) in assignment.iter().enumerate() {
                let h = holes
                    .get(*hole)
                    .ok_or(FamilyError::UnknownHole(hole.to_string()))?;
                if *option >= h.option_labels().len() {
                    return Err(FamilyError::UnknownOption(h.name().to_string(), *option));
                }
                if assignment[..i].iter().any(|(other, _)| other == hole) {
                    return Err(FamilyError::ConflictingColors(choice, h.name().to_string()));
                }
            }
        }

        Ok(Self {
            holes,
            choice_to_assignment,
        })
    }

    /// Number of colored choices
    pub fn nr_choices(&self) -> usize {
        self.choice_to_assignment.len()
    }

    /// Holes of the sketch
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// The `(hole, option)` pairs required by `choice`
    pub fn choice_assignment(&self, choice: ChoiceId) -> &[(HoleId, OptionId)] {
        &self.choice_to_assignment[choice]
    }

    /// Design space spanned by the holes of this coloring
    pub fn design_space(&self) -> DesignSpace {
        DesignSpace::new(&self.holes)
    }

    /// Choices that are legal in `family`
    pub fn select_compatible(&self, family: &Family) -> Result<BitVector, FamilyError> {
        if family.num_holes() != self.holes.len() {
            return Err(FamilyError::HoleCountMismatch {
                expected: self.holes.len(),
                actual: family.num_holes(),
            });
        }

        let selected = BitVector::from_indices(
            self.nr_choices(),
            self.choice_to_assignment
                .iter()
                .enumerate()
                .filter(|(_, assignment)| {
                    assignment
                        .iter()
                        .all(|(hole, option)| family.hole(*hole).allows(*option))
                })
                .map(|(choice, _)| choice),
        );

        debug!(
            "Family {family} selects {} of {} choices",
            selected.count_ones(),
            self.nr_choices()
        );
        Ok(selected)
    }

    /// Compute and store the choices that are legal in `family`
    pub fn apply_to(&self, family: &mut Family) -> Result<(), FamilyError> {
        let selected = self.select_compatible(family)?;
        family.set_selected_actions_bv(selected);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{FamilyError, hole::Hole};

    use super::Coloring;

    fn coloring() -> Coloring {
        Coloring::new(
            vec![Hole::new("h", vec!["0", "1"]), Hole::new("g", vec!["a", "b", "c"])],
            vec![
                vec![],
                vec![(0, 0)],
                vec![(0, 1)],
                vec![(0, 1), (1, 2)],
                vec![(1, 0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_select_full_design_space() {
        let c = coloring();
        let family = c.design_space().family().clone();
        let selected = c.select_compatible(&family).unwrap();
        assert_eq!(selected.count_ones(), 5);
    }

    #[test]
    fn test_select_restricted_family() {
        let c = coloring();
        let mut family = c
            .design_space()
            .family()
            .assume_hole_options(0, [1])
            .unwrap()
            .assume_hole_options(1, [0, 1])
            .unwrap();
        c.apply_to(&mut family).unwrap();
        assert_eq!(
            family
                .selected_actions_bv()
                .unwrap()
                .iter_ones()
                .collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
    }

    #[test]
    fn test_invalid_colorings() {
        let holes = vec![Hole::new("h", vec!["0", "1"])];
        assert_eq!(
            Coloring::new(holes.clone(), vec![vec![(1, 0)]]).unwrap_err(),
            FamilyError::UnknownHole("1".into())
        );
        assert_eq!(
            Coloring::new(holes.clone(), vec![vec![(0, 2)]]).unwrap_err(),
            FamilyError::UnknownOption("h".into(), 2)
        );
        assert_eq!(
            Coloring::new(holes, vec![vec![(0, 0), (0, 1)]]).unwrap_err(),
            FamilyError::ConflictingColors(0, "h".into())
        );
        assert_eq!(
            Coloring::new(vec![Hole::new("e", Vec::<String>::new())], vec![vec![]]).unwrap_err(),
            FamilyError::EmptyHole("e".into())
        );
    }

    #[test]
    fn test_family_from_other_sketch() {
        let c = coloring();
        let other = crate::family::Family::new(vec![Hole::new("h", vec!["0"])]);
        assert!(matches!(
            c.select_compatible(&other),
            Err(FamilyError::HoleCountMismatch { .. })
        ));
    }
}
