//! Families of a design space
//!
//! A [`Family`] is a subset of the design space given by restricting every
//! hole to a subset of its options. Once a coloring has been applied, a family
//! also knows which choices of the quotient are legal in it
//! ([`Family::selected_actions_bv`]).

use std::fmt;

use qsynth_model::BitVector;

use crate::{
    FamilyError,
    hole::{Hole, HoleId, OptionId},
};

/// Subset of a design space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    /// Holes and the options they allow
    holes: Vec<Hole>,
    /// Choices of the quotient that are legal in this family
    selected_actions_bv: Option<BitVector>,
}

impl Family {
    /// Create a family from the given holes
    pub fn new(holes: Vec<Hole>) -> Self {
        Self {
            holes,
            selected_actions_bv: None,
        }
    }

    /// Number of holes
    pub fn num_holes(&self) -> usize {
        self.holes.len()
    }

    /// All holes
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// Hole with index `hole`
    pub fn hole(&self, hole: HoleId) -> &Hole {
        &self.holes[hole]
    }

    /// Index of the hole named `name`
    pub fn hole_index(&self, name: &str) -> Option<HoleId> {
        self.holes.iter().position(|h| h.name() == name)
    }

    /// Number of members of the family
    ///
    /// Saturates at `u64::MAX` for very large design spaces.
    pub fn size(&self) -> u64 {
        self.holes
            .iter()
            .fold(1u64, |acc, h| acc.saturating_mul(h.size() as u64))
    }

    /// Check whether the family has exactly one member
    pub fn is_singleton(&self) -> bool {
        self.holes.iter().all(|h| h.is_fixed())
    }

    /// Choices legal in this family, if a coloring has been applied
    pub fn selected_actions_bv(&self) -> Option<&BitVector> {
        self.selected_actions_bv.as_ref()
    }

    /// Set the choices legal in this family
    pub fn set_selected_actions_bv(&mut self, selected: BitVector) {
        self.selected_actions_bv = Some(selected);
    }

    /// Copy of this family with `hole` restricted to `options`
    ///
    /// The selected choices of the result are not computed.
    pub fn assume_hole_options(
        &self,
        hole: HoleId,
        options: impl IntoIterator<Item = OptionId>,
    ) -> Result<Family, FamilyError> {
        let restricted = self
            .holes
            .get(hole)
            .ok_or(FamilyError::UnknownHole(hole.to_string()))?
            .assume_options(options)?;

        let mut holes = self.holes.clone();
        holes[hole] = restricted;
        Ok(Family::new(holes))
    }

    /// First hole that allows more than one option
    pub fn first_splittable_hole(&self) -> Option<HoleId> {
        self.holes.iter().position(|h| !h.is_fixed())
    }

    /// Split the family into two halves along the options of `hole`
    ///
    /// Returns `None` if the hole is fixed or does not exist.
    pub fn split(&self, hole: HoleId) -> Option<(Family, Family)> {
        let (lower, upper) = self.holes.get(hole)?.split()?;

        let mut lower_holes = self.holes.clone();
        lower_holes[hole] = lower;
        let mut upper_holes = self.holes.clone();
        upper_holes[hole] = upper;

        Some((Family::new(lower_holes), Family::new(upper_holes)))
    }

    /// Iterate over the members of the family, each given by one option per
    /// hole
    ///
    /// Members are enumerated in lexicographic order, the last hole changing
    /// fastest.
    pub fn members(&self) -> impl Iterator<Item = Vec<OptionId>> + '_ {
        let mut positions = self
            .holes
            .iter()
            .all(|h| h.size() > 0)
            .then(|| vec![0; self.holes.len()]);

        std::iter::from_fn(move || {
            let current = positions.as_mut()?;
            let member = self
                .holes
                .iter()
                .zip(current.iter())
                .map(|(h, p)| h.options()[*p])
                .collect();

            let mut advanced = false;
            for (hole, pos) in self.holes.iter().zip(current.iter_mut()).rev() {
                *pos += 1;
                if *pos < hole.size() {
                    advanced = true;
                    break;
                }
                *pos = 0;
            }
            if !advanced {
                positions = None;
            }
            Some(member)
        })
    }

    /// Singleton family of the member given by `assignment`
    pub fn assume_assignment(&self, assignment: &[OptionId]) -> Result<Family, FamilyError> {
        if assignment.len() != self.holes.len() {
            return Err(FamilyError::HoleCountMismatch {
                expected: self.holes.len(),
                actual: assignment.len(),
            });
        }
        let holes = self
            .holes
            .iter()
            .zip(assignment.iter())
            .map(|(h, o)| h.assume_options([*o]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Family::new(holes))
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let holes = self
            .holes
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        write!(f, "[{}]", holes.join(", "))
    }
}

/// The design space of a sketch: the family of all its members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignSpace {
    family: Family,
}

impl DesignSpace {
    /// Design space over the given holes
    ///
    /// Every hole allows all of its options, regardless of the options
    /// allowed in `holes`.
    pub fn new(holes: &[Hole]) -> Self {
        let holes = holes
            .iter()
            .map(|h| Hole::new(h.name(), h.option_labels().to_vec()))
            .collect();
        Self {
            family: Family::new(holes),
        }
    }

    /// Root family containing all members
    pub fn family(&self) -> &Family {
        &self.family
    }

    /// Number of members of the design space
    pub fn size(&self) -> u64 {
        self.family.size()
    }
}
