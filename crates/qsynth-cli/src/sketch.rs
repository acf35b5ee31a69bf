//! JSON input format for sketches
//!
//! A sketch file describes the quotient MDP of a family together with the
//! coloring of its choices and the properties to synthesize for:
//!
//! ```json
//! {
//!   "states": 2,
//!   "initial_state": 0,
//!   "state_labels": { "goal": [1] },
//!   "state_valuations": ["[x=0]", "[x=1]"],
//!   "holes": [ { "name": "h", "options": ["0", "1"] } ],
//!   "choices": [
//!     { "state": 0, "label": "a", "transitions": [[1, 1.0]], "colors": [["h", 0]] }
//!   ],
//!   "properties": [
//!     { "name": "reach", "target_label": "goal", "direction": "max", "threshold": 0.9 }
//!   ]
//! }
//! ```
//!
//! Choices must be listed grouped by state in ascending order.

use std::{collections::HashMap, fmt::Display};

use qsynth_family::{Coloring, Family, FamilyError, Hole};
use qsynth_model::builder::{BuilderError, ChoiceBuilder, MdpBuilder};
use qsynth_quotient::{
    MdpFamilyQuotient, QuotientError, config::QuotientConfig, property::Property,
};
use serde::Deserialize;

/// A hole of a sketch file
#[derive(Debug, Clone, Deserialize)]
struct HoleSpec {
    name: String,
    options: Vec<String>,
}

/// A choice of a sketch file
#[derive(Debug, Clone, Deserialize)]
struct ChoiceSpec {
    state: usize,
    label: String,
    transitions: Vec<(usize, f64)>,
    #[serde(default)]
    colors: Vec<(String, usize)>,
}

/// Parsed sketch file
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Sketch {
    states: usize,
    initial_state: usize,
    #[serde(default)]
    state_labels: HashMap<String, Vec<usize>>,
    #[serde(default)]
    state_valuations: Option<Vec<String>>,
    #[serde(default)]
    holes: Vec<HoleSpec>,
    choices: Vec<ChoiceSpec>,
    #[serde(default)]
    properties: Vec<Property>,
}

impl Sketch {
    /// Parse a sketch from its JSON representation
    pub(crate) fn from_json(json: &str) -> Result<Self, SketchError> {
        serde_json::from_str(json).map_err(|err| SketchError::Json(err.to_string()))
    }

    /// Build the quotient container of the sketch
    pub(crate) fn into_quotient(
        self,
        config: QuotientConfig,
    ) -> Result<MdpFamilyQuotient, SketchError> {
        let holes: Vec<Hole> = self
            .holes
            .iter()
            .map(|h| Hole::new(h.name.clone(), h.options.clone()))
            .collect();
        let hole_index: HashMap<&str, usize> = self
            .holes
            .iter()
            .enumerate()
            .map(|(i, h)| (h.name.as_str(), i))
            .collect();

        let mut builder = MdpBuilder::new(self.states).with_initial_state(self.initial_state)?;

        // sort the labels so that the constructed model does not depend on the
        // iteration order of the map
        let mut state_labels = self.state_labels.into_iter().collect::<Vec<_>>();
        state_labels.sort();
        for (label, states) in state_labels {
            builder = builder.with_state_label(label, states)?;
        }

        let mut choice_to_assignment = Vec::with_capacity(self.choices.len());
        for (choice, spec) in self.choices.into_iter().enumerate() {
            let assignment = spec
                .colors
                .iter()
                .map(|(hole, option)| {
                    hole_index
                        .get(hole.as_str())
                        .map(|h| (*h, *option))
                        .ok_or_else(|| SketchError::UnknownHole {
                            choice,
                            hole: hole.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            choice_to_assignment.push(assignment);

            builder = builder.with_choice(
                ChoiceBuilder::new(spec.state)
                    .with_label(spec.label)
                    .with_transitions(spec.transitions)
                    .build(),
            )?;
        }

        if let Some(valuations) = self.state_valuations {
            builder = builder.with_state_valuations(valuations)?;
        }

        let mdp = builder.build()?;
        let coloring = Coloring::new(holes, choice_to_assignment)?;
        Ok(MdpFamilyQuotient::new(
            mdp,
            coloring,
            self.properties,
            config,
        )?)
    }
}

/// Restrict `family` by a JSON object mapping hole names to allowed options
///
/// Holes that are not mentioned keep their options, e.g. `{"h": [0]}`.
pub(crate) fn restrict_family(family: &Family, json: &str) -> Result<Family, SketchError> {
    let restriction: HashMap<String, Vec<usize>> =
        serde_json::from_str(json).map_err(|err| SketchError::Json(err.to_string()))?;

    let mut restriction = restriction.into_iter().collect::<Vec<_>>();
    restriction.sort();

    let mut restricted = family.clone();
    for (name, options) in restriction {
        let hole = restricted
            .hole_index(&name)
            .ok_or(FamilyError::UnknownHole(name))?;
        restricted = restricted.assume_hole_options(hole, options)?;
    }
    Ok(restricted)
}

/// Error that can occur when reading a sketch
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SketchError {
    /// The input is not valid JSON or does not match the sketch format
    Json(String),
    /// A choice is colored with a hole that is not declared
    UnknownHole {
        /// Index of the choice in the sketch file
        choice: usize,
        /// Name of the hole
        hole: String,
    },
    /// The model is malformed
    Model(BuilderError),
    /// The holes or the coloring are malformed
    Family(FamilyError),
    /// The quotient cannot be constructed
    Quotient(QuotientError),
}

impl std::error::Error for SketchError {}

impl Display for SketchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SketchError::Json(err) => write!(f, "Failed to parse sketch: {err}"),
            SketchError::UnknownHole { choice, hole } => {
                write!(f, "Choice {choice} is colored with undeclared hole '{hole}'")
            }
            SketchError::Model(err) => write!(f, "Invalid model: {err}"),
            SketchError::Family(err) => write!(f, "Invalid design space: {err}"),
            SketchError::Quotient(err) => write!(f, "Invalid quotient: {err}"),
        }
    }
}

impl From<BuilderError> for SketchError {
    fn from(value: BuilderError) -> Self {
        SketchError::Model(value)
    }
}

impl From<FamilyError> for SketchError {
    fn from(value: FamilyError) -> Self {
        SketchError::Family(value)
    }
}

impl From<QuotientError> for SketchError {
    fn from(value: QuotientError) -> Self {
        SketchError::Quotient(value)
    }
}
