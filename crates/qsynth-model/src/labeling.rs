//! Labelings of choices and states and human readable state valuations

use std::collections::{HashMap, HashSet};

use crate::bitvector::BitVector;

/// Store mapping label names to the set of items (choices or states) carrying
/// that label
///
/// The store does not make any guarantee about the order in which labels are
/// enumerated by [`ItemLabeling::get_labels`]. Consumers that need a stable
/// order have to sort the labels themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLabeling {
    /// Number of labeled items
    nr_items: usize,
    /// Label name to the items that carry it
    labels: HashMap<String, BitVector>,
}

impl ItemLabeling {
    /// Create a new labeling over `nr_items` items without any label
    pub fn new(nr_items: usize) -> Self {
        Self {
            nr_items,
            labels: HashMap::new(),
        }
    }

    /// Number of labeled items
    pub fn nr_items(&self) -> usize {
        self.nr_items
    }

    /// Register a label without assigning it to any item
    pub fn add_label(&mut self, label: impl Into<String>) {
        let nr_items = self.nr_items;
        self.labels
            .entry(label.into())
            .or_insert_with(|| BitVector::new(nr_items, false));
    }

    /// Attach `label` to `item`, registering the label if it is new
    pub fn add_label_to_item(&mut self, label: impl Into<String>, item: usize) {
        let nr_items = self.nr_items;
        self.labels
            .entry(label.into())
            .or_insert_with(|| BitVector::new(nr_items, false))
            .set(item, true);
    }

    /// Check whether the label is registered
    pub fn contains_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// All registered labels, in no particular order
    pub fn get_labels(&self) -> HashSet<&str> {
        self.labels.keys().map(|l| l.as_str()).collect()
    }

    /// Labels attached to `item`, in no particular order
    pub fn get_labels_of_item(&self, item: usize) -> HashSet<&str> {
        self.labels
            .iter()
            .filter(|(_, items)| items.get(item))
            .map(|(l, _)| l.as_str())
            .collect()
    }

    /// Items carrying `label`, if the label is registered
    pub fn get_items(&self, label: &str) -> Option<&BitVector> {
        self.labels.get(label)
    }
}

/// Labeling of the choices (rows) of a model
pub type ChoiceLabeling = ItemLabeling;

/// Labeling of the states of a model
pub type StateLabeling = ItemLabeling;

/// Human readable valuation of every state, e.g. `[x=1 & y=0]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateValuations {
    valuations: Vec<String>,
}

impl StateValuations {
    /// Create state valuations from one string per state
    pub fn new(valuations: Vec<String>) -> Self {
        Self { valuations }
    }

    /// Number of states with a valuation
    pub fn len(&self) -> usize {
        self.valuations.len()
    }

    /// Check whether there are no valuations
    pub fn is_empty(&self) -> bool {
        self.valuations.is_empty()
    }

    /// Valuation of `state`
    ///
    /// Returns `None` if the state is out of range
    pub fn get_string(&self, state: usize) -> Option<&str> {
        self.valuations.get(state).map(|s| s.as_str())
    }

    /// Keep only the valuations of the given states, in the given order
    pub(crate) fn restrict(&self, states: &[usize]) -> Self {
        Self {
            valuations: states.iter().map(|s| self.valuations[*s].clone()).collect(),
        }
    }
}
