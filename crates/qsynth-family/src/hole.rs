//! Holes of a sketch
//!
//! A hole is a parameter of the sketch that can be instantiated with one of a
//! finite list of options. Within a family, a hole only allows a subset of its
//! options.

use std::fmt;

use crate::FamilyError;

/// Index of a hole
pub type HoleId = usize;

/// Index of an option of a hole
pub type OptionId = usize;

/// A hole together with the options it still allows
///
/// # Example
///
/// ```
/// use qsynth_family::hole::Hole;
///
/// let hole = Hole::new("speed", vec!["1", "2", "3"]);
/// assert_eq!(hole.size(), 3);
///
/// let (lower, upper) = hole.split().unwrap();
/// assert_eq!(lower.options(), &[0]);
/// assert_eq!(upper.options(), &[1, 2]);
/// assert_eq!(upper.to_string(), "speed: {2, 3}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hole {
    /// Name of the hole
    name: String,
    /// Labels of all options of the hole
    option_labels: Vec<String>,
    /// Options that are still allowed, sorted ascending
    options: Vec<OptionId>,
}

impl Hole {
    /// Create a hole allowing all of its options
    pub fn new(name: impl Into<String>, option_labels: Vec<impl Into<String>>) -> Self {
        let option_labels: Vec<String> = option_labels.into_iter().map(|l| l.into()).collect();
        let options = (0..option_labels.len()).collect();
        Self {
            name: name.into(),
            option_labels,
            options,
        }
    }

    /// Name of the hole
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options that are still allowed
    pub fn options(&self) -> &[OptionId] {
        &self.options
    }

    /// Labels of all options, including the ones no longer allowed
    pub fn option_labels(&self) -> &[String] {
        &self.option_labels
    }

    /// Label of `option`
    pub fn option_label(&self, option: OptionId) -> Option<&str> {
        self.option_labels.get(option).map(|l| l.as_str())
    }

    /// Number of allowed options
    pub fn size(&self) -> usize {
        self.options.len()
    }

    /// Check whether the hole allows exactly one option
    pub fn is_fixed(&self) -> bool {
        self.options.len() == 1
    }

    /// Check whether `option` is allowed
    pub fn allows(&self, option: OptionId) -> bool {
        self.options.binary_search(&option).is_ok()
    }

    /// Restrict the hole to the given options
    ///
    /// Every option must exist and at least one option must remain.
    pub fn assume_options(
        &self,
        options: impl IntoIterator<Item = OptionId>,
    ) -> Result<Hole, FamilyError> {
        let mut options: Vec<OptionId> = options.into_iter().collect();
        options.sort_unstable();
        options.dedup();

        if options.is_empty() {
            return Err(FamilyError::EmptyHole(self.name.clone()));
        }
        if let Some(o) = options.iter().find(|o| **o >= self.option_labels.len()) {
            return Err(FamilyError::UnknownOption(self.name.clone(), *o));
        }

        Ok(Hole {
            name: self.name.clone(),
            option_labels: self.option_labels.clone(),
            options,
        })
    }

    /// Split the allowed options into two halves
    ///
    /// Returns `None` if the hole is already fixed.
    pub fn split(&self) -> Option<(Hole, Hole)> {
        if self.options.len() < 2 {
            return None;
        }
        let (lower, upper) = self.options.split_at(self.options.len() / 2);
        let with = |options: &[OptionId]| Hole {
            name: self.name.clone(),
            option_labels: self.option_labels.clone(),
            options: options.to_vec(),
        };
        Some((with(lower), with(upper)))
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self
            .options
            .iter()
            .map(|o| self.option_labels[*o].as_str())
            .collect::<Vec<_>>();
        if let [label] = labels.as_slice() {
            return write!(f, "{}={}", self.name, label);
        }
        write!(f, "{}: {{{}}}", self.name, labels.join(", "))
    }
}
