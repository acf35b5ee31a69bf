//! Reachability properties

use std::fmt::{self, Display};

#[cfg(feature = "config_deserialize")]
use serde::Deserialize;

/// Whether a property asks for a low or a high reachability probability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub enum OptimizationDirection {
    /// The probability must be at most the threshold
    #[cfg_attr(feature = "config_deserialize", serde(alias = "min"))]
    Minimize,
    /// The probability must be at least the threshold
    #[cfg_attr(feature = "config_deserialize", serde(alias = "max"))]
    Maximize,
}

impl OptimizationDirection {
    /// The opposite direction
    pub fn negate(self) -> Self {
        match self {
            OptimizationDirection::Minimize => OptimizationDirection::Maximize,
            OptimizationDirection::Maximize => OptimizationDirection::Minimize,
        }
    }

    /// Check whether this is [`OptimizationDirection::Maximize`]
    pub fn is_maximizing(self) -> bool {
        self == OptimizationDirection::Maximize
    }
}

/// Reachability property: probability to reach the states carrying
/// `target_label`, bounded by `threshold`
///
/// # Example
///
/// ```
/// use qsynth_quotient::property::{OptimizationDirection, Property};
///
/// let prop = Property::new("reach", "goal", OptimizationDirection::Maximize, 0.9);
/// assert!(prop.satisfied_by(0.95));
/// assert!(!prop.satisfied_by(0.5));
/// assert_eq!(prop.to_string(), "reach: P>=0.9 [F \"goal\"]");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub struct Property {
    /// Name of the property
    name: String,
    /// State label of the target states
    target_label: String,
    /// Direction of the bound
    direction: OptimizationDirection,
    /// Bound on the reachability probability
    threshold: f64,
}

impl Property {
    /// Create a new property
    pub fn new(
        name: impl Into<String>,
        target_label: impl Into<String>,
        direction: OptimizationDirection,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            target_label: target_label.into(),
            direction,
            threshold,
        }
    }

    /// Name of the property
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State label of the target states
    pub fn get_target_label(&self) -> &str {
        &self.target_label
    }

    /// Direction of the bound
    pub fn direction(&self) -> OptimizationDirection {
        self.direction
    }

    /// Check whether the property asks for a low probability
    pub fn minimizing(&self) -> bool {
        self.direction == OptimizationDirection::Minimize
    }

    /// Bound on the reachability probability
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Check whether a reachability probability satisfies the property
    pub fn satisfied_by(&self, value: f64) -> bool {
        match self.direction {
            OptimizationDirection::Minimize => value <= self.threshold,
            OptimizationDirection::Maximize => value >= self.threshold,
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.direction {
            OptimizationDirection::Minimize => "<=",
            OptimizationDirection::Maximize => ">=",
        };
        write!(
            f,
            "{}: P{op}{} [F \"{}\"]",
            self.name, self.threshold, self.target_label
        )
    }
}
