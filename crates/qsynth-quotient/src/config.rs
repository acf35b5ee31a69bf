//! Configuration of the quotient container and of the synthesis loop
//!
//! Configuration is passed explicitly to the constructors of
//! [`crate::MdpFamilyQuotient`] and [`crate::synthesizer::PolicySynthesizer`].
//! With the feature `config_deserialize` enabled, both types can be parsed
//! from structured configuration files.

use std::fmt;

#[cfg(feature = "config_deserialize")]
use serde::Deserialize;

/// Default convergence threshold of value iteration
pub const DEFAULT_MODEL_CHECKING_PRECISION: f64 = 1e-4;

/// Behavior of policy repair if the action picked in a reachable state has no
/// choice that is legal in the family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub enum InfeasibleActionMode {
    /// Mark no choice for the state and continue
    #[default]
    Accept,
    /// Abort policy repair with [`crate::error::PolicyError::NoLegalChoice`]
    Reject,
}

/// Configuration of a [`crate::MdpFamilyQuotient`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub struct QuotientConfig {
    /// Precision forwarded to the game abstraction solver
    #[cfg_attr(
        feature = "config_deserialize",
        serde(default = "default_model_checking_precision")
    )]
    model_checking_precision: f64,
    /// How policy repair treats infeasible actions
    #[cfg_attr(feature = "config_deserialize", serde(default))]
    infeasible_action: InfeasibleActionMode,
}

/// Function to get the default value for the `model_checking_precision` field
#[cfg(feature = "config_deserialize")]
fn default_model_checking_precision() -> f64 {
    DEFAULT_MODEL_CHECKING_PRECISION
}

impl Default for QuotientConfig {
    fn default() -> Self {
        Self {
            model_checking_precision: DEFAULT_MODEL_CHECKING_PRECISION,
            infeasible_action: InfeasibleActionMode::default(),
        }
    }
}

impl QuotientConfig {
    /// Create a new configuration
    pub fn new(model_checking_precision: f64, infeasible_action: InfeasibleActionMode) -> Self {
        Self {
            model_checking_precision,
            infeasible_action,
        }
    }

    /// Precision forwarded to the game abstraction solver
    pub fn model_checking_precision(&self) -> f64 {
        self.model_checking_precision
    }

    /// Set the precision forwarded to the game abstraction solver
    pub fn set_model_checking_precision(&mut self, precision: f64) {
        self.model_checking_precision = precision;
    }

    /// How policy repair treats infeasible actions
    pub fn infeasible_action(&self) -> InfeasibleActionMode {
        self.infeasible_action
    }

    /// Set how policy repair treats infeasible actions
    pub fn set_infeasible_action(&mut self, mode: InfeasibleActionMode) {
        self.infeasible_action = mode;
    }
}

/// How the synthesizer explores the design space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub enum SynthesisMethod {
    /// Analyze every member of the design space on its own
    #[cfg_attr(feature = "config_deserialize", serde(alias = "onebyone"))]
    OneByOne,
    /// Analyze whole families and split the ones that are not decided
    #[default]
    #[cfg_attr(feature = "config_deserialize", serde(alias = "ar"))]
    AbstractionRefinement,
}

impl fmt::Display for SynthesisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisMethod::OneByOne => write!(f, "one-by-one"),
            SynthesisMethod::AbstractionRefinement => write!(f, "abstraction refinement"),
        }
    }
}

/// Configuration of a [`crate::synthesizer::PolicySynthesizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub struct SynthesisConfig {
    /// Stop the search as soon as one family is solved
    #[cfg_attr(feature = "config_deserialize", serde(default))]
    incomplete_search: bool,
    /// Exploration strategy
    #[cfg_attr(feature = "config_deserialize", serde(default))]
    method: SynthesisMethod,
}

impl SynthesisConfig {
    /// Create a new configuration
    pub fn new(incomplete_search: bool, method: SynthesisMethod) -> Self {
        Self {
            incomplete_search,
            method,
        }
    }

    /// Exploration strategy
    pub fn method(&self) -> SynthesisMethod {
        self.method
    }

    /// Set the exploration strategy
    pub fn set_method(&mut self, method: SynthesisMethod) {
        self.method = method;
    }

    /// Whether the search stops at the first solved family
    pub fn incomplete_search(&self) -> bool {
        self.incomplete_search
    }

    /// Set whether the search stops at the first solved family
    pub fn set_incomplete_search(&mut self, incomplete_search: bool) {
        self.incomplete_search = incomplete_search;
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_MODEL_CHECKING_PRECISION, InfeasibleActionMode, QuotientConfig};

    #[test]
    fn test_default_quotient_config() {
        let cfg = QuotientConfig::default();
        assert_eq!(cfg.model_checking_precision(), DEFAULT_MODEL_CHECKING_PRECISION);
        assert_eq!(cfg.infeasible_action(), InfeasibleActionMode::Accept);
    }

    #[test]
    #[cfg(feature = "config_deserialize")]
    fn test_deserialize_quotient_config() {
        let json_data = "{
            \"model_checking_precision\": 1e-6,
            \"infeasible_action\": \"Reject\"
        }";
        let cfg: QuotientConfig = serde_json::from_str(json_data).unwrap();
        assert_eq!(cfg, QuotientConfig::new(1e-6, InfeasibleActionMode::Reject));

        let cfg: QuotientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, QuotientConfig::default());
    }

    #[test]
    #[cfg(feature = "config_deserialize")]
    fn test_deserialize_synthesis_config() {
        use super::{SynthesisConfig, SynthesisMethod};

        let cfg: SynthesisConfig =
            serde_json::from_str("{ \"incomplete_search\": true }").unwrap();
        assert!(cfg.incomplete_search());
        assert_eq!(cfg.method(), SynthesisMethod::AbstractionRefinement);

        let cfg: SynthesisConfig = serde_json::from_str("{ \"method\": \"onebyone\" }").unwrap();
        assert_eq!(cfg, SynthesisConfig::new(false, SynthesisMethod::OneByOne));

        let cfg: SynthesisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SynthesisConfig::default());
    }
}
