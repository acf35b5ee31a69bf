//! Configuration options of the synthesizer
//!
//! This module ties together the options of the quotient container and of the
//! synthesis loop, so that they can be read from a single configuration file or
//! from environment variables.

use serde::Deserialize;

use qsynth_quotient::config::{
    InfeasibleActionMode, QuotientConfig, SynthesisConfig, SynthesisMethod,
};

/// Type representing configuration options of `qsynth`
///
/// This type implements `serde::Deserialize` to easily parse the configuration
/// out of structured configuration.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct QSynthConfig {
    /// Options of the quotient container
    quotient: Option<QuotientConfig>,
    /// Options of the synthesis loop
    synthesis: Option<SynthesisConfig>,
}

impl QSynthConfig {
    /// Get the quotient configuration, or the default if none was given
    pub fn get_quotient_cfg(&self) -> QuotientConfig {
        self.quotient.clone().unwrap_or_default()
    }

    /// Get the synthesis configuration, or the default if none was given
    pub fn get_synthesis_cfg(&self) -> SynthesisConfig {
        self.synthesis.unwrap_or_default()
    }

    /// Override the precision of the game abstraction solver
    pub fn set_model_checking_precision(&mut self, precision: f64) {
        let mut cfg = self.get_quotient_cfg();
        cfg.set_model_checking_precision(precision);
        self.quotient = Some(cfg);
    }

    /// Override how policy repair treats infeasible actions
    pub fn set_infeasible_action(&mut self, mode: InfeasibleActionMode) {
        let mut cfg = self.get_quotient_cfg();
        cfg.set_infeasible_action(mode);
        self.quotient = Some(cfg);
    }

    /// Override the exploration strategy of the synthesizer
    pub fn set_method(&mut self, method: SynthesisMethod) {
        let mut cfg = self.get_synthesis_cfg();
        cfg.set_method(method);
        self.synthesis = Some(cfg);
    }

    /// Override whether the search stops at the first solved family
    pub fn set_incomplete_search(&mut self, incomplete_search: bool) {
        let mut cfg = self.get_synthesis_cfg();
        cfg.set_incomplete_search(incomplete_search);
        self.synthesis = Some(cfg);
    }
}

#[cfg(test)]
mod tests {
    use qsynth_quotient::config::{
        InfeasibleActionMode, QuotientConfig, SynthesisConfig, SynthesisMethod,
    };

    use crate::qsynth_config::QSynthConfig;

    #[test]
    fn test_qsynth_config() {
        let json_data = "{
            \"quotient\": {
                \"model_checking_precision\": 1e-6,
                \"infeasible_action\": \"Reject\"
            },
            \"synthesis\": {
                \"incomplete_search\": true,
                \"method\": \"OneByOne\"
            }
        }";

        let config: QSynthConfig = serde_json::from_str(json_data).unwrap();

        assert_eq!(
            config.get_quotient_cfg(),
            QuotientConfig::new(1e-6, InfeasibleActionMode::Reject)
        );
        assert_eq!(
            config.get_synthesis_cfg(),
            SynthesisConfig::new(true, SynthesisMethod::OneByOne)
        );
    }

    #[test]
    fn test_qsynth_config_defaults_and_overrides() {
        let config: QSynthConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, QSynthConfig::default());
        assert_eq!(config.get_quotient_cfg(), QuotientConfig::default());
        assert!(!config.get_synthesis_cfg().incomplete_search());

        let mut config = QSynthConfig::default();
        config.set_model_checking_precision(1e-8);
        config.set_infeasible_action(InfeasibleActionMode::Reject);
        config.set_incomplete_search(true);
        config.set_method(SynthesisMethod::OneByOne);
        assert_eq!(
            config.get_quotient_cfg(),
            QuotientConfig::new(1e-8, InfeasibleActionMode::Reject)
        );
        assert!(config.get_synthesis_cfg().incomplete_search());
        assert_eq!(config.get_synthesis_cfg().method(), SynthesisMethod::OneByOne);
    }
}
