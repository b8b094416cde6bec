//! Operator and runtime configuration.
//!
//! Every struct deserializes from JSON with missing fields taking their
//! defaults, so a config file only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, Result};

/// Configuration for the mutation operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Probability of mutating each enabled connection's weight.
    pub weight_mutation_prob: f64,
    /// Half-width of the uniform perturbation added to a weight.
    pub weight_mutation_power: f64,
    /// Probability that a weight mutation replaces instead of perturbs.
    pub weight_replace_prob: f64,
    /// Range for new and replaced weights: [-weight_range, weight_range].
    pub weight_range: f64,
    /// Probability of toggling one connection's enabled flag.
    pub toggle_prob: f64,
    /// Probability of attempting one new connection.
    pub add_connection_prob: f64,
    /// Probability of splitting one enabled connection.
    pub add_neuron_prob: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            weight_mutation_prob: 0.8,
            weight_mutation_power: 0.5,
            weight_replace_prob: 0.1,
            weight_range: 1.0,
            toggle_prob: 0.01,
            add_connection_prob: 0.05,
            add_neuron_prob: 0.03,
        }
    }
}

impl MutationConfig {
    /// Only weights change; the graph shape is frozen.
    #[must_use]
    pub fn weights_only() -> Self {
        Self {
            toggle_prob: 0.0,
            add_connection_prob: 0.0,
            add_neuron_prob: 0.0,
            ..Default::default()
        }
    }

    /// Aggressive structural search, useful for growing small seed genomes.
    #[must_use]
    pub fn structural() -> Self {
        Self {
            toggle_prob: 0.05,
            add_connection_prob: 0.5,
            add_neuron_prob: 0.2,
            ..Default::default()
        }
    }

    /// # Errors
    ///
    /// [`ControllerError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        probability("weight_mutation_prob", self.weight_mutation_prob)?;
        probability("weight_replace_prob", self.weight_replace_prob)?;
        probability("toggle_prob", self.toggle_prob)?;
        probability("add_connection_prob", self.add_connection_prob)?;
        probability("add_neuron_prob", self.add_neuron_prob)?;
        magnitude("weight_mutation_power", self.weight_mutation_power)?;
        magnitude("weight_range", self.weight_range)
    }
}

/// Which matched connections a crossover child inherits as enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnablePolicy {
    /// Enabled if enabled in at least one parent.
    #[default]
    EitherParent,
    /// Enabled only if enabled in both parents.
    BothParents,
}

impl EnablePolicy {
    #[must_use]
    pub fn resolve(self, a: bool, b: bool) -> bool {
        match self {
            Self::EitherParent => a || b,
            Self::BothParents => a && b,
        }
    }
}

/// Configuration for the crossover operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub enable_policy: EnablePolicy,
    /// Reject parents whose sensor/actuator sets differ.
    pub require_matching_interface: bool,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            enable_policy: EnablePolicy::EitherParent,
            require_matching_interface: true,
        }
    }
}

/// Everything the controller runtime needs to breed and mutate agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub mutation: MutationConfig,
    pub crossover: CrossoverConfig,
}

impl ControllerConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidConfig`] if the text is not valid JSON for
    /// this shape or a value is out of range.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| ControllerError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// [`ControllerError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.mutation.validate()
    }
}

fn probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ControllerError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

fn magnitude(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ControllerError::InvalidConfig(format!(
            "{name} must be finite and non-negative, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
        assert!(MutationConfig::weights_only().validate().is_ok());
        assert!(MutationConfig::structural().validate().is_ok());
    }

    #[test]
    fn test_from_json_partial_document() {
        let config = ControllerConfig::from_json_str(
            r#"{"mutation": {"add_neuron_prob": 0.5}, "crossover": {"enable_policy": "both_parents"}}"#,
        )
        .unwrap();
        assert_eq!(config.mutation.add_neuron_prob, 0.5);
        assert_eq!(config.mutation.weight_range, 1.0);
        assert_eq!(config.crossover.enable_policy, EnablePolicy::BothParents);
        assert!(config.crossover.require_matching_interface);
    }

    #[test]
    fn test_from_json_rejects_out_of_range() {
        let err = ControllerConfig::from_json_str(r#"{"mutation": {"toggle_prob": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(ref msg) if msg.contains("toggle_prob")));

        let err = ControllerConfig::from_json_str(r#"{"mutation": {"weight_range": -1.0}}"#)
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ControllerConfig::from_json_str("not json"),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_enable_policy() {
        assert!(EnablePolicy::EitherParent.resolve(true, false));
        assert!(!EnablePolicy::BothParents.resolve(true, false));
        assert!(EnablePolicy::BothParents.resolve(true, true));
        assert!(!EnablePolicy::EitherParent.resolve(false, false));
    }
}
