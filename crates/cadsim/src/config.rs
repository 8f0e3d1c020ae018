//! Run configuration and the dynamics constants table
//!
//! Every numeric constant the engine uses lives in [`DynamicsConstants`]. The
//! defaults are the reference values the test suite asserts against; a run
//! may override any of them through [`SimulationConfig::constants`].

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Immutable configuration for a single simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the run RNG
    pub seed: u64,
    /// Length of the virtual horizon in days
    pub total_days: u32,
    /// Number of generated events per day (inclusive range)
    pub events_per_day: EventsPerDay,
    pub llm: LlmSettings,
    pub fusion: FusionSettings,
    pub stochastic: StochasticSettings,
    /// Probability that a generated event is varied by the LLM
    pub p_llm: f64,
    /// Root directory for run logs (`<log_dir>/<run_id>/day_<N>.json`)
    pub log_dir: PathBuf,
    /// Virtual clock origin for event timestamps
    pub start_date: DateTime<Utc>,
    pub constants: DynamicsConstants,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_days: 30,
            events_per_day: EventsPerDay::default(),
            llm: LlmSettings::default(),
            fusion: FusionSettings::default(),
            stochastic: StochasticSettings::default(),
            p_llm: 0.3,
            log_dir: PathBuf::from("logs"),
            start_date: default_start_date(),
            constants: DynamicsConstants::default(),
        }
    }
}

fn default_start_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl SimulationConfig {
    /// Configuration with every LLM subsystem disabled
    pub fn rule_only(seed: u64, total_days: u32) -> Self {
        Self {
            seed,
            total_days,
            llm: LlmSettings::disabled(),
            ..Self::default()
        }
    }

    /// Configuration with the stochastic layer reduced to the personality term
    pub fn deterministic(mut self) -> Self {
        self.stochastic.sigma = 0.0;
        self.stochastic.p_extreme = 0.0;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.total_days == 0 {
            return Err(DomainError::Validation(
                "total_days must be at least 1".to_string(),
            ));
        }
        if self.events_per_day.min > self.events_per_day.max {
            return Err(DomainError::Validation(format!(
                "events_per_day.min ({}) exceeds events_per_day.max ({})",
                self.events_per_day.min, self.events_per_day.max
            )));
        }
        if self.fusion.w_rule < 0.0 || self.fusion.w_llm < 0.0 {
            return Err(DomainError::Validation(
                "fusion weights must be non-negative".to_string(),
            ));
        }
        if self.fusion.w_rule + self.fusion.w_llm <= 0.0 {
            return Err(DomainError::Validation(
                "fusion weights must not both be zero".to_string(),
            ));
        }
        for (name, p) in [
            ("p_llm", self.p_llm),
            ("stochastic.p_extreme", self.stochastic.p_extreme),
            ("llm.confidence_threshold", self.llm.confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DomainError::Validation(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if !self.stochastic.sigma.is_finite() || self.stochastic.sigma < 0.0 {
            return Err(DomainError::Validation(format!(
                "stochastic.sigma must be a non-negative number, got {}",
                self.stochastic.sigma
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(DomainError::Validation(
                "llm.timeout_secs must be positive".to_string(),
            ));
        }
        let thresholds = &self.constants.depression.thresholds;
        let out_of_order = thresholds
            .windows(2)
            .find(|pair| pair[0].partial_cmp(&pair[1]) != Some(std::cmp::Ordering::Less));
        if let Some(pair) = out_of_order {
            return Err(DomainError::Validation(format!(
                "constants.depression.thresholds must be strictly ascending, got {} before {}",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }

    /// Fusion weights normalized to sum to one
    pub fn normalized_weights(&self) -> (f64, f64) {
        let total = self.fusion.w_rule + self.fusion.w_llm;
        if total <= 0.0 {
            return (1.0, 0.0);
        }
        (self.fusion.w_rule / total, self.fusion.w_llm / total)
    }

    pub fn llm_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.llm.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventsPerDay {
    pub min: u32,
    pub max: u32,
}

impl Default for EventsPerDay {
    fn default() -> Self {
        Self { min: 3, max: 6 }
    }
}

impl EventsPerDay {
    pub fn fixed(count: u32) -> Self {
        Self {
            min: count,
            max: count,
        }
    }
}

/// Per-subsystem LLM switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub assessor_enabled: bool,
    pub generator_enabled: bool,
    pub analysis_enabled: bool,
    /// Timeout per oracle call
    pub timeout_secs: u64,
    /// Assessments below this confidence are discarded
    pub confidence_threshold: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            assessor_enabled: true,
            generator_enabled: true,
            analysis_enabled: true,
            timeout_secs: 20,
            confidence_threshold: 0.6,
        }
    }
}

impl LlmSettings {
    pub fn disabled() -> Self {
        Self {
            assessor_enabled: false,
            generator_enabled: false,
            analysis_enabled: false,
            ..Self::default()
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.assessor_enabled || self.generator_enabled || self.analysis_enabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub w_rule: f64,
    pub w_llm: f64,
    /// Threshold, saturation and momentum shaping
    pub nonlinear_enabled: bool,
    /// Run rule evaluation and LLM assessment concurrently
    pub parallel_assessment: bool,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            w_rule: 0.6,
            w_llm: 0.4,
            nonlinear_enabled: true,
            parallel_assessment: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticSettings {
    /// Standard deviation of the normal variation multiplier
    pub sigma: f64,
    /// Probability of an extreme-event amplification
    pub p_extreme: f64,
}

impl Default for StochasticSettings {
    fn default() -> Self {
        Self {
            sigma: 0.3,
            p_extreme: 0.05,
        }
    }
}

/// The single table of numeric constants used by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DynamicsConstants {
    pub depression: DepressionConstants,
    pub rules: RuleConstants,
    pub evolution: EvolutionConstants,
    pub fusion: FusionConstants,
    pub stochastic: StochasticConstants,
    pub events: EventConstants,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DepressionConstants {
    pub belief_weight: f64,
    pub affect_weight: f64,
    pub cognitive_weight: f64,
    pub behavioral_weight: f64,
    /// Exclusive upper bounds of levels OPTIMAL..VERY_SEVERE
    pub thresholds: [f64; 9],
}

impl Default for DepressionConstants {
    fn default() -> Self {
        Self {
            belief_weight: 0.35,
            affect_weight: 0.25,
            cognitive_weight: 0.20,
            behavioral_weight: 0.20,
            thresholds: [0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 8.0, 11.0, 15.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleConstants {
    pub negative_stress_divisor: f64,
    pub negative_esteem_divisor: f64,
    pub negative_academic_divisor: f64,
    pub negative_social_divisor: f64,
    pub negative_tone_divisor: f64,
    pub positive_stress_divisor: f64,
    pub positive_esteem_divisor: f64,
    pub positive_social_divisor: f64,
    pub positive_tone_divisor: f64,
    pub self_belief_share: f64,
    pub world_belief_share: f64,
    pub future_belief_share: f64,
    /// Extra self-belief share applied while affective tone is already low
    pub negativity_amplification_share: f64,
    pub negativity_amplification_tone: f64,
    /// Muting factor for positive belief updates
    pub positivity_reduction: f64,
    pub rumination_belief_floor: f64,
    pub rumination_divisor: f64,
    pub withdrawal_belief_floor: f64,
    pub withdrawal_divisor: f64,
    /// Weight kept by future belief when it drifts toward the other beliefs
    pub future_inertia: f64,
    pub rumination_promotion_threshold: f64,
    pub distortion_threshold: f64,
    pub distortion_divisor: f64,
    pub low_mood_rumination: f64,
    pub depressed_avolition: f64,
    /// Overshoot beyond a bound that is logged as a warning
    pub clamp_warn_margin: f64,
}

impl Default for RuleConstants {
    fn default() -> Self {
        Self {
            negative_stress_divisor: 2.0,
            negative_esteem_divisor: 3.0,
            negative_academic_divisor: 3.0,
            negative_social_divisor: 4.0,
            negative_tone_divisor: 15.0,
            positive_stress_divisor: 3.0,
            positive_esteem_divisor: 3.0,
            positive_social_divisor: 4.0,
            positive_tone_divisor: 20.0,
            self_belief_share: 0.4,
            world_belief_share: 0.5,
            future_belief_share: 0.3,
            negativity_amplification_share: 0.26,
            negativity_amplification_tone: -3.0,
            positivity_reduction: 0.8,
            rumination_belief_floor: -2.0,
            rumination_divisor: 4.0,
            withdrawal_belief_floor: -2.0,
            withdrawal_divisor: 3.0,
            future_inertia: 0.8,
            rumination_promotion_threshold: 6.0,
            distortion_threshold: 5.0,
            distortion_divisor: 10.0,
            low_mood_rumination: 0.3,
            depressed_avolition: 0.4,
            clamp_warn_margin: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvolutionConstants {
    pub isolation_threshold: f64,
    pub isolation_divisor: f64,
    pub isolation_world_share: f64,
    pub avolition_threshold: f64,
    pub avolition_divisor: f64,
    pub rumination_decay: f64,
    pub distortions_decay: f64,
    pub tone_decay: f64,
    pub withdrawal_decay: f64,
    pub avolition_decay: f64,
    pub bonus_window: usize,
    pub bonus_impact_threshold: i32,
    pub bonus_min_count: usize,
    pub bonus_per_event: f64,
    pub bonus_tone_share: f64,
}

impl Default for EvolutionConstants {
    fn default() -> Self {
        Self {
            isolation_threshold: 5.0,
            isolation_divisor: 20.0,
            isolation_world_share: 0.8,
            avolition_threshold: 6.0,
            avolition_divisor: 25.0,
            rumination_decay: 0.96,
            distortions_decay: 0.98,
            tone_decay: 0.99,
            withdrawal_decay: 0.97,
            avolition_decay: 0.97,
            bonus_window: 5,
            bonus_impact_threshold: 3,
            bonus_min_count: 2,
            bonus_per_event: 0.1,
            bonus_tone_share: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionConstants {
    pub negativity_bias: f64,
    pub positivity_reduction: f64,
    /// Weights of (self_esteem, social_connection, calm, self_belief)
    pub resilience_weights: [f64; 4],
    pub resilience_factor: f64,
    /// Share of the resilience factor applied as a boost to positive deltas
    pub positive_resilience_share: f64,
    /// Harmful deltas keep at least this multiple of the beneficial multiplier
    /// through the resilience and saturation discounts
    pub negativity_floor: f64,
    pub threshold_cutoff: f64,
    pub below_threshold_factor: f64,
    pub above_threshold_factor: f64,
    pub saturation_gain: f64,
    pub saturation_midpoint: f64,
    pub saturation_scale: f64,
    pub momentum_window: usize,
    pub momentum_recency_decay: f64,
    pub momentum_scale: f64,
    pub momentum_same_sign: f64,
    pub momentum_opposite_sign: f64,
    pub momentum_factor_min: f64,
    pub momentum_factor_max: f64,
}

impl Default for FusionConstants {
    fn default() -> Self {
        Self {
            negativity_bias: 1.3,
            positivity_reduction: 0.8,
            resilience_weights: [0.3, 0.3, 0.2, 0.2],
            resilience_factor: 0.5,
            positive_resilience_share: 0.5,
            negativity_floor: 1.01,
            threshold_cutoff: 3.0,
            below_threshold_factor: 0.3,
            above_threshold_factor: 1.5,
            saturation_gain: 5.0,
            saturation_midpoint: 0.5,
            saturation_scale: 27.0,
            momentum_window: 5,
            momentum_recency_decay: 0.9,
            momentum_scale: 0.9,
            momentum_same_sign: 0.1,
            momentum_opposite_sign: 0.05,
            momentum_factor_min: 0.5,
            momentum_factor_max: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StochasticConstants {
    pub normal_min: f64,
    pub normal_max: f64,
    pub gamma_shape: f64,
    pub gamma_scale: f64,
    pub beta_alpha: f64,
    pub beta_beta: f64,
    pub beta_low: f64,
    pub beta_high: f64,
    pub multiplier_min: f64,
    pub multiplier_max: f64,
    pub neuroticism_negative: f64,
    pub conscientiousness_negative: f64,
    pub extraversion_social_negative: f64,
    pub neuroticism_positive: f64,
    pub extraversion_positive: f64,
    pub openness_positive: f64,
    pub extraversion_social_positive: f64,
}

impl Default for StochasticConstants {
    fn default() -> Self {
        Self {
            normal_min: 0.1,
            normal_max: 3.0,
            gamma_shape: 2.0,
            gamma_scale: 1.5,
            beta_alpha: 2.0,
            beta_beta: 5.0,
            beta_low: 0.5,
            beta_high: 2.0,
            multiplier_min: 0.2,
            multiplier_max: 2.5,
            neuroticism_negative: 0.08,
            conscientiousness_negative: 0.03,
            extraversion_social_negative: 0.04,
            neuroticism_positive: 0.04,
            extraversion_positive: 0.05,
            openness_positive: 0.03,
            extraversion_social_positive: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventConstants {
    pub positive_impact: (i32, i32),
    pub negative_impact: (i32, i32),
    pub neutral_impact: (i32, i32),
    pub conditional_impact: (i32, i32),
    pub conditional_stress_threshold: i32,
    pub conditional_stress_factor: f64,
    pub conditional_depression_factor: f64,
    /// Capacity of the generator's recent-description history
    pub history_capacity: usize,
    /// Attempts at picking a template not in recent history
    pub template_retries: usize,
    /// Events fed to the LLM assessor as recent context
    pub recent_context: usize,
}

impl Default for EventConstants {
    fn default() -> Self {
        Self {
            positive_impact: (2, 5),
            negative_impact: (-6, -2),
            neutral_impact: (-1, 1),
            conditional_impact: (-6, -3),
            conditional_stress_threshold: 7,
            conditional_stress_factor: 1.3,
            conditional_depression_factor: 1.5,
            history_capacity: 50,
            template_retries: 3,
            recent_context: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_event_range() {
        let config = SimulationConfig {
            events_per_day: EventsPerDay { min: 5, max: 2 },
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_rejects_unordered_depression_thresholds() {
        let mut config = SimulationConfig::default();
        config.constants.depression.thresholds[4] = config.constants.depression.thresholds[2];
        assert!(matches!(config.validate(), Err(DomainError::Validation(_))));

        let mut config = SimulationConfig::default();
        config.constants.depression.thresholds[8] = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weights_are_normalized() {
        let mut config = SimulationConfig::default();
        config.fusion.w_rule = 3.0;
        config.fusion.w_llm = 1.0;
        assert_eq!(config.normalized_weights(), (0.75, 0.25));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let json = r#"{ "seed": 7, "constants": { "fusion": { "negativity_bias": 1.5 } } }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.constants.fusion.negativity_bias, 1.5);
        assert_eq!(config.constants.fusion.positivity_reduction, 0.8);
        assert_eq!(config.total_days, 30);
    }
}
