//! Fusion Calculator - Combines rule and LLM deltas into the applied delta
//!
//! Stages, in order: weighted mean, bidirectional adjustment, stochastic
//! layer, nonlinear shaping. The only state carried between calls is the
//! momentum window of recent fused totals.

use std::collections::VecDeque;

use rand::Rng;

use crate::config::{DepressionConstants, FusionConstants, SimulationConfig};
use crate::domain::entities::{Assessment, MentalState, Personality, Provenance, StateDelta};
use crate::domain::services::StochasticLayer;

/// Result of fusing one event
#[derive(Debug, Clone, PartialEq)]
pub struct FusedDelta {
    pub delta: StateDelta,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub struct FusionCalculator {
    w_rule: f64,
    w_llm: f64,
    nonlinear_enabled: bool,
    c: FusionConstants,
    depression: DepressionConstants,
    stochastic: StochasticLayer,
    momentum: VecDeque<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl FusionCalculator {
    pub fn new(config: &SimulationConfig) -> Self {
        let (w_rule, w_llm) = config.normalized_weights();
        let constants = &config.constants;
        Self {
            w_rule,
            w_llm,
            nonlinear_enabled: config.fusion.nonlinear_enabled,
            c: constants.fusion.clone(),
            depression: constants.depression.clone(),
            stochastic: StochasticLayer::new(
                config.stochastic.clone(),
                constants.stochastic.clone(),
            ),
            momentum: VecDeque::with_capacity(constants.fusion.momentum_window),
        }
    }

    /// Resilience score in [0, 1]
    pub fn resilience(&self, state: &MentalState) -> f64 {
        let [w_esteem, w_social, w_calm, w_belief] = self.c.resilience_weights;
        let score = w_esteem * state.self_esteem as f64 / 10.0
            + w_social * state.social_connection as f64 / 10.0
            + w_calm * (10 - state.stress_level) as f64 / 10.0
            + w_belief * (state.cad.core_beliefs.self_belief + 10.0) / 20.0;
        score.clamp(0.0, 1.0)
    }

    /// Weighted mean of the recent fused totals, most recent weighted highest
    pub fn momentum(&self) -> f64 {
        if self.momentum.is_empty() {
            return 0.0;
        }
        let mut weighted = 0.0;
        let mut weights = 0.0;
        for (k, total) in self.momentum.iter().rev().enumerate() {
            let w = self.c.momentum_recency_decay.powi(k as i32);
            weighted += w * total;
            weights += w;
        }
        weighted / weights * self.c.momentum_scale
    }

    pub fn momentum_history(&self) -> impl Iterator<Item = &f64> {
        self.momentum.iter()
    }

    /// Fuse one event's rule delta with an optional LLM assessment
    pub fn fuse<R: Rng + ?Sized>(
        &mut self,
        rule: &StateDelta,
        llm: Option<&Assessment>,
        state: &MentalState,
        personality: &Personality,
        social_event: bool,
        rng: &mut R,
    ) -> FusedDelta {
        let c = &self.c;
        let mut provenance = Provenance {
            rule_total: rule.total_impact(),
            ..Provenance::default()
        };

        // 1. weighted mean; a discarded assessment leaves the rule delta alone
        let mut fused = match llm {
            Some(assessment) if !assessment.degraded => {
                provenance.llm_used = true;
                provenance.rule_weight = self.w_rule;
                provenance.llm_weight = self.w_llm;
                provenance.llm_confidence = Some(assessment.confidence);
                rule.scale(self.w_rule)
                    .add(&assessment.delta.scale(self.w_llm))
            }
            Some(assessment) => {
                provenance.llm_degraded = true;
                provenance.degrade_reason = assessment.degrade_reason;
                provenance.llm_confidence = Some(assessment.confidence);
                *rule
            }
            None => *rule,
        };

        // 2. bidirectional adjustment
        let harmful = fused.total_impact() < 0.0;
        let resilience = self.resilience(state);
        provenance.resilience = resilience;
        let boost = 1.0 + resilience * c.resilience_factor * c.positive_resilience_share;
        // a harmful delta never ends up weaker than the same delta read as beneficial
        let harmful_floor = c.positivity_reduction * boost * c.negativity_floor;
        if harmful {
            provenance.bias_factor = c.negativity_bias;
            provenance.resilience_factor = (1.0 - resilience * c.resilience_factor)
                .max(harmful_floor / c.negativity_bias);
        } else {
            provenance.bias_factor = c.positivity_reduction;
            provenance.resilience_factor = boost;
        }
        let adjustment = provenance.bias_factor * provenance.resilience_factor;
        fused = fused.scale(adjustment);

        // 3. stochastic layer
        let draw = self
            .stochastic
            .draw(rng, fused.total_impact(), personality, social_event);
        provenance.extreme_fired = draw.extreme.is_some();
        provenance.stochastic = draw;
        fused = self.stochastic.apply(&fused, &draw);

        // 4. nonlinear shaping
        if self.nonlinear_enabled {
            let total = fused.total_impact();

            provenance.threshold_factor = if total.abs() < c.threshold_cutoff {
                c.below_threshold_factor
            } else {
                c.above_threshold_factor
            };

            if total < 0.0 {
                let score = state.depression_score(&self.depression);
                let saturation = sigmoid(
                    c.saturation_gain * (c.saturation_midpoint - score / c.saturation_scale),
                );
                provenance.saturation_factor =
                    saturation.max(harmful_floor / adjustment).min(1.0);
            }

            let momentum = self.momentum();
            provenance.momentum = momentum;
            if momentum != 0.0 && total != 0.0 {
                let factor = if momentum.signum() == total.signum() {
                    1.0 + momentum.abs() * c.momentum_same_sign
                } else {
                    1.0 - momentum.abs() * c.momentum_opposite_sign
                };
                provenance.momentum_factor =
                    factor.clamp(c.momentum_factor_min, c.momentum_factor_max);
            }

            fused = fused.scale(
                provenance.threshold_factor
                    * provenance.saturation_factor
                    * provenance.momentum_factor,
            );
        }

        provenance.fused_total = fused.total_impact();
        self.momentum.push_back(provenance.fused_total);
        while self.momentum.len() > self.c.momentum_window {
            self.momentum.pop_front();
        }

        FusedDelta {
            delta: fused,
            provenance,
        }
    }
}
