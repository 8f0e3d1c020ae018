//! StateDelta - A change to the psychological state, plus its provenance

use serde::{Deserialize, Serialize};

use crate::domain::entities::MentalState;

/// Change applied to every mutable field of [`MentalState`]
///
/// Basic-indicator deltas are real-valued here; they are rounded when applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDelta {
    pub stress_level: f64,
    pub self_esteem: f64,
    pub social_connection: f64,
    pub academic_pressure: f64,
    pub affective_tone: f64,
    pub self_belief: f64,
    pub world_belief: f64,
    pub future_belief: f64,
    pub rumination: f64,
    pub distortions: f64,
    pub social_withdrawal: f64,
    pub avolition: f64,
}

impl StateDelta {
    pub fn zero() -> Self {
        Self::default()
    }

    fn components(&self) -> [f64; 12] {
        [
            self.stress_level,
            self.self_esteem,
            self.social_connection,
            self.academic_pressure,
            self.affective_tone,
            self.self_belief,
            self.world_belief,
            self.future_belief,
            self.rumination,
            self.distortions,
            self.social_withdrawal,
            self.avolition,
        ]
    }

    fn from_components(c: [f64; 12]) -> Self {
        Self {
            stress_level: c[0],
            self_esteem: c[1],
            social_connection: c[2],
            academic_pressure: c[3],
            affective_tone: c[4],
            self_belief: c[5],
            world_belief: c[6],
            future_belief: c[7],
            rumination: c[8],
            distortions: c[9],
            social_withdrawal: c[10],
            avolition: c[11],
        }
    }

    /// +1 where an increase is beneficial, -1 where it is harmful
    const VALENCE: [f64; 12] = [
        -1.0, 1.0, 1.0, -1.0, 1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0,
    ];

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::from_components(self.components().map(f))
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    pub fn add(&self, other: &StateDelta) -> Self {
        let a = self.components();
        let b = other.components();
        Self::from_components(std::array::from_fn(|i| a[i] + b[i]))
    }

    /// Valence-signed sum: negative when the delta is harmful overall
    pub fn total_impact(&self) -> f64 {
        self.components()
            .iter()
            .zip(Self::VALENCE)
            .map(|(v, sign)| v * sign)
            .sum()
    }

    /// L1 norm over all fields
    pub fn magnitude(&self) -> f64 {
        self.components().iter().map(|v| v.abs()).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.components().iter().all(|v| *v == 0.0)
    }

    /// Clamp basic fields to `basic` and CAD fields to `cad` (symmetric bounds)
    pub fn clamp_components(&self, basic: f64, cad: f64) -> Self {
        let mut c = self.components();
        for (i, v) in c.iter_mut().enumerate() {
            let bound = if i < 4 { basic } else { cad };
            *v = if v.is_finite() { v.clamp(-bound, bound) } else { 0.0 };
        }
        Self::from_components(c)
    }

    /// Difference between two states, `after - before`
    pub fn between(before: &MentalState, after: &MentalState) -> Self {
        let b = &before.cad;
        let a = &after.cad;
        Self {
            stress_level: (after.stress_level - before.stress_level) as f64,
            self_esteem: (after.self_esteem - before.self_esteem) as f64,
            social_connection: (after.social_connection - before.social_connection) as f64,
            academic_pressure: (after.academic_pressure - before.academic_pressure) as f64,
            affective_tone: a.affective_tone - b.affective_tone,
            self_belief: a.core_beliefs.self_belief - b.core_beliefs.self_belief,
            world_belief: a.core_beliefs.world_belief - b.core_beliefs.world_belief,
            future_belief: a.core_beliefs.future_belief - b.core_beliefs.future_belief,
            rumination: a.cognitive_processing.rumination - b.cognitive_processing.rumination,
            distortions: a.cognitive_processing.distortions - b.cognitive_processing.distortions,
            social_withdrawal: a.behavioral_inclination.social_withdrawal
                - b.behavioral_inclination.social_withdrawal,
            avolition: a.behavioral_inclination.avolition - b.behavioral_inclination.avolition,
        }
    }
}

/// Why an LLM assessment was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    Disabled,
    Timeout,
    OracleError,
    EmptyResponse,
    ParseFailure,
    LowConfidence,
    Cancelled,
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DegradeReason::Disabled => "disabled",
            DegradeReason::Timeout => "timeout",
            DegradeReason::OracleError => "oracle_error",
            DegradeReason::EmptyResponse => "empty_response",
            DegradeReason::ParseFailure => "parse_failure",
            DegradeReason::LowConfidence => "low_confidence",
            DegradeReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Confidence reported for a discarded assessment
pub const DEGRADED_CONFIDENCE: f64 = 0.3;

/// Semantic assessment of one event by the LLM oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub delta: StateDelta,
    pub confidence: f64,
    pub reasoning: String,
    pub degraded: bool,
    pub degrade_reason: Option<DegradeReason>,
}

impl Assessment {
    pub fn degraded(reason: DegradeReason, detail: impl Into<String>) -> Self {
        Self {
            delta: StateDelta::zero(),
            confidence: DEGRADED_CONFIDENCE,
            reasoning: detail.into(),
            degraded: true,
            degrade_reason: Some(reason),
        }
    }
}

/// Multipliers drawn by the stochastic layer for one delta
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticDraw {
    pub normal: f64,
    /// Extreme amplification, present when the rare draw fired
    pub extreme: Option<f64>,
    pub individual: f64,
    /// Product of the above, clamped
    pub combined: f64,
}

impl Default for StochasticDraw {
    fn default() -> Self {
        Self {
            normal: 1.0,
            extreme: None,
            individual: 1.0,
            combined: 1.0,
        }
    }
}

/// How a fused delta was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub rule_weight: f64,
    pub llm_weight: f64,
    pub llm_used: bool,
    pub llm_degraded: bool,
    pub degrade_reason: Option<DegradeReason>,
    pub llm_confidence: Option<f64>,
    pub bias_factor: f64,
    pub resilience: f64,
    pub resilience_factor: f64,
    pub stochastic: StochasticDraw,
    pub extreme_fired: bool,
    pub threshold_factor: f64,
    pub saturation_factor: f64,
    pub momentum: f64,
    pub momentum_factor: f64,
    pub rule_total: f64,
    pub fused_total: f64,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            rule_weight: 1.0,
            llm_weight: 0.0,
            llm_used: false,
            llm_degraded: false,
            degrade_reason: None,
            llm_confidence: None,
            bias_factor: 1.0,
            resilience: 0.0,
            resilience_factor: 1.0,
            stochastic: StochasticDraw::default(),
            extreme_fired: false,
            threshold_factor: 1.0,
            saturation_factor: 1.0,
            momentum: 0.0,
            momentum_factor: 1.0,
            rule_total: 0.0,
            fused_total: 0.0,
        }
    }
}
