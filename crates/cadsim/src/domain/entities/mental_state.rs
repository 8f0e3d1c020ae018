//! MentalState - The protagonist's psychological state
//!
//! Basic indicators plus the cognitive-affective (CAD) sub-state. Depression
//! level and emotion are derived fields: they are recomputed from their inputs
//! after every mutation and cannot be written from outside this module.

use serde::{Deserialize, Serialize};

use crate::config::{DepressionConstants, DynamicsConstants};
use crate::domain::entities::StateDelta;
use crate::domain::value_objects::{DepressionLevel, Emotion};

pub const BASIC_MIN: i32 = 0;
pub const BASIC_MAX: i32 = 10;
pub const BELIEF_MIN: f64 = -10.0;
pub const BELIEF_MAX: f64 = 10.0;
pub const LOAD_MIN: f64 = 0.0;
pub const LOAD_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreBeliefs {
    pub self_belief: f64,
    pub world_belief: f64,
    pub future_belief: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CognitiveProcessing {
    pub rumination: f64,
    pub distortions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehavioralInclination {
    pub social_withdrawal: f64,
    pub avolition: f64,
}

/// Cognitive-affective dynamics sub-state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CadState {
    pub affective_tone: f64,
    pub core_beliefs: CoreBeliefs,
    pub cognitive_processing: CognitiveProcessing,
    pub behavioral_inclination: BehavioralInclination,
}

impl Default for CadState {
    fn default() -> Self {
        Self {
            affective_tone: 0.0,
            core_beliefs: CoreBeliefs {
                self_belief: 1.0,
                world_belief: 0.5,
                future_belief: 1.0,
            },
            cognitive_processing: CognitiveProcessing {
                rumination: 1.0,
                distortions: 1.0,
            },
            behavioral_inclination: BehavioralInclination {
                social_withdrawal: 1.0,
                avolition: 1.0,
            },
        }
    }
}

impl CadState {
    /// Non-negative depression score; 0 for a fully healthy sub-state
    pub fn depression_score(&self, c: &DepressionConstants) -> f64 {
        let beliefs = &self.core_beliefs;
        let belief_deficit = (-beliefs.self_belief).max(0.0)
            + (-beliefs.world_belief).max(0.0)
            + (-beliefs.future_belief).max(0.0);
        let affective_deficit = (-self.affective_tone).max(0.0);
        let cognitive_load =
            self.cognitive_processing.rumination + self.cognitive_processing.distortions;
        let behavioral_load = self.behavioral_inclination.social_withdrawal
            + self.behavioral_inclination.avolition;

        c.belief_weight * belief_deficit
            + c.affect_weight * affective_deficit
            + c.cognitive_weight * cognitive_load
            + c.behavioral_weight * behavioral_load
    }

    pub fn clamp(&mut self) {
        self.affective_tone = clamp_belief(self.affective_tone);
        self.core_beliefs.self_belief = clamp_belief(self.core_beliefs.self_belief);
        self.core_beliefs.world_belief = clamp_belief(self.core_beliefs.world_belief);
        self.core_beliefs.future_belief = clamp_belief(self.core_beliefs.future_belief);
        self.cognitive_processing.rumination = clamp_load(self.cognitive_processing.rumination);
        self.cognitive_processing.distortions = clamp_load(self.cognitive_processing.distortions);
        self.behavioral_inclination.social_withdrawal =
            clamp_load(self.behavioral_inclination.social_withdrawal);
        self.behavioral_inclination.avolition = clamp_load(self.behavioral_inclination.avolition);
    }
}

pub fn derive_depression_level(cad: &CadState, c: &DepressionConstants) -> DepressionLevel {
    DepressionLevel::from_score(cad.depression_score(c), &c.thresholds)
}

/// First matching rule wins
pub fn derive_emotion(
    stress_level: i32,
    self_esteem: i32,
    level: DepressionLevel,
    affective_tone: f64,
) -> Emotion {
    if stress_level > 7 && level >= DepressionLevel::Moderate {
        Emotion::Depressed
    } else if stress_level > 7 {
        Emotion::Anxious
    } else if stress_level < 3 && self_esteem > 7 && affective_tone > 2.0 {
        Emotion::Happy
    } else if affective_tone < -3.0 {
        Emotion::Sad
    } else {
        Emotion::Neutral
    }
}

pub fn clamp_basic(value: i32) -> i32 {
    value.clamp(BASIC_MIN, BASIC_MAX)
}

pub fn clamp_belief(value: f64) -> f64 {
    value.clamp(BELIEF_MIN, BELIEF_MAX)
}

pub fn clamp_load(value: f64) -> f64 {
    value.clamp(LOAD_MIN, LOAD_MAX)
}

/// Optional overrides for the protagonist's starting state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialState {
    pub stress_level: Option<i32>,
    pub self_esteem: Option<i32>,
    pub social_connection: Option<i32>,
    pub academic_pressure: Option<i32>,
    pub affective_tone: Option<f64>,
    pub self_belief: Option<f64>,
    pub world_belief: Option<f64>,
    pub future_belief: Option<f64>,
    pub rumination: Option<f64>,
    pub distortions: Option<f64>,
    pub social_withdrawal: Option<f64>,
    pub avolition: Option<f64>,
}

/// A field that hit a bound while a delta was applied
#[derive(Debug, Clone, PartialEq)]
pub struct ClampEvent {
    pub field: &'static str,
    pub requested: f64,
    pub applied: f64,
}

impl ClampEvent {
    pub fn overshoot(&self) -> f64 {
        (self.requested - self.applied).abs()
    }
}

/// Psychological state of the protagonist (single writer: the simulation driver)
///
/// Persisted through [`MentalStateView`](crate::domain::entities::MentalStateView).
#[derive(Debug, Clone, PartialEq)]
pub struct MentalState {
    pub stress_level: i32,
    pub self_esteem: i32,
    pub social_connection: i32,
    pub academic_pressure: i32,
    pub cad: CadState,
    emotion: Emotion,
    depression_level: DepressionLevel,
}

impl MentalState {
    pub fn new(initial: &InitialState, c: &DepressionConstants) -> Self {
        let defaults = CadState::default();
        let mut state = Self {
            stress_level: initial.stress_level.unwrap_or(3),
            self_esteem: initial.self_esteem.unwrap_or(7),
            social_connection: initial.social_connection.unwrap_or(6),
            academic_pressure: initial.academic_pressure.unwrap_or(4),
            cad: CadState {
                affective_tone: initial.affective_tone.unwrap_or(defaults.affective_tone),
                core_beliefs: CoreBeliefs {
                    self_belief: initial
                        .self_belief
                        .unwrap_or(defaults.core_beliefs.self_belief),
                    world_belief: initial
                        .world_belief
                        .unwrap_or(defaults.core_beliefs.world_belief),
                    future_belief: initial
                        .future_belief
                        .unwrap_or(defaults.core_beliefs.future_belief),
                },
                cognitive_processing: CognitiveProcessing {
                    rumination: initial
                        .rumination
                        .unwrap_or(defaults.cognitive_processing.rumination),
                    distortions: initial
                        .distortions
                        .unwrap_or(defaults.cognitive_processing.distortions),
                },
                behavioral_inclination: BehavioralInclination {
                    social_withdrawal: initial
                        .social_withdrawal
                        .unwrap_or(defaults.behavioral_inclination.social_withdrawal),
                    avolition: initial
                        .avolition
                        .unwrap_or(defaults.behavioral_inclination.avolition),
                },
            },
            emotion: Emotion::Neutral,
            depression_level: DepressionLevel::Optimal,
        };
        state.clamp();
        state.refresh(c);
        state
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn depression_level(&self) -> DepressionLevel {
        self.depression_level
    }

    pub fn depression_score(&self, c: &DepressionConstants) -> f64 {
        self.cad.depression_score(c)
    }

    /// Recompute depression level and emotion from their inputs
    pub fn refresh(&mut self, c: &DepressionConstants) {
        self.depression_level = derive_depression_level(&self.cad, c);
        self.emotion = derive_emotion(
            self.stress_level,
            self.self_esteem,
            self.depression_level,
            self.cad.affective_tone,
        );
    }

    pub fn clamp(&mut self) {
        self.stress_level = clamp_basic(self.stress_level);
        self.self_esteem = clamp_basic(self.self_esteem);
        self.social_connection = clamp_basic(self.social_connection);
        self.academic_pressure = clamp_basic(self.academic_pressure);
        self.cad.clamp();
    }

    /// Apply a fused delta, clamp every field and re-derive.
    ///
    /// Basic indicators are integers; their deltas are rounded half away from
    /// zero before being added. Returns every field that hit a bound.
    pub fn apply_delta(&mut self, delta: &StateDelta, c: &DynamicsConstants) -> Vec<ClampEvent> {
        let mut clamped = Vec::new();

        let mut basic = |field: &'static str, value: &mut i32, d: f64| {
            let requested = *value as f64 + d.round();
            let applied = clamp_basic(requested as i32);
            if (requested - applied as f64).abs() > f64::EPSILON {
                clamped.push(ClampEvent {
                    field,
                    requested,
                    applied: applied as f64,
                });
            }
            *value = applied;
        };
        basic("stress_level", &mut self.stress_level, delta.stress_level);
        basic("self_esteem", &mut self.self_esteem, delta.self_esteem);
        basic("social_connection", &mut self.social_connection, delta.social_connection);
        basic("academic_pressure", &mut self.academic_pressure, delta.academic_pressure);

        let mut float = |field: &'static str, value: &mut f64, d: f64, bound: fn(f64) -> f64| {
            let requested = *value + d;
            let applied = bound(requested);
            if requested != applied {
                clamped.push(ClampEvent {
                    field,
                    requested,
                    applied,
                });
            }
            *value = applied;
        };
        let cad = &mut self.cad;
        float("affective_tone", &mut cad.affective_tone, delta.affective_tone, clamp_belief);
        float(
            "self_belief",
            &mut cad.core_beliefs.self_belief,
            delta.self_belief,
            clamp_belief,
        );
        float(
            "world_belief",
            &mut cad.core_beliefs.world_belief,
            delta.world_belief,
            clamp_belief,
        );
        float(
            "future_belief",
            &mut cad.core_beliefs.future_belief,
            delta.future_belief,
            clamp_belief,
        );
        float(
            "rumination",
            &mut cad.cognitive_processing.rumination,
            delta.rumination,
            clamp_load,
        );
        float(
            "distortions",
            &mut cad.cognitive_processing.distortions,
            delta.distortions,
            clamp_load,
        );
        float(
            "social_withdrawal",
            &mut cad.behavioral_inclination.social_withdrawal,
            delta.social_withdrawal,
            clamp_load,
        );
        float(
            "avolition",
            &mut cad.behavioral_inclination.avolition,
            delta.avolition,
            clamp_load,
        );

        self.refresh(&c.depression);

        for event in &clamped {
            if event.overshoot() > c.rules.clamp_warn_margin {
                tracing::warn!(
                    "⚠️  {} clamped: requested {:.2}, applied {:.2}",
                    event.field,
                    event.requested,
                    event.applied
                );
            } else {
                tracing::debug!(
                    "{} clamped: requested {:.2}, applied {:.2}",
                    event.field,
                    event.requested,
                    event.applied
                );
            }
        }

        clamped
    }

    /// Read a field by its flattened name, as used by conditional-event rules
    pub fn field(&self, name: &str) -> Option<f64> {
        let cad = &self.cad;
        let value = match name {
            "stress_level" => self.stress_level as f64,
            "self_esteem" => self.self_esteem as f64,
            "social_connection" => self.social_connection as f64,
            "academic_pressure" => self.academic_pressure as f64,
            "depression_level" => self.depression_level.rank() as f64,
            "affective_tone" => cad.affective_tone,
            "self_belief" => cad.core_beliefs.self_belief,
            "world_belief" => cad.core_beliefs.world_belief,
            "future_belief" => cad.core_beliefs.future_belief,
            "rumination" => cad.cognitive_processing.rumination,
            "distortions" => cad.cognitive_processing.distortions,
            "social_withdrawal" => cad.behavioral_inclination.social_withdrawal,
            "avolition" => cad.behavioral_inclination.avolition,
            _ => return None,
        };
        Some(value)
    }

    pub const FIELD_NAMES: [&'static str; 13] = [
        "stress_level",
        "self_esteem",
        "social_connection",
        "academic_pressure",
        "depression_level",
        "affective_tone",
        "self_belief",
        "world_belief",
        "future_belief",
        "rumination",
        "distortions",
        "social_withdrawal",
        "avolition",
    ];

    /// Check bounds and derivation invariants; returns the first violation
    pub fn check_invariants(&self, c: &DepressionConstants) -> Result<(), String> {
        for (name, value) in [
            ("stress_level", self.stress_level),
            ("self_esteem", self.self_esteem),
            ("social_connection", self.social_connection),
            ("academic_pressure", self.academic_pressure),
        ] {
            if !(BASIC_MIN..=BASIC_MAX).contains(&value) {
                return Err(format!("{} out of bounds: {}", name, value));
            }
        }

        let cad = &self.cad;
        for (name, value, min, max) in [
            ("affective_tone", cad.affective_tone, BELIEF_MIN, BELIEF_MAX),
            ("self_belief", cad.core_beliefs.self_belief, BELIEF_MIN, BELIEF_MAX),
            ("world_belief", cad.core_beliefs.world_belief, BELIEF_MIN, BELIEF_MAX),
            ("future_belief", cad.core_beliefs.future_belief, BELIEF_MIN, BELIEF_MAX),
            ("rumination", cad.cognitive_processing.rumination, LOAD_MIN, LOAD_MAX),
            ("distortions", cad.cognitive_processing.distortions, LOAD_MIN, LOAD_MAX),
            (
                "social_withdrawal",
                cad.behavioral_inclination.social_withdrawal,
                LOAD_MIN,
                LOAD_MAX,
            ),
            ("avolition", cad.behavioral_inclination.avolition, LOAD_MIN, LOAD_MAX),
        ] {
            if !value.is_finite() || value < min || value > max {
                return Err(format!("{} out of bounds: {}", name, value));
            }
        }

        let expected_level = derive_depression_level(&self.cad, c);
        if self.depression_level != expected_level {
            return Err(format!(
                "depression_level {} does not match derived {}",
                self.depression_level, expected_level
            ));
        }

        let expected_emotion = derive_emotion(
            self.stress_level,
            self.self_esteem,
            self.depression_level,
            self.cad.affective_tone,
        );
        if self.emotion != expected_emotion {
            return Err(format!(
                "emotion {} does not match derived {}",
                self.emotion, expected_emotion
            ));
        }

        Ok(())
    }

    /// One-line summary used in journey descriptions and logs
    pub fn summary(&self) -> String {
        format!(
            "emotion={}, depression={}, stress={}/10, self_esteem={}/10, social={}/10, \
             tone={:+.2}, beliefs(self/world/future)={:+.2}/{:+.2}/{:+.2}, rumination={:.2}, \
             withdrawal={:.2}",
            self.emotion,
            self.depression_level,
            self.stress_level,
            self.self_esteem,
            self.social_connection,
            self.cad.affective_tone,
            self.cad.core_beliefs.self_belief,
            self.cad.core_beliefs.world_belief,
            self.cad.core_beliefs.future_belief,
            self.cad.cognitive_processing.rumination,
            self.cad.behavioral_inclination.social_withdrawal,
        )
    }
}

impl Default for MentalState {
    fn default() -> Self {
        Self::new(&InitialState::default(), &DepressionConstants::default())
    }
}
