//! Snapshots - Persisted per-day state and the end-of-run report
//!
//! These are plain data views. Loading a snapshot never produces a
//! [`MentalState`] directly; [`MentalState::from_view`] re-derives the
//! computed fields from the stored inputs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DepressionConstants;
use crate::domain::entities::{
    CadState, Character, LifeEvent, MentalState, Provenance, Relationship, StateDelta,
};
use crate::domain::value_objects::{DepressionLevel, Emotion};

/// Wire shape of a mental state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentalStateView {
    pub emotion: Emotion,
    pub depression_level: DepressionLevel,
    pub stress_level: i32,
    pub self_esteem: i32,
    pub social_connection: i32,
    pub academic_pressure: i32,
    pub cad_state: CadState,
}

impl From<&MentalState> for MentalStateView {
    fn from(state: &MentalState) -> Self {
        Self {
            emotion: state.emotion(),
            depression_level: state.depression_level(),
            stress_level: state.stress_level,
            self_esteem: state.self_esteem,
            social_connection: state.social_connection,
            academic_pressure: state.academic_pressure,
            cad_state: state.cad,
        }
    }
}

impl MentalState {
    /// Rebuild a state from a stored view; derived fields are recomputed
    pub fn from_view(view: &MentalStateView, c: &DepressionConstants) -> Self {
        let mut state = MentalState::default();
        state.stress_level = view.stress_level;
        state.self_esteem = view.self_esteem;
        state.social_connection = view.social_connection;
        state.academic_pressure = view.academic_pressure;
        state.cad = view.cad_state;
        state.clamp();
        state.refresh(c);
        state
    }
}

/// One processed event with the delta that was applied for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(flatten)]
    pub event: LifeEvent,
    pub fused_delta: StateDelta,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtagonistView {
    pub name: String,
    pub age: u32,
    pub current_mental_state: MentalStateView,
    pub symptoms: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// Relationship scores as persisted (rounded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipView {
    pub closeness: i32,
    pub trust: i32,
    pub conflict: i32,
    pub relationship_type: String,
}

impl From<&Relationship> for RelationshipView {
    fn from(rel: &Relationship) -> Self {
        Self {
            closeness: rel.closeness.round() as i32,
            trust: rel.trust.round() as i32,
            conflict: rel.conflict.round() as i32,
            relationship_type: rel.relationship_type.clone(),
        }
    }
}

/// Key relationships by the protagonist's counterpart, others by both names
pub fn relationship_views(
    protagonist: &str,
    relationships: &[Relationship],
) -> BTreeMap<String, RelationshipView> {
    relationships
        .iter()
        .map(|rel| {
            let key = rel
                .counterpart(protagonist)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}-{}", rel.person_a, rel.person_b));
            (key, RelationshipView::from(rel))
        })
        .collect()
}

/// State at the end of one virtual day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub day: u32,
    pub stage: String,
    pub events: Vec<EventRecord>,
    pub protagonist: ProtagonistView,
    pub relationships: BTreeMap<String, RelationshipView>,
}

impl DailySnapshot {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Incomplete { day: u32, reason: String },
    Cancelled { last_completed_day: u32 },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Incomplete { day, reason } => {
                write!(f, "incomplete at day {} ({})", day, reason)
            }
            RunStatus::Cancelled { last_completed_day } => {
                write!(f, "cancelled after day {}", last_completed_day)
            }
        }
    }
}

/// LLM failure counters for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmFailures {
    pub assessor_degraded: u32,
    pub assessor_timeouts: u32,
    pub generator_fallbacks: u32,
    pub analysis_failures: u32,
}

impl LlmFailures {
    pub fn total(&self) -> u32 {
        self.assessor_degraded + self.generator_fallbacks + self.analysis_failures
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetadata {
    pub run_id: Uuid,
    pub scenario_name: String,
    pub seed: u64,
    pub end_time: DateTime<Utc>,
    pub total_days: u32,
    pub days_completed: u32,
    pub event_count: usize,
    pub status: RunStatus,
    pub llm_failures: LlmFailures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub initial_state: String,
    pub final_state: String,
    pub symptoms: Vec<String>,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub simulation_metadata: SimulationMetadata,
    pub protagonist_character_profile: Character,
    pub final_psychological_state: MentalStateView,
    pub protagonist_journey: Journey,
    /// Events with impact <= -5
    pub significant_events: Vec<LifeEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynamicsConstants;

    #[test]
    fn test_view_shape_matches_wire_format() {
        let view = MentalStateView::from(&MentalState::default());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["depression_level"], "HEALTHY");
        assert_eq!(json["emotion"], "neutral");
        assert_eq!(json["cad_state"]["core_beliefs"]["world_belief"], 0.5);
        assert_eq!(json["cad_state"]["behavioral_inclination"]["avolition"], 1.0);
    }

    #[test]
    fn test_from_view_rederives_legacy_level() {
        let json = serde_json::json!({
            "emotion": "happy",
            "depression_level": 3,
            "stress_level": 3,
            "self_esteem": 7,
            "social_connection": 6,
            "academic_pressure": 4,
            "cad_state": serde_json::to_value(CadState::default()).unwrap(),
        });
        let view: MentalStateView = serde_json::from_value(json).unwrap();
        assert_eq!(view.depression_level, DepressionLevel::Severe);

        let c = DynamicsConstants::default();
        let state = MentalState::from_view(&view, &c.depression);
        assert_eq!(state.depression_level(), DepressionLevel::Healthy);
        assert_eq!(state.emotion(), Emotion::Neutral);
        assert!(state.check_invariants(&c.depression).is_ok());
    }

    #[test]
    fn test_cad_values_survive_json_exactly() {
        let mut state = MentalState::default();
        for i in 1..=500 {
            let x = (i as f64).sqrt() * 0.97f64.powi(i % 40) - 10.0 / 3.0;
            state.cad.affective_tone = x.clamp(-10.0, 10.0);
            state.cad.core_beliefs.world_belief = (-x / 7.0).clamp(-10.0, 10.0);
            state.cad.cognitive_processing.rumination = (x.abs() / 3.0).min(10.0);

            let view = MentalStateView::from(&state);
            let text = serde_json::to_string(&view).unwrap();
            let restored: MentalStateView = serde_json::from_str(&text).unwrap();
            assert_eq!(restored, view, "{}", text);
        }
    }

    #[test]
    fn test_relationship_keys() {
        let rels = vec![
            Relationship {
                person_a: "张同学".to_string(),
                person_b: "李明".to_string(),
                relationship_type: "classmate".to_string(),
                closeness: 2.6,
                trust: 1.4,
                conflict: 7.0,
            },
            Relationship {
                person_a: "王老师".to_string(),
                person_b: "张同学".to_string(),
                relationship_type: "teacher".to_string(),
                closeness: 5.0,
                trust: 5.0,
                conflict: 0.0,
            },
        ];
        let views = relationship_views("李明", &rels);
        assert_eq!(views["张同学"].closeness, 3);
        assert_eq!(views["张同学"].trust, 1);
        assert!(views.contains_key("王老师-张同学"));
    }

    #[test]
    fn test_run_status_tagging() {
        let status = RunStatus::Incomplete {
            day: 4,
            reason: "disk full".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "incomplete");
        assert_eq!(json["day"], 4);
    }
}
