//! LLM Assessor - Semantic delta for an event
//!
//! Asks the oracle how an event would move the protagonist's state. Every
//! failure mode degrades to a zero delta; `assess` never returns an error.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::SimulationConfig;
use crate::domain::{
    Assessment, Character, DegradeReason, LifeEvent, MentalState, StateDelta,
};
use crate::ports::{CompletionOptions, LlmOracle, OraclePurpose};

/// Bound on the per-field basic-indicator delta an assessment may propose
pub const BASIC_DELTA_LIMIT: f64 = 3.0;
/// Bound on the per-field CAD delta an assessment may propose
pub const CAD_DELTA_LIMIT: f64 = 2.0;
pub const HISTORY_CAPACITY: usize = 100;

const SYSTEM_PROMPT: &str = "You are a clinical psychologist modelling how a life event changes \
a patient's psychological state. Answer with a single JSON object and nothing else.";

/// One entry of the assessment history
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRecord {
    pub day: u32,
    pub description: String,
    pub assessment: Assessment,
}

/// Running counters over every assessment of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssessorStats {
    pub total: u32,
    pub accepted: u32,
    pub degraded: u32,
    pub timeouts: u32,
    pub oracle_errors: u32,
    pub empty_responses: u32,
    pub parse_failures: u32,
    pub low_confidence: u32,
    /// Mean confidence of accepted assessments
    pub mean_confidence: f64,
}

pub struct LlmAssessor {
    oracle: Arc<dyn LlmOracle>,
    timeout: Duration,
    confidence_threshold: f64,
    history: VecDeque<AssessmentRecord>,
    stats: AssessorStats,
}

impl LlmAssessor {
    pub fn new(oracle: Arc<dyn LlmOracle>, config: &SimulationConfig) -> Self {
        Self {
            oracle,
            timeout: config.llm_timeout(),
            confidence_threshold: config.llm.confidence_threshold,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            stats: AssessorStats::default(),
        }
    }

    pub fn stats(&self) -> &AssessorStats {
        &self.stats
    }

    pub fn history(&self) -> impl Iterator<Item = &AssessmentRecord> {
        self.history.iter()
    }

    /// Assess one event against the current state
    pub async fn assess(
        &mut self,
        event: &LifeEvent,
        state: &MentalState,
        recent: &[LifeEvent],
        profile: &Character,
    ) -> Assessment {
        let prompt = build_prompt(event, state, recent, profile);
        let options = CompletionOptions::structured();
        let call = self.oracle.complete_simple(
            OraclePurpose::Assessment,
            SYSTEM_PROMPT,
            &prompt,
            &options,
        );

        let assessment = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    "⏱️  Assessment timed out after {:?} (day {})",
                    self.timeout,
                    event.day
                );
                Assessment::degraded(
                    DegradeReason::Timeout,
                    format!("assessment timed out after {:?}", self.timeout),
                )
            }
            Ok(Err(e)) => {
                tracing::warn!("⚠️  Assessment oracle error: {}", e);
                Assessment::degraded(DegradeReason::OracleError, e.to_string())
            }
            Ok(Ok(content)) => self.interpret(&content),
        };

        self.record(event, assessment.clone());
        assessment
    }

    /// Turn raw oracle output into an assessment (or a degraded one)
    fn interpret(&self, content: &str) -> Assessment {
        if content.trim().is_empty() {
            tracing::warn!("⚠️  Assessment oracle returned an empty response");
            return Assessment::degraded(DegradeReason::EmptyResponse, "empty response");
        }

        let parsed = match parse_assessment(content) {
            Ok(parsed) => parsed,
            Err(reason) => {
                tracing::warn!("⚠️  Could not parse assessment: {}", reason);
                return Assessment::degraded(DegradeReason::ParseFailure, reason);
            }
        };

        if parsed.confidence < self.confidence_threshold {
            tracing::info!(
                "🤔 Low-confidence assessment discarded ({:.2} < {:.2})",
                parsed.confidence,
                self.confidence_threshold
            );
            return Assessment::degraded(
                DegradeReason::LowConfidence,
                format!(
                    "confidence {:.2} below threshold {:.2}",
                    parsed.confidence, self.confidence_threshold
                ),
            );
        }

        parsed
    }

    fn record(&mut self, event: &LifeEvent, assessment: Assessment) {
        let stats = &mut self.stats;
        stats.total += 1;
        match assessment.degrade_reason {
            _ if !assessment.degraded => {
                let n = stats.accepted as f64;
                stats.mean_confidence =
                    (stats.mean_confidence * n + assessment.confidence) / (n + 1.0);
                stats.accepted += 1;
            }
            Some(DegradeReason::Timeout) => stats.timeouts += 1,
            Some(DegradeReason::OracleError) => stats.oracle_errors += 1,
            Some(DegradeReason::EmptyResponse) => stats.empty_responses += 1,
            Some(DegradeReason::ParseFailure) => stats.parse_failures += 1,
            Some(DegradeReason::LowConfidence) => stats.low_confidence += 1,
            Some(DegradeReason::Disabled | DegradeReason::Cancelled) | None => {}
        }
        if assessment.degraded {
            stats.degraded += 1;
        }

        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(AssessmentRecord {
            day: event.day,
            description: event.description.clone(),
            assessment,
        });
    }
}

fn build_prompt(
    event: &LifeEvent,
    state: &MentalState,
    recent: &[LifeEvent],
    profile: &Character,
) -> String {
    let recent_lines = if recent.is_empty() {
        "(none)".to_string()
    } else {
        recent
            .iter()
            .map(|e| format!("- day {}: {} (impact {})", e.day, e.description, e.impact_score))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let traits = if profile.personality.traits.is_empty() {
        String::new()
    } else {
        format!(", traits: {}", profile.personality.traits.join(", "))
    };

    format!(
        r#"## Patient
{name}, age {age}, {role}. Big Five (0-10): openness {o}, conscientiousness {c}, extraversion {e}, agreeableness {a}, neuroticism {n}{traits}

## Current state
{state}

## Recent events
{recent_lines}

## Event
{description} (type {event_type}, impact {impact})

## Task
Estimate the change this event causes. Reply with JSON:
{{"stress_level": int -3..3, "self_esteem": int -3..3, "social_connection": int -3..3,
 "academic_pressure": int -3..3, "affective_tone": -2..2, "self_belief": -2..2,
 "world_belief": -2..2, "future_belief": -2..2, "rumination": -2..2, "distortions": -2..2,
 "social_withdrawal": -2..2, "avolition": -2..2, "confidence": 0..1, "reasoning": "..."}}"#,
        name = profile.name,
        age = profile.age,
        role = profile.role,
        o = profile.personality.openness,
        c = profile.personality.conscientiousness,
        e = profile.personality.extraversion,
        a = profile.personality.agreeableness,
        n = profile.personality.neuroticism,
        traits = traits,
        state = state.summary(),
        recent_lines = recent_lines,
        description = event.description,
        event_type = event.event_type,
        impact = event.impact_score,
    )
}

/// Extract the outermost JSON object from free text (code fences, prose)
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parse an assessment; the delta may be flat or nested under `delta`
pub fn parse_assessment(content: &str) -> Result<Assessment, String> {
    let json = extract_json_object(content).ok_or_else(|| "no JSON object found".to_string())?;
    let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| "missing numeric confidence".to_string())?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence out of range: {}", confidence));
    }

    let fields = match object.get("delta") {
        Some(Value::Object(nested)) => nested,
        _ => object,
    };
    let mut delta_json = serde_json::Map::new();
    for (key, value) in fields {
        if let Some(n) = value.as_f64() {
            delta_json.insert(key.clone(), Value::from(n));
        }
    }
    let delta: StateDelta =
        serde_json::from_value(Value::Object(delta_json)).map_err(|e| e.to_string())?;

    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Assessment {
        delta: delta.clamp_components(BASIC_DELTA_LIMIT, CAD_DELTA_LIMIT),
        confidence,
        reasoning,
        degraded: false,
        degrade_reason: None,
    })
}
