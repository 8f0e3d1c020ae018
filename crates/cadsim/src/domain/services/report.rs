//! Report - Symptoms, risk factors and the journey summary
//!
//! Pure readings of a state and its history, used by both the daily snapshot
//! and the final report.

use crate::domain::entities::{LifeEvent, MentalState};
use crate::domain::value_objects::DepressionLevel;

/// Impact at or below which an event counts as significant
pub const SIGNIFICANT_IMPACT: i32 = -5;

pub fn symptoms(state: &MentalState) -> Vec<String> {
    let cad = &state.cad;
    let checks: [(bool, &str); 9] = [
        (cad.affective_tone < -3.0, "persistent low mood"),
        (cad.cognitive_processing.rumination > 6.0, "frequent rumination"),
        (cad.cognitive_processing.distortions > 5.0, "cognitive distortions"),
        (cad.behavioral_inclination.social_withdrawal > 5.0, "social withdrawal"),
        (cad.behavioral_inclination.avolition > 5.0, "loss of motivation"),
        (cad.core_beliefs.self_belief < -3.0, "negative self-view"),
        (cad.core_beliefs.future_belief < -3.0, "hopelessness"),
        (state.stress_level >= 8, "high stress"),
        (state.self_esteem <= 3, "low self-esteem"),
    ];
    checks
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, label)| label.to_string())
        .collect()
}

pub fn risk_factors(state: &MentalState, history: &[LifeEvent]) -> Vec<String> {
    let cad = &state.cad;
    let mut risks = Vec::new();

    if state.depression_level() >= DepressionLevel::Moderate {
        risks.push(format!("depression level {}", state.depression_level()));
    }
    if state.social_connection <= 3 {
        risks.push("weak social support".to_string());
    }
    if cad.core_beliefs.world_belief < -3.0 {
        risks.push("perceives environment as hostile".to_string());
    }
    if state.academic_pressure >= 8 {
        risks.push("academic overload".to_string());
    }
    let severe = history
        .iter()
        .filter(|e| e.impact_score <= SIGNIFICANT_IMPACT)
        .count();
    if severe >= 3 {
        risks.push(format!("repeated severe adverse events ({})", severe));
    }
    if cad.core_beliefs.future_belief < -5.0 && cad.cognitive_processing.rumination > 7.0 {
        risks.push("hopelessness combined with heavy rumination".to_string());
    }
    risks
}

pub fn significant_events(history: &[LifeEvent]) -> Vec<LifeEvent> {
    history
        .iter()
        .filter(|e| e.impact_score <= SIGNIFICANT_IMPACT)
        .cloned()
        .collect()
}

/// Human-readable description of a state for the journey section
pub fn describe_state(name: &str, state: &MentalState) -> String {
    format!("{}: {}", name, state.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepressionConstants;
    use crate::domain::entities::InitialState;
    use crate::domain::value_objects::EventType;
    use chrono::Utc;

    #[test]
    fn test_healthy_state_has_no_findings() {
        let state = MentalState::default();
        assert!(symptoms(&state).is_empty());
        assert!(risk_factors(&state, &[]).is_empty());
    }

    #[test]
    fn test_distressed_state() {
        let initial = InitialState {
            stress_level: Some(9),
            self_esteem: Some(2),
            social_connection: Some(2),
            affective_tone: Some(-6.0),
            self_belief: Some(-6.0),
            world_belief: Some(-5.0),
            future_belief: Some(-7.0),
            rumination: Some(8.0),
            social_withdrawal: Some(7.0),
            ..InitialState::default()
        };
        let state = MentalState::new(&initial, &DepressionConstants::default());
        let found = symptoms(&state);
        assert!(found.contains(&"high stress".to_string()));
        assert!(found.contains(&"hopelessness".to_string()));
        assert!(found.contains(&"social withdrawal".to_string()));

        let history: Vec<LifeEvent> = (0..3)
            .map(|_| LifeEvent::new(EventType::Bullying, "x", -6, Utc::now(), 1))
            .collect();
        let risks = risk_factors(&state, &history);
        assert!(risks.iter().any(|r| r.starts_with("depression level")));
        assert!(risks.contains(&"weak social support".to_string()));
        assert!(risks.contains(&"repeated severe adverse events (3)".to_string()));
        assert_eq!(significant_events(&history).len(), 3);
    }
}
