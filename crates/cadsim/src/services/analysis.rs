//! Analysis Writer - Optional narrative appended to the final report

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{DailySnapshot, DomainError, FinalReport};
use crate::ports::{CompletionOptions, LlmOracle, OraclePurpose};

const SYSTEM_PROMPT: &str = "You are a clinical psychologist reviewing the trajectory of a \
simulated patient. Write a concise case analysis: course of the state, key stressors, \
protective factors and suggested focus for therapy. Plain prose, no headings.";

pub struct AnalysisWriter {
    oracle: Arc<dyn LlmOracle>,
    timeout: Duration,
}

impl AnalysisWriter {
    pub fn new(oracle: Arc<dyn LlmOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    /// Ask the oracle for an analysis of a finished run
    pub async fn write(
        &self,
        report: &FinalReport,
        snapshots: &[DailySnapshot],
    ) -> Result<String, DomainError> {
        let prompt = build_prompt(report, snapshots);
        let options = CompletionOptions {
            max_tokens: Some(1500),
            ..CompletionOptions::default()
        };
        let call = self
            .oracle
            .complete_simple(OraclePurpose::Analysis, SYSTEM_PROMPT, &prompt, &options);

        let text = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DomainError::Timeout(self.timeout))??;
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::ExternalService(
                "analysis oracle returned an empty response".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

fn build_prompt(report: &FinalReport, snapshots: &[DailySnapshot]) -> String {
    let profile = &report.protagonist_character_profile;
    let trajectory = snapshots
        .iter()
        .map(|s| {
            let m = &s.protagonist.current_mental_state;
            format!(
                "- day {} ({}): {} / {}, stress {}, {} events",
                s.day,
                s.stage,
                m.depression_level,
                m.emotion,
                m.stress_level,
                s.events.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let events = if report.significant_events.is_empty() {
        "(none)".to_string()
    } else {
        report
            .significant_events
            .iter()
            .map(|e| format!("- day {}: {} ({})", e.day, e.description, e.impact_score))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let journey = &report.protagonist_journey;

    format!(
        "## Patient\n{} ({}), {}\n\n## Start\n{}\n\n## End\n{}\n\n## Daily course\n{}\n\n\
         ## Significant events\n{}\n\n## Symptoms\n{}\n\n## Risk factors\n{}",
        profile.name,
        profile.age,
        profile.background.as_deref().unwrap_or(&profile.role),
        journey.initial_state,
        journey.final_state,
        trajectory,
        events,
        journey.symptoms.join(", "),
        journey.risk_factors.join(", "),
    )
}
