//! Scenario - The static world a simulation runs in
//!
//! Characters, relationships, keyword-tagged event templates, an ordered list
//! of stages and conditional-event rules. Parsed from JSON and validated
//! before a run may begin.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::entities::{Character, Relationship};
use crate::domain::errors::DomainError;
use crate::domain::services::Condition;
use crate::domain::value_objects::{EventType, Sentiment};

pub const PROTAGONIST_KEY: &str = "protagonist";

/// Category -> sentiment -> templates
pub type EventTemplates = BTreeMap<String, BTreeMap<Sentiment, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_name: String,
    #[serde(default)]
    pub description: String,
    /// Role key -> character; must contain `protagonist`
    pub characters: BTreeMap<String, Character>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub event_templates: EventTemplates,
    #[serde(with = "ordered_stages")]
    pub stage_config: Vec<Stage>,
    #[serde(default)]
    pub conditional_events: Vec<ConditionalEventRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    pub config: StageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub description: Option<String>,
    pub sentiment_weights: BTreeMap<Sentiment, f64>,
    /// Categories drawn from in this stage; empty means every category
    pub allowed_categories: Vec<String>,
    /// Multiplier on negative impacts and on end-of-day stress
    pub stress_modifier: f64,
    /// Per-day multiplier on relationship closeness and trust
    pub relationship_decay: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            description: None,
            sentiment_weights: Sentiment::ALL.iter().map(|s| (*s, 1.0)).collect(),
            allowed_categories: Vec::new(),
            stress_modifier: 1.0,
            relationship_decay: 1.0,
        }
    }
}

/// Rule that spawns an extra negative event when its condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEventRule {
    pub tag: String,
    pub condition: String,
    pub templates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
}

impl Scenario {
    /// Parse and validate a scenario document
    pub fn from_json_str(json: &str) -> Result<Self, DomainError> {
        let scenario: Scenario = serde_json::from_str(json)
            .map_err(|e| DomainError::invalid_scenario("<unparsed>", e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn protagonist(&self) -> Option<&Character> {
        self.characters.get(PROTAGONIST_KEY)
    }

    /// Stage for a 1-based day; the horizon is split into equal segments
    pub fn stage_for_day(&self, day: u32, total_days: u32) -> Option<&Stage> {
        if self.stage_config.is_empty() || total_days == 0 {
            return None;
        }
        let count = self.stage_config.len();
        let elapsed = day.saturating_sub(1).min(total_days - 1) as usize;
        let index = (elapsed * count / total_days as usize).min(count - 1);
        self.stage_config.get(index)
    }

    /// Categories a stage may draw from
    pub fn categories_for<'a>(&'a self, stage: &'a StageConfig) -> Vec<&'a str> {
        if stage.allowed_categories.is_empty() {
            self.event_templates.keys().map(String::as_str).collect()
        } else {
            stage.allowed_categories.iter().map(String::as_str).collect()
        }
    }

    pub fn templates(&self, category: &str, sentiment: Sentiment) -> &[String] {
        self.event_templates
            .get(category)
            .and_then(|by_sentiment| by_sentiment.get(&sentiment))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let fail = |reason: String| Err(DomainError::invalid_scenario(&self.scenario_name, reason));

        if self.scenario_name.trim().is_empty() {
            return fail("scenario_name is empty".to_string());
        }

        let Some(protagonist) = self.protagonist() else {
            return fail(format!("characters must contain '{}'", PROTAGONIST_KEY));
        };
        if protagonist.name.trim().is_empty() {
            return fail("protagonist has no name".to_string());
        }
        let extra_protagonists: Vec<&str> = self
            .characters
            .iter()
            .filter(|(key, c)| key.as_str() != PROTAGONIST_KEY && c.role == PROTAGONIST_KEY)
            .map(|(key, _)| key.as_str())
            .collect();
        if !extra_protagonists.is_empty() {
            return fail(format!(
                "more than one protagonist: {}",
                extra_protagonists.join(", ")
            ));
        }
        for (key, character) in &self.characters {
            for (trait_name, score) in character.personality.scores() {
                if !(0.0..=10.0).contains(&score) {
                    return fail(format!("{}.{} out of [0, 10]: {}", key, trait_name, score));
                }
            }
        }

        let names: Vec<&str> = self.characters.values().map(|c| c.name.as_str()).collect();
        for rel in &self.relationships {
            for person in [&rel.person_a, &rel.person_b] {
                if !names.contains(&person.as_str()) {
                    return fail(format!("relationship references unknown '{}'", person));
                }
            }
            if !rel.scores_in_bounds() {
                return fail(format!(
                    "relationship {}-{} has scores outside [0, 10]",
                    rel.person_a, rel.person_b
                ));
            }
        }

        if self.stage_config.is_empty() {
            return fail("stage_config is empty".to_string());
        }
        for stage in &self.stage_config {
            let cfg = &stage.config;
            if cfg.sentiment_weights.values().any(|w| !w.is_finite() || *w < 0.0) {
                return fail(format!("stage '{}' has a negative weight", stage.name));
            }
            if cfg.sentiment_weights.values().sum::<f64>() <= 0.0 {
                return fail(format!(
                    "stage '{}' weights do not sum to a positive value",
                    stage.name
                ));
            }
            if !(cfg.stress_modifier.is_finite() && cfg.stress_modifier > 0.0) {
                return fail(format!("stage '{}' stress_modifier must be positive", stage.name));
            }
            if !(0.0..=1.0).contains(&cfg.relationship_decay) {
                return fail(format!(
                    "stage '{}' relationship_decay must be within [0, 1]",
                    stage.name
                ));
            }
            for category in &cfg.allowed_categories {
                if !self.event_templates.contains_key(category) {
                    return fail(format!(
                        "stage '{}' allows unknown category '{}'",
                        stage.name, category
                    ));
                }
            }
            for (sentiment, weight) in &cfg.sentiment_weights {
                if *weight <= 0.0 {
                    continue;
                }
                let has_templates = self
                    .categories_for(cfg)
                    .iter()
                    .any(|category| !self.templates(category, *sentiment).is_empty());
                if !has_templates {
                    return fail(format!(
                        "stage '{}' weights {} events but no allowed category has {} templates",
                        stage.name, sentiment, sentiment
                    ));
                }
            }
        }

        for rule in &self.conditional_events {
            Condition::parse(&rule.condition)?;
            if rule.templates.iter().all(|t| t.trim().is_empty()) {
                return fail(format!("conditional rule '{}' has no templates", rule.tag));
            }
        }

        Ok(())
    }
}

/// `stage_config` is a JSON object whose key order is significant
mod ordered_stages {
    use super::*;

    pub fn serialize<S: Serializer>(stages: &[Stage], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(stages.len()))?;
        for stage in stages {
            map.serialize_entry(&stage.name, &stage.config)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Stage>, D::Error> {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(name, value)| {
                let config = StageConfig::deserialize(value)
                    .map_err(|e| D::Error::custom(format!("stage '{}': {}", name, e)))?;
                Ok(Stage { name, config })
            })
            .collect()
    }
}
