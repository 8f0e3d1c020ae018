//! LifeEvent - Something that happened to the protagonist
//!
//! Pure domain entity. Built once by the generator (or injected by a script)
//! and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::EventType;

pub const IMPACT_MIN: i32 = -10;
pub const IMPACT_MAX: i32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub event_type: EventType,
    pub description: String,
    /// Negative is harmful
    pub impact_score: i32,
    /// Virtual-clock time of the event
    pub timestamp: DateTime<Utc>,
    /// Names involved, protagonist first when present
    pub participants: Vec<String>,
    /// Tag of the conditional rule that spawned this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_tag: Option<String>,
    /// 1-based simulation day
    pub day: u32,
}

impl LifeEvent {
    pub fn new(
        event_type: EventType,
        description: impl Into<String>,
        impact_score: i32,
        timestamp: DateTime<Utc>,
        day: u32,
    ) -> Self {
        Self {
            event_type,
            description: description.into(),
            impact_score: impact_score.clamp(IMPACT_MIN, IMPACT_MAX),
            timestamp,
            participants: Vec::new(),
            conditional_tag: None,
            day,
        }
    }

    pub fn with_participants(mut self, participants: Vec<String>) -> Self {
        self.participants = participants;
        self
    }

    pub fn with_conditional_tag(mut self, tag: impl Into<String>) -> Self {
        self.conditional_tag = Some(tag.into());
        self
    }

    pub fn is_negative(&self) -> bool {
        self.impact_score < 0
    }

    pub fn is_positive(&self) -> bool {
        self.impact_score > 0
    }
}

/// Event supplied from outside the generator for a given day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    #[serde(default)]
    pub event_type: EventType,
    pub description: String,
    pub impact_score: i32,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl ScriptedEvent {
    pub fn new(event_type: EventType, description: impl Into<String>, impact_score: i32) -> Self {
        Self {
            event_type,
            description: description.into(),
            impact_score,
            participants: Vec::new(),
        }
    }
}
