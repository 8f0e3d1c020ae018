//! Character - People in a scenario and the relationships between them

use serde::{Deserialize, Serialize};

use crate::domain::entities::InitialState;

/// Big-Five personality scores, each in [0, 10]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
    /// Free-form trait labels
    pub traits: Vec<String>,
    pub description: Option<String>,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            openness: 5.0,
            conscientiousness: 5.0,
            extraversion: 5.0,
            agreeableness: 5.0,
            neuroticism: 5.0,
            traits: Vec::new(),
            description: None,
        }
    }
}

impl Personality {
    pub fn scores(&self) -> [(&'static str, f64); 5] {
        [
            ("openness", self.openness),
            ("conscientiousness", self.conscientiousness),
            ("extraversion", self.extraversion),
            ("agreeableness", self.agreeableness),
            ("neuroticism", self.neuroticism),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub background: Option<String>,
    /// Starting-state overrides (protagonist only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<InitialState>,
}

impl Character {
    pub fn is_minor(&self) -> bool {
        self.age < 18
    }

    /// Life-stage label used in generation prompts
    pub fn life_stage(&self) -> &'static str {
        match self.age {
            0..=11 => "child",
            12..=14 => "middle_school",
            15..=17 => "high_school",
            18..=22 => "university",
            _ => "adult",
        }
    }
}

/// Pairwise relationship; scores in [0, 10]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub person_a: String,
    pub person_b: String,
    pub relationship_type: String,
    pub closeness: f64,
    pub trust: f64,
    #[serde(default)]
    pub conflict: f64,
}

impl Relationship {
    /// The other party when `name` is one side of this relationship
    pub fn counterpart(&self, name: &str) -> Option<&str> {
        if self.person_a == name {
            Some(&self.person_b)
        } else if self.person_b == name {
            Some(&self.person_a)
        } else {
            None
        }
    }

    /// Apply a stage's per-day decay to closeness and trust
    pub fn decay(&mut self, factor: f64) {
        self.closeness = (self.closeness * factor).clamp(0.0, 10.0);
        self.trust = (self.trust * factor).clamp(0.0, 10.0);
    }

    pub fn scores_in_bounds(&self) -> bool {
        [self.closeness, self.trust, self.conflict]
            .iter()
            .all(|v| (0.0..=10.0).contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relationship() -> Relationship {
        Relationship {
            person_a: "李明".to_string(),
            person_b: "张同学".to_string(),
            relationship_type: "classmate".to_string(),
            closeness: 6.0,
            trust: 5.0,
            conflict: 2.0,
        }
    }

    #[test]
    fn test_counterpart() {
        let rel = relationship();
        assert_eq!(rel.counterpart("李明"), Some("张同学"));
        assert_eq!(rel.counterpart("张同学"), Some("李明"));
        assert_eq!(rel.counterpart("王老师"), None);
    }

    #[test]
    fn test_decay_leaves_conflict() {
        let mut rel = relationship();
        rel.decay(0.5);
        assert_eq!(rel.closeness, 3.0);
        assert_eq!(rel.trust, 2.5);
        assert_eq!(rel.conflict, 2.0);
    }

    #[test]
    fn test_personality_defaults_to_midpoint() {
        let character: Character =
            serde_json::from_str(r#"{"name": "李明", "age": 15}"#).unwrap();
        assert_eq!(character.personality.neuroticism, 5.0);
        assert!(character.is_minor());
        assert_eq!(character.life_stage(), "high_school");
    }
}
