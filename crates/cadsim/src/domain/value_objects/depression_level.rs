//! DepressionLevel - Ordered 10-level severity scale
//!
//! Serialized by variant name (`OPTIMAL` .. `CRITICAL`). Older snapshots used a
//! 5-level scale, either by name (`healthy`, `mild`, `moderate`, `severe`,
//! `critical`) or by integer code 0-4; both forms are accepted on load.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepressionLevel {
    #[default]
    Optimal,
    Healthy,
    MinimalSymptoms,
    MildRisk,
    Mild,
    Moderate,
    ModerateSevere,
    Severe,
    VerySevere,
    Critical,
}

impl DepressionLevel {
    pub const ALL: [DepressionLevel; 10] = [
        DepressionLevel::Optimal,
        DepressionLevel::Healthy,
        DepressionLevel::MinimalSymptoms,
        DepressionLevel::MildRisk,
        DepressionLevel::Mild,
        DepressionLevel::Moderate,
        DepressionLevel::ModerateSevere,
        DepressionLevel::Severe,
        DepressionLevel::VerySevere,
        DepressionLevel::Critical,
    ];

    /// Numeric rank, 0 (OPTIMAL) to 9 (CRITICAL)
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }

    /// Map a score onto the scale using ascending exclusive upper bounds.
    ///
    /// `thresholds[i]` is the upper bound of level `i`; anything at or above the
    /// last bound is CRITICAL.
    pub fn from_score(score: f64, thresholds: &[f64; 9]) -> Self {
        let index = thresholds
            .iter()
            .position(|bound| score < *bound)
            .unwrap_or(thresholds.len());
        Self::ALL[index]
    }

    /// Legacy 5-level integer codes
    pub fn from_legacy_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(DepressionLevel::Healthy),
            1 => Some(DepressionLevel::Mild),
            2 => Some(DepressionLevel::Moderate),
            3 => Some(DepressionLevel::Severe),
            4 => Some(DepressionLevel::Critical),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DepressionLevel::Optimal => "OPTIMAL",
            DepressionLevel::Healthy => "HEALTHY",
            DepressionLevel::MinimalSymptoms => "MINIMAL_SYMPTOMS",
            DepressionLevel::MildRisk => "MILD_RISK",
            DepressionLevel::Mild => "MILD",
            DepressionLevel::Moderate => "MODERATE",
            DepressionLevel::ModerateSevere => "MODERATE_SEVERE",
            DepressionLevel::Severe => "SEVERE",
            DepressionLevel::VerySevere => "VERY_SEVERE",
            DepressionLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for DepressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DepressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.name() == normalized)
            .or(match normalized.as_str() {
                // legacy 5-level spellings that differ from the current names
                "NONE" | "NORMAL" => Some(DepressionLevel::Healthy),
                "MODERATELY_SEVERE" => Some(DepressionLevel::ModerateSevere),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown depression level: {}", s))
    }
}

struct DepressionLevelVisitor;

impl<'de> Visitor<'de> for DepressionLevelVisitor {
    type Value = DepressionLevel;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a depression level name or a legacy integer code 0-4")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        DepressionLevel::from_legacy_code(value)
            .ok_or_else(|| E::custom(format!("legacy depression code out of range: {}", value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        let code = u64::try_from(value)
            .map_err(|_| E::custom(format!("negative depression code: {}", value)))?;
        self.visit_u64(code)
    }
}

impl<'de> Deserialize<'de> for DepressionLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DepressionLevelVisitor)
    }
}
