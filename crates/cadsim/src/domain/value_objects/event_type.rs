//! EventType - Classification of life events

use serde::{Deserialize, Serialize};

use super::Sentiment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AcademicFailure,
    SocialRejection,
    FamilyConflict,
    Bullying,
    PeerPressure,
    TeacherCriticism,
    ExamStress,
    AcademicSuccess,
    SocialSupport,
    FamilySupport,
    PersonalAchievement,
    DailyLife,
    StressCrisis,
    #[default]
    #[serde(other)]
    Other,
}

impl EventType {
    /// Resolve the event type for a scenario template category.
    ///
    /// Category names are free-form in scenarios; well-known ones map to a
    /// specific type per sentiment, everything else falls back by sentiment.
    pub fn from_category(category: &str, sentiment: Sentiment) -> Self {
        let category = category.to_lowercase();
        match (category.as_str(), sentiment) {
            (_, Sentiment::Neutral) => EventType::DailyLife,
            ("bullying", Sentiment::Negative) => EventType::Bullying,
            ("peer" | "peer_pressure", Sentiment::Negative) => EventType::PeerPressure,
            ("teacher" | "teacher_criticism", Sentiment::Negative) => EventType::TeacherCriticism,
            ("exam" | "exam_stress", Sentiment::Negative) => EventType::ExamStress,
            ("academic" | "school" | "study", Sentiment::Negative) => EventType::AcademicFailure,
            ("academic" | "school" | "study" | "exam", Sentiment::Positive) => {
                EventType::AcademicSuccess
            }
            ("social" | "friendship", Sentiment::Negative) => EventType::SocialRejection,
            ("social" | "friendship" | "peer", Sentiment::Positive) => EventType::SocialSupport,
            ("family", Sentiment::Negative) => EventType::FamilyConflict,
            ("family", Sentiment::Positive) => EventType::FamilySupport,
            (_, Sentiment::Positive) => EventType::PersonalAchievement,
            (_, Sentiment::Negative) => EventType::Other,
        }
    }

    /// Events whose impact runs through peer relationships
    pub fn is_social(self) -> bool {
        matches!(
            self,
            EventType::SocialRejection
                | EventType::Bullying
                | EventType::PeerPressure
                | EventType::SocialSupport
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::AcademicFailure => "academic_failure",
            EventType::SocialRejection => "social_rejection",
            EventType::FamilyConflict => "family_conflict",
            EventType::Bullying => "bullying",
            EventType::PeerPressure => "peer_pressure",
            EventType::TeacherCriticism => "teacher_criticism",
            EventType::ExamStress => "exam_stress",
            EventType::AcademicSuccess => "academic_success",
            EventType::SocialSupport => "social_support",
            EventType::FamilySupport => "family_support",
            EventType::PersonalAchievement => "personal_achievement",
            EventType::DailyLife => "daily_life",
            EventType::StressCrisis => "stress_crisis",
            EventType::Other => "other",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
