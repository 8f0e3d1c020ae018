//! Emotion - Dominant affect label of the protagonist

use serde::{Deserialize, Serialize};

/// Dominant emotion, always derived from stress, depression level and tone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    #[default]
    Neutral,
    Anxious,
    Sad,
    Depressed,
    Angry,
    Confused,
}

impl Emotion {
    /// One step toward DEPRESSED, used by the rumination feedback loop
    pub fn toward_depressed(self) -> Self {
        match self {
            Emotion::Happy => Emotion::Neutral,
            Emotion::Neutral => Emotion::Anxious,
            Emotion::Anxious | Emotion::Sad | Emotion::Angry | Emotion::Confused => {
                Emotion::Depressed
            }
            Emotion::Depressed => Emotion::Depressed,
        }
    }

    pub fn is_low_mood(self) -> bool {
        matches!(self, Emotion::Sad | Emotion::Depressed)
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emotion::Happy => write!(f, "happy"),
            Emotion::Neutral => write!(f, "neutral"),
            Emotion::Anxious => write!(f, "anxious"),
            Emotion::Sad => write!(f, "sad"),
            Emotion::Depressed => write!(f, "depressed"),
            Emotion::Angry => write!(f, "angry"),
            Emotion::Confused => write!(f, "confused"),
        }
    }
}

impl std::str::FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "happy" => Ok(Emotion::Happy),
            "neutral" => Ok(Emotion::Neutral),
            "anxious" => Ok(Emotion::Anxious),
            "sad" => Ok(Emotion::Sad),
            "depressed" => Ok(Emotion::Depressed),
            "angry" => Ok(Emotion::Angry),
            "confused" => Ok(Emotion::Confused),
            _ => Err(format!("Unknown emotion: {}", s)),
        }
    }
}
