//! Rule Engine - Deterministic event impact and daily evolution
//!
//! Pure functions over the state; no I/O and no randomness. Keyword lists
//! route an event's impact into the core belief triad.

use crate::config::{DynamicsConstants, EvolutionConstants, RuleConstants};
use crate::domain::entities::{LifeEvent, MentalState, StateDelta};
use crate::domain::value_objects::Emotion;

const NEGATIVE_SELF_KEYWORDS: &[&str] = &[
    "批评", "失败", "成绩", "考试", "不及格", "责骂", "外貌", "笨", "criticism", "criticized",
    "failure", "failed", "grade", "stupid", "ugly",
];
const NEGATIVE_WORLD_KEYWORDS: &[&str] = &[
    "霸凌", "欺负", "嘲笑", "排挤", "拒绝", "孤立", "冷落", "背叛", "bully", "bullied",
    "rejection", "rejected", "isolation", "isolated", "excluded", "mocked", "betrayed",
];
const NEGATIVE_FUTURE_KEYWORDS: &[&str] = &[
    "绝望", "放弃", "未来", "没希望", "前途", "hopeless", "give up", "giving up", "future",
];
const ACADEMIC_KEYWORDS: &[&str] = &[
    "考试", "成绩", "作业", "学习", "功课", "分数", "升学", "exam", "grade", "homework", "test",
    "study",
];
const POSITIVE_SELF_KEYWORDS: &[&str] = &[
    "表扬", "称赞", "进步", "成功", "优秀", "获奖", "praise", "praised", "progress", "success",
    "award",
];
const POSITIVE_SOCIAL_KEYWORDS: &[&str] = &[
    "帮助", "支持", "关心", "朋友", "陪伴", "安慰", "help", "support", "care", "friend",
];
const POSITIVE_FUTURE_KEYWORDS: &[&str] = &[
    "希望", "梦想", "计划", "目标", "hope", "dream", "plan", "goal",
];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Which belief channels an event description touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordHits {
    pub self_belief: bool,
    pub world_belief: bool,
    pub future_belief: bool,
    pub academic: bool,
}

impl KeywordHits {
    pub fn scan(description: &str, impact_score: i32) -> Self {
        let text = description.to_lowercase();
        if impact_score < 0 {
            Self {
                self_belief: mentions(&text, NEGATIVE_SELF_KEYWORDS),
                world_belief: mentions(&text, NEGATIVE_WORLD_KEYWORDS),
                future_belief: mentions(&text, NEGATIVE_FUTURE_KEYWORDS),
                academic: mentions(&text, ACADEMIC_KEYWORDS),
            }
        } else {
            Self {
                self_belief: mentions(&text, POSITIVE_SELF_KEYWORDS),
                world_belief: mentions(&text, POSITIVE_SOCIAL_KEYWORDS),
                future_belief: mentions(&text, POSITIVE_FUTURE_KEYWORDS),
                academic: false,
            }
        }
    }
}

/// Deterministic rule engine
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: RuleConstants,
    evolution: EvolutionConstants,
}

impl RuleEngine {
    pub fn new(constants: &DynamicsConstants) -> Self {
        Self {
            rules: constants.rules.clone(),
            evolution: constants.evolution.clone(),
        }
    }

    /// Delta produced by one event, computed on a clamped working copy
    pub fn rule_delta(&self, event: &LifeEvent, state: &MentalState) -> StateDelta {
        let c = &self.rules;
        let impact = event.impact_score;
        let i = impact as f64;
        let hits = KeywordHits::scan(&event.description, impact);
        let mut w = state.clone();

        if impact < 0 {
            let magnitude = i.abs();
            w.stress_level += (magnitude / c.negative_stress_divisor).floor() as i32;
            w.self_esteem -= (magnitude / c.negative_esteem_divisor).floor() as i32;
            w.cad.affective_tone += i / c.negative_tone_divisor;

            let beliefs = &mut w.cad.core_beliefs;
            if hits.self_belief {
                beliefs.self_belief += c.self_belief_share * i;
            }
            if hits.world_belief {
                beliefs.world_belief += c.world_belief_share * i;
                w.social_connection -= (magnitude / c.negative_social_divisor).floor() as i32;
            }
            if hits.future_belief {
                beliefs.future_belief += c.future_belief_share * i;
            }
            if hits.academic {
                w.academic_pressure += (magnitude / c.negative_academic_divisor).floor() as i32;
            }
            // Low mood makes every setback land harder on the self
            if state.cad.affective_tone < c.negativity_amplification_tone {
                w.cad.core_beliefs.self_belief += c.negativity_amplification_share * i;
            }
        } else if impact > 0 {
            w.stress_level -= (i / c.positive_stress_divisor).floor() as i32;
            w.self_esteem += (i / c.positive_esteem_divisor).floor() as i32;
            w.cad.affective_tone += i / c.positive_tone_divisor;

            let muted = c.positivity_reduction * i;
            let beliefs = &mut w.cad.core_beliefs;
            if hits.self_belief {
                beliefs.self_belief += c.self_belief_share * muted;
            }
            if hits.world_belief {
                beliefs.world_belief += c.world_belief_share * muted;
                w.social_connection += (i / c.positive_social_divisor).floor() as i32;
            }
            if hits.future_belief {
                beliefs.future_belief += c.future_belief_share * muted;
            }
        }

        w.clamp();
        self.secondary_feedback(&mut w, state.emotion());
        w.clamp();

        StateDelta::between(state, &w)
    }

    /// Belief -> rumination -> behavior loop on the working copy.
    ///
    /// The emotion promoted here is local to the rule evaluation; the state's
    /// emotion is always re-derived when a delta is applied.
    fn secondary_feedback(&self, w: &mut MentalState, emotion: Emotion) {
        let c = &self.rules;
        let cad = &mut w.cad;
        let mut emotion = emotion;

        let self_belief = cad.core_beliefs.self_belief;
        if self_belief < c.rumination_belief_floor {
            cad.cognitive_processing.rumination +=
                (c.rumination_belief_floor - self_belief) / c.rumination_divisor;
        }
        let world_belief = cad.core_beliefs.world_belief;
        if world_belief < c.withdrawal_belief_floor {
            cad.behavioral_inclination.social_withdrawal +=
                (c.withdrawal_belief_floor - world_belief) / c.withdrawal_divisor;
        }
        cad.core_beliefs.future_belief = c.future_inertia * cad.core_beliefs.future_belief
            + (1.0 - c.future_inertia) * (self_belief + world_belief) / 2.0;

        let rumination = cad.cognitive_processing.rumination;
        if rumination > c.rumination_promotion_threshold {
            emotion = emotion.toward_depressed();
        }
        if rumination > c.distortion_threshold {
            cad.cognitive_processing.distortions +=
                (rumination - c.distortion_threshold) / c.distortion_divisor;
        }
        if emotion.is_low_mood() {
            cad.cognitive_processing.rumination += c.low_mood_rumination;
        }
        if emotion == Emotion::Depressed {
            cad.behavioral_inclination.avolition += c.depressed_avolition;
        }
    }

    /// End-of-day feedback, decay and positive accumulation.
    ///
    /// `recent_events` is the event history in processing order; only the
    /// trailing window is inspected for the positive bonus.
    pub fn daily_evolution(
        &self,
        state: &mut MentalState,
        recent_events: &[LifeEvent],
        constants: &DynamicsConstants,
    ) {
        let c = &self.evolution;
        let cad = &mut state.cad;

        let withdrawal = cad.behavioral_inclination.social_withdrawal;
        if withdrawal > c.isolation_threshold {
            let erosion = (withdrawal - c.isolation_threshold) / c.isolation_divisor;
            cad.core_beliefs.self_belief -= erosion;
            cad.core_beliefs.world_belief -= c.isolation_world_share * erosion;
        }
        let avolition = cad.behavioral_inclination.avolition;
        if avolition > c.avolition_threshold {
            cad.core_beliefs.self_belief -=
                (avolition - c.avolition_threshold) / c.avolition_divisor;
        }

        cad.cognitive_processing.rumination *= c.rumination_decay;
        cad.cognitive_processing.distortions *= c.distortions_decay;
        cad.affective_tone *= c.tone_decay;
        cad.behavioral_inclination.social_withdrawal *= c.withdrawal_decay;
        cad.behavioral_inclination.avolition *= c.avolition_decay;

        let window_start = recent_events.len().saturating_sub(c.bonus_window);
        let positives = recent_events[window_start..]
            .iter()
            .filter(|e| e.impact_score > c.bonus_impact_threshold)
            .count();
        if positives >= c.bonus_min_count {
            let bonus = c.bonus_per_event * positives as f64;
            cad.core_beliefs.self_belief += bonus;
            cad.affective_tone += bonus * c.bonus_tone_share;
            tracing::debug!("🌱 Positive accumulation: {} events, bonus {:.2}", positives, bonus);
        }

        state.clamp();
        state.refresh(&constants.depression);
    }
}
