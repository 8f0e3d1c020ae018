//! Stochastic Layer - Bounded random variation of a delta
//!
//! All randomness comes from the RNG passed in; the layer holds no state.
//! Every draw consumes the same number of uniform/normal samples regardless
//! of the outcome, except the extreme sample itself.

use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma, StandardNormal};

use crate::config::{StochasticConstants, StochasticSettings};
use crate::domain::entities::{Personality, StateDelta, StochasticDraw};

#[derive(Debug, Clone)]
pub struct StochasticLayer {
    settings: StochasticSettings,
    c: StochasticConstants,
}

impl StochasticLayer {
    pub fn new(settings: StochasticSettings, constants: StochasticConstants) -> Self {
        Self {
            settings,
            c: constants,
        }
    }

    /// Draw the multipliers for a delta whose valence-signed total is `total`
    pub fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        total: f64,
        personality: &Personality,
        social_event: bool,
    ) -> StochasticDraw {
        let c = &self.c;
        let harmful = total < 0.0;

        let z: f64 = StandardNormal.sample(rng);
        let normal = (1.0 + self.settings.sigma * z).clamp(c.normal_min, c.normal_max);

        let fire: f64 = rng.gen();
        let extreme = if fire < self.settings.p_extreme {
            Some(self.extreme_multiplier(rng, harmful))
        } else {
            None
        };

        let individual = self.individual_multiplier(personality, harmful, social_event);
        let combined = (normal * extreme.unwrap_or(1.0) * individual)
            .clamp(c.multiplier_min, c.multiplier_max);

        StochasticDraw {
            normal,
            extreme,
            individual,
            combined,
        }
    }

    pub fn apply(&self, delta: &StateDelta, draw: &StochasticDraw) -> StateDelta {
        delta.scale(draw.combined)
    }

    fn extreme_multiplier<R: Rng + ?Sized>(&self, rng: &mut R, harmful: bool) -> f64 {
        let c = &self.c;
        if harmful {
            match Gamma::new(c.gamma_shape, c.gamma_scale) {
                Ok(gamma) => gamma.sample(rng).max(1.0),
                Err(e) => {
                    tracing::warn!("⚠️  Invalid gamma parameters: {}", e);
                    1.0
                }
            }
        } else {
            match Beta::new(c.beta_alpha, c.beta_beta) {
                Ok(beta) => c.beta_low + (c.beta_high - c.beta_low) * beta.sample(rng),
                Err(e) => {
                    tracing::warn!("⚠️  Invalid beta parameters: {}", e);
                    1.0
                }
            }
        }
    }

    /// Big-Five modulation; 1.0 for a personality at the midpoint
    pub fn individual_multiplier(
        &self,
        personality: &Personality,
        harmful: bool,
        social_event: bool,
    ) -> f64 {
        let c = &self.c;
        let centered = |score: f64| score.clamp(0.0, 10.0) - 5.0;
        let n = centered(personality.neuroticism);
        let e = centered(personality.extraversion);
        let o = centered(personality.openness);
        let con = centered(personality.conscientiousness);

        let mut multiplier = if harmful {
            1.0 + c.neuroticism_negative * n - c.conscientiousness_negative * con
        } else {
            1.0 - c.neuroticism_positive * n + c.extraversion_positive * e + c.openness_positive * o
        };
        if social_event {
            multiplier += if harmful {
                -c.extraversion_social_negative * e
            } else {
                c.extraversion_social_positive * e
            };
        }
        multiplier.max(0.0)
    }
}
