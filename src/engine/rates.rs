use serde::Serialize;

use crate::model::economy::RateBand;

/// Inflation band thresholds and the rate each band carries. A cooldown
/// between band changes keeps the controller from oscillating on noisy
/// inflation readings.
#[derive(Debug, Clone, Serialize)]
pub struct RateConfig {
    /// Inflation at or below this selects the low band.
    pub low_inflation: f64,
    /// Inflation at or above this selects the high band.
    pub high_inflation: f64,
    pub low_rate: f64,
    pub normal_rate: f64,
    pub high_rate: f64,
    pub cooldown_ms: i64,
}

impl Default for RateConfig {
    fn default() -> Self {
        RateConfig {
            low_inflation: 0.02,
            high_inflation: 0.10,
            low_rate: 0.02,
            normal_rate: 0.05,
            high_rate: 0.12,
            cooldown_ms: 86_400_000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateAdjustment {
    pub previous_band: RateBand,
    pub band: RateBand,
    pub previous_rate: f64,
    pub new_rate: f64,
    pub inflation: f64,
}

/// Floating-rate controller: moves between bands on inflation readings.
pub struct RateController {
    config: RateConfig,
    band: RateBand,
    rate: f64,
    last_change_at: Option<i64>,
}

impl RateController {
    pub fn new(config: RateConfig) -> Self {
        let rate = config.normal_rate;
        RateController {
            config,
            band: RateBand::Normal,
            rate,
            last_change_at: None,
        }
    }

    pub fn current_band(&self) -> RateBand {
        self.band
    }

    pub fn current_rate(&self) -> f64 {
        self.rate
    }

    /// Feed an inflation reading. Low inflation selects the low band, high
    /// selects the high band, anything between changes nothing. A change is
    /// applied only once the cooldown since the previous change has passed.
    pub fn evaluate(&mut self, inflation: f64, now_ms: i64) -> Option<RateAdjustment> {
        let target = if inflation <= self.config.low_inflation {
            RateBand::Low
        } else if inflation >= self.config.high_inflation {
            RateBand::High
        } else {
            return None;
        };

        if target == self.band {
            return None;
        }
        if let Some(last) = self.last_change_at {
            if now_ms - last < self.config.cooldown_ms {
                return None;
            }
        }

        let new_rate = match target {
            RateBand::Low => self.config.low_rate,
            RateBand::Normal => self.config.normal_rate,
            RateBand::High => self.config.high_rate,
        };
        let adjustment = RateAdjustment {
            previous_band: self.band,
            band: target,
            previous_rate: self.rate,
            new_rate,
            inflation,
        };
        self.band = target;
        self.rate = new_rate;
        self.last_change_at = Some(now_ms);
        Some(adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RateController {
        RateController::new(RateConfig {
            cooldown_ms: 1_000,
            ..Default::default()
        })
    }

    #[test]
    fn high_inflation_raises_rates() {
        let mut c = controller();
        let adj = c.evaluate(0.15, 0).expect("band change");
        assert_eq!(adj.band, RateBand::High);
        assert_eq!(c.current_rate(), 0.12);
    }

    #[test]
    fn mid_band_inflation_changes_nothing() {
        let mut c = controller();
        assert!(c.evaluate(0.05, 0).is_none());
        assert_eq!(c.current_band(), RateBand::Normal);
    }

    #[test]
    fn cooldown_blocks_rapid_flapping() {
        let mut c = controller();
        assert!(c.evaluate(0.15, 0).is_some());
        // Back to low immediately: blocked by cooldown.
        assert!(c.evaluate(0.01, 500).is_none());
        assert_eq!(c.current_band(), RateBand::High);
        // After cooldown the change lands.
        let adj = c.evaluate(0.01, 2_000).expect("band change");
        assert_eq!(adj.band, RateBand::Low);
    }
}
