use std::collections::VecDeque;

use serde::Serialize;

/// Per-series detector settings.
#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// Moving-window size for mean/deviation.
    pub window: usize,
    /// Outlier threshold in standard deviations.
    pub sigma_threshold: f64,
    /// Max observations per rolling 60 seconds.
    pub velocity_limit: usize,
    /// Spike threshold: absolute change in standard deviations.
    pub spike_sigma: f64,
    /// Spike threshold: relative change factor.
    pub spike_ratio: f64,
    /// Supplementary breaker: trip after this many anomalies...
    pub trip_after: usize,
    /// ...within this window (ms), auto-resetting after this cooldown (ms).
    pub trip_window_ms: i64,
    pub cooldown_ms: i64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnomalyConfig {
            window: 100,
            sigma_threshold: 3.0,
            velocity_limit: 100,
            spike_sigma: 5.0,
            spike_ratio: 5.0,
            trip_after: 5,
            trip_window_ms: 60_000,
            cooldown_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    StatisticalOutlier { value: f64, mean: f64, sigma: f64 },
    VelocityBreach { count: usize, limit: usize },
    MagnitudeSpike { previous: f64, value: f64 },
}

const VELOCITY_WINDOW_MS: i64 = 60_000;
/// Too few points for a meaningful deviation.
const MIN_SAMPLES: usize = 5;

/// Moving-window detector for one metric series.
pub struct SeriesDetector {
    config: AnomalyConfig,
    values: VecDeque<f64>,
    arrivals: VecDeque<i64>,
}

impl SeriesDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        SeriesDetector {
            config,
            values: VecDeque::new(),
            arrivals: VecDeque::new(),
        }
    }

    /// Feed one observation; returns every anomaly it triggers.
    pub fn observe(&mut self, value: f64, at_ms: i64) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        // Velocity: observations in the rolling window, including this one.
        while self
            .arrivals
            .front()
            .is_some_and(|&t| at_ms - t > VELOCITY_WINDOW_MS)
        {
            self.arrivals.pop_front();
        }
        self.arrivals.push_back(at_ms);
        if self.arrivals.len() > self.config.velocity_limit {
            anomalies.push(Anomaly::VelocityBreach {
                count: self.arrivals.len(),
                limit: self.config.velocity_limit,
            });
        }

        if self.values.len() >= MIN_SAMPLES {
            let (mean, sigma) = self.stats();
            if sigma > 0.0 && (value - mean).abs() > self.config.sigma_threshold * sigma {
                anomalies.push(Anomaly::StatisticalOutlier { value, mean, sigma });
            }

            if let Some(&previous) = self.values.back() {
                let absolute_spike =
                    sigma > 0.0 && (value - previous).abs() > self.config.spike_sigma * sigma;
                let relative_spike = previous.abs() > f64::EPSILON
                    && (value / previous).abs() > self.config.spike_ratio;
                if absolute_spike || relative_spike {
                    anomalies.push(Anomaly::MagnitudeSpike { previous, value });
                }
            }
        }

        self.values.push_back(value);
        while self.values.len() > self.config.window {
            self.values.pop_front();
        }

        anomalies
    }

    fn stats(&self) -> (f64, f64) {
        let n = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / n;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, variance.sqrt())
    }
}

/// Supplementary breaker fed by detector output: trips after N anomalies
/// within a window, then auto-resets once the cooldown passes.
pub struct AnomalyBreaker {
    config: AnomalyConfig,
    anomaly_times: VecDeque<i64>,
    tripped_until: Option<i64>,
}

impl AnomalyBreaker {
    pub fn new(config: AnomalyConfig) -> Self {
        AnomalyBreaker {
            config,
            anomaly_times: VecDeque::new(),
            tripped_until: None,
        }
    }

    pub fn is_tripped(&self, now_ms: i64) -> bool {
        self.tripped_until.is_some_and(|until| now_ms < until)
    }

    /// Record detected anomalies; returns true when this call tripped it.
    pub fn record(&mut self, anomalies: usize, now_ms: i64) -> bool {
        if self.is_tripped(now_ms) {
            return false;
        }
        self.tripped_until = None;

        for _ in 0..anomalies {
            self.anomaly_times.push_back(now_ms);
        }
        while self
            .anomaly_times
            .front()
            .is_some_and(|&t| now_ms - t > self.config.trip_window_ms)
        {
            self.anomaly_times.pop_front();
        }

        if self.anomaly_times.len() >= self.config.trip_after {
            self.tripped_until = Some(now_ms + self.config.cooldown_ms);
            self.anomaly_times.clear();
            eprintln!("[anomaly] supplementary breaker tripped, cooling down");
            return true;
        }
        false
    }
}
