//! Flakiness analysis over per-case result history.
//!
//! Only PASS and FAIL outcomes are signal; BLOCKED and SKIPPED results say
//! nothing about the case itself and are filtered out before scoring.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::EngineResult;
use crate::model::ResultState;
use crate::store::RunStore;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// How many of the most recent samples to consider
    pub lookback: usize,
    /// Below this the verdict is Insufficient
    pub min_samples: usize,
    /// Pass rate at or above this is Stable
    pub stable_pass_rate: f64,
    /// Pass rate at or below this is ConsistentlyFailing
    pub failing_pass_rate: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            min_samples: 3,
            stable_pass_rate: 0.95,
            failing_pass_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stability {
    Stable,
    Flaky,
    ConsistentlyFailing,
    /// Fewer samples than the configured minimum
    Insufficient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakinessScore {
    pub samples: usize,
    pub pass_rate: f64,
    /// PASS<->FAIL flips between consecutive samples
    pub transitions: usize,
    pub stability: Stability,
    /// 0..=100; driven by how mixed the outcomes are, boosted when they
    /// flip back and forth rather than clustering
    pub risk_score: f64,
}

pub struct Analyzer {
    store: Arc<dyn RunStore>,
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(store: Arc<dyn RunStore>, config: AnalyzerConfig) -> Self {
        Self { store, config }
    }

    /// Score one case from its recorded history, newest samples first
    /// limited to the lookback window.
    pub async fn analyze_case(&self, case_id: &str) -> EngineResult<FlakinessScore> {
        let history = self.store.case_history(case_id).await?;
        let states: Vec<ResultState> = history.iter().map(|r| r.state).collect();
        Ok(analyze(&states, &self.config))
    }
}

/// Score a chronological sequence of result states (oldest first).
pub fn analyze(states: &[ResultState], config: &AnalyzerConfig) -> FlakinessScore {
    let samples: Vec<ResultState> = states
        .iter()
        .copied()
        .filter(|s| matches!(s, ResultState::Pass | ResultState::Fail))
        .collect();
    let window_start = samples.len().saturating_sub(config.lookback);
    let window = &samples[window_start..];

    let count = window.len();
    if count < config.min_samples {
        return FlakinessScore {
            samples: count,
            pass_rate: 0.0,
            transitions: 0,
            stability: Stability::Insufficient,
            risk_score: 0.0,
        };
    }

    let passed = window.iter().filter(|s| **s == ResultState::Pass).count();
    let pass_rate = passed as f64 / count as f64;
    let transitions = window.windows(2).filter(|pair| pair[0] != pair[1]).count();
    // a lone sample has no adjacent pairs to flip between
    let flip_rate = if count > 1 {
        transitions as f64 / (count - 1) as f64
    } else {
        0.0
    };

    // A high pass rate with more than one flip still reads as flaky: the
    // lone failure was not a one-off trailing sample.
    let stability = if pass_rate >= config.stable_pass_rate && transitions <= 1 {
        Stability::Stable
    } else if pass_rate <= config.failing_pass_rate {
        Stability::ConsistentlyFailing
    } else {
        Stability::Flaky
    };

    // Mixedness peaks at a 50/50 split; flip-heavy histories score higher
    // than the same split with outcomes clustered in blocks.
    let mixedness = 100.0 * (1.0 - (pass_rate - (1.0 - pass_rate)).abs());
    let risk_score = (mixedness * 0.6 + flip_rate * 100.0 * 0.4).min(100.0);

    FlakinessScore {
        samples: count,
        pass_rate,
        transitions,
        stability,
        risk_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResultState::{Blocked, Fail, Pass, Skipped};

    fn config() -> AnalyzerConfig {
        AnalyzerConfig::default()
    }

    #[test]
    fn test_all_passing_is_stable_with_zero_risk() {
        let score = analyze(&[Pass; 10], &config());
        assert_eq!(score.stability, Stability::Stable);
        assert_eq!(score.pass_rate, 1.0);
        assert_eq!(score.transitions, 0);
        assert_eq!(score.risk_score, 0.0);
    }

    #[test]
    fn test_all_failing_is_consistently_failing_not_flaky() {
        let score = analyze(&[Fail; 8], &config());
        assert_eq!(score.stability, Stability::ConsistentlyFailing);
        assert_eq!(score.risk_score, 0.0);
    }

    #[test]
    fn test_alternating_history_scores_highest() {
        let alternating = [Pass, Fail, Pass, Fail, Pass, Fail, Pass, Fail];
        let clustered = [Pass, Pass, Pass, Pass, Fail, Fail, Fail, Fail];
        let a = analyze(&alternating, &config());
        let b = analyze(&clustered, &config());
        assert_eq!(a.stability, Stability::Flaky);
        assert_eq!(b.stability, Stability::Flaky);
        assert!(a.risk_score > b.risk_score);
        assert_eq!(a.risk_score, 100.0);
    }

    #[test]
    fn test_below_min_samples_is_insufficient() {
        let score = analyze(&[Pass, Fail], &config());
        assert_eq!(score.stability, Stability::Insufficient);
        assert_eq!(score.samples, 2);
    }

    #[test]
    fn test_blocked_and_skipped_carry_no_signal() {
        let score = analyze(&[Pass, Blocked, Skipped, Fail], &config());
        assert_eq!(score.samples, 2);
        assert_eq!(score.stability, Stability::Insufficient);
    }

    #[test]
    fn test_single_sample_with_min_samples_one_scores_finite() {
        let config = AnalyzerConfig {
            min_samples: 1,
            ..Default::default()
        };
        let score = analyze(&[Fail], &config);
        assert!(score.risk_score.is_finite());
        assert_eq!(score.risk_score, 0.0);
        assert_eq!(score.stability, Stability::ConsistentlyFailing);
    }

    #[test]
    fn test_lookback_window_drops_old_samples() {
        // 20 old failures followed by 20 recent passes
        let mut states = vec![Fail; 20];
        states.extend_from_slice(&[Pass; 20]);
        let score = analyze(&states, &config());
        assert_eq!(score.samples, 20);
        assert_eq!(score.pass_rate, 1.0);
        assert_eq!(score.stability, Stability::Stable);
    }

    #[test]
    fn test_single_recent_flip_is_flaky() {
        let mut states = vec![Pass; 9];
        states.push(Fail);
        let score = analyze(&states, &config());
        assert_eq!(score.stability, Stability::Flaky);
        assert_eq!(score.transitions, 1);
    }

    #[test]
    fn test_high_pass_rate_with_mid_sequence_failure_is_flaky() {
        // 19 passes and one failure in the middle: the pass rate clears
        // the stable threshold but the two flips do not
        let mut states = vec![Pass; 10];
        states.push(Fail);
        states.extend_from_slice(&[Pass; 9]);
        let score = analyze(&states, &config());
        assert_eq!(score.pass_rate, 0.95);
        assert_eq!(score.transitions, 2);
        assert_eq!(score.stability, Stability::Flaky);
    }

    #[test]
    fn test_trailing_single_failure_at_stable_rate_stays_stable() {
        let mut states = vec![Pass; 19];
        states.push(Fail);
        let score = analyze(&states, &config());
        assert_eq!(score.transitions, 1);
        assert_eq!(score.stability, Stability::Stable);
    }
}
