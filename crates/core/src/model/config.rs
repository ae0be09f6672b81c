use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DetectorModel, PlanError, SessionPlan};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("feedback hit probability must be in [0, 1] (got {0})")]
    InvalidHitProbability(f64),

    #[error("feedback period must be > 0")]
    ZeroFeedbackPeriod,

    #[error("highlight blink period must be > 0")]
    ZeroBlinkPeriod,

    #[error("fill steps must be > 0")]
    ZeroFillSteps,
}

//
// ─── RAW CONFIG ────────────────────────────────────────────────────────────────
//

/// Every recognized session option, as read from a file, the environment or flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub stage_count: usize,
    pub stage_duration_ms: i64,
    pub analysis_duration_ms: i64,
    pub feedback_hit_probability: f64,
    pub feedback_period_ms: u64,
    /// Half of one visible/invisible blink cycle.
    pub highlight_blink_period_ms: u64,
    pub fill_steps: u32,
    pub start_delay_ms: u64,
    pub feedback_seed: Option<u64>,
    pub outcome_text: String,
    pub model: DetectorModel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stage_count: 3,
            stage_duration_ms: 5000,
            analysis_duration_ms: 2000,
            feedback_hit_probability: 0.7,
            feedback_period_ms: 1000,
            highlight_blink_period_ms: 500,
            fill_steps: 20,
            start_delay_ms: 0,
            feedback_seed: None,
            outcome_text: "Great job!".to_string(),
            model: DetectorModel::default(),
        }
    }
}

impl SessionConfig {
    /// Validate every option and split them into the timing plan and worker tuning.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Plan` for an invalid plan, or the matching variant
    /// for an out-of-range tuning option.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let plan = SessionPlan::from_millis(
            self.stage_count,
            self.stage_duration_ms,
            self.analysis_duration_ms,
        )?;

        let tuning = SessionTuning {
            hit_probability: self.feedback_hit_probability,
            feedback_period: Duration::from_millis(self.feedback_period_ms),
            blink_half_period: Duration::from_millis(self.highlight_blink_period_ms),
            fill_steps: self.fill_steps,
            feedback_seed: self.feedback_seed,
            outcome_text: self.outcome_text.clone(),
        };
        tuning.validate()?;

        Ok(ValidatedConfig {
            plan,
            tuning,
            start_delay: Duration::from_millis(self.start_delay_ms),
            model: self.model,
        })
    }
}

//
// ─── VALIDATED CONFIG ──────────────────────────────────────────────────────────
//

/// Worker parameters that do not affect stage boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTuning {
    pub hit_probability: f64,
    pub feedback_period: Duration,
    pub blink_half_period: Duration,
    pub fill_steps: u32,
    pub feedback_seed: Option<u64>,
    pub outcome_text: String,
}

impl SessionTuning {
    /// Check the ranges workers rely on.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` variant of the first out-of-range option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = self.hit_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidHitProbability(p));
        }
        if self.feedback_period.is_zero() {
            return Err(ConfigError::ZeroFeedbackPeriod);
        }
        if self.blink_half_period.is_zero() {
            return Err(ConfigError::ZeroBlinkPeriod);
        }
        if self.fill_steps == 0 {
            return Err(ConfigError::ZeroFillSteps);
        }
        Ok(())
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            hit_probability: 0.7,
            feedback_period: Duration::from_secs(1),
            blink_half_period: Duration::from_millis(500),
            fill_steps: 20,
            feedback_seed: None,
            outcome_text: "Great job!".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub plan: SessionPlan,
    pub tuning: SessionTuning,
    pub start_delay: Duration,
    pub model: DetectorModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_session() {
        let validated = SessionConfig::default().validate().unwrap();

        assert_eq!(validated.plan.stage_count(), 3);
        assert_eq!(validated.plan.stage_duration(), Duration::from_millis(5000));
        assert_eq!(validated.plan.analysis_duration(), Duration::from_millis(2000));
        assert_eq!(validated.tuning.fill_steps, 20);
        assert_eq!(validated.tuning.blink_half_period, Duration::from_millis(500));
        assert!((validated.tuning.hit_probability - 0.7).abs() < f64::EPSILON);
        assert_eq!(validated.model, DetectorModel::PoseDetection);
        assert_eq!(SessionTuning::default(), validated.tuning);
    }

    #[test]
    fn rejects_bad_options() {
        let mut config = SessionConfig::default();
        config.stage_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::Plan(PlanError::ZeroStages)));

        let mut config = SessionConfig::default();
        config.feedback_hit_probability = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidHitProbability(1.5)));

        let mut config = SessionConfig::default();
        config.fill_steps = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroFillSteps));

        let mut config = SessionConfig::default();
        config.highlight_blink_period_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBlinkPeriod));

        let mut config = SessionConfig::default();
        config.stage_duration_ms = -5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Plan(PlanError::NegativeDuration { .. }))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "stage_count": 5, "model": "Object Detection" }"#).unwrap();

        assert_eq!(config.stage_count, 5);
        assert_eq!(config.stage_duration_ms, 5000);
        assert_eq!(config.model, DetectorModel::ObjectDetection);
    }

    #[test]
    fn tuning_checks_its_own_ranges() {
        assert_eq!(SessionTuning::default().validate(), Ok(()));

        let tuning = SessionTuning {
            fill_steps: 0,
            ..SessionTuning::default()
        };
        assert_eq!(tuning.validate(), Err(ConfigError::ZeroFillSteps));

        let tuning = SessionTuning {
            hit_probability: f64::NAN,
            ..SessionTuning::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::InvalidHitProbability(_))
        ));

        let tuning = SessionTuning {
            feedback_period: Duration::ZERO,
            ..SessionTuning::default()
        };
        assert_eq!(tuning.validate(), Err(ConfigError::ZeroFeedbackPeriod));
    }
}
