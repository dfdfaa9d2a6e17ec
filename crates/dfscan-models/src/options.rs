//! Analysis request options.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default analysis sampling rate (frames per second).
pub const DEFAULT_TARGET_FPS: f64 = 3.0;

/// Default decision threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Default catalog model.
pub const DEFAULT_MODEL: &str = "xception";

/// Options supplied with an analysis submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct AnalysisOptions {
    #[validate(range(exclusive_min = 0.0, max = 60.0), custom(function = "finite"))]
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,

    #[validate(range(min = 0.0, max = 1.0), custom(function = "finite"))]
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[validate(length(min = 1, max = 64))]
    #[serde(default = "default_model")]
    pub model: String,
}

/// Range checks let NaN through; every comparison with it is false.
fn finite(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("finite"))
    }
}

fn default_target_fps() -> f64 {
    DEFAULT_TARGET_FPS
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            threshold: DEFAULT_THRESHOLD,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl AnalysisOptions {
    pub fn with_target_fps(mut self, fps: f64) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts: AnalysisOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, AnalysisOptions::default());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validation_bounds() {
        assert!(AnalysisOptions::default().with_target_fps(0.0).validate().is_err());
        assert!(AnalysisOptions::default().with_target_fps(90.0).validate().is_err());
        assert!(AnalysisOptions::default().with_threshold(1.5).validate().is_err());
        assert!(AnalysisOptions::default().with_model("").validate().is_err());
        assert!(AnalysisOptions::default()
            .with_target_fps(1.0)
            .with_threshold(1.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(AnalysisOptions::default().with_target_fps(f64::NAN).validate().is_err());
        assert!(AnalysisOptions::default().with_target_fps(f64::INFINITY).validate().is_err());
        assert!(AnalysisOptions::default().with_threshold(f64::NAN).validate().is_err());
    }
}
