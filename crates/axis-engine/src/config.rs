use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
}

fn default_min_sample_size() -> i64 {
    10
}

fn default_high_concentration_threshold() -> f64 {
    0.8
}

fn default_moderate_concentration_threshold() -> f64 {
    0.7
}

fn default_min_tag_diversity_ratio() -> f64 {
    0.12
}

fn default_top_k() -> i64 {
    3
}

fn default_transfer_gap() -> f64 {
    0.2
}

/// Raw thresholds as they appear in `main.yaml`. Validate with
/// [`EngineConfig::try_from`] before use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: i64,
    #[serde(default = "default_high_concentration_threshold")]
    pub high_concentration_threshold: f64,
    #[serde(default = "default_moderate_concentration_threshold")]
    pub moderate_concentration_threshold: f64,
    #[serde(default = "default_min_tag_diversity_ratio")]
    pub min_tag_diversity_ratio: f64,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_transfer_gap")]
    pub transfer_gap: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_sample_size: default_min_sample_size(),
            high_concentration_threshold: default_high_concentration_threshold(),
            moderate_concentration_threshold: default_moderate_concentration_threshold(),
            min_tag_diversity_ratio: default_min_tag_diversity_ratio(),
            top_k: default_top_k(),
            transfer_gap: default_transfer_gap(),
        }
    }
}

/// Validated thresholds. Only constructible through [`EngineSettings`], so an
/// `EngineConfig` in hand is always in range.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    min_sample_size: usize,
    high_concentration_threshold: f64,
    moderate_concentration_threshold: f64,
    min_tag_diversity_ratio: f64,
    top_k: usize,
    transfer_gap: f64,
}

impl EngineConfig {
    pub fn min_sample_size(&self) -> usize {
        self.min_sample_size
    }

    pub fn high_concentration_threshold(&self) -> f64 {
        self.high_concentration_threshold
    }

    pub fn moderate_concentration_threshold(&self) -> f64 {
        self.moderate_concentration_threshold
    }

    pub fn min_tag_diversity_ratio(&self) -> f64 {
        self.min_tag_diversity_ratio
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn transfer_gap(&self) -> f64 {
        self.transfer_gap
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            min_sample_size: self.min_sample_size as i64,
            high_concentration_threshold: self.high_concentration_threshold,
            moderate_concentration_threshold: self.moderate_concentration_threshold,
            min_tag_diversity_ratio: self.min_tag_diversity_ratio,
            top_k: self.top_k as i64,
            transfer_gap: self.transfer_gap,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 10,
            high_concentration_threshold: 0.8,
            moderate_concentration_threshold: 0.7,
            min_tag_diversity_ratio: 0.12,
            top_k: 3,
            transfer_gap: 0.2,
        }
    }
}

impl TryFrom<EngineSettings> for EngineConfig {
    type Error = EngineError;

    fn try_from(settings: EngineSettings) -> Result<Self, Self::Error> {
        let min_sample_size = non_negative("min_sample_size", settings.min_sample_size)?;
        let top_k = non_negative("top_k", settings.top_k)?;
        let high = unit_fraction(
            "high_concentration_threshold",
            settings.high_concentration_threshold,
        )?;
        let moderate = unit_fraction(
            "moderate_concentration_threshold",
            settings.moderate_concentration_threshold,
        )?;
        let diversity = unit_fraction("min_tag_diversity_ratio", settings.min_tag_diversity_ratio)?;
        let transfer_gap = unit_fraction("transfer_gap", settings.transfer_gap)?;

        if moderate > high {
            return Err(EngineError::InvalidConfiguration {
                field: "moderate_concentration_threshold",
                reason: format!("({moderate}) must not exceed high_concentration_threshold ({high})"),
            });
        }

        Ok(Self {
            min_sample_size,
            high_concentration_threshold: high,
            moderate_concentration_threshold: moderate,
            min_tag_diversity_ratio: diversity,
            top_k,
            transfer_gap,
        })
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<usize, EngineError> {
    usize::try_from(value).map_err(|_| EngineError::InvalidConfiguration {
        field,
        reason: format!("must be >= 0, got {value}"),
    })
}

fn unit_fraction(field: &'static str, value: f64) -> Result<f64, EngineError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(EngineError::InvalidConfiguration {
            field,
            reason: format!("must be within [0, 1], got {value}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_to_default_config() {
        let config = EngineConfig::try_from(EngineSettings::default()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn yaml_partial_settings_fill_defaults() {
        let settings: EngineSettings = serde_yaml::from_str("min_sample_size: 5\n").unwrap();
        assert_eq!(settings.min_sample_size, 5);
        assert_eq!(settings.high_concentration_threshold, 0.8);
        assert_eq!(settings.top_k, 3);
    }

    #[test]
    fn threshold_above_one_is_rejected() {
        let settings = EngineSettings {
            high_concentration_threshold: 1.2,
            ..EngineSettings::default()
        };
        let err = EngineConfig::try_from(settings).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidConfiguration {
                field: "high_concentration_threshold",
                ..
            }
        ));
    }

    #[test]
    fn nan_ratio_is_rejected() {
        let settings = EngineSettings {
            min_tag_diversity_ratio: f64::NAN,
            ..EngineSettings::default()
        };
        assert!(EngineConfig::try_from(settings).is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let settings = EngineSettings {
            min_sample_size: -1,
            ..EngineSettings::default()
        };
        let err = EngineConfig::try_from(settings).unwrap_err();
        assert!(err.to_string().contains("min_sample_size"));

        let settings = EngineSettings {
            top_k: -3,
            ..EngineSettings::default()
        };
        assert!(EngineConfig::try_from(settings).is_err());
    }

    #[test]
    fn moderate_above_high_is_rejected() {
        let settings = EngineSettings {
            high_concentration_threshold: 0.6,
            moderate_concentration_threshold: 0.7,
            ..EngineSettings::default()
        };
        let err = EngineConfig::try_from(settings).unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn boundary_values_are_accepted() {
        let settings = EngineSettings {
            min_sample_size: 0,
            high_concentration_threshold: 1.0,
            moderate_concentration_threshold: 0.0,
            min_tag_diversity_ratio: 0.0,
            top_k: 0,
            transfer_gap: 1.0,
        };
        let config = EngineConfig::try_from(settings.clone()).unwrap();
        assert_eq!(config.settings(), settings);
    }
}
