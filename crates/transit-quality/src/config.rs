//! Configuration types for the cleaning and densification pipeline.
//!
//! Every stage receives its settings explicitly through these objects; there
//! is no process-wide path or parameter state.

use crate::error::{QualityError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column names of the sparse observation table fed to the densifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumns {
    /// Entity id (stop sequence number).
    pub entity: String,
    /// Secondary coordinate (day of week).
    pub secondary: String,
    /// Tertiary coordinate (hour of day).
    pub tertiary: String,
    /// Aggregate value (on-board passenger count).
    pub value: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            entity: "정류장순번".to_string(),
            secondary: "dow".to_string(),
            tertiary: "hour".to_string(),
            value: "재차인원".to_string(),
        }
    }
}

impl KeyColumns {
    pub fn keys(&self) -> [&str; 3] {
        [
            self.entity.as_str(),
            self.secondary.as_str(),
            self.tertiary.as_str(),
        ]
    }
}

/// Settings for dense lookup table reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensifyConfig {
    pub columns: KeyColumns,

    /// Value for cells with neither an exact observation nor any observation
    /// sharing their (entity, tertiary) pair.
    /// Default: 0.0
    pub default_value: f64,

    /// Explicit entity domain. When `None`, the distinct entity ids present
    /// in the observations are used.
    pub entities: Option<Vec<i64>>,

    /// Default: 0..=6 (day of week)
    pub secondary_domain: Vec<i64>,

    /// Default: 0..=23 (hour of day)
    pub tertiary_domain: Vec<i64>,
}

impl Default for DensifyConfig {
    fn default() -> Self {
        Self {
            columns: KeyColumns::default(),
            default_value: 0.0,
            entities: None,
            secondary_domain: (0..=6).collect(),
            tertiary_domain: (0..=23).collect(),
        }
    }
}

/// Configuration for the pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use transit_quality::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .iqr_multiplier(1.5)
///     .fail_on_unresolved(true)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scale factor applied to the IQR to compute the outlier upper bound.
    /// Default: 3.0
    pub iqr_multiplier: f64,

    /// Densification settings.
    pub densify: DensifyConfig,

    /// Whether a field left with missing values after the imputation cascade
    /// aborts the run. When false the field is only reported.
    /// Default: false
    pub fail_on_unresolved: bool,

    /// Decimals kept in stored predictions.
    /// Default: 4
    pub prediction_decimals: u32,

    /// Decimals kept in the presentation lookup JSON.
    /// Default: 2
    pub lookup_decimals: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 3.0,
            densify: DensifyConfig::default(),
            fail_on_unresolved: false,
            prediction_decimals: 4,
            lookup_decimals: 2,
        }
    }
}

/// Upper limit for rounding precision.
const MAX_DECIMALS: u32 = 12;

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| QualityError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        if !self.densify.default_value.is_finite() {
            return Err(ConfigValidationError::InvalidDefaultValue(
                self.densify.default_value,
            ));
        }

        for (field, decimals) in [
            ("prediction_decimals", self.prediction_decimals),
            ("lookup_decimals", self.lookup_decimals),
        ] {
            if decimals > MAX_DECIMALS {
                return Err(ConfigValidationError::InvalidDecimals {
                    field: field.to_string(),
                    value: decimals,
                });
            }
        }

        let columns = &self.densify.columns;
        let names = [
            columns.entity.as_str(),
            columns.secondary.as_str(),
            columns.tertiary.as_str(),
            columns.value.as_str(),
        ];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyColumnName);
        }
        for (i, name) in names.iter().enumerate() {
            if names[i + 1..].contains(name) {
                return Err(ConfigValidationError::DuplicateColumn(name.to_string()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid IQR multiplier: {0} (must be finite and >= 0)")]
    InvalidMultiplier(f64),

    #[error("Invalid default value: {0} (must be finite)")]
    InvalidDefaultValue(f64),

    #[error("Invalid decimals for '{field}': {value} (must be at most 12)")]
    InvalidDecimals { field: String, value: u32 },

    #[error("Densify column names must not be empty")]
    EmptyColumnName,

    #[error("Column '{0}' is used for more than one densify role")]
    DuplicateColumn(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    iqr_multiplier: Option<f64>,
    densify: Option<DensifyConfig>,
    fail_on_unresolved: Option<bool>,
    prediction_decimals: Option<u32>,
    lookup_decimals: Option<u32>,
}

impl PipelineConfigBuilder {
    /// Set the IQR multiplier used for outlier bounds.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the densification settings.
    pub fn densify(mut self, densify: DensifyConfig) -> Self {
        self.densify = Some(densify);
        self
    }

    /// Abort when a field cannot be fully imputed.
    pub fn fail_on_unresolved(mut self, fail: bool) -> Self {
        self.fail_on_unresolved = Some(fail);
        self
    }

    pub fn prediction_decimals(mut self, decimals: u32) -> Self {
        self.prediction_decimals = Some(decimals);
        self
    }

    pub fn lookup_decimals(mut self, decimals: u32) -> Self {
        self.lookup_decimals = Some(decimals);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            densify: self.densify.unwrap_or(defaults.densify),
            fail_on_unresolved: self.fail_on_unresolved.unwrap_or(defaults.fail_on_unresolved),
            prediction_decimals: self
                .prediction_decimals
                .unwrap_or(defaults.prediction_decimals),
            lookup_decimals: self.lookup_decimals.unwrap_or(defaults.lookup_decimals),
        };

        config.validate()?;
        Ok(config)
    }
}
