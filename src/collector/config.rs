use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Lowest accepted reading in mg/dL. Below the floor of common CGM sensors
/// but still physiologically possible in severe hypoglycaemia.
pub const DEFAULT_MIN_MG_DL: f64 = 20.0;
/// Highest accepted reading in mg/dL.
pub const DEFAULT_MAX_MG_DL: f64 = 600.0;
/// Invalid submissions tolerated per session; the last one aborts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Bounds and retry budget for the reading collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectorConfig {
    /// Inclusive lower bound, mg/dL
    pub min_mg_dl: f64,
    /// Inclusive upper bound, mg/dL
    pub max_mg_dl: f64,
    pub max_retries: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            min_mg_dl: DEFAULT_MIN_MG_DL,
            max_mg_dl: DEFAULT_MAX_MG_DL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_mg_dl.is_finite() || !self.max_mg_dl.is_finite() {
            bail!("reading bounds must be finite numbers");
        }
        if self.min_mg_dl > self.max_mg_dl {
            bail!(
                "minimum reading ({}) is greater than maximum reading ({})",
                self.min_mg_dl,
                self.max_mg_dl
            );
        }
        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }
        Ok(())
    }

    pub fn accepts(&self, value: f64) -> bool {
        value >= self.min_mg_dl && value <= self.max_mg_dl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CollectorConfig::default();
        config.validate().unwrap();
        assert!(config.accepts(20.0));
        assert!(config.accepts(600.0));
        assert!(!config.accepts(19.9));
        assert!(!config.accepts(600.1));
    }

    #[test]
    fn test_rejects_inverted_bounds_and_zero_budget() {
        let inverted = CollectorConfig {
            min_mg_dl: 300.0,
            max_mg_dl: 100.0,
            ..CollectorConfig::default()
        };
        assert!(inverted.validate().is_err());

        let no_budget = CollectorConfig {
            max_retries: 0,
            ..CollectorConfig::default()
        };
        assert!(no_budget.validate().is_err());

        let nan = CollectorConfig {
            min_mg_dl: f64::NAN,
            ..CollectorConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: CollectorConfig = serde_json::from_str(r#"{ "maxRetries": 5 }"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.min_mg_dl, DEFAULT_MIN_MG_DL);
    }
}
