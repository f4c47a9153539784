use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub matching: MatchingConfig,
    pub temporal: TemporalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Confidence floor below which a routed plan is flagged as low
    /// confidence (the plan is still produced; acting on it is the
    /// caller's call).
    pub min_confidence: f64,
    /// Result limit applied when a superlative is present without an
    /// explicit count.
    pub default_top_limit: u32,
    /// Upper clamp for explicit "top N" counts.
    pub max_top_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Smallest 4-digit number accepted as a calendar year.
    pub min_year: i32,
    /// Pinned upper bound for year extraction; `None` uses the wall clock.
    pub reference_year: Option<i32>,
}

impl TemporalConfig {
    /// The year bounding extraction: pinned in tests, wall clock otherwise.
    pub fn effective_reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| Utc::now().year())
    }
}

impl RouterConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.matching.min_confidence) {
            return Err("matching.min_confidence must be in [0.0, 1.0]".into());
        }
        if self.matching.default_top_limit == 0 {
            return Err("matching.default_top_limit must be > 0".into());
        }
        if self.matching.max_top_limit < self.matching.default_top_limit {
            return Err("matching.max_top_limit must be >= default_top_limit".into());
        }
        if !(1800..=2100).contains(&self.temporal.min_year) {
            return Err("temporal.min_year must be a plausible calendar year".into());
        }
        if let Some(reference_year) = self.temporal.reference_year {
            if reference_year < self.temporal.min_year {
                return Err("temporal.reference_year must be >= min_year".into());
            }
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig {
                min_confidence: 0.2,
                default_top_limit: 10,
                max_top_limit: 50,
            },
            temporal: TemporalConfig {
                min_year: 1990,
                reference_year: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        RouterConfig::default().validate().unwrap();
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        let mut config = RouterConfig::default();
        config.matching.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limit_clamp_must_cover_default() {
        let mut config = RouterConfig::default();
        config.matching.max_top_limit = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pinned_reference_year_wins_over_clock() {
        let mut config = RouterConfig::default();
        config.temporal.reference_year = Some(2025);
        assert_eq!(config.temporal.effective_reference_year(), 2025);
    }
}
