//! Dataset and logging settings.
//!
//! A `DatasetSetting` is built once at startup (defaults, then an optional
//! JSON file) and handed by reference to every pipeline stage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataset::processor::NormMethod;
use crate::error::{Error, Result};
use crate::logger::INFO;
use crate::utility::{load_json, save_json};

/// Setting filename inside the data home
pub const SETTING_FILENAME: &str = "dataset_setting.json";

/// Per-feature scaling constants used by `NormMethod::NormConst`
pub const DEFAULT_FEATURE_WEIGHTS: [f64; 7] = [10.0, 1.0, 10.0, 1.0, 1000.0, 1_000_000.0, 100_000.0];

/// Number of trailing windows held out for validation
pub const DEFAULT_VALID_WINDOWS: usize = 5;

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSetting {
    pub level: i32,
    pub console: bool,
    pub file: bool,
}

impl Default for LogSetting {
    fn default() -> Self {
        Self {
            level: INFO,
            console: true,
            file: false,
        }
    }
}

/// Configuration of one dataset load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSetting {
    /// Root folder holding the shared files and one folder per dataset
    pub datapath: PathBuf,
    /// Dataset folder name under `datapath`
    pub dataset: String,
    pub random_seed: u64,
    pub pred_length: usize,
    pub condition_length: usize,
    /// Number of windows per training batch
    pub batch_size: usize,
    /// Stride between consecutive training windows
    pub split_interval: usize,
    /// Comma separated feature names, in column order
    pub features: String,
    /// Columns (positions in `features`) predicted by the decoder
    pub feature_out_index: Vec<usize>,
    /// Scaling constants, one per configured feature; the last one also scales graphs
    pub feature_weights: Vec<f64>,
    pub valid_windows: usize,
    pub norm_method: NormMethod,
    /// Keep self-loop mobility on the graph diagonal
    pub self_loop: bool,
    /// Calendar day of timeline index 0
    pub first_date: NaiveDate,
    /// Permute training windows once with `random_seed`
    pub shuffle: bool,
    pub log: LogSetting,
}

impl Default for DatasetSetting {
    fn default() -> Self {
        Self {
            datapath: PathBuf::from("data/"),
            dataset: "us".to_string(),
            random_seed: 42,
            pred_length: 14,
            condition_length: 21,
            batch_size: 8,
            split_interval: 3,
            features: "Confirmed,Deaths,Recovered,Active,Mortality_Rate,Population,Mobility".to_string(),
            feature_out_index: vec![0, 1],
            feature_weights: DEFAULT_FEATURE_WEIGHTS.to_vec(),
            valid_windows: DEFAULT_VALID_WINDOWS,
            norm_method: NormMethod::NormConst,
            self_loop: true,
            first_date: NaiveDate::from_ymd_opt(2020, 4, 12).unwrap_or_default(),
            shuffle: false,
            log: LogSetting::default(),
        }
    }
}

impl DatasetSetting {
    /// Load settings from a JSON file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let setting: DatasetSetting = load_json(path)?;
        setting.validate()?;
        Ok(setting)
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self)
    }

    /// Length of one training window
    pub fn window_length(&self) -> usize {
        self.condition_length + self.pred_length
    }

    /// Configured feature names in order
    pub fn feature_names(&self) -> Vec<String> {
        self.features
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Folder of the configured dataset
    pub fn dataset_path(&self) -> PathBuf {
        self.datapath.join(&self.dataset)
    }

    /// Check internal consistency of the setting
    pub fn validate(&self) -> Result<()> {
        if self.condition_length == 0 {
            return Err(Error::Setting("condition_length must be positive".into()));
        }
        if self.pred_length == 0 {
            return Err(Error::Setting("pred_length must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Setting("batch_size must be positive".into()));
        }
        if self.split_interval == 0 {
            return Err(Error::Setting("split_interval must be positive".into()));
        }

        let num_features = self.feature_names().len();
        if num_features == 0 {
            return Err(Error::Setting("no features configured".into()));
        }
        if self.feature_weights.len() != num_features {
            return Err(Error::Setting(format!(
                "{} feature weights for {} features",
                self.feature_weights.len(),
                num_features
            )));
        }
        if self.feature_weights.iter().any(|w| *w == 0.0) {
            return Err(Error::Setting("feature weights must be non-zero".into()));
        }
        if self.feature_out_index.is_empty() {
            return Err(Error::Setting("feature_out_index is empty".into()));
        }
        if let Some(&index) = self.feature_out_index.iter().find(|&&i| i >= num_features) {
            return Err(Error::FeatureIndexOutOfRange {
                index,
                len: num_features,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_setting_is_valid() {
        let setting = DatasetSetting::default();
        assert!(setting.validate().is_ok());
        assert_eq!(setting.window_length(), 35);
        assert_eq!(setting.feature_names().len(), 7);
        assert_eq!(setting.feature_weights, DEFAULT_FEATURE_WEIGHTS.to_vec());
    }

    #[test]
    fn test_weight_count_must_match_features() {
        let setting = DatasetSetting {
            features: "Confirmed,Deaths".to_string(),
            ..Default::default()
        };
        assert!(matches!(setting.validate(), Err(Error::Setting(_))));
    }

    #[test]
    fn test_out_index_in_range() {
        let setting = DatasetSetting {
            features: "Confirmed,Deaths".to_string(),
            feature_weights: vec![10.0, 1.0],
            feature_out_index: vec![2],
            ..Default::default()
        };
        assert!(matches!(
            setting.validate(),
            Err(Error::FeatureIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTING_FILENAME);
        std::fs::write(
            &path,
            r#"{"dataset": "ca", "batch_size": 4, "first_date": "2020-05-01"}"#,
        )
        .unwrap();

        let setting = DatasetSetting::load(&path).unwrap();
        assert_eq!(setting.dataset, "ca");
        assert_eq!(setting.batch_size, 4);
        assert_eq!(setting.first_date, NaiveDate::from_ymd_opt(2020, 5, 1).unwrap());
        assert_eq!(setting.condition_length, 21);
        assert_eq!(setting.norm_method, NormMethod::NormConst);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTING_FILENAME);
        let setting = DatasetSetting {
            shuffle: true,
            random_seed: 7,
            ..Default::default()
        };
        setting.save(&path).unwrap();

        let loaded = DatasetSetting::load(&path).unwrap();
        assert!(loaded.shuffle);
        assert_eq!(loaded.random_seed, 7);
    }
}
