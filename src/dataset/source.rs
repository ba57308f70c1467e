//! Storage access for raw arrays, lookup tables and test points.

use ndarray::{Array1, Array3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dataset::utility::Split;
use crate::error::{Error, Result};
use crate::utility::load_json;

/// One row of the test-point table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPoint {
    pub pred_length: usize,
    pub start_date: String,
    pub end_date: String,
}

/// Source of every input a dataset load needs
pub trait DataSource {
    /// Raw features `[N, T, D]`
    fn load_features(&self, split: Split) -> Result<Array3<f64>>;

    /// Mobility graphs `[T, N, N]`
    fn load_graphs(&self, split: Split) -> Result<Array3<f64>>;

    /// Population per region `[N]`
    fn load_population(&self) -> Result<Array1<f64>>;

    /// Feature name to column of the augmented feature tensor
    fn load_feature_dict(&self) -> Result<HashMap<String, usize>>;

    /// All rows of the test-point table
    fn load_test_points(&self) -> Result<Vec<TestPoint>>;
}

/// In-memory source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub train_features: Array3<f64>,
    pub train_graphs: Array3<f64>,
    pub test_features: Option<Array3<f64>>,
    pub test_graphs: Option<Array3<f64>>,
    pub population: Array1<f64>,
    pub feature_dict: HashMap<String, usize>,
    pub test_points: Vec<TestPoint>,
}

impl MemorySource {
    pub fn new(
        train_features: Array3<f64>,
        train_graphs: Array3<f64>,
        population: Array1<f64>,
        feature_dict: HashMap<String, usize>,
    ) -> Self {
        Self {
            train_features,
            train_graphs,
            population,
            feature_dict,
            ..Default::default()
        }
    }

    pub fn with_test_split(mut self, features: Array3<f64>, graphs: Array3<f64>, points: Vec<TestPoint>) -> Self {
        self.test_features = Some(features);
        self.test_graphs = Some(graphs);
        self.test_points = points;
        self
    }
}

impl DataSource for MemorySource {
    fn load_features(&self, split: Split) -> Result<Array3<f64>> {
        match split {
            Split::Train => Ok(self.train_features.clone()),
            Split::Test => self
                .test_features
                .clone()
                .ok_or_else(|| Error::Setting("memory source has no test features".into())),
        }
    }

    fn load_graphs(&self, split: Split) -> Result<Array3<f64>> {
        match split {
            Split::Train => Ok(self.train_graphs.clone()),
            Split::Test => self
                .test_graphs
                .clone()
                .ok_or_else(|| Error::Setting("memory source has no test graphs".into())),
        }
    }

    fn load_population(&self) -> Result<Array1<f64>> {
        Ok(self.population.clone())
    }

    fn load_feature_dict(&self) -> Result<HashMap<String, usize>> {
        Ok(self.feature_dict.clone())
    }

    fn load_test_points(&self) -> Result<Vec<TestPoint>> {
        Ok(self.test_points.clone())
    }
}

/// File layout
///
/// ```text
/// <datapath>/feature_dict.json
/// <datapath>/state_info.json
/// <datapath>/<dataset>/{train,test,graph_train,graph_test}.json
/// <datapath>/<dataset>/test_point.csv      (tab separated)
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    pub datapath: PathBuf,
    pub dataset: String,
}

impl DirectorySource {
    pub fn new(datapath: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        Self {
            datapath: datapath.into(),
            dataset: dataset.into(),
        }
    }

    fn dataset_file(&self, name: &str) -> PathBuf {
        self.datapath.join(&self.dataset).join(name)
    }
}

impl DataSource for DirectorySource {
    fn load_features(&self, split: Split) -> Result<Array3<f64>> {
        load_json(&self.dataset_file(&format!("{}.json", split.feature_file())))
    }

    fn load_graphs(&self, split: Split) -> Result<Array3<f64>> {
        load_json(&self.dataset_file(&format!("{}.json", split.graph_file())))
    }

    fn load_population(&self) -> Result<Array1<f64>> {
        let population: Vec<f64> = load_json(&self.datapath.join("state_info.json"))?;
        Ok(Array1::from(population).mapv(f64::trunc))
    }

    fn load_feature_dict(&self) -> Result<HashMap<String, usize>> {
        load_json(&self.datapath.join("feature_dict.json"))
    }

    fn load_test_points(&self) -> Result<Vec<TestPoint>> {
        read_test_points(&self.dataset_file("test_point.csv"))
    }
}

/// Read the tab separated `Pred_Length, Start_date, End_date` table
#[cfg(feature = "table")]
pub fn read_test_points(path: &Path) -> Result<Vec<TestPoint>> {
    use polars::prelude::{CsvReadOptions, DataType, SerReader};

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|opts| opts.with_separator(b'\t'))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let pred = df
        .column("Pred_Length")?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let start = df
        .column("Start_date")?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let end = df
        .column("End_date")?
        .as_materialized_series()
        .cast(&DataType::String)?;

    pred.i64()?
        .into_iter()
        .zip(start.str()?.into_iter())
        .zip(end.str()?.into_iter())
        .enumerate()
        .map(|(row, ((pred_length, start_date), end_date))| match (pred_length, start_date, end_date) {
            (Some(p), Some(s), Some(e)) if p >= 0 => Ok(TestPoint {
                pred_length: p as usize,
                start_date: s.to_string(),
                end_date: e.to_string(),
            }),
            _ => Err(Error::Setting(format!(
                "incomplete test point row {} in {}",
                row,
                path.display()
            ))),
        })
        .collect()
}

#[cfg(not(feature = "table"))]
pub fn read_test_points(path: &Path) -> Result<Vec<TestPoint>> {
    Err(Error::Setting(format!(
        "reading {} requires the `table` feature",
        path.display()
    )))
}
