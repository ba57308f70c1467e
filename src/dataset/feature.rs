//! Feature names, column lookup and feature augmentation.

use ndarray::{concatenate, s, Array1, Array3, Axis};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::dataset::processor::{clamp_null, normalize_feature, NormMethod};
use crate::error::{Error, Result};

/// Known feature columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Confirmed,
    Deaths,
    Recovered,
    Active,
    IncidentRate,
    TestingRate,
    HospitalizationRate,
    MortalityRate,
    Population,
    Mobility,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Confirmed,
        Feature::Deaths,
        Feature::Recovered,
        Feature::Active,
        Feature::IncidentRate,
        Feature::TestingRate,
        Feature::HospitalizationRate,
        Feature::MortalityRate,
        Feature::Population,
        Feature::Mobility,
    ];

    /// Name used in settings and the feature dictionary
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Confirmed => "Confirmed",
            Feature::Deaths => "Deaths",
            Feature::Recovered => "Recovered",
            Feature::Active => "Active",
            Feature::IncidentRate => "Incident_Rate",
            Feature::TestingRate => "Testing_Rate",
            Feature::HospitalizationRate => "Hospitalization_Rate",
            Feature::MortalityRate => "Mortality_Rate",
            Feature::Population => "Population",
            Feature::Mobility => "Mobility",
        }
    }

    /// Cumulative counts are the columns that get differenced
    pub fn is_cumulative(&self) -> bool {
        matches!(
            self,
            Feature::Confirmed | Feature::Deaths | Feature::Recovered | Feature::Active
        )
    }

    /// Columns passed through without any normalization
    pub fn is_raw(&self) -> bool {
        matches!(self, Feature::MortalityRate)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .iter()
            .find(|feature| feature.name() == s.trim())
            .copied()
            .ok_or_else(|| Error::UnknownFeature(s.to_string()))
    }
}

/// Configured features resolved against the feature dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSelection {
    features: Vec<Feature>,
    columns: Vec<usize>,
}

impl FeatureSelection {
    /// Parse configured names and look up their columns.
    ///
    /// The dictionary indexes the augmented tensor, so `Mobility` and
    /// `Population` must map to the columns appended after the raw ones.
    pub fn resolve(names: &[String], feature_dict: &HashMap<String, usize>) -> Result<Self> {
        let mut features = Vec::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let feature: Feature = name.parse()?;
            let column = feature_dict
                .get(feature.name())
                .copied()
                .ok_or_else(|| Error::MissingFeatureColumn(feature.name().to_string()))?;
            features.push(feature);
            columns.push(column);
        }
        Ok(Self { features, columns })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Append each region's self-loop mobility as a trailing column: `[N, T, D+1]`
pub fn add_mobility(graphs: &Array3<f64>, features: &Array3<f64>) -> Result<Array3<f64>> {
    let (num_states, num_days, _) = features.dim();
    let (graph_days, rows, cols) = graphs.dim();
    if graph_days != num_days || rows != num_states || cols != num_states {
        return Err(Error::ShapeMismatch {
            context: "add_mobility",
            expected: format!("[{}, {}, {}]", num_days, num_states, num_states),
            actual: format!("[{}, {}, {}]", graph_days, rows, cols),
        });
    }

    let mut mobility = Array3::<f64>::zeros((num_states, num_days, 1));
    for (day, step) in graphs.outer_iter().enumerate() {
        mobility
            .slice_mut(s![.., day, 0])
            .assign(&step.diag());
    }
    Ok(concatenate(Axis(2), &[features.view(), mobility.view()])?)
}

/// Append the per-region population as a constant trailing column: `[N, T, D+1]`
pub fn add_population(population: &Array1<f64>, features: &Array3<f64>) -> Result<Array3<f64>> {
    let (num_states, num_days, _) = features.dim();
    if population.len() != num_states {
        return Err(Error::ShapeMismatch {
            context: "add_population",
            expected: format!("[{}]", num_states),
            actual: format!("[{}]", population.len()),
        });
    }

    let column = population
        .view()
        .insert_axis(Axis(1))
        .insert_axis(Axis(2))
        .broadcast((num_states, num_days, 1))
        .ok_or_else(|| Error::ShapeMismatch {
            context: "add_population",
            expected: format!("[{}, {}, 1]", num_states, num_days),
            actual: format!("[{}, 1, 1]", num_states),
        })?
        .to_owned();
    Ok(concatenate(Axis(2), &[features.view(), column.view()])?)
}

/// Inputs shared by every feature preprocessing pass
#[derive(Debug, Clone, Copy)]
pub struct FeatureContext<'a> {
    pub selection: &'a FeatureSelection,
    pub population: &'a Array1<f64>,
    pub weights: &'a [f64],
    pub method: NormMethod,
}

/// Augment, select, clamp and normalize raw features.
///
/// `difference_first` only applies to cumulative counts; `Mortality_Rate`
/// passes through untouched and everything else is normalized as-is.
pub fn preprocess_features(
    raw: &Array3<f64>,
    graphs: &Array3<f64>,
    ctx: &FeatureContext<'_>,
    difference_first: bool,
) -> Result<Array3<f64>> {
    let selection = ctx.selection;

    let mut augmented = raw.clone();
    if selection.contains(Feature::Mobility) {
        augmented = add_mobility(graphs, &augmented)?;
    }
    if selection.contains(Feature::Population) {
        augmented = add_population(ctx.population, &augmented)?;
    }

    let available = augmented.len_of(Axis(2));
    if let Some(&index) = selection.columns().iter().find(|&&c| c >= available) {
        return Err(Error::FeatureIndexOutOfRange {
            index,
            len: available,
        });
    }

    let selected = clamp_null(augmented.select(Axis(2), selection.columns()));

    let mut output = selected.clone();
    for (i, feature) in selection.features().iter().enumerate() {
        if feature.is_raw() {
            continue;
        }
        let inc = difference_first && feature.is_cumulative();
        let column = normalize_feature(&selected, i, ctx.method, inc, ctx.weights)?;
        output.index_axis_mut(Axis(2), i).assign(&column);
    }
    Ok(output)
}
