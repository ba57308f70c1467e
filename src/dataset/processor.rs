//! Scalar normalization of feature columns and mobility graphs.

use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Value of the first timestep after differencing.
///
/// There is no predecessor for t = 0, so the series starts at 1 rather than
/// 0 or the raw value. Consumers trained on this layout depend on it.
pub const DIFFERENCE_SENTINEL: f64 = 1.0;

/// Raw values at or below this are missing-data markers
pub const NULL_THRESHOLD: f64 = -1.0;

/// Normalization method for features and graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMethod {
    /// `ln(x + 1)`
    Log,
    /// Divide by the feature's constant weight
    NormConst,
    None,
}

/// Replace missing-data markers (`<= -1`) with 0
pub fn clamp_null(mut features: Array3<f64>) -> Array3<f64> {
    features.mapv_inplace(|v| if v <= NULL_THRESHOLD { 0.0 } else { v });
    features
}

/// First difference along time of a `[N, T]` series, sentinel at t = 0
pub fn difference(series: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::from_elem(series.raw_dim(), DIFFERENCE_SENTINEL);
    if series.ncols() > 1 {
        let diff = &series.slice(s![.., 1..]) - &series.slice(s![.., ..-1]);
        out.slice_mut(s![.., 1..]).assign(&diff);
    }
    out
}

/// Normalize one feature column of a `[N, T, D]` tensor, returning `[N, T]`.
///
/// `weights` is indexed by the feature's position in the configured list.
pub fn normalize_feature(
    features: &Array3<f64>,
    feature_id: usize,
    method: NormMethod,
    difference_first: bool,
    weights: &[f64],
) -> Result<Array2<f64>> {
    let num_features = features.len_of(Axis(2));
    if feature_id >= num_features {
        return Err(Error::FeatureIndexOutOfRange {
            index: feature_id,
            len: num_features,
        });
    }

    let column = features.index_axis(Axis(2), feature_id).to_owned();
    let column = if difference_first {
        difference(&column)
    } else {
        column
    };

    match method {
        NormMethod::Log => Ok(column.mapv(|v| (v + 1.0).ln())),
        NormMethod::NormConst => {
            let weight = weights.get(feature_id).ok_or(Error::FeatureIndexOutOfRange {
                index: feature_id,
                len: weights.len(),
            })?;
            Ok(column / *weight)
        }
        NormMethod::None => Ok(column),
    }
}

/// Normalize a `[T, N, N]` graph tensor.
///
/// Without `keep_self_loop` the diagonal of every timestep is zeroed first.
/// `NormConst` divides by the last entry of `weights`.
pub fn normalize_graph(
    graphs: &Array3<f64>,
    method: NormMethod,
    keep_self_loop: bool,
    weights: &[f64],
) -> Result<Array3<f64>> {
    let mut output = graphs.clone();
    if !keep_self_loop {
        for mut step in output.outer_iter_mut() {
            step.diag_mut().fill(0.0);
        }
    }

    match method {
        NormMethod::Log => output.mapv_inplace(|v| (v + 1.0).ln()),
        NormMethod::NormConst => {
            let weight = weights
                .last()
                .ok_or_else(|| Error::Setting("empty feature weight table".into()))?;
            output /= *weight;
        }
        NormMethod::None => {}
    }
    Ok(output)
}
