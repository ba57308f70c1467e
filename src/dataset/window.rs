//! Fixed-stride windows over the full timeline and the train/valid split.

use ndarray::{s, Array3, Array4, Axis};
use std::ops::Range;

use crate::dataset::utility::Segment;
use crate::error::{Error, Result};

/// Number of windows of `window_length` that fit `total` steps at `stride`
pub fn window_count(total: usize, window_length: usize, stride: usize) -> usize {
    if stride == 0 || window_length == 0 || total < window_length {
        return 0;
    }
    (total - window_length) / stride + 1
}

/// Slice `[N, T, D]` features and `[T, N, N]` graphs into overlapping windows.
///
/// Window `i` covers `[i * stride, i * stride + window_length)`; returns
/// `[K, N, L, D]` and `[K, L, N, N]`.
pub fn generate_windows(
    features: &Array3<f64>,
    graphs: &Array3<f64>,
    stride: usize,
    window_length: usize,
) -> Result<(Array4<f64>, Array4<f64>)> {
    let (num_states, total, num_features) = features.dim();
    if graphs.dim() != (total, num_states, num_states) {
        let (t, r, c) = graphs.dim();
        return Err(Error::ShapeMismatch {
            context: "generate_windows",
            expected: format!("[{}, {}, {}]", total, num_states, num_states),
            actual: format!("[{}, {}, {}]", t, r, c),
        });
    }

    let num_windows = window_count(total, window_length, stride);
    if num_windows == 0 {
        return Err(Error::InsufficientWindows {
            available: 0,
            required: 1,
        });
    }

    let mut features_split = Array4::<f64>::zeros((num_windows, num_states, window_length, num_features));
    let mut graphs_split = Array4::<f64>::zeros((num_windows, window_length, num_states, num_states));

    for k in 0..num_windows {
        let start = k * stride;
        if start + window_length > total {
            return Err(Error::WindowOutOfBounds {
                start,
                length: window_length,
                total,
            });
        }
        features_split
            .index_axis_mut(Axis(0), k)
            .assign(&features.slice(s![.., start..start + window_length, ..]));
        graphs_split
            .index_axis_mut(Axis(0), k)
            .assign(&graphs.slice(s![start..start + window_length, .., ..]));
    }
    Ok((features_split, graphs_split))
}

/// Window indices belonging to `segment`.
///
/// The last `valid_windows` windows are validation, everything before is
/// training. An empty selection is an error.
pub fn segment_range(num_windows: usize, valid_windows: usize, segment: Segment) -> Result<Range<usize>> {
    let split = num_windows.saturating_sub(valid_windows);
    let range = match segment {
        Segment::Train => 0..split,
        Segment::Valid => split..num_windows,
        Segment::Test => {
            return Err(Error::Setting(
                "test samples come from the test-point table, not training windows".into(),
            ))
        }
    };
    if range.is_empty() {
        return Err(Error::InsufficientWindows {
            available: num_windows,
            required: valid_windows + 1,
        });
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn timeline(num_states: usize, total: usize, num_features: usize) -> (Array3<f64>, Array3<f64>) {
        let features = Array::from_shape_fn((num_states, total, num_features), |(n, t, d)| {
            (100 * n + 10 * t + d) as f64
        });
        let graphs = Array::from_shape_fn((total, num_states, num_states), |(t, i, j)| {
            (100 * t + 10 * i + j) as f64
        });
        (features, graphs)
    }

    #[test]
    fn test_window_count() {
        assert_eq!(window_count(10, 7, 1), 4);
        assert_eq!(window_count(10, 7, 2), 2);
        assert_eq!(window_count(10, 10, 3), 1);
        assert_eq!(window_count(6, 7, 1), 0);
        assert_eq!(window_count(10, 7, 0), 0);
    }

    #[test]
    fn test_windows_match_source_slices() {
        let (features, graphs) = timeline(3, 10, 2);
        let (fw, gw) = generate_windows(&features, &graphs, 1, 7).unwrap();
        assert_eq!(fw.dim(), (4, 3, 7, 2));
        assert_eq!(gw.dim(), (4, 7, 3, 3));

        // [0,7), [1,8), [2,9), [3,10)
        for k in 0..4 {
            assert_eq!(fw.index_axis(Axis(0), k), features.slice(s![.., k..k + 7, ..]));
            assert_eq!(gw.index_axis(Axis(0), k), graphs.slice(s![k..k + 7, .., ..]));
        }
        assert_eq!(fw[[3, 0, 6, 0]], 90.0);
    }

    #[test]
    fn test_stride_drops_tail() {
        let (features, graphs) = timeline(2, 11, 1);
        let (fw, _) = generate_windows(&features, &graphs, 3, 5).unwrap();
        // starts 0, 3, 6; a window at 9 would overrun
        assert_eq!(fw.len_of(Axis(0)), 3);
        assert_eq!(fw[[2, 0, 0, 0]], 60.0);
    }

    #[test]
    fn test_timeline_too_short() {
        let (features, graphs) = timeline(2, 4, 1);
        assert!(matches!(
            generate_windows(&features, &graphs, 1, 5),
            Err(Error::InsufficientWindows { .. })
        ));
    }

    #[test]
    fn test_graph_shape_checked() {
        let (features, _) = timeline(2, 8, 1);
        let graphs = Array3::<f64>::zeros((7, 2, 2));
        assert!(matches!(
            generate_windows(&features, &graphs, 1, 5),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_segment_ranges() {
        assert_eq!(segment_range(12, 5, Segment::Train).unwrap(), 0..7);
        assert_eq!(segment_range(12, 5, Segment::Valid).unwrap(), 7..12);
        // fewer windows than the holdout: everything is validation
        assert_eq!(segment_range(3, 5, Segment::Valid).unwrap(), 0..3);
        assert!(segment_range(3, 5, Segment::Train).is_err());
        assert!(segment_range(12, 5, Segment::Test).is_err());
    }
}
