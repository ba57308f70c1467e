//! Time-expanded graph construction for one conditioning window.
//!
//! Every (region, timestep) pair becomes a node, numbered
//! `region * T1 + timestep`. Edges come from the mobility graph, restricted
//! to forward-in-time pairs at most one graph timestep apart:
//!
//! - same-region pairs use the region's self-loop weight at the source
//!   timestep, for any pair of its own timesteps;
//! - cross-region pairs only survive between nodes of the same timestep.
//!
//! Weight and time-difference matrices are dense `[N*T1, N*T1]`. This is the
//! hot path of dataset loading; the blocks for timestep pairs more than one
//! step apart are always empty and could be skipped without changing output.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView3, Axis, Zip};

use crate::error::{Error, Result};

/// Slack on the time-gap comparison absorbing `i/L - (i-1)/L` rounding
pub const TIME_TOLERANCE: f64 = 1e-9;

/// Added to relative times before sparsifying so a zero gap is not read as "no edge"
const TIME_OFFSET: f64 = 3.0;

/// Encoder input: one time-expanded graph
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalGraph {
    /// Node features `[N*T1, D]`
    pub x: Array2<f64>,
    /// Node timestamps `[N*T1]`
    pub pos: Array1<f64>,
    /// Timesteps per region `[N]`, all equal to T1
    pub y: Array1<usize>,
    /// Source/target node pairs `[2, E]`
    pub edge_index: Array2<usize>,
    pub edge_weight: Array1<f64>,
    /// `pos[source] - pos[target]`, always in `[-gap, 0]`
    pub edge_time: Array1<f64>,
}

impl TemporalGraph {
    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.ncols()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Pairwise `pos[a] - pos[b]`
pub fn time_difference_matrix(pos: ArrayView1<f64>) -> Array2<f64> {
    let n = pos.len();
    Array2::from_shape_fn((n, n), |(a, b)| pos[a] - pos[b])
}

/// Tile a `[T1, N, N]` graph over the node grid and mask cross-region,
/// cross-time entries.
///
/// Entry `(a, b)` with `a = (i, t)`, `b = (j, k)` reads `graph[t, i, j]`
/// when `i == j` or `t == k`, and is 0 otherwise.
pub fn masked_weight_matrix(graph: ArrayView3<f64>) -> Array2<f64> {
    let (t1, n, _) = graph.dim();
    let size = n * t1;
    Array2::from_shape_fn((size, size), |(a, b)| {
        let (i, t) = (a / t1, a % t1);
        let (j, k) = (b / t1, b % t1);
        if i == j || t == k {
            graph[[t, i, j]]
        } else {
            0.0
        }
    })
}

/// Non-zero entries of a dense matrix in row-major order: `([2, E], [E])`
pub fn dense_to_sparse(dense: &Array2<f64>) -> (Array2<usize>, Array1<f64>) {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for ((a, b), &v) in dense.indexed_iter() {
        if v != 0.0 {
            rows.push(a);
            cols.push(b);
            values.push(v);
        }
    }
    let num_edges = values.len();
    rows.extend(cols);
    let index = Array2::from_shape_vec((2, num_edges), rows)
        .unwrap_or_else(|_| Array2::zeros((2, 0)));
    (index, Array1::from(values))
}

/// Build the time-expanded graph of one window.
///
/// `features` is the conditioning slice `[N, T1, D]`, `graph` the window's
/// graph `[T, N, N]` with `T >= T1`, and `times` the shared axis `[T1]`.
/// The maximum edge time gap is `1 / T`. Returns the graph and its edge
/// count; a graph without edges is an error.
pub fn build_temporal_graph(
    features: ArrayView3<f64>,
    graph: ArrayView3<f64>,
    times: ArrayView1<f64>,
) -> Result<(TemporalGraph, usize)> {
    let (num_states, t1, num_features) = features.dim();
    let (graph_steps, rows, cols) = graph.dim();
    if graph_steps < t1 || rows != num_states || cols != num_states {
        return Err(Error::ShapeMismatch {
            context: "build_temporal_graph graph",
            expected: format!("[>={}, {}, {}]", t1, num_states, num_states),
            actual: format!("[{}, {}, {}]", graph_steps, rows, cols),
        });
    }
    if times.len() != t1 {
        return Err(Error::ShapeMismatch {
            context: "build_temporal_graph times",
            expected: format!("[{}]", t1),
            actual: format!("[{}]", times.len()),
        });
    }

    let max_gap = 1.0 / graph_steps as f64;
    let graph = graph.slice(s![..t1, .., ..]);
    let num_nodes = num_states * t1;

    // Node data
    let x = Array2::from_shape_vec((num_nodes, num_features), features.iter().copied().collect())?;
    let pos = Array1::from_shape_fn(num_nodes, |a| times[a % t1]);
    let y = Array1::from_elem(num_states, t1);

    // Edge data
    let edge_time_matrix = time_difference_matrix(pos.view());
    let mut edge_weight_matrix = masked_weight_matrix(graph);
    let mut exist = Array2::<f64>::zeros((num_nodes, num_nodes));
    Zip::from(&mut exist)
        .and(&edge_time_matrix)
        .and(&edge_weight_matrix)
        .for_each(|e, &dt, &w| {
            if dt <= 0.0 && dt.abs() <= max_gap + TIME_TOLERANCE && w != 0.0 {
                *e = 1.0;
            }
        });

    edge_weight_matrix *= &exist;
    let (edge_index, edge_weight) = dense_to_sparse(&edge_weight_matrix);
    if edge_weight.is_empty() {
        return Err(Error::EmptyGraph { num_nodes });
    }

    let padded_time = (&edge_time_matrix + TIME_OFFSET) * &exist;
    let (time_index, mut edge_time) = dense_to_sparse(&padded_time);
    if time_index != edge_index {
        return Err(Error::ShapeMismatch {
            context: "build_temporal_graph edge_time",
            expected: format!("{} edges", edge_index.ncols()),
            actual: format!("{} edges", time_index.ncols()),
        });
    }
    edge_time -= TIME_OFFSET;

    let num_edges = edge_index.len_of(Axis(1));
    Ok((
        TemporalGraph {
            x,
            pos,
            y,
            edge_index,
            edge_weight,
            edge_time,
        },
        num_edges,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array3};

    fn times(t1: usize, total: usize) -> Array1<f64> {
        Array1::from_shape_fn(t1, |i| i as f64 / total as f64)
    }

    #[test]
    fn test_node_layout() {
        let features = Array::from_shape_fn((2, 3, 2), |(n, t, d)| (100 * n + 10 * t + d) as f64);
        let graph = Array3::<f64>::ones((5, 2, 2));
        let axis = times(3, 5);
        let (sample, _) = build_temporal_graph(features.view(), graph.view(), axis.view()).unwrap();

        assert_eq!(sample.num_nodes(), 6);
        assert_eq!(sample.num_features(), 2);
        // node 4 = region 1, timestep 1
        assert_eq!(sample.x[[4, 0]], 110.0);
        assert_eq!(sample.x[[4, 1]], 111.0);
        assert!((sample.pos[4] - 0.2).abs() < 1e-12);
        assert_eq!(sample.y, Array1::from(vec![3usize, 3]));
    }

    #[test]
    fn test_edge_count_for_full_graph() {
        // per region: 2*T1-1 temporal edges; per ordered region pair: T1 same-step edges
        let (num_states, t1, total) = (3, 5, 7);
        let features = Array3::<f64>::ones((num_states, t1, 2));
        let graph = Array3::<f64>::ones((total, num_states, num_states));
        let axis = times(t1, total);
        let (sample, count) = build_temporal_graph(features.view(), graph.view(), axis.view()).unwrap();

        let expected = num_states * (2 * t1 - 1) + num_states * (num_states - 1) * t1;
        assert_eq!(count, expected);
        assert_eq!(sample.num_edges(), 57);
        assert_eq!(sample.edge_weight.len(), count);
        assert_eq!(sample.edge_time.len(), count);
    }

    #[test]
    fn test_edges_point_forward_within_one_step() {
        let features = Array3::<f64>::ones((3, 4, 1));
        let graph = Array::from_shape_fn((6, 3, 3), |(t, i, j)| (t + i + j + 1) as f64);
        let axis = times(4, 6);
        let (sample, _) = build_temporal_graph(features.view(), graph.view(), axis.view()).unwrap();
        let gap = 1.0 / 6.0;

        for e in 0..sample.num_edges() {
            let (a, b) = (sample.edge_index[[0, e]], sample.edge_index[[1, e]]);
            let dt = sample.pos[a] - sample.pos[b];
            assert!(dt <= 0.0);
            assert!(-dt <= gap + TIME_TOLERANCE);
            assert!((sample.edge_time[e] - dt).abs() < 1e-9);

            let (i, t) = (a / 4, a % 4);
            let (j, k) = (b / 4, b % 4);
            if i != j {
                assert_eq!(t, k, "cross-region edge across time");
            }
            assert_eq!(sample.edge_weight[e], graph[[t, i, j]]);
        }
    }

    #[test]
    fn test_self_block_survives_without_cross_edges() {
        // only self-loops: every region keeps its own temporal chain
        let (num_states, t1) = (2, 3);
        let features = Array3::<f64>::ones((num_states, t1, 1));
        let mut graph = Array3::<f64>::zeros((t1, num_states, num_states));
        for mut step in graph.outer_iter_mut() {
            step.diag_mut().fill(2.0);
        }
        let axis = times(t1, t1);
        let (sample, count) = build_temporal_graph(features.view(), graph.view(), axis.view()).unwrap();

        assert_eq!(count, num_states * (2 * t1 - 1));
        for e in 0..count {
            assert_eq!(sample.edge_index[[0, e]] / t1, sample.edge_index[[1, e]] / t1);
        }
        // region 0, step 0 -> step 1
        let has_forward = (0..count).any(|e| sample.edge_index[[0, e]] == 0 && sample.edge_index[[1, e]] == 1);
        assert!(has_forward);
    }

    #[test]
    fn test_only_conditioning_part_of_graph_is_used() {
        let features = Array3::<f64>::ones((2, 2, 1));
        let mut graph = Array3::<f64>::zeros((4, 2, 2));
        // weights beyond T1 must not create edges
        graph.slice_mut(s![2.., .., ..]).fill(1.0);
        let axis = times(2, 4);
        assert!(matches!(
            build_temporal_graph(features.view(), graph.view(), axis.view()),
            Err(Error::EmptyGraph { num_nodes: 4 })
        ));
    }

    #[test]
    fn test_zero_graph_is_rejected() {
        let features = Array3::<f64>::ones((3, 5, 2));
        let graph = Array3::<f64>::zeros((7, 3, 3));
        let axis = times(5, 7);
        assert!(matches!(
            build_temporal_graph(features.view(), graph.view(), axis.view()),
            Err(Error::EmptyGraph { num_nodes: 15 })
        ));
    }

    #[test]
    fn test_wider_gap_links_further_steps() {
        // graph of T1 steps on an axis of 2*T1: gap spans two axis steps
        let features = Array3::<f64>::ones((1, 3, 1));
        let graph = Array3::<f64>::ones((3, 1, 1));
        let axis = times(3, 6);
        let (_, count) = build_temporal_graph(features.view(), graph.view(), axis.view()).unwrap();
        // (0,0) (0,1) (0,2) (1,1) (1,2) (2,2)
        assert_eq!(count, 6);
    }

    #[test]
    fn test_dense_to_sparse_row_major() {
        let dense = Array2::from_shape_vec((2, 3), vec![0.0, 1.5, 0.0, 2.0, 0.0, -1.0]).unwrap();
        let (index, values) = dense_to_sparse(&dense);
        assert_eq!(index, Array2::from_shape_vec((2, 3), vec![0usize, 1, 1, 1, 0, 2]).unwrap());
        assert_eq!(values, Array1::from(vec![1.5, 2.0, -1.0]));
    }

    #[test]
    fn test_shape_checks() {
        let features = Array3::<f64>::ones((2, 3, 1));
        let short_graph = Array3::<f64>::ones((2, 2, 2));
        let axis = times(3, 5);
        assert!(matches!(
            build_temporal_graph(features.view(), short_graph.view(), axis.view()),
            Err(Error::ShapeMismatch { .. })
        ));

        let graph = Array3::<f64>::ones((5, 2, 2));
        let bad_axis = times(2, 5);
        assert!(matches!(
            build_temporal_graph(features.view(), graph.view(), bad_axis.view()),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
