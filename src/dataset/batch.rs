//! Collation of samples into model-ready batches.

use ndarray::{concatenate, stack, Array1, Array2, Array3, Array4, ArrayView2, ArrayView3, Axis};

use crate::dataset::graph::TemporalGraph;
use crate::error::{Error, Result};

/// Several temporal graphs merged into one disconnected graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBatch {
    pub x: Array2<f64>,
    pub pos: Array1<f64>,
    pub y: Array1<usize>,
    /// Edge endpoints, shifted by each graph's node offset
    pub edge_index: Array2<usize>,
    pub edge_weight: Array1<f64>,
    pub edge_time: Array1<f64>,
    /// Graph id of every node
    pub batch: Array1<usize>,
    /// Node offset of every graph plus the total, `[num_graphs + 1]`
    pub ptr: Vec<usize>,
}

impl GraphBatch {
    pub fn from_graphs(graphs: &[TemporalGraph]) -> Result<Self> {
        if graphs.is_empty() {
            return Err(Error::ShapeMismatch {
                context: "GraphBatch",
                expected: "at least one graph".into(),
                actual: "0 graphs".into(),
            });
        }

        let mut ptr = Vec::with_capacity(graphs.len() + 1);
        ptr.push(0);
        for graph in graphs {
            let last = ptr.last().copied().unwrap_or(0);
            ptr.push(last + graph.num_nodes());
        }

        let shifted: Vec<Array2<usize>> = graphs
            .iter()
            .zip(&ptr)
            .map(|(graph, &offset)| &graph.edge_index + offset)
            .collect();
        let batch: Vec<usize> = graphs
            .iter()
            .enumerate()
            .flat_map(|(id, graph)| std::iter::repeat(id).take(graph.num_nodes()))
            .collect();

        Ok(Self {
            x: concatenate(Axis(0), &graphs.iter().map(|g| g.x.view()).collect::<Vec<_>>())?,
            pos: concatenate(Axis(0), &graphs.iter().map(|g| g.pos.view()).collect::<Vec<_>>())?,
            y: concatenate(Axis(0), &graphs.iter().map(|g| g.y.view()).collect::<Vec<_>>())?,
            edge_index: concatenate(Axis(1), &shifted.iter().map(|e| e.view()).collect::<Vec<_>>())?,
            edge_weight: concatenate(Axis(0), &graphs.iter().map(|g| g.edge_weight.view()).collect::<Vec<_>>())?,
            edge_time: concatenate(Axis(0), &graphs.iter().map(|g| g.edge_time.view()).collect::<Vec<_>>())?,
            batch: Array1::from(batch),
            ptr,
        })
    }

    pub fn num_graphs(&self) -> usize {
        self.ptr.len().saturating_sub(1)
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.ncols()
    }
}

/// Decoder target of one region: normalized values and ground truth `[T2, Dout]`
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderSample {
    pub data: Array2<f64>,
    pub data_gt: Array2<f64>,
}

/// Decoder targets of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderBatch {
    /// Conditioning-derived values `[M, T2, Dout]`
    pub data: Array3<f64>,
    /// Prediction time axis `[T2]`, starting at 0
    pub time_steps: Array1<f64>,
    /// Un-differenced ground truth `[M, T2, Dout]`
    pub data_gt: Array3<f64>,
    /// Output timestep indices of a variable-length test sample
    pub masks: Option<Array1<usize>>,
}

impl DecoderBatch {
    /// Stack per-region samples of equal length
    pub fn collate(samples: &[DecoderSample], time_steps: &Array1<f64>) -> Result<Self> {
        let data: Vec<ArrayView2<f64>> = samples.iter().map(|s| s.data.view()).collect();
        let data_gt: Vec<ArrayView2<f64>> = samples.iter().map(|s| s.data_gt.view()).collect();
        Ok(Self {
            data: stack(Axis(0), &data)?,
            time_steps: time_steps.clone(),
            data_gt: stack(Axis(0), &data_gt)?,
            masks: None,
        })
    }

    /// Single variable-length test sample `[N, T2, Dout]`
    pub fn test_sample(
        data: Array3<f64>,
        data_gt: Array3<f64>,
        masks: Array1<usize>,
        time_steps: &Array1<f64>,
    ) -> Self {
        Self {
            data,
            time_steps: time_steps.clone(),
            data_gt,
            masks: Some(masks),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stack `[T2, N, N]` graph slices into `[B, T2, N, N]`
pub fn stack_graphs(graphs: &[ArrayView3<f64>]) -> Result<Array4<f64>> {
    Ok(stack(Axis(0), graphs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_graph(num_nodes: usize, edges: &[(usize, usize)]) -> TemporalGraph {
        let flat: Vec<usize> = edges.iter().map(|e| e.0).chain(edges.iter().map(|e| e.1)).collect();
        TemporalGraph {
            x: Array2::from_elem((num_nodes, 2), num_nodes as f64),
            pos: Array1::zeros(num_nodes),
            y: Array1::from_elem(1, num_nodes),
            edge_index: Array2::from_shape_vec((2, edges.len()), flat).unwrap(),
            edge_weight: Array1::ones(edges.len()),
            edge_time: Array1::zeros(edges.len()),
        }
    }

    #[test]
    fn test_graph_batch_offsets_edges() {
        let first = tiny_graph(3, &[(0, 1), (1, 2)]);
        let second = tiny_graph(2, &[(0, 0), (0, 1), (1, 1)]);
        let batch = GraphBatch::from_graphs(&[first, second]).unwrap();

        assert_eq!(batch.num_graphs(), 2);
        assert_eq!(batch.num_nodes(), 5);
        assert_eq!(batch.num_edges(), 5);
        assert_eq!(batch.ptr, vec![0, 3, 5]);
        assert_eq!(batch.batch.to_vec(), vec![0, 0, 0, 1, 1]);
        assert_eq!(batch.edge_index.row(0).to_vec(), vec![0, 1, 3, 3, 4]);
        assert_eq!(batch.edge_index.row(1).to_vec(), vec![1, 2, 3, 4, 4]);
        assert_eq!(batch.y.to_vec(), vec![3, 2]);
        assert_eq!(batch.x[[4, 0]], 2.0);
    }

    #[test]
    fn test_empty_graph_batch() {
        assert!(GraphBatch::from_graphs(&[]).is_err());
    }

    #[test]
    fn test_decoder_collate() {
        let samples: Vec<DecoderSample> = (0..4)
            .map(|i| DecoderSample {
                data: Array2::from_elem((2, 1), i as f64),
                data_gt: Array2::from_elem((2, 1), 10.0 * i as f64),
            })
            .collect();
        let times = Array1::from(vec![0.0, 0.1]);
        let batch = DecoderBatch::collate(&samples, &times).unwrap();

        assert_eq!(batch.len(), 4);
        assert_eq!(batch.data.dim(), (4, 2, 1));
        assert_eq!(batch.data_gt[[3, 1, 0]], 30.0);
        assert_eq!(batch.time_steps, times);
        assert!(batch.masks.is_none());
    }

    #[test]
    fn test_stack_graphs() {
        let a = Array3::<f64>::zeros((2, 3, 3));
        let b = Array3::<f64>::ones((2, 3, 3));
        let stacked = stack_graphs(&[a.view(), b.view()]).unwrap();
        assert_eq!(stacked.dim(), (2, 2, 3, 3));
        assert_eq!(stacked[[1, 1, 2, 2]], 1.0);
    }
}
