//! Dataset assembly for the encoder/decoder forecasting model.
//!
//! `GraphDataset` turns raw region features and mobility graphs into three
//! aligned batch streams: encoder graph batches, decoder targets and decoder
//! graphs. All three always hold the same number of batches; the training
//! loop advances them together.

use chrono::NaiveDate;
use ndarray::{concatenate, s, Array1, Array3, Array4, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::dataset::batch::{stack_graphs, DecoderBatch, DecoderSample, GraphBatch};
use crate::dataset::feature::{preprocess_features, FeatureContext, FeatureSelection};
use crate::dataset::graph::{build_temporal_graph, TemporalGraph};
use crate::dataset::loader::{DataLoader, InfiniteLoader};
use crate::dataset::processor::normalize_graph;
use crate::dataset::source::{DataSource, TestPoint};
use crate::dataset::utility::{date_to_index, Segment, Split};
use crate::dataset::window::{generate_windows, segment_range};
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::setting::DatasetSetting;

/// Normalized time axis of one dataset load
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    /// `i / total` for the conditioning steps `[T1]`
    pub observed: Array1<f64>,
    /// Prediction steps re-based to start at 0 `[total - T1]`
    pub extrap: Array1<f64>,
}

impl TimeAxis {
    pub fn new(total: usize, condition_length: usize) -> Result<Self> {
        if condition_length == 0 || condition_length >= total {
            return Err(Error::Setting(format!(
                "condition length {} must be in 1..{}",
                condition_length, total
            )));
        }
        let times = Array1::from_shape_fn(total, |i| i as f64 / total as f64);
        let observed = times.slice(s![..condition_length]).to_owned();
        let extrap = times.slice(s![condition_length..]).mapv(|t| t - times[condition_length]);
        Ok(Self { observed, extrap })
    }
}

/// Test point resolved to timeline indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestWindow {
    /// First conditioning step
    pub start_index: usize,
    /// Last predicted step, inclusive
    pub end_index: usize,
    pub pred_length: usize,
}

impl TestWindow {
    /// First predicted step
    pub fn pred_start(&self, condition_length: usize) -> usize {
        self.start_index + condition_length
    }
}

/// Align a test point so its conditioning window ends right before `Start_date`
pub fn align_test_point(
    row: usize,
    point: &TestPoint,
    condition_length: usize,
    first_date: NaiveDate,
    total: usize,
) -> Result<TestWindow> {
    let start = date_to_index(&point.start_date, first_date)? - condition_length as i64;
    let end = date_to_index(&point.end_date, first_date)?;
    let pred_length = end - start - condition_length as i64 + 1;

    if start < 0 || end >= total as i64 || pred_length < 1 {
        return Err(Error::TestPointOutOfRange {
            row,
            start,
            end,
            total,
        });
    }
    Ok(TestWindow {
        start_index: start as usize,
        end_index: end as usize,
        pred_length: pred_length as usize,
    })
}

/// The three lockstep streams of one dataset load
#[derive(Debug)]
pub struct DatasetLoaders {
    pub encoder: InfiniteLoader<DataLoader<GraphBatch>>,
    pub decoder: InfiniteLoader<DataLoader<DecoderBatch>>,
    pub decoder_graph: InfiniteLoader<DataLoader<Array4<f64>>>,
    pub num_batch: usize,
    pub num_states: usize,
}

impl DatasetLoaders {
    fn new(
        encoder: Vec<GraphBatch>,
        decoder: Vec<DecoderBatch>,
        decoder_graph: Vec<Array4<f64>>,
        num_states: usize,
    ) -> Result<Self> {
        if encoder.len() != decoder.len() || decoder.len() != decoder_graph.len() {
            return Err(Error::BatchCountMismatch {
                encoder: encoder.len(),
                decoder: decoder.len(),
                decoder_graph: decoder_graph.len(),
            });
        }
        let num_batch = decoder.len();
        Ok(Self {
            encoder: InfiniteLoader::new(DataLoader::new(encoder)),
            decoder: InfiniteLoader::new(DataLoader::new(decoder)),
            decoder_graph: InfiniteLoader::new(DataLoader::new(decoder_graph)),
            num_batch,
            num_states,
        })
    }
}

/// Graph dataset builder
pub struct GraphDataset<S: DataSource> {
    setting: DatasetSetting,
    source: S,
    selection: FeatureSelection,
    num_states: usize,
    num_features: usize,
    times_extrap: Array1<f64>,
    logger: Logger,
}

impl<S: DataSource> GraphDataset<S> {
    /// Validate the setting and resolve feature names against the source's dictionary
    pub fn new(setting: DatasetSetting, source: S) -> Result<Self> {
        setting.validate()?;
        let feature_dict = source.load_feature_dict()?;
        let selection = FeatureSelection::resolve(&setting.feature_names(), &feature_dict)?;

        let logger = Logger::new("GraphDataset");
        logger.info(&format!(
            "Selected features: {}",
            selection
                .features()
                .iter()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(",")
        ));

        Ok(Self {
            setting,
            source,
            selection,
            num_states: 0,
            num_features: 0,
            times_extrap: Array1::zeros(0),
            logger,
        })
    }

    pub fn setting(&self) -> &DatasetSetting {
        &self.setting
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Prediction time axis of the last load
    pub fn times_extrap(&self) -> &Array1<f64> {
        &self.times_extrap
    }

    /// Load the training or validation windows of the train split
    pub fn load_train_data(&mut self, segment: Segment) -> Result<DatasetLoaders> {
        let features = self.source.load_features(Split::Train)?;
        let graphs = self.source.load_graphs(Split::Train)?;
        let population = self.source.load_population()?;
        self.num_states = features.len_of(Axis(0));

        let ctx = self.feature_context(&population);
        let processed = preprocess_features(&features, &graphs, &ctx, true)?;
        let origin = preprocess_features(&features, &graphs, &ctx, false)?;
        self.num_features = processed.len_of(Axis(2));

        let graphs = normalize_graph(
            &graphs,
            self.setting.norm_method,
            self.setting.self_loop,
            &self.setting.feature_weights,
        )?;

        let stride = self.setting.split_interval;
        let length = self.setting.window_length();
        let (feature_windows, graph_windows) = generate_windows(&processed, &graphs, stride, length)?;
        let (origin_windows, _) = generate_windows(&origin, &graphs, stride, length)?;

        let num_windows = feature_windows.len_of(Axis(0));
        let range = segment_range(num_windows, self.setting.valid_windows, segment)?;
        self.logger.info(&format!(
            "Loaded {} regions x {} days x {} features; {} windows, using {:?} {:?}",
            self.num_states,
            processed.len_of(Axis(1)),
            self.num_features,
            num_windows,
            segment,
            range
        ));

        let mut order: Vec<usize> = range.collect();
        if self.setting.shuffle && segment == Segment::Train {
            let mut rng = StdRng::seed_from_u64(self.setting.random_seed);
            order.shuffle(&mut rng);
        }

        self.generate_train_val_loaders(&feature_windows, &graph_windows, &origin_windows, &order)
    }

    fn generate_train_val_loaders(
        &mut self,
        feature_windows: &Array4<f64>,
        graph_windows: &Array4<f64>,
        origin_windows: &Array4<f64>,
        order: &[usize],
    ) -> Result<DatasetLoaders> {
        let t1 = self.setting.condition_length;
        let out_index = self.setting.feature_out_index.clone();
        let batch_size = self.setting.batch_size;
        let num_states = self.num_states;

        let axis = TimeAxis::new(self.setting.window_length(), t1)?;
        self.times_extrap = axis.extrap.clone();

        // Encoder
        let graphs = self.transfer_data(order, |k| {
            let feature = feature_windows.index_axis(Axis(0), k);
            let graph = graph_windows.index_axis(Axis(0), k);
            build_temporal_graph(feature.slice(s![.., ..t1, ..]), graph, axis.observed.view())
        })?;
        let encoder = graphs
            .chunks(batch_size)
            .map(GraphBatch::from_graphs)
            .collect::<Result<Vec<_>>>()?;

        // Decoder targets, one per region of every window
        let samples: Vec<DecoderSample> = order
            .iter()
            .flat_map(|&k| (0..num_states).map(move |n| (k, n)))
            .map(|(k, n)| DecoderSample {
                data: feature_windows
                    .slice(s![k, n, t1.., ..])
                    .select(Axis(1), &out_index),
                data_gt: origin_windows
                    .slice(s![k, n, t1.., ..])
                    .select(Axis(1), &out_index),
            })
            .collect();
        let decoder = samples
            .chunks(batch_size * num_states)
            .map(|chunk| DecoderBatch::collate(chunk, &axis.extrap))
            .collect::<Result<Vec<_>>>()?;

        // Decoder graphs over the prediction horizon
        let decoder_graph = order
            .chunks(batch_size)
            .map(|chunk| {
                let views: Vec<_> = chunk
                    .iter()
                    .map(|&k| graph_windows.slice(s![k, t1.., .., ..]))
                    .collect();
                stack_graphs(&views)
            })
            .collect::<Result<Vec<_>>>()?;

        DatasetLoaders::new(encoder, decoder, decoder_graph, num_states)
    }

    /// Load variable-length evaluation samples from the test-point table.
    ///
    /// Train and test splits are concatenated into one timeline; every row
    /// with the requested prediction length yields one batch.
    pub fn load_test_data(&mut self, pred_length: usize, condition_length: usize) -> Result<DatasetLoaders> {
        self.logger.info(&format!("Predicting data at: {}", self.setting.dataset));

        let features = concatenate(
            Axis(1),
            &[
                self.source.load_features(Split::Train)?.view(),
                self.source.load_features(Split::Test)?.view(),
            ],
        )?;
        let graphs = concatenate(
            Axis(0),
            &[
                self.source.load_graphs(Split::Train)?.view(),
                self.source.load_graphs(Split::Test)?.view(),
            ],
        )?;
        let population = self.source.load_population()?;
        self.num_states = features.len_of(Axis(0));
        let total = features.len_of(Axis(1));

        let ctx = self.feature_context(&population);
        let processed = preprocess_features(&features, &graphs, &ctx, true)?;
        let origin = preprocess_features(&features, &graphs, &ctx, false)?;
        self.num_features = processed.len_of(Axis(2));

        let graphs = normalize_graph(
            &graphs,
            self.setting.norm_method,
            self.setting.self_loop,
            &self.setting.feature_weights,
        )?;

        let windows = self.loading_test_points(pred_length, condition_length, total)?;
        let max_pred = windows.iter().map(|w| w.pred_length).max().unwrap_or(0);
        let axis = TimeAxis::new(max_pred + condition_length, condition_length)?;
        self.times_extrap = axis.extrap.clone();

        // Encoder: aligned conditioning windows, one graph per batch
        let rows: Vec<usize> = (0..windows.len()).collect();
        let graphs_enc = self.transfer_data(&rows, |i| {
            let start = windows[i].start_index;
            build_temporal_graph(
                processed.slice(s![.., start..start + condition_length, ..]),
                graphs.slice(s![start..start + condition_length, .., ..]),
                axis.observed.view(),
            )
        })?;
        let encoder = graphs_enc
            .chunks(1)
            .map(GraphBatch::from_graphs)
            .collect::<Result<Vec<_>>>()?;

        // Decoder
        let out_index = &self.setting.feature_out_index;
        let mut decoder = Vec::with_capacity(windows.len());
        let mut decoder_graph = Vec::with_capacity(windows.len());
        for window in &windows {
            let test_start = window.pred_start(condition_length);
            let end = window.end_index;
            let data: Array3<f64> = processed
                .slice(s![.., test_start..=end, ..])
                .select(Axis(2), out_index);
            let data_gt: Array3<f64> = origin
                .slice(s![.., test_start..=end, ..])
                .select(Axis(2), out_index);
            let masks = Array1::from_iter(0..end - test_start + 1);
            decoder.push(DecoderBatch::test_sample(data, data_gt, masks, &axis.extrap));
            decoder_graph.push(
                graphs
                    .slice(s![test_start..=end, .., ..])
                    .insert_axis(Axis(0))
                    .to_owned(),
            );
        }

        DatasetLoaders::new(encoder, decoder, decoder_graph, self.num_states)
    }

    /// Test points with the requested prediction length, aligned to the timeline
    pub fn loading_test_points(
        &self,
        pred_length: usize,
        condition_length: usize,
        total: usize,
    ) -> Result<Vec<TestWindow>> {
        let windows = self
            .source
            .load_test_points()?
            .iter()
            .filter(|point| point.pred_length == pred_length)
            .enumerate()
            .map(|(row, point)| align_test_point(row, point, condition_length, self.setting.first_date, total))
            .collect::<Result<Vec<_>>>()?;

        if windows.is_empty() {
            return Err(Error::Setting(format!(
                "no test points with prediction length {}",
                pred_length
            )));
        }
        Ok(windows)
    }

    /// Build one temporal graph per index, in parallel, keeping index order
    fn transfer_data<F>(&self, indices: &[usize], build: F) -> Result<Vec<TemporalGraph>>
    where
        F: Fn(usize) -> Result<(TemporalGraph, usize)> + Sync,
    {
        let built = indices
            .par_iter()
            .map(|&i| build(i).map_err(|e| e.in_window(i)))
            .collect::<Result<Vec<_>>>()?;

        let (graphs, edge_counts): (Vec<TemporalGraph>, Vec<usize>) = built.into_iter().unzip();
        let mean_edges = edge_counts.iter().sum::<usize>() as f64 / edge_counts.len().max(1) as f64;
        self.logger.info(&format!(
            "average number of edges per graph is {:.4}",
            mean_edges
        ));
        Ok(graphs)
    }

    fn feature_context<'a>(&'a self, population: &'a Array1<f64>) -> FeatureContext<'a> {
        FeatureContext {
            selection: &self.selection,
            population,
            weights: &self.setting.feature_weights,
            method: self.setting.norm_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(pred_length: usize, start: &str, end: &str) -> TestPoint {
        TestPoint {
            pred_length,
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }

    #[test]
    fn test_time_axis() {
        let axis = TimeAxis::new(7, 5).unwrap();
        assert_eq!(axis.observed.len(), 5);
        assert_eq!(axis.extrap.len(), 2);
        assert_eq!(axis.extrap[0], 0.0);
        assert!((axis.observed[4] - 4.0 / 7.0).abs() < 1e-12);
        assert!((axis.extrap[1] - 1.0 / 7.0).abs() < 1e-12);
        assert!(TimeAxis::new(5, 5).is_err());
    }

    #[test]
    fn test_align_test_point() {
        let first = NaiveDate::from_ymd_opt(2020, 4, 12).unwrap();
        // Start_date is day 20, End_date day 26
        let window = align_test_point(0, &point(7, "2020-05-02", "2020-05-08"), 5, first, 40).unwrap();
        assert_eq!(window.start_index, 15);
        assert_eq!(window.pred_start(5), 20);
        assert_eq!(window.end_index, 26);
        assert_eq!(window.pred_length, 7);
    }

    #[test]
    fn test_align_test_point_out_of_range() {
        let first = NaiveDate::from_ymd_opt(2020, 4, 12).unwrap();
        let early = align_test_point(3, &point(7, "2020-04-14", "2020-04-20"), 5, first, 40);
        assert!(matches!(early, Err(Error::TestPointOutOfRange { row: 3, start: -3, .. })));

        let late = align_test_point(0, &point(7, "2020-05-02", "2020-06-30"), 5, first, 40);
        assert!(matches!(late, Err(Error::TestPointOutOfRange { .. })));
    }
}
