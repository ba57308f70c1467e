//! Dataset module for spatiotemporal epidemic forecasting
//! Turns region features and mobility graphs into time-expanded graph batches

pub mod batch;
pub mod feature;
pub mod graph;
pub mod loader;
pub mod processor;
pub mod source;
pub mod template;
pub mod utility;
pub mod window;

pub use batch::{stack_graphs, DecoderBatch, DecoderSample, GraphBatch};
pub use feature::{add_mobility, add_population, preprocess_features, Feature, FeatureContext, FeatureSelection};
pub use graph::{build_temporal_graph, TemporalGraph, TIME_TOLERANCE};
pub use loader::{DataLoader, InfiniteLoader};
pub use processor::{clamp_null, difference, normalize_feature, normalize_graph, NormMethod};
pub use source::{read_test_points, DataSource, DirectorySource, MemorySource, TestPoint};
pub use template::{align_test_point, DatasetLoaders, GraphDataset, TestWindow, TimeAxis};
pub use utility::{date_to_index, to_date, Segment, Split};
pub use window::{generate_windows, segment_range, window_count};
