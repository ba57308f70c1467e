//! Epigraph Data - spatiotemporal epidemic data pipeline
//!
//! Converts per-region epidemic time series and inter-region mobility
//! graphs into time-expanded graph samples for an encoder/decoder
//! forecasting model:
//!
//! - Feature augmentation and normalization
//! - Sliding window sampling with train/validation segments
//! - Temporal graph construction over (region, timestep) nodes
//! - Lockstep batch streams with endless epoch cycling
//! - Test-point driven evaluation samples
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use epigraph_data::{DatasetSetting, DirectorySource, GraphDataset, Segment};
//!
//! fn main() -> epigraph_data::Result<()> {
//!     let setting = DatasetSetting::default();
//!     let source = DirectorySource::new(setting.datapath.clone(), setting.dataset.clone());
//!     let mut dataset = GraphDataset::new(setting, source)?;
//!     let mut loaders = dataset.load_train_data(Segment::Train)?;
//!     let _batch = loaders.encoder.next();
//!     Ok(())
//! }
//! ```

pub mod dataset;
pub mod error;
pub mod logger;
pub mod setting;
pub mod utility;

pub use dataset::{
    DataLoader, DataSource, DatasetLoaders, DecoderBatch, DirectorySource, Feature, GraphBatch, GraphDataset,
    InfiniteLoader, MemorySource, NormMethod, Segment, TemporalGraph, TestPoint,
};
pub use error::{Error, Result};
pub use logger::{init_logger, Logger};
pub use setting::{DatasetSetting, LogSetting};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
