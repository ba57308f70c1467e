//! Error types for dataset preparation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[cfg(feature = "table")]
    #[error("Table error: {0}")]
    Table(#[from] polars::prelude::PolarsError),

    #[error("Invalid setting: {0}")]
    Setting(String),

    #[error("Unknown feature name: {0}")]
    UnknownFeature(String),

    #[error("Feature {0} has no column in the feature dictionary")]
    MissingFeatureColumn(String),

    #[error("Feature index {index} out of range for {len} columns")]
    FeatureIndexOutOfRange { index: usize, len: usize },

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Window starting at {start} with length {length} exceeds timeline of {total} steps")]
    WindowOutOfBounds {
        start: usize,
        length: usize,
        total: usize,
    },

    #[error("Not enough windows: {available} generated, {required} required")]
    InsufficientWindows { available: usize, required: usize },

    #[error("Temporal graph has no edges ({num_nodes} nodes)")]
    EmptyGraph { num_nodes: usize },

    #[error("Batch count mismatch: encoder {encoder}, decoder {decoder}, decoder graph {decoder_graph}")]
    BatchCountMismatch {
        encoder: usize,
        decoder: usize,
        decoder_graph: usize,
    },

    #[error("Test point {row} spans [{start}, {end}] outside timeline of {total} steps")]
    TestPointOutOfRange {
        row: usize,
        start: i64,
        end: i64,
        total: usize,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Window {index}: {source}")]
    Window {
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the window (or test row) index that produced this error
    pub fn in_window(self, index: usize) -> Self {
        Error::Window {
            index,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
