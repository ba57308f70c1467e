//! Utility functions and data structures for graph datasets

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Data segment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Train,
    Valid,
    Test,
}

/// Stored data file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn feature_file(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }

    pub fn graph_file(&self) -> &'static str {
        match self {
            Split::Train => "graph_train",
            Split::Test => "graph_test",
        }
    }
}

/// Parse a date in `YYYY-MM-DD`, `YYYYMMDD` or `MM-DD-YYYY` form
pub fn to_date(arg: &str) -> Result<NaiveDate> {
    let arg = arg.trim();
    ["%Y-%m-%d", "%Y%m%d", "%m-%d-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(arg, fmt).ok())
        .ok_or_else(|| Error::InvalidDate(arg.to_string()))
}

/// Signed day offset of `date` from the timeline origin `first_date`
pub fn date_to_index(date: &str, first_date: NaiveDate) -> Result<i64> {
    let date = to_date(date)?;
    Ok((date - first_date).num_days())
}
