use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Typed failures of the explorer core.
///
/// Filter and aggregation operations are total over valid inputs: matching
/// zero rows is an ordinary result, not an error. The variants here cover
/// the cases callers must branch on explicitly: an unreadable source, an
/// indicator with no data, or a selection the user has emptied out.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("failed to load dataset from '{}'", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("dataset at '{}' contains no rows", path.display())]
    EmptyDataset { path: PathBuf },

    #[error("dataset is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("failed to read catalog file '{}'", path.display())]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file '{}'", path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The indicator has zero non-null values in the inspected rows, so no
    /// value range (and no slider, color range, or ranking) can be derived.
    #[error("indicator column '{column}' has no non-null values")]
    EmptyRange { column: String },

    /// The user deselected every continent or category. Reported rather
    /// than silently falling back to an arbitrary selection.
    #[error("no {what} selected")]
    EmptySelection { what: &'static str },

    #[error("invalid value range: low {low} exceeds high {high}")]
    InvalidRange { low: f64, high: f64 },

    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("indicator '{indicator}' has no {expected} column in this dataset")]
    MissingIndicatorColumn {
        indicator: String,
        expected: &'static str,
    },

    #[error("unknown {kind} '{name}'")]
    UnknownEntity { kind: &'static str, name: String },

    #[error("failed to write export to '{}'", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
