use sounding_analysis::AnalysisError;
use std::{error::Error, fmt::Display};

/// Errors from building a sounding, analyzing it, or exporting the results.
#[derive(Debug)]
pub enum SevereError {
    /// The profile sequences were not all the same length.
    MismatchedLengths {
        profile: &'static str,
        expected: usize,
        found: usize,
    },
    /// The sample had the right shape, but the values can't describe a sounding.
    InvalidSample(&'static str),
    /// The sounding analysis library failed.
    Analysis(AnalysisError),
    /// Reading a sample or writing the output failed.
    Io(std::io::Error),
    /// JSON (de)serialization failed.
    Json(serde_json::Error),
}

/// Shorthand for results in this crate.
pub type Result<T> = std::result::Result<T, SevereError>;

impl Display for SevereError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        use SevereError::*;

        match self {
            MismatchedLengths {
                profile,
                expected,
                found,
            } => write!(
                f,
                "{} profile has {} levels, expected {}",
                profile, found, expected
            ),
            InvalidSample(msg) => write!(f, "invalid sample: {}", msg),
            Analysis(_) => write!(f, "sounding analysis failed"),
            Io(_) => write!(f, "i/o error"),
            Json(_) => write!(f, "json error"),
        }
    }
}

impl Error for SevereError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use SevereError::*;

        match self {
            Analysis(err) => Some(err),
            Io(err) => Some(err),
            Json(err) => Some(err),
            MismatchedLengths { .. } | InvalidSample(_) => None,
        }
    }
}

impl From<AnalysisError> for SevereError {
    fn from(err: AnalysisError) -> Self {
        SevereError::Analysis(err)
    }
}

impl From<std::io::Error> for SevereError {
    fn from(err: std::io::Error) -> Self {
        SevereError::Io(err)
    }
}

impl From<serde_json::Error> for SevereError {
    fn from(err: serde_json::Error) -> Self {
        SevereError::Json(err)
    }
}
