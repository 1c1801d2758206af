//! severecli
//!
//! Library for computing severe weather indexes, CAPE and the supercell composite parameter, from
//! a single sounding and exporting them as JSON. Parcel and wind analysis is done with
//! [sounding-analysis](https://github.com/rnleach/sounding-analysis).
//!

//
// Public API
//
pub use crate::{
    error::{Result, SevereError},
    indexes::supercell_composite,
    metrics::{compute_metrics, MetricRecord},
    output::{export, write_records, DEFAULT_OUTPUT},
    profile::{ConvectiveProfile, ProfileMetrics},
    sample::{Location, SoundingSample},
};

//
// Private implementation.
//
mod error;
mod indexes;
mod metrics;
mod output;
mod profile;
mod sample;
