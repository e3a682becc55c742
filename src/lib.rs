//! Compare a redshift pipeline's output against a reference catalog.
//!
//! Rows are aligned by object id, the normalized error `dz / (1 + z)` is
//! computed per object, failures above a threshold are listed for
//! reprocessing, and cumulative success-rate statistics are exported.

pub mod align;
pub mod color;
pub mod config;
pub mod data;
pub mod diff;
pub mod error;
pub mod export;
pub mod failures;
pub mod pipeline;
pub mod stats;
