//! Chunked, concurrent backfill of EIA v2 time series into polars frames.
//!
//! The API caps rows per request, so a long range is probed for its series
//! count, split into request-sized chunks, fetched on a bounded worker pool
//! and stitched back into one frame sorted by `period`.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod facets;
pub mod fetcher;
pub mod loader;
pub mod period;
pub mod planner;
pub mod prober;
pub mod stitcher;
pub mod storage;

pub use client::EiaClient;
pub use config::{ClientConfig, RetryPolicy};
pub use endpoint::{Endpoint, PageControls};
pub use error::{EiaError, Result};
pub use facets::{FacetSet, FacetValue};
pub use loader::{ApiPage, HttpTransport, RawRowSet, Row, Transport};
pub use period::{Bound, Frequency, TimeRange};
pub use planner::Chunk;
