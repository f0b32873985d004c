//! # tracelens-types
//!
//! Shared types, errors, and data structures for the tracelens diagnostic
//! traceroute tool.
//!
//! This crate provides the foundational types used across all tracelens
//! components, ensuring consistent data representation and serialization.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

mod enrichment;
mod hop;
mod ip_class;
mod report;

pub use enrichment::{AsnInfo, EnrichedHop, GeoInfo};
pub use error::{Error, Result};
pub use hop::{ProbeOutcome, RawHop};
pub use ip_class::IpClass;
pub use report::{Diagnosis, LatencyJump, Protocol, TraceReport};
