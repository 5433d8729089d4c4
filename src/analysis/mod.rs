//! Analysis modules.
//!
//! Statistics computed from recorded votes.

pub mod aggregator;

pub use aggregator::*;
