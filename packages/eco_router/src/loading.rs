//! This module focuses on turning map data supplied by an external provider
//! into a petgraph graph object, and on memoising the expensive lookups which
//! feed it.

pub mod cache;
pub mod petgraph;
pub mod providers;
pub mod structs;
