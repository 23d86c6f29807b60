//! Types which are shared across the loading and routing stages

pub mod config;
pub mod error;
pub mod graph_data;
pub mod vehicle;
