//! Fuel cost model and the dual shortest-path search built on top of it

pub mod cost;
pub mod dual;
pub mod structs;
pub mod tables;
