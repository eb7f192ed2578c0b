//! CLI command implementations.

pub mod common;
pub mod mosaics;
pub mod regions;
pub mod roads;
pub mod run;
