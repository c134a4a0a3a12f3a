//! Utilities that are used across the `lrsim` modules.

pub mod alignment;
pub mod args;
pub mod cigar;
pub mod display;
pub mod formats;
pub mod sequence;
