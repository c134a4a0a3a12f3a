//! `lrsim` is a command line tool that simulates long sequencing reads from a
//! reference. Reads carry realistic errors, quality scores and artifacts
//! (chimeras, adapters, glitches, junk and random reads), which makes them
//! useful for testing long-read tools. This package is composed of both a
//! library crate, as well as a binary crate.
//!
//! This documentation generally refers to the library crate documentation for
//! use by developers of `lrsim`. The `simulate` subcommand is driven by
//! [`simulate::command`].
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]

pub mod errors;
pub mod models;
pub mod simulate;
pub mod utils;
