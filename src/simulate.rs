//! Functionality related to the `lrsim simulate` subcommand.

pub mod adapters;
pub mod command;
pub mod fragments;
pub mod glitches;
pub mod mutate;
pub mod read;
pub mod references;
pub mod settings;
pub mod summary;

pub use command::simulate;
pub use command::SimulateArgs;
