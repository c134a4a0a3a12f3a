//! Errors raised while simulating reads, along with the process exit codes
//! that the command line layer translates them into.

use std::io;

use thiserror::Error;
use tracing::error;

//===================//
// Simulation Errors //
//===================//

/// All of the ways a simulation can fail.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A user-provided value (or combination of values) cannot be used.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A model file or preset is missing or malformed.
    #[error("invalid model resource: {0}")]
    Resource(String),

    /// The fragment assembler could not produce a fragment.
    #[error(
        "failed to generate any sequence fragments after {attempts} attempts - are your \
        read lengths incompatible with your reference contig lengths?"
    )]
    RetryExhausted {
        /// How many attempts were made before giving up.
        attempts: usize,
    },

    /// An underlying I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SimulationError {
    /// Shorthand for building a [`SimulationError::Configuration`].
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        SimulationError::Configuration(message.into())
    }

    /// Shorthand for building a [`SimulationError::Resource`].
    pub fn resource<S: Into<String>>(message: S) -> Self {
        SimulationError::Resource(message.into())
    }

    /// The exit code that the command line tool reports for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SimulationError::Configuration(_) => ExitCode::InvalidConfiguration,
            SimulationError::Resource(_) => ExitCode::InvalidResource,
            SimulationError::RetryExhausted { .. } => ExitCode::RetriesExhausted,
            SimulationError::Io(_) => ExitCode::Failure,
        }
    }
}

//============//
// Exit Codes //
//============//

/// Process exit codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitCode {
    /// Any failure that does not have a more specific code.
    Failure = 1,

    /// Indicates that invalid arguments were supplied to the given subcommand.
    InvalidConfiguration = 2,

    /// Indicates that a model file or preset could not be loaded.
    InvalidResource = 3,

    /// Indicates that fragment construction gave up after its retries.
    RetriesExhausted = 4,
}

impl From<&anyhow::Error> for ExitCode {
    fn from(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<SimulationError>())
            .map(SimulationError::exit_code)
            .unwrap_or(ExitCode::Failure)
    }
}

/// Logs the message as an error and exits the process with the given code.
pub fn exit<I>(message: I, code: ExitCode) -> !
where
    I: tracing::Value,
{
    error!(message);
    std::process::exit(code as i32);
}
