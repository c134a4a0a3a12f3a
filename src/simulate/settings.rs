//! Tunable constants used throughout read simulation.

/// Number of committed changes between identity re-estimates.
pub const ALIGNMENT_INTERVAL: usize = 25;

/// Fragments longer than this are re-estimated over a random window of this
/// size rather than aligned in full.
pub const ALIGNMENT_SIZE: usize = 1000;

/// The smallest mean fragment length accepted on the command line.
pub const MIN_MEAN_READ_LENGTH: f64 = 100.0;

/// The smallest mean read identity (percent) accepted on the command line.
pub const MIN_MEAN_READ_IDENTITY: f64 = 50.0;

/// The smallest mean read qscore accepted on the command line.
pub const MIN_MEAN_READ_QSCORE: f64 = 1.0;

/// Bounds of the qscores drawn by the random qscore model.
pub const RANDOM_QSCORE_MIN: u8 = 1;

/// See [`RANDOM_QSCORE_MIN`].
pub const RANDOM_QSCORE_MAX: u8 = 20;

/// Attempts at building a reference fragment before giving up.
pub const MAX_FRAGMENT_ATTEMPTS: usize = 100;

/// Number of fragment lengths sampled when adjusting contig depths.
pub const DEPTH_ADJUSTMENT_SAMPLES: usize = 100_000;

/// Mutation stops after this many changes per padded base.
pub const MAX_CHANGE_FRACTION: f64 = 0.9;

/// Mutation stops after this many iterations per padded base.
pub const MAX_ITERATIONS_PER_BASE: usize = 100;

/// Chance of an end adapter at a chimeric junction.
pub const CHIMERA_END_ADAPTER_RATE: f64 = 0.25;

/// Chance of a start adapter at a chimeric junction.
pub const CHIMERA_START_ADAPTER_RATE: f64 = 0.25;

/// Reads between progress messages.
pub const LOG_EVERY_READS: usize = 10_000;
