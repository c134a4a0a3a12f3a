//! Utilities related to the parsing of arguments.

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::errors::SimulationError;

//==================//
// Range Validation //
//==================//

/// Ensures that the argument `name` falls within the given (inclusive) range.
pub fn arg_in_range<T>(name: &str, arg: T, range: RangeInclusive<T>) -> Result<T, SimulationError>
where
    T: PartialOrd + Display,
{
    match range.contains(&arg) {
        true => Ok(arg),
        false => Err(SimulationError::configuration(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            arg
        ))),
    }
}

/// Splits a comma-separated list of floating point numbers, expecting one of
/// the given counts.
fn comma_separated_floats(s: &str, counts: &[usize]) -> Result<Vec<f64>, String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("could not parse `{}` as a number", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !counts.contains(&values.len()) {
        let expected = counts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        return Err(format!(
            "expected {} comma-separated values, found {}",
            expected,
            values.len()
        ));
    }

    if values.iter().any(|v| !v.is_finite()) {
        return Err(String::from("values must be finite numbers"));
    }

    Ok(values)
}

//=============//
// Mean, Stdev //
//=============//

/// A mean and standard deviation pair, written `mean,stdev`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanStdev {
    /// The mean.
    pub mean: f64,

    /// The standard deviation.
    pub stdev: f64,
}

impl FromStr for MeanStdev {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = comma_separated_floats(s, &[2])?;
        if values[0] < 0.0 || values[1] < 0.0 {
            return Err(String::from("mean and stdev cannot be negative"));
        }

        Ok(MeanStdev {
            mean: values[0],
            stdev: values[1],
        })
    }
}

//=====================//
// Identity Parameters //
//=====================//

/// How per-read identities are distributed, as given on the command line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IdentityParams {
    /// A beta distribution, written `mean,max,stdev` (all percentages).
    Beta {
        /// Mean identity (percent).
        mean: f64,
        /// Maximum identity (percent).
        max: f64,
        /// Standard deviation of the identity (percent).
        stdev: f64,
    },

    /// A normal distribution over qscores, written `mean,stdev` (qscore units).
    NormalQscore {
        /// Mean qscore.
        mean: f64,
        /// Standard deviation of the qscore.
        stdev: f64,
    },
}

impl FromStr for IdentityParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = comma_separated_floats(s, &[2, 3])?;
        if values.iter().any(|v| *v < 0.0) {
            return Err(String::from("identity parameters cannot be negative"));
        }

        match values.as_slice() {
            [mean, stdev] => Ok(IdentityParams::NormalQscore {
                mean: *mean,
                stdev: *stdev,
            }),
            [mean, max, stdev] => Ok(IdentityParams::Beta {
                mean: *mean,
                max: *max,
                stdev: *stdev,
            }),
            _ => unreachable!(),
        }
    }
}

//=====================//
// Rate and Amount (%) //
//=====================//

/// Adapter parameters, written `rate,amount` as percentages and stored as
/// fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateAmount {
    /// Fraction of reads with the adapter.
    pub rate: f64,

    /// Mean fraction of the adapter present when it is there.
    pub amount: f64,
}

impl FromStr for RateAmount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = comma_separated_floats(s, &[2])?;
        if values.iter().any(|v| !(0.0..=100.0).contains(v)) {
            return Err(String::from(
                "adapter parameters must be two comma-separated values between 0 and 100",
            ));
        }

        Ok(RateAmount {
            rate: values[0] / 100.0,
            amount: values[1] / 100.0,
        })
    }
}

//===================//
// Glitch Parameters //
//===================//

/// Glitch parameters, written `rate,size,skip`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlitchParams {
    /// Mean distance between glitches.
    pub rate: f64,

    /// Mean length of random sequence added at a glitch.
    pub size: f64,

    /// Mean length of sequence lost at a glitch.
    pub skip: f64,
}

impl FromStr for GlitchParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = comma_separated_floats(s, &[3])?;
        if values.iter().any(|v| *v < 0.0) {
            return Err(String::from("glitch parameters cannot be negative"));
        }

        Ok(GlitchParams {
            rate: values[0],
            size: values[1],
            skip: values[2],
        })
    }
}

//==================//
// Adapter Sequence //
//==================//

/// An adapter given either as its sequence or as the length of a random
/// adapter to generate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterSequence {
    /// An explicit adapter sequence.
    Sequence(Vec<u8>),

    /// A random adapter of this length, generated once per run.
    Random(usize),
}

impl FromStr for AdapterSequence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(length) = s.parse::<usize>() {
            return Ok(AdapterSequence::Random(length));
        }

        let sequence = s.to_ascii_uppercase().into_bytes();
        if let Some(c) = sequence.iter().find(|c| !b"ACGT".contains(c)) {
            return Err(format!(
                "adapter sequences may only contain A, C, G or T, found `{}`",
                *c as char
            ));
        }

        Ok(AdapterSequence::Sequence(sequence))
    }
}

//==========//
// Quantity //
//==========//

/// How much sequence to generate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Quantity {
    /// An absolute number of bases.
    Bases(u64),

    /// A depth relative to the total reference length.
    Depth(f64),
}

impl Quantity {
    /// Converts the quantity into a number of bases.
    pub fn to_bases(&self, total_reference_length: usize) -> u64 {
        match self {
            Quantity::Bases(bases) => *bases,
            Quantity::Depth(depth) => (depth * total_reference_length as f64).round() as u64,
        }
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || {
            format!(
                "could not parse quantity `{}`: must be either an absolute value (e.g. \
                250M) or a relative depth (e.g. 25x)",
                s
            )
        };

        let s = s.trim().to_ascii_lowercase();
        if let Ok(bases) = s.parse::<u64>() {
            return Ok(Quantity::Bases(bases));
        }

        let suffix = s.chars().last().ok_or_else(error)?;
        let value = s[..s.len() - suffix.len_utf8()]
            .parse::<f64>()
            .map_err(|_| error())?;
        if !value.is_finite() || value < 0.0 {
            return Err(error());
        }

        let multiplier = match suffix {
            'x' => return Ok(Quantity::Depth(value)),
            'g' => 1e9,
            'm' => 1e6,
            'k' => 1e3,
            _ => return Err(error()),
        };

        Ok(Quantity::Bases((value * multiplier).round() as u64))
    }
}
