//! # Driver errors
//!
//! Every public entry point of the driver validates its arguments before touching the bus. A
//! validation failure is reported as an [`OutOfRange`] carrying the offending value and the bound
//! it broke, so callers can inspect it rather than parse a message. Bus errors are passed through
//! untouched inside [`Error::I2c`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An argument was outside of its valid (inclusive) range.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("{value} is out of range for {param} ({min} - {max})")]
pub struct OutOfRange {
    /// The argument which was rejected
    pub param: Param,

    /// The value that was given
    pub value: f64,

    /// Lowest accepted value
    pub min: f64,

    /// Highest accepted value
    pub max: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Names of the arguments which are range checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Channel,
    OnTick,
    OffTick,
    Port,
    Speed,
    Degree,
    Frequency,
}

/// Errors which can occur while driving the board.
///
/// `E` is the error type of the underlying I2C bus.
#[derive(Error, Debug)]
pub enum Error<E> {
    #[error("{0}")]
    OutOfRange(OutOfRange),

    #[error("I2C bus error: {0:?}")]
    I2c(E),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutOfRange {
    /// Check that `value` lies within `[min, max]`.
    ///
    /// NaN is never in range.
    pub fn check<T>(param: Param, value: T, min: T, max: T) -> Result<T, Self>
    where
        T: PartialOrd + Into<f64> + Copy,
    {
        if value >= min && value <= max {
            Ok(value)
        } else {
            Err(OutOfRange {
                param,
                value: value.into(),
                min: min.into(),
                max: max.into(),
            })
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Param::Channel => "channel",
            Param::OnTick => "on",
            Param::OffTick => "off",
            Param::Port => "port",
            Param::Speed => "speed",
            Param::Degree => "degree",
            Param::Frequency => "frequency",
        };
        f.write_str(name)
    }
}

impl<E> Error<E> {
    /// Return the range violation if this error is one.
    pub fn out_of_range(&self) -> Option<&OutOfRange> {
        match self {
            Error::OutOfRange(o) => Some(o),
            Error::I2c(_) => None,
        }
    }
}

impl<E> From<OutOfRange> for Error<E> {
    fn from(e: OutOfRange) -> Self {
        Error::OutOfRange(e)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
