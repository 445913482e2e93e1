//! # Demand script interpreter
//!
//! A demand script is a list of timed board demands, one per line:
//!
//! ```text
//! 0.0: {"Servo": {"port": 8, "degree": 90.0}};
//! 1.5: {"DcSpeed": {"port": 0, "speed": 2048}};
//! 4.0: "StopAll";
//! ```
//!
//! The timestamp is in seconds from the start of the run, the payload is a JSON [`Demand`]. Blank
//! lines and lines starting with `#` are ignored. Any other `<time>: <demand>;` line must carry a
//! finite, non-negative timestamp.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Write, WriteRead},
};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use thiserror::Error;

// Internal
use motorbit::{Error, MotorBit, ServoCurve};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A demand which is scripted to occur at a specific time.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The time the demand is supposed to execute at
    pub exec_time_s: f64,

    /// The demand to apply
    pub demand: Demand,
}

/// A script interpreter.
///
/// After loading a script use [`ScriptInterpreter::get_pending`] to acquire the demands which
/// are due.
pub struct ScriptInterpreter {
    cmds: VecDeque<Command>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A single demand on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Demand {
    DcSpeed { port: u8, speed: i32 },
    Servo { port: u8, degree: f64 },
    GeekServo { port: u8, degree: f64 },
    CurveServo { port: u8, degree: f64, curve: ServoCurve },
    StopAll,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0:?}. Should be a non-negative float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid demand at {0} s: {1}")]
    InvalidDemand(f64, serde_json::Error),
}

#[derive(Debug, PartialEq)]
pub enum PendingDemands {
    None,
    Some(Vec<Demand>),
    EndOfScript,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Load the script at the given path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let script = fs::read_to_string(script_path).map_err(ScriptError::ScriptLoadError)?;

        Self::parse(&script)
    }

    /// Parse a script from its text.
    pub fn parse(script: &str) -> Result<Self, ScriptError> {
        // Everything up to the first colon on the line is the timestamp
        let re = RegexBuilder::new(r"^[ \t]*([^:#\s][^:\n]*?)[ \t]*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .expect("Script regex is invalid");

        let mut cmds = Vec::new();

        for cap in re.captures_iter(script) {
            let exec_time_s = parse_timestamp(&cap[1])?;

            let demand = serde_json::from_str(&cap[2])
                .map_err(|e| ScriptError::InvalidDemand(exec_time_s, e))?;

            cmds.push(Command {
                exec_time_s,
                demand,
            });
        }

        if cmds.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        // Stable, so demands sharing a timestamp keep their script order
        cmds.sort_by(|a, b| a.exec_time_s.total_cmp(&b.exec_time_s));

        Ok(ScriptInterpreter { cmds: cmds.into() })
    }

    /// Return the demands due at `current_time_s`, or `None` if nothing needs executing yet.
    pub fn get_pending(&mut self, current_time_s: f64) -> PendingDemands {
        if self.cmds.is_empty() {
            return PendingDemands::EndOfScript;
        }

        let mut dems = vec![];

        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s > current_time_s {
                break;
            }
            if let Some(cmd) = self.cmds.pop_front() {
                dems.push(cmd.demand);
            }
        }

        if dems.is_empty() {
            PendingDemands::None
        } else {
            PendingDemands::Some(dems)
        }
    }

    /// Get the number of demands left in the script
    pub fn get_num_demands(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }
}

fn parse_timestamp(token: &str) -> Result<f64, ScriptError> {
    match token.parse::<f64>() {
        Ok(t) if t.is_finite() && t >= 0.0 => Ok(t),
        _ => Err(ScriptError::InvalidTimestamp(token.to_string())),
    }
}

impl Demand {
    /// Apply this demand to the board.
    pub fn apply<I2C, D, E>(&self, mb: &mut MotorBit<I2C, D>) -> Result<(), Error<E>>
    where
        I2C: Write<Error = E> + WriteRead<Error = E>,
        D: DelayMs<u8>,
    {
        match *self {
            Demand::DcSpeed { port, speed } => mb.dc_speed(port, speed),
            Demand::Servo { port, degree } => mb.servo_degree(port, degree),
            Demand::GeekServo { port, degree } => mb.geek_servo_degree(port, degree),
            Demand::CurveServo {
                port,
                degree,
                ref curve,
            } => mb.servo_degree_with_curve(port, degree, curve),
            Demand::StopAll => mb.stop_all(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
