//! # Servo pulse curves
//!
//! Analog hobby servos are positioned by the width of a pulse repeated every 20 ms. A
//! [`ServoCurve`] maps an angle in `[0, 180]` degrees linearly onto a pulse width, which is then
//! expressed as an off tick within the 4096 count PWM period.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::pca9685::MAX_TICK;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Servo PWM period, 50 Hz.
pub const SERVO_PERIOD_MS: f64 = 20.0;

/// Lowest accepted servo angle.
pub const MIN_DEGREE: f64 = 0.0;

/// Highest accepted servo angle.
pub const MAX_DEGREE: f64 = 180.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Linear mapping between servo angle and pulse width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoCurve {
    /// Pulse width at 0 degrees.
    ///
    /// Units: milliseconds
    pub min_pulse_ms: f64,

    /// Pulse width at 180 degrees.
    ///
    /// Units: milliseconds
    pub max_pulse_ms: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ServoCurve {
    /// 0.5 ms at 0 degrees to 2.5 ms at 180 degrees.
    pub const STANDARD: ServoCurve = ServoCurve {
        min_pulse_ms: 0.5,
        max_pulse_ms: 2.5,
    };

    /// 0.9 ms at 0 degrees to 2.2 ms at 180 degrees, the travel of the "geek" servos.
    pub const GEEK: ServoCurve = ServoCurve {
        min_pulse_ms: 0.9,
        max_pulse_ms: 2.2,
    };

    /// Pulse width for the given angle. The angle is not range checked.
    pub fn pulse_ms(&self, degree: f64) -> f64 {
        self.min_pulse_ms + (degree / MAX_DEGREE) * (self.max_pulse_ms - self.min_pulse_ms)
    }

    /// Off tick for the given angle, truncated toward zero.
    pub fn duty(&self, degree: f64) -> u16 {
        (self.pulse_ms(degree) / SERVO_PERIOD_MS * MAX_TICK as f64) as u16
    }
}

impl Default for ServoCurve {
    fn default() -> Self {
        ServoCurve::STANDARD
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
