//! # Motor:bit driver
//!
//! Motor and servo control for the Motor:bit board, which drives up to 4 DC motors and 8 servos
//! from a PCA9685 PWM controller on the I2C bus.
//!
//! The crate is split in two layers:
//! - [`Pca9685`] programs the chip: output frequency and per channel on/off ticks.
//! - [`MotorBit`] maps the board's motor and servo ports onto chip channels.
//!
//! The bus and delay are anything implementing the `embedded-hal` 0.2 blocking traits, so the
//! same code runs against a Raspberry Pi I2C bus or the [`sim`] bus.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Error types.
pub mod error;

/// Motor:bit port mapping and duty formulas.
pub mod motor_bit;

/// PCA9685 register level driver.
pub mod pca9685;

/// Angle to pulse width curves for servos.
pub mod servo_curve;

/// Simulated bus and delay.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use error::{Error, OutOfRange, Param};
pub use motor_bit::{port, MotorBit};
pub use pca9685::Pca9685;
pub use servo_curve::ServoCurve;
