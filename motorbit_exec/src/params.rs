//! # Motor:bit Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{Level, LevelFilter};
use motorbit::{pca9685, OutOfRange};
use serde::Deserialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
pub struct ExecParams {

    /// Number of the I2C bus the board is connected to (`/dev/i2c-N`)
    pub i2c_bus: u8,

    /// 7-bit I2C address of the board's PCA9685
    pub address: u8,

    /// PWM frequency to run the board at. Servo angles are only correct at 50 Hz.
    pub frequency_hz: f64,

    /// Use the simulated bus instead of real hardware
    #[serde(default)]
    pub simulate: bool,

    /// Log level for everything but the driver, at least `info`
    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,

    /// Log level for the driver's register traffic
    #[serde(default = "default_log_level")]
    pub driver_log_level: LevelFilter,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("{0:#04x} is not a 7-bit I2C address")]
    InvalidAddress(u8),

    #[error("Invalid PWM frequency: {0}")]
    InvalidFrequency(OutOfRange),

    #[error("log_level must be info, debug or trace, found {0}")]
    InvalidLogLevel(LevelFilter),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecParams {

    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.address > 0x7F {
            return Err(ParamsError::InvalidAddress(self.address))
        }

        if self.log_level < Level::Info {
            return Err(ParamsError::InvalidLogLevel(self.log_level))
        }

        match pca9685::check_frequency(self.frequency_hz) {
            Ok(_) => Ok(()),
            Err(e) => Err(ParamsError::InvalidFrequency(e))
        }
    }

    /// Per-target log levels to hand to the logger.
    ///
    /// Both driver modules live under `motorbit`, so one entry caps the channel driver and the
    /// simulated bus alike.
    pub fn log_targets(&self) -> [(&'static str, LevelFilter); 1] {
        [("motorbit", self.driver_log_level)]
    }
}

fn default_log_level() -> LevelFilter {
    LevelFilter::Info
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn params(address: u8, frequency_hz: f64) -> ExecParams {
        ExecParams {
            i2c_bus: 1,
            address,
            frequency_hz,
            simulate: true,
            log_level: LevelFilter::Info,
            driver_log_level: LevelFilter::Info
        }
    }

    #[test]
    fn test_are_valid() {
        assert!(params(0x40, 50.0).are_valid().is_ok());

        assert!(matches!(
            params(0x80, 50.0).are_valid(),
            Err(ParamsError::InvalidAddress(0x80))
        ));
        assert!(matches!(
            params(0x40, 5000.0).are_valid(),
            Err(ParamsError::InvalidFrequency(_))
        ));

        let mut p = params(0x40, 50.0);
        p.log_level = LevelFilter::Warn;
        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::InvalidLogLevel(LevelFilter::Warn))
        ));

        // The driver may be silenced entirely
        let mut p = params(0x40, 50.0);
        p.driver_log_level = LevelFilter::Off;
        assert!(p.are_valid().is_ok());
    }

    #[test]
    fn test_log_levels() {
        let p: ExecParams = toml_params(
            "i2c_bus = 1\naddress = 64\nfrequency_hz = 50.0\n\
             log_level = \"debug\"\ndriver_log_level = \"trace\"\n"
        );
        assert_eq!(p.log_level, LevelFilter::Debug);
        assert_eq!(p.log_targets(), [("motorbit", LevelFilter::Trace)]);
    }

    #[test]
    fn test_simulate_defaults_off() {
        let p: ExecParams = toml_params("i2c_bus = 1\naddress = 64\nfrequency_hz = 50.0\n");
        assert!(!p.simulate);
        assert_eq!(p.log_level, LevelFilter::Info);
        assert_eq!(p.log_targets(), [("motorbit", LevelFilter::Info)]);
    }

    fn toml_params(s: &str) -> ExecParams {
        let mut path = std::env::temp_dir();
        path.push(format!("motorbit_exec_params_{}_{}.toml", std::process::id(), s.len()));
        std::fs::write(&path, s).unwrap();
        let p = util::params::load_from_path(&path).unwrap();
        std::fs::remove_file(path).ok();
        p
    }
}
