//! # Motor:bit board
//!
//! The Motor:bit wires its PCA9685 to four H-bridge motor outputs and eight servo headers. Each
//! DC motor port takes two chip channels (forward and reverse), each servo port takes one.
//!
//! | Port | Chip channels |
//! |---|---|
//! | `M1`..`M4` (0..3) | `2*port` forward, `2*port + 1` reverse |
//! | `S1`..`S8` (8..15) | `port` |

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Write, WriteRead},
};
use log::debug;

use crate::{
    error::{Error, OutOfRange, Param},
    pca9685::{Pca9685, DEFAULT_ADDRESS, MAX_TICK},
    servo_curve::{ServoCurve, MAX_DEGREE, MIN_DEGREE},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Fastest DC motor speed in either direction.
pub const MAX_SPEED: i32 = MAX_TICK as i32;

/// Port numbers printed on the board.
pub mod port {
    pub const M1: u8 = 0;
    pub const M2: u8 = 1;
    pub const M3: u8 = 2;
    pub const M4: u8 = 3;

    pub const S1: u8 = 8;
    pub const S2: u8 = 9;
    pub const S3: u8 = 10;
    pub const S4: u8 = 11;
    pub const S5: u8 = 12;
    pub const S6: u8 = 13;
    pub const S7: u8 = 14;
    pub const S8: u8 = 15;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Motor and servo control for the Motor:bit board.
pub struct MotorBit<I2C, D> {
    pca9685: Pca9685<I2C, D>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, D> MotorBit<I2C, D> {
    /// The underlying channel driver.
    pub fn pca9685(&self) -> &Pca9685<I2C, D> {
        &self.pca9685
    }

    /// Mutable access to the underlying channel driver, for example to change the frequency.
    ///
    /// The servo duty calculations assume 50 Hz.
    pub fn pca9685_mut(&mut self) -> &mut Pca9685<I2C, D> {
        &mut self.pca9685
    }

    /// Destroy the board, returning the channel driver.
    pub fn release(self) -> Pca9685<I2C, D> {
        self.pca9685
    }
}

impl<I2C, D, E> MotorBit<I2C, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u8>,
{
    /// Initialise a board at the default address.
    pub fn new(i2c: I2C, delay: D) -> Result<Self, Error<E>> {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    /// Initialise a board whose PCA9685 sits at `address`.
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Result<Self, Error<E>> {
        Ok(Self {
            pca9685: Pca9685::new(i2c, delay, address)?,
        })
    }

    /// Drive a DC motor.
    ///
    /// Positive speeds drive the forward channel, negative the reverse one. The other channel of
    /// the pair is always switched fully off.
    ///
    /// ## Arguments
    /// - `port` - One of `M1`..`M4`
    /// - `speed` - Duty in ticks, between -4095 and 4095
    pub fn dc_speed(&mut self, port: u8, speed: i32) -> Result<(), Error<E>> {
        OutOfRange::check(Param::Port, port, port::M1, port::M4)?;
        OutOfRange::check(Param::Speed, speed, -MAX_SPEED, MAX_SPEED)?;

        let forward = port << 1;
        let reverse = forward + 1;
        let duty = speed.unsigned_abs() as u16;

        debug!("M{} speed {}", port + 1, speed);

        if speed >= 0 {
            self.pca9685.set_channel(forward, 0, duty)?;
            self.pca9685.set_channel(reverse, 0, 0)
        } else {
            self.pca9685.set_channel(reverse, 0, duty)?;
            self.pca9685.set_channel(forward, 0, 0)
        }
    }

    /// Set a standard servo (0.5 ms to 2.5 ms) to an angle in degrees.
    pub fn servo_degree(&mut self, port: u8, degree: f64) -> Result<(), Error<E>> {
        self.servo_degree_with_curve(port, degree, &ServoCurve::STANDARD)
    }

    /// Set a geek servo (0.9 ms to 2.2 ms) to an angle in degrees.
    pub fn geek_servo_degree(&mut self, port: u8, degree: f64) -> Result<(), Error<E>> {
        self.servo_degree_with_curve(port, degree, &ServoCurve::GEEK)
    }

    /// Set a servo to an angle using the given pulse curve.
    ///
    /// ## Arguments
    /// - `port` - One of `S1`..`S8`
    /// - `degree` - Angle between 0 and 180
    pub fn servo_degree_with_curve(
        &mut self,
        port: u8,
        degree: f64,
        curve: &ServoCurve,
    ) -> Result<(), Error<E>> {
        OutOfRange::check(Param::Port, port, port::S1, port::S8)?;
        OutOfRange::check(Param::Degree, degree, MIN_DEGREE, MAX_DEGREE)?;

        let duty = curve.duty(degree);

        debug!("S{} at {} deg (off tick {})", port - port::S1 + 1, degree, duty);

        self.pca9685.set_channel(port, 0, duty)
    }

    /// Stop every DC motor. Servos keep their position.
    pub fn stop_all(&mut self) -> Result<(), Error<E>> {
        for port in port::M1..=port::M4 {
            self.dc_speed(port, 0)?;
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDelay, Transaction};

    type Board = MotorBit<SimBus, SimDelay>;

    fn board() -> Board {
        let mut mb = Board::new(SimBus::new(DEFAULT_ADDRESS), SimDelay::default()).unwrap();
        bus(&mut mb).clear_transactions();
        mb
    }

    fn bus(mb: &mut Board) -> &mut SimBus {
        mb.pca9685.bus_mut()
    }

    fn channel_write(channel: u8, on: u16, off: u16) -> Transaction {
        let on = on.to_le_bytes();
        let off = off.to_le_bytes();
        Transaction::write(
            DEFAULT_ADDRESS,
            &[0x06 + 4 * channel, on[0], on[1], off[0], off[1]],
        )
    }

    #[test]
    fn test_dc_speed_forward() {
        let mut mb = board();

        mb.dc_speed(port::M1, 4095).unwrap();

        assert_eq!(
            bus(&mut mb).transactions(),
            vec![channel_write(0, 0, 4095), channel_write(1, 0, 0)]
        );
    }

    #[test]
    fn test_dc_speed_reverse() {
        let mut mb = board();

        mb.dc_speed(port::M1, -4095).unwrap();

        assert_eq!(
            bus(&mut mb).transactions(),
            vec![channel_write(1, 0, 4095), channel_write(0, 0, 0)]
        );
        assert_eq!(bus(&mut mb).channel(0), Some((0, 0)));
        assert_eq!(bus(&mut mb).channel(1), Some((0, 4095)));
    }

    #[test]
    fn test_dc_speed_zero_stops_both_channels() {
        let mut mb = board();

        for port in port::M1..=port::M4 {
            mb.dc_speed(port, 1000).unwrap();
            mb.dc_speed(port, 0).unwrap();

            assert_eq!(bus(&mut mb).channel(2 * port), Some((0, 0)));
            assert_eq!(bus(&mut mb).channel(2 * port + 1), Some((0, 0)));
        }
    }

    #[test]
    fn test_dc_speed_port_mapping() {
        let mut mb = board();

        mb.dc_speed(port::M3, 1234).unwrap();
        mb.dc_speed(port::M4, -321).unwrap();

        assert_eq!(bus(&mut mb).channel(4), Some((0, 1234)));
        assert_eq!(bus(&mut mb).channel(5), Some((0, 0)));
        assert_eq!(bus(&mut mb).channel(6), Some((0, 0)));
        assert_eq!(bus(&mut mb).channel(7), Some((0, 321)));
    }

    #[test]
    fn test_dc_speed_rejects_bad_port() {
        let mut mb = board();

        for port in [4u8, 7, 8, 15, 255] {
            let e = mb.dc_speed(port, 100).unwrap_err();
            assert_eq!(
                e.out_of_range(),
                Some(&OutOfRange {
                    param: Param::Port,
                    value: port as f64,
                    min: 0.0,
                    max: 3.0
                })
            );
        }

        assert!(bus(&mut mb).transactions().is_empty());
    }

    #[test]
    fn test_dc_speed_rejects_bad_speed() {
        let mut mb = board();

        for speed in [-4096, 4096, i32::MIN, i32::MAX] {
            let e = mb.dc_speed(port::M2, speed).unwrap_err();
            assert_eq!(e.out_of_range().map(|o| o.param), Some(Param::Speed));
        }

        assert!(bus(&mut mb).transactions().is_empty());
    }

    #[test]
    fn test_servo_degree() {
        let mut mb = board();

        mb.servo_degree(port::S1, 0.0).unwrap();
        assert_eq!(bus(&mut mb).channel(8), Some((0, 102)));

        mb.servo_degree(port::S1, 90.0).unwrap();
        assert_eq!(bus(&mut mb).channel(8), Some((0, 307)));

        mb.servo_degree(port::S8, 180.0).unwrap();
        assert_eq!(bus(&mut mb).channel(15), Some((0, 511)));

        // Only the addressed channel is written
        assert_eq!(bus(&mut mb).transactions().len(), 3);
    }

    #[test]
    fn test_geek_servo_degree() {
        let mut mb = board();

        mb.geek_servo_degree(port::S1, 0.0).unwrap();
        assert_eq!(bus(&mut mb).channel(8), Some((0, 184)));

        mb.geek_servo_degree(port::S1, 180.0).unwrap();
        assert_eq!(bus(&mut mb).channel(8), Some((0, 450)));
    }

    #[test]
    fn test_servo_custom_curve() {
        let mut mb = board();
        let curve = ServoCurve {
            min_pulse_ms: 1.0,
            max_pulse_ms: 2.0,
        };

        mb.servo_degree_with_curve(port::S3, 90.0, &curve).unwrap();
        assert_eq!(bus(&mut mb).channel(10), Some((0, 307)));
    }

    #[test]
    fn test_servo_rejects_bad_input() {
        let mut mb = board();

        for port in [0u8, 3, 7, 16] {
            let e = mb.servo_degree(port, 90.0).unwrap_err();
            assert_eq!(e.out_of_range().map(|o| o.param), Some(Param::Port));
            let e = mb.geek_servo_degree(port, 90.0).unwrap_err();
            assert_eq!(e.out_of_range().map(|o| o.param), Some(Param::Port));
        }

        for degree in [-0.1, 180.1, f64::NAN, f64::INFINITY] {
            let e = mb.servo_degree(port::S2, degree).unwrap_err();
            assert_eq!(e.out_of_range().map(|o| o.param), Some(Param::Degree));
            let e = mb.geek_servo_degree(port::S2, degree).unwrap_err();
            assert_eq!(e.out_of_range().map(|o| o.param), Some(Param::Degree));
        }

        assert!(bus(&mut mb).transactions().is_empty());
    }

    #[test]
    fn test_stop_all_leaves_servos() {
        let mut mb = board();

        mb.dc_speed(port::M1, 500).unwrap();
        mb.dc_speed(port::M2, -500).unwrap();
        mb.servo_degree(port::S4, 45.0).unwrap();

        mb.stop_all().unwrap();

        for ch in 0..8 {
            assert_eq!(bus(&mut mb).channel(ch), Some((0, 0)));
        }
        assert_ne!(bus(&mut mb).channel(port::S4), Some((0, 0)));
    }

    #[test]
    fn test_custom_address() {
        let mb = Board::with_address(SimBus::new(0x41), SimDelay::default(), 0x41).unwrap();
        assert_eq!(mb.pca9685().address(), 0x41);
        assert_eq!(mb.pca9685().last_configured_frequency(), 50.0);
    }
}
