//! # PCA9685 channel driver
//!
//! Low level access to the 16 channel, 12 bit PCA9685 PWM controller. The driver owns the bus
//! address and hides the register layout: callers only ever set the output frequency or a
//! channel's on/off ticks.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Write, WriteRead},
};
use log::{debug, trace};

use crate::error::{Error, OutOfRange, Param};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default I2C address of the chip with all address pins low.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Number of PWM channels on the chip.
pub const NUM_CHANNELS: u8 = 16;

/// Highest on/off tick, the counter is 12 bits wide.
pub const MAX_TICK: u16 = 4095;

/// Frequency set on initialisation.
pub const DEFAULT_FREQUENCY_HZ: f64 = 50.0;

/// Internal oscillator frequency.
pub const OSC_CLOCK_HZ: f64 = 25_000_000.0;

/// Counts per PWM period.
const COUNTS_PER_PERIOD: f64 = 4096.0;

/// Smallest prescale value the chip accepts.
pub const MIN_PRESCALE: u8 = 3;

/// Largest prescale value the chip accepts.
pub const MAX_PRESCALE: u8 = 255;

/// Time the oscillator needs after leaving sleep.
const OSC_STABILISE_MS: u8 = 5;

/// Register addresses.
pub mod reg {
    pub const MODE1: u8 = 0x00;
    pub const MODE2: u8 = 0x01;
    pub const SUBADR1: u8 = 0x02;
    pub const SUBADR2: u8 = 0x03;
    pub const SUBADR3: u8 = 0x04;
    pub const LED0_ON_L: u8 = 0x06;
    pub const ALL_LED_ON_L: u8 = 0xFA;
    pub const PRESCALE: u8 = 0xFE;
}

/// MODE1 bits.
pub mod mode1 {
    pub const ALLCALL: u8 = 0x01;
    pub const SLEEP: u8 = 0x10;
    pub const AI: u8 = 0x20;
    pub const RESTART: u8 = 0x80;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Driver for a single PCA9685.
///
/// The chip has one prescaler shared by every channel, so the configured frequency lives here
/// rather than per channel.
pub struct Pca9685<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    frequency_hz: f64,
    prescale: u8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, D, E> Pca9685<I2C, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u8>,
{
    /// Initialise the chip at `address`.
    ///
    /// Wakes the chip, sets the frequency to 50 Hz and turns every channel off.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, Error<E>> {
        let mut pca = Self {
            i2c,
            delay,
            address,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            prescale: prescale_for(DEFAULT_FREQUENCY_HZ),
        };

        debug!("Initialising PCA9685 at {:#04x}", address);

        pca.write_reg(reg::MODE1, 0x00)?;
        pca.set_frequency(DEFAULT_FREQUENCY_HZ)?;

        for channel in 0..NUM_CHANNELS {
            pca.set_channel(channel, 0, 0)?;
        }

        Ok(pca)
    }

    /// Set the PWM frequency of all channels.
    ///
    /// The chip is put to sleep while the prescaler is written, then restarted once the
    /// oscillator has settled.
    pub fn set_frequency(&mut self, frequency_hz: f64) -> Result<(), Error<E>> {
        let prescale = check_frequency(frequency_hz)?;

        let mut old_mode = [0u8];
        self.i2c
            .write_read(self.address, &[reg::MODE1], &mut old_mode)
            .map_err(Error::I2c)?;
        let old_mode = old_mode[0];

        // Prescale is only latched while the oscillator is off
        self.write_reg(reg::MODE1, (old_mode & !mode1::RESTART) | mode1::SLEEP)?;
        self.write_reg(reg::PRESCALE, prescale)?;
        self.write_reg(reg::MODE1, old_mode)?;

        self.delay.delay_ms(OSC_STABILISE_MS);

        self.write_reg(
            reg::MODE1,
            old_mode | mode1::RESTART | mode1::AI | mode1::ALLCALL,
        )?;

        self.frequency_hz = frequency_hz;
        self.prescale = prescale;

        debug!(
            "PCA9685 {:#04x} frequency set to {} Hz (prescale {})",
            self.address, frequency_hz, prescale
        );

        Ok(())
    }

    /// Set the tick at which `channel` turns on and the tick at which it turns off.
    pub fn set_channel(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Error<E>> {
        OutOfRange::check(Param::Channel, channel, 0, NUM_CHANNELS - 1)?;
        check_ticks(on, off)?;

        trace!("PCA9685 ch{:02} on={} off={}", channel, on, off);

        self.write_block(reg::LED0_ON_L + 4 * channel, on, off)
    }

    /// Set the on and off ticks of every channel at once.
    pub fn set_all_channels(&mut self, on: u16, off: u16) -> Result<(), Error<E>> {
        check_ticks(on, off)?;

        trace!("PCA9685 all channels on={} off={}", on, off);

        self.write_block(reg::ALL_LED_ON_L, on, off)
    }

    fn write_block(&mut self, base: u8, on: u16, off: u16) -> Result<(), Error<E>> {
        let on = on.to_le_bytes();
        let off = off.to_le_bytes();

        self.i2c
            .write(self.address, &[base, on[0], on[1], off[0], off[1]])
            .map_err(Error::I2c)
    }

    fn write_reg(&mut self, register: u8, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::I2c)
    }
}

impl<I2C, D> Pca9685<I2C, D> {
    /// Frequency passed to the last successful [`Pca9685::set_frequency`].
    ///
    /// This is the configured value, the chip is not queried.
    pub fn last_configured_frequency(&self) -> f64 {
        self.frequency_hz
    }

    /// Prescale value written by the last frequency change.
    pub fn prescale(&self) -> u8 {
        self.prescale
    }

    /// I2C address of the chip.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Destroy the driver, returning the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the prescale for a frequency, rounding to the nearest integer.
///
/// The result is not range checked and saturates at the bounds of `u8`.
pub fn prescale_for(frequency_hz: f64) -> u8 {
    raw_prescale(frequency_hz) as u8
}

/// Frequency produced by a given prescale.
pub fn frequency_for(prescale: u8) -> f64 {
    OSC_CLOCK_HZ / COUNTS_PER_PERIOD / (prescale as f64 + 1.0)
}

/// Check that a frequency can be produced by the chip, returning its prescale.
pub fn check_frequency(frequency_hz: f64) -> Result<u8, OutOfRange> {
    let min = frequency_for(MAX_PRESCALE);
    let max = frequency_for(MIN_PRESCALE);

    // Compare on the rounded prescale so that every frequency which maps onto a valid register
    // value is accepted.
    let raw = raw_prescale(frequency_hz);
    if !raw.is_finite() || raw < MIN_PRESCALE as f64 || raw > MAX_PRESCALE as f64 {
        return Err(OutOfRange {
            param: Param::Frequency,
            value: frequency_hz,
            min,
            max,
        });
    }

    Ok(raw as u8)
}

fn raw_prescale(frequency_hz: f64) -> f64 {
    (OSC_CLOCK_HZ / COUNTS_PER_PERIOD / frequency_hz - 1.0 + 0.5).floor()
}

fn check_ticks(on: u16, off: u16) -> Result<(), OutOfRange> {
    OutOfRange::check(Param::OnTick, on, 0, MAX_TICK)?;
    OutOfRange::check(Param::OffTick, off, 0, MAX_TICK)?;
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
