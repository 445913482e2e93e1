//! # Simulated PCA9685
//!
//! An in-memory stand-in for the I2C bus with a PCA9685 attached. The register file is modelled
//! closely enough to catch sequencing mistakes: the prescaler only latches while the chip is
//! asleep, multi-byte writes only advance the register pointer when auto-increment is enabled,
//! and writes to the all-channel block land on every channel. Every transaction is recorded so it
//! can be inspected afterwards. A delay taken from [`SimBus::delay`] records into the same log, so
//! the order of writes and waits can be checked together.
//!
//! Used as the board when no real bus is available, and by the tests.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Write, WriteRead},
};
use log::{trace, warn};
use thiserror::Error;

use crate::pca9685::{mode1, reg, NUM_CHANNELS};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// MODE1 value after power on, asleep with all-call enabled.
const MODE1_RESET: u8 = 0x11;

/// PRESCALE value after power on, about 200 Hz.
const PRESCALE_RESET: u8 = 0x1E;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Transaction log shared between a bus and the delays created from it.
type Timeline = Rc<RefCell<Vec<Transaction>>>;

/// A simulated I2C bus with one PCA9685 on it.
#[derive(Debug)]
pub struct SimBus {
    address: u8,
    registers: [u8; 256],
    timeline: Timeline,
    fail_writes: bool,
}

/// A delay which only records what it was asked to wait for.
///
/// `SimDelay::default()` keeps its own record. One made by [`SimBus::delay`] also appends a
/// [`Transaction::Delay`] to the bus's log.
#[derive(Debug, Default)]
pub struct SimDelay {
    delays_ms: Vec<u8>,
    timeline: Option<Timeline>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A single transaction seen on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u8, bytes: Vec<u8> },
    WriteRead { address: u8, bytes: Vec<u8>, read_len: usize },
    Delay { ms: u8 },
}

/// Errors raised by the simulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimBusError {
    #[error("No device acknowledged address {0:#04x}")]
    NoDevice(u8),

    #[error("The device did not acknowledge the write")]
    Nack,

    #[error("Empty write")]
    Empty,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimBus {
    /// Create a bus with a freshly powered chip at `address`.
    pub fn new(address: u8) -> Self {
        let mut registers = [0u8; 256];
        registers[reg::MODE1 as usize] = MODE1_RESET;
        registers[reg::PRESCALE as usize] = PRESCALE_RESET;

        Self {
            address,
            registers,
            timeline: Rc::default(),
            fail_writes: false,
        }
    }

    /// A delay which logs its waits alongside this bus's transactions.
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            delays_ms: Vec::new(),
            timeline: Some(Rc::clone(&self.timeline)),
        }
    }

    /// All transactions seen so far, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.timeline.borrow().clone()
    }

    /// Forget the recorded transactions. Register contents are kept.
    pub fn clear_transactions(&mut self) {
        self.timeline.borrow_mut().clear();
    }

    /// Make every following write fail with [`SimBusError::Nack`].
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Current value of a register.
    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// `len` registers starting at `start`.
    pub fn registers(&self, start: u8, len: usize) -> Vec<u8> {
        let start = start as usize;
        self.registers[start..(start + len).min(256)].to_vec()
    }

    /// The (on, off) ticks currently held for a channel, or `None` if the chip has no such
    /// channel.
    pub fn channel(&self, channel: u8) -> Option<(u16, u16)> {
        if channel >= NUM_CHANNELS {
            return None;
        }

        let base = reg::LED0_ON_L as usize + 4 * channel as usize;
        let r = &self.registers[base..base + 4];
        Some((
            u16::from_le_bytes([r[0], r[1]]),
            u16::from_le_bytes([r[2], r[3]]),
        ))
    }

    fn record(&self, transaction: Transaction) {
        self.timeline.borrow_mut().push(transaction);
    }

    fn store(&mut self, register: u8, value: u8) {
        match register {
            reg::MODE1 => {
                // Writing the restart bit clears it
                self.registers[reg::MODE1 as usize] = value & !mode1::RESTART;
            }
            reg::PRESCALE => {
                if self.registers[reg::MODE1 as usize] & mode1::SLEEP == 0 {
                    warn!("SimBus: PRESCALE written while awake, ignored");
                } else {
                    self.registers[reg::PRESCALE as usize] = value;
                }
            }
            r if r >= reg::ALL_LED_ON_L && r < reg::ALL_LED_ON_L + 4 => {
                let offset = r - reg::ALL_LED_ON_L;
                for ch in 0..NUM_CHANNELS {
                    self.registers[(reg::LED0_ON_L + 4 * ch + offset) as usize] = value;
                }
            }
            r => self.registers[r as usize] = value,
        }
    }

    fn check_address(&self, address: u8) -> Result<(), SimBusError> {
        if address == self.address {
            Ok(())
        } else {
            Err(SimBusError::NoDevice(address))
        }
    }
}

impl Transaction {
    pub fn write(address: u8, bytes: &[u8]) -> Self {
        Transaction::Write {
            address,
            bytes: bytes.to_vec(),
        }
    }

    pub fn write_read(address: u8, bytes: &[u8], read_len: usize) -> Self {
        Transaction::WriteRead {
            address,
            bytes: bytes.to_vec(),
            read_len,
        }
    }
}

impl SimDelay {
    /// Every delay requested so far, in milliseconds.
    pub fn delays_ms(&self) -> &[u8] {
        &self.delays_ms
    }
}

impl Write for SimBus {
    type Error = SimBusError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check_address(address)?;
        if self.fail_writes {
            return Err(SimBusError::Nack);
        }

        let (&pointer, data) = bytes.split_first().ok_or(SimBusError::Empty)?;

        self.record(Transaction::write(address, bytes));
        trace!("SimBus {:#04x} <- [{:#04x}] {:02x?}", address, pointer, data);

        let mut register = pointer;
        for &value in data {
            self.store(register, value);
            if self.registers[reg::MODE1 as usize] & mode1::AI != 0 {
                register = register.wrapping_add(1);
            }
        }

        Ok(())
    }
}

impl WriteRead for SimBus {
    type Error = SimBusError;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.check_address(address)?;

        let &pointer = bytes.first().ok_or(SimBusError::Empty)?;

        self.record(Transaction::write_read(address, bytes, buffer.len()));

        let mut register = pointer;
        for b in buffer.iter_mut() {
            *b = self.registers[register as usize];
            if self.registers[reg::MODE1 as usize] & mode1::AI != 0 {
                register = register.wrapping_add(1);
            }
        }

        Ok(())
    }
}

impl DelayMs<u8> for SimDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.delays_ms.push(ms);
        if let Some(timeline) = &self.timeline {
            timeline.borrow_mut().push(Transaction::Delay { ms });
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescale_ignored_while_awake() {
        let mut bus = SimBus::new(0x40);

        bus.write(0x40, &[reg::MODE1, 0x00]).unwrap();
        bus.write(0x40, &[reg::PRESCALE, 121]).unwrap();
        assert_eq!(bus.register(reg::PRESCALE), PRESCALE_RESET);

        bus.write(0x40, &[reg::MODE1, mode1::SLEEP]).unwrap();
        bus.write(0x40, &[reg::PRESCALE, 121]).unwrap();
        assert_eq!(bus.register(reg::PRESCALE), 121);
    }

    #[test]
    fn test_auto_increment() {
        let mut bus = SimBus::new(0x40);

        // Without auto-increment every byte lands on the same register
        bus.write(0x40, &[reg::LED0_ON_L, 1, 2, 3, 4]).unwrap();
        assert_eq!(bus.registers(reg::LED0_ON_L, 4), vec![4, 0, 0, 0]);

        bus.write(0x40, &[reg::MODE1, mode1::AI]).unwrap();
        bus.write(0x40, &[reg::LED0_ON_L, 1, 2, 3, 4]).unwrap();
        assert_eq!(bus.registers(reg::LED0_ON_L, 4), vec![1, 2, 3, 4]);

        let mut buf = [0u8; 4];
        bus.write_read(0x40, &[reg::LED0_ON_L], &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_restart_bit_self_clears() {
        let mut bus = SimBus::new(0x40);

        bus.write(0x40, &[reg::MODE1, 0xA1]).unwrap();
        assert_eq!(bus.register(reg::MODE1), 0x21);
    }

    #[test]
    fn test_unknown_address() {
        let mut bus = SimBus::new(0x40);

        assert_eq!(bus.write(0x41, &[0, 0]), Err(SimBusError::NoDevice(0x41)));
        assert!(bus.transactions().is_empty());
    }

    #[test]
    fn test_channel_bounds() {
        let mut bus = SimBus::new(0x40);
        bus.write(0x40, &[reg::MODE1, mode1::AI]).unwrap();
        bus.write(0x40, &[reg::LED0_ON_L + 60, 0x00, 0x00, 0xFF, 0x0F]).unwrap();

        assert_eq!(bus.channel(15), Some((0, 4095)));
        assert_eq!(bus.channel(NUM_CHANNELS), None);
        assert_eq!(bus.channel(63), None);
        assert_eq!(bus.channel(u8::MAX), None);
    }

    #[test]
    fn test_delay_shares_timeline() {
        let mut bus = SimBus::new(0x40);
        let mut delay = bus.delay();
        let mut detached = SimDelay::default();

        bus.write(0x40, &[reg::MODE1, 0x00]).unwrap();
        delay.delay_ms(5);
        detached.delay_ms(7);
        bus.write(0x40, &[reg::MODE1, 0x80]).unwrap();

        assert_eq!(
            bus.transactions(),
            vec![
                Transaction::write(0x40, &[reg::MODE1, 0x00]),
                Transaction::Delay { ms: 5 },
                Transaction::write(0x40, &[reg::MODE1, 0x80]),
            ]
        );
        assert_eq!(delay.delays_ms(), &[5]);
        assert_eq!(detached.delays_ms(), &[7]);
    }
}
