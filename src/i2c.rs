// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polled driver for the I2C master controller, aimed at short register
//! transfers to a single slave.
//!
//! The controller moves one byte per command. Software loads `MDR`, writes a
//! command to `MCS` (some combination of START, RUN, STOP and ACK), and waits
//! for `MCS.BUSY` to drop before checking the same register for errors. A
//! multi-byte write is therefore a START+RUN, any number of bare RUNs, and a
//! RUN+STOP; a one-byte write collapses all three into one command. Reads
//! work the same way, with ACK set on every byte but the last.
//!
//! We implement this once, as `embedded_hal::i2c::I2c::transaction`, and get
//! the usual send/receive shapes as special cases. For the shapes the
//! expander uses:
//!
//! ```text
//! write [reg, data]       0x03 (START|RUN)  0x05 (RUN|STOP)
//! write [byte]            0x07 (START|RUN|STOP)
//! write_read [reg] [1]    0x03 (START|RUN)  0x07 (START|RUN|STOP, no ACK)
//! ```

use defmt::Format;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation};
use static_assertions::{const_assert, const_assert_eq};

use crate::sysctl::SYSCLK_HZ;

/// Standard-mode SCL rate.
pub const STANDARD_MODE_HZ: u32 = 100_000;

/// Command encodings written to `MCS`, named after the transfer step they
/// perform.
pub mod command {
    pub const RUN: u32 = 1 << 0;
    pub const START: u32 = 1 << 1;
    pub const STOP: u32 = 1 << 2;
    pub const ACK: u32 = 1 << 3;

    pub const SINGLE_SEND: u32 = START | RUN | STOP;
    pub const SINGLE_RECEIVE: u32 = START | RUN | STOP;
    pub const BURST_SEND_START: u32 = START | RUN;
    pub const BURST_SEND_CONT: u32 = RUN;
    pub const BURST_SEND_FINISH: u32 = STOP | RUN;
    pub const BURST_RECEIVE_START: u32 = ACK | START | RUN;
    pub const BURST_RECEIVE_CONT: u32 = ACK | RUN;
    pub const BURST_RECEIVE_FINISH: u32 = STOP | RUN;
    pub const BURST_ERROR_STOP: u32 = STOP;
}

// MCS status bits, as read.
const MCS_BUSY: u32 = 1 << 0;
const MCS_ERROR: u32 = 1 << 1;
const MCS_ADRACK: u32 = 1 << 2;
const MCS_DATACK: u32 = 1 << 3;
const MCS_ARBLST: u32 = 1 << 4;
const MCS_CLKTO: u32 = 1 << 7;

/// MCR: master function enable.
const MCR_MFE: u32 = 1 << 4;

/// SCL low and high periods, in timer ticks, fixed by the hardware for
/// standard and fast mode.
const SCL_LP: u32 = 6;
const SCL_HP: u32 = 4;

/// Polls of `MCS.BUSY` before a step is declared stuck. One byte at 100 kbps
/// is 90 us, or about 7200 cycles at 80 MHz; this is generous enough to ride
/// out a slave stretching the clock for a while.
const BUSY_POLL_LIMIT: u32 = 100_000;

/// Polls spent waiting for `MCS.BUSY` to rise after a command is written.
/// The controller takes a few cycles to reflect a new command, and reading
/// the status too early shows the previous, idle state.
const BUSY_RISE_POLLS: u32 = 64;

/// Computes the `MTPR` value for an SCL rate of `scl_hz`, rounding the
/// divisor up so we never exceed the requested rate.
pub const fn timer_period(sysclk_hz: u32, scl_hz: u32) -> u32 {
    let ticks_per_scl = 2 * (SCL_LP + SCL_HP) * scl_hz;
    (sysclk_hz + ticks_per_scl - 1) / ticks_per_scl - 1
}

// MTPR.TPR is seven bits.
const_assert!(timer_period(SYSCLK_HZ, STANDARD_MODE_HZ) <= 0x7F);
const_assert!(timer_period(SYSCLK_HZ, STANDARD_MODE_HZ) == 39);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Format)]
pub enum Error {
    /// Nobody answered to the address.
    AddressNack,
    /// The slave refused a data byte.
    DataNack,
    /// Another master won the bus.
    ArbitrationLost,
    /// Controller reported an error we don't have a better name for, or a
    /// clock timeout.
    Bus,
    /// `MCS.BUSY` never dropped.
    Timeout,
    /// An operation with no bytes in it. The controller can't express those.
    EmptyTransfer,
}

impl Error {
    fn from_status(status: u32) -> Self {
        if status & MCS_ARBLST != 0 {
            Error::ArbitrationLost
        } else if status & MCS_ADRACK != 0 {
            Error::AddressNack
        } else if status & MCS_DATACK != 0 {
            Error::DataNack
        } else {
            Error::Bus
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::AddressNack => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            Error::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::Bus => ErrorKind::Bus,
            Error::Timeout | Error::EmptyTransfer => ErrorKind::Other,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Direction {
    Write,
    Read,
}

pub struct I2cMaster {
    i2c: tm4c123x::I2C0,
}

impl I2cMaster {
    /// Enables the master function at `STANDARD_MODE_HZ`.
    ///
    /// The peripheral must already be clocked and its pins muxed; see
    /// `sysctl::enable_i2c0` and `gpio::configure_i2c0_pins`.
    pub fn new(i2c: tm4c123x::I2C0, sysclk_hz: u32) -> Self {
        i2c.mcr.write(|w| unsafe { w.bits(MCR_MFE) });
        i2c.mtpr.write(|w| unsafe {
            w.bits(timer_period(sysclk_hz, STANDARD_MODE_HZ))
        });
        Self { i2c }
    }

    /// Hands back the peripheral, e.g. to reset and reinitialize it.
    pub fn free(self) -> tm4c123x::I2C0 {
        self.i2c
    }

    /// Waits for any transfer in progress to finish.
    pub fn wait_idle(&mut self) -> Result<(), Error> {
        self.wait_not_busy()
    }

    /// Sends `bytes` to the slave at `address` in one transfer.
    pub fn send(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
        embedded_hal::i2c::I2c::write(self, address, bytes)
    }

    /// Reads one byte from register `register` of the slave at `address`,
    /// using a repeated start between the register write and the read.
    pub fn receive(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        let mut value = [0];
        embedded_hal::i2c::I2c::write_read(self, address, &[register], &mut value)?;
        Ok(value[0])
    }

    fn set_address(&mut self, address: u8, direction: Direction) {
        let rs = match direction {
            Direction::Write => 0,
            Direction::Read => 1,
        };
        self.i2c
            .msa
            .write(|w| unsafe { w.bits(u32::from(address & 0x7F) << 1 | rs) });
    }

    fn wait_not_busy(&mut self) -> Result<(), Error> {
        for _ in 0..BUSY_POLL_LIMIT {
            if self.i2c.mcs.read().bits() & MCS_BUSY == 0 {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    /// Issues one command and waits for it to complete.
    fn step(&mut self, cmd: u32) -> Result<(), Error> {
        self.i2c.mcs.write(|w| unsafe { w.bits(cmd) });

        for _ in 0..BUSY_RISE_POLLS {
            if self.i2c.mcs.read().bits() & MCS_BUSY != 0 {
                break;
            }
        }
        self.wait_not_busy()?;

        let status = self.i2c.mcs.read().bits();
        if status & (MCS_ERROR | MCS_CLKTO) == 0 {
            return Ok(());
        }

        let error = Error::from_status(status);
        defmt::debug!(
            "i2c: command {=u32:#x} failed, status {=u32:#x}: {}",
            cmd,
            status,
            error
        );

        // Losing arbitration means the controller has already dropped off the
        // bus. Otherwise, unless that command carried a STOP, we still own
        // the bus and have to let go of it explicitly.
        if status & MCS_ARBLST == 0 && cmd & command::STOP == 0 {
            self.i2c
                .mcs
                .write(|w| unsafe { w.bits(command::BURST_ERROR_STOP) });
            // The original error is the interesting one.
            let _ = self.wait_not_busy();
        }
        Err(error)
    }

    fn write_bytes(
        &mut self,
        bytes: &[u8],
        start: bool,
        stop: bool,
    ) -> Result<(), Error> {
        let len = bytes.len();
        for (i, &byte) in bytes.iter().enumerate() {
            self.i2c.mdr.write(|w| unsafe { w.bits(u32::from(byte)) });
            self.step(write_command(i, len, start, stop))?;
        }
        Ok(())
    }

    fn read_bytes(
        &mut self,
        buffer: &mut [u8],
        start: bool,
        nack_last: bool,
        stop: bool,
    ) -> Result<(), Error> {
        let len = buffer.len();
        for (i, byte) in buffer.iter_mut().enumerate() {
            self.step(read_command(i, len, start, nack_last, stop))?;
            *byte = self.i2c.mdr.read().bits() as u8;
        }
        Ok(())
    }
}

/// Command for byte `index` of a `len`-byte write. `start` puts a START on
/// the first byte and `stop` a STOP on the last.
pub const fn write_command(index: usize, len: usize, start: bool, stop: bool) -> u32 {
    let mut cmd = command::RUN;
    if index == 0 && start {
        cmd |= command::START;
    }
    if index + 1 == len && stop {
        cmd |= command::STOP;
    }
    cmd
}

/// Command for byte `index` of a `len`-byte read. Every byte is ACKed except
/// the last one when `nack_last` is set.
pub const fn read_command(
    index: usize,
    len: usize,
    start: bool,
    nack_last: bool,
    stop: bool,
) -> u32 {
    let last = index + 1 == len;
    let mut cmd = command::RUN;
    if index == 0 && start {
        cmd |= command::START;
    }
    if !(last && nack_last) {
        cmd |= command::ACK;
    }
    if last && stop {
        cmd |= command::STOP;
    }
    cmd
}

// The sequences `send` and `receive` have to produce.
const_assert_eq!(write_command(0, 1, true, true), command::SINGLE_SEND);
const_assert_eq!(write_command(0, 2, true, true), command::BURST_SEND_START);
const_assert_eq!(write_command(1, 2, true, true), command::BURST_SEND_FINISH);
const_assert_eq!(write_command(0, 3, true, true), command::BURST_SEND_START);
const_assert_eq!(write_command(1, 3, true, true), command::BURST_SEND_CONT);
const_assert_eq!(write_command(2, 3, true, true), command::BURST_SEND_FINISH);
// Register pointer write ahead of a repeated start: no STOP.
const_assert_eq!(write_command(0, 1, true, false), command::BURST_SEND_START);
const_assert_eq!(read_command(0, 1, true, true, true), command::SINGLE_RECEIVE);
const_assert_eq!(read_command(0, 3, true, true, true), command::BURST_RECEIVE_START);
const_assert_eq!(read_command(1, 3, true, true, true), command::BURST_RECEIVE_CONT);
const_assert_eq!(read_command(2, 3, true, true, true), command::BURST_RECEIVE_FINISH);

impl embedded_hal::i2c::ErrorType for I2cMaster {
    type Error = Error;
}

impl embedded_hal::i2c::I2c for I2cMaster {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let empty = operations.iter().any(|op| match op {
            Operation::Write(bytes) => bytes.is_empty(),
            Operation::Read(buffer) => buffer.is_empty(),
        });
        if empty {
            return Err(Error::EmptyTransfer);
        }

        // Adjacent operations in the same direction run together with no
        // START between them; a change of direction is a repeated START with
        // the address resent. Only the very last byte carries STOP.
        let count = operations.len();
        let mut previous = None;
        for i in 0..count {
            let last_op = i + 1 == count;
            let next_is_read =
                matches!(operations.get(i + 1), Some(Operation::Read(_)));

            match &mut operations[i] {
                Operation::Write(bytes) => {
                    let start = previous != Some(Direction::Write);
                    if start {
                        self.set_address(address, Direction::Write);
                    }
                    self.write_bytes(bytes, start, last_op)?;
                    previous = Some(Direction::Write);
                }
                Operation::Read(buffer) => {
                    let start = previous != Some(Direction::Read);
                    if start {
                        self.set_address(address, Direction::Read);
                    }
                    // The final byte of a read gets NACKed unless the next
                    // operation keeps reading.
                    self.read_bytes(buffer, start, !next_is_read, last_op)?;
                    previous = Some(Direction::Read);
                }
            }
        }
        Ok(())
    }
}
