//! `pca9536`: a register-level driver for the NXP PCA9536 4-bit I2C GPIO
//! expander.
//!
//! The part exposes four one-byte registers selected by a command byte that
//! precedes the data on the wire, so every write is a `[register, data]` pair
//! and every read is a one-byte register write followed by a repeated start
//! and a one-byte read. Only the low nibble of each register is backed by
//! pins.
//!
//! The driver is generic over `embedded_hal::i2c::I2c` and carries no state
//! besides the bus and the slave address; the expander itself is the source
//! of truth.

#![no_std]

use embedded_hal::i2c::I2c;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use static_assertions::const_assert;

/// Fixed 7-bit slave address. The PCA9536 has no address pins.
pub const ADDRESS: u8 = 0x41;

/// Longest transfer the part understands, in bytes on the wire: address,
/// command, data.
pub const MAX_TRANSFER_LEN: usize = 3;

const_assert!(1 + core::mem::size_of::<Command>() <= MAX_TRANSFER_LEN);

/// A register write as it appears after the address byte.
pub type Command = [u8; 2];

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Pin levels as seen by the part. Read-only.
    Input = 0x00,
    /// Levels driven on pins configured as outputs.
    Output = 0x01,
    /// Per-pin inversion applied to `Input`.
    Polarity = 0x02,
    /// Pin direction: 1 is input (the power-on default), 0 is output.
    Config = 0x03,
}

/// Pin masks, one bit per expander pin.
pub mod pin {
    pub const IO0: u8 = 0x1;
    pub const IO1: u8 = 0x2;
    pub const IO2: u8 = 0x4;
    pub const IO3: u8 = 0x8;

    pub const ALL: u8 = IO0 | IO1 | IO2 | IO3;
}

/// The four port-select patterns driven onto the expander while scanning the
/// battery ports. IO2 and IO3 are common to all of them; IO0 and IO1 pick the
/// port.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    P1 = 1,
    P2 = 2,
    P3 = 3,
    P4 = 4,
}

impl Port {
    /// Scan order.
    pub const ALL: [Port; 4] = [Port::P1, Port::P2, Port::P3, Port::P4];

    pub const fn pattern(self) -> u8 {
        const BASE: u8 = pin::IO2 | pin::IO3;
        match self {
            Port::P1 => BASE,
            Port::P2 => BASE | pin::IO0,
            Port::P3 => BASE | pin::IO1,
            Port::P4 => BASE | pin::IO0 | pin::IO1,
        }
    }

    /// 1-based port number, as printed on the harness.
    pub const fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Port> {
        Port::from_u8(number)
    }

    /// The port that follows this one, wrapping from `P4` back to `P1`.
    pub fn next(self) -> Port {
        Port::from_number(self.number() % Port::ALL.len() as u8 + 1)
            .unwrap_or(Port::P1)
    }
}

const_assert!(Port::P1.pattern() & !pin::ALL == 0);
const_assert!(Port::P2.pattern() & !pin::ALL == 0);
const_assert!(Port::P3.pattern() & !pin::ALL == 0);
const_assert!(Port::P4.pattern() == pin::ALL);

/// Builds the on-wire form of a register write.
pub const fn command(register: Register, value: u8) -> Command {
    [register as u8, value]
}

pub struct Pca9536<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pca9536<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, ADDRESS)
    }

    /// Talks to a part at a non-standard address, e.g. behind an address
    /// translator.
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn write_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &command(register, value))
    }

    pub fn read_register(&mut self, register: Register) -> Result<u8, I2C::Error> {
        let mut value = [0];
        self.i2c
            .write_read(self.address, &[register as u8], &mut value)?;
        Ok(value[0])
    }

    /// Drives the pins in `outputs` and releases the rest to high-impedance
    /// inputs.
    pub fn set_direction(&mut self, outputs: u8) -> Result<(), I2C::Error> {
        self.write_register(Register::Config, !outputs & pin::ALL)
    }

    pub fn configure_all_outputs(&mut self) -> Result<(), I2C::Error> {
        self.set_direction(pin::ALL)
    }

    /// Returns the mask of pins currently configured as outputs.
    pub fn direction(&mut self) -> Result<u8, I2C::Error> {
        Ok(!self.read_register(Register::Config)? & pin::ALL)
    }

    /// Writes the output register verbatim. Bits above the pin mask are
    /// ignored by the part.
    pub fn set_outputs(&mut self, value: u8) -> Result<(), I2C::Error> {
        self.write_register(Register::Output, value)
    }

    pub fn outputs(&mut self) -> Result<u8, I2C::Error> {
        self.read_register(Register::Output)
    }

    pub fn inputs(&mut self) -> Result<u8, I2C::Error> {
        Ok(self.read_register(Register::Input)? & pin::ALL)
    }

    pub fn set_polarity(&mut self, inverted: u8) -> Result<(), I2C::Error> {
        self.write_register(Register::Polarity, inverted & pin::ALL)
    }

    pub fn select(&mut self, port: Port) -> Result<(), I2C::Error> {
        self.set_outputs(port.pattern())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_hal::i2c::{
        ErrorKind, ErrorType, NoAcknowledgeSource, Operation,
    };
    use std::vec;
    use std::vec::Vec;

    #[derive(Clone, Debug, Eq, PartialEq)]
    enum Op {
        Write(Vec<u8>),
        Read(usize),
    }

    /// Register-accurate stand-in for the part, including the upper nibble
    /// reading back as ones.
    struct Expander {
        address: u8,
        pointer: Register,
        output: u8,
        polarity: u8,
        config: u8,
        /// Levels applied to the pins from outside.
        external: u8,
        transactions: Vec<Vec<Op>>,
    }

    impl Expander {
        fn new() -> Self {
            Self {
                address: ADDRESS,
                pointer: Register::Input,
                output: 0xFF,
                polarity: 0x00,
                config: 0xFF,
                external: 0x00,
                transactions: Vec::new(),
            }
        }

        fn load(&self, register: Register) -> u8 {
            match register {
                Register::Input => {
                    let driven = self.output & !self.config;
                    let floating = self.external & self.config;
                    ((driven | floating) ^ self.polarity) & pin::ALL | 0xF0
                }
                Register::Output => self.output | 0xF0,
                Register::Polarity => self.polarity,
                Register::Config => self.config | 0xF0,
            }
        }

        fn store(&mut self, register: Register, value: u8) {
            match register {
                Register::Input => {}
                Register::Output => self.output = value,
                Register::Polarity => self.polarity = value,
                Register::Config => self.config = value,
            }
        }
    }

    impl ErrorType for Expander {
        type Error = ErrorKind;
    }

    impl I2c for Expander {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let mut record = Vec::new();
            for op in operations.iter() {
                record.push(match op {
                    Operation::Write(bytes) => Op::Write(bytes.to_vec()),
                    Operation::Read(buf) => Op::Read(buf.len()),
                });
            }
            self.transactions.push(record);

            if address != self.address {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        let (&register, data) =
                            bytes.split_first().ok_or(ErrorKind::Other)?;
                        self.pointer = Register::from_u8(register).ok_or(
                            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
                        )?;
                        for &value in data {
                            self.store(self.pointer, value);
                        }
                    }
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.load(self.pointer);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn command_framing() {
        assert_eq!(command(Register::Input, 0xAA), [0x00, 0xAA]);
        assert_eq!(command(Register::Output, 0xF0), [0x01, 0xF0]);
        assert_eq!(command(Register::Polarity, 0x00), [0x02, 0x00]);
        assert_eq!(command(Register::Config, 0x00), [0x03, 0x00]);
    }

    #[test]
    fn all_outputs_writes_zero_to_config() {
        let mut part = Expander::new();
        let mut pca = Pca9536::new(&mut part);

        pca.configure_all_outputs().unwrap();
        assert_eq!(pca.direction().unwrap(), pin::ALL);

        assert_eq!(
            part.transactions,
            [
                vec![Op::Write(vec![0x03, 0x00])],
                vec![Op::Write(vec![0x03]), Op::Read(1)],
            ]
        );
    }

    #[test]
    fn partial_direction() {
        let mut part = Expander::new();
        let mut pca = Pca9536::new(&mut part);

        pca.set_direction(pin::IO0 | pin::IO3).unwrap();
        assert_eq!(pca.direction().unwrap(), pin::IO0 | pin::IO3);
        assert_eq!(part.config, pin::IO1 | pin::IO2);
    }

    #[test]
    fn port_patterns() {
        assert_eq!(Port::P1.pattern(), 0b1100);
        assert_eq!(Port::P2.pattern(), 0b1101);
        assert_eq!(Port::P3.pattern(), 0b1110);
        assert_eq!(Port::P4.pattern(), 0b1111);

        let numbers: Vec<u8> = Port::ALL.iter().map(|p| p.number()).collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
    }

    #[test]
    fn scan_wraps_after_four_ports() {
        let mut port = Port::P1;
        let mut seen = Vec::new();
        for _ in 0..9 {
            seen.push(port.number());
            port = port.next();
        }
        assert_eq!(seen, [1, 2, 3, 4, 1, 2, 3, 4, 1]);
    }

    #[test]
    fn port_numbers_out_of_range() {
        assert_eq!(Port::from_number(0), None);
        assert_eq!(Port::from_number(5), None);
        assert_eq!(Port::from_number(3), Some(Port::P3));
    }

    #[test]
    fn select_drives_pattern() {
        let mut part = Expander::new();
        let mut pca = Pca9536::new(&mut part);
        pca.configure_all_outputs().unwrap();

        for port in Port::ALL {
            pca.select(port).unwrap();
            assert_eq!(pca.outputs().unwrap() & pin::ALL, port.pattern());
            assert_eq!(pca.inputs().unwrap(), port.pattern());
        }
    }

    #[test]
    fn test_pattern_pair() {
        let mut part = Expander::new();
        let mut pca = Pca9536::new(&mut part);
        pca.configure_all_outputs().unwrap();

        pca.set_outputs(0b1111_0000).unwrap();
        assert_eq!(pca.inputs().unwrap(), 0b0000);
        pca.set_outputs(0b1111_1111).unwrap();
        assert_eq!(pca.inputs().unwrap(), 0b1111);
    }

    #[test]
    fn inputs_are_masked() {
        let mut part = Expander::new();
        part.external = 0b1010_0101;
        let mut pca = Pca9536::new(&mut part);

        assert_eq!(pca.read_register(Register::Input).unwrap(), 0xF5);
        assert_eq!(pca.inputs().unwrap(), 0b0101);

        pca.set_polarity(0xFF).unwrap();
        assert_eq!(pca.inputs().unwrap(), 0b1010);
        assert_eq!(part.polarity, pin::ALL);
    }

    #[test]
    fn nack_is_propagated() {
        let mut part = Expander::new();
        let mut pca = Pca9536::with_address(&mut part, 0x42);

        assert_eq!(
            pca.configure_all_outputs(),
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
        assert_eq!(part.config, 0xFF);
    }

    #[test]
    fn release_returns_bus() {
        let pca = Pca9536::new(Expander::new());
        assert_eq!(pca.address(), ADDRESS);
        let part = pca.release();
        assert!(part.transactions.is_empty());
    }
}
