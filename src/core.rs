// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;

use byteorder::{ByteOrder, LittleEndian};

/// Set this bit in a register address to have the device auto-advance its
/// register pointer across a multi-byte transfer.
///
/// All multi-register sequential reads on the board (calibration words,
/// sensor output words) must be issued against `register | AUTO_INCREMENT`.
/// The convention is applied by the caller; the bus layer does not infer it.
pub const AUTO_INCREMENT: u8 = 0x80;

/// Error raised by device bring-up or a bus transaction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bus transaction failed: NAK, timeout, or device absent.
    #[error("i2c transaction failed: {0}")]
    Io(#[from] io::Error),

    /// The identity register did not report the expected part.
    #[error("unexpected device id 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedDeviceId { expected: u8, found: u8 },

    /// Both factory calibration points report the same raw output, so no
    /// conversion line can be derived from them.
    #[error("degenerate factory calibration: both points at raw output {raw}")]
    DegenerateCalibration { raw: i16 },
}

/// Result of a device operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Interface to a single I2C peripheral claimed at a fixed slave address.
///
/// Implementations provide the two raw transfer methods; the register
/// operations are layered on top of them. A raw read starts at the
/// device's current register pointer, and the first byte of a raw write
/// sets that pointer, which is how the parts on this board behave.
pub trait I2cBus {
    /// Fill `data` starting at the device's current register pointer.
    fn read(&mut self, data: &mut [u8]) -> Result<()>;

    /// Write raw bytes to the device. The first byte addresses the target
    /// register; the remainder is payload.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read a single byte register.
    fn read_reg_byte(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.write(&[register])?;
        self.read(&mut buf)?;
        Ok(buf[0])
    }

    /// Read two consecutive registers as a little-endian signed word.
    ///
    /// Pass `register | AUTO_INCREMENT`, otherwise the device re-reads the
    /// low register twice.
    fn read_reg_word(&mut self, register: u8) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.write(&[register])?;
        self.read(&mut buf)?;
        Ok(LittleEndian::read_i16(&buf))
    }

    /// Read `buf.len()` consecutive registers starting at `register`.
    fn read_reg_buffer(&mut self, register: u8, buf: &mut [u8]) -> Result<()> {
        self.write(&[register])?;
        self.read(buf)
    }

    /// Write a single byte register.
    fn write_reg_byte(&mut self, register: u8, value: u8) -> Result<()> {
        self.write(&[register, value])
    }

    /// Write two consecutive registers as a little-endian signed word.
    fn write_reg_word(&mut self, register: u8, value: i16) -> Result<()> {
        let mut buf = [0u8; 3];
        buf[0] = register;
        LittleEndian::write_i16(&mut buf[1..], value);
        self.write(&buf)
    }
}
