// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! Linux `/dev/i2c-*` bus backend.
//!
//! Wraps the kernel i2c-dev interface: the character device is opened
//! read/write, the slave address is claimed with the `I2C_SLAVE` ioctl,
//! and transfers go through plain file reads and writes.
//! https://www.kernel.org/doc/Documentation/i2c/dev-interface

use std::fs::{File, OpenOptions};
use std::io;
use std::io::prelude::*;
use std::os::unix::prelude::*;
use std::path::Path;

use libc::c_int;
use log::debug;

use crate::core::{Error, I2cBus, Result};

mod ffi {
    use nix::ioctl_write_int_bad;

    // from include/uapi/linux/i2c-dev.h
    const I2C_SLAVE: libc::c_int = 0x0703;

    ioctl_write_int_bad!(i2c_set_slave_address, I2C_SLAVE);
}

/// A single I2C peripheral claimed at a fixed slave address on a Linux
/// i2c-dev bus.
///
/// The address is held for the lifetime of the handle and released exactly
/// once, either by [`close`](LinuxI2cBus::close) or on drop.
pub struct LinuxI2cBus {
    devfile: Option<File>,
    slave_address: u16,
}

impl LinuxI2cBus {
    /// Open the bus device at `path` and claim `slave_address` on it.
    ///
    /// Typically the address is expected to be 7 bits. Little validation
    /// is done here as the kernel is good at making sure things are valid.
    pub fn open<P: AsRef<Path>>(path: P, slave_address: u16) -> Result<LinuxI2cBus> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        unsafe { ffi::i2c_set_slave_address(file.as_raw_fd(), c_int::from(slave_address)) }
            .map_err(io::Error::from)?;
        debug!(
            "claimed 0x{:02x} on {}",
            slave_address,
            path.as_ref().display()
        );
        Ok(LinuxI2cBus {
            devfile: Some(file),
            slave_address,
        })
    }

    /// The claimed slave address.
    pub fn address(&self) -> u16 {
        self.slave_address
    }

    /// Release the claim on the slave address. Safe to call more than
    /// once; operations after close fail with an I/O fault.
    pub fn close(&mut self) {
        if self.devfile.take().is_some() {
            debug!("released 0x{:02x}", self.slave_address);
        }
    }

    fn devfile(&mut self) -> Result<&mut File> {
        self.devfile.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "bus handle is closed",
            ))
        })
    }
}

impl I2cBus for LinuxI2cBus {
    fn read(&mut self, data: &mut [u8]) -> Result<()> {
        self.devfile()?.read_exact(data)?;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.devfile()?.write_all(data)?;
        Ok(())
    }
}

impl Drop for LinuxI2cBus {
    fn drop(&mut self) {
        self.close();
    }
}
