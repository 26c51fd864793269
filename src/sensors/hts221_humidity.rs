// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! ST HTS221 humidity and temperature sensor.
//!
//! The part converts both quantities through factory-programmed two-point
//! calibration lines stored in its register file. Calibration is read once
//! at bring-up; afterwards each sample is a status-gated pair of word
//! reads. https://www.st.com/resource/en/datasheet/hts221.pdf

#![allow(dead_code)] // register map

use std::time::Duration;

use crate::calibrate::{CalibrationPoint, LinearFit};
use crate::core::{Error, I2cBus, Result, AUTO_INCREMENT};
use crate::poll::Sampler;
use crate::sensors::{Hygrometer, Thermometer};

/// HTS221 I2C slave address.
pub const SLAVE_ADDR: u16 = 0x5f;

/// Value the identity register must report.
pub const DEVICE_ID: u8 = 0xbc;

/// Poll cadence for the humidity/temperature loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(16);

// Register map
const WHO_AM_I: u8 = 0x0f;
const AV_CONF: u8 = 0x10;
const CTRL1: u8 = 0x20;
const CTRL2: u8 = 0x21;
const CTRL3: u8 = 0x22;
const STATUS: u8 = 0x27;
const HUMIDITY_OUT_L: u8 = 0x28;
const HUMIDITY_OUT_H: u8 = 0x29;
const TEMP_OUT_L: u8 = 0x2a;
const TEMP_OUT_H: u8 = 0x2b;

// Calibration registers
const H0_RH_X2: u8 = 0x30;
const H1_RH_X2: u8 = 0x31;
const T0_DEGC_X8: u8 = 0x32;
const T1_DEGC_X8: u8 = 0x33;
const T1_T0_MSB: u8 = 0x35;
const H0_T0_OUT: u8 = 0x36;
const H1_T0_OUT: u8 = 0x3a;
const T0_OUT: u8 = 0x3c;
const T1_OUT: u8 = 0x3e;

// STATUS bits
const STATUS_TEMPERATURE_READY: u8 = 0x01;
const STATUS_HUMIDITY_READY: u8 = 0x02;

// CTRL1: power on, block data update, 12.5 Hz output
const CTRL1_BOOT: u8 = 0x87;
// AV_CONF: 32-sample temperature / 64-sample humidity averaging
const AV_CONF_BOOT: u8 = 0x1b;

/// One status-gated sample. A quantity whose data-ready bit was clear is
/// `None` for this pass; the polling layer retains its previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HumidityReading {
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Temperature in degrees celsius.
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Hts221Calibration {
    humidity: LinearFit,
    temperature: LinearFit,
}

impl Hts221Calibration {
    /// Read the factory calibration registers and fit both conversion
    /// lines. A degenerate point pair aborts bring-up.
    fn read<B: I2cBus>(bus: &mut B) -> Result<Hts221Calibration> {
        // Temperature points are 10 bits wide: the two low bits of each
        // value live in the shared MSB register, point 0 in bits 0-1 and
        // point 1 in bits 2-3.
        let msb = bus.read_reg_byte(T1_T0_MSB | AUTO_INCREMENT)?;
        let t0_lsb = bus.read_reg_byte(T0_DEGC_X8 | AUTO_INCREMENT)?;
        let t0 = f64::from(u16::from(msb & 0x03) << 8 | u16::from(t0_lsb)) / 8.0;
        let t1_lsb = bus.read_reg_byte(T1_DEGC_X8 | AUTO_INCREMENT)?;
        let t1 = f64::from(u16::from(msb & 0x0c) << 6 | u16::from(t1_lsb)) / 8.0;
        let t0_out = bus.read_reg_word(T0_OUT | AUTO_INCREMENT)?;
        let t1_out = bus.read_reg_word(T1_OUT | AUTO_INCREMENT)?;
        let temperature = LinearFit::through(
            CalibrationPoint {
                raw: t0_out,
                reference: t0,
            },
            CalibrationPoint {
                raw: t1_out,
                reference: t1,
            },
        )?;

        // Humidity points are stored doubled in a single byte each.
        let h0 = f64::from(bus.read_reg_byte(H0_RH_X2 | AUTO_INCREMENT)?) / 2.0;
        let h1 = f64::from(bus.read_reg_byte(H1_RH_X2 | AUTO_INCREMENT)?) / 2.0;
        let h0_out = bus.read_reg_word(H0_T0_OUT | AUTO_INCREMENT)?;
        let h1_out = bus.read_reg_word(H1_T0_OUT | AUTO_INCREMENT)?;
        let humidity = LinearFit::through(
            CalibrationPoint {
                raw: h0_out,
                reference: h0,
            },
            CalibrationPoint {
                raw: h1_out,
                reference: h1,
            },
        )?;

        Ok(Hts221Calibration {
            humidity,
            temperature,
        })
    }
}

/// Handle on the HTS221, powered up and calibrated.
pub struct Hts221<B: I2cBus> {
    bus: B,
    calibration: Hts221Calibration,
}

impl<B: I2cBus> Hts221<B> {
    /// Verify the part's identity, power it up and read the factory
    /// calibration. Identity or calibration faults abort bring-up; the
    /// device never reaches a usable state.
    pub fn new(mut bus: B) -> Result<Hts221<B>> {
        let id = bus.read_reg_byte(WHO_AM_I)?;
        if id != DEVICE_ID {
            return Err(Error::UnexpectedDeviceId {
                expected: DEVICE_ID,
                found: id,
            });
        }
        bus.write_reg_byte(CTRL1, CTRL1_BOOT)?;
        bus.write_reg_byte(AV_CONF, AV_CONF_BOOT)?;
        let calibration = Hts221Calibration::read(&mut bus)?;
        Ok(Hts221 { bus, calibration })
    }

    /// Read whichever quantities have fresh data, converted to physical
    /// units.
    pub fn read(&mut self) -> Result<HumidityReading> {
        let status = self.bus.read_reg_byte(STATUS)?;

        let humidity = if status & STATUS_HUMIDITY_READY != 0 {
            let raw = self.bus.read_reg_word(HUMIDITY_OUT_L | AUTO_INCREMENT)?;
            Some(self.calibration.humidity.convert(raw))
        } else {
            None
        };

        let temperature = if status & STATUS_TEMPERATURE_READY != 0 {
            let raw = self.bus.read_reg_word(TEMP_OUT_L | AUTO_INCREMENT)?;
            Some(self.calibration.temperature.convert(raw))
        } else {
            None
        };

        Ok(HumidityReading {
            humidity,
            temperature,
        })
    }
}

impl<B> Sampler for Hts221<B>
where
    B: I2cBus + Send + 'static,
{
    type State = HumidityReading;

    fn sample(&mut self) -> Result<HumidityReading> {
        self.read()
    }

    fn merge(previous: &HumidityReading, current: HumidityReading) -> HumidityReading {
        HumidityReading {
            humidity: current.humidity.or(previous.humidity),
            temperature: current.temperature.or(previous.temperature),
        }
    }
}

impl<B: I2cBus> Hygrometer for Hts221<B> {
    fn relative_humidity(&mut self) -> Result<Option<f64>> {
        Ok(self.read()?.humidity)
    }
}

impl<B: I2cBus> Thermometer for Hts221<B> {
    fn temperature_celsius(&mut self) -> Result<Option<f64>> {
        Ok(self.read()?.temperature)
    }
}
