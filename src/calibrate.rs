// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! Two-point linear calibration.
//!
//! Several parts on the board store a pair of factory-programmed
//! (raw ADC output, reference value) points; the line through them
//! converts raw samples to physical units. The fit is computed once at
//! device bring-up and closed over for the lifetime of the handle.

use crate::core::{Error, Result};

/// One factory calibration point: the raw ADC output the part reported at
/// the factory, and the physical value that output corresponds to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub raw: i16,
    pub reference: f64,
}

/// A linear raw-to-physical conversion derived from two calibration points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    slope: f64,
    intercept: f64,
}

impl LinearFit {
    /// Fit the line through two calibration points.
    ///
    /// Both points reporting the same raw output means the part's factory
    /// calibration is degenerate; that is a bring-up failure, not something
    /// to paper over with an infinite slope.
    pub fn through(p0: CalibrationPoint, p1: CalibrationPoint) -> Result<LinearFit> {
        if p0.raw == p1.raw {
            return Err(Error::DegenerateCalibration { raw: p0.raw });
        }
        let run = f64::from(p1.raw) - f64::from(p0.raw);
        let slope = (p1.reference - p0.reference) / run;
        let intercept = p0.reference - slope * f64::from(p0.raw);
        Ok(LinearFit { slope, intercept })
    }

    /// Convert a raw sample to physical units.
    pub fn convert(&self, raw: i16) -> f64 {
        f64::from(raw) * self.slope + self.intercept
    }
}
