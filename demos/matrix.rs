// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

// Cycles the Sense HAT LED matrix through solid colors and a gradient.

use docopt::Docopt;
use std::env::args;

const USAGE: &str = "
Driving the Sense HAT LED matrix via Linux i2cdev.

Usage:
  matrix <device>
  matrix (-h | --help)

Options:
  -h --help    Show this help text.
";

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    use sensehat::led_matrix::{self, LedMatrix, Pixel, PixelGrid};
    use sensehat::linux::LinuxI2cBus;
    use std::thread;
    use std::time::Duration;

    let argmap = Docopt::new(USAGE)
        .and_then(|d| d.argv(args()).parse())
        .unwrap_or_else(|e| e.exit());
    let device = argmap.get_str("<device>");

    let bus = LinuxI2cBus::open(device, led_matrix::SLAVE_ADDR).unwrap();
    let mut matrix = LedMatrix::new(bus);

    for color in [
        Pixel::rgb(255, 0, 0),
        Pixel::rgb(0, 255, 0),
        Pixel::rgb(0, 0, 255),
    ] {
        matrix.fill(color).unwrap();
        thread::sleep(Duration::from_millis(500));
    }

    let mut grid: PixelGrid = Default::default();
    for (y, row) in grid.iter_mut().enumerate() {
        for (x, pixel) in row.iter_mut().enumerate() {
            *pixel = Pixel::rgb((x * 32) as u8, (y * 32) as u8, 64);
        }
    }
    matrix.draw(&grid).unwrap();
    thread::sleep(Duration::from_secs(2));

    matrix.fill(Pixel::rgba(0, 0, 0, 255)).unwrap();
}
