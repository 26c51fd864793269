// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

// Polls the Sense HAT environment sensors and prints every change.

use docopt::Docopt;
use std::env::args;

const USAGE: &str = "
Reading Sense HAT sensor data via Linux i2cdev.

Usage:
  sensors <device>
  sensors (-h | --help)

Options:
  -h --help    Show this help text.
";

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    use sensehat::linux::LinuxI2cBus;
    use sensehat::poll::PolledDevice;
    use sensehat::sensors::hts221_humidity::{self, Hts221};
    use sensehat::sensors::lps25h_barometer::{self, Lps25h};
    use sensehat::sensors::lsm9ds1_imu::{self, Lsm9ds1};
    use std::thread;
    use std::time::Duration;

    let argmap = Docopt::new(USAGE)
        .and_then(|d| d.argv(args()).parse())
        .unwrap_or_else(|e| e.exit());
    let device = argmap.get_str("<device>");

    let mut lps25h = Lps25h::new(LinuxI2cBus::open(device, lps25h_barometer::SLAVE_ADDR).unwrap());
    let mut lsm9ds1 = Lsm9ds1::new(LinuxI2cBus::open(device, lsm9ds1_imu::SLAVE_ADDR).unwrap());
    println!("== LPS25H id: 0x{:02x} ==", lps25h.device_id().unwrap());
    println!("== LSM9DS1 id: 0x{:02x} ==", lsm9ds1.device_id().unwrap());

    let bus = LinuxI2cBus::open(device, hts221_humidity::SLAVE_ADDR).unwrap();
    let hts221 = Hts221::new(bus).unwrap();

    let mut polled = PolledDevice::new(hts221, hts221_humidity::POLL_INTERVAL);
    polled.subscribe(|event| {
        if let Some(humidity) = event.current.humidity {
            println!("Humidity:    {:.1} %", humidity);
        }
        if let Some(temperature) = event.current.temperature {
            println!("Temperature: {:.1} C", temperature);
        }
    });
    polled.start();

    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
