// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

// Polls the Sense HAT joystick and prints press/release transitions.

use docopt::Docopt;
use std::env::args;

const USAGE: &str = "
Reading Sense HAT joystick events via Linux i2cdev.

Usage:
  joystick <device>
  joystick (-h | --help)

Options:
  -h --help    Show this help text.
";

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    use sensehat::linux::LinuxI2cBus;
    use sensehat::poll::PolledDevice;
    use sensehat::sensors::joystick::{self, key_transitions, Joystick};
    use std::thread;
    use std::time::Duration;

    const KEYS: [&str; 5] = ["left", "up", "right", "down", "enter"];

    let argmap = Docopt::new(USAGE)
        .and_then(|d| d.argv(args()).parse())
        .unwrap_or_else(|e| e.exit());
    let device = argmap.get_str("<device>");

    let bus = LinuxI2cBus::open(device, joystick::SLAVE_ADDR).unwrap();
    let mut polled = PolledDevice::new(Joystick::new(bus), joystick::POLL_INTERVAL);
    polled.subscribe(|event| {
        let previous = event.previous.unwrap_or_default();
        for transition in key_transitions(previous, event.current, &KEYS) {
            let edge = if transition.pressed {
                "pressed"
            } else {
                "released"
            };
            println!("{} {}", transition.key, edge);
        }
    });
    polled.start();

    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
