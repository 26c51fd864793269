// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! SKRHABE010 five-way joystick.
//!
//! The board's controller exposes all five buttons as bits of a single
//! status register. Polling it and translating state flips into discrete
//! press/release transitions is the whole driver; mapping those
//! transitions onto host input events is left to the caller.

use std::time::Duration;

use bitflags::bitflags;

use crate::core::{I2cBus, Result};
use crate::poll::Sampler;

/// I2C slave address of the joystick controller (shared with the LED
/// matrix).
pub const SLAVE_ADDR: u16 = 0x46;

/// Button status register.
const STATUS: u8 = 0xf2;

/// Poll cadence for the button loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(32);

bitflags! {
    /// Buttons currently held, one bit per direction as the controller
    /// reports them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const DOWN  = 0x01;
        const RIGHT = 0x02;
        const UP    = 0x04;
        const ENTER = 0x08;
        const LEFT  = 0x10;
    }
}

impl Default for Buttons {
    fn default() -> Buttons {
        Buttons::empty()
    }
}

/// Button slots in the order key identifiers are supplied: left, up,
/// right, down, enter.
pub const BUTTON_ORDER: [Buttons; 5] = [
    Buttons::LEFT,
    Buttons::UP,
    Buttons::RIGHT,
    Buttons::DOWN,
    Buttons::ENTER,
];

/// One discrete button edge: the slot's key identifier plus whether the
/// button went down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition<K> {
    pub key: K,
    pub pressed: bool,
}

/// Translate a state flip into discrete per-button transitions.
///
/// `keys` supplies one logical key identifier per slot in
/// [`BUTTON_ORDER`]. Each button whose bit flipped between the two
/// snapshots yields exactly one transition: pressed when it became set,
/// released when it became clear.
pub fn key_transitions<K: Copy>(
    previous: Buttons,
    current: Buttons,
    keys: &[K; 5],
) -> Vec<KeyTransition<K>> {
    let flipped = previous ^ current;
    BUTTON_ORDER
        .iter()
        .zip(keys)
        .filter(|(button, _)| flipped.contains(**button))
        .map(|(button, key)| KeyTransition {
            key: *key,
            pressed: current.contains(*button),
        })
        .collect()
}

/// Handle on the joystick controller.
pub struct Joystick<B: I2cBus> {
    bus: B,
}

impl<B: I2cBus> Joystick<B> {
    pub fn new(bus: B) -> Joystick<B> {
        Joystick { bus }
    }

    /// Read the current button state. Bits the controller sets beyond the
    /// five buttons are discarded.
    pub fn read(&mut self) -> Result<Buttons> {
        let status = self.bus.read_reg_byte(STATUS)?;
        Ok(Buttons::from_bits_truncate(status))
    }
}

impl<B> Sampler for Joystick<B>
where
    B: I2cBus + Send + 'static,
{
    type State = Buttons;

    fn sample(&mut self) -> Result<Buttons> {
        self.read()
    }
}
