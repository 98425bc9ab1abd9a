// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Status LED colours and the fault flash.

use defmt::Format;
use pca9536::Port;

use crate::bsp::Bsp;
use crate::gpio::Ports;
use crate::{FLASH_HOLD_MS, FLASH_SETTLE_MS};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Format)]
pub enum Color {
    Off,
    Red,
    Green,
    Blue,
    /// Red and blue.
    Purple,
    /// Everything.
    White,
}

/// Which of the three LED channels a colour lights.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Format)]
pub struct Channels {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl Color {
    /// Colour flashed when the fault line is up while `port` is selected.
    pub fn for_port(port: Port) -> Color {
        match port {
            Port::P1 => Color::Red,
            Port::P2 => Color::Blue,
            Port::P3 => Color::Purple,
            Port::P4 => Color::White,
        }
    }

    pub fn channels(self) -> Channels {
        let (red, green, blue) = match self {
            Color::Off => (false, false, false),
            Color::Red => (true, false, false),
            Color::Green => (false, true, false),
            Color::Blue => (false, false, true),
            Color::Purple => (true, false, true),
            Color::White => (true, true, true),
        };
        Channels { red, green, blue }
    }
}

/// Flashes `port`'s colour once, then leaves the LED dark for the settle
/// time. The caller is responsible for restoring whatever was lit before.
pub fn flash_fault<B: Bsp>(
    ports: &Ports<'_>,
    delay: &mut cortex_m::delay::Delay,
    port: Port,
) {
    B::show(ports, Color::for_port(port));
    delay.delay_ms(FLASH_HOLD_MS);
    B::show(ports, Color::Off);
    delay.delay_ms(FLASH_SETTLE_MS);
}
