// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BSP for the EK-TM4C123GXL LaunchPad with the BTB harness attached.
//!
//! ```text
//! PF1  red LED (active high)
//! PF2  blue LED (active high)
//! PF3  green LED (active high)
//! PB5  fault input from the harness, high = fault
//! PB2  I2C0SCL  -> PCA9536 SCL
//! PB3  I2C0SDA  -> PCA9536 SDA
//! PA0  U0RX (ICDI virtual COM port, unused)
//! PA1  U0TX (ICDI virtual COM port, unused)
//! ```

use crate::bsp::Bsp;
use crate::gpio::{self, pin, Ports};
use crate::led::{Channels, Color};

const RED: u8 = pin::P1;
const BLUE: u8 = pin::P2;
const GREEN: u8 = pin::P3;
const LED: u8 = RED | BLUE | GREEN;

const FAULT: u8 = pin::P5;

pub struct Board;

impl Bsp for Board {
    fn configure(ports: &Ports<'_>) {
        gpio::make_outputs(ports.f, LED);
        gpio::make_inputs(ports.b, FAULT);
    }

    fn show(ports: &Ports<'_>, color: Color) {
        let channels = color.channels();
        let mut value = 0;
        if channels.red {
            value |= RED;
        }
        if channels.green {
            value |= GREEN;
        }
        if channels.blue {
            value |= BLUE;
        }
        gpio::write(ports.f, LED, value);
    }

    fn lit(ports: &Ports<'_>) -> Channels {
        let value = gpio::read(ports.f, LED);
        Channels {
            red: value & RED != 0,
            green: value & GREEN != 0,
            blue: value & BLUE != 0,
        }
    }

    fn fault_asserted(ports: &Ports<'_>) -> bool {
        gpio::read(ports.b, FAULT) != 0
    }
}
