// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types and hooks for implementing Board Support Packages (BSPs).
//!
//! The firmware only needs three things from a board: an RGB status LED, a
//! digital fault input, and some way to say "something has gone badly
//! wrong". The I2C pins are fixed by the part (I2C0 on PB2/PB3) and are not
//! the BSP's business.
//!
//! To implement a BSP:
//!
//! 1. Create a module within `btb::bsp` named after your board.
//! 2. Define a type in the module called `Board`. This type will never be
//!    instantiated, so it can be arbitrary; an empty struct is easy.
//! 3. Implement `btb::bsp::Bsp` for your `Board` type.
//! 4. Add a `target-board-*` feature to `Cargo.toml`.
//! 5. Add a branch to the `cfg_if` in each binary under `src/bin` to detect
//!    your board and select the right `Board` type.

// Every BSP is compiled regardless of the selected board, so that they all
// keep building.
pub mod ek_tm4c123gxl;

use crate::gpio::Ports;
use crate::led::{Channels, Color};
use crate::sysctl::gpio_port;

/// Requirements placed upon a BSP type.
pub trait Bsp {
    /// Set up the LED outputs and the fault input. GPIO clocks are already
    /// running when this is called.
    fn configure(ports: &Ports<'_>);

    /// Light the status LED in `color`, turning off any channel `color`
    /// doesn't use.
    fn show(ports: &Ports<'_>, color: Color);

    /// Reads the fault ("battery") input. `true` means a fault is being
    /// signalled.
    fn fault_asserted(ports: &Ports<'_>) -> bool;

    /// Reports which LED channels are currently lit.
    fn lit(ports: &Ports<'_>) -> Channels;

    /// Indicate an unrecoverable failure. Called from the fault handler, so it
    /// can't assume bring-up got as far as clocking the GPIO ports, let alone
    /// `configure`.
    fn indicate_fault(sysctl: &tm4c123x::SYSCTL, ports: &Ports<'_>) {
        // Touching a gated port faults, and we're already in the fault
        // handler. If the ports won't come up there's nothing to light.
        if crate::sysctl::enable_gpio(sysctl, gpio_port::ALL).is_err() {
            return;
        }
        Self::configure(ports);
        Self::show(ports, Color::Red);
    }
}
