// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Support code for the BTB expander exerciser.
//!
//! The firmware drives a PCA9536 on I2C0 through the four battery port-select
//! patterns and watches a fault line, flashing the board LED in a colour that
//! identifies the port. The binaries in `src/bin` hold the entry points; this
//! crate holds the peripheral bring-up and the pieces they share.

#![no_std]

pub mod bsp;
pub mod gpio;
pub mod i2c;
pub mod led;
pub mod sysctl;

use gpio::Ports;
use pca9536::Port;

/// How long each port's pattern is held before the expander is released,
/// in milliseconds.
pub const DWELL_MS: u32 = 487;

/// How long a fault colour stays lit.
pub const FLASH_HOLD_MS: u32 = 862;

/// Dark time after a fault flash, so back-to-back faults read as separate
/// flashes.
pub const FLASH_SETTLE_MS: u32 = 487;

/// Written in place of a port pattern when the `fixed-test-pattern` feature is
/// on: IO0-IO3 low, upper nibble high.
pub const TEST_PATTERN: u8 = 0b1111_0000;

/// Written after every dwell: every expander output high.
pub const IDLE_PATTERN: u8 = 0b1111_1111;

/// The value written to the expander's output register while `port` is being
/// exercised.
pub fn active_pattern(port: Port) -> u8 {
    if cfg!(feature = "fixed-test-pattern") {
        TEST_PATTERN
    } else {
        port.pattern()
    }
}

/// Clocks and muxes everything the firmware touches, except the I2C master
/// function itself, which `i2c::I2cMaster::new` switches on.
///
/// Safe to call again after a failure: every step is idempotent, and I2C0 is
/// reset along the way, so this doubles as bus recovery.
pub fn bring_up<B: bsp::Bsp>(
    sysctl: &tm4c123x::SYSCTL,
    ports: &Ports<'_>,
) -> Result<(), sysctl::Timeout> {
    // Pin setup is a long run of read-modify-writes. Keep it uninterrupted.
    cortex_m::interrupt::free(|_| {
        sysctl::enable_gpio(sysctl, sysctl::gpio_port::ALL)?;
        B::configure(ports);
        Ok::<_, sysctl::Timeout>(())
    })?;

    sysctl::enable_i2c0(sysctl)?;
    gpio::configure_i2c0_pins(ports.b);

    // UART0 is brought up for the console pins only. Log output goes over
    // RTT.
    sysctl::enable_uart0(sysctl)?;
    gpio::configure_uart0_pins(ports.a);

    Ok(())
}
