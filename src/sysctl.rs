// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! System control: the clock tree and per-peripheral clock gating.
//!
//! Everything here is a thin sequence of register pokes. The one thing worth
//! knowing is that every "is it ready yet" poll is bounded, so a peripheral
//! that never comes up turns into a `Timeout` instead of a silent hang.

use defmt::Format;

/// System clock after `configure_clock`: 400 MHz PLL output, divided by 5.
pub const SYSCLK_HZ: u32 = 80_000_000;

/// How many times we'll poll a ready or lock flag before giving up. The PLL
/// is the slowest of these and locks in well under a millisecond, which is
/// a few thousand iterations at 16 MHz.
const READY_POLL_LIMIT: u32 = 100_000;

/// GPIO port bits, as used by the `RCGCGPIO`/`PRGPIO` pair.
pub mod gpio_port {
    pub const A: u32 = 1 << 0;
    pub const B: u32 = 1 << 1;
    pub const C: u32 = 1 << 2;
    pub const D: u32 = 1 << 3;
    pub const E: u32 = 1 << 4;
    pub const F: u32 = 1 << 5;

    pub const ALL: u32 = A | B | C | D | E | F;
}

// RCC fields.
const RCC_MOSCDIS: u32 = 1 << 0;
const RCC_XTAL_MASK: u32 = 0x1F << 6;
const RCC_XTAL_16MHZ: u32 = 0x15 << 6;

// RCC2 fields.
const RCC2_USERCC2: u32 = 1 << 31;
const RCC2_DIV400: u32 = 1 << 30;
const RCC2_SYSDIV2_MASK: u32 = 0x7F << 22;
const RCC2_PWRDN2: u32 = 1 << 13;
const RCC2_BYPASS2: u32 = 1 << 11;
const RCC2_OSCSRC2_MASK: u32 = 0x7 << 4;

/// SYSDIV2 and SYSDIV2LSB taken together as one 7-bit field: divide the
/// 400 MHz PLL output by (4 + 1).
const RCC2_SYSDIV2_DIV5: u32 = 4 << 22;

/// PLL lock flag in `RIS`; cleared by writing it to `MISC`.
pub const RIS_PLLLRIS: u32 = 1 << 6;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Format)]
pub enum Peripheral {
    Pll,
    Gpio,
    I2c0,
    Uart0,
}

/// A ready or lock flag never came up.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Format)]
pub struct Timeout(pub Peripheral);

/// Runs the system clock from the PLL, locked to the 16 MHz main crystal, at
/// `SYSCLK_HZ`. Returns the resulting frequency.
///
/// This is meant to be called once, before anything that derives a rate from
/// the system clock (I2C in particular) is configured.
pub fn configure_clock(sysctl: &tm4c123x::SYSCTL) -> Result<u32, Timeout> {
    // Take over with RCC2 and run from the raw oscillator while the PLL is
    // reconfigured underneath us.
    sysctl.rcc2.modify(|r, w| unsafe {
        w.bits(r.bits() | RCC2_USERCC2 | RCC2_BYPASS2)
    });

    // Tell the PLL what crystal it's looking at, and make sure the main
    // oscillator is actually running.
    sysctl.rcc.modify(|r, w| unsafe {
        w.bits((r.bits() & !(RCC_XTAL_MASK | RCC_MOSCDIS)) | RCC_XTAL_16MHZ)
    });

    // Main oscillator as the source (OSCSRC2 = 0), PLL powered.
    sysctl.rcc2.modify(|r, w| unsafe {
        w.bits(r.bits() & !(RCC2_OSCSRC2_MASK | RCC2_PWRDN2))
    });

    sysctl.rcc2.modify(|r, w| unsafe {
        w.bits((r.bits() & !RCC2_SYSDIV2_MASK) | RCC2_DIV400 | RCC2_SYSDIV2_DIV5)
    });

    // The lock flag is sticky; clear it so only a fresh lock counts.
    sysctl.misc.write(|w| unsafe { w.bits(RIS_PLLLRIS) });
    wait_until(Peripheral::Pll, || sysctl.ris.read().bits() & RIS_PLLLRIS != 0)?;

    // Locked. Switch over.
    sysctl.rcc2.modify(|r, w| unsafe { w.bits(r.bits() & !RCC2_BYPASS2) });

    Ok(SYSCLK_HZ)
}

/// Ungates the GPIO ports in `ports` (a mask of `gpio_port` bits) and waits
/// until every one of them reports ready.
pub fn enable_gpio(sysctl: &tm4c123x::SYSCTL, ports: u32) -> Result<(), Timeout> {
    sysctl.rcgcgpio.modify(|r, w| unsafe { w.bits(r.bits() | ports) });
    wait_until(Peripheral::Gpio, || {
        sysctl.prgpio.read().bits() & ports == ports
    })
}

/// Gates the GPIO ports in `ports` off again and waits until they report
/// not ready.
pub fn disable_gpio(sysctl: &tm4c123x::SYSCTL, ports: u32) -> Result<(), Timeout> {
    sysctl.rcgcgpio.modify(|r, w| unsafe { w.bits(r.bits() & !ports) });
    wait_until(Peripheral::Gpio, || sysctl.prgpio.read().bits() & ports == 0)
}

/// Ungates I2C0 and pulses its reset, leaving it in its power-on state.
pub fn enable_i2c0(sysctl: &tm4c123x::SYSCTL) -> Result<(), Timeout> {
    const I2C0: u32 = 1 << 0;

    sysctl.rcgci2c.modify(|r, w| unsafe { w.bits(r.bits() | I2C0) });
    wait_until(Peripheral::I2c0, || sysctl.pri2c.read().bits() & I2C0 != 0)?;

    sysctl.sri2c.modify(|r, w| unsafe { w.bits(r.bits() | I2C0) });
    sysctl.sri2c.modify(|r, w| unsafe { w.bits(r.bits() & !I2C0) });
    wait_until(Peripheral::I2c0, || sysctl.pri2c.read().bits() & I2C0 != 0)
}

pub fn enable_uart0(sysctl: &tm4c123x::SYSCTL) -> Result<(), Timeout> {
    const UART0: u32 = 1 << 0;

    sysctl.rcgcuart.modify(|r, w| unsafe { w.bits(r.bits() | UART0) });
    wait_until(Peripheral::Uart0, || sysctl.pruart.read().bits() & UART0 != 0)
}

fn wait_until(
    peripheral: Peripheral,
    mut ready: impl FnMut() -> bool,
) -> Result<(), Timeout> {
    for _ in 0..READY_POLL_LIMIT {
        if ready() {
            return Ok(());
        }
    }
    Err(Timeout(peripheral))
}
