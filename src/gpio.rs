// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pin direction, data and multiplexing for the APB GPIO ports.
//!
//! All ports share one register layout, so these take the register block
//! rather than a particular port. Pin arguments are 8-bit masks.

/// Register block shared by every GPIO port.
pub type Port = tm4c123x::gpio_porta::RegisterBlock;

pub mod pin {
    pub const P0: u8 = 1 << 0;
    pub const P1: u8 = 1 << 1;
    pub const P2: u8 = 1 << 2;
    pub const P3: u8 = 1 << 3;
    pub const P4: u8 = 1 << 4;
    pub const P5: u8 = 1 << 5;
    pub const P6: u8 = 1 << 6;
    pub const P7: u8 = 1 << 7;
}

/// Borrowed register blocks for all six ports, so board code can reach the
/// ones it wants without the caller knowing which.
pub struct Ports<'a> {
    pub a: &'a Port,
    pub b: &'a Port,
    pub c: &'a Port,
    pub d: &'a Port,
    pub e: &'a Port,
    pub f: &'a Port,
}

impl<'a> Ports<'a> {
    pub fn new(
        a: &'a tm4c123x::GPIO_PORTA,
        b: &'a tm4c123x::GPIO_PORTB,
        c: &'a tm4c123x::GPIO_PORTC,
        d: &'a tm4c123x::GPIO_PORTD,
        e: &'a tm4c123x::GPIO_PORTE,
        f: &'a tm4c123x::GPIO_PORTF,
    ) -> Self {
        Self { a, b, c, d, e, f }
    }
}

impl Ports<'static> {
    /// Conjures the ports out of thin air.
    ///
    /// # Safety
    ///
    /// This aliases whatever the rest of the program holds. It's meant for
    /// fault handlers, which by definition aren't racing anyone.
    pub unsafe fn steal() -> Self {
        unsafe {
            Self {
                a: &*tm4c123x::GPIO_PORTA::ptr(),
                b: &*tm4c123x::GPIO_PORTB::ptr(),
                c: &*tm4c123x::GPIO_PORTC::ptr(),
                d: &*tm4c123x::GPIO_PORTD::ptr(),
                e: &*tm4c123x::GPIO_PORTE::ptr(),
                f: &*tm4c123x::GPIO_PORTF::ptr(),
            }
        }
    }
}

/// PCTL function number for I2C on PB2/PB3.
const PCTL_I2C: u8 = 3;
/// PCTL function number for UART0 on PA0/PA1.
const PCTL_UART: u8 = 1;

pub fn make_outputs(port: &Port, pins: u8) {
    let pins = u32::from(pins);
    port.afsel.modify(|r, w| unsafe { w.bits(r.bits() & !pins) });
    port.dir.modify(|r, w| unsafe { w.bits(r.bits() | pins) });
    port.den.modify(|r, w| unsafe { w.bits(r.bits() | pins) });
}

pub fn make_inputs(port: &Port, pins: u8) {
    let pins = u32::from(pins);
    port.afsel.modify(|r, w| unsafe { w.bits(r.bits() & !pins) });
    port.dir.modify(|r, w| unsafe { w.bits(r.bits() & !pins) });
    port.den.modify(|r, w| unsafe { w.bits(r.bits() | pins) });
}

/// Sets the pins in `pins` to the corresponding bits of `value`, leaving
/// every other pin on the port alone.
pub fn write(port: &Port, pins: u8, value: u8) {
    let pins = u32::from(pins);
    let value = u32::from(value) & pins;
    port.data.modify(|r, w| unsafe { w.bits((r.bits() & !pins) | value) });
}

pub fn read(port: &Port, pins: u8) -> u8 {
    (port.data.read().bits() & u32::from(pins)) as u8
}

/// Hands `pins` to the peripheral selected by `function` in the port control
/// register.
pub fn set_alternate(port: &Port, pins: u8, function: u8) {
    let mut mask = 0;
    let mut select = 0;
    for n in 0..8 {
        if pins & (1 << n) != 0 {
            mask |= 0xF << (4 * n);
            select |= u32::from(function & 0xF) << (4 * n);
        }
    }
    port.pctl.modify(|r, w| unsafe { w.bits((r.bits() & !mask) | select) });

    let pins = u32::from(pins);
    port.amsel.modify(|r, w| unsafe { w.bits(r.bits() & !pins) });
    port.afsel.modify(|r, w| unsafe { w.bits(r.bits() | pins) });
    port.den.modify(|r, w| unsafe { w.bits(r.bits() | pins) });
}

pub fn set_open_drain(port: &Port, pins: u8) {
    let pins = u32::from(pins);
    port.odr.modify(|r, w| unsafe { w.bits(r.bits() | pins) });
}

/// PB2 = I2C0SCL (push-pull; the controller drives it), PB3 = I2C0SDA (open
/// drain).
pub fn configure_i2c0_pins(portb: &Port) {
    set_alternate(portb, pin::P2 | pin::P3, PCTL_I2C);
    portb.odr.modify(|r, w| unsafe { w.bits(r.bits() & !u32::from(pin::P2)) });
    set_open_drain(portb, pin::P3);
}

/// PA0 = U0RX, PA1 = U0TX.
pub fn configure_uart0_pins(porta: &Port) {
    set_alternate(porta, pin::P0 | pin::P1, PCTL_UART);
}
