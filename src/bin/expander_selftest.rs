// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware-in-loop checks for the I2C master and the PCA9536 on the BTB
//! harness.
//!
//! This produces a binary that runs on the EK-TM4C123GXL with the harness
//! attached. It checks that:
//!
//! - the expander's configuration register reads back as all outputs after
//!   the configuration write,
//! - every pattern the exerciser drives (the four port-select patterns, the
//!   bring-up test pattern and the idle pattern) reads back from both the
//!   output register and the input register, i.e. the pins actually moved,
//! - the raw send/receive primitives agree with the driver, including a
//!   burst long enough to need a continue step, and refuse empty transfers,
//! - the fault indication lights red even when the LED port's clock has been
//!   gated off, as it is if a fault lands before bring-up.
//!
//! The test suite completes in a few milliseconds, leaving the LED in one of
//! the following states:
//!
//! ```text
//! LED      Interpretation
//! -----    --------------
//! off      tests not starting or hung in bring-up
//! blue     hung during test, stopped at a breakpoint?
//! green    TESTS PASSED
//! red      test failed (panic or fault)
//! ```
//!
//! Details of any failure are in the defmt log.

#![no_std]
#![no_main]

use core::sync::atomic::{compiler_fence, Ordering};

use btb::bsp::Bsp;
use btb::gpio::Ports;
use btb::i2c::{self, I2cMaster};
use btb::led::Color;
use btb::sysctl::{self, gpio_port};
use pca9536::{command, pin, Pca9536, Port, Register};

use defmt_rtt as _;

cfg_if::cfg_if! {
    if #[cfg(feature = "target-board-ek-tm4c123gxl")] {
        use btb::bsp::ek_tm4c123gxl::Board;
    }
}

use cortex_m_rt::{entry, exception, ExceptionFrame};

#[entry]
fn main() -> ! {
    let p = defmt::unwrap!(tm4c123x::Peripherals::take());

    let sysclk = defmt::unwrap!(sysctl::configure_clock(&p.SYSCTL));
    // And again, with the first lock's flag still latched. The second call
    // must wait out a fresh lock rather than sail through on the old one.
    defmt::assert!(p.SYSCTL.ris.read().bits() & sysctl::RIS_PLLLRIS != 0);
    defmt::assert_eq!(defmt::unwrap!(sysctl::configure_clock(&p.SYSCTL)), sysclk);
    let ports = Ports::new(
        &p.GPIO_PORTA,
        &p.GPIO_PORTB,
        &p.GPIO_PORTC,
        &p.GPIO_PORTD,
        &p.GPIO_PORTE,
        &p.GPIO_PORTF,
    );
    defmt::unwrap!(btb::bring_up::<Board>(&p.SYSCTL, &ports));

    // Signal that we've booted and are about to touch the bus.
    Board::show(&ports, Color::Blue);

    let mut master = I2cMaster::new(p.I2C0, sysclk);
    defmt::unwrap!(master.wait_idle());

    do_direction_tests(&mut master);
    do_pattern_tests(&mut master);
    do_primitive_tests(&mut master);
    do_fault_indication_tests(&p.SYSCTL, &ports);

    defmt::info!("all expander tests passed");
    Board::show(&ports, Color::Green);

    loop {
        cortex_m::asm::nop(); // tests passed! spin forever
    }
}

fn do_direction_tests(master: &mut I2cMaster) {
    let mut expander = Pca9536::new(master);

    // Start from the power-on state so we know the write did something.
    defmt::unwrap!(expander.set_direction(0));
    defmt::assert_eq!(defmt::unwrap!(expander.direction()), 0);

    defmt::unwrap!(expander.configure_all_outputs());
    defmt::assert_eq!(defmt::unwrap!(expander.direction()), pin::ALL);
    defmt::info!("direction: ok");
}

fn do_pattern_tests(master: &mut I2cMaster) {
    let mut expander = Pca9536::new(master);

    let mut patterns = [0u8; 6];
    for (slot, port) in patterns.iter_mut().zip(Port::ALL) {
        *slot = port.pattern();
    }
    patterns[4] = btb::TEST_PATTERN;
    patterns[5] = btb::IDLE_PATTERN;

    for pattern in patterns {
        defmt::unwrap!(expander.set_outputs(pattern));
        let driven = defmt::unwrap!(expander.outputs()) & pin::ALL;
        let seen = defmt::unwrap!(expander.inputs());
        defmt::assert_eq!(driven, pattern & pin::ALL, "output register");
        defmt::assert_eq!(seen, pattern & pin::ALL, "pin levels");
        defmt::info!("pattern {=u8:#x}: ok", pattern);
    }

    // Leave the pins released.
    defmt::unwrap!(expander.set_outputs(btb::IDLE_PATTERN));
}

fn do_primitive_tests(master: &mut I2cMaster) {
    let address = pca9536::ADDRESS;

    // One byte on its own is a single send. To the PCA9536 that's just a
    // register pointer update.
    defmt::unwrap!(master.send(address, &[Register::Output as u8]));

    // Two bytes is a burst start/finish.
    let p2 = Port::P2.pattern();
    defmt::unwrap!(master.send(address, &command(Register::Output, p2)));
    let value = defmt::unwrap!(master.receive(address, Register::Output as u8));
    defmt::assert_eq!(value & pin::ALL, p2);

    // Three bytes is start/continue/finish. The PCA9536 writes every data
    // byte to the addressed register, so the second one is what sticks.
    let p1 = Port::P1.pattern();
    let p3 = Port::P3.pattern();
    defmt::unwrap!(master.send(address, &[Register::Output as u8, p1, p3]));
    let value = defmt::unwrap!(master.receive(address, Register::Output as u8));
    defmt::assert_eq!(value & pin::ALL, p3);

    // A payload containing zero must go out whole.
    defmt::unwrap!(master.send(address, &command(Register::Output, 0x00)));
    let value = defmt::unwrap!(master.receive(address, Register::Output as u8));
    defmt::assert_eq!(value & pin::ALL, 0);

    // Nobody lives at the next address up; the controller has to report it
    // and leave the bus usable.
    defmt::assert_eq!(
        master.send(address + 1, &[0]),
        Err(i2c::Error::AddressNack)
    );

    // The controller has no way to put an empty write on the wire.
    defmt::assert_eq!(master.send(address, &[]), Err(i2c::Error::EmptyTransfer));

    let idle = command(Register::Output, btb::IDLE_PATTERN);
    defmt::unwrap!(master.send(address, &idle));
    defmt::info!("primitives: ok");
}

fn do_fault_indication_tests(sysctl: &tm4c123x::SYSCTL, ports: &Ports<'_>) {
    defmt::unwrap!(sysctl::disable_gpio(sysctl, gpio_port::F));

    Board::indicate_fault(sysctl, ports);

    defmt::assert_eq!(
        sysctl.prgpio.read().bits() & gpio_port::ALL,
        gpio_port::ALL,
        "ports clocked"
    );
    defmt::assert_eq!(Board::lit(ports), Color::Red.channels());
    defmt::info!("fault indication: ok");
}

#[panic_handler]
fn panic_handler(_: &core::panic::PanicInfo) -> ! {
    loop {
        cortex_m::asm::bkpt();
    }
}

#[exception]
unsafe fn HardFault(_ef: &ExceptionFrame) -> ! {
    // Safety: see the firmware's handler; nothing else is running.
    let p = unsafe { tm4c123x::Peripherals::steal() };
    let sysctl = &p.SYSCTL;
    let ports = unsafe { Ports::steal() };

    Board::indicate_fault(sysctl, &ports);

    loop {
        compiler_fence(Ordering::SeqCst);
    }
}
