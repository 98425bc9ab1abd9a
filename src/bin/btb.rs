// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The BTB expander exerciser.
//!
//! Brings the board up, turns every PCA9536 pin into an output, and then
//! cycles the four port-select patterns forever. Between patterns it samples
//! the fault input; if that's high, the LED flashes the colour of the port
//! that was selected (red, blue, purple, white for ports 1-4). Green means
//! "running, nothing to report".
//!
//! Any I2C error ends the current session: we log it, reset the controller
//! and start again from bring-up.

#![no_std]
#![no_main]

use core::convert::Infallible;
use core::sync::atomic::{compiler_fence, Ordering};

use btb::bsp::Bsp;
use btb::gpio::Ports;
use btb::i2c::{self, I2cMaster};
use btb::led::{self, Color};
use btb::sysctl;
use pca9536::{pin, Pca9536, Port};

use defmt_rtt as _;

// Select the appropriate BSP type as `Board`
cfg_if::cfg_if! {
    if #[cfg(feature = "target-board-ek-tm4c123gxl")] {
        use btb::bsp::ek_tm4c123gxl::Board;
    }
}

use cortex_m_rt::{entry, exception, ExceptionFrame};

/// Firmware entry point.
#[entry]
fn main() -> ! {
    // Safety: this is the only place we take the peripherals, and `entry`
    // makes it hard to call `main` twice. `steal` rather than `take` saves us
    // an unwrap that can't fail.
    let p = unsafe { tm4c123x::Peripherals::steal() };
    let cp = unsafe { cortex_m::Peripherals::steal() };

    defmt::info!("btb: starting");

    // The clock only needs setting once; everything downstream derives its
    // rates from it.
    let sysclk = match sysctl::configure_clock(&p.SYSCTL) {
        Ok(hz) => hz,
        Err(e) => {
            defmt::error!("clock bring-up failed: {}", e);
            panic!();
        }
    };
    let mut delay = cortex_m::delay::Delay::new(cp.SYST, sysclk);

    let ports = Ports::new(
        &p.GPIO_PORTA,
        &p.GPIO_PORTB,
        &p.GPIO_PORTC,
        &p.GPIO_PORTD,
        &p.GPIO_PORTE,
        &p.GPIO_PORTF,
    );

    let mut i2c0 = p.I2C0;
    let mut session = 0u32;
    loop {
        if let Err(e) = btb::bring_up::<Board>(&p.SYSCTL, &ports) {
            defmt::error!("peripheral bring-up failed: {}", e);
            panic!();
        }

        let mut master = I2cMaster::new(i2c0, sysclk);
        defmt::info!(
            "session {=u32}: bus up at {=u32} Hz",
            session,
            i2c::STANDARD_MODE_HZ
        );

        let error = match master.wait_idle() {
            Err(e) => e,
            Ok(()) => {
                let mut expander = Pca9536::new(&mut master);
                match run_session(&ports, &mut expander, &mut delay) {
                    Ok(never) => match never {},
                    Err(e) => e,
                }
            }
        };

        defmt::warn!("session {=u32} ended: {}", session, error);
        i2c0 = master.free();
        session = session.wrapping_add(1);
    }
}

/// Configures the expander and runs the port cycle. Only returns on error.
fn run_session(
    ports: &Ports<'_>,
    expander: &mut Pca9536<&mut I2cMaster>,
    delay: &mut cortex_m::delay::Delay,
) -> Result<Infallible, i2c::Error> {
    Board::show(ports, Color::Green);

    expander.configure_all_outputs()?;
    let outputs = expander.direction()?;
    if outputs == pin::ALL {
        defmt::info!("expander configured, all pins output");
    } else {
        // Not fatal; the part answered, so keep going and let the pattern
        // writes tell the story.
        defmt::warn!("expander direction reads {=u8:#x}", outputs);
    }

    let mut port = Port::P1;
    loop {
        Board::show(ports, Color::Green);

        let active = btb::active_pattern(port);
        defmt::debug!("port {}: driving {=u8:#x}", port.number(), active);
        expander.set_outputs(active)?;
        delay.delay_ms(btb::DWELL_MS);
        expander.set_outputs(btb::IDLE_PATTERN)?;

        if Board::fault_asserted(ports) {
            defmt::warn!("fault input high on port {}", port.number());
            led::flash_fault::<Board>(ports, delay, port);
            Board::show(ports, Color::Green);
        }

        port = port.next();
    }
}

#[panic_handler]
fn panic_handler(_: &core::panic::PanicInfo) -> ! {
    // We use a BKPT instruction to wake any attached debugger. If no debugger
    // is attached, BKPT escalates into a HardFault, falling to the handler
    // below. This way we can reuse its fault indication code.
    loop {
        cortex_m::asm::bkpt();
    }
}

#[exception]
unsafe fn HardFault(_ef: &ExceptionFrame) -> ! {
    // Safety: the SYSCTL and GPIO peripherals are static, and we're not
    // racing anyone by definition since we're handling a HardFault.
    let p = unsafe { tm4c123x::Peripherals::steal() };
    let sysctl = &p.SYSCTL;
    let ports = unsafe { Ports::steal() };

    Board::indicate_fault(sysctl, &ports);

    // Spin -- don't use BKPT here because if no debugger is attached it'll
    // escalate to another HardFault and lock the processor.
    loop {
        compiler_fence(Ordering::SeqCst);
    }
}
