// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Vector tables, startup and the five interrupt handlers.
//!
//! Handlers end with a data-synchronization barrier (Cortex-M4 erratum
//! 838869: an overlapping exception-return store can vector incorrectly).

use core::ptr::{addr_of, addr_of_mut};
use cortexm4::support;
use cortexm4::unhandled_interrupt;
use imxrt117x::irq;

extern "C" {
    // Initial stack pointer, provided by the linker script. Declared as a
    // function so it can occupy the first vector slot.
    fn _estack();
}

#[link_section = ".vectors"]
#[used]
static BASE_VECTORS: [unsafe extern "C" fn(); 16] = [
    _estack,
    initialize_ram_jump_to_main, // Reset
    unhandled_interrupt,         // NMI
    unhandled_interrupt,         // HardFault
    unhandled_interrupt,         // MemManage
    unhandled_interrupt,         // BusFault
    unhandled_interrupt,         // UsageFault
    unhandled_interrupt,         // Reserved
    unhandled_interrupt,         // Reserved
    unhandled_interrupt,         // Reserved
    unhandled_interrupt,         // Reserved
    unhandled_interrupt,         // SVCall
    unhandled_interrupt,         // DebugMonitor
    unhandled_interrupt,         // Reserved
    unhandled_interrupt,         // PendSV
    systick_handler,             // SysTick
];

const NUM_IRQS: usize = 128;

#[link_section = ".irqs"]
#[used]
static IRQS: [unsafe extern "C" fn(); NUM_IRQS] = irq_table();

const fn irq_table() -> [unsafe extern "C" fn(); NUM_IRQS] {
    let mut table: [unsafe extern "C" fn(); NUM_IRQS] = [unhandled_interrupt; NUM_IRQS];
    table[irq::INTER_CORE as usize] = intercore_handler;
    table[irq::SNVS_HP_NON_TZ as usize] = supervisory_tick_handler;
    table[irq::GPIO13_COMBINED_0_31 as usize] = user_input_handler;
    table[irq::WDOG1 as usize] = hardware_watchdog_handler;
    table
}

/// Reset handler: establish the RAM image, then enter [`crate::main`],
/// which never returns.
#[no_mangle]
pub unsafe extern "C" fn initialize_ram_jump_to_main() {
    extern "C" {
        // Boundaries provided by the linker script.
        static mut _szero: u32;
        static mut _ezero: u32;
        static mut _srelocate: u32;
        static mut _erelocate: u32;
        static _etext: u32;
    }

    // Relocate .data from its load address behind .text.
    let mut src: *const u32 = addr_of!(_etext);
    let mut dst: *mut u32 = addr_of_mut!(_srelocate);
    while dst < addr_of_mut!(_erelocate) {
        dst.write_volatile(src.read());
        dst = dst.offset(1);
        src = src.offset(1);
    }

    // Zero .bss.
    let mut dst: *mut u32 = addr_of_mut!(_szero);
    while dst < addr_of_mut!(_ezero) {
        dst.write_volatile(0);
        dst = dst.offset(1);
    }

    crate::main()
}

/// SysTick: advance the debounce countdowns, then publish input changes.
unsafe extern "C" fn systick_handler() {
    if let Some(io13) = *addr_of!(crate::IO13) {
        io13.handle_tick();
    }
    if let Some(supervisor) = *addr_of!(crate::SUPERVISOR) {
        supervisor.handle_systick_isr();
    }
    support::dsb();
}

/// Shared secure-domain interrupt; only the periodic tick is unmasked.
unsafe extern "C" fn supervisory_tick_handler() {
    if let Some(snvs) = *addr_of!(crate::SNVS) {
        if snvs.is_periodic_tick_pending() {
            snvs.clear_periodic_tick();
            if let Some(supervisor) = *addr_of!(crate::SUPERVISOR) {
                supervisor.handle_tick_isr();
            }
        }
    }
    support::dsb();
}

/// Pin-change interrupt on the supervised bank.
unsafe extern "C" fn user_input_handler() {
    if let Some(io13) = *addr_of!(crate::IO13) {
        io13.handle_interrupt();
    }
    support::dsb();
}

/// Inter-core signal: run the RPC dispatcher.
unsafe extern "C" fn intercore_handler() {
    if let Some(server) = *addr_of!(crate::SERVER) {
        server.handle_intercore_interrupt();
    }
    support::dsb();
}

/// Hardware-watchdog pre-timeout: the code is no longer trusted. Persist
/// the recovery markers straight to the registers and reset; if even that
/// fails, the watchdog itself pulls the line half a second later.
unsafe extern "C" fn hardware_watchdog_handler() {
    if let Some(supervisor) = *addr_of!(crate::SUPERVISOR) {
        supervisor.handle_hardware_watchdog_isr();
    }
    loop {
        support::nop();
    }
}
