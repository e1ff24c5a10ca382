// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Supervisory-core firmware for the dual-core motor-control gateway.
//!
//! This core enforces that the application core stays authorized to run
//! (authenticated watchdog), offers functional watchdogs, persists critical
//! state across resets and serves the fixed RPC set over shared memory. The
//! application core boots only after this core publishes its ready flag.

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std)]
#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_main)]

pub mod config;
mod hal;
mod io;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod interrupts;

use capsules_resilience::rpc::server::RpcServer;
use capsules_resilience::rpc::shm::{AwdgHandoff, RpcSharedMemory};
use capsules_resilience::supervisor::Supervisor;
use imxrt117x::gpio::SupervisedIo;
use imxrt117x::intercore::InterCore;
use imxrt117x::snvs::Snvs;

type BoardSupervisor = Supervisor<'static, hal::Cm4Hal, { config::FWDG_COUNT }>;
type BoardServer = RpcServer<'static, BoardSupervisor, InterCore>;

/// The RPC region shared with the application core. The section is no-init
/// and non-cacheable; [`RpcSharedMemory::reset_to_initial`] runs before the
/// peer is released.
#[cfg_attr(
    all(target_arch = "arm", target_os = "none"),
    link_section = ".rpc_shm"
)]
static RPC_SHM: RpcSharedMemory = RpcSharedMemory::new();

/// The bootloader's one-shot handoff: seed, public key, ready flag. The
/// section is no-init — the bootloader wrote it before this core came up.
#[cfg_attr(
    all(target_arch = "arm", target_os = "none"),
    link_section = ".awdg_handoff"
)]
static AWDG_HANDOFF: AwdgHandoff = AwdgHandoff::new();

// Interrupt handlers reach the long-lived objects through these.
static mut SUPERVISOR: Option<&'static BoardSupervisor> = None;
static mut SERVER: Option<&'static BoardServer> = None;
static mut IO13: Option<&'static SupervisedIo> = None;
static mut SNVS: Option<&'static Snvs> = None;

/// Persist the recovery markers without any initialized infrastructure and
/// reset. The fallback for failures before or during [`main`]'s init.
#[cfg(all(target_arch = "arm", target_os = "none"))]
unsafe fn recovery_bailout(snvs: &Snvs) -> ! {
    use capsules_resilience::reset::ResetCause;
    use capsules_resilience::snvs_mirror::fwu;
    use kernel::hil::backup::BackupRegisters;

    snvs.set_fwu_status(snvs.fwu_status() | fwu::AWDT_EXPIRED);
    snvs.set_reset_cause(ResetCause::SecureWd.into());
    snvs.set_wd_timer_backup(0);
    snvs.set_wd_status(0);
    let _ = snvs.wd_status();
    cortexm4::scb::reset();
    loop {
        cortexm4::support::nop();
    }
}

/// Order pending interrupts without allowing preemption: hardware-watchdog
/// pre-timeout first, then the supervisory tick, the input edges, systick
/// and last the inter-core signal (it polls the peer and must never block
/// anything).
#[cfg(all(target_arch = "arm", target_os = "none"))]
unsafe fn configure_interrupts() {
    use cortexm4::nvic::Nvic;
    use cortexm4::scb;
    use imxrt117x::irq;

    // All priority bits become subpriority bits: no interrupt nesting,
    // which the whole shared-state reasoning depends on.
    scb::set_priority_grouping(7);

    let hardware_watchdog = Nvic::new(irq::WDOG1);
    hardware_watchdog.set_priority(0x00);
    let supervisory_tick = Nvic::new(irq::SNVS_HP_NON_TZ);
    supervisory_tick.set_priority(0x10);
    let user_inputs = Nvic::new(irq::GPIO13_COMBINED_0_31);
    user_inputs.set_priority(0x20);
    scb::set_systick_priority(0x30);
    let inter_core = Nvic::new(irq::INTER_CORE);
    inter_core.set_priority(0x40);

    hardware_watchdog.enable();
    supervisory_tick.enable();
    user_inputs.enable();
    inter_core.enable();
}

/// Firmware entry, reached from the reset handler with all NVIC lines
/// masked.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub unsafe fn main() -> ! {
    use core::ptr::addr_of_mut;
    use core::sync::atomic::Ordering;
    use capsules_resilience::rpc::shm::{SECWD_MAX_PK_SIZE, SECWD_MAX_SEED_SIZE};
    use cortexm4::support;
    use imxrt117x::tempmon::Tempmon;
    use imxrt117x::wdog::Wdog;
    use kernel::hil::watchdog::HardwareWatchdog;
    use kernel::static_init;
    use zeroize::Zeroize;

    kernel::debug::set_writer(&mut *addr_of_mut!(io::WRITER));

    // The hardware watchdog runs from here on; everything below must reach
    // the kick loop within its first timeout.
    let wdog: &'static Wdog = static_init!(
        Wdog,
        Wdog::new(config::HW_WDG_TIMEOUT, config::HW_WDG_PRETIMEOUT)
    );
    wdog.start();

    let snvs: &'static Snvs = static_init!(Snvs, Snvs::new());
    snvs.init_srtc();
    snvs.init_periodic_tick(config::TICK_FREQUENCY_EXP);
    *addr_of_mut!(SNVS) = Some(snvs);

    let io13: &'static SupervisedIo =
        static_init!(SupervisedIo, SupervisedIo::new(config::DEBOUNCE_RELOAD));
    io13.init(config::INITIAL_OUTPUTS);
    *addr_of_mut!(IO13) = Some(io13);

    let tempmon: &'static Tempmon = static_init!(Tempmon, Tempmon::new());
    tempmon.init();

    let intercore: &'static InterCore = static_init!(InterCore, InterCore::new());

    RPC_SHM.reset_to_initial();

    let board_hal: &'static hal::Cm4Hal =
        static_init!(hal::Cm4Hal, hal::Cm4Hal::new(snvs, io13, wdog, tempmon));

    let supervisor: &'static BoardSupervisor =
        match Supervisor::new(board_hal, config::supervisor_config()) {
            Ok(supervisor) => static_init!(BoardSupervisor, supervisor),
            // Only reachable on configuration errors the const checks
            // missed.
            Err(_) => recovery_bailout(snvs),
        };
    let server: &'static BoardServer = static_init!(
        BoardServer,
        RpcServer::new(&RPC_SHM, supervisor, intercore)
    );
    supervisor.set_event_sink(server);
    *addr_of_mut!(SUPERVISOR) = Some(supervisor);
    *addr_of_mut!(SERVER) = Some(server);

    // Consume the bootloader's one-shot secrets, then scrub every copy.
    let mut seed = [0u8; SECWD_MAX_SEED_SIZE];
    let seed_len = AWDG_HANDOFF.read_seed(&mut seed);
    let mut public_key = [0u8; SECWD_MAX_PK_SIZE];
    let public_key_len = AWDG_HANDOFF.read_public_key(&mut public_key);

    let init_result = supervisor.init(&seed[..seed_len], &public_key[..public_key_len]);

    seed.zeroize();
    public_key.zeroize();
    AWDG_HANDOFF.clear_secrets();

    if init_result.is_err() {
        kernel::debug!("supervisor init failed, forcing recovery boot");
        recovery_bailout(snvs);
    }

    // From here the peer can talk to us.
    configure_interrupts();
    AWDG_HANDOFF.ready.store(1, Ordering::Release);

    support::enter_critical();
    supervisor.publish_initial_inputs();
    support::exit_critical();

    // Debouncing starts being serviced immediately after this.
    if cortexm4::systick::start_periodic(config::CORE_CLOCK_HZ, config::SYSTICK_PERIOD_MS)
        .is_err()
    {
        recovery_bailout(snvs);
    }

    kernel::debug!("gateway supervisory core up");

    // The main loop flushes mirror changes to the slow persistent
    // registers and runs the seconds-long ticket verifications the RPC
    // dispatcher parked.
    loop {
        supervisor.sync_state_main();
        if let Some(result) = server.process_pending_secure_watchdog() {
            support::enter_critical();
            server.finish_secure_watchdog(result);
            support::exit_critical();
        }
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn main() {}
