//! Asynchronous signal intake
//!
//! Handlers only record what arrived in atomics; the event loop drains them
//! between poll calls.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static CHILD_EXITED: AtomicBool = AtomicBool::new(false);
static RESIZED: AtomicBool = AtomicBool::new(false);
static FORWARD: AtomicI32 = AtomicI32::new(0);

/// Signals relayed to the focused session's process group
pub const FORWARDED: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT];

extern "C" fn on_child(_: c_int) {
    CHILD_EXITED.store(true, Ordering::SeqCst);
}

extern "C" fn on_resize(_: c_int) {
    RESIZED.store(true, Ordering::SeqCst);
}

extern "C" fn on_forward(signal: c_int) {
    FORWARD.store(signal, Ordering::SeqCst);
}

fn install(signal: Signal, handler: extern "C" fn(c_int), flags: SaFlags) -> nix::Result<()> {
    let action = SigAction::new(SigHandler::Handler(handler), flags, SigSet::empty());
    // SAFETY: the handlers only touch atomics
    unsafe { sigaction(signal, &action) }.map(|_| ())
}

/// Register handlers for child exit, window resize and the forwarded signals
pub fn install_handlers() -> nix::Result<()> {
    install(
        Signal::SIGCHLD,
        on_child,
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
    )?;
    install(Signal::SIGWINCH, on_resize, SaFlags::SA_RESTART)?;
    for signal in FORWARDED {
        install(signal, on_forward, SaFlags::SA_RESTART)?;
    }
    Ok(())
}

/// A child terminated since the last call
pub fn take_child_exited() -> bool {
    CHILD_EXITED.swap(false, Ordering::SeqCst)
}

/// The host window changed size since the last call
pub fn take_resized() -> bool {
    RESIZED.swap(false, Ordering::SeqCst)
}

/// The most recent signal waiting to be forwarded
pub fn take_forward() -> Option<Signal> {
    match FORWARD.swap(0, Ordering::SeqCst) {
        0 => None,
        raw => Signal::try_from(raw).ok(),
    }
}
