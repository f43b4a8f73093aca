//! Asynchronous child reaping
//!
//! Scripts are never waited for synchronously. A SIGCHLD handler collects
//! every exited child so none linger as zombies.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// Install the SIGCHLD handler (call once at startup)
pub fn install() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(reap_children),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGCHLD, &action) }?;
    Ok(())
}

/// Only non-blocking waitpid calls here; errno is preserved for the
/// interrupted code.
extern "C" fn reap_children(_signo: libc::c_int) {
    let saved_errno = unsafe { *libc::__errno_location() };

    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }

    unsafe { *libc::__errno_location() = saved_errno };
}
