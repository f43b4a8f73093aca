//! Process management
//!
//! Privilege checks, daemonization, script dispatch and child reaping.

pub mod reaper;
pub mod spawn;

use nix::unistd::{geteuid, getuid, Uid};

pub use spawn::{Dispatch, DispatchError, DispatchRequest, ProcessDispatcher};

/// Refusal to run with elevated privileges
#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    #[error("may not run as root")]
    Root,
    #[error("real and effective user IDs differ ({real} != {effective})")]
    SetUid { real: Uid, effective: Uid },
}

/// Refuse to start as root or setuid: the script would inherit the privileges.
pub fn check_privileges() -> Result<(), PrivilegeError> {
    check_uids(getuid(), geteuid())
}

fn check_uids(real: Uid, effective: Uid) -> Result<(), PrivilegeError> {
    if real.is_root() {
        return Err(PrivilegeError::Root);
    }
    if real != effective {
        return Err(PrivilegeError::SetUid { real, effective });
    }
    Ok(())
}

/// Detach from the terminal and continue in a background process
pub fn daemonize() -> nix::Result<()> {
    nix::unistd::daemon(false, false)
}
