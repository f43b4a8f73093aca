//! Detached script execution
//!
//! Forks a child that leaves the daemon's session, drops its copy of the
//! display socket and replaces itself with the user script. The child never
//! returns into daemon code: it either becomes the script or exits.

use log::{debug, error};
use nix::unistd::{close, execv, fork, setsid, ForkResult, Pid};
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use crate::constants::{SCRIPT_ARGC, SCRIPT_TAG};
use crate::display::ConnectionState;

/// Parent-side dispatch failures
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("argument contains a NUL byte: {0:?}")]
    NulByte(String),
    #[error("fork failed: {0}")]
    Fork(#[from] nix::Error),
}

/// Arguments for one script invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    script: PathBuf,
    output: String,
    state: ConnectionState,
}

impl DispatchRequest {
    pub fn new(script: &Path, output: &str, state: ConnectionState) -> Self {
        Self {
            script: script.to_path_buf(),
            output: output.to_string(),
            state,
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// `[script, "display", output, state]`
    pub fn args(&self) -> [&OsStr; SCRIPT_ARGC] {
        [
            self.script.as_os_str(),
            OsStr::new(SCRIPT_TAG),
            OsStr::new(&self.output),
            OsStr::new(self.state.as_str()),
        ]
    }

    /// Convert to exec argv. Done before forking so the child allocates nothing.
    pub fn to_argv(&self) -> Result<[CString; SCRIPT_ARGC], DispatchError> {
        let [a, b, c, d] = self.args().map(|arg| {
            CString::new(arg.as_bytes())
                .map_err(|_| DispatchError::NulByte(arg.to_string_lossy().into_owned()))
        });
        Ok([a?, b?, c?, d?])
    }
}

/// Hands a request off to an independent process
pub trait Dispatch {
    fn dispatch(&mut self, request: &DispatchRequest) -> Result<(), DispatchError>;
}

/// Dispatcher that forks and execs the script
pub struct ProcessDispatcher {
    /// Display socket to close in the child
    display_fd: Option<RawFd>,
}

impl ProcessDispatcher {
    pub fn new(display_fd: Option<RawFd>) -> Self {
        Self { display_fd }
    }
}

impl Dispatch for ProcessDispatcher {
    fn dispatch(&mut self, request: &DispatchRequest) -> Result<(), DispatchError> {
        spawn_detached(request, self.display_fd).map(|_| ())
    }
}

/// Fork and exec `request` without waiting for it.
///
/// Returns the child's pid. The child is reaped asynchronously by the
/// SIGCHLD handler (see [`super::reaper`]).
pub fn spawn_detached(request: &DispatchRequest, close_fd: Option<RawFd>) -> Result<Pid, DispatchError> {
    let argv = request.to_argv()?;

    debug!("Calling {} ...", request.script().display());

    // The daemon is single-threaded, so the child may safely run Rust code
    // until exec.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            debug!("Spawned pid {} for {:?}", child, request.args());
            Ok(child)
        }
        ForkResult::Child => exec_script(&argv, close_fd),
    }
}

/// Child side: detach, drop the display socket, become the script
fn exec_script(argv: &[CString; SCRIPT_ARGC], close_fd: Option<RawFd>) -> ! {
    let _ = setsid();
    if let Some(fd) = close_fd {
        let _ = close(fd);
    }

    let err = match execv(&argv[0], argv) {
        Ok(infallible) => match infallible {},
        Err(e) => e,
    };
    error!("Failed calling {}: {}", argv[0].to_string_lossy(), err);
    unsafe { libc::_exit(0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::reaper;
    use nix::sys::wait::{waitpid, WaitStatus};
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    #[test]
    fn test_args_order() {
        let req = DispatchRequest::new(
            Path::new("/usr/libexec/on-plug"),
            "HDMI-1",
            ConnectionState::Connected,
        );
        let args: Vec<_> = req.args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["/usr/libexec/on-plug", "display", "HDMI-1", "connected"]);
    }

    #[test]
    fn test_args_for_every_state() {
        for state in [
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Unknown,
        ] {
            let req = DispatchRequest::new(Path::new("s"), "DP-2", state);
            let argv = req.to_argv().unwrap();
            assert_eq!(argv.len(), SCRIPT_ARGC);
            assert_eq!(argv[1].to_str().unwrap(), "display");
            assert_eq!(argv[3].to_str().unwrap(), state.as_str());
        }
    }

    #[test]
    fn test_nul_in_output_name_rejected() {
        let req = DispatchRequest::new(Path::new("s"), "bad\0name", ConnectionState::Connected);
        assert!(matches!(req.to_argv(), Err(DispatchError::NulByte(_))));
    }

    /// Forking tests run sequentially in one test so no other test thread
    /// execs a script while one is still open for writing.
    #[test]
    fn test_spawn_and_reap() {
        let dir = std::env::temp_dir().join(format!("xplugd-spawn-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("args.txt");
        let script = dir.join("hook.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > {}\n", out.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // exec failure: child exits 0 instead of running daemon code
        let missing = DispatchRequest::new(
            &dir.join("does-not-exist"),
            "HDMI-1",
            ConnectionState::Connected,
        );
        let pid = spawn_detached(&missing, None).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 0));

        // a later dispatch still works
        let req = DispatchRequest::new(&script, "HDMI-1", ConnectionState::Disconnected);
        let pid = spawn_detached(&req, None).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 0));
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written.trim(), "display HDMI-1 disconnected");

        // with the SIGCHLD handler installed, finished children vanish
        // from the process table without an explicit wait
        reaper::install().unwrap();
        let pid = spawn_detached(&req, None).unwrap();
        let proc_entry = format!("/proc/{}", pid);
        let deadline = Instant::now() + Duration::from_secs(5);
        while Path::new(&proc_entry).exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!Path::new(&proc_entry).exists(), "child {} was not reaped", pid);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
