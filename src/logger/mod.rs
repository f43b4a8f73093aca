//! Log routing
//!
//! Backs the `log` facade with syslog, optionally echoing every record to
//! stderr through `env_logger` when running in the foreground.

use anyhow::{Context, Result};
use log::{Level, Log, Metadata, Record};
use std::ffi::{CStr, CString};

use crate::config::{Config, LogLevel};

/// syslog identity; must outlive every syslog call
static IDENT: &CStr = c"xplugd";

/// Map a `log` level to a syslog priority
pub fn priority(level: Level) -> i32 {
    match level {
        Level::Error => libc::LOG_ERR,
        Level::Warn => libc::LOG_WARNING,
        Level::Info => libc::LOG_INFO,
        Level::Debug | Level::Trace => libc::LOG_DEBUG,
    }
}

/// `log` backend writing to syslog and, optionally, stderr
pub struct SyslogLogger {
    level: LogLevel,
    console: Option<env_logger::Logger>,
}

impl SyslogLogger {
    pub fn new(level: LogLevel, console_echo: bool) -> Self {
        let console = console_echo.then(|| {
            env_logger::Builder::new()
                .filter_level(level.filter())
                .target(env_logger::Target::Stderr)
                .build()
        });
        Self { level, console }
    }
}

impl Log for SyslogLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.level.allows(priority(metadata.level()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let msg = record.args().to_string().replace('\0', "\\0");
        if let Ok(msg) = CString::new(msg) {
            unsafe { libc::syslog(priority(record.level()), c"%s".as_ptr(), msg.as_ptr()) };
        }

        if let Some(console) = &self.console {
            console.log(record);
        }
    }

    fn flush(&self) {
        if let Some(console) = &self.console {
            console.flush();
        }
    }
}

/// True if an error-level record would be echoed to stderr
fn echo_covers_errors(level: LogLevel, console_echo: bool) -> bool {
    console_echo && level.allows(priority(Level::Error))
}

/// True once [`init`] has installed a logger that already copies errors to
/// stderr, so callers need not print them again.
pub fn errors_reach_stderr(config: &Config) -> bool {
    log::log_enabled!(Level::Error) && echo_covers_errors(config.log_level, config.console_echo)
}

/// Open syslog and install the global logger (call once at startup)
pub fn init(config: &Config) -> Result<()> {
    unsafe {
        libc::openlog(IDENT.as_ptr(), libc::LOG_PID | libc::LOG_CONS, libc::LOG_USER);
    }

    log::set_boxed_logger(Box::new(SyslogLogger::new(
        config.log_level,
        config.console_echo,
    )))
    .context("Failed to install logger")?;
    log::set_max_level(config.log_level.filter());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(priority(Level::Error), libc::LOG_ERR);
        assert_eq!(priority(Level::Warn), libc::LOG_WARNING);
        assert_eq!(priority(Level::Info), libc::LOG_INFO);
        assert_eq!(priority(Level::Trace), libc::LOG_DEBUG);
    }

    #[test]
    fn test_enabled_follows_threshold() {
        let logger = SyslogLogger::new(LogLevel::UpTo(libc::LOG_NOTICE), false);
        let error = Metadata::builder().level(Level::Error).build();
        let info = Metadata::builder().level(Level::Info).build();
        assert!(logger.enabled(&error));
        assert!(!logger.enabled(&info));

        let silent = SyslogLogger::new(LogLevel::None, false);
        assert!(!silent.enabled(&error));
    }

    #[test]
    fn test_echo_covers_errors() {
        assert!(echo_covers_errors(LogLevel::UpTo(libc::LOG_NOTICE), true));
        assert!(echo_covers_errors(LogLevel::UpTo(libc::LOG_ERR), true));
        assert!(!echo_covers_errors(LogLevel::UpTo(libc::LOG_CRIT), true));
        assert!(!echo_covers_errors(LogLevel::None, true));
        assert!(!echo_covers_errors(LogLevel::UpTo(libc::LOG_DEBUG), false));
    }

    #[test]
    fn test_errors_not_on_stderr_before_init() {
        // startup failures before init must still be printed by the caller
        let config = Config {
            log_level: LogLevel::UpTo(libc::LOG_DEBUG),
            foreground: true,
            console_echo: true,
            script: "hook".into(),
        };
        assert!(!errors_reach_stderr(&config));
    }
}
