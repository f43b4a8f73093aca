//! Daemon configuration
//!
//! Built once from the command line and read-only afterwards.
//! Option handling follows getopt conventions: grouped short flags,
//! `-l` value attached or separate, options before or after SCRIPT,
//! and `--` to end option parsing.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::constants::{DEFAULT_LOG_PRIORITY, PROGRAM_NAME};

/// syslog priority names accepted by `-l`
const PRIORITY_NAMES: &[(&str, i32)] = &[
    ("emerg", libc::LOG_EMERG),
    ("panic", libc::LOG_EMERG),
    ("alert", libc::LOG_ALERT),
    ("crit", libc::LOG_CRIT),
    ("err", libc::LOG_ERR),
    ("error", libc::LOG_ERR),
    ("warn", libc::LOG_WARNING),
    ("warning", libc::LOG_WARNING),
    ("notice", libc::LOG_NOTICE),
    ("info", libc::LOG_INFO),
    ("debug", libc::LOG_DEBUG),
];

/// Log verbosity: a syslog priority threshold, or logging disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    None,
    UpTo(i32),
}

impl LogLevel {
    /// Parse a priority name or a raw numeric level
    pub fn parse(s: &str) -> Option<Self> {
        if s == "none" {
            return Some(Self::None);
        }
        if let Some(&(_, prio)) = PRIORITY_NAMES.iter().find(|(name, _)| *name == s) {
            return Some(Self::UpTo(prio));
        }
        let n: i32 = s.parse().ok()?;
        Some(if n < 0 {
            Self::None
        } else {
            Self::UpTo(n.min(libc::LOG_DEBUG))
        })
    }

    /// Returns true if messages of syslog `priority` pass the threshold
    pub fn allows(self, priority: i32) -> bool {
        match self {
            Self::None => false,
            Self::UpTo(max) => priority <= max,
        }
    }

    /// Corresponding `log` crate filter
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::None => log::LevelFilter::Off,
            Self::UpTo(p) if p >= libc::LOG_DEBUG => log::LevelFilter::Debug,
            Self::UpTo(p) if p >= libc::LOG_INFO => log::LevelFilter::Info,
            Self::UpTo(p) if p >= libc::LOG_WARNING => log::LevelFilter::Warn,
            Self::UpTo(p) if p >= libc::LOG_ERR => log::LevelFilter::Error,
            Self::UpTo(_) => log::LevelFilter::Off,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::UpTo(DEFAULT_LOG_PRIORITY)
    }
}

/// Command-line errors; all exit with status 1 after printing usage
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("invalid option -- '{0}'")]
    UnknownOption(char),
    #[error("option requires an argument -- '{0}'")]
    MissingValue(char),
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("missing script argument")]
    MissingScript,
}

/// Immutable daemon settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Stay attached to the terminal instead of daemonizing
    pub foreground: bool,
    /// Echo log lines to stderr in addition to syslog
    pub console_echo: bool,
    /// Script run on every output change
    pub script: PathBuf,
}

/// What the command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Config),
    Help,
    Version,
}

impl Config {
    /// Parse `args` (without the program name).
    ///
    /// Arguments are taken as `OsString` so a script path that is not valid
    /// UTF-8 reaches `execv` unchanged.
    pub fn from_args<I, S>(args: I) -> Result<Command, UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut log_level = LogLevel::default();
        let mut foreground = false;
        // -n increments, -s decrements; echo when positive
        let mut console: i32 = 0;
        let mut positional: Vec<OsString> = Vec::new();
        let mut options_done = false;

        while let Some(arg) = args.next() {
            let bytes = arg.as_bytes();
            if options_done || bytes == b"-" || !bytes.starts_with(b"-") {
                positional.push(arg);
                continue;
            }
            if bytes == b"--" {
                options_done = true;
                continue;
            }

            let flags = &bytes[1..];
            for (i, &flag) in flags.iter().enumerate() {
                match flag {
                    b'h' => return Ok(Command::Help),
                    b'v' => return Ok(Command::Version),
                    b'n' => {
                        foreground = true;
                        console += 1;
                    }
                    b's' => console -= 1,
                    b'l' => {
                        let rest = &flags[i + 1..];
                        let value = if rest.is_empty() {
                            args.next().ok_or(UsageError::MissingValue('l'))?
                        } else {
                            OsStr::from_bytes(rest).to_os_string()
                        };
                        log_level = value
                            .to_str()
                            .and_then(LogLevel::parse)
                            .ok_or_else(|| {
                                UsageError::InvalidLevel(value.to_string_lossy().into_owned())
                            })?;
                        break;
                    }
                    other => return Err(UsageError::UnknownOption(char::from(other))),
                }
            }
        }

        let script = positional
            .into_iter()
            .next()
            .map(PathBuf::from)
            .ok_or(UsageError::MissingScript)?;

        Ok(Command::Run(Config {
            log_level,
            foreground,
            console_echo: console > 0,
            script,
        }))
    }
}

/// Usage text printed for `-h` and on command-line errors
pub struct Usage;

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Usage: {} [OPTIONS] script

Options:
  -h        Print this help text and exit
  -l LEVEL  Set log level: none, err, info, notice*, debug
  -n        Run in foreground, do not fork to background
  -s        Use syslog, even if running in foreground, default w/o -n
  -v        Show program version

The script is called as: script display NAME connected|disconnected|unknown
"#,
            PROGRAM_NAME
        )
    }
}

/// Version string printed for `-v`
pub fn version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Config {
        match Config::from_args(args.iter().copied()) {
            Ok(Command::Run(cfg)) => cfg,
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = run(&["/usr/bin/hook"]);
        assert_eq!(cfg.script, PathBuf::from("/usr/bin/hook"));
        assert_eq!(cfg.log_level, LogLevel::UpTo(libc::LOG_NOTICE));
        assert!(!cfg.foreground);
        assert!(!cfg.console_echo);
    }

    #[test]
    fn test_foreground_enables_echo() {
        let cfg = run(&["-n", "hook"]);
        assert!(cfg.foreground);
        assert!(cfg.console_echo);
    }

    #[test]
    fn test_syslog_only_in_foreground() {
        let cfg = run(&["-ns", "hook"]);
        assert!(cfg.foreground);
        assert!(!cfg.console_echo);

        let cfg = run(&["-s", "-n", "hook"]);
        assert!(!cfg.console_echo);
    }

    #[test]
    fn test_level_forms() {
        assert_eq!(run(&["-l", "debug", "x"]).log_level, LogLevel::UpTo(libc::LOG_DEBUG));
        assert_eq!(run(&["-lerr", "x"]).log_level, LogLevel::UpTo(libc::LOG_ERR));
        assert_eq!(run(&["-nl", "info", "x"]).log_level, LogLevel::UpTo(libc::LOG_INFO));
        assert_eq!(run(&["-l", "none", "x"]).log_level, LogLevel::None);
        assert_eq!(run(&["-l", "6", "x"]).log_level, LogLevel::UpTo(6));
        assert_eq!(run(&["-l", "99", "x"]).log_level, LogLevel::UpTo(libc::LOG_DEBUG));
    }

    #[test]
    fn test_options_after_script() {
        let cfg = run(&["hook", "-n", "extra"]);
        assert!(cfg.foreground);
        assert_eq!(cfg.script, PathBuf::from("hook"));
    }

    #[test]
    fn test_double_dash_ends_options() {
        let cfg = run(&["--", "-weird-name"]);
        assert_eq!(cfg.script, PathBuf::from("-weird-name"));
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(Config::from_args(["-h"]), Ok(Command::Help));
        assert_eq!(Config::from_args(["-v", "hook"]), Ok(Command::Version));
    }

    #[test]
    fn test_usage_errors() {
        assert_eq!(Config::from_args(Vec::<String>::new()), Err(UsageError::MissingScript));
        assert_eq!(Config::from_args(["-x", "hook"]), Err(UsageError::UnknownOption('x')));
        assert_eq!(Config::from_args(["hook", "-l"]), Err(UsageError::MissingValue('l')));
        assert_eq!(
            Config::from_args(["-l", "loud", "hook"]),
            Err(UsageError::InvalidLevel("loud".into()))
        );
    }

    #[test]
    fn test_non_utf8_script_path() {
        use std::os::unix::ffi::OsStringExt;

        let script = OsString::from_vec(b"/tmp/hook\xe9".to_vec());
        let cmd = Config::from_args([OsString::from("-n"), script.clone()]);
        match cmd {
            Ok(Command::Run(cfg)) => {
                assert!(cfg.foreground);
                assert_eq!(cfg.script.as_os_str().as_bytes(), b"/tmp/hook\xe9");
            }
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_level_rejected() {
        use std::os::unix::ffi::OsStringExt;

        let level = OsString::from_vec(b"deb\xffug".to_vec());
        let cmd = Config::from_args([OsString::from("-l"), level, OsString::from("hook")]);
        assert!(matches!(cmd, Err(UsageError::InvalidLevel(_))));
    }

    #[test]
    fn test_level_filter_mapping() {
        assert!(LogLevel::UpTo(libc::LOG_NOTICE).allows(libc::LOG_ERR));
        assert!(!LogLevel::UpTo(libc::LOG_NOTICE).allows(libc::LOG_INFO));
        assert!(!LogLevel::None.allows(libc::LOG_EMERG));
        assert_eq!(LogLevel::UpTo(libc::LOG_NOTICE).filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::UpTo(libc::LOG_DEBUG).filter(), log::LevelFilter::Debug);
        assert_eq!(LogLevel::None.filter(), log::LevelFilter::Off);
    }
}
