//! xplugd - run a script when monitors are plugged or unplugged
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              Event Loop                  │
//! ├──────────────────────────────────────────┤
//! │  X server (RandR)  →  Normalizer         │
//! │                          ↓               │
//! │                     Dedup Filter         │
//! │                          ↓               │
//! │         Dispatcher (fork + exec script)  │
//! └──────────────────────────────────────────┘
//! ```

mod config;
mod constants;
mod display;
mod hotplug;
mod logger;
mod process;

use anyhow::{Context, Result};
use log::{error, info};
use std::process::ExitCode;

use config::{Command, Config, Usage};
use constants::PROGRAM_NAME;
use display::{DisplayServer, X11Display};
use hotplug::EventLoop;
use process::ProcessDispatcher;

fn main() -> ExitCode {
    let config = match Config::from_args(std::env::args_os().skip(1)) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            print!("{}", Usage);
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("{}", config::version());
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}: {}", PROGRAM_NAME, e);
            print!("{}", Usage);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = process::check_privileges() {
        eprintln!("{}: {}", PROGRAM_NAME, e);
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if !logger::errors_reach_stderr(&config) {
                eprintln!("{}: {:#}", PROGRAM_NAME, e);
            }
            ExitCode::FAILURE
        }
    }
}

/// Startup sequence and event loop. Only returns on error.
fn run(config: &Config) -> Result<()> {
    let display = X11Display::open(None).context("Cannot open display")?;

    if !config.foreground {
        process::daemonize().context("Failed to fork to background")?;
    }

    logger::init(config)?;
    process::reaper::install().context("Failed to install SIGCHLD handler")?;

    display
        .subscribe()
        .context("Cannot subscribe to output change notifications")?;

    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]);
    info!(
        "{} {} started, calling {}",
        PROGRAM_NAME,
        config::version(),
        config.script.display()
    );

    let dispatcher = ProcessDispatcher::new(display.raw_fd());
    let mut event_loop = EventLoop::new(display, dispatcher, &config.script);

    // Only a broken connection ends the loop; there is no recovery from it
    Err(event_loop.run()).context("Event loop stopped")
}
