//! Output hotplug handling
//!
//! The event loop blocks on the display server, resolves each notification,
//! drops duplicates and hands the rest to the dispatcher. Processing is
//! strictly sequential: notification N is fully handled before N+1 is read.

pub mod dedup;
pub mod normalize;

use log::{error, log_enabled, Level};
use std::path::{Path, PathBuf};

use dedup::DedupFilter;

use crate::display::{DisplayError, DisplayServer, OutputNotification};
use crate::process::{Dispatch, DispatchRequest};

/// Outcome of processing one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Dispatched,
    Duplicate,
    Discarded,
    /// Spawn failed in the parent; logged and ignored
    DispatchFailed,
}

/// Orchestrator: Normalizer -> Dedup Filter -> Dispatcher
pub struct EventLoop<D, S> {
    display: D,
    dispatcher: S,
    script: PathBuf,
    dedup: DedupFilter,
    /// Debug diagnostics wanted; fixed when the loop is built
    verbose: bool,
}

impl<D: DisplayServer, S: Dispatch> EventLoop<D, S> {
    pub fn new(display: D, dispatcher: S, script: &Path) -> Self {
        Self {
            display,
            dispatcher,
            script: script.to_path_buf(),
            dedup: DedupFilter::new(),
            verbose: log_enabled!(Level::Debug),
        }
    }

    /// Run until the display connection fails.
    ///
    /// Only returns on a fatal error; the caller is expected to exit.
    pub fn run(&mut self) -> DisplayError {
        loop {
            let result = self
                .display
                .next_event()
                .and_then(|notification| self.process(&notification));
            if let Err(e) = result {
                return e;
            }
        }
    }

    /// Handle a single notification
    pub fn process(&mut self, notification: &OutputNotification) -> Result<Outcome, DisplayError> {
        let Some(event) = normalize::normalize(&self.display, notification)? else {
            return Ok(Outcome::Discarded);
        };

        if !self
            .dedup
            .should_dispatch(&event.signature, event.output.timestamp)
        {
            return Ok(Outcome::Duplicate);
        }

        normalize::log_details(&self.display, &event, self.verbose)?;

        let request = DispatchRequest::new(&self.script, &event.output.name, event.output.connection);
        match self.dispatcher.dispatch(&request) {
            Ok(()) => Ok(Outcome::Dispatched),
            Err(e) => {
                error!("Failed calling {}: {}", self.script.display(), e);
                Ok(Outcome::DispatchFailed)
            }
        }
    }

    #[cfg(test)]
    pub fn dedup(&self) -> &DedupFilter {
        &self.dedup
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &S {
        &self.dispatcher
    }
}
