//! Duplicate notification suppression
//!
//! The X server often emits several output-change notifications for a single
//! physical plug or unplug. Only the first one for a given
//! `(output name, state)` pair is dispatched.

use log::debug;
use std::fmt;

use crate::constants::SIGNATURE_MAX_LEN;
use crate::display::ConnectionState;

/// Canonical `"<name> <state>"` identity of an event, bounded in length.
///
/// Over-long names are truncated at a character boundary so that the
/// rendered signature never exceeds [`SIGNATURE_MAX_LEN`] bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn new(name: &str, state: ConnectionState) -> Self {
        let mut text = format!("{} {}", name, state);
        if text.len() > SIGNATURE_MAX_LEN {
            let mut end = SIGNATURE_MAX_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-slot cache of the last dispatched signature
///
/// Not synchronized: owned by the single-threaded event loop.
#[derive(Debug, Default)]
pub struct DedupFilter {
    last: Option<Signature>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `signature` equals the last dispatched one.
    /// Otherwise records it and returns true.
    pub fn should_dispatch(&mut self, signature: &Signature, timestamp: u32) -> bool {
        if self.last.as_ref() == Some(signature) {
            debug!(
                "Same message as last time, time {}, skipping ...",
                timestamp
            );
            return false;
        }
        self.last = Some(signature.clone());
        true
    }

    /// Last dispatched signature, if any
    #[cfg(test)]
    pub fn last(&self) -> Option<&Signature> {
        self.last.as_ref()
    }
}
