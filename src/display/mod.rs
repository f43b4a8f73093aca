//! Display server connection
//!
//! Abstracts the RandR query/event surface the daemon needs behind
//! [`DisplayServer`] so the event loop can be driven by the real X server
//! or by an in-memory fake in tests.

pub mod x11;

use std::fmt;
use std::os::unix::io::RawFd;

pub use x11::X11Display;

/// Display connection errors
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// Transport broke; the connection cannot be recovered
    #[error("display connection lost: {0}")]
    ConnectionLost(String),
    /// A single request was rejected by the server
    #[error("request failed: {0}")]
    Request(String),
    /// Server lacks a required extension or version
    #[error("unsupported display server: {0}")]
    Unsupported(String),
}

impl DisplayError {
    /// Returns true if the error leaves the connection unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Unsupported(_))
    }
}

/// Output connection state as reported by RandR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Unknown,
}

impl ConnectionState {
    /// Map a raw protocol value. Anything outside the known states is `Unknown`.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::Connected,
            1 => Self::Disconnected,
            _ => Self::Unknown,
        }
    }

    /// Word handed to the script and used in the event signature
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output-change notification, before any queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputNotification {
    /// Window the notification was selected on (the root window)
    pub window: u32,
    /// RandR output id
    pub output: u32,
    /// Server timestamp of the change
    pub timestamp: u32,
}

/// Snapshot of the screen topology ("screen resources")
///
/// Owned reply data; dropping it releases the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenResources {
    /// Configuration timestamp subsequent queries are validated against
    pub config_timestamp: u32,
}

/// Attributes of one output at the moment of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub name: String,
    pub connection: ConnectionState,
    /// Physical size in millimeters, if the output reports one
    pub mm_size: Option<(u32, u32)>,
    /// Active CRTC driving the output
    pub crtc: Option<u32>,
    pub timestamp: u32,
}

/// Pixel geometry of a CRTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

/// Query and event surface of the display server
pub trait DisplayServer {
    /// Block until the next output-change notification.
    ///
    /// No timeout. Returns `ConnectionLost` if the transport breaks.
    fn next_event(&mut self) -> Result<OutputNotification, DisplayError>;

    /// Fetch the current output topology
    fn screen_resources(&self, window: u32) -> Result<ScreenResources, DisplayError>;

    /// Fetch one output's descriptor
    fn output_info(
        &self,
        resources: &ScreenResources,
        output: u32,
    ) -> Result<OutputDescriptor, DisplayError>;

    /// Fetch the pixel geometry of a CRTC
    fn crtc_geometry(
        &self,
        resources: &ScreenResources,
        crtc: u32,
    ) -> Result<Geometry, DisplayError>;

    /// Socket descriptor of the connection, closed in spawned children
    fn raw_fd(&self) -> Option<RawFd>;
}
