//! X11 RandR backend
//!
//! Opens the X connection with x11rb, selects output-change notifications
//! on the default root window and answers topology queries.

use log::{debug, info};
use std::os::unix::io::{AsRawFd, RawFd};
use x11rb::connection::{Connection, RequestConnection as _};
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::{
    ConnectionState, DisplayError, DisplayServer, Geometry, OutputDescriptor, OutputNotification,
    ScreenResources,
};
use crate::constants::{RANDR_MAJOR, RANDR_MINOR};

impl From<ConnectionError> for DisplayError {
    fn from(e: ConnectionError) -> Self {
        DisplayError::ConnectionLost(e.to_string())
    }
}

impl From<ReplyError> for DisplayError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => DisplayError::Request(format!("{:?}", e.error_kind)),
        }
    }
}

/// Live connection to an X server
pub struct X11Display {
    conn: RustConnection,
    root: u32,
}

impl X11Display {
    /// Connect to the display named by `name`, or `$DISPLAY` if `None`
    pub fn open(name: Option<&str>) -> Result<Self, DisplayError> {
        let (conn, screen_num) = x11rb::connect(name)
            .map_err(|e| DisplayError::ConnectionLost(e.to_string()))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| DisplayError::Unsupported(format!("no screen {}", screen_num)))?;

        Ok(Self { conn, root })
    }

    /// Register for output-change notifications on the root window.
    ///
    /// Uses a checked request so a rejection surfaces here, not later as an
    /// asynchronous error in the event stream.
    pub fn subscribe(&self) -> Result<(), DisplayError> {
        if self
            .conn
            .extension_information(randr::X11_EXTENSION_NAME)?
            .is_none()
        {
            return Err(DisplayError::Unsupported("RandR extension missing".into()));
        }

        let version = self
            .conn
            .randr_query_version(RANDR_MAJOR, RANDR_MINOR)?
            .reply()?;
        if (version.major_version, version.minor_version) < (RANDR_MAJOR, RANDR_MINOR) {
            return Err(DisplayError::Unsupported(format!(
                "RandR {}.{} < {}.{}",
                version.major_version, version.minor_version, RANDR_MAJOR, RANDR_MINOR
            )));
        }

        self.conn
            .randr_select_input(self.root, randr::NotifyMask::OUTPUT_CHANGE)?
            .check()?;

        info!(
            "Subscribed to RandR {}.{} output changes on root 0x{:x}",
            version.major_version, version.minor_version, self.root
        );
        Ok(())
    }
}

impl DisplayServer for X11Display {
    fn next_event(&mut self) -> Result<OutputNotification, DisplayError> {
        loop {
            match self.conn.wait_for_event()? {
                Event::RandrNotify(ev) if ev.sub_code == randr::Notify::OUTPUT_CHANGE => {
                    let oc = ev.u.as_oc();
                    return Ok(OutputNotification {
                        window: oc.window,
                        output: oc.output,
                        timestamp: oc.timestamp,
                    });
                }
                Event::Error(e) => debug!("Ignoring X error: {:?}", e.error_kind),
                other => debug!("Ignoring event: {:?}", other),
            }
        }
    }

    fn screen_resources(&self, window: u32) -> Result<ScreenResources, DisplayError> {
        let reply = self.conn.randr_get_screen_resources(window)?.reply()?;
        Ok(ScreenResources {
            config_timestamp: reply.config_timestamp,
        })
    }

    fn output_info(
        &self,
        resources: &ScreenResources,
        output: u32,
    ) -> Result<OutputDescriptor, DisplayError> {
        let info = self
            .conn
            .randr_get_output_info(output, resources.config_timestamp)?
            .reply()?;

        let mm_size = (info.mm_width != 0 || info.mm_height != 0)
            .then_some((info.mm_width, info.mm_height));

        Ok(OutputDescriptor {
            name: String::from_utf8_lossy(&info.name).into_owned(),
            connection: ConnectionState::from_raw(u8::from(info.connection)),
            mm_size,
            crtc: (info.crtc != x11rb::NONE).then_some(info.crtc),
            timestamp: info.timestamp,
        })
    }

    fn crtc_geometry(
        &self,
        resources: &ScreenResources,
        crtc: u32,
    ) -> Result<Geometry, DisplayError> {
        let info = self
            .conn
            .randr_get_crtc_info(crtc, resources.config_timestamp)?
            .reply()?;
        Ok(Geometry {
            x: info.x,
            y: info.y,
            width: info.width,
            height: info.height,
        })
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.conn.stream().as_raw_fd())
    }
}
