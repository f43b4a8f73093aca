//! Event normalization
//!
//! Turns a raw output-change notification into an [`HotplugEvent`] by
//! querying the screen topology and the affected output.

use log::{debug, error};

use super::dedup::Signature;
use crate::display::{
    DisplayError, DisplayServer, OutputDescriptor, OutputNotification, ScreenResources,
};

/// A resolved notification ready for duplicate filtering and dispatch
#[derive(Debug, Clone)]
pub struct HotplugEvent {
    pub output: OutputDescriptor,
    pub signature: Signature,
    /// Topology snapshot the output was resolved against
    pub resources: ScreenResources,
}

/// Resolve `notification` against the display server.
///
/// Returns `Ok(None)` when the event is discarded because a query failed.
/// Only fatal connection errors are propagated.
pub fn normalize<D: DisplayServer + ?Sized>(
    display: &D,
    notification: &OutputNotification,
) -> Result<Option<HotplugEvent>, DisplayError> {
    debug!(
        "Output change: output {} window 0x{:x} time {}",
        notification.output, notification.window, notification.timestamp
    );

    let resources = match display.screen_resources(notification.window) {
        Ok(r) => r,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            error!("Could not get screen resources: {}", e);
            return Ok(None);
        }
    };

    let output = match display.output_info(&resources, notification.output) {
        Ok(o) => o,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            error!("Could not get output info: {}", e);
            return Ok(None);
        }
    };

    let signature = Signature::new(&output.name, output.connection);
    Ok(Some(HotplugEvent {
        output,
        signature,
        resources,
    }))
}

/// Log timing and geometry diagnostics for `event` at debug level.
///
/// Does nothing unless `verbose`, so the CRTC query is only made when its
/// result will be shown. Only fatal connection errors are propagated.
pub fn log_details<D: DisplayServer + ?Sized>(
    display: &D,
    event: &HotplugEvent,
    verbose: bool,
) -> Result<(), DisplayError> {
    if !verbose {
        return Ok(());
    }

    let output = &event.output;
    debug!("Event: {}", event.signature);
    debug!("Time: {}", output.timestamp);
    if let Some(crtc) = output.crtc {
        debug!("CRTC: {}", crtc);
    }
    debug!("Size: {}", describe_size(display, event)?);
    Ok(())
}

/// Physical size of an inactive output, or the CRTC geometry of an active one.
///
/// A failed CRTC query is reported as missing data.
pub fn describe_size<D: DisplayServer + ?Sized>(
    display: &D,
    event: &HotplugEvent,
) -> Result<String, DisplayError> {
    let output = &event.output;
    let Some(crtc) = output.crtc else {
        return Ok(match output.mm_size {
            Some((w, h)) => format!("{}mm x {}mm", w, h),
            None => "unknown".to_string(),
        });
    };

    match display.crtc_geometry(&event.resources, crtc) {
        Ok(g) => Ok(format!("{}x{}+{}+{}", g.width, g.height, g.x, g.y)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => Ok(format!("unavailable ({})", e)),
    }
}
