//! Global constants for xplugd
//!
//! Consolidates protocol versions, limits, and fixed script arguments
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Script Invocation
// ============================================================================

/// Second argument passed to the script, identifying the device class
pub const SCRIPT_TAG: &str = "display";

/// Number of arguments handed to the script (including argv[0])
pub const SCRIPT_ARGC: usize = 4;

// ============================================================================
// Event Signature
// ============================================================================

/// Maximum rendered signature length in bytes ("<name> <state>")
pub const SIGNATURE_MAX_LEN: usize = 127;

// ============================================================================
// RandR
// ============================================================================

/// Minimum RandR version providing output change notifications
pub const RANDR_MAJOR: u32 = 1;
pub const RANDR_MINOR: u32 = 2;

// ============================================================================
// Logging
// ============================================================================

/// syslog identity
pub const PROGRAM_NAME: &str = "xplugd";

/// Default syslog priority threshold (LOG_NOTICE)
pub const DEFAULT_LOG_PRIORITY: i32 = libc::LOG_NOTICE;
