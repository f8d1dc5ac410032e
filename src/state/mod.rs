//! State module for tracking scan progress
//!
//! # Components
//!
//! - `ScanStatus`: the scan state machine's statuses and legal transitions
//! - `PauseCoordinator`: multi-caller pause/resume gate polled by the driver

mod pause;
mod scan_status;

// Re-export main types
pub use pause::PauseCoordinator;
pub use scan_status::ScanStatus;
