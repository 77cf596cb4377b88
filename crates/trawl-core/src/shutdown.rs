//! Cooperative shutdown support via atomic flag
//!
//! Signal handlers set the flag; pull loops check it between batches and
//! stop requesting pages. The last committed checkpoint stays in place, so
//! an interrupted extraction resumes where it left off.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global shutdown flag — set by SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Request shutdown (for signal handlers)
pub fn request_shutdown() {
    shutdown_flag().store(true, Ordering::Relaxed);
}
