//! Session fault classification
//!
//! Decides whether a render failure means the DevTools transport is gone and
//! the browser needs to be rebuilt, rather than the request simply being bad.
//! The classification drives the restart-and-retry policy: interrupted
//! failures get one pool restart and one retry, nothing else is retried.

use super::RenderError;

/// Message fragments that indicate a dead or dying browser session.
const SESSION_FAULTS: &[&str] = &[
    "target closed",
    "session closed",
    "websocket",
    "connection refused",
    "connection reset",
    "io: read/write on closed pipe",
    "eof",
];

/// Conservative detector for browser session breakage.
///
/// Timeouts count as interrupted: under pooled operation a deadline usually
/// means a wedged target, and a restart is cheaper than a stuck pool slot.
pub fn is_session_interrupted(err: &RenderError) -> bool {
    match err {
        RenderError::Timeout(_) | RenderError::AcquireTimeout => true,
        RenderError::Browser(msg) => {
            let msg = msg.to_lowercase();
            SESSION_FAULTS.iter().any(|fault| msg.contains(fault))
        }
        RenderError::PoolClosed | RenderError::Profile(_) => false,
    }
}
