//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod session_lock;
pub mod shutdown;

pub use session_lock::{SessionGuard, SessionLock};
pub use shutdown::shutdown_signal;
