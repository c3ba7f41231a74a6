//! # Server Components
//!
//! - [`server`]: TCP listener, one task per accepted connection
//! - [`session`]: the per-connection frame -> decision pipeline
//! - [`audit`]: the append-only access log

pub mod audit;
pub mod server;
pub mod session;

pub use audit::{AccessEntry, AuditSink, FileAuditLog, MemoryAuditLog};
pub use server::{build_handler, Server};
pub use session::SessionHandler;
