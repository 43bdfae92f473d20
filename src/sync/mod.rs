//! Reference sync driver.
//!
//! The store only records pending changes. This module delivers them: it
//! reads the outbound queue oldest first, posts each item to the server and
//! acknowledges it locally once the server accepts it.

pub mod client;
pub mod push;

pub use client::{HttpTransport, SyncTransport, TransportError};
pub use push::{push, FailedItem, PushReport};
