//! Domain layer of Refine.
//!
//! Everything here is synchronous and free of I/O: the host-page abstraction,
//! selection capture, session tokens, the message protocol, the typing state
//! machine and the replacement engine.

pub mod config;
pub mod error;
pub mod page;
pub mod protocol;
pub mod replace;
pub mod selection;
pub mod session;
pub mod settings;
pub mod typing;

pub use error::{ErrorReport, ErrorType, RefineError};
