//! Application layer for Refine.
//!
//! The three execution contexts as owned objects, each running as its own
//! task and talking to the others only through messages:
//!
//! - [`content`]: beside the host page; capture, session authority, replacement
//! - [`overlay`]: the isolated panel; typing animation, toasts, user actions
//! - [`background`]: holds the credential and runs the Remote Call Client
//!
//! [`runtime`] wires them together.

pub mod background;
pub mod bus;
pub mod content;
pub mod overlay;
pub mod runtime;

pub use background::{BackgroundContext, BackgroundHandle};
pub use bus::MessageBus;
pub use content::{ContentContext, ContentHandle, HostEvent};
pub use overlay::{
    Clipboard, MemoryClipboard, OverlayContext, OverlayHandle, OverlayLaunch, OverlayLauncher,
    OverlayView, Toast, UiCommand,
};
pub use runtime::{DEFAULT_EXTENSION_ORIGIN, Extension, ExtensionConfig, ExtensionHandle};
