//! Remote Call Client for Refine.
//!
//! Sends the selected text to an OpenAI-compatible chat completions service
//! and maps every outcome to an [`refine_core::protocol::ImproveResult`] or an
//! [`refine_core::ErrorReport`].

pub mod backoff;
pub mod cache;
pub mod chat;
pub mod client;
pub mod config;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use cache::{CacheKey, ResponseCache};
pub use client::RewriteClient;
pub use config::ClientConfig;
pub use transport::{
    CompletionTransport, HttpReply, RecordedCall, ReqwestTransport, ScriptStep, ScriptedTransport,
    TransportError,
};
