//! Admission core of the Levelhead stats proxy.
//!
//! Every request from the mod passes the handshake and a rate limiter before it
//! is routed. Submissions additionally pass a token guard, validation, replay
//! protection and corroboration against the last trusted record before they may
//! reach the cache.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod guard;
pub mod handshake;
pub mod monitoring;
pub mod poisoning;
pub mod prelude;
pub mod rate_limit;
pub mod replay;
pub mod submission;
pub mod validation;

pub use app::{App, AppState, CoreConfig, Limiters};
pub use handshake::InstallCtx;

// vim: ts=4
