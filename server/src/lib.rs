//! HTTP server of the Levelhead stats proxy.
//!
//! Wires the admission core into axum routes: mod traffic behind the handshake
//! and the per-install limiter, the public key status check behind two per-IP
//! limiters, and the operational endpoints behind their token guards.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod admin;
pub mod app;
pub mod config;
pub mod extract;
pub mod player;
pub mod prelude;
pub mod routes;
pub mod stats_cache;
pub mod status;

pub use crate::app::AppBuilder;
pub use crate::config::Config;

// vim: ts=4
