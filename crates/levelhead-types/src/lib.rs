//! Shared types, adapter traits and the error type of the Levelhead stats proxy.
//!
//! This crate contains the foundational types shared between the admission core,
//! the server and the storage adapters. Keeping them separate lets adapter crates
//! compile without pulling in the middleware stack.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod nonce_adapter;
pub mod prelude;
pub mod stats_adapter;
pub mod types;

// vim: ts=4
