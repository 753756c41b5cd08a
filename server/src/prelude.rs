pub use levelhead_core::prelude::*;

// vim: ts=4
