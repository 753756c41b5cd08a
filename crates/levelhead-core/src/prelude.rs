pub use crate::app::{App, AppState};
pub use levelhead_types::prelude::*;

// vim: ts=4
