pub use crate::error::{ClResult, Error, FieldError};
pub use crate::types::{now_ms, InstallId, PlayerUuid, TimestampMs};

pub use tracing::{debug, error, info, warn};

// vim: ts=4
