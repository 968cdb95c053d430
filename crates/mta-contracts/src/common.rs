//! Shared primitive aliases.

use chrono::{DateTime, Utc};

/// All timestamps cross the wire as ISO-8601 UTC, which `chrono::DateTime<Utc>`'s serde
/// impl already produces.
pub type Timestamp = DateTime<Utc>;
