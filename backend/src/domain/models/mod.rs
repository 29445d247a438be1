//! Domain models. These carry typed dates and timestamps; the REST layer maps
//! them onto the string-based DTOs of the `shared` crate.

pub mod child;
pub mod point;
pub mod presence;
pub mod user;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

/// Convert stored epoch milliseconds back into a UTC timestamp
pub fn utc_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("Timestamp out of range: {}", millis))
}
