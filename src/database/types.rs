/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Storage-side primitive types.
//!
//! Row structs use database-native representations (hex-string ids, int64
//! Unix milliseconds); domain types use `DateTime<Utc>` and convert at the
//! DAL boundary. On the wire, timestamps are ISO-8601 UTC with millisecond
//! precision and ids are 32 lowercase hex characters.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use uuid::Uuid;

/// Generates a fresh 128-bit random identifier as 32 lowercase hex chars.
///
/// Uuid v4 draws from the operating system's CSPRNG, so collisions across
/// restarts are infeasible and not defended against.
pub fn fresh_id() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// Current wall-clock time as Unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts stored Unix milliseconds back to a UTC datetime.
///
/// Out-of-range values clamp to the Unix epoch; the store only ever writes
/// values produced by [`now_ms`].
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Serde helper: ISO-8601 UTC with millisecond precision.
///
/// Annotate wire-facing `DateTime<Utc>` fields with
/// `#[serde(with = "crate::database::types::iso_millis")]`.
pub mod iso_millis {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
