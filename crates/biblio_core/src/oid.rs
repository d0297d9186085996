//! crates/biblio_core/src/oid.rs
//!
//! ObjectId-style identifiers: 24 hex characters whose first 8 encode the
//! creation time as big-endian Unix seconds. Sorting ids lexicographically
//! therefore sorts records by creation time.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Mints a new 24-hex-character identifier: 8 hex chars of the current Unix
/// second followed by 16 hex chars of randomness.
pub fn generate() -> String {
    let seconds = Utc::now().timestamp() as u32;
    let random = Uuid::new_v4();
    let mut id = format!("{:08x}", seconds);
    for byte in &random.as_bytes()[..8] {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

/// Derives the creation instant from an identifier.
///
/// The first 8 hex characters are read as a big-endian u32 of Unix seconds
/// and widened to millisecond precision. Malformed input never panics: the
/// anomaly is logged and the current instant is returned instead, so callers
/// degrade to "just created" rather than failing.
pub fn extract_timestamp(id: &str) -> DateTime<Utc> {
    match parse_seconds(id) {
        Some(instant) => instant,
        None => {
            tracing::warn!(id, "malformed identifier, falling back to current time");
            Utc::now()
        }
    }
}

fn parse_seconds(id: &str) -> Option<DateTime<Utc>> {
    let prefix = id.get(..8)?;
    let seconds = u32::from_str_radix(prefix, 16).ok()?;
    Utc.timestamp_millis_opt(i64::from(seconds) * 1000).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn extracts_known_timestamp() {
        // 0x5f8f8c44 = 1603243076 = 2020-10-21T00:37:56Z
        let id = "5f8f8c449d1e8b6a2c3d4e5f";
        let instant = extract_timestamp(id);
        assert_eq!(instant.timestamp(), 1_603_243_076);
        assert_eq!(instant.timestamp_subsec_millis(), 0);
    }

    #[test]
    fn malformed_input_falls_back_to_now() {
        for bad in ["", "abc", "zzzzzzzz9d1e8b6a2c3d4e5f", "héllo-not-hex"] {
            let before = Utc::now();
            let instant = extract_timestamp(bad);
            let after = Utc::now();
            assert!(instant >= before - Duration::seconds(5));
            assert!(instant <= after + Duration::seconds(5));
        }
    }

    #[test]
    fn generated_ids_are_hex_and_time_ordered() {
        let id = generate();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let instant = extract_timestamp(&id);
        let drift = (Utc::now() - instant).num_seconds().abs();
        assert!(drift <= 5, "id timestamp drifted {drift}s from now");
    }
}
