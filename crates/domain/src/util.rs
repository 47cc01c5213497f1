use std::time::{SystemTime, UNIX_EPOCH};

use time::OffsetDateTime;
use uuid::Uuid;

pub fn uuid_v7_without_dashes() -> String {
    Uuid::now_v7().simple().to_string()
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Identifiers are compared as trimmed, lowercased strings.
pub fn canonical_id(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub fn same_id(left: &str, right: &str) -> bool {
    canonical_id(left) == canonical_id(right)
}

pub fn two_digit_year(epoch_ms: i64) -> u16 {
    let year = OffsetDateTime::from_unix_timestamp_nanos(epoch_ms as i128 * 1_000_000)
        .map(|value| value.year())
        .unwrap_or(1970);
    year.rem_euclid(100) as u16
}

pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_canonically() {
        assert!(same_id(" ABC123 ", "abc123"));
        assert!(!same_id("abc123", "abc124"));
    }

    #[test]
    fn two_digit_year_from_epoch() {
        // 2024-03-01T00:00:00Z
        assert_eq!(two_digit_year(1_709_251_200_000), 24);
        // 2000-01-01T00:00:00Z
        assert_eq!(two_digit_year(946_684_800_000), 0);
    }
}
