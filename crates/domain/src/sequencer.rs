use std::sync::Arc;

use crate::DomainResult;
use crate::error::DomainError;
use crate::ports::sequence::ApplicationSequence;
use crate::ports::sketch_requests::SketchRequestRepository;
use crate::util::{now_ms, two_digit_year};

/// Sharding key of application ids: `{region}/{sub_region}/{YY}/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApplicationScope {
    pub region_code: String,
    pub sub_region_code: String,
    pub year: u16,
}

impl ApplicationScope {
    pub fn new(
        region_code: impl Into<String>,
        sub_region_code: impl Into<String>,
        year: u16,
    ) -> Self {
        Self {
            region_code: region_code.into(),
            sub_region_code: sub_region_code.into(),
            year: year % 100,
        }
    }

    pub fn at(
        region_code: impl Into<String>,
        sub_region_code: impl Into<String>,
        epoch_ms: i64,
    ) -> Self {
        Self::new(region_code, sub_region_code, two_digit_year(epoch_ms))
    }

    pub fn prefix(&self) -> String {
        format!(
            "{}/{}/{:02}/",
            self.region_code, self.sub_region_code, self.year
        )
    }

    /// Flat key for counter stores.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{:02}",
            self.region_code, self.sub_region_code, self.year
        )
    }

    pub fn format(&self, sequence: u64) -> String {
        format!("{}{sequence}", self.prefix())
    }
}

/// Numeric suffix of an application id within `prefix`. Anything that is
/// not a plain decimal tail is ignored.
pub fn parse_sequence(application_id: &str, prefix: &str) -> Option<u64> {
    let tail = application_id.strip_prefix(prefix)?;
    if tail.is_empty() || !tail.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

#[derive(Clone)]
pub struct ApplicationIdSequencer {
    sequence: Arc<dyn ApplicationSequence>,
    requests: Arc<dyn SketchRequestRepository>,
}

impl ApplicationIdSequencer {
    pub fn new(
        sequence: Arc<dyn ApplicationSequence>,
        requests: Arc<dyn SketchRequestRepository>,
    ) -> Self {
        Self { sequence, requests }
    }

    pub async fn next_application_id(
        &self,
        region_code: &str,
        sub_region_code: &str,
    ) -> DomainResult<String> {
        let scope = ApplicationScope::at(region_code, sub_region_code, now_ms());
        self.next_for_scope(&scope).await
    }

    /// The counter is seeded from the highest id already stored in the
    /// scope, so ids written before the counter existed are never reused.
    pub async fn next_for_scope(&self, scope: &ApplicationScope) -> DomainResult<String> {
        let floor = self
            .requests
            .max_application_sequence(&scope.prefix())
            .await?;
        let next = self.sequence.next_value(scope, floor).await?;
        if next <= floor {
            return Err(DomainError::Storage(format!(
                "sequence for {} returned {next} at or below floor {floor}",
                scope.key()
            )));
        }
        let application_id = scope.format(next);
        tracing::debug!(scope = %scope.key(), %application_id, "application id reserved");
        Ok(application_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_two_digit_year() {
        let scope = ApplicationScope::new("KA-BLR", "BLR-N", 2026);
        assert_eq!(scope.prefix(), "KA-BLR/BLR-N/26/");
        assert_eq!(scope.format(7), "KA-BLR/BLR-N/26/7");

        let scope = ApplicationScope::new("KA-BLR", "BLR-N", 5);
        assert_eq!(scope.format(12), "KA-BLR/BLR-N/05/12");
    }

    #[test]
    fn parse_sequence_is_numeric() {
        let prefix = "KA-BLR/BLR-N/26/";
        assert_eq!(parse_sequence("KA-BLR/BLR-N/26/10", prefix), Some(10));
        assert_eq!(parse_sequence("KA-BLR/BLR-N/26/9", prefix), Some(9));
        assert_eq!(parse_sequence("KA-BLR/BLR-N/26/9a", prefix), None);
        assert_eq!(parse_sequence("KA-BLR/BLR-N/26/", prefix), None);
        assert_eq!(parse_sequence("KA-BLR/BLR-S/26/3", prefix), None);
    }
}
