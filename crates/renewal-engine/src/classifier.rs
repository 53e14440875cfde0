//! Validity classification.
//!
//! `expiry = issue + validity_months` in calendar months. When the issue
//! day does not exist in the target month the date clamps to that month's
//! last day (Jan 31 + 1 month = Feb 29 in a leap year, Feb 28 otherwise).
//!
//! Status is derived from the whole days remaining until midnight UTC of the
//! expiry date:
//!
//! | days remaining | status          |
//! |----------------|-----------------|
//! | `< 0`          | `expired`       |
//! | `0..=7`        | `critical`      |
//! | `8..=30`       | `expiring-soon` |
//! | `> 30`         | `valid`         |
//!
//! Thresholds are fixed. Results are never cached.

use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use renewal_types::{ExpiryStatus, ValidityRecord};

/// Upper bound (inclusive) of the critical band, in days.
pub const CRITICAL_DAYS: i64 = 7;

/// Upper bound (inclusive) of the expiring-soon band, in days.
pub const EXPIRING_SOON_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

/// Outcome of classifying one validity period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// `None` when the requirement has no validity period
    pub expiry_date: Option<NaiveDate>,
    pub status: ExpiryStatus,
    /// Whole days until expiry, negative once expired
    pub days_remaining: Option<i64>,
}

/// Classify an issue date and validity period relative to `now`.
pub fn classify(
    issue_date: NaiveDate,
    validity_months: Option<u32>,
    now: DateTime<Utc>,
) -> Classification {
    match expiry_date(issue_date, validity_months) {
        Some(expiry) => {
            let days = days_remaining(expiry, now);
            Classification {
                expiry_date: Some(expiry),
                status: status_for_days(days),
                days_remaining: Some(days),
            }
        }
        None => Classification {
            expiry_date: None,
            status: ExpiryStatus::NoExpiry,
            days_remaining: None,
        },
    }
}

/// Classify a stored record.
pub fn classify_record(record: &ValidityRecord, now: DateTime<Utc>) -> Classification {
    classify(record.issue_date, record.validity_months, now)
}

/// Expiry date for an issue date, or `None` if the validity is absent or zero.
pub fn expiry_date(issue_date: NaiveDate, validity_months: Option<u32>) -> Option<NaiveDate> {
    match validity_months {
        Some(months) if months > 0 => Some(
            issue_date
                .checked_add_months(Months::new(months))
                .unwrap_or(NaiveDate::MAX),
        ),
        _ => None,
    }
}

/// Instant at which a record expires: midnight UTC of the expiry date.
pub fn expiry_instant(expiry: NaiveDate) -> DateTime<Utc> {
    expiry.and_time(NaiveTime::MIN).and_utc()
}

/// `floor((expiry - now) / 1 day)`.
pub fn days_remaining(expiry: NaiveDate, now: DateTime<Utc>) -> i64 {
    let seconds = (expiry_instant(expiry) - now).num_seconds();
    seconds.div_euclid(SECONDS_PER_DAY)
}

/// Status band for a days-remaining value.
pub fn status_for_days(days: i64) -> ExpiryStatus {
    if days < 0 {
        ExpiryStatus::Expired
    } else if days <= CRITICAL_DAYS {
        ExpiryStatus::Critical
    } else if days <= EXPIRING_SOON_DAYS {
        ExpiryStatus::ExpiringSoon
    } else {
        ExpiryStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_month_end_clamps_in_leap_year() {
        let c = classify(date(2024, 1, 31), Some(1), at(2024, 2, 20));
        assert_eq!(c.expiry_date, Some(date(2024, 2, 29)));
        assert_eq!(c.days_remaining, Some(9));
        assert_eq!(c.status, ExpiryStatus::ExpiringSoon);
    }

    #[test]
    fn test_month_end_clamps_in_common_year() {
        let c = classify(date(2023, 1, 31), Some(1), at(2023, 1, 31));
        assert_eq!(c.expiry_date, Some(date(2023, 2, 28)));
    }

    #[test]
    fn test_plain_month_addition_keeps_day() {
        assert_eq!(expiry_date(date(2023, 3, 15), Some(24)), Some(date(2025, 3, 15)));
        assert_eq!(expiry_date(date(2023, 11, 30), Some(3)), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_no_expiry() {
        let c = classify(date(2020, 1, 1), None, at(2024, 1, 1));
        assert_eq!(c.status, ExpiryStatus::NoExpiry);
        assert!(c.expiry_date.is_none());
        assert!(c.days_remaining.is_none());

        let c = classify(date(2020, 1, 1), Some(0), at(2024, 1, 1));
        assert_eq!(c.status, ExpiryStatus::NoExpiry);
    }

    #[test]
    fn test_thresholds() {
        let expiry = date(2024, 6, 30);
        let cases = [
            (at(2024, 7, 1), -1, ExpiryStatus::Expired),
            (at(2024, 6, 30), 0, ExpiryStatus::Critical),
            (at(2024, 6, 23), 7, ExpiryStatus::Critical),
            (at(2024, 6, 22), 8, ExpiryStatus::ExpiringSoon),
            (at(2024, 5, 31), 30, ExpiryStatus::ExpiringSoon),
            (at(2024, 5, 30), 31, ExpiryStatus::Valid),
        ];
        for (now, days, status) in cases {
            assert_eq!(days_remaining(expiry, now), days, "now = {now}");
            assert_eq!(status_for_days(days), status, "days = {days}");
        }
    }

    #[test]
    fn test_days_remaining_floors_partial_days() {
        let expiry = date(2024, 6, 30);
        let now = Utc.with_ymd_and_hms(2024, 6, 29, 12, 0, 0).unwrap();
        assert_eq!(days_remaining(expiry, now), 0);

        let now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 1).unwrap();
        assert_eq!(days_remaining(expiry, now), -1);
    }

    #[test]
    fn test_deterministic() {
        let now = at(2024, 2, 20);
        let a = classify(date(2024, 1, 31), Some(1), now);
        let b = classify(date(2024, 1, 31), Some(1), now);
        assert_eq!(a, b);
    }

    #[test]
    fn test_classify_record() {
        let record = ValidityRecord::new(
            "rec-1",
            "s1",
            "r1",
            renewal_types::RecordSource::Certificates,
            date(2023, 6, 1),
            Some(12),
        );
        let c = classify_record(&record, at(2024, 5, 1));
        assert_eq!(c.expiry_date, Some(date(2024, 6, 1)));
        assert_eq!(c.status, ExpiryStatus::Valid);
    }
}
