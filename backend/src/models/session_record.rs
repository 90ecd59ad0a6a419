//! Session log entries written at sign-in and closed at sign-out.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::{IntoParams, ToSchema};

use crate::models::sign_in_method::SignInMethod;
use crate::types::{AccountId, SessionRecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
        }
    }

    /// Label used in exports.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Inactive => "Finished",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One sign-in session as stored in the session log.
pub struct SessionRecord {
    pub id: SessionRecordId,
    pub account_id: AccountId,
    pub email: String,
    pub display_name: String,
    /// Methods linked to the account at login time, in preference order.
    pub providers: Vec<SignInMethod>,
    pub login_at: DateTime<Utc>,
    pub logout_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub status: SessionStatus,
}

impl SessionRecord {
    pub fn open(
        account_id: AccountId,
        email: &str,
        display_name: &str,
        providers: Vec<SignInMethod>,
        login_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionRecordId::new(),
            account_id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            providers,
            login_at,
            logout_at: None,
            duration_seconds: None,
            status: SessionStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Marks the record as finished. Returns `false` when it was already closed.
    pub fn close(&mut self, logout_at: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.duration_seconds = Some(duration_seconds(self.login_at, logout_at));
        self.logout_at = Some(logout_at);
        self.status = SessionStatus::Inactive;
        true
    }
}

/// Whole seconds between login and logout, rounded half up and never negative.
pub fn duration_seconds(login_at: DateTime<Utc>, logout_at: DateTime<Utc>) -> i64 {
    let millis = (logout_at - login_at).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + 500) / 1000
}

/// Formats a duration as `1h 2m 3s`, dropping leading zero units.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Correlates a signed-in client with its open session record.
///
/// Owned by the caller; cleared once the session is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    session_id: Option<SessionRecordId>,
}

impl SessionContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_session(session_id: SessionRecordId) -> Self {
        Self {
            session_id: Some(session_id),
        }
    }

    pub fn session_id(&self) -> Option<SessionRecordId> {
        self.session_id
    }

    pub fn is_empty(&self) -> bool {
        self.session_id.is_none()
    }

    pub fn take(&mut self) -> Option<SessionRecordId> {
        self.session_id.take()
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
/// Filters accepted by the admin session queries.
pub struct SessionFilter {
    /// Case-insensitive partial match on the email.
    pub email: Option<String>,
    /// First day to include (from 00:00).
    pub start_date: Option<NaiveDate>,
    /// Last day to include (through 23:59:59.999).
    pub end_date: Option<NaiveDate>,
}

/// Login-time window derived from a [`SessionFilter`]; `until` is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SessionFilter {
    /// Email fragment lower-cased, or `None` when absent or blank.
    pub fn email_fragment(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(str::to_lowercase)
    }

    pub fn window(&self, tz: &Tz) -> LoginWindow {
        LoginWindow {
            from: self.start_date.map(|date| start_of_day(date, tz)),
            until: self
                .end_date
                .map(|date| start_of_day(date + Duration::days(1), tz)),
        }
    }

    pub fn matches(&self, record: &SessionRecord, tz: &Tz) -> bool {
        if let Some(fragment) = self.email_fragment() {
            if !record.email.to_lowercase().contains(&fragment) {
                return false;
            }
        }
        let window = self.window(tz);
        if let Some(from) = window.from {
            if record.login_at < from {
                return false;
            }
        }
        if let Some(until) = window.until {
            if record.login_at >= until {
                return false;
            }
        }
        true
    }
}

fn start_of_day(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // midnight skipped by a DST jump
        None => Utc.from_utc_datetime(&naive),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionSortKey {
    #[default]
    LoginAt,
    LogoutAt,
    Duration,
    Email,
    DisplayName,
    Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, ToSchema)]
pub struct SessionSort {
    #[serde(default, rename = "sort")]
    pub key: SessionSortKey,
    #[serde(default, rename = "direction")]
    pub direction: SortDirection,
}

impl SessionSort {
    pub fn new(key: SessionSortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    fn compare(&self, a: &SessionRecord, b: &SessionRecord) -> Ordering {
        let ordering = match self.key {
            SessionSortKey::LoginAt => a.login_at.cmp(&b.login_at),
            SessionSortKey::LogoutAt => a.logout_at.cmp(&b.logout_at),
            SessionSortKey::Duration => a.duration_seconds.cmp(&b.duration_seconds),
            SessionSortKey::Email => a.email.to_lowercase().cmp(&b.email.to_lowercase()),
            SessionSortKey::DisplayName => a
                .display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase()),
            SessionSortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Sorts in place; ties keep their relative order.
    pub fn apply(&self, records: &mut [SessionRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
/// Aggregates shown above the admin session table.
pub struct SessionSummary {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub distinct_accounts: usize,
    /// Mean duration of closed sessions, rounded to whole seconds.
    pub average_duration_seconds: Option<i64>,
}

impl SessionSummary {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let active = records.iter().filter(|r| r.is_active()).count();
        let mut accounts: Vec<AccountId> = records.iter().map(|r| r.account_id).collect();
        accounts.sort();
        accounts.dedup();
        let closed: Vec<i64> = records.iter().filter_map(|r| r.duration_seconds).collect();
        let average_duration_seconds = if closed.is_empty() {
            None
        } else {
            let sum: i64 = closed.iter().sum();
            Some((sum as f64 / closed.len() as f64).round() as i64)
        };
        Self {
            total: records.len(),
            active,
            inactive: records.len() - active,
            distinct_accounts: accounts.len(),
            average_duration_seconds,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Session entry as returned by the admin API.
pub struct SessionRecordResponse {
    pub id: String,
    pub account_id: String,
    pub email: String,
    pub display_name: String,
    pub providers: Vec<SignInMethod>,
    pub login_at: DateTime<Utc>,
    pub logout_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    /// `1h 2m 3s`, or `None` while the session is open.
    pub duration: Option<String>,
    pub status: SessionStatus,
}

impl From<SessionRecord> for SessionRecordResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            account_id: record.account_id.to_string(),
            duration: record.duration_seconds.map(format_duration),
            email: record.email,
            display_name: record.display_name,
            providers: record.providers,
            login_at: record.login_at,
            logout_at: record.logout_at,
            duration_seconds: record.duration_seconds,
            status: record.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn record(email: &str, login_at: &str) -> SessionRecord {
        SessionRecord::open(
            AccountId::new(),
            email,
            "Reader",
            vec![SignInMethod::Google],
            at(login_at),
        )
    }

    #[test]
    fn duration_rounds_to_nearest_second() {
        let login = at("2025-01-01T10:00:00Z");
        assert_eq!(duration_seconds(login, login + Duration::milliseconds(1499)), 1);
        assert_eq!(duration_seconds(login, login + Duration::milliseconds(1500)), 2);
    }

    #[test]
    fn duration_is_clamped_on_clock_skew() {
        let login = at("2025-01-01T10:00:00Z");
        assert_eq!(duration_seconds(login, login - Duration::seconds(30)), 0);
    }

    #[test]
    fn close_is_applied_once() {
        let mut rec = record("a@example.com", "2025-01-01T10:00:00Z");
        assert!(rec.close(at("2025-01-01T10:01:00Z")));
        assert!(!rec.close(at("2025-01-01T11:00:00Z")));
        assert_eq!(rec.duration_seconds, Some(60));
        assert_eq!(rec.logout_at, Some(at("2025-01-01T10:01:00Z")));
        assert_eq!(rec.status, SessionStatus::Inactive);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(3723), "1h 2m 3s");
        assert_eq!(format_duration(62), "1m 2s");
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
    }

    #[test]
    fn filter_matches_email_fragment_case_insensitively() {
        let filter = SessionFilter {
            email: Some("EXAMPLE".into()),
            ..Default::default()
        };
        assert!(filter.matches(&record("reader@example.com", "2025-01-01T10:00:00Z"), &Tz::UTC));
        assert!(!filter.matches(&record("reader@mail.org", "2025-01-01T10:00:00Z"), &Tz::UTC));
    }

    #[test]
    fn end_date_includes_whole_day() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let filter = SessionFilter {
            email: None,
            start_date: Some(day),
            end_date: Some(day),
        };
        assert!(filter.matches(&record("a@example.com", "2025-01-01T00:00:00Z"), &Tz::UTC));
        assert!(filter.matches(&record("a@example.com", "2025-01-01T23:59:59.999Z"), &Tz::UTC));
        assert!(!filter.matches(&record("a@example.com", "2025-01-02T00:00:00Z"), &Tz::UTC));
        assert!(!filter.matches(&record("a@example.com", "2024-12-31T23:59:59Z"), &Tz::UTC));
    }

    #[test]
    fn window_uses_configured_time_zone() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let filter = SessionFilter {
            email: None,
            start_date: Some(day),
            end_date: None,
        };
        let window = filter.window(&chrono_tz::Asia::Tokyo);
        assert_eq!(window.from, Some(at("2024-12-31T15:00:00Z")));
    }

    #[test]
    fn default_sort_is_newest_login_first() {
        let mut records = vec![
            record("old@example.com", "2025-01-01T10:00:00Z"),
            record("new@example.com", "2025-01-02T10:00:00Z"),
        ];
        SessionSort::default().apply(&mut records);
        assert_eq!(records[0].email, "new@example.com");
    }

    #[test]
    fn summary_counts_and_averages() {
        let mut first = record("a@example.com", "2025-01-01T10:00:00Z");
        first.close(at("2025-01-01T10:00:10Z"));
        let mut second = record("b@example.com", "2025-01-01T10:00:00Z");
        second.close(at("2025-01-01T10:00:21Z"));
        let third = record("c@example.com", "2025-01-01T10:00:00Z");

        let summary = SessionSummary::from_records(&[first, second, third]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.active, 1);
        assert_eq!(summary.inactive, 2);
        assert_eq!(summary.distinct_accounts, 3);
        assert_eq!(summary.average_duration_seconds, Some(16));
    }
}
