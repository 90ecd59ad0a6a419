//! CSV rendering of the admin session log.

use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::session_record::{format_duration, SessionRecord};
use crate::utils::csv::render_csv;
use crate::utils::time::{format_local, now_in_timezone};

pub const EXPORT_HEADER: [&str; 7] = [
    "User", "Email", "Providers", "Login", "Logout", "Duration", "Status",
];

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionExport {
    pub csv_data: String,
    pub filename: String,
}

struct ExportRow {
    user: String,
    email: String,
    providers: String,
    login: String,
    logout: String,
    duration: String,
    status: String,
}

impl ExportRow {
    fn from_record(record: &SessionRecord, tz: &Tz) -> Self {
        let providers = record
            .providers
            .iter()
            .map(|provider| provider.display_name())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            user: record.display_name.clone(),
            email: record.email.clone(),
            providers,
            login: format_local(record.login_at, tz),
            logout: record
                .logout_at
                .map(|at| format_local(at, tz))
                .unwrap_or_else(|| "In session".to_string()),
            duration: record
                .duration_seconds
                .map(format_duration)
                .unwrap_or_else(|| "In progress".to_string()),
            status: record.status.label().to_string(),
        }
    }

    fn into_cells(self) -> Vec<String> {
        vec![
            self.user,
            self.email,
            self.providers,
            self.login,
            self.logout,
            self.duration,
            self.status,
        ]
    }
}

pub async fn export_sessions(records: Vec<SessionRecord>, tz: Tz) -> anyhow::Result<SessionExport> {
    let filename = format!(
        "session_log_{}.csv",
        now_in_timezone(&tz).format("%Y%m%d_%H%M%S")
    );
    let csv_data = tokio::task::spawn_blocking(move || {
        let rows = records
            .iter()
            .map(|record| ExportRow::from_record(record, &tz).into_cells());
        render_csv(&EXPORT_HEADER, rows)
    })
    .await??;

    Ok(SessionExport { csv_data, filename })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sign_in_method::SignInMethod;
    use crate::types::AccountId;
    use chrono::{TimeZone, Utc};

    fn record(display_name: &str) -> SessionRecord {
        SessionRecord::open(
            AccountId::new(),
            "reader@example.com",
            display_name,
            vec![SignInMethod::Password, SignInMethod::GitHub],
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn open_sessions_render_placeholders() {
        let export = export_sessions(vec![record("Reader")], chrono_tz::Asia::Tokyo)
            .await
            .unwrap();
        let mut lines = export.csv_data.lines();
        assert_eq!(
            lines.next().unwrap(),
            "\"User\",\"Email\",\"Providers\",\"Login\",\"Logout\",\"Duration\",\"Status\""
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"Reader\",\"reader@example.com\",\"Email, GitHub\",\"2025-03-01 18:00:00\",\"In session\",\"In progress\",\"Active\""
        );
        assert!(export.filename.starts_with("session_log_"));
        assert!(export.filename.ends_with(".csv"));
    }

    #[tokio::test]
    async fn closed_sessions_render_duration_and_guard_formulas() {
        let mut closed = record("=HYPERLINK(\"x\")");
        closed.close(Utc.with_ymd_and_hms(2025, 3, 1, 10, 2, 3).unwrap());

        let export = export_sessions(vec![closed], chrono_tz::UTC).await.unwrap();
        let row = export.csv_data.lines().nth(1).unwrap();
        assert!(row.starts_with("\"'=HYPERLINK"));
        assert!(row.contains("\"2025-03-01 10:02:03\""));
        assert!(row.contains("\"1h 2m 3s\""));
        assert!(row.ends_with("\"Finished\""));
    }
}
