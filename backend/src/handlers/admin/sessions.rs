use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppError,
    models::session_record::{
        SessionFilter, SessionRecordResponse, SessionSort, SessionSummary,
    },
    services::session_export::{export_sessions, SessionExport},
    state::AppState,
    types::AccountId,
};

use super::super::parse_id;

fn check_range(filter: &SessionFilter) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(AppError::BadRequest(
                "`start_date` must be before or equal to `end_date`".into(),
            ));
        }
    }
    Ok(())
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
    Query(sort): Query<SessionSort>,
) -> Result<Json<Vec<SessionRecordResponse>>, AppError> {
    check_range(&filter)?;
    let records = state.recorder.list(&filter, sort).await?;
    Ok(Json(
        records.into_iter().map(SessionRecordResponse::from).collect(),
    ))
}

pub async fn session_summary(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<SessionSummary>, AppError> {
    check_range(&filter)?;
    Ok(Json(state.recorder.summary(&filter).await?))
}

/// CSV of the filtered, sorted session log. Times are rendered in the configured zone.
pub async fn export_session_log(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
    Query(sort): Query<SessionSort>,
) -> Result<Json<SessionExport>, AppError> {
    check_range(&filter)?;
    let records = state.recorder.list(&filter, sort).await?;
    let count = records.len();
    let export = export_sessions(records, *state.recorder.time_zone()).await?;
    tracing::info!(rows = count, filename = %export.filename, "Session log exported");
    Ok(Json(export))
}

pub async fn account_sessions(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<SessionRecordResponse>>, AppError> {
    let account_id: AccountId = parse_id(&account_id, "account")?;
    let records = state.recorder.list_for_account(account_id).await?;
    Ok(Json(
        records.into_iter().map(SessionRecordResponse::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn inverted_ranges_are_rejected() {
        let filter = SessionFilter {
            email: None,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        assert!(matches!(check_range(&filter), Err(AppError::BadRequest(_))));

        let same_day = SessionFilter {
            end_date: filter.start_date,
            ..filter
        };
        assert!(check_range(&same_day).is_ok());
    }
}
