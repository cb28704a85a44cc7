// src/store.rs

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::records::{
    ActivityRecord, DailyTargetReportRecord, HourlyReportRecord, RecordSnapshot,
};
use crate::upstream::UpstreamError;

/// A failed fetch fails the whole request; a partial snapshot could
/// misrepresent who was present or absent, so none is ever returned.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("record store returned malformed data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("upstream record service error: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Source of self-submitted activity entries.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn activities_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError>;
}

/// Source of hourly and daily-target reports (including leave applications).
#[async_trait]
pub trait ReportingStore: Send + Sync {
    async fn hourly_reports_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HourlyReportRecord>, StoreError>;

    async fn daily_reports_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyTargetReportRecord>, StoreError>;
}

/// Fetches all three record streams for a range. The queries are
/// independent and issued concurrently; this is the only suspension point
/// in a request, everything after it is pure computation.
pub async fn fetch_snapshot(
    activities: &dyn ActivityStore,
    reports: &dyn ReportingStore,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<RecordSnapshot, StoreError> {
    let (activities, hourly_reports, daily_reports) = tokio::try_join!(
        activities.activities_in_range(from, to),
        reports.hourly_reports_in_range(from, to),
        reports.daily_reports_in_range(from, to),
    )?;

    debug!(
        "Fetched snapshot for {}..{}: {} activities, {} hourly reports, {} daily reports",
        from,
        to,
        activities.len(),
        hourly_reports.len(),
        daily_reports.len()
    );

    Ok(RecordSnapshot {
        activities,
        hourly_reports,
        daily_reports,
    })
}

/// Record store backed by a JSON snapshot held in memory. Serves local
/// development from a fixture file and doubles as the test double for the
/// store traits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    data: RecordSnapshot,
}

impl InMemoryRecordStore {
    pub fn new(data: RecordSnapshot) -> Self {
        Self { data }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let data: RecordSnapshot = serde_json::from_str(&raw)?;
        info!(
            "Loaded record fixture {} ({} records)",
            path.display(),
            data.record_count()
        );
        Ok(Self { data })
    }
}

#[async_trait]
impl ActivityStore for InMemoryRecordStore {
    async fn activities_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        Ok(self
            .data
            .activities
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportingStore for InMemoryRecordStore {
    async fn hourly_reports_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HourlyReportRecord>, StoreError> {
        Ok(self
            .data
            .hourly_reports
            .iter()
            .filter(|r| r.report_date >= from && r.report_date <= to)
            .cloned()
            .collect())
    }

    async fn daily_reports_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyTargetReportRecord>, StoreError> {
        Ok(self
            .data
            .daily_reports
            .iter()
            .filter(|r| r.report_date >= from && r.report_date <= to)
            .cloned()
            .collect())
    }
}
