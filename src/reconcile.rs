// src/reconcile.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::identity::{EmployeeId, IdentityResolver};
use crate::records::{
    ActivityRecord, ActivityStatus, DailyTargetReportRecord, HourlyReportRecord, LeaveStatus,
    RecordSnapshot,
};

/// Single authoritative classification per employee per date. Derived on
/// every request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    OnLeave,
    PendingApproval,
    Unknown,
}

/// Everything submitted for one `(employee, date)` pair. The daily report
/// is expected to be unique per pair; duplicates are tolerated and logged
/// during grouping.
#[derive(Debug, Default)]
pub struct DayRecords<'a> {
    pub activities: Vec<&'a ActivityRecord>,
    pub hourly_reports: Vec<&'a HourlyReportRecord>,
    pub daily_reports: Vec<&'a DailyTargetReportRecord>,
}

impl<'a> DayRecords<'a> {
    /// A submitted report is at least one hourly report OR a site/office
    /// daily report. Either alone suffices; having both never counts twice.
    pub fn has_submitted_report(&self) -> bool {
        !self.hourly_reports.is_empty()
            || self.daily_reports.iter().any(|r| r.counts_as_report())
    }

    /// The leave application for the day, if any. With duplicate daily
    /// reports the first leave variant wins.
    pub fn leave_application(&self) -> Option<&'a DailyTargetReportRecord> {
        self.daily_reports
            .iter()
            .copied()
            .find(|r| r.is_leave_application())
    }
}

pub type DayKey = (EmployeeId, NaiveDate);

/// Groups a filtered snapshot by `(employee, date)`. Unattributable records
/// are dropped here (and logged); they remain visible in raw record lists
/// but never contribute to per-employee aggregates.
///
/// Resolution runs in two passes: the first forces any identity merges the
/// record set implies, so the keys taken in the second pass are stable.
pub fn group_by_employee_date<'a>(
    snapshot: &'a RecordSnapshot,
    resolver: &mut IdentityResolver,
) -> BTreeMap<DayKey, DayRecords<'a>> {
    for record in &snapshot.activities {
        resolver.resolve(&record.employee);
    }
    for record in &snapshot.hourly_reports {
        resolver.resolve(&record.employee);
    }
    for record in &snapshot.daily_reports {
        resolver.resolve(&record.employee);
    }

    let mut grouped: BTreeMap<DayKey, DayRecords<'a>> = BTreeMap::new();
    let mut unattributable = 0usize;

    for record in &snapshot.activities {
        match resolver.resolve(&record.employee) {
            Some(id) => {
                let key = (resolver.canonical(id), record.date);
                grouped.entry(key).or_default().activities.push(record);
            }
            None => unattributable += 1,
        }
    }
    for record in &snapshot.hourly_reports {
        match resolver.resolve(&record.employee) {
            Some(id) => {
                let key = (resolver.canonical(id), record.report_date);
                grouped.entry(key).or_default().hourly_reports.push(record);
            }
            None => unattributable += 1,
        }
    }
    for record in &snapshot.daily_reports {
        match resolver.resolve(&record.employee) {
            Some(id) => {
                let key = (resolver.canonical(id), record.report_date);
                let day = grouped.entry(key).or_default();
                if !day.daily_reports.is_empty() {
                    warn!(
                        "Multiple daily reports for employee {} on {}; keeping all, first leave variant wins",
                        resolver.identity(key.0).display_name(),
                        record.report_date
                    );
                }
                day.daily_reports.push(record);
            }
            None => unattributable += 1,
        }
    }

    if unattributable > 0 {
        warn!(
            "{} records had no resolvable employee and were excluded from per-employee aggregates",
            unattributable
        );
    }
    debug!(
        "Grouped snapshot into {} (employee, date) pairs",
        grouped.len()
    );
    grouped
}

/// Computes the single attendance status for one `(employee, date)` pair.
/// Pure and deterministic.
///
/// Precedence:
/// 1. A leave application decides first: approved leave is terminal;
///    rejected leave is overridden to present by a submitted report (and is
///    absent without one); pending leave is pending regardless of reports;
///    a cancelled application is ignored entirely.
/// 2. Otherwise a submitted report means present; failing that, the first
///    activity entry with an explicit status is taken verbatim; no record
///    at all means absent.
pub fn reconcile(day: &DayRecords<'_>) -> AttendanceStatus {
    if let Some(application) = day.leave_application() {
        match application.effective_leave_status() {
            LeaveStatus::Approved => return AttendanceStatus::OnLeave,
            LeaveStatus::Rejected => {
                return if day.has_submitted_report() {
                    AttendanceStatus::Present
                } else {
                    AttendanceStatus::Absent
                };
            }
            LeaveStatus::Pending => return AttendanceStatus::PendingApproval,
            LeaveStatus::Cancelled => {} // as if no application existed
        }
    }

    if day.has_submitted_report() {
        return AttendanceStatus::Present;
    }

    if let Some(status) = day.activities.iter().find_map(|a| a.status) {
        return match status {
            ActivityStatus::Present => AttendanceStatus::Present,
            ActivityStatus::Absent => AttendanceStatus::Absent,
            ActivityStatus::Leave => AttendanceStatus::OnLeave,
            ActivityStatus::Unknown => AttendanceStatus::Unknown,
        };
    }

    AttendanceStatus::Absent
}
