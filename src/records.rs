// src/records.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// --- Raw Record Shapes ---
//
// The data-entry boundary historically accepted both camelCase and
// snake_case spellings for most optional fields, and each record source
// names its employee columns differently. All of that tolerance lives here
// as serde aliases; everything downstream only ever sees these canonical
// shapes.

/// Identifier bundle attached to every raw record. No single field is
/// populated consistently across the four record sources, so all three are
/// optional here and resolution happens in `identity::IdentityResolver`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeRef {
    #[serde(alias = "user_id", alias = "employee_id", alias = "employeeId")]
    pub user_id: Option<i64>,
    #[serde(alias = "employee_code", alias = "engineer_id", alias = "engineerId")]
    pub employee_code: Option<String>,
    #[serde(alias = "engineer_name", alias = "engineerName", alias = "name")]
    pub username: Option<String>,
}

impl EmployeeRef {
    /// True when the record carries no identifier at all (after trimming).
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.employee_code.as_deref().map_or(true, |c| c.trim().is_empty())
            && self.username.as_deref().map_or(true, |n| n.trim().is_empty())
    }
}

/// Status an employee claims on a self-submitted activity entry.
/// `Unknown` absorbs upstream data drift instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Present,
    Absent,
    Leave,
    #[serde(other)]
    Unknown,
}

/// Where a daily-target report was filed from. A `Leave` record doubles as
/// the employee's leave application for that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Site,
    Office,
    Leave,
}

/// Current state of a leave application. Transitions are owned by the
/// manager-approval workflow; this service only ever reads the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// Self-submitted raw activity entry. Immutable once reconciled against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: i64,
    #[serde(flatten)]
    pub employee: EmployeeRef,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub status: Option<ActivityStatus>,
    #[serde(default, alias = "start_time")]
    pub start_time: Option<String>,
    #[serde(default, alias = "end_time")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default, alias = "leave_reason")]
    pub leave_reason: Option<String>,
    #[serde(default, alias = "logged_at")]
    pub logged_at: Option<NaiveDateTime>,
}

/// One hourly progress report. Any report at all for a date counts towards
/// "submitted a report" during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyReportRecord {
    pub id: i64,
    #[serde(flatten)]
    pub employee: EmployeeRef,
    #[serde(alias = "report_date", alias = "date")]
    pub report_date: NaiveDate,
    #[serde(alias = "time_period")]
    pub time_period: String,
    #[serde(alias = "project_name")]
    pub project_name: String,
    #[serde(default)]
    pub achieved: Option<String>,
    #[serde(default, alias = "problem_faced")]
    pub problem_faced: Option<String>,
}

/// Daily target / site report. With `location_type == Leave` the record is
/// the leave application itself and the `leave_*` fields apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTargetReportRecord {
    pub id: i64,
    #[serde(flatten)]
    pub employee: EmployeeRef,
    #[serde(alias = "report_date", alias = "date")]
    pub report_date: NaiveDate,
    #[serde(default, alias = "in_time")]
    pub in_time: Option<String>,
    #[serde(default, alias = "out_time")]
    pub out_time: Option<String>,
    #[serde(alias = "location_type", alias = "location")]
    pub location_type: LocationType,
    #[serde(default, alias = "daily_target_achieved")]
    pub daily_target_achieved: Option<String>,
    #[serde(default, alias = "leave_type")]
    pub leave_type: Option<String>,
    #[serde(default, alias = "leave_status")]
    pub leave_status: Option<LeaveStatus>,
    #[serde(default, alias = "leave_approved_by")]
    pub leave_approved_by: Option<String>,
    #[serde(default, alias = "leave_rejection_reason")]
    pub leave_rejection_reason: Option<String>,
}

impl DailyTargetReportRecord {
    /// True when this record is a leave application rather than a work report.
    pub fn is_leave_application(&self) -> bool {
        self.location_type == LocationType::Leave
    }

    /// True when this record counts as a submitted work report (site or
    /// office); leave applications never do.
    pub fn counts_as_report(&self) -> bool {
        matches!(self.location_type, LocationType::Site | LocationType::Office)
    }

    /// Effective application state. A leave record without an explicit
    /// status is an application nobody has acted on yet.
    pub fn effective_leave_status(&self) -> LeaveStatus {
        self.leave_status.unwrap_or(LeaveStatus::Pending)
    }
}

/// Immutable per-request fetch result: the three record streams for one
/// date or date range, exactly as the stores returned them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordSnapshot {
    pub activities: Vec<ActivityRecord>,
    pub hourly_reports: Vec<HourlyReportRecord>,
    pub daily_reports: Vec<DailyTargetReportRecord>,
}

impl RecordSnapshot {
    pub fn record_count(&self) -> usize {
        self.activities.len() + self.hourly_reports.len() + self.daily_reports.len()
    }
}
