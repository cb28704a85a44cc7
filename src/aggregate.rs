// src/aggregate.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::identity::{EmployeeId, EmployeeIdentity, IdentityResolver};
use crate::reconcile::{reconcile, AttendanceStatus, DayKey, DayRecords};
use crate::records::ActivityRecord;

/// Attendance counts for one date. `total` is the number of employees with
/// at least one record that day; employees with no records are omitted,
/// never counted as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub on_leave: usize,
    pub pending_approval: usize,
    pub unknown: usize,
}

impl DateSummary {
    fn tally(&mut self, status: AttendanceStatus) {
        self.total += 1;
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::OnLeave => self.on_leave += 1,
            AttendanceStatus::PendingApproval => self.pending_approval += 1,
            AttendanceStatus::Unknown => self.unknown += 1,
        }
    }
}

/// One reconciled row for presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDayStatus {
    pub employee: EmployeeIdentity,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Full per-date view: summary counts, one status row per employee, and
/// deduplicated name lists keyed by resolved identity rather than raw record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateAttendance {
    pub date: NaiveDate,
    pub summary: DateSummary,
    pub statuses: Vec<EmployeeDayStatus>,
    pub present_employees: Vec<String>,
    pub absent_employees: Vec<String>,
    pub leave_employees: Vec<String>,
}

/// Range rollup. `total_days` counts only dates with at least one record;
/// `total_employees` is the size of the identity union across those dates.
#[derive(Debug, Clone, Default)]
pub struct RangeSummary {
    pub per_date: BTreeMap<NaiveDate, DateSummary>,
    pub total_days: usize,
    pub total_employees: usize,
}

/// Runs the reconciler over every employee with records on `date` and rolls
/// the results up.
pub fn aggregate_date(
    date: NaiveDate,
    grouped: &BTreeMap<DayKey, DayRecords<'_>>,
    resolver: &IdentityResolver,
) -> DateAttendance {
    let mut summary = DateSummary::default();
    let mut statuses = Vec::new();
    let mut present: BTreeSet<String> = BTreeSet::new();
    let mut absent: BTreeSet<String> = BTreeSet::new();
    let mut leave: BTreeSet<String> = BTreeSet::new();

    for ((employee_id, day_date), day) in grouped {
        if *day_date != date {
            continue;
        }
        let status = reconcile(day);
        summary.tally(status);

        let identity = resolver.identity(*employee_id).clone();
        let name = identity.display_name();
        match status {
            AttendanceStatus::Present => {
                present.insert(name);
            }
            AttendanceStatus::Absent => {
                absent.insert(name);
            }
            AttendanceStatus::OnLeave => {
                leave.insert(name);
            }
            AttendanceStatus::PendingApproval | AttendanceStatus::Unknown => {}
        }
        statuses.push(EmployeeDayStatus {
            employee: identity,
            date,
            status,
        });
    }

    debug!(
        "Reconciled {} employees for {}: {:?}",
        summary.total, date, summary
    );

    DateAttendance {
        date,
        summary,
        statuses,
        present_employees: present.into_iter().collect(),
        absent_employees: absent.into_iter().collect(),
        leave_employees: leave.into_iter().collect(),
    }
}

/// Rolls reconciliation up over `[start, end]` inclusive. An employee with
/// records on several dates appears in each date's summary independently
/// but only once in the range-level union count.
pub fn aggregate_range(
    start: NaiveDate,
    end: NaiveDate,
    grouped: &BTreeMap<DayKey, DayRecords<'_>>,
    resolver: &IdentityResolver,
) -> RangeSummary {
    let mut per_date: BTreeMap<NaiveDate, DateSummary> = BTreeMap::new();
    let mut employees: HashSet<EmployeeId> = HashSet::new();

    for ((employee_id, date), day) in grouped {
        if *date < start || *date > end {
            continue;
        }
        let status = reconcile(day);
        per_date.entry(*date).or_default().tally(status);
        employees.insert(resolver.canonical(*employee_id));
    }

    let summary = RangeSummary {
        total_days: per_date.len(),
        total_employees: employees.len(),
        per_date,
    };
    debug!(
        "Range {}..{}: {} days with data, {} distinct employees",
        start, end, summary.total_days, summary.total_employees
    );
    summary
}

/// Distinct dates within the trailing 30 days (ending at `today`) that have
/// at least one visible activity record, newest first, capped at 30.
pub fn available_dates(activities: &[ActivityRecord], today: NaiveDate) -> Vec<NaiveDate> {
    let cutoff = today - Duration::days(30);
    let mut dates: Vec<NaiveDate> = activities
        .iter()
        .map(|a| a.date)
        .filter(|d| *d > cutoff && *d <= today)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect();
    dates.truncate(30);
    dates
}
