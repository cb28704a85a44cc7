// src/reconcile_tests.rs

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::reconcile::{reconcile, AttendanceStatus, DayRecords};
    use crate::records::{
        ActivityRecord, ActivityStatus, DailyTargetReportRecord, EmployeeRef,
        HourlyReportRecord, LeaveStatus, LocationType,
    };

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn employee(code: &str) -> EmployeeRef {
        EmployeeRef {
            employee_code: Some(code.to_string()),
            ..Default::default()
        }
    }

    fn build_activity(
        id: i64,
        code: &str,
        date: &str,
        status: Option<ActivityStatus>,
    ) -> ActivityRecord {
        ActivityRecord {
            id,
            employee: employee(code),
            date: d(date),
            time: None,
            project: Some("Riverside".to_string()),
            status,
            start_time: None,
            end_time: None,
            problem: None,
            leave_reason: None,
            logged_at: None,
        }
    }

    fn build_hourly(id: i64, code: &str, date: &str) -> HourlyReportRecord {
        HourlyReportRecord {
            id,
            employee: employee(code),
            report_date: d(date),
            time_period: "09:00-10:00".to_string(),
            project_name: "Riverside".to_string(),
            achieved: Some("site walkthrough".to_string()),
            problem_faced: None,
        }
    }

    fn build_daily(
        id: i64,
        code: &str,
        date: &str,
        location: LocationType,
        leave_status: Option<LeaveStatus>,
    ) -> DailyTargetReportRecord {
        DailyTargetReportRecord {
            id,
            employee: employee(code),
            report_date: d(date),
            in_time: Some("09:00".to_string()),
            out_time: None,
            location_type: location,
            daily_target_achieved: None,
            leave_type: None,
            leave_status,
            leave_approved_by: None,
            leave_rejection_reason: None,
        }
    }

    // --- Leave application precedence ---

    #[test]
    fn approved_leave_is_terminal() {
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Approved));
        // A report submitted after approval does not override it.
        let hourly = build_hourly(2, "E002", "2024-01-10");
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::OnLeave);
    }

    #[test]
    fn rejected_leave_with_report_becomes_present() {
        // Report submission wins over a rejected leave application.
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Rejected));
        let hourly = build_hourly(2, "E002", "2024-01-10");
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Present);
    }

    #[test]
    fn rejected_leave_without_report_is_absent() {
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Rejected));
        let day = DayRecords {
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Absent);
    }

    #[test]
    fn pending_leave_stays_pending_even_with_report() {
        // The override applies to rejected applications only.
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Pending));
        let hourly = build_hourly(2, "E002", "2024-01-10");
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::PendingApproval);
    }

    #[test]
    fn leave_without_status_counts_as_pending() {
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, None);
        let day = DayRecords {
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::PendingApproval);
    }

    #[test]
    fn cancelled_leave_falls_through_to_report() {
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Cancelled));
        let hourly = build_hourly(2, "E002", "2024-01-10");
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Present);
    }

    #[test]
    fn cancelled_leave_with_nothing_else_is_absent() {
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Cancelled));
        let day = DayRecords {
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Absent);
    }

    // --- Report presence ---

    #[test]
    fn hourly_report_alone_means_present() {
        let hourly = build_hourly(1, "E001", "2024-01-10");
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Present);
    }

    #[test]
    fn site_or_office_daily_report_means_present() {
        for location in [LocationType::Site, LocationType::Office] {
            let daily = build_daily(1, "E001", "2024-01-10", location, None);
            let day = DayRecords {
                daily_reports: vec![&daily],
                ..Default::default()
            };
            assert_eq!(reconcile(&day), AttendanceStatus::Present);
        }
    }

    #[test]
    fn hourly_and_daily_report_together_still_one_presence() {
        let hourly = build_hourly(1, "E001", "2024-01-10");
        let daily = build_daily(2, "E001", "2024-01-10", LocationType::Office, None);
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            daily_reports: vec![&daily],
            ..Default::default()
        };
        assert!(day.has_submitted_report());
        assert_eq!(reconcile(&day), AttendanceStatus::Present);
    }

    // --- Raw status fallback ---

    #[test]
    fn activity_leave_status_falls_back_to_on_leave() {
        // Only record for the day is a self-submitted "leave" entry.
        let activity = build_activity(1, "E001", "2024-01-10", Some(ActivityStatus::Leave));
        let day = DayRecords {
            activities: vec![&activity],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::OnLeave);
    }

    #[test]
    fn activity_status_taken_verbatim() {
        let cases = [
            (ActivityStatus::Present, AttendanceStatus::Present),
            (ActivityStatus::Absent, AttendanceStatus::Absent),
            (ActivityStatus::Unknown, AttendanceStatus::Unknown),
        ];
        for (raw, expected) in cases {
            let activity = build_activity(1, "E001", "2024-01-10", Some(raw));
            let day = DayRecords {
                activities: vec![&activity],
                ..Default::default()
            };
            assert_eq!(reconcile(&day), expected);
        }
    }

    #[test]
    fn report_beats_activity_status() {
        let activity = build_activity(1, "E001", "2024-01-10", Some(ActivityStatus::Absent));
        let daily = build_daily(2, "E001", "2024-01-10", LocationType::Site, None);
        let day = DayRecords {
            activities: vec![&activity],
            daily_reports: vec![&daily],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Present);
    }

    #[test]
    fn activity_without_status_is_absent() {
        let activity = build_activity(1, "E001", "2024-01-10", None);
        let day = DayRecords {
            activities: vec![&activity],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), AttendanceStatus::Absent);
    }

    #[test]
    fn no_records_at_all_is_absent() {
        let day = DayRecords::default();
        assert_eq!(reconcile(&day), AttendanceStatus::Absent);
    }

    // --- Determinism ---

    #[test]
    fn reconcile_is_idempotent() {
        let leave = build_daily(1, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Rejected));
        let hourly = build_hourly(2, "E002", "2024-01-10");
        let day = DayRecords {
            hourly_reports: vec![&hourly],
            daily_reports: vec![&leave],
            ..Default::default()
        };
        assert_eq!(reconcile(&day), reconcile(&day));
    }

    #[test]
    fn duplicate_daily_reports_first_leave_variant_wins() {
        let office = build_daily(1, "E002", "2024-01-10", LocationType::Office, None);
        let approved =
            build_daily(2, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Approved));
        let pending =
            build_daily(3, "E002", "2024-01-10", LocationType::Leave, Some(LeaveStatus::Pending));
        let day = DayRecords {
            daily_reports: vec![&office, &approved, &pending],
            ..Default::default()
        };
        assert_eq!(day.leave_application().map(|r| r.id), Some(2));
        assert_eq!(reconcile(&day), AttendanceStatus::OnLeave);
    }
}
