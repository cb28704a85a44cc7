// src/access.rs

use serde::Serialize;
use tracing::{debug, warn};

use crate::identity::IdentityResolver;
use crate::records::{EmployeeRef, RecordSnapshot};

// Role strings arrive free-form from the auth context ("Team Leader",
// "Sr. Manager", "admin"); any of these substrings grants full visibility.
const FULL_ACCESS_ROLE_KEYWORDS: [&str; 4] = ["manager", "team leader", "group leader", "admin"];

/// Visibility granted to a caller, echoed back in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Full,
    Restricted,
}

/// Explicit per-request caller context supplied by the auth collaborator.
/// Threaded through every filter call; there is no ambient current user.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub identity: EmployeeRef,
    pub role: String,
}

pub fn access_level_for_role(role: &str) -> AccessLevel {
    let role = role.trim().to_lowercase();
    if FULL_ACCESS_ROLE_KEYWORDS.iter().any(|kw| role.contains(kw)) {
        AccessLevel::Full
    } else {
        AccessLevel::Restricted
    }
}

/// Restricts a raw snapshot to what the caller may see, strictly before any
/// grouping or reconciliation. Full-visibility callers get the snapshot
/// unchanged; everyone else keeps only records resolving to their own
/// identity (matched by any of the resolver's three keys).
pub fn filter_snapshot(
    mut snapshot: RecordSnapshot,
    resolver: &mut IdentityResolver,
    caller: &CallerContext,
) -> (RecordSnapshot, AccessLevel) {
    let level = access_level_for_role(&caller.role);
    if level == AccessLevel::Full {
        debug!(
            "Caller role '{}' has full visibility over {} records",
            caller.role,
            snapshot.record_count()
        );
        return (snapshot, level);
    }

    // Resolve every reference up front so records that bridge two partial
    // identities merge them before any record is kept or dropped; retention
    // must not depend on record order.
    for record in &snapshot.activities {
        resolver.resolve(&record.employee);
    }
    for record in &snapshot.hourly_reports {
        resolver.resolve(&record.employee);
    }
    for record in &snapshot.daily_reports {
        resolver.resolve(&record.employee);
    }

    let caller_id = match resolver.resolve(&caller.identity) {
        Some(id) => id,
        None => {
            warn!(
                "Restricted caller with role '{}' has no resolvable identity; hiding all records",
                caller.role
            );
            snapshot.activities.clear();
            snapshot.hourly_reports.clear();
            snapshot.daily_reports.clear();
            return (snapshot, level);
        }
    };

    let before = snapshot.record_count();
    snapshot.activities.retain(|r| {
        resolver
            .resolve(&r.employee)
            .map_or(false, |id| resolver.canonical(id) == resolver.canonical(caller_id))
    });
    snapshot.hourly_reports.retain(|r| {
        resolver
            .resolve(&r.employee)
            .map_or(false, |id| resolver.canonical(id) == resolver.canonical(caller_id))
    });
    snapshot.daily_reports.retain(|r| {
        resolver
            .resolve(&r.employee)
            .map_or(false, |id| resolver.canonical(id) == resolver.canonical(caller_id))
    });
    debug!(
        "Restricted caller kept {} of {} records",
        snapshot.record_count(),
        before
    );

    (snapshot, level)
}
