// src/identity.rs

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::records::EmployeeRef;

/// Handle into an `IdentityResolver`'s identity table. Handles returned by
/// `resolve` are always canonical at the time of return; hold onto the
/// resolver and re-canonicalize if further records may merge identities.
pub type EmployeeId = usize;

/// Valid employee codes look like `E7` or `E00123`. Managers may have none.
static EMPLOYEE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^E\d{1,5}$").expect("employee code regex"));

/// Canonical employee reference. At least one key is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeIdentity {
    pub internal_id: Option<i64>,
    pub employee_code: Option<String>,
    pub username: Option<String>,
}

impl EmployeeIdentity {
    /// Human-readable label used in deduplicated name lists.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.employee_code.clone())
            .or_else(|| self.internal_id.map(|id| format!("#{id}")))
            .unwrap_or_else(|| "(unattributed)".to_string())
    }
}

/// Canonicalizes the heterogeneous identifiers found across the record
/// sources into one identity per employee.
///
/// Matching precedence on trimmed, case-preserved values:
/// 1. exact employee code,
/// 2. exact username / display name,
/// 3. exact internal numeric id.
///
/// Two records belong to the same employee when *any* of the three keys
/// coincide. A record that bridges two previously separate identities
/// (e.g. one seen only by code, one only by name) merges them.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    identities: Vec<EmployeeIdentity>,
    // redirect[i] == i for canonical entries; merged entries point at their
    // survivor. Chains stay short because merges always target a canonical id.
    redirect: Vec<EmployeeId>,
    by_code: HashMap<String, EmployeeId>,
    by_name: HashMap<String, EmployeeId>,
    by_internal_id: HashMap<i64, EmployeeId>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a raw reference to its canonical identity, creating or
    /// merging identities as needed. Returns `None` for unattributable
    /// references (no usable identifier at all).
    pub fn resolve(&mut self, reference: &EmployeeRef) -> Option<EmployeeId> {
        let code = Self::clean_code(reference);
        let name = reference
            .username
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let internal_id = reference.user_id;

        if code.is_none() && name.is_none() && internal_id.is_none() {
            return None;
        }

        // Candidate identities in key-precedence order.
        let mut candidates: Vec<EmployeeId> = Vec::new();
        if let Some(code) = code {
            if let Some(&id) = self.by_code.get(code) {
                candidates.push(self.canonical(id));
            }
        }
        if let Some(name) = name {
            if let Some(&id) = self.by_name.get(name) {
                candidates.push(self.canonical(id));
            }
        }
        if let Some(internal) = internal_id {
            if let Some(&id) = self.by_internal_id.get(&internal) {
                candidates.push(self.canonical(id));
            }
        }
        candidates.dedup();

        let target = match candidates.first().copied() {
            Some(id) => id,
            None => {
                let id = self.identities.len();
                self.identities.push(EmployeeIdentity::default());
                self.redirect.push(id);
                id
            }
        };

        // A reference matching more than one existing identity proves they
        // were the same employee all along.
        for &other in candidates.iter().skip(1) {
            if other != target {
                self.merge(target, other);
            }
        }

        self.absorb_keys(target, code, name, internal_id);
        Some(target)
    }

    /// Follows redirects to the surviving identity for a handle.
    pub fn canonical(&self, mut id: EmployeeId) -> EmployeeId {
        while self.redirect[id] != id {
            id = self.redirect[id];
        }
        id
    }

    /// Canonical identity for a (possibly stale) handle.
    pub fn identity(&self, id: EmployeeId) -> &EmployeeIdentity {
        &self.identities[self.canonical(id)]
    }

    /// Number of distinct (canonical) identities seen so far.
    pub fn len(&self) -> usize {
        self.redirect
            .iter()
            .enumerate()
            .filter(|&(i, &parent)| i == parent)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    fn merge(&mut self, survivor: EmployeeId, absorbed: EmployeeId) {
        debug!(
            "Merging identity {:?} into {:?}",
            self.identities[absorbed], self.identities[survivor]
        );
        let absorbed_identity = std::mem::take(&mut self.identities[absorbed]);
        self.redirect[absorbed] = survivor;

        let target = &mut self.identities[survivor];
        if target.internal_id.is_none() {
            target.internal_id = absorbed_identity.internal_id;
        }
        if target.employee_code.is_none() {
            target.employee_code = absorbed_identity.employee_code;
        }
        if target.username.is_none() {
            target.username = absorbed_identity.username;
        }
    }

    fn absorb_keys(
        &mut self,
        id: EmployeeId,
        code: Option<&str>,
        name: Option<&str>,
        internal_id: Option<i64>,
    ) {
        if let Some(code) = code {
            let identity = &mut self.identities[id];
            match identity.employee_code.as_deref() {
                None => identity.employee_code = Some(code.to_string()),
                Some(existing) if existing != code => {
                    warn!(
                        "Employee {} already has code {}; also indexing code {}",
                        identity.display_name(),
                        existing,
                        code
                    );
                }
                _ => {}
            }
            self.by_code.insert(code.to_string(), id);
        }
        if let Some(name) = name {
            let identity = &mut self.identities[id];
            if identity.username.is_none() {
                identity.username = Some(name.to_string());
            }
            self.by_name.insert(name.to_string(), id);
        }
        if let Some(internal) = internal_id {
            let identity = &mut self.identities[id];
            if identity.internal_id.is_none() {
                identity.internal_id = Some(internal);
            }
            self.by_internal_id.insert(internal, id);
        }
    }

    /// A malformed code cannot be trusted as a join key; the reference may
    /// still resolve through its other identifiers.
    fn clean_code(reference: &EmployeeRef) -> Option<&str> {
        let code = reference.employee_code.as_deref().map(str::trim)?;
        if code.is_empty() {
            return None;
        }
        if !EMPLOYEE_CODE_RE.is_match(code) {
            warn!("Ignoring malformed employee code '{}'", code);
            return None;
        }
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(
        code: Option<&str>,
        name: Option<&str>,
        user_id: Option<i64>,
    ) -> EmployeeRef {
        EmployeeRef {
            user_id,
            employee_code: code.map(String::from),
            username: name.map(String::from),
        }
    }

    #[test]
    fn same_code_resolves_to_same_identity() {
        let mut resolver = IdentityResolver::new();
        let a = resolver.resolve(&reference(Some("E001"), None, None)).unwrap();
        let b = resolver
            .resolve(&reference(Some("E001"), Some("Ravi"), None))
            .unwrap();
        assert_eq!(resolver.canonical(a), resolver.canonical(b));
        assert_eq!(resolver.identity(a).username.as_deref(), Some("Ravi"));
    }

    #[test]
    fn name_only_and_code_only_merge_through_bridging_record() {
        let mut resolver = IdentityResolver::new();
        let by_code = resolver.resolve(&reference(Some("E007"), None, None)).unwrap();
        let by_name = resolver.resolve(&reference(None, Some("Asha"), None)).unwrap();
        assert_ne!(resolver.canonical(by_code), resolver.canonical(by_name));

        // A record carrying both keys proves they were one employee.
        let bridged = resolver
            .resolve(&reference(Some("E007"), Some("Asha"), None))
            .unwrap();
        assert_eq!(resolver.canonical(by_code), resolver.canonical(by_name));
        assert_eq!(resolver.canonical(bridged), resolver.canonical(by_code));

        let identity = resolver.identity(bridged);
        assert_eq!(identity.employee_code.as_deref(), Some("E007"));
        assert_eq!(identity.username.as_deref(), Some("Asha"));
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn internal_id_joins_records_without_names() {
        let mut resolver = IdentityResolver::new();
        let a = resolver.resolve(&reference(None, None, Some(42))).unwrap();
        let b = resolver.resolve(&reference(None, Some("Mina"), Some(42))).unwrap();
        assert_eq!(resolver.canonical(a), resolver.canonical(b));
        assert_eq!(resolver.identity(a).display_name(), "Mina");
    }

    #[test]
    fn values_are_trimmed_but_case_preserved() {
        let mut resolver = IdentityResolver::new();
        let a = resolver.resolve(&reference(None, Some("  Ravi "), None)).unwrap();
        let b = resolver.resolve(&reference(None, Some("Ravi"), None)).unwrap();
        let c = resolver.resolve(&reference(None, Some("ravi"), None)).unwrap();
        assert_eq!(resolver.canonical(a), resolver.canonical(b));
        assert_ne!(resolver.canonical(a), resolver.canonical(c));
    }

    #[test]
    fn malformed_code_is_not_a_join_key() {
        let mut resolver = IdentityResolver::new();
        let a = resolver
            .resolve(&reference(Some("EMP-9"), Some("Noor"), None))
            .unwrap();
        assert_eq!(resolver.identity(a).employee_code, None);

        // Code alone, malformed: nothing left to attribute by.
        assert_eq!(resolver.resolve(&reference(Some("EMP-9"), None, None)), None);
    }

    #[test]
    fn empty_reference_is_unattributable() {
        let mut resolver = IdentityResolver::new();
        assert_eq!(resolver.resolve(&reference(None, None, None)), None);
        assert_eq!(resolver.resolve(&reference(Some("  "), Some(""), None)), None);
    }

    #[test]
    fn manager_without_code_is_valid() {
        let mut resolver = IdentityResolver::new();
        let id = resolver
            .resolve(&reference(None, Some("Tobias"), Some(1)))
            .unwrap();
        let identity = resolver.identity(id);
        assert_eq!(identity.employee_code, None);
        assert_eq!(identity.display_name(), "Tobias");
    }
}
