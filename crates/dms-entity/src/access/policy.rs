//! Per-directory access policy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dms_core::types::AccessGroupId;

/// Explicit groups attached to a directory plus the derived effective set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Groups attached directly.
    pub explicit: BTreeSet<AccessGroupId>,
    /// Whether the parent's effective groups are inherited.
    pub inherit: bool,
    /// Derived: explicit groups plus, when inheriting, the parent's
    /// effective groups.
    pub effective: BTreeSet<AccessGroupId>,
}

impl AccessPolicy {
    /// A policy with explicit groups that inherits from its parent.
    pub fn inheriting(explicit: impl IntoIterator<Item = AccessGroupId>) -> Self {
        Self {
            explicit: explicit.into_iter().collect(),
            inherit: true,
            effective: BTreeSet::new(),
        }
    }

    /// Compute the effective set given the parent's effective set.
    pub fn resolve(&self, parent_effective: Option<&BTreeSet<AccessGroupId>>) -> BTreeSet<AccessGroupId> {
        let mut effective = self.explicit.clone();
        if self.inherit {
            if let Some(parent) = parent_effective {
                effective.extend(parent.iter().copied());
            }
        }
        effective
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::inheriting([])
    }
}
