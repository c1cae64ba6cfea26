//! Request context carrying the acting user and the optional shared
//! operation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dms_auth::Principal;
use dms_core::types::{CompanyId, OperationId, UserId};
use dms_entity::lock::LockHolder;

/// Context for the current request.
///
/// Built by the host and passed into every service method so that each
/// operation knows *who* is acting and whether it runs inside a wider
/// operation that already holds locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The acting user's ID.
    pub user_id: UserId,
    /// Whether the user bypasses permission checks.
    pub is_superuser: bool,
    /// Companies the user belongs to, for storage company scoping.
    pub company_ids: BTreeSet<CompanyId>,
    /// Operation shared by the caller. When absent, each mutation runs
    /// under its own operation and releases its locks on completion.
    pub operation_id: Option<OperationId>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a context for a regular user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superuser: false,
            company_ids: BTreeSet::new(),
            operation_id: None,
            request_time: Utc::now(),
        }
    }

    /// Creates a context for a superuser.
    pub fn superuser(user_id: UserId) -> Self {
        Self {
            is_superuser: true,
            ..Self::new(user_id)
        }
    }

    /// Runs subsequent calls inside a caller-owned operation.
    pub fn with_operation(mut self, operation_id: OperationId) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    /// Sets the companies the user belongs to.
    pub fn with_companies(mut self, companies: impl IntoIterator<Item = CompanyId>) -> Self {
        self.company_ids = companies.into_iter().collect();
        self
    }

    /// The identity used for permission evaluation.
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            is_superuser: self.is_superuser,
        }
    }

    /// The identity used for locks.
    pub fn holder(&self) -> LockHolder {
        LockHolder::User(self.user_id)
    }
}
