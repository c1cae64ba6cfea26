//! Lock table keyed by node.
//!
//! Lock rules:
//! - At most one lock per node. Acquisition is atomic per node through the
//!   map's entry API, so two racing callers cannot both win.
//! - A lock tagged with an operation ID can be re-entered by that
//!   operation. End-user locks carry no operation and are never re-entered.
//! - Internal mutations acquire through [`LockManager::guard`], which also
//!   lets a user pass their own end-user lock (a user editing the file they
//!   checked out). System operations share one holder, so they only pass
//!   locks of their own operation.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use tracing::{debug, info};

use dms_core::error::AppError;
use dms_core::result::AppResult;
use dms_core::types::{LockId, NodeRef, OperationId, UserId};
use dms_entity::lock::{Lock, LockHolder, LockState};

use crate::context::RequestContext;
use crate::repository::TreeState;

use super::operation::Operation;

/// Random bytes behind each lock token.
const TOKEN_BYTES: usize = 32;

/// In-memory lock table.
#[derive(Debug, Default)]
pub struct LockManager {
    /// Node → lock.
    locks: DashMap<NodeRef, Lock>,
}

impl LockManager {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an operation for a request. A caller-supplied operation ID is
    /// reused and left for the caller to release.
    pub fn begin(self: &Arc<Self>, ctx: &RequestContext) -> Operation {
        match ctx.operation_id {
            Some(id) => Operation::shared(id, ctx.holder(), Arc::clone(self)),
            None => Operation::owned(OperationId::new(), ctx.holder(), Arc::clone(self)),
        }
    }

    /// Start an operation acting as the system.
    pub fn begin_system(self: &Arc<Self>) -> Operation {
        Operation::owned(OperationId::new(), LockHolder::System, Arc::clone(self))
    }

    /// Take a lock. Fails with an access error when the node is already
    /// locked, unless the existing lock belongs to `operation_id`, in which
    /// case that lock is returned.
    pub fn lock(&self, node: NodeRef, holder: LockHolder, operation_id: Option<OperationId>) -> AppResult<Lock> {
        match self.locks.entry(node) {
            Entry::Occupied(entry) => match operation_id {
                Some(op) if entry.get().belongs_to(op) => Ok(entry.get().clone()),
                _ => Err(AppError::locked(node)),
            },
            Entry::Vacant(entry) => {
                let lock = new_lock(node, holder, operation_id);
                entry.insert(lock.clone());
                debug!(node = %node, holder = %holder, "Lock acquired");
                Ok(lock)
            }
        }
    }

    /// Release whatever lock a node carries.
    pub fn unlock(&self, node: NodeRef) -> Option<Lock> {
        self.locks.remove(&node).map(|(_, lock)| lock)
    }

    /// Release every lock tagged with an operation. Returns how many were
    /// released.
    pub fn unlock_operation(&self, operation_id: OperationId) -> usize {
        let targets: Vec<NodeRef> = self
            .locks
            .iter()
            .filter(|entry| entry.belongs_to(operation_id))
            .map(|entry| *entry.key())
            .collect();
        targets
            .iter()
            .filter(|node| {
                self.locks
                    .remove_if(*node, |_, lock| lock.belongs_to(operation_id))
                    .is_some()
            })
            .count()
    }

    /// Release the lock on a node if it belongs to `operation_id`.
    pub fn release(&self, node: NodeRef, operation_id: OperationId) -> bool {
        self.locks
            .remove_if(&node, |_, lock| lock.belongs_to(operation_id))
            .is_some()
    }

    /// Take an end-user lock. Fails if the node is locked by anyone,
    /// including the same user.
    pub fn user_lock(&self, node: NodeRef, user: UserId) -> AppResult<Lock> {
        let lock = self.lock(node, LockHolder::User(user), None)?;
        info!(node = %node, user_id = %user, "Node locked by user");
        Ok(lock)
    }

    /// Release an end-user lock. Only the holder may release it; releasing
    /// an unlocked node is a no-op.
    pub fn user_unlock(&self, node: NodeRef, user: UserId) -> AppResult<Option<Lock>> {
        let holder = LockHolder::User(user);
        match self.locks.get(&node).map(|lock| lock.holder) {
            None => Ok(None),
            Some(current) if current == holder => {
                let released = self
                    .locks
                    .remove_if(&node, |_, lock| lock.holder == holder)
                    .map(|(_, lock)| lock);
                info!(node = %node, user_id = %user, "Node unlocked by user");
                Ok(released)
            }
            Some(current) => Err(AppError::access(format!(
                "{node} is locked by {current}, not by user {user}"
            ))
            .for_node(node)),
        }
    }

    /// Lock a node for an internal mutation. Passes when the node is
    /// already held by this operation or by the same user's end-user lock.
    /// Returns whether a new lock was created.
    pub fn guard(&self, node: NodeRef, holder: LockHolder, operation_id: OperationId) -> AppResult<bool> {
        match self.locks.entry(node) {
            Entry::Occupied(entry) => {
                if entry.get().admits(holder, operation_id) {
                    Ok(false)
                } else {
                    Err(AppError::locked(node))
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(new_lock(node, holder, Some(operation_id)));
                Ok(true)
            }
        }
    }

    /// Guard a list of nodes, all or nothing. On conflict every lock this
    /// call created is released again and the conflict is returned.
    pub fn guard_all(&self, nodes: &[NodeRef], holder: LockHolder, operation_id: OperationId) -> AppResult<()> {
        let mut created = Vec::new();
        for node in nodes {
            match self.guard(*node, holder, operation_id) {
                Ok(true) => created.push(*node),
                Ok(false) => {}
                Err(err) => {
                    for node in &created {
                        self.locks
                            .remove_if(node, |_, lock| lock.belongs_to(operation_id));
                    }
                    debug!(
                        conflict = %node,
                        rolled_back = created.len(),
                        "Subtree lock failed, released partial locks"
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Guard a node and, for directories, every descendant.
    pub fn lock_tree(
        &self,
        tree: &TreeState,
        root: NodeRef,
        holder: LockHolder,
        operation_id: OperationId,
    ) -> AppResult<()> {
        self.guard_all(&tree.subtree_nodes(root)?, holder, operation_id)
    }

    /// Release the operation's locks on a node and its descendants.
    pub fn unlock_tree(&self, tree: &TreeState, root: NodeRef, operation_id: OperationId) -> AppResult<usize> {
        Ok(tree
            .subtree_nodes(root)?
            .into_iter()
            .filter(|node| self.release(*node, operation_id))
            .count())
    }

    /// Whether a lock on the node would block `holder` in `operation_id`.
    pub fn is_locked_by_other(&self, node: NodeRef, holder: LockHolder, operation_id: OperationId) -> bool {
        self.locks
            .get(&node)
            .map(|lock| !lock.admits(holder, operation_id))
            .unwrap_or(false)
    }

    /// Fails with an access error when [`is_locked_by_other`](Self::is_locked_by_other).
    pub fn ensure_not_locked_by_other(
        &self,
        node: NodeRef,
        holder: LockHolder,
        operation_id: OperationId,
    ) -> AppResult<()> {
        if self.is_locked_by_other(node, holder, operation_id) {
            Err(AppError::locked(node))
        } else {
            Ok(())
        }
    }

    /// The current lock on a node.
    pub fn get(&self, node: NodeRef) -> Option<Lock> {
        self.locks.get(&node).map(|lock| lock.clone())
    }

    /// Lock status for readers.
    pub fn lock_state(&self, node: NodeRef) -> LockState {
        LockState::from(self.locks.get(&node).as_deref())
    }

    /// Find the lock issued with a token.
    pub fn find_by_token(&self, token: &str) -> Option<Lock> {
        self.locks
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.value().clone())
    }

    /// Every lock held by an operation.
    pub fn locks_for_operation(&self, operation_id: OperationId) -> Vec<Lock> {
        self.locks
            .iter()
            .filter(|entry| entry.belongs_to(operation_id))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of locks currently held.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no locks are held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

fn new_lock(target: NodeRef, holder: LockHolder, operation_id: Option<OperationId>) -> Lock {
    Lock {
        id: LockId::new(),
        target,
        holder,
        token: generate_token(),
        operation_id,
        created_at: Utc::now(),
    }
}

/// URL-safe token from 32 random bytes.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
