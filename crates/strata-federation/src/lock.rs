//! In-process hierarchical path locks.
//!
//! Mutations lock the namespace path of their target: shared (read) locks
//! on every ancestor level root-to-parent, then an exclusive (write) lock
//! on the target itself. Two mutations conflict exactly when one targets
//! an ancestor of the other or both target the same identifier; siblings
//! proceed concurrently.
//!
//! Acquisition order is fixed root-to-leaf, so no cycle between waiters
//! can form. Every step is bounded by a single deadline; exceeding it
//! fails the acquisition with `LockTimeout` and drops everything already
//! held.
//!
//! This lock is a fast path for a single process. Cross-process
//! correctness never depends on it: the entity store's CAS version check
//! is the final arbiter of every write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tokio::time::{timeout_at, Instant};

use strata_core::error::{Error, Result};
use strata_core::ident::EntityIdent;
use strata_core::name::Name;

fn poison<T>(_: PoisonError<T>) -> Error {
    Error::internal("lock tree mutex poisoned")
}

/// One node in the lock tree; holds the lock for its path plus its
/// children.
#[derive(Default)]
struct LockNode {
    lock: Arc<RwLock<()>>,
    children: Mutex<HashMap<Name, Arc<LockNode>>>,
}

impl LockNode {
    fn child(&self, name: &Name) -> Result<Arc<LockNode>> {
        let mut children = self.children.lock().map_err(poison)?;
        Ok(Arc::clone(
            children.entry(name.clone()).or_insert_with(|| {
                Arc::new(LockNode::default())
            }),
        ))
    }
}

/// Hierarchical path lock manager.
///
/// Nodes are created on demand and retained for the process lifetime; the
/// tree is bounded by the number of distinct identifiers ever mutated.
#[derive(Clone, Default)]
pub struct PathLockManager {
    root: Arc<LockNode>,
}

impl PathLockManager {
    /// Creates an empty lock tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the path lock for a mutation of `ident`.
    ///
    /// Takes shared locks on every ancestor level and an exclusive lock
    /// on the target, all within one `wait` budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockTimeout`] when the budget elapses before all
    /// locks are held; everything acquired so far is released.
    pub async fn acquire(&self, ident: &EntityIdent, wait: Duration) -> Result<PathLockGuard> {
        let deadline = Instant::now() + wait;
        let timed_out = || Error::LockTimeout {
            path: ident.to_string(),
            waited_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
        };

        let mut node = Arc::clone(&self.root);
        let mut ancestors = Vec::with_capacity(ident.depth());
        for level in ident.namespace.levels() {
            node = node.child(level)?;
            let guard = timeout_at(deadline, Arc::clone(&node.lock).read_owned())
                .await
                .map_err(|_| timed_out())?;
            ancestors.push(guard);
        }

        let target = node.child(&ident.name)?;
        let write = timeout_at(deadline, Arc::clone(&target.lock).write_owned())
            .await
            .map_err(|_| timed_out())?;

        Ok(PathLockGuard {
            _write: write,
            _ancestors: ancestors,
        })
    }
}

/// Guard for a held path lock.
///
/// Releases on drop on every exit path. Field order matters: the
/// exclusive target lock is released before the shared ancestor locks.
#[derive(Debug)]
pub struct PathLockGuard {
    _write: OwnedRwLockWriteGuard<()>,
    _ancestors: Vec<OwnedRwLockReadGuard<()>>,
}
