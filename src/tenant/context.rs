//! Request-scoped tenant binding.
//!
//! The tenant id is the "invisible parameter" of every data-accessing call:
//! bound once per request with [`TenantContext::run`] and pulled back out by
//! the persistence layer at the last moment. The binding lives in a tokio
//! task-local, so it follows the logical task across await points and is
//! never shared between concurrently running requests, which a plain
//! thread-local could not guarantee under a work-stealing runtime.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numeric identity of a merchant store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

tokio::task_local! {
    static CURRENT_TENANT: TenantId;
}

pub struct TenantContext;

impl TenantContext {
    /// Run `fut` with `tenant_id` bound for its entire dynamic extent,
    /// including nested calls and awaits. Re-entrant calls nest: the inner
    /// binding wins inside its own extent, the outer resumes afterwards.
    pub async fn run<F, T>(tenant_id: TenantId, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        CURRENT_TENANT.scope(tenant_id, fut).await
    }

    /// The tenant bound to the current task, if any.
    pub fn current() -> Option<TenantId> {
        CURRENT_TENANT.try_with(|id| *id).ok()
    }

    /// The tenant bound to the current task; fails closed when unset.
    pub fn require() -> Result<TenantId> {
        Self::current().ok_or(Error::MissingTenantContext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unset_outside_run() {
        assert_eq!(TenantContext::current(), None);
        assert!(matches!(
            TenantContext::require(),
            Err(Error::MissingTenantContext)
        ));
    }

    #[tokio::test]
    async fn bound_inside_run_and_across_awaits() {
        let seen = TenantContext::run(TenantId(7), async {
            tokio::task::yield_now().await;
            TenantContext::require().unwrap()
        })
        .await;
        assert_eq!(seen, TenantId(7));
        assert_eq!(TenantContext::current(), None);
    }

    #[tokio::test]
    async fn nested_runs_restore_outer_binding() {
        TenantContext::run(TenantId(1), async {
            assert_eq!(TenantContext::current(), Some(TenantId(1)));
            TenantContext::run(TenantId(2), async {
                assert_eq!(TenantContext::current(), Some(TenantId(2)));
            })
            .await;
            assert_eq!(TenantContext::current(), Some(TenantId(1)));
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_tasks_do_not_leak_bindings() {
        let mut handles = Vec::new();
        for id in 1..=8i64 {
            handles.push(tokio::spawn(TenantContext::run(TenantId(id), async move {
                for _ in 0..16 {
                    tokio::task::yield_now().await;
                    assert_eq!(TenantContext::current(), Some(TenantId(id)));
                }
                TenantContext::require().unwrap()
            })));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), TenantId(i as i64 + 1));
        }
    }
}
