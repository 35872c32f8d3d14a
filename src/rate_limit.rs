//! Cotas de chamadas em janela fixa por chave de recurso.
//!
//! Toda chamada a um colaborador com cota passa por
//! [`RateLimiter::check_and_consume`]. Os contadores ficam num
//! [`CounterStore`], que verifica e incrementa num único passo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::store::StoreError;

/// Resource keys used by the orchestrator.
pub mod resource {
    pub const SEARCH: &str = "search";
    pub const TAILOR: &str = "tailor";
    pub const SUBMIT: &str = "submit";
}

/// At most `calls` calls per `period_secs` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
    pub calls: u32,
    pub period_secs: u64,
}

impl RatePolicy {
    pub const fn new(calls: u32, period_secs: u64) -> Self {
        Self { calls, period_secs }
    }

    pub fn period(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.period_secs).unwrap_or(i64::MAX))
    }

    /// search 10/hour, submit 20/day, tailor 50/hour.
    pub fn defaults() -> HashMap<String, RatePolicy> {
        HashMap::from([
            (resource::SEARCH.to_string(), RatePolicy::new(10, 3_600)),
            (resource::SUBMIT.to_string(), RatePolicy::new(20, 86_400)),
            (resource::TAILOR.to_string(), RatePolicy::new(50, 3_600)),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Quota exhausted; `retry_after` is the remaining time of the active window.
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Persisted counter for one resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub window_expires_at: DateTime<Utc>,
}

impl RateLimitCounter {
    /// One check-and-consume against `slot`.
    ///
    /// A missing or expired window is replaced by a new one with count 1.
    /// A denial leaves the counter untouched.
    pub fn consume(
        slot: &mut Option<RateLimitCounter>,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> Decision {
        if policy.calls == 0 {
            return Decision::Denied {
                retry_after: policy.period().to_std().unwrap_or_default(),
            };
        }

        if let Some(counter) = slot.as_mut().filter(|c| now < c.window_expires_at) {
            if counter.count < policy.calls {
                counter.count += 1;
                return Decision::Allowed;
            }
            return Decision::Denied {
                retry_after: (counter.window_expires_at - now).to_std().unwrap_or_default(),
            };
        }

        *slot = Some(RateLimitCounter {
            count: 1,
            window_start: now,
            window_expires_at: now + policy.period(),
        });
        Decision::Allowed
    }
}

/// Shared counter storage. `consume` must be atomic per resource key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn consume(
        &self,
        resource: &str,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError>;

    async fn counter(&self, resource: &str) -> Result<Option<RateLimitCounter>, StoreError>;
}

/// Process-local counters behind a mutex.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, RateLimitCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn consume(
        &self,
        resource: &str,
        policy: &RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Unavailable("counter lock poisoned".into()))?;
        let mut slot = counters.get(resource).cloned();
        let decision = RateLimitCounter::consume(&mut slot, policy, now);
        if let Some(counter) = slot {
            counters.insert(resource.to_string(), counter);
        }
        Ok(decision)
    }

    async fn counter(&self, resource: &str) -> Result<Option<RateLimitCounter>, StoreError> {
        let counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Unavailable("counter lock poisoned".into()))?;
        Ok(counters.get(resource).cloned())
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("no rate limit policy configured for resource '{0}'")]
    UnknownResource(String),

    #[error("rate limit store unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

/// Static per-resource policies over a shared [`CounterStore`].
///
/// Never reports `Allowed` unless the store confirmed the increment.
pub struct RateLimiter {
    policies: HashMap<String, RatePolicy>,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(policies: HashMap<String, RatePolicy>, store: Arc<dyn CounterStore>) -> Self {
        Self { policies, store }
    }

    pub fn in_memory(policies: HashMap<String, RatePolicy>) -> Self {
        Self::new(policies, Arc::new(MemoryCounterStore::new()))
    }

    pub fn policy(&self, resource: &str) -> Option<&RatePolicy> {
        self.policies.get(resource)
    }

    pub async fn check_and_consume(&self, resource: &str) -> Result<Decision, RateLimitError> {
        self.check_and_consume_at(resource, Utc::now()).await
    }

    pub async fn check_and_consume_at(
        &self,
        resource: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, RateLimitError> {
        let policy = self
            .policies
            .get(resource)
            .ok_or_else(|| RateLimitError::UnknownResource(resource.to_string()))?;

        let decision = self
            .store
            .consume(resource, policy, now)
            .await
            .map_err(RateLimitError::Unavailable)?;

        if let Decision::Denied { retry_after } = decision {
            warn!(
                resource,
                retry_after_secs = retry_after.as_secs(),
                "rate limit denied"
            );
        }
        Ok(decision)
    }

    pub async fn counter(&self, resource: &str) -> Result<Option<RateLimitCounter>, StoreError> {
        self.store.counter(resource).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(calls: u32, period_secs: u64) -> RateLimiter {
        RateLimiter::in_memory(HashMap::from([(
            resource::SUBMIT.to_string(),
            RatePolicy::new(calls, period_secs),
        )]))
    }

    #[tokio::test]
    async fn allows_up_to_ceiling_then_denies() {
        let limiter = limiter(3, 60);
        let now = Utc::now();
        for _ in 0..3 {
            let d = limiter.check_and_consume_at(resource::SUBMIT, now).await.unwrap();
            assert_eq!(d, Decision::Allowed);
        }
        let d = limiter.check_and_consume_at(resource::SUBMIT, now).await.unwrap();
        assert!(!d.is_allowed());
    }

    #[tokio::test]
    async fn denial_reports_remaining_window_and_consumes_nothing() {
        let limiter = limiter(1, 3_600);
        let start = Utc::now();
        limiter.check_and_consume_at(resource::SUBMIT, start).await.unwrap();

        let later = start + chrono::Duration::seconds(600);
        let d = limiter.check_and_consume_at(resource::SUBMIT, later).await.unwrap();
        assert_eq!(
            d,
            Decision::Denied {
                retry_after: Duration::from_secs(3_000)
            }
        );

        let counter = limiter.counter(resource::SUBMIT).await.unwrap().unwrap();
        assert_eq!(counter.count, 1);
        assert_eq!(counter.window_start, start);
    }

    #[tokio::test]
    async fn expired_window_restarts_at_one() {
        let limiter = limiter(2, 60);
        let start = Utc::now();
        limiter.check_and_consume_at(resource::SUBMIT, start).await.unwrap();
        limiter.check_and_consume_at(resource::SUBMIT, start).await.unwrap();
        assert!(!limiter
            .check_and_consume_at(resource::SUBMIT, start)
            .await
            .unwrap()
            .is_allowed());

        let after = start + chrono::Duration::seconds(60);
        let d = limiter.check_and_consume_at(resource::SUBMIT, after).await.unwrap();
        assert_eq!(d, Decision::Allowed);
        let counter = limiter.counter(resource::SUBMIT).await.unwrap().unwrap();
        assert_eq!(counter.count, 1);
        assert_eq!(counter.window_start, after);
    }

    #[tokio::test]
    async fn unknown_resource_is_an_error() {
        let limiter = limiter(1, 60);
        let err = limiter.check_and_consume("scrape").await.unwrap_err();
        assert!(matches!(err, RateLimitError::UnknownResource(ref r) if r == "scrape"));
    }

    #[test]
    fn zero_call_policy_always_denies() {
        let mut slot = None;
        let d = RateLimitCounter::consume(&mut slot, &RatePolicy::new(0, 60), Utc::now());
        assert_eq!(
            d,
            Decision::Denied {
                retry_after: Duration::from_secs(60)
            }
        );
        assert!(slot.is_none());
    }

    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn consume(
            &self,
            _resource: &str,
            _policy: &RatePolicy,
            _now: DateTime<Utc>,
        ) -> Result<Decision, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn counter(&self, _resource: &str) -> Result<Option<RateLimitCounter>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn unreachable_store_fails_closed() {
        let limiter = RateLimiter::new(RatePolicy::defaults(), Arc::new(UnreachableStore));
        let result = limiter.check_and_consume(resource::SEARCH).await;
        assert!(matches!(result, Err(RateLimitError::Unavailable(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_never_exceed_ceiling() {
        let limiter = Arc::new(limiter(20, 3_600));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check_and_consume(resource::SUBMIT).await.unwrap()
            }));
        }

        let mut allowed = 0;
        let mut denied = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Decision::Allowed => allowed += 1,
                Decision::Denied { .. } => denied += 1,
            }
        }
        assert_eq!(allowed, 20);
        assert_eq!(denied, 80);
    }

    #[test]
    fn default_policies() {
        let policies = RatePolicy::defaults();
        assert_eq!(policies[resource::SEARCH], RatePolicy::new(10, 3_600));
        assert_eq!(policies[resource::SUBMIT], RatePolicy::new(20, 86_400));
        assert_eq!(policies[resource::TAILOR], RatePolicy::new(50, 3_600));
    }
}
