use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::db::{Cache, CacheKey};
use crate::error::{AppError, AppResult};
use crate::models::profile::BehaviorProfile;
use crate::services::profile::ProfileBuilder;

type SharedResult = Option<Result<Arc<BehaviorProfile>, Arc<AppError>>>;

/// State of one user's cache slot
enum Slot {
    /// A finished profile, valid until the deadline
    Ready {
        profile: Arc<BehaviorProfile>,
        expires_at: Instant,
    },
    /// A computation in progress; joiners await the channel
    InFlight(watch::Receiver<SharedResult>),
}

/// Per-user profile cache with singleflight semantics
///
/// At most one profile computation runs per user at any time: concurrent
/// callers for the same key join the in-progress computation instead of
/// starting their own. The computation runs in a spawned task, so a caller
/// that times out or disconnects never tears it down; it completes and
/// populates the cache for the next caller. Built profiles are also written
/// through to redis with a TTL so restarts and sibling instances can skip
/// the rebuild.
#[derive(Clone)]
pub struct ProfileCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    builder: ProfileBuilder,
    redis: Option<Cache>,
    ttl: Duration,
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl ProfileCache {
    pub fn new(builder: ProfileBuilder, redis: Option<Cache>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                builder,
                redis,
                ttl,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the cached profile, joining or starting a computation as
    /// needed
    pub async fn get(&self, user_id: Uuid) -> AppResult<Arc<BehaviorProfile>> {
        let rx = {
            let mut slots = self.inner.slots.lock().await;
            match slots.get(&user_id) {
                Some(Slot::Ready {
                    profile,
                    expires_at,
                }) if *expires_at > Instant::now() => {
                    return Ok(profile.clone());
                }
                Some(Slot::InFlight(rx)) => rx.clone(),
                _ => {
                    // Vacant or expired: start the computation and publish
                    // the in-flight slot before releasing the lock
                    let (tx, rx) = watch::channel(None);
                    slots.insert(user_id, Slot::InFlight(rx.clone()));

                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        let result = inner.compute(user_id).await.map_err(Arc::new);

                        {
                            let mut slots = inner.slots.lock().await;
                            match &result {
                                Ok(profile) => {
                                    slots.insert(
                                        user_id,
                                        Slot::Ready {
                                            profile: profile.clone(),
                                            expires_at: Instant::now() + inner.ttl,
                                        },
                                    );
                                }
                                Err(_) => {
                                    // Failed computations are not cached;
                                    // the next caller retries
                                    slots.remove(&user_id);
                                }
                            }
                        }

                        let _ = tx.send(Some(result));
                    });

                    rx
                }
            }
        };

        Self::await_shared(rx).await
    }

    /// Drops the user's cached profile; called on activity-event ingestion
    pub async fn invalidate(&self, user_id: Uuid) {
        self.inner.slots.lock().await.remove(&user_id);
        if let Some(cache) = &self.inner.redis {
            cache.delete_in_background(&CacheKey::Profile(user_id));
        }
        tracing::debug!(user_id = %user_id, "Profile cache invalidated");
    }

    async fn await_shared(
        mut rx: watch::Receiver<SharedResult>,
    ) -> AppResult<Arc<BehaviorProfile>> {
        loop {
            let current = rx.borrow().clone();
            if let Some(result) = current {
                return result.map_err(|e| AppError::Upstream(e.to_string()));
            }
            if rx.changed().await.is_err() {
                return Err(AppError::Internal(
                    "profile computation dropped without a result".to_string(),
                ));
            }
        }
    }
}

impl CacheInner {
    /// Redis read-through, then a full rebuild from the activity log
    async fn compute(&self, user_id: Uuid) -> AppResult<Arc<BehaviorProfile>> {
        if let Some(cache) = &self.redis {
            match cache
                .get_from_cache::<BehaviorProfile>(&CacheKey::Profile(user_id))
                .await
            {
                Ok(Some(profile)) => {
                    tracing::debug!(user_id = %user_id, "Profile cache hit");
                    return Ok(Arc::new(profile));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %user_id, "Redis profile read failed, rebuilding");
                }
            }
        }

        let profile = self.builder.build(user_id).await?;

        if let Some(cache) = &self.redis {
            cache.set_in_background(&CacheKey::Profile(user_id), &profile, self.ttl.as_secs());
        }

        Ok(Arc::new(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::PersonaRules;
    use crate::repos::MockActivityRepository;

    fn cache_with_counting_repo(times: usize) -> ProfileCache {
        let mut activity = MockActivityRepository::new();
        activity
            .expect_events_for_user()
            .times(times)
            .returning(|_| Ok(vec![]));
        activity
            .expect_follow_count()
            .times(times)
            .returning(|_| Ok(0));

        let builder = ProfileBuilder::new(Arc::new(activity), PersonaRules::default());
        ProfileCache::new(builder, None, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = cache_with_counting_repo(1);
        let user_id = Uuid::new_v4();

        let (a, b) = tokio::join!(cache.get(user_id), cache.get(user_id));

        // The mock's times(1) guard is the real assertion
        assert_eq!(a.unwrap().user_id, user_id);
        assert_eq!(b.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = cache_with_counting_repo(1);
        let user_id = Uuid::new_v4();

        let first = cache.get(user_id).await.unwrap();
        let second = cache.get(user_id).await.unwrap();

        assert_eq!(first.snapshot_id, second.snapshot_id);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let cache = cache_with_counting_repo(2);
        let user_id = Uuid::new_v4();

        let first = cache.get(user_id).await.unwrap();
        cache.invalidate(user_id).await;
        let second = cache.get(user_id).await.unwrap();

        // A rebuild mints a fresh snapshot
        assert_ne!(first.snapshot_id, second.snapshot_id);
    }

    #[tokio::test]
    async fn test_failed_computation_is_not_cached() {
        let mut activity = MockActivityRepository::new();
        activity
            .expect_events_for_user()
            .times(2)
            .returning(|_| Err(AppError::Upstream("activity log down".to_string())));
        activity.expect_follow_count().returning(|_| Ok(0));

        let builder = ProfileBuilder::new(Arc::new(activity), PersonaRules::default());
        let cache = ProfileCache::new(builder, None, Duration::from_secs(60));
        let user_id = Uuid::new_v4();

        assert!(cache.get(user_id).await.is_err());
        // The failure was not stored; the next call retries the repository
        assert!(cache.get(user_id).await.is_err());
    }

    #[tokio::test]
    async fn test_caller_abort_does_not_cancel_computation() {
        let cache = cache_with_counting_repo(1);
        let user_id = Uuid::new_v4();

        // Drop a caller mid-flight; the spawned computation still finishes
        let aborted = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get(user_id).await }
        });
        aborted.abort();
        let _ = aborted.await;

        let profile = cache.get(user_id).await.unwrap();
        assert_eq!(profile.user_id, user_id);
    }
}
