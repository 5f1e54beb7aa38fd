//! Core rate limiter implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::key::OperationKey;
use super::window::{WindowSpec, WindowState};
use crate::error::{LimiterError, Result};

/// Window state for one key, locked for the whole admission check.
type Slot = Arc<Mutex<WindowState>>;

/// A successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Permits left in the current window after this call
    pub remaining: u64,
}

/// The immutable quota policy shared by a limiter and every handle it hands out.
struct Policy<C> {
    limit: i64,
    window: Duration,
    spec: WindowSpec,
    clock: C,
}

impl<C: Clock> Policy<C> {
    fn admit(&self, key: &OperationKey, slot: &Mutex<WindowState>) -> Result<Admission> {
        let decision = {
            let mut state = slot.lock();
            let now = self.clock.now();
            state.admit(now, self.limit, self.window)
        };

        if decision.reset {
            debug!(key = %key, limit = self.limit, "Window expired, quota reset");
        }
        trace!(key = %key, remaining = decision.remaining, "Admission check");

        if decision.is_admitted() {
            Ok(Admission {
                remaining: decision.remaining as u64,
            })
        } else {
            debug!(key = %key, window = %self.spec, "Rate limit exceeded");
            Err(LimiterError::RateLimitExceeded {
                key: key.to_string(),
                limit: self.limit as u64,
                window: self.window,
            })
        }
    }
}

struct Inner<C> {
    policy: Arc<Policy<C>>,
    state: DashMap<OperationKey, Slot>,
}

/// A fixed-window rate limiter keyed by operation name.
///
/// Cloning is cheap and every clone shares the same quota table. Each key
/// has its own lock, so admissions for unrelated operations never contend.
pub struct RateLimiter<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter allowing `limit` calls per `window` (e.g. `"10Min"`).
    pub fn new(limit: u64, window: &str) -> Result<Self> {
        Self::with_clock(limit, window, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter that reads time from `clock`.
    pub fn with_clock(limit: u64, window: &str, clock: C) -> Result<Self> {
        if limit == 0 {
            return Err(LimiterError::Config(
                "Rate limit must be greater than zero".to_string(),
            ));
        }
        let limit = i64::try_from(limit)
            .map_err(|_| LimiterError::Config(format!("Rate limit {} is too large", limit)))?;

        let spec: WindowSpec = window.parse()?;
        let window = spec.duration()?;

        debug!(limit = limit, window = %spec, "Rate limiter created");

        Ok(Self {
            inner: Arc::new(Inner {
                policy: Arc::new(Policy {
                    limit,
                    window,
                    spec,
                    clock,
                }),
                state: DashMap::new(),
            }),
        })
    }

    /// Wrap `operation` so every call is first admitted against `key`'s quota.
    ///
    /// The key is registered immediately with a full quota. Wrapping an
    /// already-registered key shares its existing window.
    pub fn wrap<F>(&self, key: impl Into<OperationKey>, operation: F) -> RateLimited<F, C> {
        let key = key.into();
        let slot = self.register(&key);

        RateLimited {
            key,
            slot,
            policy: Arc::clone(&self.inner.policy),
            operation,
        }
    }

    /// Run one admission check for a registered key.
    pub fn admit(&self, key: &str) -> Result<Admission> {
        let (key, slot) = self
            .inner
            .state
            .get(key)
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .ok_or_else(|| LimiterError::UnregisteredKey(key.to_string()))?;

        self.inner.policy.admit(&key, &slot)
    }

    /// Maximum calls per window.
    pub fn limit(&self) -> u64 {
        self.inner.policy.limit as u64
    }

    /// Length of one window.
    pub fn window(&self) -> Duration {
        self.inner.policy.window
    }

    /// The window as configured, e.g. `10Min`.
    pub fn window_spec(&self) -> WindowSpec {
        self.inner.policy.spec
    }

    /// Number of registered keys.
    pub fn key_count(&self) -> usize {
        self.inner.state.len()
    }

    /// Permits left for `key` as of its last admission.
    ///
    /// Returns `None` if the key is not registered. The value is negative
    /// after rejected calls and does not reflect a pending window reset.
    pub fn remaining(&self, key: &str) -> Option<i64> {
        let slot = self.inner.state.get(key).map(|entry| Arc::clone(entry.value()))?;
        let remaining = slot.lock().remaining();
        Some(remaining)
    }

    /// Drop keys that have been idle for at least `idle` (and at least one
    /// window) and that no [`RateLimited`] handle still references.
    ///
    /// Eviction unregisters the key: a later [`RateLimiter::admit`] by name
    /// fails with [`LimiterError::UnregisteredKey`] until the key is wrapped
    /// again, which starts a fresh window. Returns the number of keys removed.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let horizon = idle.max(self.inner.policy.window);
        let now = self.inner.policy.clock.now();
        let before = self.inner.state.len();

        // A strong count of one means only the map holds the slot. Cloning a
        // slot out of the map needs the shard lock retain is holding.
        self.inner.state.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || now.saturating_duration_since(slot.lock().last_seen()) < horizon
        });

        let evicted = before.saturating_sub(self.inner.state.len());
        if evicted > 0 {
            info!(evicted = evicted, remaining_keys = self.inner.state.len(), "Evicted idle keys");
        }
        evicted
    }

    fn register(&self, key: &OperationKey) -> Slot {
        let entry = self.inner.state.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, limit = self.inner.policy.limit, "Registering operation");
            Arc::new(Mutex::new(WindowState::new(
                self.inner.policy.clock.now(),
                self.inner.policy.limit,
            )))
        });
        Arc::clone(entry.value())
    }
}

impl<C: Clock> Clone for RateLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.inner.policy.limit)
            .field("window", &self.inner.policy.spec)
            .field("keys", &self.inner.state.len())
            .finish()
    }
}

/// An operation guarded by a [`RateLimiter`].
///
/// Operations taking several arguments are wrapped as taking a tuple.
pub struct RateLimited<F, C: Clock = SystemClock> {
    key: OperationKey,
    slot: Slot,
    policy: Arc<Policy<C>>,
    operation: F,
}

impl<F, C: Clock> RateLimited<F, C> {
    /// The key this operation is limited under.
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Spend one permit without running the operation.
    pub fn admit(&self) -> Result<Admission> {
        self.policy.admit(&self.key, &self.slot)
    }

    /// Admit, then run the operation and return its output unchanged.
    pub fn call<In, Out>(&self, input: In) -> Result<Out>
    where
        F: Fn(In) -> Out,
    {
        self.admit()?;
        Ok((self.operation)(input))
    }

    /// Admit, then create the operation's future.
    ///
    /// Admission happens here, not when the future is polled; a rejected
    /// call never constructs the future.
    pub fn call_async<In, Fut>(&self, input: In) -> Result<Fut>
    where
        F: Fn(In) -> Fut,
        Fut: Future,
    {
        self.admit()?;
        Ok((self.operation)(input))
    }
}

impl<F: Clone, C: Clock> Clone for RateLimited<F, C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            slot: Arc::clone(&self.slot),
            policy: Arc::clone(&self.policy),
            operation: self.operation.clone(),
        }
    }
}

impl<F, C: Clock> std::fmt::Debug for RateLimited<F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimited")
            .field("key", &self.key)
            .field("remaining", &self.slot.lock().remaining())
            .finish()
    }
}
