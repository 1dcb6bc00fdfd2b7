//! # Instance Pool
//!
//! Recycles request instances so the binder does not allocate a fresh value
//! for every request. There is one pool per request type, created lazily and
//! shared for the life of the process.
//!
//! ## Lifecycle
//!
//! 1. [`InstancePool::checkout`] pops an idle instance and resets it using
//!    the plan's [`ResetStrategy`](crate::schema::ResetStrategy), or allocates
//!    a new `T::default()` on a miss
//! 2. The caller uses the instance through the [`Pooled`] guard
//! 3. Dropping the guard returns the instance to the idle list
//!
//! ## Configuration
//!
//! - [`set_pool_enabled`]: process-wide toggle; when off every checkout
//!   allocates and nothing is recycled
//! - [`set_max_idle_instances`]: idle instances kept per type (default: 1024)
//!
//! ## Metrics
//!
//! [`created_instances`] counts allocations across all pools and can be
//! zeroed with [`reset_created_instances`] to measure a window.
//! [`InstancePool::stats`] reports per-type counters.

use crate::registry::TypeRegistry;
use crate::schema::{plan_for, try_plan_for, BindingPlan, RequestSchema, SchemaError};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Idle instances kept per request type unless configured otherwise.
pub const DEFAULT_MAX_IDLE: usize = 1024;

static POOL_ENABLED: AtomicBool = AtomicBool::new(true);
static MAX_IDLE: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_IDLE);
static CREATED: AtomicU64 = AtomicU64::new(0);
static POOLS: Lazy<TypeRegistry> = Lazy::new(|| TypeRegistry::new("instance_pools"));

/// Enable or disable instance recycling for every shared pool.
pub fn set_pool_enabled(enabled: bool) {
    POOL_ENABLED.store(enabled, Ordering::Release);
}

#[must_use]
pub fn pool_enabled() -> bool {
    POOL_ENABLED.load(Ordering::Acquire)
}

/// Cap on idle instances retained per type.
pub fn set_max_idle_instances(max_idle: usize) {
    MAX_IDLE.store(max_idle, Ordering::Relaxed);
}

#[must_use]
pub fn max_idle_instances() -> usize {
    MAX_IDLE.load(Ordering::Relaxed)
}

/// Instances allocated by all pools since start or the last reset.
#[must_use]
pub fn created_instances() -> u64 {
    CREATED.load(Ordering::Relaxed)
}

pub fn reset_created_instances() {
    CREATED.store(0, Ordering::Relaxed);
}

/// Point-in-time counters of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Instances allocated by this pool
    pub created: u64,
    /// Instances currently checked out
    pub live: usize,
    /// Instances waiting for reuse
    pub idle: usize,
}

/// Recycling allocator for one request type.
pub struct InstancePool<T: RequestSchema> {
    plan: Arc<BindingPlan<T>>,
    idle: Mutex<Vec<Box<T>>>,
    /// `None` follows the process-wide toggle
    pooling: Option<bool>,
    created: AtomicU64,
    live: AtomicUsize,
}

impl<T: RequestSchema> fmt::Debug for InstancePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstancePool")
            .field("type_name", &self.plan.type_name())
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: RequestSchema> InstancePool<T> {
    /// Process-wide pool for `T`.
    ///
    /// # Panics
    ///
    /// Panics when `T` fails schema analysis, see [`plan_for`].
    #[must_use]
    pub fn shared() -> Arc<Self> {
        let plan = plan_for::<T>();
        Self::shared_with_plan(plan)
    }

    /// Process-wide pool for `T`, reporting schema faults as errors.
    pub fn try_shared() -> Result<Arc<Self>, SchemaError> {
        let plan = try_plan_for::<T>()?;
        Ok(Self::shared_with_plan(plan))
    }

    fn shared_with_plan(plan: Arc<BindingPlan<T>>) -> Arc<Self> {
        let built = POOLS.get_or_try_insert_with::<T, Self, std::convert::Infallible, _>(|| {
            Ok(Self::build(plan, None))
        });
        match built {
            Ok(pool) => pool,
            Err(never) => match never {},
        }
    }

    /// Standalone pool following the process-wide toggle.
    #[must_use]
    pub fn new(plan: Arc<BindingPlan<T>>) -> Self {
        Self::build(plan, None)
    }

    /// Standalone pool with recycling fixed on or off.
    #[must_use]
    pub fn with_pooling(plan: Arc<BindingPlan<T>>, enabled: bool) -> Self {
        Self::build(plan, Some(enabled))
    }

    fn build(plan: Arc<BindingPlan<T>>, pooling: Option<bool>) -> Self {
        debug!(
            type_name = plan.type_name(),
            reset = ?plan.reset_strategy(),
            pooling = ?pooling,
            "Instance pool created"
        );
        Self {
            plan,
            idle: Mutex::new(Vec::new()),
            pooling,
            created: AtomicU64::new(0),
            live: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn plan(&self) -> &Arc<BindingPlan<T>> {
        &self.plan
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.pooling.unwrap_or_else(pool_enabled)
    }

    /// Take a pristine instance.
    #[must_use]
    pub fn checkout(self: &Arc<Self>) -> Pooled<T> {
        let recycled = if self.is_enabled() {
            self.idle.lock().pop()
        } else {
            None
        };

        let instance = match recycled {
            Some(mut instance) => {
                self.plan.reset(&mut instance);
                instance
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                CREATED.fetch_add(1, Ordering::Relaxed);
                Box::new(T::default())
            }
        };

        self.live.fetch_add(1, Ordering::Relaxed);
        Pooled {
            instance: Some(instance),
            pool: Arc::clone(self),
        }
    }

    /// Return an instance. `None` is accepted and ignored.
    fn checkin(&self, instance: Option<Box<T>>) {
        let Some(instance) = instance else {
            return;
        };
        self.live.fetch_sub(1, Ordering::Relaxed);

        if !self.is_enabled() {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < max_idle_instances() {
            idle.push(instance);
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            live: self.live.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
        }
    }
}

/// A checked-out instance. Dropping it returns the instance to its pool.
pub struct Pooled<T: RequestSchema> {
    instance: Option<Box<T>>,
    pool: Arc<InstancePool<T>>,
}

impl<T: RequestSchema> Pooled<T> {
    /// Detach the instance from the pool; it will not be recycled.
    #[must_use]
    pub fn into_inner(mut self) -> Box<T> {
        let instance = self.take();
        self.pool.live.fetch_sub(1, Ordering::Relaxed);
        instance
    }

    /// Reset the instance in place using the type's reset strategy.
    pub fn reset(&mut self) {
        if let Some(instance) = self.instance.as_deref_mut() {
            self.pool.plan.reset(instance);
        }
    }

    #[allow(clippy::expect_used)]
    fn take(&mut self) -> Box<T> {
        // Only `into_inner` and `drop` empty the guard, and both consume it.
        self.instance.take().expect("pooled instance already released")
    }
}

impl<T: RequestSchema> Deref for Pooled<T> {
    type Target = T;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &T {
        self.instance.as_deref().expect("pooled instance already released")
    }
}

impl<T: RequestSchema> DerefMut for Pooled<T> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut T {
        self.instance
            .as_deref_mut()
            .expect("pooled instance already released")
    }
}

impl<T: RequestSchema + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.instance).finish()
    }
}

impl<T: RequestSchema> Drop for Pooled<T> {
    fn drop(&mut self) {
        self.pool.checkin(self.instance.take());
    }
}
