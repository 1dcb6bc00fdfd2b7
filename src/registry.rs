//! Process-wide caches keyed by type identity.
//!
//! Both the binding plan cache and the pool-of-pools are instances of
//! [`TypeRegistry`]. Entries are built at most once per type and live for the
//! rest of the process; nothing is ever evicted.
//!
//! ## Thread Safety
//!
//! - Lookups take the read lock only, so populated entries are read concurrently
//! - A miss builds the value outside any lock, then takes the write lock and
//!   re-checks: a caller that lost the race discards its own value and returns
//!   the one already stored

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

type Entry = Arc<dyn Any + Send + Sync>;

pub(crate) struct TypeRegistry {
    label: &'static str,
    entries: RwLock<HashMap<TypeId, Entry>>,
}

impl TypeRegistry {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached value for key type `K`, if present.
    pub(crate) fn get<K: 'static, V: Send + Sync + 'static>(&self) -> Option<Arc<V>> {
        let entries = self.entries.read();
        entries
            .get(&TypeId::of::<K>())
            .and_then(|entry| Arc::clone(entry).downcast::<V>().ok())
    }

    /// Cached value for `K`, building and storing it on a miss.
    ///
    /// A failed build is not cached; the next caller builds again.
    pub(crate) fn get_or_try_insert_with<K, V, E, F>(&self, build: F) -> Result<Arc<V>, E>
    where
        K: 'static,
        V: Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get::<K, V>() {
            return Ok(value);
        }

        let built = Arc::new(build()?);

        let mut entries = self.entries.write();
        if let Some(existing) = entries
            .get(&TypeId::of::<K>())
            .and_then(|entry| Arc::clone(entry).downcast::<V>().ok())
        {
            debug!(
                registry = self.label,
                type_name = std::any::type_name::<K>(),
                "Entry built by another thread, discarding local copy"
            );
            return Ok(existing);
        }

        let entry: Entry = Arc::clone(&built) as Entry;
        entries.insert(TypeId::of::<K>(), entry);
        info!(
            registry = self.label,
            type_name = std::any::type_name::<K>(),
            size = entries.len(),
            "Registry entry built and cached"
        );
        Ok(built)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
