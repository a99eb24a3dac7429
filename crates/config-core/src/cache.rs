//! Cache of objects built from configuration, rebuilt after invalidation

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use config_env::naming::ALL;

use crate::notification::NotificationPathSet;

type DestroyHook<V> = Box<dyn Fn(&str, &V) + Send + Sync>;

enum Slot<V> {
    /// One caller is building; `stale` is set when invalidated meanwhile.
    Building { stale: bool },
    Live(Arc<V>),
    /// Being released; readers wait until the slot is gone.
    Destroying,
}

/// Per-key cache with at most one build in flight per key.
///
/// Keys are configuration identities: `app`, `app:p1,p2`, optionally
/// followed by `@label`. A key moves through
/// empty → building → live → destroying → empty. Readers never see an
/// instance that is being destroyed; they wait for the slot to empty and
/// then rebuild.
pub struct ScopedCache<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
    changed: Condvar,
    on_destroy: Option<DestroyHook<V>>,
}

impl<V> Default for ScopedCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            on_destroy: None,
        }
    }
}

impl<V> fmt::Debug for ScopedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCache")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl<V> ScopedCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `hook` for every instance released by invalidation.
    ///
    /// The hook runs without the cache lock held, while the key is still
    /// marked as being destroyed.
    pub fn with_destroy_hook(mut self, hook: impl Fn(&str, &V) + Send + Sync + 'static) -> Self {
        self.on_destroy = Some(Box::new(hook));
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        // slots are only replaced whole, so a panicking holder leaves them consistent
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, HashMap<String, Slot<V>>>,
    ) -> MutexGuard<'a, HashMap<String, Slot<V>>> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// The live instance for `key`, building it with `build` on a miss.
    ///
    /// Concurrent misses on one key run `build` once; the other callers wait
    /// and receive the same instance. A failed build is not cached and its
    /// error goes to the caller that ran it; waiters then retry.
    pub fn get_or_build<E>(
        &self,
        key: &str,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let mut slots = self.lock();
        loop {
            let busy = match slots.get(key) {
                Some(Slot::Live(instance)) => return Ok(Arc::clone(instance)),
                Some(Slot::Building { .. } | Slot::Destroying) => true,
                None => false,
            };
            if !busy {
                break;
            }
            slots = self.wait(slots);
        }
        slots.insert(key.to_string(), Slot::Building { stale: false });
        drop(slots);

        let mut pending = PendingBuild {
            cache: self,
            key,
            done: false,
        };
        tracing::debug!(key = %key, "Building cached instance");
        let instance = build().map(Arc::new);

        let mut slots = self.lock();
        let stale = matches!(slots.get(key), Some(Slot::Building { stale: true }));
        match &instance {
            Ok(instance) if !stale => {
                slots.insert(key.to_string(), Slot::Live(Arc::clone(instance)));
            }
            _ => {
                slots.remove(key);
            }
        }
        pending.done = true;
        drop(slots);
        self.changed.notify_all();
        instance
    }

    /// The live instance for `key`, without building.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        match self.lock().get(key) {
            Some(Slot::Live(instance)) => Some(Arc::clone(instance)),
            _ => None,
        }
    }

    /// Keys currently holding a live instance.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every live instance whose key matches a token in `tokens`.
    ///
    /// Returns the destroyed keys, sorted. Builds in flight for a matching
    /// key still hand their result to the waiting callers but are not kept.
    pub fn invalidate(&self, tokens: &NotificationPathSet) -> Vec<String> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut released = Vec::new();
        {
            let mut slots = self.lock();
            for (key, slot) in slots.iter_mut() {
                if !tokens.iter().any(|token| token_matches(token, key)) {
                    continue;
                }
                match slot {
                    Slot::Live(_) => {
                        if let Slot::Live(instance) = std::mem::replace(slot, Slot::Destroying) {
                            released.push((key.clone(), instance));
                        }
                    }
                    Slot::Building { stale } => *stale = true,
                    Slot::Destroying => {}
                }
            }
        }

        let mut keys: Vec<String> = released.iter().map(|(key, _)| key.clone()).collect();
        {
            // empties the destroying slots even if the hook unwinds
            let _release = PendingRelease {
                cache: self,
                keys: &keys,
            };
            if let Some(hook) = &self.on_destroy {
                for (key, instance) in &released {
                    hook(key, instance);
                }
            }
        }

        keys.sort();
        if !keys.is_empty() {
            tracing::info!(keys = ?keys, "Invalidated cached instances");
        }
        keys
    }

    /// Destroy everything.
    pub fn clear(&self) -> Vec<String> {
        self.invalidate(&NotificationPathSet::all())
    }
}

/// Clears a `Building` slot if the builder unwinds, so waiters do not hang.
struct PendingBuild<'a, V> {
    cache: &'a ScopedCache<V>,
    key: &'a str,
    done: bool,
}

impl<V> Drop for PendingBuild<'_, V> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.cache.lock().remove(self.key);
        self.cache.changed.notify_all();
    }
}

/// Empties the `Destroying` slots of an invalidation and wakes readers.
struct PendingRelease<'a, V> {
    cache: &'a ScopedCache<V>,
    keys: &'a [String],
}

impl<V> Drop for PendingRelease<'_, V> {
    fn drop(&mut self) {
        let mut slots = self.cache.lock();
        for key in self.keys {
            if matches!(slots.get(key), Some(Slot::Destroying)) {
                slots.remove(key);
            }
        }
        drop(slots);
        self.cache.changed.notify_all();
    }
}

/// Whether invalidation token `token` covers cache key `key`.
///
/// The label suffix of the key is ignored. A token matches when it is `*`,
/// equals the key, names the key's application (`app`), or names one of the
/// key's profiles for that application or for any (`app:p`, `*:p`).
pub fn token_matches(token: &str, key: &str) -> bool {
    if token == ALL {
        return true;
    }
    let identity = key.split_once('@').map_or(key, |(identity, _)| identity);
    if token == identity {
        return true;
    }

    let (app, profiles) = identity.split_once(':').unwrap_or((identity, ""));
    match token.split_once(':') {
        None => token == app,
        Some((token_app, token_profile)) => {
            (token_app == ALL || token_app == app)
                && (token_profile == profiles || profiles.split(',').any(|p| p == token_profile))
        }
    }
}
