//! Observer registry used to push published refresh snapshots to consumers.
//!
//! Observers run synchronously, in registration order, on the publishing
//! task. A failing or panicking observer is logged and skipped; the rest of the
//! round still runs. The registry lock is never held while an observer runs,
//! so observers may subscribe or unsubscribe from inside their callback.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::Result;
use tracing::warn;

/// Callback invoked with each published value.
pub trait Observer<T>: Send + Sync {
    fn notify(&self, value: &T) -> Result<()>;
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) -> Result<()> + Send + Sync,
{
    fn notify(&self, value: &T) -> Result<()> {
        self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry<T> {
    next_id: u64,
    observers: Vec<(SubscriptionId, Arc<dyn Observer<T>>)>,
}

impl<T> Registry<T> {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Subscribers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, observer: impl Observer<T> + 'static) -> Subscription<T> {
        let mut registry = lock(&self.registry);
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.observers.push((id, Arc::new(observer)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Returns `false` when `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.registry).remove(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `value` to every observer registered when the round starts.
    /// Observers removed mid-round are skipped. Returns how many failed.
    pub fn notify(&self, value: &T) -> usize {
        let round: Vec<_> = lock(&self.registry)
            .observers
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect();

        let mut failed = 0;
        for (id, observer) in round {
            let still_registered = lock(&self.registry)
                .observers
                .iter()
                .any(|(existing, _)| *existing == id);
            if !still_registered {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| observer.notify(value))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    warn!(subscription = id.0, error = %err, "observer failed");
                }
                Err(_) => {
                    failed += 1;
                    warn!(subscription = id.0, "observer panicked");
                }
            }
        }
        failed
    }
}

/// Handle returned by [`Subscribers::subscribe`]. Dropping it does not
/// unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription<T> {
    id: SubscriptionId,
    registry: Weak<Mutex<Registry<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Idempotent. Safe to call from inside a notification.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock(&registry).remove(self.id),
            None => false,
        }
    }
}
