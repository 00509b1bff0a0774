#![forbid(unsafe_code)]

//! Synchronous, ordered event dispatch for locale contexts and the registry.
//!
//! # Invariants
//!
//! 1. Handlers run in registration order, on the dispatching thread.
//! 2. A handler removed during dispatch (by itself or by an earlier
//!    handler) is not invoked again for that event.
//! 3. A handler added during dispatch is first invoked on the next event.
//! 4. No lock is held while a handler runs, so handlers may subscribe,
//!    unsubscribe, or translate freely.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

/// Event kinds emitted by contexts and the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocaleEvent {
    /// A context switched to a different (language, country) pair.
    Changed,
    /// A context re-fetched its table for the unchanged pair.
    Reloaded,
    /// The registry created a named context.
    InfoLoaded,
    /// The registry destroyed a context whose refcount reached zero.
    InfoUnloaded,
}

/// Opaque handle returned by `on`, accepted by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    /// Raw numeric id (never 0).
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

type Handler<T> = Arc<dyn Fn(LocaleEvent, &T) + Send + Sync>;

struct Slot<T> {
    id: SubscriptionId,
    kind: LocaleEvent,
    handler: Handler<T>,
}

struct EmitterState<T> {
    next_id: u32,
    slots: Vec<Slot<T>>,
}

impl<T> EmitterState<T> {
    /// Next id not held by a live slot. Wraps past `u32::MAX` back to 1.
    fn allocate_id(&mut self) -> SubscriptionId {
        loop {
            let candidate = self.next_id;
            self.next_id = self.next_id.checked_add(1).unwrap_or(1);
            if !self.slots.iter().any(|slot| slot.id.0 == candidate) {
                return SubscriptionId(candidate);
            }
        }
    }
}

/// Registration list keyed by event kind.
pub(crate) struct Emitter<T> {
    state: Mutex<EmitterState<T>>,
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(EmitterState {
                // 0 is never handed out.
                next_id: 1,
                slots: Vec::new(),
            }),
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<T> Emitter<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, EmitterState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn on(
        &self,
        kind: LocaleEvent,
        handler: impl Fn(LocaleEvent, &T) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.slots.push(Slot {
            id,
            kind,
            handler: Arc::new(handler),
        });
        trace!(id = id.0, ?kind, "subscribed");
        id
    }

    /// Remove a registration. Returns whether `id` was registered.
    pub(crate) fn off(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.slots.len();
        state.slots.retain(|slot| slot.id != id);
        let removed = state.slots.len() != before;
        trace!(id = id.0, removed, "unsubscribed");
        removed
    }

    /// Invoke every handler registered for `kind`. Returns how many ran.
    pub(crate) fn dispatch(&self, kind: LocaleEvent, target: &T) -> usize {
        let snapshot: Vec<(SubscriptionId, Handler<T>)> = self
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.kind == kind)
            .map(|slot| (slot.id, Arc::clone(&slot.handler)))
            .collect();

        let mut invoked = 0;
        for (id, handler) in snapshot {
            if !self.contains(id) {
                continue;
            }
            handler(kind, target);
            invoked += 1;
        }
        invoked
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.lock().slots.iter().any(|slot| slot.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub(crate) fn clear(&self) {
        self.lock().slots.clear();
    }
}
