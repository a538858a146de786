//! Subscribable state container.
//!
//! The store holds an immutable `Arc<S>` and replaces it on every update.
//! Listeners run synchronously, in subscription order, with `(next, prev)`.
//! An update issued from inside a listener is queued and applied once the
//! current notification cycle finishes. Writers on other threads wait for
//! the cycle to finish instead.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

/// State held by a [`StateStore`].
pub trait StoreState: Clone + Send + Sync + 'static {
    /// Recompute derived fields. Runs after every applied update.
    fn derive(&mut self) {}
}

/// Partial update that can be merged into a state.
pub trait StatePatch<S> {
    /// Apply the fields carried by this patch.
    fn apply_to(self, state: &mut S);
}

type Listener<S> = Arc<dyn Fn(&S, &S) + Send + Sync>;
type Update<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Slot<S> {
    state: Arc<S>,
    listeners: Vec<(u64, Listener<S>)>,
    next_listener: u64,
}

struct Shared<S> {
    slot: Mutex<Slot<S>>,
    pending: Mutex<VecDeque<Update<S>>>,
    writer: Mutex<()>,
    notifying: Mutex<Option<ThreadId>>,
}

/// Subscribable container with a single mutation entry point.
pub struct StateStore<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for StateStore<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: StoreState> StateStore<S> {
    /// Create a store. The initial state is derived once.
    pub fn new(mut initial: S) -> Self {
        initial.derive();
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: Arc::new(initial),
                    listeners: Vec::new(),
                    next_listener: 0,
                }),
                pending: Mutex::new(VecDeque::new()),
                writer: Mutex::new(()),
                notifying: Mutex::new(None),
            }),
        }
    }

    /// Current state.
    pub fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.shared.slot.lock().state)
    }

    /// Apply an update and notify subscribers.
    ///
    /// Returns `false` when the call was made from inside a listener: the
    /// update is then queued and runs after the current cycle.
    pub fn set_state(&self, updater: impl FnOnce(&mut S) + Send + 'static) -> bool {
        let me = thread::current().id();
        self.shared.pending.lock().push_back(Box::new(updater));
        if *self.shared.notifying.lock() == Some(me) {
            tracing::debug!("Queued re-entrant state update");
            return false;
        }

        let _writer = self.shared.writer.lock();
        let _cycle = NotifyCycle::enter(&self.shared.notifying, me);
        loop {
            let next = self.shared.pending.lock().pop_front();
            match next {
                Some(update) => self.apply(update),
                None => break,
            }
        }
        true
    }

    /// Shallow-merge a partial state.
    pub fn merge<P>(&self, patch: P) -> bool
    where
        P: StatePatch<S> + Send + 'static,
    {
        self.set_state(move |state| patch.apply_to(state))
    }

    /// Register a listener called with `(next, prev)` after each update.
    pub fn subscribe(&self, listener: impl Fn(&S, &S) + Send + Sync + 'static) -> Subscription<S> {
        let mut slot = self.shared.slot.lock();
        let id = slot.next_listener;
        slot.next_listener += 1;
        slot.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.slot.lock().listeners.len()
    }

    fn apply(&self, update: Update<S>) {
        let (prev, next, listeners) = {
            let mut slot = self.shared.slot.lock();
            let prev = Arc::clone(&slot.state);
            let mut draft = S::clone(&prev);
            update(&mut draft);
            draft.derive();
            let next = Arc::new(draft);
            slot.state = Arc::clone(&next);
            let listeners: Vec<Listener<S>> = slot.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (prev, next, listeners)
        };
        for listener in listeners {
            listener(&next, &prev);
        }
    }
}

/// Marks the current thread as notifying until dropped, including on unwind
/// out of an updater or listener.
struct NotifyCycle<'a> {
    notifying: &'a Mutex<Option<ThreadId>>,
}

impl<'a> NotifyCycle<'a> {
    fn enter(notifying: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *notifying.lock() = Some(thread);
        Self { notifying }
    }
}

impl Drop for NotifyCycle<'_> {
    fn drop(&mut self) {
        *self.notifying.lock() = None;
    }
}

/// Handle returned by [`StateStore::subscribe`].
pub struct Subscription<S> {
    id: u64,
    shared: Weak<Shared<S>>,
}

impl<S> Subscription<S> {
    /// Stop receiving notifications.
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.slot.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
