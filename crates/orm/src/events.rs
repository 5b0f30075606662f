//! Lifecycle hooks for store mutations
//!
//! An explicit subscription registry owned by the store: subscribing
//! returns a disposer handle, `once` subscriptions unregister themselves
//! after firing, and before-hooks may veto individual records.

use std::collections::HashMap;

use tracing::trace;

use crate::Record;

/// Mutation kinds hooks can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

/// Disposer handle returned by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookHandle(u64);

/// Callback fired before a record is written or deleted; returning `false`
/// vetoes the record.
pub type BeforeHook = Box<dyn FnMut(&str, &mut Record) -> bool>;

/// Callback observing a record after the mutation applied.
pub type AfterHook = Box<dyn FnMut(&str, &Record)>;

struct Subscription<F> {
    id: u64,
    once: bool,
    callback: F,
}

/// Hook registry owned by one store instance.
#[derive(Default)]
pub struct Hooks {
    next: u64,
    before: HashMap<Mutation, Vec<Subscription<BeforeHook>>>,
    after: HashMap<Mutation, Vec<Subscription<AfterHook>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> (u64, HookHandle) {
        self.next += 1;
        (self.next, HookHandle(self.next))
    }

    /// Subscribe a before-hook.
    pub fn before<F>(&mut self, mutation: Mutation, callback: F) -> HookHandle
    where
        F: FnMut(&str, &mut Record) -> bool + 'static,
    {
        self.subscribe_before(mutation, callback, false)
    }

    /// Subscribe a before-hook that fires at most once.
    pub fn before_once<F>(&mut self, mutation: Mutation, callback: F) -> HookHandle
    where
        F: FnMut(&str, &mut Record) -> bool + 'static,
    {
        self.subscribe_before(mutation, callback, true)
    }

    /// Subscribe an after-hook.
    pub fn after<F>(&mut self, mutation: Mutation, callback: F) -> HookHandle
    where
        F: FnMut(&str, &Record) + 'static,
    {
        self.subscribe_after(mutation, callback, false)
    }

    /// Subscribe an after-hook that fires at most once.
    pub fn after_once<F>(&mut self, mutation: Mutation, callback: F) -> HookHandle
    where
        F: FnMut(&str, &Record) + 'static,
    {
        self.subscribe_after(mutation, callback, true)
    }

    /// Remove a subscription by its handle. Unknown handles are a no-op.
    pub fn off(&mut self, handle: HookHandle) {
        for subscriptions in self.before.values_mut() {
            subscriptions.retain(|subscription| subscription.id != handle.0);
        }
        for subscriptions in self.after.values_mut() {
            subscriptions.retain(|subscription| subscription.id != handle.0);
        }
    }

    fn subscribe_before<F>(&mut self, mutation: Mutation, callback: F, once: bool) -> HookHandle
    where
        F: FnMut(&str, &mut Record) -> bool + 'static,
    {
        let (id, handle) = self.next_handle();
        self.before.entry(mutation).or_default().push(Subscription {
            id,
            once,
            callback: Box::new(callback),
        });
        handle
    }

    fn subscribe_after<F>(&mut self, mutation: Mutation, callback: F, once: bool) -> HookHandle
    where
        F: FnMut(&str, &Record) + 'static,
    {
        let (id, handle) = self.next_handle();
        self.after.entry(mutation).or_default().push(Subscription {
            id,
            once,
            callback: Box::new(callback),
        });
        handle
    }

    /// Fire before-hooks; `false` means some hook vetoed the record.
    pub(crate) fn fire_before(
        &mut self,
        mutation: Mutation,
        entity: &str,
        record: &mut Record,
    ) -> bool {
        let Some(subscriptions) = self.before.get_mut(&mutation) else {
            return true;
        };
        let mut keep = true;
        let mut invoked = 0;
        for subscription in subscriptions.iter_mut() {
            invoked += 1;
            if !(subscription.callback)(entity, record) {
                trace!(entity, ?mutation, "record vetoed by before hook");
                keep = false;
                break;
            }
        }
        // A veto stops the chain early; once-subscriptions past the veto
        // never ran and stay registered.
        let mut position = 0;
        subscriptions.retain(|subscription| {
            position += 1;
            !subscription.once || position > invoked
        });
        keep
    }

    /// Fire after-hooks.
    pub(crate) fn fire_after(&mut self, mutation: Mutation, entity: &str, record: &Record) {
        let Some(subscriptions) = self.after.get_mut(&mutation) else {
            return;
        };
        for subscription in subscriptions.iter_mut() {
            (subscription.callback)(entity, record);
        }
        subscriptions.retain(|subscription| !subscription.once);
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.values().map(Vec::len).sum::<usize>())
            .field("after", &self.after.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
