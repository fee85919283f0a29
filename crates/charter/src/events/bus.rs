//! Event bus for publishing events to registered handlers.
//!
//! The [`EventBus`] keeps an ordered list of handlers per event kind and
//! delivers each emitted event synchronously, in registration order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use super::types::BusEvent;

/// A registered callback. Identity is pointer identity, so keep the `Rc`
/// returned by [`EventBus::subscribe`] to remove the handler later.
pub type Handler<E> = Rc<dyn Fn(&E) -> anyhow::Result<()>>;

struct Listener<E> {
    handler: Handler<E>,
    once: bool,
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            handler: Rc::clone(&self.handler),
            once: self.once,
        }
    }
}

/// A per-instance publish/subscribe hub.
///
/// Handlers are isolated from each other: a handler that returns an error or
/// panics is logged and skipped, and the remaining handlers still run.
/// Nothing is reported back to the emitter.
///
/// Handlers may register, remove or emit from inside a callback. Each
/// emission works on a snapshot of the handlers present when it started.
///
/// # Usage Pattern
///
/// ```ignore
/// let bus: EventBus<ChartEvent> = EventBus::new();
///
/// let handler = bus.subscribe(ChartEventKind::ContentFitted, |event| {
///     log::info!("fitted: {event:?}");
///     Ok(())
/// });
///
/// bus.emit(&ChartEvent::ContentFitted);
/// bus.off(ChartEventKind::ContentFitted, Some(&handler));
/// ```
pub struct EventBus<E: BusEvent> {
    listeners: RefCell<HashMap<E::Kind, Vec<Listener<E>>>>,
}

impl<E: BusEvent> EventBus<E> {
    /// Create a bus with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
        }
    }

    /// Register `handler` for `kind`.
    ///
    /// Registering the identical handler twice for the same kind is a no-op.
    pub fn on(&self, kind: E::Kind, handler: Handler<E>) {
        self.register(kind, handler, false);
    }

    /// Register `handler` for the next emission of `kind` only.
    ///
    /// The handler is removed before it is invoked.
    pub fn once(&self, kind: E::Kind, handler: Handler<E>) {
        self.register(kind, handler, true);
    }

    /// Wrap a closure, register it and return the handler for later removal.
    pub fn subscribe<F>(&self, kind: E::Kind, f: F) -> Handler<E>
    where
        F: Fn(&E) -> anyhow::Result<()> + 'static,
    {
        let handler: Handler<E> = Rc::new(f);
        self.on(kind, Rc::clone(&handler));
        handler
    }

    /// Remove `handler` from `kind`, or every handler of `kind` when `None`.
    ///
    /// A kind whose last handler is removed disappears from the table.
    pub fn off(&self, kind: E::Kind, handler: Option<&Handler<E>>) {
        let mut listeners = self.listeners.borrow_mut();
        let Some(handler) = handler else {
            listeners.remove(&kind);
            return;
        };
        if let Some(list) = listeners.get_mut(&kind) {
            list.retain(|listener| !Rc::ptr_eq(&listener.handler, handler));
            if list.is_empty() {
                listeners.remove(&kind);
            }
        }
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers invoked. Emitting a kind with no
    /// handlers does nothing.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let snapshot = {
            let mut listeners = self.listeners.borrow_mut();
            let Some(list) = listeners.get_mut(&kind) else {
                return 0;
            };
            let snapshot = list.clone();
            list.retain(|listener| !listener.once);
            if list.is_empty() {
                listeners.remove(&kind);
            }
            snapshot
        };

        for listener in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| (listener.handler)(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Event handler for {:?} failed: {:#}", kind, e),
                Err(_) => log::error!("Event handler for {:?} panicked", kind),
            }
        }
        snapshot.len()
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.listeners
            .borrow()
            .get(&kind)
            .map_or(0, |list| list.len())
    }

    /// Check if any handler is registered for `kind`.
    #[must_use]
    pub fn has_listeners(&self, kind: E::Kind) -> bool {
        self.listeners.borrow().contains_key(&kind)
    }

    /// Remove every handler of every kind.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    fn register(&self, kind: E::Kind, handler: Handler<E>, once: bool) {
        let mut listeners = self.listeners.borrow_mut();
        let list = listeners.entry(kind).or_default();
        if list.iter().any(|listener| Rc::ptr_eq(&listener.handler, &handler)) {
            return;
        }
        list.push(Listener { handler, once });
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
