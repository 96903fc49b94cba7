//! Event delivery for nodes.
//!
//! Hosts notify nodes (for now only "ended" on scheduled sources) through the
//! [`HostContext`](crate::host::HostContext), which hands the event to the
//! node's [`EventTarget`]. Listener bookkeeping follows DOM semantics: `once`
//! listeners are removed before they run, and a listener removed during a
//! dispatch is not invoked by that dispatch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The kind of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A scheduled source finished playing.
    Ended,
    /// Any other event type, dispatched by user code.
    Other(&'static str),
}

/// An event delivered to listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self { kind }
    }

    pub fn ended() -> Self {
        Self::new(EventKind::Ended)
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// A registered callback. Shared so a dispatch can run on a snapshot.
pub type EventListener = Rc<dyn Fn(&Event)>;

/// Options accepted by `add_event_listener`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    pub fn once() -> Self {
        Self { once: true }
    }
}

/// Identifies a registration so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: EventListener,
    once: bool,
}

/// Per-node listener registry.
#[derive(Default)]
pub(crate) struct EventTarget {
    registrations: RefCell<Vec<Registration>>,
    next_id: Cell<u64>,
}

impl EventTarget {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(
        &self,
        kind: EventKind,
        listener: EventListener,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);

        self.registrations.borrow_mut().push(Registration {
            id,
            kind,
            listener,
            once: options.once,
        });
        id
    }

    pub(crate) fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|r| !(r.id == id && r.kind == kind));
        registrations.len() != before
    }

    /// Invoke every listener registered for the event's kind.
    ///
    /// Returns `true` if at least one listener ran.
    pub(crate) fn dispatch(&self, event: &Event) -> bool {
        // snapshot, so listeners may (de)register while we iterate
        let snapshot: Vec<(ListenerId, EventListener, bool)> = self
            .registrations
            .borrow()
            .iter()
            .filter(|r| r.kind == event.kind)
            .map(|r| (r.id, Rc::clone(&r.listener), r.once))
            .collect();

        let mut invoked = false;
        for (id, listener, once) in snapshot {
            if !self.contains(id) {
                continue;
            }
            if once {
                self.remove(event.kind, id);
            }
            tracing::trace!(kind = ?event.kind, "dispatching event");
            listener(event);
            invoked = true;
        }
        invoked
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.registrations.borrow().iter().any(|r| r.id == id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registrations.borrow().len()
    }
}
