//! Lifecycle notifications emitted after successful backend operations.
//!
//! Listeners are plain closures registered per event kind and invoked
//! synchronously, in registration order, on the request's task. They are
//! observers only: they cannot change the response the platform receives,
//! and a listener that panics is logged and skipped.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use super::operation::panic_message;

/// The operations that produce a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEventKind {
    Provisioned,
    Updated,
    Deprovisioned,
    Bound,
    Unbound,
}

impl LifecycleEventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioned => "provisioned",
            Self::Updated => "updated",
            Self::Deprovisioned => "deprovisioned",
            Self::Bound => "bound",
            Self::Unbound => "unbound",
        }
    }
}

/// Payload handed to every listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub service_id: String,
    pub plan_id: String,
    pub instance_id: String,
    pub binding_id: Option<String>,
}

type Listener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Ordered listener sets keyed by event kind.
#[derive(Default)]
pub struct LifecycleEvents {
    listeners: RwLock<HashMap<LifecycleEventKind, Vec<Listener>>>,
}

impl LifecycleEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener for `kind`. Listeners run in the order they were added.
    pub fn on<F>(&self, kind: LifecycleEventKind, listener: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Invokes every listener registered for the event's kind.
    ///
    /// A panicking listener does not stop the ones after it.
    pub fn emit(&self, event: &LifecycleEvent) {
        // Clone the list so listeners may register further listeners.
        let listeners = self
            .listeners
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for (position, listener) in listeners.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                let message = panic_message(&*payload);
                error!(
                    event = event.kind.as_str(),
                    instance_id = %event.instance_id,
                    listener = position,
                    panic = %message,
                    "lifecycle listener panicked"
                );
            }
        }
    }

    #[must_use]
    pub fn listener_count(&self, kind: LifecycleEventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for LifecycleEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&'static str, usize> = self
            .listeners
            .read()
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect();
        f.debug_struct("LifecycleEvents")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: LifecycleEventKind) -> LifecycleEvent {
        LifecycleEvent {
            kind,
            service_id: "svc-1".to_string(),
            plan_id: "plan-free".to_string(),
            instance_id: "i1".to_string(),
            binding_id: None,
        }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let events = LifecycleEvents::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = Arc::clone(&log);
        events.on(LifecycleEventKind::Provisioned, move |e| {
            first.lock().push(format!("first:{}", e.instance_id));
        });
        let second = Arc::clone(&log);
        events.on(LifecycleEventKind::Provisioned, move |e| {
            second.lock().push(format!("second:{}", e.instance_id));
        });

        events.emit(&event(LifecycleEventKind::Provisioned));
        assert_eq!(*log.lock(), vec!["first:i1", "second:i1"]);
    }

    #[test]
    fn other_kinds_are_not_notified() {
        let events = LifecycleEvents::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        events.on(LifecycleEventKind::Bound, move |e| sink.lock().push(e.kind));

        events.emit(&event(LifecycleEventKind::Unbound));
        assert!(log.lock().is_empty());
        assert_eq!(events.listener_count(LifecycleEventKind::Bound), 1);
        assert_eq!(events.listener_count(LifecycleEventKind::Unbound), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_later_ones() {
        let events = LifecycleEvents::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        events.on(LifecycleEventKind::Bound, |_| panic!("audit sink unavailable"));
        let sink = Arc::clone(&log);
        events.on(LifecycleEventKind::Bound, move |e| {
            sink.lock().push(e.binding_id.clone());
        });

        let mut bound = event(LifecycleEventKind::Bound);
        bound.binding_id = Some("b1".to_string());
        events.emit(&bound);
        assert_eq!(*log.lock(), vec![Some("b1".to_string())]);
    }

    #[test]
    fn emit_without_listeners_is_a_no_op() {
        LifecycleEvents::new().emit(&event(LifecycleEventKind::Deprovisioned));
    }
}
