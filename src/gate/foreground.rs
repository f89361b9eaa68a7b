//! Foreground events (visibility, focus, pageshow) as an injected source.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForegroundEvent {
    /// Page became visible.
    Visible,
    /// Page was hidden (tab switched, window minimised).
    Hidden,
    Focus,
    /// Page restored, possibly from the back/forward cache.
    PageShow,
}

impl ForegroundEvent {
    /// Whether the event brings the view back to the user.
    #[must_use]
    pub const fn is_foreground(self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

pub type Listener = Arc<dyn Fn(ForegroundEvent) + Send + Sync>;

pub trait ForegroundSource: Send + Sync {
    fn is_visible(&self) -> bool;
    /// Register a listener until the returned [`Subscription`] is dropped.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Unsubscribes on drop.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    #[must_use]
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

type Listeners = Mutex<BTreeMap<u64, Listener>>;

/// Fan-out point the host feeds with page events.
///
/// Tracks visibility itself so late subscribers can ask for the current state.
#[derive(Clone)]
pub struct ForegroundHub {
    visible: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    listeners: Arc<Listeners>,
}

impl ForegroundHub {
    #[must_use]
    pub fn new(visible: bool) -> Self {
        Self {
            visible: Arc::new(AtomicBool::new(visible)),
            next_id: Arc::new(AtomicU64::new(0)),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Deliver `event` to every listener.
    pub fn emit(&self, event: ForegroundEvent) {
        match event {
            ForegroundEvent::Hidden => self.visible.store(false, Ordering::SeqCst),
            ForegroundEvent::Visible => self.visible.store(true, Ordering::SeqCst),
            ForegroundEvent::Focus | ForegroundEvent::PageShow => {}
        }

        // Snapshot first so listeners can unsubscribe from inside the callback.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .map(|listeners| listeners.values().cloned().collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map_or(0, |listeners| listeners.len())
    }
}

impl Default for ForegroundHub {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ForegroundSource for ForegroundHub {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, listener);
        }

        let weak: Weak<Listeners> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                if let Ok(mut listeners) = listeners.lock() {
                    listeners.remove(&id);
                }
            }
        })
    }
}

impl std::fmt::Debug for ForegroundHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundHub")
            .field("visible", &self.is_visible())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_listeners_and_tracks_visibility() {
        let hub = ForegroundHub::new(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = hub.subscribe(Arc::new(move |event| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(event);
            }
        }));

        hub.emit(ForegroundEvent::Hidden);
        assert!(!hub.is_visible());
        hub.emit(ForegroundEvent::Visible);
        assert!(hub.is_visible());

        let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec![ForegroundEvent::Hidden, ForegroundEvent::Visible]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let hub = ForegroundHub::default();
        let sub = hub.subscribe(Arc::new(|_| {}));
        assert_eq!(hub.listener_count(), 1);
        drop(sub);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn hidden_is_not_foreground() {
        assert!(!ForegroundEvent::Hidden.is_foreground());
        assert!(ForegroundEvent::Focus.is_foreground());
        assert!(ForegroundEvent::PageShow.is_foreground());
    }
}
