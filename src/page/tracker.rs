use crate::page::types::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use tracing::debug;

/// Tracks which page is currently in the foreground.
///
/// The UI layer reports lifecycle transitions; the tracker keeps exactly the
/// most recently resumed activity and the most recently attached fragment
/// (no back stack) and notifies registered observers on every change.
pub struct PageTracker {
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    current_activity: Option<PageRef>,
    current_fragment: Option<PageRef>,
    observers: Vec<Arc<dyn PageConditionObserver>>,
}

impl PageTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// An activity came to the foreground
    pub fn on_page_resumed(&self, page: PageRef) {
        debug!("Page resumed: {}", page);
        self.state.lock().current_activity = Some(page);
        self.notify_page_changed();
    }

    /// An activity left the foreground
    pub fn on_page_paused(&self, page: &PageRef) {
        self.clear_activity_if_current(page, "paused");
    }

    /// An activity was destroyed
    pub fn on_page_destroyed(&self, page: &PageRef) {
        self.clear_activity_if_current(page, "destroyed");
    }

    pub fn set_current_fragment(&self, fragment: PageRef) {
        debug!("Fragment attached: {}", fragment);
        self.state.lock().current_fragment = Some(fragment);
        self.notify_page_changed();
    }

    pub fn clear_current_fragment(&self) {
        self.state.lock().current_fragment = None;
    }

    pub fn current_activity(&self) -> Option<PageRef> {
        self.state.lock().current_activity.clone()
    }

    pub fn current_fragment(&self) -> Option<PageRef> {
        self.state.lock().current_fragment.clone()
    }

    /// Check whether the current activity or fragment is a page of kind `page`
    pub fn is_in_page(&self, page: &PageId) -> bool {
        let state = self.state.lock();
        state.current_activity.as_ref().is_some_and(|p| p.is(page))
            || state.current_fragment.as_ref().is_some_and(|p| p.is(page))
    }

    /// Register an observer and evaluate it against the current page right away.
    ///
    /// An observer that is already satisfied by the current page is removed
    /// again before this returns.
    pub fn add_page_observer(&self, observer: Arc<dyn PageConditionObserver>) {
        let (activity, fragment) = {
            let mut state = self.state.lock();
            state.observers.push(observer.clone());
            (state.current_activity.clone(), state.current_fragment.clone())
        };

        observer.check(activity.as_ref(), fragment.as_ref());
        if observer.is_satisfied() {
            self.remove_page_observer(&observer);
        }
    }

    pub fn remove_page_observer(&self, observer: &Arc<dyn PageConditionObserver>) {
        self.state
            .lock()
            .observers
            .retain(|registered| !Arc::ptr_eq(registered, observer));
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    fn clear_activity_if_current(&self, page: &PageRef, transition: &str) {
        let mut state = self.state.lock();
        if state.current_activity.as_ref() == Some(page) {
            debug!("Page {}: {}", transition, page);
            state.current_activity = None;
        } else {
            debug!("Ignoring {} for non-current page {}", transition, page);
        }
    }

    /// Run every observer against the current page, in registration order.
    ///
    /// The lock is released while observers run so they can query the tracker.
    fn notify_page_changed(&self) {
        let (activity, fragment, observers) = {
            let state = self.state.lock();
            (
                state.current_activity.clone(),
                state.current_fragment.clone(),
                state.observers.clone(),
            )
        };

        let mut satisfied = Vec::new();
        for observer in observers {
            observer.check(activity.as_ref(), fragment.as_ref());
            if observer.is_satisfied() {
                satisfied.push(observer);
            }
        }

        if !satisfied.is_empty() {
            debug!("Removing {} satisfied page observers", satisfied.len());
            self.state.lock().observers.retain(|registered| {
                !satisfied
                    .iter()
                    .any(|done| Arc::ptr_eq(registered, done))
            });
        }
    }
}

impl Default for PageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot observer that resolves once a page of the given kind is shown
pub struct PageWaiter {
    page: PageId,
    satisfied: AtomicBool,
    notify: Mutex<Option<oneshot::Sender<PageRef>>>,
}

impl PageWaiter {
    /// Create a waiter and the receiver that yields the matching page instance
    pub fn new(page: impl Into<PageId>) -> (Arc<Self>, oneshot::Receiver<PageRef>) {
        let (tx, rx) = oneshot::channel();
        let waiter = Arc::new(Self {
            page: page.into(),
            satisfied: AtomicBool::new(false),
            notify: Mutex::new(Some(tx)),
        });
        (waiter, rx)
    }
}

impl PageConditionObserver for PageWaiter {
    fn check(&self, activity: Option<&PageRef>, fragment: Option<&PageRef>) {
        let matched = activity
            .filter(|p| p.is(&self.page))
            .or_else(|| fragment.filter(|p| p.is(&self.page)));

        if let Some(page) = matched {
            self.satisfied.store(true, Ordering::SeqCst);
            if let Some(tx) = self.notify.lock().take() {
                let _ = tx.send(page.clone());
            }
        }
    }

    fn is_satisfied(&self) -> bool {
        self.satisfied.load(Ordering::SeqCst)
    }
}
