//! Memoized component slots
//!
//! A `Slot` builds its component at most once and hands out the same `Arc`
//! afterwards. The state lives behind a mutex; the mutex is never held while
//! the component is being built, so a builder may request other slots.
//!
//! ```text
//! Empty ──get_or_try_init──▶ Building(thread) ──Ok──▶ Ready(Arc)
//!                                   │
//!                                   └──Err/panic──▶ Failed
//! ```
//!
//! A thread that asks for a slot it is itself building gets
//! `DependencyNotReady`. Other threads wait on the condvar for the outcome.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::context::error::{Component, ContextError, ContextResult};

enum SlotState<T> {
    Empty,
    Building(ThreadId),
    Ready(Arc<T>),
    Failed(String),
}

/// Lazily built, memoized component
pub struct Slot<T> {
    component: Component,
    state: Mutex<SlotState<T>>,
    settled: Condvar,
    builds: AtomicUsize,
}

impl<T> Slot<T> {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            state: Mutex::new(SlotState::Empty),
            settled: Condvar::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// Component this slot holds
    pub fn component(&self) -> Component {
        self.component
    }

    /// The component if it has been built
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.state.lock() {
            SlotState::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Number of successful constructions
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Return the component, building it with `init` if needed
    pub fn get_or_try_init<F>(&self, init: F) -> ContextResult<Arc<T>>
    where
        F: FnOnce() -> ContextResult<T>,
    {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let wait = match &*state {
                SlotState::Ready(value) => return Ok(Arc::clone(value)),
                SlotState::Failed(reason) => {
                    return Err(ContextError::not_ready(
                        self.component,
                        format!("construction failed earlier: {}", reason),
                    ))
                }
                SlotState::Building(owner) if *owner == me => {
                    return Err(ContextError::not_ready(
                        self.component,
                        "requested while it is being built",
                    ))
                }
                SlotState::Building(_) => true,
                SlotState::Empty => false,
            };
            if !wait {
                break;
            }
            self.settled.wait(&mut state);
        }
        *state = SlotState::Building(me);
        drop(state);

        let mut guard = BuildGuard {
            slot: self,
            armed: true,
        };
        let result = init();
        guard.armed = false;

        let mut state = self.state.lock();
        let outcome = match result {
            Ok(value) => {
                let value = Arc::new(value);
                *state = SlotState::Ready(Arc::clone(&value));
                self.builds.fetch_add(1, Ordering::Relaxed);
                debug!(component = %self.component, "Built component");
                Ok(value)
            }
            Err(err) => {
                warn!(component = %self.component, error = %err, "Component construction failed");
                *state = SlotState::Failed(err.to_string());
                Err(err)
            }
        };
        self.settled.notify_all();
        outcome
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            SlotState::Empty => "empty",
            SlotState::Building(_) => "building",
            SlotState::Ready(_) => "ready",
            SlotState::Failed(_) => "failed",
        };
        f.debug_struct("Slot")
            .field("component", &self.component)
            .field("state", &state)
            .field("builds", &self.builds())
            .finish()
    }
}

/// Marks the slot failed if the builder unwinds
struct BuildGuard<'a, T> {
    slot: &'a Slot<T>,
    armed: bool,
}

impl<T> Drop for BuildGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.state.lock() = SlotState::Failed("builder panicked".to_string());
            self.slot.settled.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_builds_once() {
        let slot = Slot::new(Component::Cluster);
        assert!(slot.get().is_none());

        let a = slot.get_or_try_init(|| Ok(42)).unwrap();
        let b = slot.get_or_try_init(|| Ok(7)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 42);
        assert_eq!(slot.builds(), 1);
        assert!(slot.get().is_some());
    }

    #[test]
    fn test_failure_is_sticky() {
        let slot: Slot<u32> = Slot::new(Component::Validator);
        let err = slot
            .get_or_try_init(|| Err(ContextError::InvalidArgument("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, ContextError::InvalidArgument(_)));

        match slot.get_or_try_init(|| Ok(1)) {
            Err(ContextError::DependencyNotReady { component, reason }) => {
                assert_eq!(component, Component::Validator);
                assert!(reason.contains("boom"));
            }
            _ => panic!("Expected DependencyNotReady"),
        }
        assert_eq!(slot.builds(), 0);
    }

    #[test]
    fn test_reentrant_request_fails() {
        let slot: Slot<u32> = Slot::new(Component::Converter);
        let err = slot
            .get_or_try_init(|| {
                let inner = slot.get_or_try_init(|| Ok(1));
                assert!(matches!(
                    inner,
                    Err(ContextError::DependencyNotReady {
                        component: Component::Converter,
                        ..
                    })
                ));
                inner.map(|v| *v)
            })
            .unwrap_err();
        assert!(matches!(err, ContextError::DependencyNotReady { .. }));
    }

    #[test]
    fn test_concurrent_requests_share_instance() {
        let slot = Arc::new(Slot::new(Component::AlgebraBuilder));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    slot.get_or_try_init(|| {
                        std::thread::sleep(Duration::from_millis(20));
                        Ok(String::from("built"))
                    })
                    .unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], r));
        }
        assert_eq!(slot.builds(), 1);
    }
}
