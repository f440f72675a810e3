//! FIFO capacity resource.
//!
//! A [`CapacityResource`] models a service point with a fixed number of
//! identical servers. Requests are granted strictly in arrival order: when a
//! slot is released and processes are waiting, the slot is handed directly to
//! the head of the queue, so no later request can overtake it.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use tracing::{debug, trace, warn};

use crate::error::SimError;

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Waker,
}

#[derive(Debug)]
struct ResourceState {
    name: String,
    capacity: usize,
    in_use: usize,
    next_waiter_id: u64,
    waiters: VecDeque<Waiter>,
    // Waiters handed a slot whose request future has not observed it yet.
    granted: HashSet<u64>,
    peak_in_use: usize,
    grants: u64,
    releases: u64,
}

impl ResourceState {
    fn occupy(&mut self) {
        self.in_use += 1;
        self.grants += 1;
        self.peak_in_use = self.peak_in_use.max(self.in_use);
    }

    /// Give one slot back. Returns the waker of the waiter it was handed to.
    fn release_slot(&mut self) -> Option<Waker> {
        self.releases += 1;
        match self.waiters.pop_front() {
            Some(next) => {
                // The slot changes hands; `in_use` is unchanged.
                self.grants += 1;
                self.granted.insert(next.id);
                trace!(
                    resource = %self.name,
                    waiter = next.id,
                    queued = self.waiters.len(),
                    "Slot handed to head of queue"
                );
                Some(next.waker)
            }
            None => {
                debug_assert!(self.in_use > 0, "release without a matching grant");
                self.in_use = self.in_use.saturating_sub(1);
                trace!(resource = %self.name, in_use = self.in_use, "Slot freed");
                None
            }
        }
    }

    fn enqueue(&mut self, waker: Waker) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.waiters.push_back(Waiter { id, waker });
        trace!(
            resource = %self.name,
            waiter = id,
            queued = self.waiters.len(),
            "Request queued"
        );
        id
    }
}

/// A pool of `capacity` identical slots with a FIFO wait queue.
///
/// Clones share the same pool.
#[derive(Clone)]
pub struct CapacityResource {
    state: Rc<RefCell<ResourceState>>,
}

impl CapacityResource {
    /// Create a resource with `capacity` slots. Fails with
    /// [`SimError::InvalidParameter`] when `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, SimError> {
        let name = name.into();
        if capacity == 0 {
            return Err(SimError::invalid_parameter(format!(
                "resource '{name}' must have a capacity of at least 1"
            )));
        }
        debug!(resource = %name, capacity, "Created capacity resource");

        Ok(Self {
            state: Rc::new(RefCell::new(ResourceState {
                name,
                capacity,
                in_use: 0,
                next_waiter_id: 0,
                waiters: VecDeque::new(),
                granted: HashSet::new(),
                peak_in_use: 0,
                grants: 0,
                releases: 0,
            })),
        })
    }

    /// Ask for a slot.
    ///
    /// The returned future resolves to a [`ResourceGuard`] once a slot is
    /// held. If a slot is free and nobody is queued, it resolves on its first
    /// poll without suspending.
    pub fn request(&self) -> Request {
        Request {
            resource: self.clone(),
            waiter: None,
            completed: false,
        }
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Slots currently held, including slots handed to waiters that have not
    /// resumed yet.
    pub fn in_use(&self) -> usize {
        self.state.borrow().in_use
    }

    /// Number of queued requests.
    pub fn queue_len(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    pub fn peak_in_use(&self) -> usize {
        self.state.borrow().peak_in_use
    }

    /// Total slots granted so far.
    pub fn grants(&self) -> u64 {
        self.state.borrow().grants
    }

    /// Total slots given back so far.
    pub fn releases(&self) -> u64 {
        self.state.borrow().releases
    }

    fn release_slot(&self) {
        let waker = self.state.borrow_mut().release_slot();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl fmt::Debug for CapacityResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("CapacityResource")
            .field("name", &state.name)
            .field("capacity", &state.capacity)
            .field("in_use", &state.in_use)
            .field("queued", &state.waiters.len())
            .finish()
    }
}

/// Future returned by [`CapacityResource::request`].
///
/// Dropping a pending request takes it out of the queue. If a slot had already
/// been handed to it, the slot is passed on.
#[must_use = "futures do nothing unless awaited"]
pub struct Request {
    resource: CapacityResource,
    waiter: Option<u64>,
    completed: bool,
}

impl Request {
    fn granted(&mut self) -> Poll<ResourceGuard> {
        self.waiter = None;
        self.completed = true;
        Poll::Ready(ResourceGuard {
            resource: self.resource.clone(),
        })
    }
}

impl Future for Request {
    type Output = ResourceGuard;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<ResourceGuard> {
        if self.completed {
            warn!("Request polled after completion");
            return Poll::Pending;
        }

        let resource = self.resource.clone();
        let mut state = resource.state.borrow_mut();

        if let Some(id) = self.waiter {
            if state.granted.remove(&id) {
                drop(state);
                return self.granted();
            }
            if let Some(waiter) = state.waiters.iter_mut().find(|w| w.id == id) {
                waiter.waker.clone_from(cx.waker());
                return Poll::Pending;
            }
            warn!(resource = %state.name, waiter = id, "Lost request re-queued");
            let id = state.enqueue(cx.waker().clone());
            self.waiter = Some(id);
            return Poll::Pending;
        }

        if state.in_use < state.capacity && state.waiters.is_empty() {
            state.occupy();
            trace!(resource = %state.name, in_use = state.in_use, "Slot granted");
            drop(state);
            return self.granted();
        }

        let id = state.enqueue(cx.waker().clone());
        self.waiter = Some(id);
        Poll::Pending
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        let Some(id) = self.waiter.take() else {
            return;
        };
        let handed_over = {
            let mut state = self.resource.state.borrow_mut();
            if state.granted.remove(&id) {
                true
            } else {
                if let Some(pos) = state.waiters.iter().position(|w| w.id == id) {
                    state.waiters.remove(pos);
                }
                false
            }
        };
        if handed_over {
            self.resource.release_slot();
        }
    }
}

/// A held slot. The slot is released exactly once, by [`ResourceGuard::release`]
/// or when the guard is dropped, whichever comes first.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct ResourceGuard {
    resource: CapacityResource,
}

impl ResourceGuard {
    /// Give the slot back now.
    pub fn release(self) {
        drop(self);
    }

    pub fn resource(&self) -> &CapacityResource {
        &self.resource
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.resource.release_slot();
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard").field("resource", &self.resource).finish()
    }
}
