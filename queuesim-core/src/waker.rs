//! Wakers for logical processes.
//!
//! Waking a process never polls it directly. The waker only records the
//! process, as an effect of the running poll when there is one and in the
//! scheduler's deferred wakes otherwise. Deferred wakes become zero-delay
//! `Wake` events once the current simulation step ends, so every resumption
//! goes through the scheduler queue.

use std::sync::{Arc, Mutex};
use std::task::{Wake, Waker};

use crate::async_runtime::{defer_wake, RuntimeEvent};
use crate::types::ProcessId;
use crate::Key;

/// Processes woken outside a poll, not yet turned into events.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeferredWakes {
    woken: Arc<Mutex<Vec<(Key<RuntimeEvent>, ProcessId)>>>,
}

impl DeferredWakes {
    pub(crate) fn same_queue(&self, other: &DeferredWakes) -> bool {
        Arc::ptr_eq(&self.woken, &other.woken)
    }

    fn push(&self, runtime: Key<RuntimeEvent>, process: ProcessId) {
        // A poisoned queue only means a panic elsewhere; the ids are still valid.
        let mut woken = self.woken.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        woken.push((runtime, process));
    }

    /// Take the woken processes in wake order, without duplicates.
    pub(crate) fn drain(&self) -> Vec<(Key<RuntimeEvent>, ProcessId)> {
        let mut woken = self.woken.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut drained: Vec<(Key<RuntimeEvent>, ProcessId)> = Vec::with_capacity(woken.len());
        for (runtime, process) in woken.drain(..) {
            if !drained
                .iter()
                .any(|(r, p)| r.id() == runtime.id() && *p == process)
            {
                drained.push((runtime, process));
            }
        }
        drained
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.woken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }

    /// Create the waker handed to `process` of `runtime` while it is polled.
    pub(crate) fn waker(&self, runtime: Key<RuntimeEvent>, process: ProcessId) -> Waker {
        Waker::from(Arc::new(ProcessWaker {
            runtime,
            process,
            deferred: self.clone(),
        }))
    }
}

struct ProcessWaker {
    runtime: Key<RuntimeEvent>,
    process: ProcessId,
    deferred: DeferredWakes,
}

impl Wake for ProcessWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if !defer_wake(&self.deferred, self.runtime, self.process) {
            self.deferred.push(self.runtime, self.process);
        }
    }
}
