use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{ContextLock, NativeHandle};

/// Lifecycle of a queued GPU object.
///
/// `Unallocated -> Allocating -> Allocated -> Releasing -> Deallocating -> Deallocated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    Unallocated,
    Allocating,
    Allocated,
    Releasing,
    Deallocating,
    Deallocated,
}

/// An object whose native allocation is deferred to the lifetime queue.
pub trait QueuedObject: Send + Sync {
    fn debug_name(&self) -> &str;

    /// Installs the native object. Runs with the context lock held.
    fn allocate_on_queue(&self, lock: &mut ContextLock<'_>);

    /// Destroys the native object. A no-op once the handle has been cleared.
    fn deallocate_on_queue(&self, lock: &mut ContextLock<'_>);
}

/// Deferred work that runs with the context lock held.
pub type QueueTask = Box<dyn FnOnce(&mut ContextLock<'_>) + Send>;

enum QueueEntry {
    Allocate(Arc<dyn QueuedObject>),
    Deallocate(Arc<dyn QueuedObject>),
    Task(QueueTask),
}

#[derive(Default)]
struct Pending {
    entries: VecDeque<QueueEntry>,
    executing: usize,
    /// Set once an entry panicked while being executed.
    poisoned: bool,
}

/// Marks one popped entry as finished, including when it unwinds.
struct ExecutingGuard<'a> {
    queue: &'a ObjectLifetimeQueue,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.queue.pending.lock();
        pending.executing -= 1;
        if std::thread::panicking() {
            pending.poisoned = true;
            log::error!(
                "lifetime queue entry of context {} panicked",
                self.queue.context_id
            );
            self.queue.idle.notify_all();
        }
    }
}

/// FIFO of allocation, deallocation and transfer work for one context.
///
/// Entries may be pushed from any thread. They only execute inside
/// [`drain`](Self::drain), which requires the owning context's lock. Entries
/// run strictly in submission order, so an object's deallocation can never
/// overtake its allocation.
pub struct ObjectLifetimeQueue {
    context_id: u64,
    pending: Mutex<Pending>,
    work_available: Condvar,
    idle: Condvar,
}

impl ObjectLifetimeQueue {
    pub(crate) fn new(context_id: u64) -> Self {
        Self {
            context_id,
            pending: Mutex::new(Pending::default()),
            work_available: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    pub fn len(&self) -> usize {
        self.pending.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enqueue_object_allocation(&self, obj: Arc<dyn QueuedObject>) {
        log::debug!("enqueue allocation of '{}'", obj.debug_name());
        self.push(QueueEntry::Allocate(obj));
    }

    pub fn enqueue_object_deallocation(&self, obj: Arc<dyn QueuedObject>) {
        log::debug!("enqueue deallocation of '{}'", obj.debug_name());
        self.push(QueueEntry::Deallocate(obj));
    }

    pub fn enqueue_task<F>(&self, task: F)
    where
        F: FnOnce(&mut ContextLock<'_>) + Send + 'static,
    {
        self.push(QueueEntry::Task(Box::new(task)));
    }

    fn push(&self, entry: QueueEntry) {
        self.pending.lock().entries.push_back(entry);
        self.work_available.notify_all();
    }

    /// Runs queued entries until the queue is empty, including entries that
    /// are pushed while draining. Returns the number executed.
    pub fn drain(&self, lock: &mut ContextLock<'_>) -> usize {
        lock.check_owner(self.context_id);

        let mut executed = 0;
        loop {
            let entry = {
                let mut pending = self.pending.lock();
                match pending.entries.pop_front() {
                    Some(entry) => {
                        pending.executing += 1;
                        entry
                    }
                    None => {
                        if pending.executing == 0 {
                            self.idle.notify_all();
                        }
                        break;
                    }
                }
            };

            let _executing = ExecutingGuard { queue: self };
            match entry {
                QueueEntry::Allocate(obj) => obj.allocate_on_queue(lock),
                QueueEntry::Deallocate(obj) => obj.deallocate_on_queue(lock),
                QueueEntry::Task(task) => task(lock),
            }
            executed += 1;
        }

        if executed > 0 {
            log::trace!("drained {} lifetime queue entries", executed);
        }
        executed
    }

    /// Waits up to `timeout` for entries to arrive. Returns whether any are pending.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if pending.entries.is_empty() {
            self.work_available.wait_for(&mut pending, timeout);
        }
        !pending.entries.is_empty()
    }

    /// Blocks until another thread has drained every pending entry. Returns
    /// `false` instead if an entry panicked, since the draining thread is gone.
    pub fn wait_idle(&self) -> bool {
        let mut pending = self.pending.lock();
        while !pending.poisoned && (!pending.entries.is_empty() || pending.executing > 0) {
            self.idle.wait(&mut pending);
        }
        !pending.poisoned
    }

    /// Whether an entry has panicked while being drained.
    pub fn is_poisoned(&self) -> bool {
        self.pending.lock().poisoned
    }

    pub(crate) fn wake(&self) {
        self.work_available.notify_all();
    }
}

struct LifetimeSlot {
    state: ObjectState,
    native: NativeHandle,
}

/// State and native handle shared by every queued object type.
pub(crate) struct LifetimeCell {
    slot: Mutex<LifetimeSlot>,
}

impl LifetimeCell {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(LifetimeSlot {
                state: ObjectState::Unallocated,
                native: NativeHandle::NULL,
            }),
        }
    }

    pub(crate) fn state(&self) -> ObjectState {
        self.slot.lock().state
    }

    pub(crate) fn native(&self) -> NativeHandle {
        self.slot.lock().native
    }

    pub(crate) fn begin_allocation(&self, name: &str) {
        let mut slot = self.slot.lock();
        assert_eq!(
            slot.state,
            ObjectState::Unallocated,
            "'{}' prepared for allocation twice",
            name
        );
        slot.state = ObjectState::Allocating;
    }

    /// Runs `allocate` unless a native object is already installed.
    pub(crate) fn allocate_with(&self, allocate: impl FnOnce() -> NativeHandle) -> NativeHandle {
        let mut slot = self.slot.lock();
        if slot.native.is_null() {
            slot.native = allocate();
            assert!(!slot.native.is_null(), "backend returned a null native handle");
        }
        // A release may already be queued behind us; only advance a pending allocation.
        if slot.state == ObjectState::Allocating {
            slot.state = ObjectState::Allocated;
        }
        slot.native
    }

    /// Returns whether a native deallocation must be queued. Objects that
    /// were never prepared have nothing on the device.
    pub(crate) fn begin_release(&self, name: &str) -> bool {
        let mut slot = self.slot.lock();
        assert!(
            matches!(
                slot.state,
                ObjectState::Unallocated | ObjectState::Allocating | ObjectState::Allocated
            ),
            "'{}' released while {:?}",
            name,
            slot.state
        );
        let queued = slot.state != ObjectState::Unallocated;
        slot.state = ObjectState::Releasing;
        queued
    }

    pub(crate) fn finish_release(&self, queued: bool) {
        self.slot.lock().state = if queued {
            ObjectState::Deallocating
        } else {
            ObjectState::Deallocated
        };
    }

    /// Clears and returns the native handle, or `None` if already cleared.
    pub(crate) fn take_native(&self) -> Option<NativeHandle> {
        let mut slot = self.slot.lock();
        if slot.native.is_null() {
            return None;
        }
        let native = std::mem::take(&mut slot.native);
        if slot.state == ObjectState::Deallocating {
            slot.state = ObjectState::Deallocated;
        }
        Some(native)
    }
}
