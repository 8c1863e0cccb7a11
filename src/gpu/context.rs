use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::{
    Backend, Buffer, BufferInfo, ContextInfo, Image, ImageInfo, MemoryHeap, ObjectLifetimeQueue,
    Result, Sampler, SamplerInfo, SoftwareBackend,
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A single device execution context.
///
/// All native object mutation happens while holding the context lock, proven
/// by a [`ContextLock`] token. Objects may be created and queued from any
/// thread; their queued work only runs when a lock holder drains the queue.
pub struct Context {
    id: u64,
    debug_name: String,
    device: Mutex<Box<dyn Backend>>,
    queue: Arc<ObjectLifetimeQueue>,
}

impl Context {
    pub fn new(backend: impl Backend + 'static, info: &ContextInfo) -> Arc<Self> {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "creating context '{}' ({}) on backend '{}'",
            info.debug_name,
            id,
            backend.name()
        );
        Arc::new(Self {
            id,
            debug_name: info.debug_name.to_string(),
            device: Mutex::new(Box::new(backend)),
            queue: Arc::new(ObjectLifetimeQueue::new(id)),
        })
    }

    /// Construct a [`Context`] backed by host memory.
    pub fn headless(info: &ContextInfo) -> Arc<Self> {
        Self::new(SoftwareBackend::new(), info)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn queue(&self) -> &Arc<ObjectLifetimeQueue> {
        &self.queue
    }

    /// Blocks until the device lock is acquired.
    pub fn lock(&self) -> ContextLock<'_> {
        ContextLock {
            context_id: self.id,
            device: self.device.lock(),
        }
    }

    pub fn try_lock(&self) -> Option<ContextLock<'_>> {
        self.device.try_lock().map(|device| ContextLock {
            context_id: self.id,
            device,
        })
    }

    /// Locks the context and runs every queued entry. Returns the number of
    /// entries executed.
    pub fn flush(&self) -> usize {
        let mut lock = self.lock();
        self.queue.drain(&mut lock)
    }

    /// Creates an image from `heap` and enqueues its allocation.
    pub fn make_image(
        &self,
        heap: Arc<dyn MemoryHeap>,
        info: &ImageInfo,
    ) -> Result<Arc<Image>> {
        let image = Image::new(self, heap, info)?;
        image.prepare_allocation();
        Ok(image)
    }

    /// Creates a buffer from `heap` and enqueues its allocation.
    pub fn make_buffer(
        &self,
        heap: Arc<dyn MemoryHeap>,
        info: &BufferInfo,
    ) -> Result<Arc<Buffer>> {
        let buffer = Buffer::new(self, heap, info)?;
        buffer.prepare_allocation();
        Ok(buffer)
    }

    /// Creates a sampler and enqueues its allocation.
    pub fn make_sampler(&self, debug_name: &str, info: &SamplerInfo) -> Arc<Sampler> {
        let sampler = Sampler::new(self, debug_name, info);
        sampler.prepare_allocation();
        sampler
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let pending = self.queue.len();
        if pending > 0 {
            log::warn!(
                "context '{}' dropped with {} queued lifetime entries",
                self.debug_name,
                pending
            );
        }
    }
}

/// Proof that the calling thread holds a context's device lock.
pub struct ContextLock<'a> {
    context_id: u64,
    device: MutexGuard<'a, Box<dyn Backend>>,
}

impl<'a> ContextLock<'a> {
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    /// Aborts unless this lock belongs to context `context_id`.
    pub fn check_owner(&self, context_id: u64) {
        assert_eq!(
            self.context_id, context_id,
            "device-context lock of context {} used for an object of context {}",
            self.context_id, context_id
        );
    }

    pub fn device(&mut self) -> &mut dyn Backend {
        &mut **self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_fails_while_locked() {
        let ctx = Context::headless(&Default::default());
        let lock = ctx.lock();
        assert!(ctx.try_lock().is_none());
        drop(lock);
        assert!(ctx.try_lock().is_some());
    }

    #[test]
    #[should_panic(expected = "device-context lock")]
    fn foreign_lock_is_fatal() {
        let a = Context::headless(&Default::default());
        let b = Context::headless(&Default::default());
        let lock = a.lock();
        lock.check_owner(b.id());
    }
}
