use std::fmt;
use std::sync::Arc;

use super::lifetime_queue::LifetimeCell;
use super::{
    AllocationToken, BufferInfo, BufferUsage, Context, ContextLock, MemoryHeap, MemoryVisibility,
    NativeHandle, ObjectLifetimeQueue, ObjectState, QueuedObject, Result,
};

/// A linear, heap-backed byte resource.
pub struct Buffer {
    debug_name: String,
    byte_size: u64,
    usage: BufferUsage,
    visibility: MemoryVisibility,
    allocation: AllocationToken,
    heap: Arc<dyn MemoryHeap>,
    queue: Arc<ObjectLifetimeQueue>,
    lifetime: LifetimeCell,
}

impl Buffer {
    pub fn new(ctx: &Context, heap: Arc<dyn MemoryHeap>, info: &BufferInfo) -> Result<Arc<Self>> {
        assert!(info.byte_size > 0, "buffer '{}' has zero size", info.debug_name);
        let allocation = heap.request_allocation(info.byte_size)?;
        log::debug!("buffer '{}' needs {} bytes", info.debug_name, info.byte_size);

        Ok(Arc::new(Self {
            debug_name: info.debug_name.to_string(),
            byte_size: info.byte_size,
            usage: info.usage,
            visibility: info.visibility,
            allocation,
            heap,
            queue: ctx.queue().clone(),
            lifetime: LifetimeCell::new(),
        }))
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn visibility(&self) -> MemoryVisibility {
        self.visibility
    }

    pub fn allocation(&self) -> AllocationToken {
        self.allocation
    }

    pub fn memory_heap(&self) -> &Arc<dyn MemoryHeap> {
        &self.heap
    }

    pub fn state(&self) -> ObjectState {
        self.lifetime.state()
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.lifetime.native()
    }

    pub fn prepare_allocation(self: &Arc<Self>) {
        self.lifetime.begin_allocation(&self.debug_name);
        self.queue.enqueue_object_allocation(self.clone());
    }

    pub fn release(self: &Arc<Self>) {
        let queued = self.lifetime.begin_release(&self.debug_name);
        self.heap.release_buffer(self);
        self.lifetime.finish_release(queued);
        if queued {
            self.queue.enqueue_object_deallocation(self.clone());
        }
    }

    fn check_range(&self, offset: u64, len: usize) -> NativeHandle {
        let native = self.lifetime.native();
        assert!(
            !native.is_null(),
            "transfer on buffer '{}' before its allocation ran",
            self.debug_name
        );
        let end = offset.checked_add(len as u64);
        assert!(
            end.is_some_and(|end| end <= self.byte_size),
            "buffer '{}': {} bytes at offset {} exceed its {} bytes",
            self.debug_name,
            len,
            offset,
            self.byte_size
        );
        native
    }

    pub fn read_data_on_queue(&self, lock: &mut ContextLock<'_>, offset: u64, target: &mut [u8]) {
        lock.check_owner(self.queue.context_id());
        let native = self.check_range(offset, target.len());
        lock.device().read_buffer(native, offset, target);
    }

    pub fn write_data_on_queue(&self, lock: &mut ContextLock<'_>, offset: u64, source: &[u8]) {
        lock.check_owner(self.queue.context_id());
        let native = self.check_range(offset, source.len());
        lock.device().write_buffer(native, offset, source);
    }

    /// Queues an upload of `data` at `offset` behind any pending work.
    pub fn enqueue_write(self: &Arc<Self>, offset: u64, data: Vec<u8>) {
        let buffer = self.clone();
        self.queue.enqueue_task(move |lock| {
            buffer.write_data_on_queue(lock, offset, &data);
        });
    }
}

impl QueuedObject for Buffer {
    fn debug_name(&self) -> &str {
        &self.debug_name
    }

    fn allocate_on_queue(&self, lock: &mut ContextLock<'_>) {
        lock.check_owner(self.queue.context_id());
        let (size, usage) = (self.byte_size, self.usage);
        let native = self
            .lifetime
            .allocate_with(|| lock.device().allocate_buffer(size, usage));
        log::debug!("allocated buffer '{}' as {:?}", self.debug_name, native);
    }

    fn deallocate_on_queue(&self, lock: &mut ContextLock<'_>) {
        lock.check_owner(self.queue.context_id());
        match self.lifetime.take_native() {
            Some(native) => {
                lock.device().deallocate_buffer(native);
                log::debug!("deallocated buffer '{}'", self.debug_name);
            }
            None => log::warn!("buffer '{}' already deallocated", self.debug_name),
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("debug_name", &self.debug_name)
            .field("byte_size", &self.byte_size)
            .field("usage", &self.usage)
            .field("state", &self.state())
            .finish()
    }
}
