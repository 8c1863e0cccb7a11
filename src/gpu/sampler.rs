use std::fmt;
use std::sync::Arc;

use super::lifetime_queue::LifetimeCell;
use super::{
    Context, ContextLock, NativeHandle, ObjectLifetimeQueue, ObjectState, QueuedObject,
    SamplerInfo,
};

/// Immutable sampling state. Samplers own no heap memory.
pub struct Sampler {
    debug_name: String,
    info: SamplerInfo,
    queue: Arc<ObjectLifetimeQueue>,
    lifetime: LifetimeCell,
}

impl Sampler {
    pub fn new(ctx: &Context, debug_name: &str, info: &SamplerInfo) -> Arc<Self> {
        Arc::new(Self {
            debug_name: debug_name.to_string(),
            info: *info,
            queue: ctx.queue().clone(),
            lifetime: LifetimeCell::new(),
        })
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn info(&self) -> &SamplerInfo {
        &self.info
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
        self.lifetime.finish_release(queued);
        if queued {
            self.queue.enqueue_object_deallocation(self.clone());
        }
    }
}

impl QueuedObject for Sampler {
    fn debug_name(&self) -> &str {
        &self.debug_name
    }

    fn allocate_on_queue(&self, lock: &mut ContextLock<'_>) {
        lock.check_owner(self.queue.context_id());
        let info = self.info;
        self.lifetime
            .allocate_with(|| lock.device().allocate_sampler(&info));
    }

    fn deallocate_on_queue(&self, lock: &mut ContextLock<'_>) {
        lock.check_owner(self.queue.context_id());
        if let Some(native) = self.lifetime.take_native() {
            lock.device().deallocate_sampler(native);
        }
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("debug_name", &self.debug_name)
            .field("state", &self.state())
            .finish()
    }
}
