#![allow(dead_code)]

use std::sync::Arc;

use hikari::gpu::{
    BackendEvent, Context, ContextInfo, EventLog, HeapInfo, MemoryHeap, OffsetHeap,
    SoftwareBackend,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A software-backed context that records every native call.
pub struct TestContext {
    ctx: Arc<Context>,
    events: EventLog,
    pub heap: Arc<dyn MemoryHeap>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_heap_size(16 * 1024 * 1024)
    }

    pub fn with_heap_size(byte_size: u32) -> Self {
        init_logging();
        let events = EventLog::default();
        let ctx = Context::new(
            SoftwareBackend::with_event_log(events.clone()),
            &ContextInfo {
                debug_name: "test",
            },
        );
        let heap: Arc<dyn MemoryHeap> = Arc::new(OffsetHeap::new(&HeapInfo {
            debug_name: "test_heap",
            byte_size,
            ..Default::default()
        }));
        Self { ctx, events, heap }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn events(&self) -> Vec<BackendEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }
}

impl std::ops::Deref for TestContext {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

/// Tightly packed RGBA8 texels whose every byte encodes its row.
pub fn row_pattern(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| std::iter::repeat(y as u8 + 1).take(width as usize * 4))
        .collect()
}
