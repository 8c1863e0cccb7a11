use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::utils::{Handle, Pool};

use super::{Buffer, GPUError, HeapInfo, Image, Result};

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

fn next_heap_id() -> u64 {
    NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct HeapAllocation {
    block: Option<offset_allocator::Allocation>,
    size: u64,
}

/// Proof of a live allocation, routed back to the heap that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationToken {
    heap_id: u64,
    handle: Handle<HeapAllocation>,
    offset: u64,
    size: u64,
}

impl AllocationToken {
    pub fn heap_id(&self) -> u64 {
        self.heap_id
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub allocation_count: usize,
    pub bytes_in_use: u64,
    pub capacity: u64,
}

/// A pool of device memory that resources request storage from.
///
/// Implementations choose their own sub-allocation strategy and must keep
/// their allocation table consistent under concurrent calls. A resource is
/// released exactly once, to the heap that produced it, before its native
/// deallocation is enqueued.
pub trait MemoryHeap: Send + Sync {
    fn id(&self) -> u64;

    fn debug_name(&self) -> &str;

    fn request_allocation(&self, byte_size: u64) -> Result<AllocationToken>;

    /// Returns `token` to the heap. Releasing a token twice, or to a heap
    /// that did not issue it, is fatal.
    fn release(&self, token: AllocationToken);

    fn stats(&self) -> HeapStats;

    fn release_image(&self, image: &Image) {
        log::debug!("heap '{}' releasing image '{}'", self.debug_name(), image.debug_name());
        self.release(image.allocation());
    }

    fn release_buffer(&self, buffer: &Buffer) {
        log::debug!("heap '{}' releasing buffer '{}'", self.debug_name(), buffer.debug_name());
        self.release(buffer.allocation());
    }
}

fn check_origin(heap_id: u64, heap_name: &str, token: &AllocationToken) {
    assert_eq!(
        token.heap_id, heap_id,
        "allocation from heap {} released to heap '{}' ({})",
        token.heap_id, heap_name, heap_id
    );
}

struct OffsetHeapInner {
    allocator: offset_allocator::Allocator,
    records: Pool<HeapAllocation>,
    bytes_in_use: u64,
}

/// Fixed-capacity heap that sub-allocates ranges with an offset allocator.
pub struct OffsetHeap {
    id: u64,
    debug_name: String,
    capacity: u32,
    inner: Mutex<OffsetHeapInner>,
}

impl OffsetHeap {
    pub fn new(info: &HeapInfo) -> Self {
        let id = next_heap_id();
        log::debug!(
            "creating offset heap '{}' ({}) with {} bytes",
            info.debug_name,
            id,
            info.byte_size
        );
        Self {
            id,
            debug_name: info.debug_name.to_string(),
            capacity: info.byte_size,
            inner: Mutex::new(OffsetHeapInner {
                allocator: offset_allocator::Allocator::new(info.byte_size),
                records: Pool::new(info.max_allocations as usize),
                bytes_in_use: 0,
            }),
        }
    }

    fn out_of_memory(&self, requested: u64, inner: &OffsetHeapInner) -> GPUError {
        GPUError::OutOfMemory {
            heap: self.debug_name.clone(),
            requested,
            free: inner.allocator.storage_report().total_free_space as u64,
        }
    }
}

impl MemoryHeap for OffsetHeap {
    fn id(&self) -> u64 {
        self.id
    }

    fn debug_name(&self) -> &str {
        &self.debug_name
    }

    fn request_allocation(&self, byte_size: u64) -> Result<AllocationToken> {
        let mut inner = self.inner.lock();
        let Ok(size) = u32::try_from(byte_size.max(1)) else {
            return Err(self.out_of_memory(byte_size, &inner));
        };
        let Some(block) = inner.allocator.allocate(size) else {
            return Err(self.out_of_memory(byte_size, &inner));
        };
        let record = inner.records.insert(HeapAllocation {
            block: Some(block),
            size: byte_size,
        });
        let Some(handle) = record else {
            inner.allocator.free(block);
            return Err(GPUError::SlotError {
                heap: self.debug_name.clone(),
            });
        };
        inner.bytes_in_use += byte_size;
        log::debug!(
            "heap '{}' allocated {} bytes at offset {}",
            self.debug_name,
            byte_size,
            block.offset
        );
        Ok(AllocationToken {
            heap_id: self.id,
            handle,
            offset: block.offset as u64,
            size: byte_size,
        })
    }

    fn release(&self, token: AllocationToken) {
        check_origin(self.id, &self.debug_name, &token);
        let mut inner = self.inner.lock();
        let Some(record) = inner.records.release(token.handle) else {
            panic!(
                "allocation at offset {} released twice to heap '{}'",
                token.offset, self.debug_name
            );
        };
        if let Some(block) = record.block {
            inner.allocator.free(block);
        }
        inner.bytes_in_use -= record.size;
    }

    fn stats(&self) -> HeapStats {
        let inner = self.inner.lock();
        HeapStats {
            allocation_count: inner.records.len(),
            bytes_in_use: inner.bytes_in_use,
            capacity: self.capacity as u64,
        }
    }
}

struct DirectHeapInner {
    records: Pool<HeapAllocation>,
    bytes_in_use: u64,
}

/// Heap that gives every resource a dedicated allocation, bounded only by a
/// byte budget.
pub struct DirectHeap {
    id: u64,
    debug_name: String,
    budget: u64,
    inner: Mutex<DirectHeapInner>,
}

impl DirectHeap {
    pub fn new(info: &HeapInfo) -> Self {
        let id = next_heap_id();
        log::debug!("creating direct heap '{}' ({})", info.debug_name, id);
        Self {
            id,
            debug_name: info.debug_name.to_string(),
            budget: info.byte_size as u64,
            inner: Mutex::new(DirectHeapInner {
                records: Pool::new(info.max_allocations as usize),
                bytes_in_use: 0,
            }),
        }
    }
}

impl MemoryHeap for DirectHeap {
    fn id(&self) -> u64 {
        self.id
    }

    fn debug_name(&self) -> &str {
        &self.debug_name
    }

    fn request_allocation(&self, byte_size: u64) -> Result<AllocationToken> {
        let mut inner = self.inner.lock();
        let free = self.budget - inner.bytes_in_use;
        if byte_size > free {
            return Err(GPUError::OutOfMemory {
                heap: self.debug_name.clone(),
                requested: byte_size,
                free,
            });
        }
        let handle = inner
            .records
            .insert(HeapAllocation {
                block: None,
                size: byte_size,
            })
            .ok_or_else(|| GPUError::SlotError {
                heap: self.debug_name.clone(),
            })?;
        inner.bytes_in_use += byte_size;
        Ok(AllocationToken {
            heap_id: self.id,
            handle,
            offset: 0,
            size: byte_size,
        })
    }

    fn release(&self, token: AllocationToken) {
        check_origin(self.id, &self.debug_name, &token);
        let mut inner = self.inner.lock();
        let Some(record) = inner.records.release(token.handle) else {
            panic!("allocation released twice to heap '{}'", self.debug_name);
        };
        inner.bytes_in_use -= record.size;
    }

    fn stats(&self) -> HeapStats {
        let inner = self.inner.lock();
        HeapStats {
            allocation_count: inner.records.len(),
            bytes_in_use: inner.bytes_in_use,
            capacity: self.budget,
        }
    }
}
