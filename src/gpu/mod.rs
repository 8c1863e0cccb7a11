pub mod buffer;
#[cfg(feature = "hikari-serde")]
pub mod cfg;
pub mod context;
pub mod error;
pub mod image;
pub mod lifetime_queue;
pub mod memory;
pub mod pipeline_layout;
pub mod resource_set;
pub mod resource_set_layout;
pub mod sampler;
pub mod software;
pub mod structs;

pub use buffer::*;
pub use context::*;
pub use error::*;
pub use image::*;
pub use lifetime_queue::*;
pub use memory::*;
pub use pipeline_layout::*;
pub use resource_set::*;
pub use resource_set_layout::*;
pub use sampler::*;
pub use software::*;
pub use structs::*;

/// Opaque backend object name. Zero means "no object".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// The 2D surface of an image a transfer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    Surface2D,
    CubeFace(CubeFace),
}

/// Addresses one rectangle of one surface at one mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionKey {
    pub target: ImageTarget,
    pub mip_level: u32,
    pub rect: Rect2D,
}

/// Defines the interface that rendering backends must implement.
///
/// A backend wraps the native graphics API. Every method is invoked with the
/// owning [`Context`]'s lock held, so implementations may assume exclusive
/// access to the native device.
///
/// Allocation has no failure path at this layer: a backend that cannot
/// create a native object must panic.
///
/// Image rows are exchanged in storage order (bottom row first). [`Image`]
/// converts to and from the top-to-bottom order exposed to callers.
///
/// # Examples
/// ```ignore
/// use hikari::gpu::{Backend, Context, ContextInfo};
/// fn init<B: Backend + 'static>(backend: B) {
///     let ctx = Context::new(backend, &ContextInfo::default());
/// }
/// ```
pub trait Backend: Send {
    fn name(&self) -> &str;

    fn allocate_image(&mut self, params: &ImageParams) -> NativeHandle;
    fn deallocate_image(&mut self, image: NativeHandle);
    fn read_image_region(&mut self, image: NativeHandle, region: &RegionKey, target: &mut [u8]);
    fn write_image_region(&mut self, image: NativeHandle, region: &RegionKey, source: &[u8]);

    fn allocate_buffer(&mut self, byte_size: u64, usage: BufferUsage) -> NativeHandle;
    fn deallocate_buffer(&mut self, buffer: NativeHandle);
    fn read_buffer(&mut self, buffer: NativeHandle, offset: u64, target: &mut [u8]);
    fn write_buffer(&mut self, buffer: NativeHandle, offset: u64, source: &[u8]);

    fn allocate_sampler(&mut self, info: &SamplerInfo) -> NativeHandle;
    fn deallocate_sampler(&mut self, sampler: NativeHandle);
}
