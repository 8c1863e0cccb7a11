use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    Backend, BufferUsage, ImageParams, ImageTarget, ImageType, NativeHandle, RegionKey,
    SamplerInfo,
};

/// A native call observed by [`SoftwareBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    AllocateImage(NativeHandle),
    DeallocateImage(NativeHandle),
    ReadImage(NativeHandle, RegionKey),
    WriteImage(NativeHandle, RegionKey),
    AllocateBuffer(NativeHandle),
    DeallocateBuffer(NativeHandle),
    ReadBuffer(NativeHandle),
    WriteBuffer(NativeHandle),
    AllocateSampler(NativeHandle),
    DeallocateSampler(NativeHandle),
}

/// Shared record of the native calls a [`SoftwareBackend`] executed.
pub type EventLog = Arc<Mutex<Vec<BackendEvent>>>;

struct SoftImage {
    params: ImageParams,
    /// Indexed by `surface * mip_levels + mip`.
    surfaces: Vec<Vec<u8>>,
}

impl SoftImage {
    fn new(params: &ImageParams) -> Self {
        let surface_count = match params.ty {
            ImageType::Image2D => 1,
            ImageType::Cube => 6,
            ImageType::Image2DArray => params.layers,
            ImageType::Image3D => params.dim[2],
        };
        let mut surfaces = Vec::with_capacity((surface_count * params.mip_levels) as usize);
        for _ in 0..surface_count {
            for mip in 0..params.mip_levels {
                let extent = params.mip_extent(mip);
                let size = params.format.data_size(extent.width, extent.height);
                surfaces.push(vec![0; size as usize]);
            }
        }
        Self {
            params: *params,
            surfaces,
        }
    }

    /// Returns the surface bytes, its row pitch and the texel size.
    fn surface_mut(&mut self, region: &RegionKey) -> (&mut [u8], usize, usize) {
        let surface = match region.target {
            ImageTarget::Surface2D => 0,
            ImageTarget::CubeFace(face) => face.layer(),
        };
        let Some(bpp) = self.params.format.bytes_per_pixel() else {
            panic!("software backend cannot address {:?} texels", self.params.format);
        };
        let width = self.params.mip_extent(region.mip_level).width as usize;
        let index = (surface * self.params.mip_levels + region.mip_level) as usize;
        (
            self.surfaces[index].as_mut_slice(),
            width * bpp as usize,
            bpp as usize,
        )
    }
}

/// Host-memory backend for headless use and tests.
///
/// Images are stored per surface and mip level in the order rows arrive,
/// which is bottom row first.
pub struct SoftwareBackend {
    next_handle: u64,
    images: HashMap<NativeHandle, SoftImage>,
    buffers: HashMap<NativeHandle, Vec<u8>>,
    samplers: HashMap<NativeHandle, SamplerInfo>,
    events: EventLog,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::with_event_log(EventLog::default())
    }

    /// Records every native call into `events`.
    pub fn with_event_log(events: EventLog) -> Self {
        Self {
            next_handle: 1,
            images: HashMap::new(),
            buffers: HashMap::new(),
            samplers: HashMap::new(),
            events,
        }
    }

    pub fn event_log(&self) -> EventLog {
        self.events.clone()
    }

    fn next(&mut self) -> NativeHandle {
        let handle = NativeHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn record(&self, event: BackendEvent) {
        self.events.lock().push(event);
    }

    fn image_mut(&mut self, image: NativeHandle) -> &mut SoftImage {
        match self.images.get_mut(&image) {
            Some(img) => img,
            None => panic!("unknown image {:?}", image),
        }
    }

    fn buffer_mut(&mut self, buffer: NativeHandle, offset: u64, len: usize) -> &mut [u8] {
        let Some(data) = self.buffers.get_mut(&buffer) else {
            panic!("unknown buffer {:?}", buffer);
        };
        let start = offset as usize;
        &mut data[start..start + len]
    }
}

impl Backend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn allocate_image(&mut self, params: &ImageParams) -> NativeHandle {
        let handle = self.next();
        self.images.insert(handle, SoftImage::new(params));
        self.record(BackendEvent::AllocateImage(handle));
        handle
    }

    fn deallocate_image(&mut self, image: NativeHandle) {
        if self.images.remove(&image).is_none() {
            panic!("double free of image {:?}", image);
        }
        self.record(BackendEvent::DeallocateImage(image));
    }

    fn read_image_region(&mut self, image: NativeHandle, region: &RegionKey, target: &mut [u8]) {
        let (surface, pitch, bpp) = self.image_mut(image).surface_mut(region);
        let row_bytes = region.rect.w as usize * bpp;
        for row in 0..region.rect.h as usize {
            let src = (region.rect.y as usize + row) * pitch + region.rect.x as usize * bpp;
            target[row * row_bytes..(row + 1) * row_bytes]
                .copy_from_slice(&surface[src..src + row_bytes]);
        }
        self.record(BackendEvent::ReadImage(image, *region));
    }

    fn write_image_region(&mut self, image: NativeHandle, region: &RegionKey, source: &[u8]) {
        let (surface, pitch, bpp) = self.image_mut(image).surface_mut(region);
        let row_bytes = region.rect.w as usize * bpp;
        for row in 0..region.rect.h as usize {
            let dst = (region.rect.y as usize + row) * pitch + region.rect.x as usize * bpp;
            surface[dst..dst + row_bytes]
                .copy_from_slice(&source[row * row_bytes..(row + 1) * row_bytes]);
        }
        self.record(BackendEvent::WriteImage(image, *region));
    }

    fn allocate_buffer(&mut self, byte_size: u64, _usage: BufferUsage) -> NativeHandle {
        let handle = self.next();
        self.buffers.insert(handle, vec![0; byte_size as usize]);
        self.record(BackendEvent::AllocateBuffer(handle));
        handle
    }

    fn deallocate_buffer(&mut self, buffer: NativeHandle) {
        if self.buffers.remove(&buffer).is_none() {
            panic!("double free of buffer {:?}", buffer);
        }
        self.record(BackendEvent::DeallocateBuffer(buffer));
    }

    fn read_buffer(&mut self, buffer: NativeHandle, offset: u64, target: &mut [u8]) {
        let data = self.buffer_mut(buffer, offset, target.len());
        target.copy_from_slice(data);
        self.record(BackendEvent::ReadBuffer(buffer));
    }

    fn write_buffer(&mut self, buffer: NativeHandle, offset: u64, source: &[u8]) {
        self.buffer_mut(buffer, offset, source.len())
            .copy_from_slice(source);
        self.record(BackendEvent::WriteBuffer(buffer));
    }

    fn allocate_sampler(&mut self, info: &SamplerInfo) -> NativeHandle {
        let handle = self.next();
        self.samplers.insert(handle, *info);
        self.record(BackendEvent::AllocateSampler(handle));
        handle
    }

    fn deallocate_sampler(&mut self, sampler: NativeHandle) {
        if self.samplers.remove(&sampler).is_none() {
            panic!("double free of sampler {:?}", sampler);
        }
        self.record(BackendEvent::DeallocateSampler(sampler));
    }
}
