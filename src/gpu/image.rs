use std::fmt;
use std::sync::Arc;

use super::lifetime_queue::LifetimeCell;
use super::{
    AllocationToken, Context, ContextLock, CubeFace, Format, ImageInfo, ImageParams, ImageTarget,
    ImageType, LayerRange, MemoryHeap, NativeHandle, ObjectLifetimeQueue, ObjectState,
    QueuedObject, Rect2D, RegionKey, Result,
};

/// Pixel data to extract from one layer of an image.
///
/// `rect` defaults to the whole extent of the selected mip level. Rows are
/// written to `target_data` top row first, tightly packed.
pub struct ReadImageRegion<'a> {
    pub source_layer_range: LayerRange,
    pub rect: Option<Rect2D>,
    pub target_data: &'a mut [u8],
}

/// Pixel data to upload into one layer of an image, top row first.
pub struct WriteImageRegion<'a> {
    pub target_layer_range: LayerRange,
    pub rect: Option<Rect2D>,
    pub source_data: &'a [u8],
}

/// A typed, multi-dimensional pixel resource backed by a [`MemoryHeap`].
pub struct Image {
    debug_name: String,
    params: ImageParams,
    allocation_size: u64,
    allocation: AllocationToken,
    heap: Arc<dyn MemoryHeap>,
    queue: Arc<ObjectLifetimeQueue>,
    lifetime: LifetimeCell,
}

impl Image {
    /// Storage footprint of an image with `params`.
    ///
    /// The per-mip footprint is the base level's; cubes count six faces,
    /// arrays their layers and 3D images their depth.
    pub fn compute_allocation_size(params: &ImageParams) -> u64 {
        let base = params.format.data_size(params.dim[0], params.dim[1]);
        let mips = params.mip_levels as u64;
        match params.ty {
            ImageType::Image2D => base * mips,
            ImageType::Cube => base * mips * 6,
            ImageType::Image2DArray => base * mips * params.layers as u64,
            ImageType::Image3D => base * params.dim[2] as u64 * mips,
        }
    }

    /// Creates the logical image and requests its storage from `heap`.
    /// Nothing is allocated on the device until [`prepare_allocation`](Self::prepare_allocation)
    /// has been called and the queue drained.
    pub fn new(ctx: &Context, heap: Arc<dyn MemoryHeap>, info: &ImageInfo) -> Result<Arc<Self>> {
        let params = info.params();
        assert!(
            params.dim.iter().all(|d| *d > 0),
            "image '{}' has a zero dimension: {:?}",
            info.debug_name,
            params.dim
        );
        assert!(params.mip_levels > 0, "image '{}' has no mip levels", info.debug_name);
        assert!(params.layers > 0, "image '{}' has no layers", info.debug_name);

        let allocation_size = Self::compute_allocation_size(&params);
        let allocation = heap.request_allocation(allocation_size)?;
        log::debug!(
            "image '{}' {:?} {:?} {:?} needs {} bytes",
            info.debug_name,
            params.ty,
            params.format,
            params.dim,
            allocation_size
        );

        Ok(Arc::new(Self {
            debug_name: info.debug_name.to_string(),
            params,
            allocation_size,
            allocation,
            heap,
            queue: ctx.queue().clone(),
            lifetime: LifetimeCell::new(),
        }))
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn params(&self) -> &ImageParams {
        &self.params
    }

    pub fn ty(&self) -> ImageType {
        self.params.ty
    }

    pub fn format(&self) -> Format {
        self.params.format
    }

    pub fn dim(&self) -> [u32; 3] {
        self.params.dim
    }

    pub fn mip_levels(&self) -> u32 {
        self.params.mip_levels
    }

    pub fn layers(&self) -> u32 {
        self.params.layers
    }

    pub fn allocation_size(&self) -> u64 {
        self.allocation_size
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

    pub fn entire_range(&self) -> LayerRange {
        self.params.entire_range()
    }

    /// Enqueues the device allocation.
    pub fn prepare_allocation(self: &Arc<Self>) {
        self.lifetime.begin_allocation(&self.debug_name);
        self.queue.enqueue_object_allocation(self.clone());
    }

    /// Returns the storage to the owning heap, then enqueues deallocation if
    /// the image was prepared. Must be called exactly once.
    pub fn release(self: &Arc<Self>) {
        let queued = self.lifetime.begin_release(&self.debug_name);
        self.heap.release_image(self);
        self.lifetime.finish_release(queued);
        if queued {
            self.queue.enqueue_object_deallocation(self.clone());
        }
    }

    pub fn create_default_view(self: &Arc<Self>) -> Arc<ImageView> {
        self.create_view(self.params.ty, self.params.format, self.entire_range())
    }

    /// Creates a view over `layer_range`. The image must be allocated and the
    /// range must lie inside its layers and mip levels.
    pub fn create_view(
        self: &Arc<Self>,
        ty: ImageType,
        format: Format,
        layer_range: LayerRange,
    ) -> Arc<ImageView> {
        assert_eq!(
            self.state(),
            ObjectState::Allocated,
            "view of image '{}' requested while not allocated",
            self.debug_name
        );
        let layer_extent = self.params.layer_extent();
        assert!(
            layer_range.layer_count > 0
                && layer_range.base_layer as u64 + layer_range.layer_count as u64
                    <= layer_extent as u64,
            "view layers {}..+{} outside the {} layers of image '{}'",
            layer_range.base_layer,
            layer_range.layer_count,
            layer_extent,
            self.debug_name
        );
        assert!(
            layer_range.mip_level < self.params.mip_levels,
            "view mip level {} outside the {} levels of image '{}'",
            layer_range.mip_level,
            self.params.mip_levels,
            self.debug_name
        );

        Arc::new(ImageView {
            image: self.clone(),
            ty,
            format,
            layer_range,
        })
    }

    fn allocated_native(&self) -> NativeHandle {
        let native = self.lifetime.native();
        assert!(
            !native.is_null(),
            "transfer on image '{}' before its allocation ran",
            self.debug_name
        );
        native
    }

    /// Validates a single-layer transfer range and resolves it to a surface.
    fn region_key(&self, range: &LayerRange, rect: Option<Rect2D>) -> RegionKey {
        assert_eq!(
            range.layer_count, 1,
            "image '{}': transfer regions must cover exactly one layer",
            self.debug_name
        );
        assert!(
            matches!(self.params.ty, ImageType::Image2D | ImageType::Cube),
            "image '{}': {:?} transfers are not supported",
            self.debug_name,
            self.params.ty
        );
        assert!(
            !self.params.format.is_compressed(),
            "image '{}': compressed format {:?} cannot be transferred",
            self.debug_name,
            self.params.format
        );
        assert!(
            range.mip_level < self.params.mip_levels,
            "image '{}': mip level {} out of range",
            self.debug_name,
            range.mip_level
        );

        let target = match self.params.ty {
            ImageType::Cube => match CubeFace::from_layer(range.base_layer) {
                Some(face) => ImageTarget::CubeFace(face),
                None => panic!(
                    "image '{}': cube layer {} out of range",
                    self.debug_name, range.base_layer
                ),
            },
            _ => {
                assert_eq!(
                    range.base_layer, 0,
                    "image '{}': layer {} out of range",
                    self.debug_name, range.base_layer
                );
                ImageTarget::Surface2D
            }
        };

        let extent = self.params.mip_extent(range.mip_level);
        let rect = rect.unwrap_or_else(|| Rect2D::from_extent(extent));
        assert!(
            rect.fits_in(extent),
            "image '{}': region {:?} exceeds mip {} extent {:?}",
            self.debug_name,
            rect,
            range.mip_level,
            extent
        );

        RegionKey {
            target,
            mip_level: range.mip_level,
            rect,
        }
    }

    fn region_layout(&self, key: &RegionKey) -> (usize, usize) {
        let row_stride = self.params.format.data_size(key.rect.w, 1) as usize;
        (row_stride, key.rect.h as usize)
    }

    /// Copies each region into caller memory, top row first. Requires the
    /// context lock.
    pub fn read_data_regions_on_queue(
        &self,
        lock: &mut ContextLock<'_>,
        regions: &mut [ReadImageRegion<'_>],
    ) {
        lock.check_owner(self.queue.context_id());
        let native = self.allocated_native();

        for region in regions.iter_mut() {
            let key = self.region_key(&region.source_layer_range, region.rect);
            let (row_stride, row_count) = self.region_layout(&key);
            let required = row_stride * row_count;
            assert!(
                region.target_data.len() >= required,
                "image '{}': read target holds {} bytes, region needs {}",
                self.debug_name,
                region.target_data.len(),
                required
            );
            log::trace!("read '{}' {:?}", self.debug_name, key);

            let data = &mut region.target_data[..required];
            lock.device().read_image_region(native, &key, data);
            flip_rows(data, row_stride, row_count);
        }
    }

    /// Uploads each region from caller memory, top row first. Requires the
    /// context lock.
    pub fn write_data_regions_on_queue(
        &self,
        lock: &mut ContextLock<'_>,
        regions: &[WriteImageRegion<'_>],
    ) {
        lock.check_owner(self.queue.context_id());
        let native = self.allocated_native();

        for region in regions {
            let key = self.region_key(&region.target_layer_range, region.rect);
            let (row_stride, row_count) = self.region_layout(&key);
            let required = row_stride * row_count;
            assert!(
                region.source_data.len() >= required,
                "image '{}': write source holds {} bytes, region needs {}",
                self.debug_name,
                region.source_data.len(),
                required
            );
            log::trace!("write '{}' {:?}", self.debug_name, key);

            let mut staging = region.source_data[..required].to_vec();
            flip_rows(&mut staging, row_stride, row_count);
            lock.device().write_image_region(native, &key, &staging);
        }
    }

    /// Queues an upload of `data` behind any pending work for this image.
    pub fn enqueue_write(
        self: &Arc<Self>,
        target_layer_range: LayerRange,
        rect: Option<Rect2D>,
        data: Vec<u8>,
    ) {
        let image = self.clone();
        self.queue.enqueue_task(move |lock| {
            image.write_data_regions_on_queue(
                lock,
                &[WriteImageRegion {
                    target_layer_range,
                    rect,
                    source_data: &data,
                }],
            );
        });
    }
}

impl QueuedObject for Image {
    fn debug_name(&self) -> &str {
        &self.debug_name
    }

    fn allocate_on_queue(&self, lock: &mut ContextLock<'_>) {
        lock.check_owner(self.queue.context_id());
        let params = self.params;
        let native = self
            .lifetime
            .allocate_with(|| lock.device().allocate_image(&params));
        log::debug!("allocated image '{}' as {:?}", self.debug_name, native);
    }

    fn deallocate_on_queue(&self, lock: &mut ContextLock<'_>) {
        lock.check_owner(self.queue.context_id());
        match self.lifetime.take_native() {
            Some(native) => {
                lock.device().deallocate_image(native);
                log::debug!("deallocated image '{}'", self.debug_name);
            }
            None => log::warn!("image '{}' already deallocated", self.debug_name),
        }
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if matches!(
            self.lifetime.state(),
            ObjectState::Allocating | ObjectState::Allocated
        ) {
            log::warn!("image '{}' dropped without being released", self.debug_name);
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("debug_name", &self.debug_name)
            .field("params", &self.params)
            .field("allocation_size", &self.allocation_size)
            .field("state", &self.state())
            .finish()
    }
}

/// A reinterpretation of a subrange of an [`Image`].
///
/// Views share ownership of their image; allocation state is only ever
/// changed through the image itself.
#[derive(Debug)]
pub struct ImageView {
    image: Arc<Image>,
    ty: ImageType,
    format: Format,
    layer_range: LayerRange,
}

impl ImageView {
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    pub fn ty(&self) -> ImageType {
        self.ty
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn layer_range(&self) -> LayerRange {
        self.layer_range
    }
}

/// Reverses the row order of `data` in place.
pub(crate) fn flip_rows(data: &mut [u8], row_stride: usize, row_count: usize) {
    for y in 0..row_count / 2 {
        let (head, tail) = data.split_at_mut((row_count - 1 - y) * row_stride);
        head[y * row_stride..(y + 1) * row_stride].swap_with_slice(&mut tail[..row_stride]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ty: ImageType, dim: [u32; 3], mip_levels: u32, layers: u32) -> ImageParams {
        ImageParams {
            ty,
            format: Format::RGBA8,
            dim,
            mip_levels,
            layers,
        }
    }

    #[test]
    fn allocation_size_follows_image_type() {
        let flat = params(ImageType::Image2D, [256, 256, 1], 1, 1);
        assert_eq!(Image::compute_allocation_size(&flat), 262_144);

        let cube = params(ImageType::Cube, [256, 256, 1], 1, 1);
        assert_eq!(Image::compute_allocation_size(&cube), 1_572_864);

        let array = params(ImageType::Image2DArray, [16, 16, 1], 2, 3);
        assert_eq!(Image::compute_allocation_size(&array), 16 * 16 * 4 * 2 * 3);

        let volume = params(ImageType::Image3D, [8, 8, 4], 3, 1);
        assert_eq!(Image::compute_allocation_size(&volume), 8 * 8 * 4 * 4 * 3);
    }

    #[test]
    fn flip_rows_swaps_outer_rows_inward() {
        let mut data = vec![0, 0, 1, 1, 2, 2];
        flip_rows(&mut data, 2, 3);
        assert_eq!(data, vec![2, 2, 1, 1, 0, 0]);

        let mut even = vec![0, 1, 2, 3];
        flip_rows(&mut even, 1, 4);
        assert_eq!(even, vec![3, 2, 1, 0]);
    }

    #[test]
    fn flip_rows_twice_is_identity() {
        let original: Vec<u8> = (0..40).collect();
        let mut data = original.clone();
        flip_rows(&mut data, 8, 5);
        assert_ne!(data, original);
        flip_rows(&mut data, 8, 5);
        assert_eq!(data, original);
    }
}
