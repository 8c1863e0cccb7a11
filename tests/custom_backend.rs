mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hikari::gpu::{
    Backend, BufferUsage, Context, ContextInfo, CubeFace, HeapInfo, ImageInfo, ImageParams,
    ImageTarget, ImageType, LayerRange, MemoryHeap, NativeHandle, OffsetHeap, ReadImageRegion,
    Rect2D, RegionKey, SamplerInfo, SoftwareBackend, WriteImageRegion,
};

/// Forwards to a [`SoftwareBackend`] while counting cube face transfers.
struct FaceCountingBackend {
    inner: SoftwareBackend,
    cube_allocations: Arc<AtomicUsize>,
    face_transfers: Arc<AtomicUsize>,
}

impl FaceCountingBackend {
    fn count_face(&self, region: &RegionKey) {
        if let ImageTarget::CubeFace(face) = region.target {
            assert_eq!(CubeFace::from_layer(face.layer()), Some(face));
            self.face_transfers.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Backend for FaceCountingBackend {
    fn name(&self) -> &str {
        "face_counting"
    }

    fn allocate_image(&mut self, params: &ImageParams) -> NativeHandle {
        if params.ty == ImageType::Cube {
            self.cube_allocations.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.allocate_image(params)
    }

    fn deallocate_image(&mut self, image: NativeHandle) {
        self.inner.deallocate_image(image)
    }

    fn read_image_region(&mut self, image: NativeHandle, region: &RegionKey, target: &mut [u8]) {
        self.count_face(region);
        self.inner.read_image_region(image, region, target)
    }

    fn write_image_region(&mut self, image: NativeHandle, region: &RegionKey, source: &[u8]) {
        self.count_face(region);
        self.inner.write_image_region(image, region, source)
    }

    fn allocate_buffer(&mut self, byte_size: u64, usage: BufferUsage) -> NativeHandle {
        self.inner.allocate_buffer(byte_size, usage)
    }

    fn deallocate_buffer(&mut self, buffer: NativeHandle) {
        self.inner.deallocate_buffer(buffer)
    }

    fn read_buffer(&mut self, buffer: NativeHandle, offset: u64, target: &mut [u8]) {
        self.inner.read_buffer(buffer, offset, target)
    }

    fn write_buffer(&mut self, buffer: NativeHandle, offset: u64, source: &[u8]) {
        self.inner.write_buffer(buffer, offset, source)
    }

    fn allocate_sampler(&mut self, info: &SamplerInfo) -> NativeHandle {
        self.inner.allocate_sampler(info)
    }

    fn deallocate_sampler(&mut self, sampler: NativeHandle) {
        self.inner.deallocate_sampler(sampler)
    }
}

#[test]
fn backends_outside_the_crate_receive_cube_transfers() {
    common::init_logging();
    let cube_allocations = Arc::new(AtomicUsize::new(0));
    let face_transfers = Arc::new(AtomicUsize::new(0));
    let ctx = Context::new(
        FaceCountingBackend {
            inner: SoftwareBackend::new(),
            cube_allocations: cube_allocations.clone(),
            face_transfers: face_transfers.clone(),
        },
        &ContextInfo {
            debug_name: "custom",
        },
    );
    let heap: Arc<dyn MemoryHeap> = Arc::new(OffsetHeap::new(&HeapInfo::default()));

    let image = ctx
        .make_image(
            heap.clone(),
            &ImageInfo {
                debug_name: "env",
                ty: ImageType::Cube,
                dim: [2, 2, 1],
                ..Default::default()
            },
        )
        .unwrap();
    ctx.flush();
    assert_eq!(cube_allocations.load(Ordering::SeqCst), 1);

    let rect = Rect2D {
        x: 0,
        y: 0,
        w: 2,
        h: 2,
    };
    let source = common::row_pattern(2, 2);
    let mut target = vec![0; source.len()];
    {
        let mut lock = ctx.lock();
        image.write_data_regions_on_queue(
            &mut lock,
            &[WriteImageRegion {
                target_layer_range: LayerRange::layer(5, 0),
                rect: Some(rect),
                source_data: &source,
            }],
        );
        image.read_data_regions_on_queue(
            &mut lock,
            &mut [ReadImageRegion {
                source_layer_range: LayerRange::layer(5, 0),
                rect: Some(rect),
                target_data: &mut target,
            }],
        );
    }
    assert_eq!(target, source);
    assert_eq!(face_transfers.load(Ordering::SeqCst), 2);

    // The crate root re-exports the same types.
    let _: hikari::Rect2D = rect;
    let _: hikari::CubeFace = CubeFace::NegativeZ;

    image.release();
    ctx.flush();
    assert_eq!(heap.stats().bytes_in_use, 0);
}
