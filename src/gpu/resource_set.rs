use std::sync::Arc;

use super::{
    BindingKind, BindingSlot, Buffer, GPUError, ImageLayout, ImageView, ResourceSetLayout, Result,
    Sampler,
};

/// Buffer length meaning "from the offset to the end of the buffer".
pub const WHOLE_SIZE: u64 = u64::MAX;

/// A resource bound to a single slot element. Each variant carries only the
/// fields its slot kinds use.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Uniform, storage, texel and dynamic buffer slots.
    Buffer {
        buffer: Arc<Buffer>,
        offset: u64,
        length: u64,
    },
    /// Sampled image, storage image and input attachment slots.
    Image {
        view: Arc<ImageView>,
        layout: ImageLayout,
    },
    Sampler(Arc<Sampler>),
    CombinedImageSampler {
        view: Arc<ImageView>,
        layout: ImageLayout,
        sampler: Arc<Sampler>,
    },
}

impl Binding {
    pub fn buffer(buffer: Arc<Buffer>) -> Self {
        Binding::Buffer {
            buffer,
            offset: 0,
            length: WHOLE_SIZE,
        }
    }

    pub fn buffer_range(buffer: Arc<Buffer>, offset: u64, length: u64) -> Self {
        Binding::Buffer {
            buffer,
            offset,
            length,
        }
    }

    pub fn image(view: Arc<ImageView>, layout: ImageLayout) -> Self {
        Binding::Image { view, layout }
    }

    pub fn sampler(sampler: Arc<Sampler>) -> Self {
        Binding::Sampler(sampler)
    }

    pub fn combined(view: Arc<ImageView>, layout: ImageLayout, sampler: Arc<Sampler>) -> Self {
        Binding::CombinedImageSampler {
            view,
            layout,
            sampler,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Binding::Buffer { .. } => "buffer",
            Binding::Image { .. } => "image",
            Binding::Sampler(_) => "sampler",
            Binding::CombinedImageSampler { .. } => "combined image sampler",
        }
    }

    pub fn matches(&self, kind: BindingKind) -> bool {
        match self {
            Binding::Buffer { .. } => kind.takes_buffer(),
            Binding::Image { .. } => kind.takes_image(),
            Binding::Sampler(_) => kind == BindingKind::Sampler,
            Binding::CombinedImageSampler { .. } => kind == BindingKind::CombinedImageSampler,
        }
    }

    fn validate(&self, slot: &BindingSlot) -> Result<()> {
        if !self.matches(slot.kind) {
            return Err(GPUError::BindingKindMismatch {
                binding: slot.binding,
                expected: slot.kind,
                found: self.variant_name(),
            });
        }

        match self {
            Binding::Buffer {
                buffer,
                offset,
                length,
            } => {
                let size = buffer.byte_size();
                let end = if *length == WHOLE_SIZE {
                    Some(size)
                } else {
                    offset.checked_add(*length)
                };
                match end {
                    Some(end) if *offset <= end && end <= size => Ok(()),
                    _ => Err(GPUError::BufferRangeOutOfBounds {
                        binding: slot.binding,
                        offset: *offset,
                        end: end.unwrap_or(u64::MAX),
                        size,
                    }),
                }
            }
            Binding::Image { layout, .. }
                if slot.kind == BindingKind::StorageImage && *layout != ImageLayout::General =>
            {
                Err(GPUError::StorageImageLayout {
                    binding: slot.binding,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Either one binding or the elements of an array slot.
#[derive(Debug, Clone)]
pub enum BindingNode {
    Single(Binding),
    Array(Vec<Binding>),
}

impl From<Binding> for BindingNode {
    fn from(binding: Binding) -> Self {
        BindingNode::Single(binding)
    }
}

impl From<Vec<Binding>> for BindingNode {
    fn from(elements: Vec<Binding>) -> Self {
        BindingNode::Array(elements)
    }
}

impl BindingNode {
    pub fn elements(&self) -> &[Binding] {
        match self {
            BindingNode::Single(binding) => std::slice::from_ref(binding),
            BindingNode::Array(elements) => elements,
        }
    }

    fn validate(&self, slot: &BindingSlot) -> Result<()> {
        let elements = self.elements();
        let shape_ok = match self {
            BindingNode::Single(_) => slot.array_count == 1,
            BindingNode::Array(elements) => elements.len() == slot.array_count as usize,
        };
        if !shape_ok {
            return Err(GPUError::ArrayLengthMismatch {
                binding: slot.binding,
                expected: slot.array_count,
                actual: elements.len(),
            });
        }
        elements.iter().try_for_each(|b| b.validate(slot))
    }
}

/// Resources assigned to every slot of a [`ResourceSetLayout`].
///
/// Immutable once built. A set may be bound to any pipeline whose layout is
/// compatible with the one it was built against.
#[derive(Debug)]
pub struct ResourceSet {
    debug_name: String,
    layout: Arc<ResourceSetLayout>,
    bindings: Vec<BindingNode>,
}

impl ResourceSet {
    /// Builds a set with one node per layout slot, in slot order.
    pub fn new(
        debug_name: &str,
        layout: Arc<ResourceSetLayout>,
        bindings: Vec<BindingNode>,
    ) -> Result<Self> {
        let slots = layout.binding_slots();
        if slots.len() != bindings.len() {
            return Err(GPUError::BindingCountMismatch {
                expected: slots.len(),
                actual: bindings.len(),
            });
        }
        for (slot, node) in slots.iter().zip(&bindings) {
            node.validate(slot)?;
        }

        log::debug!(
            "resource set '{}' built against layout '{}'",
            debug_name,
            layout.debug_name()
        );
        Ok(Self {
            debug_name: debug_name.to_string(),
            layout,
            bindings,
        })
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn layout(&self) -> &Arc<ResourceSetLayout> {
        &self.layout
    }

    pub fn bindings(&self) -> &[BindingNode] {
        &self.bindings
    }

    /// Pairs each slot with its bound node.
    pub fn iter(&self) -> impl Iterator<Item = (&BindingSlot, &BindingNode)> {
        self.layout.binding_slots().iter().zip(self.bindings.iter())
    }

    pub fn is_compatible_with(&self, layout: &ResourceSetLayout) -> bool {
        self.layout.is_compatible_with(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BufferInfo, Context, HeapInfo, ImageInfo, MemoryHeap, OffsetHeap};

    struct Fixture {
        ctx: Arc<Context>,
        heap: Arc<dyn MemoryHeap>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ctx: Context::headless(&Default::default()),
                heap: Arc::new(OffsetHeap::new(&HeapInfo {
                    debug_name: "set_heap",
                    byte_size: 1 << 20,
                    ..Default::default()
                })),
            }
        }

        fn buffer(&self, byte_size: u64) -> Arc<Buffer> {
            self.ctx
                .make_buffer(
                    self.heap.clone(),
                    &BufferInfo {
                        debug_name: "ubo",
                        byte_size,
                        ..Default::default()
                    },
                )
                .unwrap()
        }

        fn view(&self) -> Arc<ImageView> {
            let image = self
                .ctx
                .make_image(
                    self.heap.clone(),
                    &ImageInfo {
                        debug_name: "albedo",
                        dim: [8, 8, 1],
                        ..Default::default()
                    },
                )
                .unwrap();
            self.ctx.flush();
            image.create_default_view()
        }

        fn sampler(&self) -> Arc<Sampler> {
            self.ctx.make_sampler("linear", &Default::default())
        }
    }

    fn layout(slots: &[BindingSlot]) -> Arc<ResourceSetLayout> {
        ResourceSetLayout::new("test_layout", slots).unwrap()
    }

    #[test]
    fn binding_count_must_match_slots() {
        let f = Fixture::new();
        let layout = layout(&[
            BindingSlot::new(0, BindingKind::UniformBuffer),
            BindingSlot::new(1, BindingKind::Sampler),
        ]);
        let err = ResourceSet::new("short", layout, vec![Binding::buffer(f.buffer(64)).into()])
            .unwrap_err();
        assert!(matches!(
            err,
            GPUError::BindingCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn payload_must_match_slot_kind() {
        let f = Fixture::new();
        let layout = layout(&[BindingSlot::new(4, BindingKind::Sampler)]);
        let err = ResourceSet::new("wrong", layout, vec![Binding::buffer(f.buffer(64)).into()])
            .unwrap_err();
        assert!(matches!(
            err,
            GPUError::BindingKindMismatch {
                binding: 4,
                expected: BindingKind::Sampler,
                found: "buffer"
            }
        ));
    }

    #[test]
    fn buffer_ranges_are_bounds_checked() {
        let f = Fixture::new();
        let layout = layout(&[BindingSlot::new(0, BindingKind::StorageBuffer)]);
        let buffer = f.buffer(256);

        assert!(ResourceSet::new(
            "whole",
            layout.clone(),
            vec![Binding::buffer(buffer.clone()).into()]
        )
        .is_ok());
        assert!(ResourceSet::new(
            "tail",
            layout.clone(),
            vec![Binding::buffer_range(buffer.clone(), 128, 128).into()]
        )
        .is_ok());

        let err = ResourceSet::new(
            "overrun",
            layout,
            vec![Binding::buffer_range(buffer, 200, 100).into()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GPUError::BufferRangeOutOfBounds {
                offset: 200,
                end: 300,
                size: 256,
                ..
            }
        ));
    }

    #[test]
    fn arrays_must_fill_every_element() {
        let f = Fixture::new();
        let layout = layout(&[
            BindingSlot::new(0, BindingKind::CombinedImageSampler).with_array_count(2)
        ]);
        let view = f.view();
        let sampler = f.sampler();
        let element = Binding::combined(view, ImageLayout::ShaderReadOnlyOptimal, sampler);

        let err = ResourceSet::new("single", layout.clone(), vec![element.clone().into()])
            .unwrap_err();
        assert!(matches!(
            err,
            GPUError::ArrayLengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));

        let set = ResourceSet::new(
            "full",
            layout,
            vec![vec![element.clone(), element].into()],
        )
        .unwrap();
        assert_eq!(set.bindings()[0].elements().len(), 2);
    }

    #[test]
    fn storage_images_require_general_layout() {
        let f = Fixture::new();
        let layout = layout(&[BindingSlot::new(0, BindingKind::StorageImage)]);
        let view = f.view();

        let err = ResourceSet::new(
            "readonly",
            layout.clone(),
            vec![Binding::image(view.clone(), ImageLayout::ShaderReadOnlyOptimal).into()],
        )
        .unwrap_err();
        assert!(matches!(err, GPUError::StorageImageLayout { binding: 0 }));

        assert!(ResourceSet::new(
            "general",
            layout,
            vec![Binding::image(view, ImageLayout::General).into()]
        )
        .is_ok());
    }

    #[test]
    fn sets_bind_to_equivalent_layouts() {
        let f = Fixture::new();
        let slots = [BindingSlot::new(0, BindingKind::UniformBuffer)];
        let set = ResourceSet::new(
            "frame",
            layout(&slots),
            vec![Binding::buffer(f.buffer(64)).into()],
        )
        .unwrap();

        let twin = ResourceSetLayout::new("twin", &slots).unwrap();
        assert!(set.is_compatible_with(&twin));

        let wider = ResourceSetLayout::new(
            "wider",
            &[BindingSlot::new(0, BindingKind::UniformBuffer).with_array_count(2)],
        )
        .unwrap();
        assert!(!set.is_compatible_with(&wider));
        assert_eq!(set.iter().count(), 1);
    }
}
