use std::collections::HashSet;
use std::sync::Arc;

use bitflags::bitflags;
#[cfg(feature = "hikari-serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{GPUError, Result};

bitflags! {
    /// Pipeline stages that may access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
    pub struct ShaderStage: u32 {
        const VERTEX = 0x01;
        const TESSELLATION_CONTROL = 0x02;
        const TESSELLATION_EVALUATION = 0x04;
        const GEOMETRY = 0x08;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = 0x1f;
        const ALL = 0x3f;
    }
}

impl Default for ShaderStage {
    fn default() -> Self {
        ShaderStage::ALL
    }
}

/// Type of resource a binding slot accepts.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum BindingKind {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl BindingKind {
    pub fn takes_buffer(&self) -> bool {
        matches!(
            self,
            BindingKind::UniformTexelBuffer
                | BindingKind::StorageTexelBuffer
                | BindingKind::UniformBuffer
                | BindingKind::StorageBuffer
                | BindingKind::UniformBufferDynamic
                | BindingKind::StorageBufferDynamic
        )
    }

    pub fn takes_image(&self) -> bool {
        matches!(
            self,
            BindingKind::SampledImage | BindingKind::StorageImage | BindingKind::InputAttachment
        )
    }
}

fn one() -> u32 {
    1
}

/// A typed location in a [`ResourceSetLayout`].
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub struct BindingSlot {
    /// Matches the binding number used by shader stages.
    pub binding: u32,
    pub kind: BindingKind,
    /// Number of elements, accessed in shaders as an array.
    #[cfg_attr(feature = "hikari-serde", serde(default = "one"))]
    pub array_count: u32,
    #[cfg_attr(feature = "hikari-serde", serde(default))]
    pub stage_mask: ShaderStage,
}

impl BindingSlot {
    pub fn new(binding: u32, kind: BindingKind) -> Self {
        Self {
            binding,
            kind,
            array_count: one(),
            stage_mask: ShaderStage::ALL,
        }
    }

    pub fn with_array_count(mut self, array_count: u32) -> Self {
        self.array_count = array_count;
        self
    }

    pub fn with_stages(mut self, stage_mask: ShaderStage) -> Self {
        self.stage_mask = stage_mask;
        self
    }
}

/// Most layouts have only a handful of slots.
pub const INLINED_BINDING_SLOT_COUNT: usize = 8;

/// Ordered, immutable binding slots shared by a family of pipelines.
///
/// Two layouts are compatible when their slot sequences are identical, no
/// matter which instance a pipeline or resource set was built against.
#[derive(Debug)]
pub struct ResourceSetLayout {
    debug_name: String,
    binding_slots: SmallVec<[BindingSlot; INLINED_BINDING_SLOT_COUNT]>,
}

impl ResourceSetLayout {
    pub fn new(debug_name: &str, binding_slots: &[BindingSlot]) -> Result<Arc<Self>> {
        let mut seen = HashSet::with_capacity(binding_slots.len());
        for slot in binding_slots {
            if !seen.insert(slot.binding) {
                return Err(GPUError::DuplicateBinding {
                    layout: debug_name.to_string(),
                    binding: slot.binding,
                });
            }
            if slot.array_count == 0 {
                return Err(GPUError::ZeroArrayCount {
                    layout: debug_name.to_string(),
                    binding: slot.binding,
                });
            }
        }

        log::debug!(
            "resource set layout '{}' with {} slots",
            debug_name,
            binding_slots.len()
        );
        Ok(Arc::new(Self {
            debug_name: debug_name.to_string(),
            binding_slots: SmallVec::from_slice(binding_slots),
        }))
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn binding_slots(&self) -> &[BindingSlot] {
        &self.binding_slots
    }

    pub fn is_compatible_with(&self, other: &ResourceSetLayout) -> bool {
        self.binding_slots == other.binding_slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_bindings_are_rejected() {
        let err = ResourceSetLayout::new(
            "dup",
            &[
                BindingSlot::new(0, BindingKind::UniformBuffer),
                BindingSlot::new(0, BindingKind::Sampler),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, GPUError::DuplicateBinding { binding: 0, .. }));
    }

    #[test]
    fn zero_width_arrays_are_rejected() {
        let err = ResourceSetLayout::new(
            "zero",
            &[BindingSlot::new(3, BindingKind::SampledImage).with_array_count(0)],
        )
        .unwrap_err();
        assert!(matches!(err, GPUError::ZeroArrayCount { binding: 3, .. }));
    }

    #[test]
    fn compatibility_ignores_names_but_not_stages() {
        let slots = [
            BindingSlot::new(0, BindingKind::UniformBuffer).with_stages(ShaderStage::VERTEX),
            BindingSlot::new(1, BindingKind::CombinedImageSampler),
        ];
        let a = ResourceSetLayout::new("a", &slots).unwrap();
        let b = ResourceSetLayout::new("b", &slots).unwrap();
        assert!(a.is_compatible_with(&b));

        let mut changed = slots;
        changed[0].stage_mask = ShaderStage::FRAGMENT;
        let c = ResourceSetLayout::new("c", &changed).unwrap();
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn slot_kinds_classify_payloads() {
        assert!(BindingKind::StorageBufferDynamic.takes_buffer());
        assert!(BindingKind::InputAttachment.takes_image());
        assert!(!BindingKind::CombinedImageSampler.takes_image());
        assert!(!BindingKind::Sampler.takes_buffer());
    }
}
