use std::sync::Arc;

use super::{ResourceSet, ResourceSetLayout};

/// The resource set layouts a pipeline declares, indexed by set number.
#[derive(Debug, Clone)]
pub struct PipelineLayout {
    debug_name: String,
    set_layouts: Vec<Arc<ResourceSetLayout>>,
}

impl PipelineLayout {
    pub fn new(debug_name: &str, set_layouts: Vec<Arc<ResourceSetLayout>>) -> Self {
        Self {
            debug_name: debug_name.to_string(),
            set_layouts,
        }
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn set_layouts(&self) -> &[Arc<ResourceSetLayout>] {
        &self.set_layouts
    }

    pub fn set_layout(&self, set: u32) -> Option<&Arc<ResourceSetLayout>> {
        self.set_layouts.get(set as usize)
    }

    /// Whether `resource_set` may be bound at `set` of this pipeline.
    pub fn accepts(&self, set: u32, resource_set: &ResourceSet) -> bool {
        self.set_layout(set)
            .is_some_and(|layout| resource_set.is_compatible_with(layout))
    }

    pub fn is_compatible_with(&self, other: &PipelineLayout) -> bool {
        self.set_layouts.len() == other.set_layouts.len()
            && self
                .set_layouts
                .iter()
                .zip(&other.set_layouts)
                .all(|(a, b)| a.is_compatible_with(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BindingKind, BindingSlot, Context};

    #[test]
    fn accepts_sets_built_against_equivalent_layouts() {
        let ctx = Context::headless(&Default::default());
        let sampler = ctx.make_sampler("nearest", &Default::default());

        let slots = [BindingSlot::new(0, BindingKind::Sampler)];
        let set_layout = ResourceSetLayout::new("samplers", &slots).unwrap();
        let set = ResourceSet::new(
            "samplers",
            set_layout,
            vec![crate::gpu::Binding::sampler(sampler).into()],
        )
        .unwrap();

        let pipeline = PipelineLayout::new(
            "pipeline",
            vec![
                ResourceSetLayout::new("frame", &[BindingSlot::new(0, BindingKind::UniformBuffer)])
                    .unwrap(),
                ResourceSetLayout::new("samplers_again", &slots).unwrap(),
            ],
        );
        assert!(!pipeline.accepts(0, &set));
        assert!(pipeline.accepts(1, &set));
        assert!(!pipeline.accepts(2, &set));
    }

    #[test]
    fn pipeline_compatibility_is_per_set() {
        let a = ResourceSetLayout::new("a", &[BindingSlot::new(0, BindingKind::Sampler)]).unwrap();
        let b = ResourceSetLayout::new("b", &[BindingSlot::new(0, BindingKind::Sampler)]).unwrap();
        let c = ResourceSetLayout::new("c", &[BindingSlot::new(1, BindingKind::Sampler)]).unwrap();

        let first = PipelineLayout::new("first", vec![a.clone()]);
        assert!(first.is_compatible_with(&PipelineLayout::new("second", vec![b])));
        assert!(!first.is_compatible_with(&PipelineLayout::new("third", vec![c])));
        assert!(!first.is_compatible_with(&PipelineLayout::new("fourth", vec![a.clone(), a])));
    }
}
