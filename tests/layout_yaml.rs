#![cfg(feature = "hikari-serde")]

use hikari::gpu::cfg::{HeapCfg, ResourceSetLayoutCfg};
use hikari::gpu::{BindingKind, GPUError, MemoryHeap, OffsetHeap};

const LAYOUTS_YAML: &str = r#"
- debug_name: "frame"
  slots:
    - binding: 0
      kind: UniformBuffer
      stage_mask: ALL
- debug_name: "lighting"
  slots:
    - binding: 0
      kind: StorageBuffer
      stage_mask: COMPUTE
    - binding: 1
      kind: StorageImage
      stage_mask: COMPUTE
    - binding: 2
      kind: UniformTexelBuffer
      array_count: 3
"#;

#[test]
fn yaml_layouts_build_in_order() {
    let cfgs = ResourceSetLayoutCfg::vec_from_yaml(LAYOUTS_YAML).unwrap();
    let layouts: Vec<_> = cfgs.iter().map(|c| c.build().unwrap()).collect();
    assert_eq!(layouts.len(), 2);
    assert_eq!(layouts[0].debug_name(), "frame");
    assert_eq!(layouts[1].binding_slots().len(), 3);
    assert_eq!(
        layouts[1]
            .binding_slots()
            .iter()
            .find(|s| s.binding == 2)
            .map(|s| (s.kind, s.array_count)),
        Some((BindingKind::UniformTexelBuffer, 3))
    );
}

#[test]
fn yaml_duplicates_surface_as_layout_errors() {
    let yaml = r#"
debug_name: "dup"
slots:
  - { binding: 1, kind: Sampler }
  - { binding: 1, kind: SampledImage }
"#;
    let err = ResourceSetLayoutCfg::from_yaml(yaml)
        .unwrap()
        .build()
        .unwrap_err();
    assert!(matches!(err, GPUError::DuplicateBinding { binding: 1, .. }));
}

#[test]
fn heap_from_yaml() {
    let cfg = HeapCfg::from_yaml("debug_name: staging\nbyte_size: 8192\nmax_allocations: 4\n")
        .unwrap();
    let heap = OffsetHeap::new(&cfg.info());
    assert_eq!(heap.debug_name(), "staging");
    assert_eq!(heap.stats().capacity, 8192);
    for _ in 0..4 {
        heap.request_allocation(16).unwrap();
    }
    assert!(matches!(
        heap.request_allocation(16),
        Err(GPUError::SlotError { .. })
    ));
}
