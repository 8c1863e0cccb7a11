use thiserror::Error;

use super::resource_set_layout::BindingKind;

#[derive(Debug, Error)]
pub enum GPUError {
    #[error("heap '{heap}' cannot satisfy a {requested} byte allocation ({free} bytes free)")]
    OutOfMemory {
        heap: String,
        requested: u64,
        free: u64,
    },
    #[error("heap '{heap}' ran out of allocation slots")]
    SlotError { heap: String },
    #[error("binding {binding} is declared more than once in layout '{layout}'")]
    DuplicateBinding { layout: String, binding: u32 },
    #[error("binding {binding} in layout '{layout}' declares an array width of zero")]
    ZeroArrayCount { layout: String, binding: u32 },
    #[error("resource set expects {expected} bindings but {actual} were supplied")]
    BindingCountMismatch { expected: usize, actual: usize },
    #[error("binding {binding} expects a {expected:?} resource but a {found} binding was supplied")]
    BindingKindMismatch {
        binding: u32,
        expected: BindingKind,
        found: &'static str,
    },
    #[error("binding {binding} declares {expected} array elements but {actual} were supplied")]
    ArrayLengthMismatch {
        binding: u32,
        expected: u32,
        actual: usize,
    },
    #[error("binding {binding} addresses bytes {offset}..{end} of a {size} byte buffer")]
    BufferRangeOutOfBounds {
        binding: u32,
        offset: u64,
        end: u64,
        size: u64,
    },
    #[error("storage image at binding {binding} must be bound in the general layout")]
    StorageImageLayout { binding: u32 },
    #[error("failed to start thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "hikari-serde")]
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[cfg(feature = "hikari-serde")]
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenient crate-wide result type.
pub type Result<T, E = GPUError> = std::result::Result<T, E>;
