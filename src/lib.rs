pub mod gpu;
pub mod job;
pub mod utils;

pub use gpu::*;
