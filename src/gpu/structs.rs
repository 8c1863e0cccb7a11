#[cfg(feature = "hikari-serde")]
use serde::{Deserialize, Serialize};

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum MemoryVisibility {
    #[default]
    Gpu,
    CpuAndGpu,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum BufferUsage {
    ALL,
    VERTEX,
    INDEX,
    #[default]
    UNIFORM,
    STORAGE,
    TEXEL,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum Format {
    R8Sint,
    R8Uint,
    RG8,
    RGB8,
    BGRA8,
    BGRA8Unorm,
    #[default]
    RGBA8,
    RGBA8Unorm,
    RGBA16F,
    RGBA32F,
    D24S8,
    D32F,
    BC1RgbaUnorm,
    BC3RgbaUnorm,
    Etc2Rgb8,
}

impl Format {
    /// Bytes per texel for uncompressed formats.
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            Format::R8Sint | Format::R8Uint => Some(1),
            Format::RG8 => Some(2),
            Format::RGB8 => Some(3),
            Format::BGRA8
            | Format::BGRA8Unorm
            | Format::RGBA8
            | Format::RGBA8Unorm
            | Format::D24S8
            | Format::D32F => Some(4),
            Format::RGBA16F => Some(8),
            Format::RGBA32F => Some(16),
            Format::BC1RgbaUnorm | Format::BC3RgbaUnorm | Format::Etc2Rgb8 => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.bytes_per_pixel().is_none()
    }

    /// Bytes per 4x4 block for block-compressed formats.
    fn block_size(&self) -> u64 {
        match self {
            Format::BC3RgbaUnorm => 16,
            _ => 8,
        }
    }

    /// Byte footprint of a `width` x `height` surface in this format.
    pub fn data_size(&self, width: u32, height: u32) -> u64 {
        match self.bytes_per_pixel() {
            Some(bpp) => width as u64 * height as u64 * bpp as u64,
            None => {
                let blocks_x = (width as u64).div_ceil(4);
                let blocks_y = (height as u64).div_ceil(4);
                blocks_x * blocks_y * self.block_size()
            }
        }
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum ImageType {
    #[default]
    Image2D,
    Image2DArray,
    Image3D,
    Cube,
}

/// Faces of a cube image in layer order.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn from_layer(layer: u32) -> Option<CubeFace> {
        Self::ALL.get(layer as usize).copied()
    }

    pub fn layer(&self) -> u32 {
        *self as u32
    }
}

/// Layout an image is in while bound.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum ImageLayout {
    Undefined,
    #[default]
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    DepthStencilReadOnlyOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    Preinitialized,
    PresentSrc,
}

#[derive(Debug, Hash, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Hash, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub struct Rect2D {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            w: extent.width,
            h: extent.height,
        }
    }

    pub fn fits_in(&self, extent: Extent) -> bool {
        self.x as u64 + self.w as u64 <= extent.width as u64
            && self.y as u64 + self.h as u64 <= extent.height as u64
    }
}

/// A (base layer, layer count, mip level) selection into an image.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub struct LayerRange {
    pub base_layer: u32,
    pub layer_count: u32,
    pub mip_level: u32,
}

impl Default for LayerRange {
    fn default() -> Self {
        Self {
            base_layer: 0,
            layer_count: 1,
            mip_level: 0,
        }
    }
}

impl LayerRange {
    pub fn layer(base_layer: u32, mip_level: u32) -> Self {
        Self {
            base_layer,
            layer_count: 1,
            mip_level,
        }
    }
}

/// Fixed creation parameters of an image.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub struct ImageParams {
    pub ty: ImageType,
    pub format: Format,
    pub dim: [u32; 3],
    pub mip_levels: u32,
    pub layers: u32,
}

impl ImageParams {
    /// Number of addressable layers: six for cubes, the array size for arrays.
    pub fn layer_extent(&self) -> u32 {
        match self.ty {
            ImageType::Image2D | ImageType::Image3D => 1,
            ImageType::Image2DArray => self.layers,
            ImageType::Cube => 6,
        }
    }

    pub fn mip_extent(&self, mip_level: u32) -> Extent {
        let shift = mip_level.min(31);
        Extent {
            width: (self.dim[0] >> shift).max(1),
            height: (self.dim[1] >> shift).max(1),
        }
    }

    pub fn entire_range(&self) -> LayerRange {
        LayerRange {
            base_layer: 0,
            layer_count: self.layer_extent(),
            mip_level: 0,
        }
    }
}

pub struct ImageInfo<'a> {
    pub debug_name: &'a str,
    pub ty: ImageType,
    pub dim: [u32; 3],
    pub layers: u32,
    pub format: Format,
    pub mip_levels: u32,
}

impl<'a> ImageInfo<'a> {
    pub fn params(&self) -> ImageParams {
        ImageParams {
            ty: self.ty,
            format: self.format,
            dim: self.dim,
            mip_levels: self.mip_levels,
            layers: self.layers,
        }
    }
}

impl<'a> Default for ImageInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            ty: ImageType::Image2D,
            dim: [1280, 1024, 1],
            layers: 1,
            format: Format::RGBA8,
            mip_levels: 1,
        }
    }
}

#[derive(Hash, Clone, Copy, Debug)]
pub struct BufferInfo<'a> {
    pub debug_name: &'a str,
    pub byte_size: u64,
    pub visibility: MemoryVisibility,
    pub usage: BufferUsage,
}

impl<'a> Default for BufferInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            byte_size: 1024,
            visibility: MemoryVisibility::CpuAndGpu,
            usage: BufferUsage::UNIFORM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum SamplerAddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum SamplerMipmapMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub enum BorderColor {
    OpaqueBlack,
    OpaqueWhite,
    TransparentBlack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "hikari-serde", derive(Serialize, Deserialize))]
pub struct SamplerInfo {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub border_color: BorderColor,
    pub unnormalized_coordinates: bool,
    pub compare_enable: bool,
    pub mipmap_mode: SamplerMipmapMode,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        SamplerInfo {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode_u: SamplerAddressMode::Repeat,
            address_mode_v: SamplerAddressMode::Repeat,
            address_mode_w: SamplerAddressMode::Repeat,
            anisotropy_enable: false,
            max_anisotropy: 1.0,
            border_color: BorderColor::OpaqueBlack,
            unnormalized_coordinates: false,
            compare_enable: false,
            mipmap_mode: SamplerMipmapMode::Linear,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextInfo<'a> {
    pub debug_name: &'a str,
}

impl<'a> Default for ContextInfo<'a> {
    fn default() -> Self {
        Self { debug_name: "hikari" }
    }
}

/// Sizing of an [`OffsetHeap`](crate::gpu::OffsetHeap).
#[derive(Debug, Clone, Copy)]
pub struct HeapInfo<'a> {
    pub debug_name: &'a str,
    pub byte_size: u32,
    pub max_allocations: u32,
}

impl<'a> Default for HeapInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            byte_size: 64 * 1024 * 1024,
            max_allocations: 1024,
        }
    }
}
