// Error taxonomy for the resource core
//
// Every failure is fatal for the operation that raised it and is handed
// back to the caller. Nothing in the backend logs an error and carries on.

use ash::vk;
use thiserror::Error;

/// Errors raised by device, memory and descriptor operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A Vulkan call returned a non-success status.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or opened.
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Application name contained an interior NUL byte.
    #[error("Invalid application name: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No memory type matched both the type filter and the property flags.
    #[error("No memory type in filter {type_filter:#034b} supports {properties:?}")]
    NoCompatibleMemoryType {
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// A descriptor pool was requested without any descriptor types.
    #[error("Descriptor pool needs at least one pool size")]
    EmptyPoolSizes,

    /// Allocation would exceed the pool's declared `max_sets`.
    #[error("Descriptor pool exhausted: {requested} set(s) requested, {outstanding}/{max_sets} in use")]
    PoolExhausted {
        requested: u32,
        outstanding: u32,
        max_sets: u32,
    },

    /// Allocation would exceed the declared count for one descriptor type.
    #[error("Descriptor pool has {available} {ty:?} descriptor(s) left, {requested} requested")]
    PoolTypeExhausted {
        ty: vk::DescriptorType,
        requested: u32,
        available: u32,
    },

    /// The set's pool was destroyed or reset after allocation.
    #[error("Descriptor set used after its pool was destroyed or reset")]
    StaleDescriptorSet,

    /// A set was handed back to a pool it was not allocated from.
    #[error("Descriptor set does not belong to this pool")]
    ForeignDescriptorSet,

    #[error("None of the candidate formats {0:?} is supported")]
    UnsupportedFormat(Vec<vk::Format>),

    #[error("Format {0:?} does not support linear blitting")]
    LinearBlitUnsupported(vk::Format),

    /// A host write or read reached past the end of the buffer.
    #[error("Access of {len} byte(s) at offset {offset} exceeds buffer size {size}")]
    BufferOverflow {
        offset: vk::DeviceSize,
        len: vk::DeviceSize,
        size: vk::DeviceSize,
    },

    #[error("Buffer memory is not host visible")]
    NotHostVisible,

    #[error("Texture data is {actual} bytes, expected {expected}")]
    TextureDataSize { expected: usize, actual: usize },

    /// Vulkan forbids zero-sized buffers.
    #[error("Buffer size must be non-zero")]
    ZeroSizedBuffer,

    #[error("Image extent {width}x{height} has a zero dimension")]
    ZeroSizedImage { width: u32, height: u32 },

    #[error("No mesh with id {0}")]
    UnknownMesh(usize),

    #[error("No texture with id {0}")]
    UnknownTexture(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
