// Backend module - Vulkan resource core
//
// Design: Thin owning wrappers around ash handles
// Every GPU object is released exactly once, by the value that created it

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod image;
pub mod memory;
pub mod mipmap;
pub mod sync;
pub mod texture;
pub mod uniform;

pub use buffer::{Buffer, BufferView};
pub use command::CommandPool;
pub use descriptor::{
    DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWrite,
};
pub use device::VulkanDevice;
pub use error::{RenderError, Result};
pub use image::{Image, ImageDesc};
pub use sync::FrameRing;
pub use texture::{SamplerSettings, Texture};
pub use uniform::UniformBuffers;
