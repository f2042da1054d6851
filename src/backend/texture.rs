// Sampled textures and shadow maps
//
// A texture is an image plus the sampler used to read it. Sampler
// parameters are fixed at creation from the device limits queried then.

use ash::vk;
use std::sync::Arc;
use super::buffer::Buffer;
use super::command::CommandPool;
use super::error::{RenderError, Result};
use super::image::{copy_buffer_to_image, transition_layout, Image, ImageDesc};
use super::mipmap;
use super::VulkanDevice;

/// Sampler knobs that come from configuration rather than the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub generate_mipmaps: bool,
    pub anisotropy: bool,
    /// Upper bound, further clamped to the device limit
    pub max_anisotropy: f32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            generate_mipmaps: true,
            anisotropy: true,
            max_anisotropy: 16.0,
        }
    }
}

/// Image, view and sampler ready to be bound as a combined image sampler
pub struct Texture {
    pub image: Image,
    pub sampler: vk::Sampler,
}

impl Texture {
    /// Upload RGBA8 sRGB pixels and build the mip chain.
    ///
    /// Returns once the upload and mip generation have completed; the image is
    /// then in `SHADER_READ_ONLY_OPTIMAL` on every level.
    pub fn from_rgba8(
        commands: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
        settings: &SamplerSettings,
    ) -> Result<Self> {
        check_rgba8_data(width, height, pixels.len())?;

        let device = commands.device();
        let format = vk::Format::R8G8B8A8_SRGB;

        let mip_levels = if settings.generate_mipmaps {
            mipmap::mip_level_count(width, height)
        } else {
            1
        };
        if mip_levels > 1 && !mipmap::is_linear_blitting_supported(device, format) {
            return Err(RenderError::LinearBlitUnsupported(format));
        }

        let staging = Buffer::with_data(device, vk::BufferUsageFlags::TRANSFER_SRC, pixels)?;

        let image = Image::new(device, &ImageDesc {
            extent: vk::Extent2D { width, height },
            format,
            mip_levels,
            usage: vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::COLOR,
        })?;

        // One submission: upload level 0, then blit the rest of the chain
        commands.one_time_submit(|vk_device, cmd| {
            transition_layout(
                vk_device,
                cmd,
                image.handle,
                image.levels(0, mip_levels),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            copy_buffer_to_image(vk_device, cmd, staging.handle, &image);
            mipmap::record_mipmaps(vk_device, cmd, &image);
        })?;

        let sampler_info = color_sampler_info(device, settings, mip_levels);
        let sampler = unsafe { device.device.create_sampler(&sampler_info, None)? };

        log::debug!("Created texture {}x{} with {} mip level(s)", width, height, mip_levels);

        Ok(Self { image, sampler })
    }

    /// Depth texture that is rendered into by the shadow pass and sampled with
    /// depth comparison by the lighting pass.
    ///
    /// The image starts in `DEPTH_STENCIL_READ_ONLY_OPTIMAL`, so it can be bound
    /// before the first shadow pass has run.
    pub fn shadow_map(commands: &CommandPool, size: u32) -> Result<Self> {
        let device = commands.device();

        let image = Image::depth(
            device,
            vk::Extent2D { width: size, height: size },
            vk::ImageUsageFlags::SAMPLED,
        )?;

        commands.one_time_submit(|vk_device, cmd| {
            transition_layout(
                vk_device,
                cmd,
                image.handle,
                image.levels(0, 1),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            );
        })?;

        // Depth formats are not required to support linear filtering
        let linear = device
            .format_properties(image.format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR);
        let sampler_info = shadow_sampler_info(linear);
        let sampler = unsafe { device.device.create_sampler(&sampler_info, None)? };

        log::debug!("Created {}x{} shadow map ({:?})", size, size, image.format);

        Ok(Self { image, sampler })
    }

    /// Layout descriptors must declare when sampling this texture
    pub fn sampled_layout(&self) -> vk::ImageLayout {
        if self.image.aspect.contains(vk::ImageAspectFlags::DEPTH) {
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        }
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        self.image.device()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // Image fields drop after this, so the sampler goes first
        unsafe { self.image.device().device.destroy_sampler(self.sampler, None) };
    }
}

/// Reject extents Vulkan cannot create and pixel data that does not fill them
fn check_rgba8_data(width: u32, height: u32, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::ZeroSizedImage { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if len != expected {
        return Err(RenderError::TextureDataSize {
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Anisotropy to request, or `None` when it must stay disabled
fn effective_anisotropy(
    settings: &SamplerSettings,
    device_supports: bool,
    device_limit: f32,
) -> Option<f32> {
    if settings.anisotropy && device_supports {
        Some(settings.max_anisotropy.min(device_limit).max(1.0))
    } else {
        None
    }
}

fn color_sampler_info(
    device: &VulkanDevice,
    settings: &SamplerSettings,
    mip_levels: u32,
) -> vk::SamplerCreateInfo {
    let anisotropy = effective_anisotropy(
        settings,
        device.anisotropy_enabled,
        device.properties.limits.max_sampler_anisotropy,
    );
    build_color_sampler_info(anisotropy, mip_levels)
}

fn build_color_sampler_info(anisotropy: Option<f32>, mip_levels: u32) -> vk::SamplerCreateInfo {
    vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(anisotropy.is_some())
        .max_anisotropy(anisotropy.unwrap_or(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
        .build()
}

fn shadow_sampler_info(linear: bool) -> vk::SamplerCreateInfo {
    let filter = if linear { vk::Filter::LINEAR } else { vk::Filter::NEAREST };
    vk::SamplerCreateInfo::builder()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
        // Outside the light frustum counts as lit
        .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .compare_enable(true)
        .compare_op(vk::CompareOp::LESS_OR_EQUAL)
        .min_lod(0.0)
        .max_lod(1.0)
        .unnormalized_coordinates(false)
        .build()
}
