// Mipmap generation
//
// Each level is blitted from the one above it at half resolution. Requires
// the image format to support linear-filtered blits with optimal tiling;
// there is no fallback path.

use ash::vk;
use super::command::CommandPool;
use super::error::{RenderError, Result};
use super::image::{transition_layout, Image};
use super::VulkanDevice;

/// Number of levels in a full mip chain: `floor(log2(max(width, height))) + 1`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Extent of the next level down (halved, floored, never below 1)
pub fn next_mip_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Whether `format` can be a source and destination of a linear blit
pub fn is_linear_blitting_supported(device: &VulkanDevice, format: vk::Format) -> bool {
    supports_linear_blit(device.format_properties(format).optimal_tiling_features)
}

fn supports_linear_blit(features: vk::FormatFeatureFlags) -> bool {
    features.contains(
        vk::FormatFeatureFlags::BLIT_SRC
            | vk::FormatFeatureFlags::BLIT_DST
            | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
    )
}

/// Fill mip levels `1..image.mip_levels` from level 0.
///
/// Expects every level in `TRANSFER_DST_OPTIMAL` and leaves every level in
/// `SHADER_READ_ONLY_OPTIMAL`. Runs in one submission and waits for it.
pub fn generate_mipmaps(commands: &CommandPool, image: &Image) -> Result<()> {
    if !is_linear_blitting_supported(commands.device(), image.format) {
        return Err(RenderError::LinearBlitUnsupported(image.format));
    }

    commands.one_time_submit(|device, cmd| record_mipmaps(device, cmd, image))
}

/// Record the blit chain for `image` into `cmd`
pub fn record_mipmaps(device: &ash::Device, cmd: vk::CommandBuffer, image: &Image) {
    let mut mip_width = image.extent.width;
    let mut mip_height = image.extent.height;

    for i in 1..image.mip_levels {
        transition_layout(
            device,
            cmd,
            image.handle,
            image.levels(i - 1, 1),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );

        let (next_width, next_height) = next_mip_extent(mip_width, mip_height);

        let blit = vk::ImageBlit::builder()
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: mip_width as i32, y: mip_height as i32, z: 1 },
            ])
            .src_subresource(vk::ImageSubresourceLayers {
                aspect_mask: image.aspect,
                mip_level: i - 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: next_width as i32, y: next_height as i32, z: 1 },
            ])
            .dst_subresource(vk::ImageSubresourceLayers {
                aspect_mask: image.aspect,
                mip_level: i,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();

        unsafe {
            device.cmd_blit_image(
                cmd,
                image.handle,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image.handle,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );
        }

        transition_layout(
            device,
            cmd,
            image.handle,
            image.levels(i - 1, 1),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );

        mip_width = next_width;
        mip_height = next_height;
    }

    // Last level was only ever a blit destination
    transition_layout(
        device,
        cmd,
        image.handle,
        image.levels(image.mip_levels - 1, 1),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );
}
