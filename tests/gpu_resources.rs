//! GPU tests for the resource core
//!
//! These tests create a real headless Vulkan device. All of them require a
//! GPU (or a software implementation such as lavapipe) and are marked with
//! #[ignore].
//!
//! Run with: cargo test --test gpu_resources -- --ignored

use ash::vk;
use lit_renderer::backend::buffer::copy_buffer;
use lit_renderer::backend::image::{
    copy_buffer_to_image, copy_image_to_buffer, depth_format_features, transition_layout,
};
use lit_renderer::backend::mipmap::{self, generate_mipmaps};
use lit_renderer::backend::{
    Buffer, CommandPool, DescriptorPool, DescriptorSetLayoutBuilder, DescriptorWrite, Image,
    ImageDesc, RenderError, SamplerSettings, Texture, UniformBuffers, VulkanDevice,
};
use lit_renderer::config::Config;
use lit_renderer::scene::{self, MeshId, Scene, TextureId};
use std::sync::Arc;

fn create_test_device() -> (Arc<VulkanDevice>, CommandPool) {
    let device = VulkanDevice::new("Lit Renderer Test", false).unwrap();
    let commands = CommandPool::new(&device).unwrap();
    (device, commands)
}

fn host_visible() -> vk::MemoryPropertyFlags {
    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
}

// ============================================================================
// MEMORY + BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_empty_type_filter_has_no_memory_type() {
    let (device, _commands) = create_test_device();

    let err = device
        .find_memory_type(0, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .unwrap_err();
    assert!(matches!(err, RenderError::NoCompatibleMemoryType { type_filter: 0, .. }));
}

#[test]
#[ignore] // Requires GPU
fn test_zero_sized_buffers_are_rejected() {
    let (device, commands) = create_test_device();

    let err = Buffer::new(&device, 0, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible()).err().unwrap();
    assert!(matches!(err, RenderError::ZeroSizedBuffer));

    let err = Buffer::device_local_with_data(&commands, vk::BufferUsageFlags::INDEX_BUFFER, &[])
        .err()
        .unwrap();
    assert!(matches!(err, RenderError::ZeroSizedBuffer));

    assert!(matches!(
        UniformBuffers::new(&device, 2, 0),
        Err(RenderError::ZeroSizedBuffer)
    ));
}

#[test]
#[ignore] // Requires GPU
fn test_host_visible_buffer_round_trip() {
    let (device, _commands) = create_test_device();

    let data: Vec<u32> = (0..64).collect();
    let buffer = Buffer::with_data(&device, vk::BufferUsageFlags::UNIFORM_BUFFER, &data).unwrap();
    assert_eq!(buffer.size, 256);
    assert!(buffer.allocation_size >= buffer.size);

    let bytes = buffer.read_bytes(0, buffer.size).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<u32, u8>(&data));

    buffer.write_bytes(4, &[0xAB; 4]).unwrap();
    assert_eq!(buffer.read_bytes(4, 4).unwrap(), vec![0xAB; 4]);
}

#[test]
#[ignore] // Requires GPU
fn test_out_of_range_write_is_rejected() {
    let (device, _commands) = create_test_device();

    let buffer = Buffer::new(&device, 16, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible()).unwrap();
    let err = buffer.write_bytes(8, &[0; 16]).unwrap_err();
    assert!(matches!(err, RenderError::BufferOverflow { offset: 8, len: 16, size: 16 }));
}

#[test]
#[ignore] // Requires GPU
fn test_staging_upload_reaches_device_local_buffer() {
    let (device, commands) = create_test_device();

    let data: Vec<u8> = (0..=255).collect();
    let gpu = Buffer::device_local_with_data(
        &commands,
        vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
        &data,
    )
    .unwrap();

    // Device-local memory cannot be mapped directly
    assert!(matches!(gpu.read_bytes(0, 1), Err(RenderError::NotHostVisible)));

    let readback = Buffer::new(&device, gpu.size, vk::BufferUsageFlags::TRANSFER_DST, host_visible()).unwrap();
    copy_buffer(&commands, &gpu, &readback, gpu.size).unwrap();

    assert_eq!(readback.read_bytes(0, readback.size).unwrap(), data);
}

// ============================================================================
// UNIFORM BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_uniform_slots_are_independent() {
    let (device, _commands) = create_test_device();

    let ubos = UniformBuffers::new(&device, 2, 64).unwrap();
    assert_eq!(ubos.frames(), 2);

    ubos.update(0, &[1; 64]).unwrap();
    ubos.update(1, &[2; 64]).unwrap();

    assert_eq!(ubos.read(0).unwrap(), vec![1; 64]);
    assert_eq!(ubos.read(1).unwrap(), vec![2; 64]);
    // Frame counters wrap onto slots
    assert_eq!(ubos.buffer(3).handle, ubos.buffer(1).handle);
}

#[test]
#[ignore] // Requires GPU
fn test_zero_frames_in_flight_is_rejected() {
    let (device, _commands) = create_test_device();
    assert!(matches!(
        UniformBuffers::new(&device, 0, 64),
        Err(RenderError::InvalidConfig(_))
    ));
}

// ============================================================================
// DESCRIPTOR TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_pool_serves_exactly_max_sets() {
    let (device, _commands) = create_test_device();

    let layout = DescriptorSetLayoutBuilder::new()
        .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
        .build(&device)
        .unwrap();
    let sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: 3,
    }];
    let mut pool = DescriptorPool::new(&device, &sizes, 3).unwrap();

    let sets = pool.allocate(&[&layout, &layout, &layout]).unwrap();
    assert_eq!(sets.len(), 3);
    assert_eq!(pool.outstanding(), 3);

    let err = pool.allocate(&[&layout]).unwrap_err();
    assert!(matches!(err, RenderError::PoolExhausted { requested: 1, outstanding: 3, max_sets: 3 }));

    // Freeing one makes room for one
    let mut sets = sets;
    let freed = sets.pop().unwrap();
    pool.free(vec![freed]).unwrap();
    assert_eq!(pool.allocate(&[&layout]).unwrap().len(), 1);
}

#[test]
#[ignore] // Requires GPU
fn test_sets_go_stale_on_reset_and_destroy() {
    let (device, _commands) = create_test_device();

    let layout = DescriptorSetLayoutBuilder::new()
        .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
        .build(&device)
        .unwrap();
    let sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: 4,
    }];
    let mut pool = DescriptorPool::new(&device, &sizes, 4).unwrap();

    let before_reset = pool.allocate(&[&layout]).unwrap().remove(0);
    pool.reset().unwrap();
    assert!(!before_reset.is_valid());
    assert!(matches!(before_reset.handle(), Err(RenderError::StaleDescriptorSet)));
    assert!(matches!(pool.free(vec![before_reset]), Err(RenderError::StaleDescriptorSet)));
    assert_eq!(pool.outstanding(), 0);

    let before_destroy = pool.allocate(&[&layout]).unwrap().remove(0);
    assert!(before_destroy.is_valid());
    pool.destroy();
    assert!(!before_destroy.is_valid());

    let ubo = Buffer::new(&device, 64, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible()).unwrap();
    let err = before_destroy
        .update(&device, &[DescriptorWrite::uniform_buffer(0, &ubo)])
        .unwrap_err();
    assert!(matches!(err, RenderError::StaleDescriptorSet));
}

#[test]
#[ignore] // Requires GPU
fn test_set_from_other_pool_is_rejected() {
    let (device, _commands) = create_test_device();

    let layout = DescriptorSetLayoutBuilder::new()
        .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
        .build(&device)
        .unwrap();
    let sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: 1,
    }];
    let mut a = DescriptorPool::new(&device, &sizes, 1).unwrap();
    let mut b = DescriptorPool::new(&device, &sizes, 1).unwrap();

    let from_a = a.allocate(&[&layout]).unwrap();
    assert!(matches!(b.free(from_a), Err(RenderError::ForeignDescriptorSet)));
}

// ============================================================================
// TEXTURE + MIPMAP TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_texture_gets_full_mip_chain() {
    let (_device, commands) = create_test_device();

    let pixels = scene::checkerboard(64, 4);
    let texture = Texture::from_rgba8(&commands, 64, 64, &pixels, &SamplerSettings::default()).unwrap();

    assert_eq!(texture.image.mip_levels, 7);
    assert_eq!(texture.sampled_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
}

#[test]
#[ignore] // Requires GPU
fn test_texture_rejects_empty_extent() {
    let (_device, commands) = create_test_device();

    let err = Texture::from_rgba8(&commands, 0, 0, &[], &SamplerSettings::default())
        .err()
        .unwrap();
    assert!(matches!(err, RenderError::ZeroSizedImage { width: 0, height: 0 }));
}

#[test]
#[ignore] // Requires GPU
fn test_texture_rejects_wrong_pixel_count() {
    let (_device, commands) = create_test_device();

    let err = Texture::from_rgba8(&commands, 4, 4, &[0; 12], &SamplerSettings::default())
        .err()
        .unwrap();
    assert!(matches!(err, RenderError::TextureDataSize { expected: 64, actual: 12 }));
}

#[test]
#[ignore] // Requires GPU
fn test_generate_mipmaps_on_raw_image() {
    let (device, commands) = create_test_device();

    let format = vk::Format::R8G8B8A8_UNORM;
    let image = Image::new(&device, &ImageDesc {
        extent: vk::Extent2D { width: 300, height: 100 },
        format,
        mip_levels: mipmap::mip_level_count(300, 100),
        usage: vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST
            | vk::ImageUsageFlags::SAMPLED,
        aspect: vk::ImageAspectFlags::COLOR,
    })
    .unwrap();
    assert_eq!(image.mip_levels, 9);

    commands
        .one_time_submit(|vk_device, cmd| {
            transition_layout(
                vk_device,
                cmd,
                image.handle,
                image.levels(0, image.mip_levels),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
        })
        .unwrap();

    let result = generate_mipmaps(&commands, &image);
    if mipmap::is_linear_blitting_supported(&device, format) {
        result.unwrap();
    } else {
        assert!(matches!(result, Err(RenderError::LinearBlitUnsupported(f)) if f == format));
    }
}

#[test]
#[ignore] // Requires GPU
fn test_shadow_map_uses_depth_format() {
    let (device, commands) = create_test_device();

    let shadow = Texture::shadow_map(&commands, 512).unwrap();
    let required = depth_format_features(vk::ImageUsageFlags::SAMPLED);
    assert_eq!(shadow.image.format, device.find_depth_format(required).unwrap());

    let features = device.format_properties(shadow.image.format).optimal_tiling_features;
    assert!(features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE));
    assert!(features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT));
    assert_eq!(shadow.sampled_layout(), vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
}

#[test]
#[ignore] // Requires GPU
fn test_every_mip_level_holds_the_fill_colour() {
    let (device, commands) = create_test_device();

    let format = vk::Format::R8G8B8A8_UNORM;
    if !mipmap::is_linear_blitting_supported(&device, format) {
        return;
    }

    const FILL: [u8; 4] = [200, 40, 90, 255];
    let (width, height) = (32u32, 8u32);
    let pixels: Vec<u8> = FILL.repeat((width * height) as usize);
    let staging = Buffer::with_data(&device, vk::BufferUsageFlags::TRANSFER_SRC, &pixels).unwrap();

    let image = Image::new(&device, &ImageDesc {
        extent: vk::Extent2D { width, height },
        format,
        mip_levels: mipmap::mip_level_count(width, height),
        usage: vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST
            | vk::ImageUsageFlags::SAMPLED,
        aspect: vk::ImageAspectFlags::COLOR,
    })
    .unwrap();
    assert_eq!(image.mip_levels, 6);

    commands
        .one_time_submit(|vk_device, cmd| {
            transition_layout(
                vk_device,
                cmd,
                image.handle,
                image.levels(0, image.mip_levels),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            copy_buffer_to_image(vk_device, cmd, staging.handle, &image);
        })
        .unwrap();

    generate_mipmaps(&commands, &image).unwrap();

    // Level i is (32 >> i) x max(8 >> i, 1); the last one is 1x1
    let mut extent = (width, height);
    for level in 0..image.mip_levels {
        let size = (extent.0 * extent.1 * 4) as vk::DeviceSize;
        let readback = Buffer::new(&device, size, vk::BufferUsageFlags::TRANSFER_DST, host_visible()).unwrap();

        commands
            .one_time_submit(|vk_device, cmd| {
                transition_layout(
                    vk_device,
                    cmd,
                    image.handle,
                    image.levels(level, 1),
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                );
                copy_image_to_buffer(vk_device, cmd, &image, level, readback.handle);
                transition_layout(
                    vk_device,
                    cmd,
                    image.handle,
                    image.levels(level, 1),
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                );
            })
            .unwrap();

        let texels = readback.read_bytes(0, size).unwrap();
        for texel in texels.chunks_exact(4) {
            for (got, want) in texel.iter().zip(FILL) {
                assert!(got.abs_diff(want) <= 1, "level {}: {:?} != {:?}", level, texel, FILL);
            }
        }
        extent = mipmap::next_mip_extent(extent.0, extent.1);
    }
    assert_eq!(extent, (1, 1));
}

// ============================================================================
// SCENE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_scene_allocates_one_set_per_frame() {
    let (_device, commands) = create_test_device();

    let mut config = Config::default();
    config.graphics.max_frames_in_flight = 2;
    config.graphics.shadow_map_size = 256;
    config.descriptors.max_sets = 4;

    let mut scene = Scene::new(&commands, &config).unwrap();
    let texture = scene.add_texture(&commands, 16, 16, &scene::checkerboard(16, 2)).unwrap();
    let (vertices, indices) = scene::cube();

    scene.add_mesh(&commands, &vertices, &indices, texture).unwrap();
    scene.add_mesh(&commands, &vertices, &indices, texture).unwrap();
    assert_eq!(scene.descriptor_pool().outstanding(), 4);

    // A third mesh needs two more sets than the pool holds
    let err = scene.add_mesh(&commands, &vertices, &indices, texture).err().unwrap();
    assert!(matches!(err, RenderError::PoolExhausted { .. }));
    assert_eq!(scene.mesh_count(), 2);

    let slot0 = scene.draw_items(0).unwrap();
    let slot1 = scene.draw_items(1).unwrap();
    assert_eq!(slot0.len(), 2);
    assert_eq!(slot0[0].index_count, 36);
    assert_ne!(slot0[0].descriptor_set, slot1[0].descriptor_set);
}

#[test]
#[ignore] // Requires GPU
fn test_unknown_ids_are_errors() {
    let (_device, commands) = create_test_device();

    let mut config = Config::default();
    config.graphics.shadow_map_size = 64;
    let mut scene = Scene::new(&commands, &config).unwrap();
    let (vertices, indices) = scene::cube();

    let err = scene.add_mesh(&commands, &vertices, &indices, TextureId(7)).err().unwrap();
    assert!(matches!(err, RenderError::UnknownTexture(7)));
    assert!(matches!(scene.texture(TextureId(0)), Err(RenderError::UnknownTexture(0))));

    let err = scene.set_transform(MeshId(3), glam::Mat4::IDENTITY).unwrap_err();
    assert!(matches!(err, RenderError::UnknownMesh(3)));
    assert_eq!(scene.descriptor_pool().outstanding(), 0);
}

#[test]
#[ignore] // Requires GPU
fn test_mesh_without_indices_is_rejected() {
    let (_device, commands) = create_test_device();

    let mut config = Config::default();
    config.graphics.shadow_map_size = 64;
    let mut scene = Scene::new(&commands, &config).unwrap();
    let texture = scene.add_texture(&commands, 4, 4, &scene::checkerboard(4, 2)).unwrap();
    let (vertices, _) = scene::cube();

    let err = scene.add_mesh(&commands, &vertices, &[], texture).err().unwrap();
    assert!(matches!(err, RenderError::ZeroSizedBuffer));
    assert_eq!(scene.mesh_count(), 0);
}
