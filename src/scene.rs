// =============================================================================
// SCENE RESOURCES - Dense arenas of per-mesh GPU state
// =============================================================================
//
// Meshes and textures live in vectors owned by the scene and are addressed
// by stable integer ids. Each mesh owns:
//   - device-local vertex + index buffers (uploaded once through staging)
//   - one object UBO per frame in flight
//   - one descriptor set per frame in flight:
//       binding 0: object UBO    (vertex + fragment)
//       binding 1: light UBO     (vertex + fragment)
//       binding 2: albedo        (fragment, combined image sampler)
//       binding 3: shadow map    (fragment, combined image sampler)
//
// Field order matters for Drop: sets and buffers go before the pool and
// the layout they were created against.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use std::sync::Arc;
use crate::backend::{
    Buffer, CommandPool, DescriptorPool, DescriptorSet, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, DescriptorWrite, RenderError, Result, SamplerSettings, Texture,
    UniformBuffers, VulkanDevice,
};
use crate::config::Config;

pub const OBJECT_BINDING: u32 = 0;
pub const LIGHT_BINDING: u32 = 1;
pub const ALBEDO_BINDING: u32 = 2;
pub const SHADOW_MAP_BINDING: u32 = 3;

/// Interleaved vertex: position, normal, texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Per-object transforms, std140 compatible
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
    /// Inverse-transpose of `model`, for normals
    pub normal: Mat4,
}

/// The shadow-casting light, std140 compatible
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightUniforms {
    /// xyz position, w unused
    pub position: Vec4,
    /// rgb color, a intensity
    pub color: Vec4,
    /// Light view-projection, for shadow-map lookups
    pub view_proj: Mat4,
}

/// View and projection supplied by the camera each frame
#[derive(Debug, Clone, Copy)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub proj: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// What the draw-submission side needs to draw one mesh in one frame slot
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub descriptor_set: vk::DescriptorSet,
}

struct MeshResources {
    descriptor_sets: Vec<DescriptorSet>,
    uniforms: UniformBuffers,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    transform: Mat4,
}

struct LightResources {
    uniforms: UniformBuffers,
    position: Vec3,
    color: Vec4,
    view_proj: Mat4,
}

pub struct Scene {
    meshes: Vec<MeshResources>,
    light: LightResources,
    textures: Vec<Texture>,
    shadow_map: Texture,
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
    frames_in_flight: usize,
    sampler_settings: SamplerSettings,
    device: Arc<VulkanDevice>,
}

impl Scene {
    pub fn new(commands: &CommandPool, config: &Config) -> Result<Self> {
        config.validate()?;
        let device = commands.device().clone();
        let frames_in_flight = config.graphics.max_frames_in_flight;

        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(OBJECT_BINDING, stages)
            .uniform_buffer(LIGHT_BINDING, stages)
            .combined_image_sampler(ALBEDO_BINDING, vk::ShaderStageFlags::FRAGMENT)
            .combined_image_sampler(SHADOW_MAP_BINDING, vk::ShaderStageFlags::FRAGMENT)
            .build(&device)?;

        let pool = DescriptorPool::new(
            &device,
            &config.descriptor_pool_sizes(),
            config.descriptors.max_sets,
        )?;

        let shadow_map = Texture::shadow_map(commands, config.graphics.shadow_map_size)?;

        let light = LightResources {
            uniforms: UniformBuffers::for_type::<LightUniforms>(&device, frames_in_flight)?,
            position: Vec3::new(4.0, 8.0, 4.0),
            color: Vec4::ONE,
            view_proj: Mat4::IDENTITY,
        };

        log::info!("Scene created: {} frame(s) in flight", frames_in_flight);

        Ok(Self {
            meshes: Vec::new(),
            light,
            textures: Vec::new(),
            shadow_map,
            pool,
            layout,
            frames_in_flight,
            sampler_settings: config.sampler_settings(),
            device,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Layout every mesh set is allocated with, for pipeline-layout creation
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.layout.handle
    }

    pub fn shadow_map(&self) -> &Texture {
        &self.shadow_map
    }

    pub fn texture(&self, id: TextureId) -> Result<&Texture> {
        self.textures.get(id.0).ok_or(RenderError::UnknownTexture(id.0))
    }

    fn mesh_mut(&mut self, id: MeshId) -> Result<&mut MeshResources> {
        self.meshes.get_mut(id.0).ok_or(RenderError::UnknownMesh(id.0))
    }

    /// Upload an RGBA8 texture and return its id
    pub fn add_texture(
        &mut self,
        commands: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureId> {
        let texture = Texture::from_rgba8(commands, width, height, pixels, &self.sampler_settings)?;
        self.textures.push(texture);
        Ok(TextureId(self.textures.len() - 1))
    }

    /// Upload geometry, create per-frame uniforms and bind descriptor sets.
    ///
    /// Fails without side effects on the pool's bookkeeping if the pool
    /// cannot hold one more set per frame in flight.
    pub fn add_mesh(
        &mut self,
        commands: &CommandPool,
        vertices: &[Vertex],
        indices: &[u32],
        texture: TextureId,
    ) -> Result<MeshId> {
        let albedo = self
            .textures
            .get(texture.0)
            .ok_or(RenderError::UnknownTexture(texture.0))?;

        let vertex_buffer = Buffer::device_local_with_data(
            commands,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = Buffer::device_local_with_data(
            commands,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(indices),
        )?;

        let uniforms = UniformBuffers::for_type::<ObjectUniforms>(&self.device, self.frames_in_flight)?;

        let layouts = vec![&self.layout; self.frames_in_flight];
        let descriptor_sets = self.pool.allocate(&layouts)?;

        for (frame, set) in descriptor_sets.iter().enumerate() {
            set.update(&self.device, &[
                uniforms.descriptor_write(frame, OBJECT_BINDING),
                self.light.uniforms.descriptor_write(frame, LIGHT_BINDING),
                DescriptorWrite::texture(ALBEDO_BINDING, albedo),
                DescriptorWrite::texture(SHADOW_MAP_BINDING, &self.shadow_map),
            ])?;
        }

        self.meshes.push(MeshResources {
            descriptor_sets,
            uniforms,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            transform: Mat4::IDENTITY,
        });

        let id = MeshId(self.meshes.len() - 1);
        log::debug!("Added mesh {:?}: {} vertices, {} indices", id, vertices.len(), indices.len());
        Ok(id)
    }

    pub fn set_transform(&mut self, mesh: MeshId, transform: Mat4) -> Result<()> {
        self.mesh_mut(mesh)?.transform = transform;
        Ok(())
    }

    pub fn set_light(&mut self, position: Vec3, color: Vec4) {
        self.light.position = position;
        self.light.color = color;
        self.light.view_proj = light_view_proj(position);
    }

    /// Write every UBO for `slot`. The slot's fence must have been waited on.
    pub fn update(&self, slot: usize, camera: &CameraMatrices) -> Result<()> {
        let light = LightUniforms {
            position: self.light.position.extend(1.0),
            color: self.light.color,
            view_proj: self.light.view_proj,
        };
        self.light.uniforms.update_value(slot, &light)?;

        for mesh in &self.meshes {
            mesh.uniforms.update_value(slot, &object_uniforms(mesh.transform, camera))?;
        }
        Ok(())
    }

    /// Handles to bind and draw every mesh for `slot`
    pub fn draw_items(&self, slot: usize) -> Result<Vec<DrawItem>> {
        self.meshes
            .iter()
            .map(|mesh| {
                Ok(DrawItem {
                    vertex_buffer: mesh.vertex_buffer.handle,
                    index_buffer: mesh.index_buffer.handle,
                    index_count: mesh.index_count,
                    descriptor_set: mesh.descriptor_sets[slot % self.frames_in_flight].handle()?,
                })
            })
            .collect()
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        // Nothing may still be reading these buffers or sets
        let _ = self.device.wait_idle();
        log::info!("Releasing scene: {} mesh(es), {} texture(s)", self.meshes.len(), self.textures.len());
    }
}

fn object_uniforms(model: Mat4, camera: &CameraMatrices) -> ObjectUniforms {
    ObjectUniforms {
        model,
        view: camera.view,
        proj: camera.proj,
        normal: model.inverse().transpose(),
    }
}

/// Orthographic light looking at the origin, for a directional-style shadow map
fn light_view_proj(position: Vec3) -> Mat4 {
    let up = if position.cross(Vec3::Y).length_squared() < 1e-6 { Vec3::Z } else { Vec3::Y };
    let view = Mat4::look_at_rh(position, Vec3::ZERO, up);
    let proj = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 50.0);
    proj * view
}

/// Unit cube with per-face normals and UVs
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // normal, u axis, v axis
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in FACES {
        let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (n + u * su + v * sv) * 0.5;
            vertices.push(Vertex {
                position: p.to_array(),
                normal,
                uv: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// RGBA checkerboard, `cells` squares per side
pub fn checkerboard(size: u32, cells: u32) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if ((x / cell) + (y / cell)) % 2 == 0 {
                [230, 230, 230, 255]
            } else {
                [40, 40, 40, 255]
            }
        })
        .collect()
}
