// Per-frame uniform buffers
//
// One host-visible, host-coherent buffer per frame in flight. Frame `k`
// only ever touches buffer `k mod N`, so the CPU never rewrites a buffer
// the GPU may still be reading for an earlier frame.

use ash::vk;
use std::sync::Arc;
use super::buffer::Buffer;
use super::descriptor::DescriptorWrite;
use super::error::{RenderError, Result};
use super::VulkanDevice;

pub struct UniformBuffers {
    /// Fixed length, one per frame slot
    buffers: Vec<Buffer>,
    size: vk::DeviceSize,
}

impl UniformBuffers {
    /// Create `frames_in_flight` independent buffers of `size` bytes
    pub fn new(
        device: &Arc<VulkanDevice>,
        frames_in_flight: usize,
        size: vk::DeviceSize,
    ) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(RenderError::InvalidConfig(
                "uniform buffers need at least one frame in flight".to_string(),
            ));
        }

        // Coherent memory: rewritten by the CPU every frame with no flush/invalidate
        let buffers = (0..frames_in_flight)
            .map(|_| {
                Buffer::new(
                    device,
                    size,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("Created {} uniform buffers of {} bytes", frames_in_flight, size);

        Ok(Self { buffers, size })
    }

    /// Buffers sized for one `T`
    pub fn for_type<T: bytemuck::Pod>(
        device: &Arc<VulkanDevice>,
        frames_in_flight: usize,
    ) -> Result<Self> {
        Self::new(device, frames_in_flight, std::mem::size_of::<T>() as vk::DeviceSize)
    }

    pub fn frames(&self) -> usize {
        self.buffers.len()
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Buffer used by `frame` (any monotonically increasing frame counter works)
    pub fn buffer(&self, frame: usize) -> &Buffer {
        &self.buffers[frame % self.buffers.len()]
    }

    pub fn handles(&self) -> Vec<vk::Buffer> {
        self.buffers.iter().map(|b| b.handle).collect()
    }

    /// Copy raw bytes into the buffer for `frame`.
    ///
    /// The caller must have waited on that frame slot's fence.
    pub fn update(&self, frame: usize, bytes: &[u8]) -> Result<()> {
        self.buffer(frame).write_bytes(0, bytes)
    }

    pub fn update_value<T: bytemuck::Pod>(&self, frame: usize, value: &T) -> Result<()> {
        self.update(frame, bytemuck::bytes_of(value))
    }

    /// Read back the current contents of the buffer for `frame`
    pub fn read(&self, frame: usize) -> Result<Vec<u8>> {
        self.buffer(frame).read_bytes(0, self.size)
    }

    /// Uniform-buffer write for `binding` pointing at `frame`'s buffer
    pub fn descriptor_write(&self, frame: usize, binding: u32) -> DescriptorWrite {
        DescriptorWrite::uniform_buffer(binding, self.buffer(frame))
    }

    /// Destroy every per-frame buffer. Device must be idle with respect to them.
    pub fn destroy(self) {}
}
