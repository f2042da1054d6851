// Buffer utilities for vertex, index, uniform and staging buffers
//
// A `Buffer` owns its `vk::Buffer` and the `vk::DeviceMemory` bound to it.
// The two are created together and released together when the buffer drops.

use ash::vk;
use std::sync::Arc;
use super::command::CommandPool;
use super::error::{RenderError, Result};
use super::VulkanDevice;

/// GPU buffer with its bound device memory
pub struct Buffer {
    pub handle: vk::Buffer,
    pub memory: vk::DeviceMemory,
    /// Size requested by the caller
    pub size: vk::DeviceSize,
    /// Size of the backing allocation (>= `size`)
    pub allocation_size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub properties: vk::MemoryPropertyFlags,
    device: Arc<VulkanDevice>,
}

impl Buffer {
    /// Create a GPU buffer with specified usage and memory properties
    pub fn new(
        device: &Arc<VulkanDevice>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        check_buffer_size(size)?;
        let vk_device = &device.device;

        // Create buffer
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { vk_device.create_buffer(&buffer_info, None)? };

        // Everything below must release `buffer` on failure so the pair never half-exists
        let allocated = (|| -> Result<(vk::DeviceMemory, vk::DeviceSize)> {
            let mem_requirements = unsafe { vk_device.get_buffer_memory_requirements(buffer) };

            let memory_type_index = device.find_memory_type(
                mem_requirements.memory_type_bits,
                properties,
            )?;

            let alloc_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(mem_requirements.size)
                .memory_type_index(memory_type_index);

            let memory = unsafe { vk_device.allocate_memory(&alloc_info, None)? };

            if let Err(e) = unsafe { vk_device.bind_buffer_memory(buffer, memory, 0) } {
                unsafe { vk_device.free_memory(memory, None) };
                return Err(RenderError::from(e));
            }

            Ok((memory, mem_requirements.size))
        })();

        let (memory, allocation_size) = match allocated {
            Ok(pair) => pair,
            Err(e) => {
                unsafe { vk_device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        log::debug!(
            "Created buffer: {} bytes ({} allocated), usage {:?}",
            size, allocation_size, usage
        );

        Ok(Self {
            handle: buffer,
            memory,
            size,
            allocation_size,
            usage,
            properties,
            device: device.clone(),
        })
    }

    /// Create a host-visible buffer and fill it with data
    pub fn with_data<T: bytemuck::Pod>(
        device: &Arc<VulkanDevice>,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);

        let buffer = Self::new(
            device,
            bytes.len() as vk::DeviceSize,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(0, bytes)?;

        Ok(buffer)
    }

    /// Upload `data` into a new device-local buffer through a staging buffer.
    ///
    /// Blocks until the copy has completed on the GPU; the staging buffer is
    /// released before returning.
    pub fn device_local_with_data(
        commands: &CommandPool,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<Self> {
        let device = commands.device();

        let staging = Self::with_data(device, vk::BufferUsageFlags::TRANSFER_SRC, data)?;

        let buffer = Self::new(
            device,
            data.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        copy_buffer(commands, &staging, &buffer, staging.size)?;

        Ok(buffer)
    }

    fn check_range(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> Result<()> {
        if !self.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(RenderError::NotHostVisible);
        }
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(RenderError::BufferOverflow {
                offset,
                len,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Map, copy `bytes` at `offset`, unmap
    pub fn write_bytes(&self, offset: vk::DeviceSize, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as vk::DeviceSize;
        self.check_range(offset, len)?;
        if bytes.is_empty() {
            return Ok(());
        }

        unsafe {
            let ptr = self.device.device.map_memory(
                self.memory,
                offset,
                len,
                vk::MemoryMapFlags::empty(),
            )? as *mut u8;

            ptr.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
            self.device.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Map and copy `len` bytes starting at `offset` back to the host
    pub fn read_bytes(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut out = vec![0u8; len as usize];
        if out.is_empty() {
            return Ok(out);
        }

        unsafe {
            let ptr = self.device.device.map_memory(
                self.memory,
                offset,
                len,
                vk::MemoryMapFlags::empty(),
            )? as *const u8;

            ptr.copy_to_nonoverlapping(out.as_mut_ptr(), out.len());
            self.device.device.unmap_memory(self.memory);
        }

        Ok(out)
    }

    /// Whole-buffer descriptor info, for uniform/storage bindings
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle,
            offset: 0,
            range: self.size,
        }
    }

    /// Release the buffer and its memory now instead of at end of scope
    pub fn destroy(self) {}
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            // Buffer first, then the memory bound to it
            self.device.device.destroy_buffer(self.handle, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

/// Record and wait on a `size`-byte copy from `src` to `dst`
pub fn copy_buffer(
    commands: &CommandPool,
    src: &Buffer,
    dst: &Buffer,
    size: vk::DeviceSize,
) -> Result<()> {
    if size > src.size || size > dst.size {
        return Err(RenderError::BufferOverflow {
            offset: 0,
            len: size,
            size: src.size.min(dst.size),
        });
    }

    commands.one_time_submit(|device, cmd| {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe { device.cmd_copy_buffer(cmd, src.handle, dst.handle, &[region]) };
    })
}

/// Typed view over a texel buffer
pub struct BufferView {
    pub handle: vk::BufferView,
    pub format: vk::Format,
    device: Arc<VulkanDevice>,
}

impl BufferView {
    pub fn new(
        buffer: &Buffer,
        format: vk::Format,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Result<Self> {
        let view_info = vk::BufferViewCreateInfo::builder()
            .buffer(buffer.handle)
            .format(format)
            .offset(offset)
            .range(range);

        let handle = unsafe { buffer.device.device.create_buffer_view(&view_info, None)? };

        Ok(Self {
            handle,
            format,
            device: buffer.device.clone(),
        })
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_buffer_view(self.handle, None) };
    }
}

fn check_buffer_size(size: vk::DeviceSize) -> Result<()> {
    if size == 0 {
        return Err(RenderError::ZeroSizedBuffer);
    }
    Ok(())
}
