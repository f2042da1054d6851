// Command pool and one-time submissions
//
// Transfers and mipmap generation record into a throwaway primary command
// buffer, submit it to the graphics queue and block on a fence until the
// GPU is done.

use ash::vk;
use std::sync::Arc;
use super::error::Result;
use super::VulkanDevice;

/// Command pool bound to the device's graphics queue family
pub struct CommandPool {
    pub pool: vk::CommandPool,
    device: Arc<VulkanDevice>,
}

impl CommandPool {
    pub fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            // TRANSIENT: Command buffers are short-lived
            // RESET: Allow individual buffer reset
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None)? };

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    /// Allocate `count` primary command buffers
    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        Ok(unsafe { self.device.device.allocate_command_buffers(&alloc_info)? })
    }

    /// Record commands with `record`, submit them, and wait for completion.
    ///
    /// Returns only after the GPU has finished executing the commands, so any
    /// resource written by them is ready for use.
    pub fn one_time_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let device = &self.device.device;
        let cmd = self.allocate(1)?[0];

        let result = self.record_and_wait(cmd, record);

        unsafe { device.free_command_buffers(self.pool, &[cmd]) };
        result
    }

    fn record_and_wait<F>(&self, cmd: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let device = &self.device.device;

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        record(device, cmd);

        unsafe {
            device.end_command_buffer(cmd)?;

            let fence = device.create_fence(&vk::FenceCreateInfo::builder(), None)?;
            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

            let submitted = device
                .queue_submit(self.device.graphics_queue, &[submit_info.build()], fence)
                .and_then(|_| device.wait_for_fences(&[fence], true, u64::MAX));

            device.destroy_fence(fence, None);
            submitted?;
        }

        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Also frees every command buffer allocated from it
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}
