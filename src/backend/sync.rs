// Frame-in-flight synchronization
//
// One fence per frame slot. Before the CPU touches slot k's uniform
// buffers it waits on slot k's fence, i.e. on the GPU finishing the last
// frame that used that slot.

use ash::vk;
use std::sync::Arc;
use super::error::{RenderError, Result};
use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        Ok(Self {
            in_flight_fence: unsafe { device.device.create_fence(&fence_info, None)? },
        })
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Ring of `FrameSync`, advancing `current_frame mod N`
pub struct FrameRing {
    frames: Vec<FrameSync>,
    current: usize,
    device: Arc<VulkanDevice>,
}

impl FrameRing {
    pub fn new(device: &Arc<VulkanDevice>, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(RenderError::InvalidConfig(
                "max_frames_in_flight must be at least 1".to_string(),
            ));
        }

        let mut frames = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            match FrameSync::new(device) {
                Ok(sync) => frames.push(sync),
                Err(e) => {
                    for sync in &frames {
                        sync.destroy(&device.device);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            frames,
            current: 0,
            device: device.clone(),
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Block until the GPU is done with the current slot, then reset its fence.
    ///
    /// Returns the slot index; its uniform buffers are safe to rewrite.
    pub fn begin_frame(&self) -> Result<usize> {
        let fence = self.frames[self.current].in_flight_fence;
        unsafe {
            self.device.device.wait_for_fences(&[fence], true, u64::MAX)?;
            self.device.device.reset_fences(&[fence])?;
        }
        Ok(self.current)
    }

    /// Fence to signal from this frame's queue submission
    pub fn fence(&self) -> vk::Fence {
        self.frames[self.current].in_flight_fence
    }

    pub fn advance(&mut self) {
        self.current = next_slot(self.current, self.frames.len());
    }
}

impl Drop for FrameRing {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
        for sync in &self.frames {
            sync.destroy(&self.device.device);
        }
    }
}

fn next_slot(current: usize, frames: usize) -> usize {
    (current + 1) % frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_wrap_around() {
        let order: Vec<usize> = std::iter::successors(Some(0), |&s| Some(next_slot(s, 3)))
            .take(7)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn single_slot_stays_put() {
        assert_eq!(next_slot(0, 1), 0);
    }
}
