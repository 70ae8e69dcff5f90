//! Semaphores, fences and the frames-in-flight ring

use super::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Semaphore wrapper with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe { device.create_fence(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, fence })
    }

    /// Block until signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(VulkanError::Api) }
    }

    /// Get fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Per-frame synchronization objects
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: Semaphore,
    /// Signaled when the GPU finished the frame's commands
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the objects for one frame slot; the fence starts signaled
    pub fn new(device: Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

/// Which frame slot is current, and which fence last used each swapchain image
#[derive(Debug, Clone)]
pub struct FrameRing {
    frames: usize,
    current: usize,
    images_in_flight: Vec<Option<usize>>,
}

impl FrameRing {
    /// Ring of `frames` slots (at least one) over `image_count` swapchain images
    pub fn new(frames: usize, image_count: usize) -> Self {
        Self {
            frames: frames.max(1),
            current: 0,
            images_in_flight: vec![None; image_count],
        }
    }

    /// Slot recorded this frame
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of slots
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Move to the next slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames;
    }

    /// Claim `image` for the current slot, returning the slot that owned it
    /// before when that was a different one
    pub fn claim_image(&mut self, image: usize) -> Option<usize> {
        let slot = self.images_in_flight.get_mut(image)?;
        let previous = slot.replace(self.current);
        previous.filter(|&p| p != self.current)
    }

    /// Forget image ownership after the swapchain changed
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight = vec![None; image_count];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_wraps() {
        let mut ring = FrameRing::new(2, 3);
        assert_eq!(ring.current(), 0);
        ring.advance();
        assert_eq!(ring.current(), 1);
        ring.advance();
        assert_eq!(ring.current(), 0);
    }

    #[test]
    fn test_zero_frames_means_one() {
        let mut ring = FrameRing::new(0, 2);
        assert_eq!(ring.frames(), 1);
        ring.advance();
        assert_eq!(ring.current(), 0);
    }

    #[test]
    fn test_claim_image_reports_other_owner() {
        let mut ring = FrameRing::new(2, 3);
        assert_eq!(ring.claim_image(0), None);
        ring.advance();
        // slot 1 takes image 0 while slot 0 may still be rendering to it
        assert_eq!(ring.claim_image(0), Some(0));
        ring.advance();
        assert_eq!(ring.claim_image(2), None);
        ring.advance();
        // same slot reclaiming its own image
        assert_eq!(ring.claim_image(0), None);
        assert_eq!(ring.claim_image(9), None);
    }

    #[test]
    fn test_reset_images() {
        let mut ring = FrameRing::new(2, 2);
        ring.claim_image(1);
        ring.advance();
        ring.reset_images(4);
        assert_eq!(ring.claim_image(1), None);
        assert_eq!(ring.claim_image(3), None);
    }
}
