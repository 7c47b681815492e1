//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, and the per-frame bundle the
//! frame loop rotates through. Fence waits are always bounded; an expired
//! wait surfaces as [`VulkanError::Timeout`] rather than hanging the caller.

use ash::{vk, Device};
use crate::render::vulkan::{VulkanResult, VulkanError};

/// GPU-GPU synchronization primitive with automatic resource management
///
/// Signaled by one queue operation and waited on by another:
/// - Image acquisition signals → Rendering waits
/// - Rendering signals → Presentation waits
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device.create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
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
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device.create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait for the fence to signal, giving up after `timeout_ns`
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        let result = unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) };
        map_wait_result(result, "in-flight fence", timeout_ns)
    }

    /// Reset fence
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device.reset_fences(&[self.fence])
                .map_err(VulkanError::from)
        }
    }

    /// Get the fence handle
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

/// Translate the raw outcome of a bounded wait
pub(crate) fn map_wait_result(
    result: Result<(), vk::Result>,
    what: &'static str,
    timeout_ns: u64,
) -> VulkanResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(VulkanError::Timeout { what, timeout_ns }),
        Err(other) => Err(VulkanError::from(other)),
    }
}

/// Frame synchronization objects for in-flight frame management
///
/// The fence starts signaled so the first wait on each slot returns at once.
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: Semaphore,
    /// Signaled when rendering into the image has completed
    pub render_finished: Semaphore,
    /// Signaled when the slot's last submission retired
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// One bundle per frame slot
    pub fn create_frames(device: &Device, count: usize) -> VulkanResult<Vec<Self>> {
        (0..count).map(|_| Self::new(device.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_wait_becomes_timeout() {
        let err = map_wait_result(Err(vk::Result::TIMEOUT), "in-flight fence", 5_000).unwrap_err();
        match err {
            VulkanError::Timeout { what, timeout_ns } => {
                assert_eq!(what, "in-flight fence");
                assert_eq!(timeout_ns, 5_000);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn lost_device_during_wait_is_reported() {
        let err = map_wait_result(Err(vk::Result::ERROR_DEVICE_LOST), "fence", 1).unwrap_err();
        assert!(matches!(err, VulkanError::DeviceLost));
    }

    #[test]
    fn successful_wait_passes_through() {
        assert!(map_wait_result(Ok(()), "fence", 1).is_ok());
    }
}
