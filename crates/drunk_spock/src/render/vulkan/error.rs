//! Vulkan error types

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader could not be found or loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Debug mode was requested but no validation layer is installed
    #[error("No validation layer available")]
    MissingValidationLayer,

    /// A window surface is needed but none was created
    #[error("No window surface has been created")]
    NoSurface,

    /// A logical device is needed but none was created
    #[error("No logical device has been created")]
    NoLogicalDevice,

    /// A swapchain is needed but none was created
    #[error("No swapchain has been created")]
    NoSwapchain,

    /// Physical device index past the enumerated devices
    #[error("Physical device index {index} out of range ({count} devices)")]
    PhysicalIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of physical devices
        count: usize,
    },

    /// Queue family index past the device's families
    #[error("Bad queue family index: {family}")]
    BadQueueFamily {
        /// Requested family
        family: u32,
    },

    /// Queue index past the family's queue count
    #[error("Bad queue index {index} for family {family}")]
    BadQueueIndex {
        /// Queue family
        family: u32,
        /// Requested queue index
        index: u32,
    },

    /// A named resource already exists
    #[error("{kind} name already in use: {name}")]
    NameInUse {
        /// Kind of resource (queue, buffer, shader)
        kind: &'static str,
        /// The duplicate name
        name: String,
    },

    /// A named resource does not exist
    #[error("No {kind} named: {name}")]
    UnknownName {
        /// Kind of resource (queue, buffer, memory, pool)
        kind: &'static str,
        /// The missing name
        name: String,
    },

    /// The buffer already owns a memory allocation
    #[error("Buffer {name} already has a chunk of memory allocated")]
    MemoryAlreadyAllocated {
        /// Buffer name
        name: String,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// The surface reports no formats or present modes
    #[error("Bad surface support: {0}")]
    BadSurfaceSupport(String),

    /// A shader file could not be turned into a module
    #[error("Failed to load shader {path}: {reason}")]
    ShaderLoad {
        /// Shader file path
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_resource() {
        let err = VulkanError::UnknownName { kind: "buffer", name: "verts".to_string() };
        assert_eq!(err.to_string(), "No buffer named: verts");

        let err = VulkanError::BadQueueIndex { family: 2, index: 5 };
        assert_eq!(err.to_string(), "Bad queue index 5 for family 2");
    }

    #[test]
    fn test_from_vk_result() {
        let err: VulkanError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(err, VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));
    }
}
