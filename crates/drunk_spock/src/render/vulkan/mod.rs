//! Vulkan backend
//!
//! RAII wrappers over `ash` objects plus the two stateful pieces applications
//! drive directly: [`Devices`] and [`PipeLine`].

pub mod commands;
pub mod descriptors;
pub mod devices;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod queue_family;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use commands::CommandPool;
pub use devices::{Acquired, Devices, PresentOutcome, QueueRequest};
pub use error::{VulkanError, VulkanResult};
pub use instance::{message_route, pick_validation_layer, ValidationQueue, VulkanInstance};
pub use pipeline::{FrameStatus, PipeLine};
pub use queue_family::QueueFamilyTable;
pub use shader::ShaderModule;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameRing, FrameSync, Semaphore};
