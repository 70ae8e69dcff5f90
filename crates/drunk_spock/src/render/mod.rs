//! Rendering module
//!
//! Vulkan object wrappers and the GLFW game window.

pub mod vulkan;
pub mod window;
