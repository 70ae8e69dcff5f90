//! # DrunkSpock
//!
//! A small object-oriented skeleton over Vulkan (through `ash`) and GLFW.
//!
//! ## Pieces
//!
//! - [`DrunkSpock`]: Vulkan instance, validation messenger and window surface
//! - [`render::vulkan::Devices`]: physical device examination, logical device,
//!   named queues and command pools, swapchain, named buffers, descriptors
//! - [`render::vulkan::PipeLine`]: shaders, render pass, fixed graphics pipeline,
//!   framebuffers and the frames-in-flight draw loop
//! - [`render::window::GameWindow`]: GLFW window placement, fixed-rate game and
//!   render tics, keyboard events fed into an [`input_map::Input`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drunk_spock::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut spock = DrunkSpock::init_vulkan(&config.app)?;
//!     let window: GameWindow = GameWindow::new(&spock, &config.window, config.timing.clone())?;
//!     spock.create_window_surface(&window)?;
//!
//!     let mut devices = Devices::new(&spock)?;
//!     let phys = devices.suitable_device_index().ok_or("no usable GPU")?;
//!     let (graphics, present) = devices.graphics_present_families(phys).ok_or("no queues")?;
//!     let mut requests = vec![QueueRequest::single(graphics)];
//!     if present != graphics {
//!         requests.push(QueueRequest::single(present));
//!     }
//!     devices.create_logical_device(phys, &requests, &[], None)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

mod spock;

pub use spock::{DrunkSpock, ENGINE_NAME, ENGINE_VERSION};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        DrunkSpock,
        config::{AppConfig, Config, EngineConfig, RenderConfig, TimingConfig, WindowConfig},
        foundation::{hook::EventHook, time::TicScheduler},
        render::vulkan::{
            Acquired, Devices, FrameStatus, PipeLine, PresentOutcome, QueueRequest,
            VulkanError, VulkanResult,
        },
        render::window::{GameLoopHandler, GameWindow, KeyInput, WindowError},
    };
    pub use input_map::{ActionType, Input, InputAction, KeyState};
}
