//! Top-level Vulkan context

use crate::config::AppConfig;
use crate::foundation::hook::EventHook;
use crate::render::vulkan::{VulkanError, VulkanInstance, VulkanResult};
use crate::render::window::{GameWindow, WindowError};
use ash::extensions::khr::Surface;
use ash::{vk, Entry, Instance};
use std::cell::RefCell;

/// Engine name reported to the driver
pub const ENGINE_NAME: &str = "GrogLibs";

/// Engine version reported to the driver (major, minor, patch)
pub const ENGINE_VERSION: (u32, u32, u32) = (0, 4, 0);

/// GLFW, the Vulkan instance with its validation messenger, and the window surface.
///
/// Everything else borrows handles from here, so it must be dropped last.
pub struct DrunkSpock {
    glfw: glfw::Glfw,
    instance: VulkanInstance,
    surface_loader: Surface,
    surface: Option<vk::SurfaceKHR>,
    error_hook: RefCell<EventHook<String>>,
}

impl DrunkSpock {
    /// Initialise GLFW and create the Vulkan instance
    pub fn init_vulkan(app: &AppConfig) -> VulkanResult<Self> {
        let glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| VulkanError::InitializationFailed(format!("GLFW init failed: {e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(VulkanError::InitializationFailed(
                "GLFW found no Vulkan loader".to_string(),
            ));
        }

        let instance = VulkanInstance::new(&glfw, app)?;
        let surface_loader = Surface::new(instance.entry(), instance.instance());

        Ok(Self {
            glfw,
            instance,
            surface_loader,
            surface: None,
            error_hook: RefCell::new(EventHook::new()),
        })
    }

    /// [`Self::init_vulkan`] with the default application settings
    pub fn init_vulkan_default() -> VulkanResult<Self> {
        Self::init_vulkan(&AppConfig::default())
    }

    /// Create the presentation surface for `window`
    pub fn create_window_surface<A>(&mut self, window: &GameWindow<A>) -> VulkanResult<()> {
        if self.surface.is_some() {
            return Err(self.fail(VulkanError::InvalidOperation {
                reason: "Window surface already created".to_string(),
            }));
        }

        let surface = window
            .create_surface(self.instance.instance().handle())
            .map_err(|e| {
                self.fail(match e {
                    WindowError::Surface(result) => VulkanError::Api(result),
                    other => VulkanError::InvalidOperation {
                        reason: other.to_string(),
                    },
                })
            })?;

        log::info!("Window surface created");
        self.surface = Some(surface);
        self.pump_validation_messages();
        Ok(())
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        self.instance.instance()
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        self.instance.entry()
    }

    /// Window surface, once created
    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// GLFW handle
    pub fn glfw(&self) -> &glfw::Glfw {
        &self.glfw
    }

    /// Receive every error message
    pub fn set_error_hook(&mut self, hook: impl FnMut(&String) + 'static) {
        self.error_hook.get_mut().set(hook);
    }

    /// Log an error message and pass it to the error hook
    pub fn error_spew(&self, msg: &str) {
        log::error!("{}", msg);
        self.send_to_hook(msg.to_string());
    }

    /// Hand validation warnings and errors queued by the debug messenger to
    /// the error hook; returns how many there were.
    ///
    /// They were logged when reported, so they are not logged again.
    pub fn pump_validation_messages(&self) -> usize {
        let messages = self.instance.take_validation_messages();
        let count = messages.len();
        for msg in messages {
            self.send_to_hook(msg);
        }
        count
    }

    fn send_to_hook(&self, msg: String) {
        if let Ok(mut hook) = self.error_hook.try_borrow_mut() {
            hook.invoke(&msg);
        }
    }

    fn fail(&self, err: VulkanError) -> VulkanError {
        self.error_spew(&err.to_string());
        err
    }
}

impl Drop for DrunkSpock {
    fn drop(&mut self) {
        self.instance.destroy_debug_messenger();
        if let Some(surface) = self.surface.take() {
            unsafe {
                self.surface_loader.destroy_surface(surface, None);
            }
        }
        // instance goes when the field drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_identity() {
        assert_eq!(ENGINE_NAME, "GrogLibs");
        assert_eq!(ENGINE_VERSION, (0, 4, 0));
    }
}
