//! Vulkan instance, validation layer and debug messenger

use super::{VulkanError, VulkanResult};
use crate::config::AppConfig;
use crate::spock::{ENGINE_NAME, ENGINE_VERSION};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Mutex;

const KHRONOS_VALIDATION: &str = "VK_LAYER_KHRONOS_validation";
const LUNARG_VALIDATION: &str = "VK_LAYER_LUNARG_standard_validation";

/// Validation warnings and errors waiting to reach an error hook.
///
/// The debug messenger may fire on any thread that calls into Vulkan, so
/// messages are queued here and handed out by [`VulkanInstance::take_validation_messages`].
#[derive(Debug, Default)]
pub struct ValidationQueue {
    messages: Mutex<Vec<String>>,
}

impl ValidationQueue {
    /// Queue a message
    pub fn push(&self, message: String) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }

    /// Take every queued message, oldest first
    pub fn drain(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|mut messages| std::mem::take(&mut *messages))
            .unwrap_or_default()
    }
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    // boxed so the messenger's user data pointer stays put when the instance moves
    validation: Box<ValidationQueue>,
}

impl VulkanInstance {
    /// Load Vulkan and create an instance carrying the window system's
    /// extensions, plus validation and debug-utils when `app.debug` is set
    pub fn new(glfw: &glfw::Glfw, app: &AppConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::Loading(e.to_string()))?;

        let app_name = CString::new(app.name.as_str())
            .map_err(|e| VulkanError::InitializationFailed(format!("Bad application name: {e}")))?;
        let engine_name = CString::new(ENGINE_NAME)
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let (major, minor, patch) = app.version;
        let (eng_major, eng_minor, eng_patch) = ENGINE_VERSION;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, eng_major, eng_minor, eng_patch))
            .api_version(vk::API_VERSION_1_0);

        let required = glfw.get_required_instance_extensions().ok_or_else(|| {
            VulkanError::InitializationFailed("GLFW reports no Vulkan support".to_string())
        })?;
        let mut extension_names = required
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let mut layer_names = Vec::new();
        if app.debug {
            let available = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
            let layer = pick_validation_layer(&available).ok_or(VulkanError::MissingValidationLayer)?;
            log::info!("Using validation layer {}", layer);
            layer_names.push(
                CString::new(layer).map_err(|e| VulkanError::InitializationFailed(e.to_string()))?,
            );
            extension_names.push(DebugUtils::name().to_owned());
        }

        for ext in &extension_names {
            log::debug!("Instance extension: {}", ext.to_string_lossy());
        }

        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };

        let validation = Box::new(ValidationQueue::default());
        let (debug_utils, debug_messenger) = if app.debug {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils, &validation) {
                Ok(messenger) => (Some(debug_utils), Some(messenger)),
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            }
        } else {
            (None, None)
        };

        log::info!(
            "Vulkan instance created for {} {}.{}.{}",
            app.name,
            major,
            minor,
            patch
        );

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            validation,
        })
    }

    fn setup_debug_messenger(
        debug_utils: &DebugUtils,
        validation: &ValidationQueue,
    ) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let user_data = (validation as *const ValidationQueue).cast_mut().cast::<c_void>();
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
            .user_data(user_data);

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Validation warnings and errors reported since the last call
    pub fn take_validation_messages(&self) -> Vec<String> {
        self.validation.drain()
    }

    /// Detach the debug messenger; later calls do nothing
    pub fn destroy_debug_messenger(&mut self) {
        if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger.take()) {
            unsafe {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        self.destroy_debug_messenger();
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    let (level, to_hook) = message_route(message_severity);
    log::log!(level, "[Vulkan] {:?} - {}", message_type, message);

    if to_hook && !user_data.is_null() {
        let queue = &*user_data.cast::<ValidationQueue>();
        queue.push(format!("[{:?}][{:?}] {}", message_severity, message_type, message));
    }

    vk::FALSE
}

/// Log level for a validation message, and whether it goes to the error hook.
///
/// Warnings and errors reach the hook; info and verbose chatter is only logged.
pub fn message_route(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> (log::Level, bool) {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

    if severity.contains(Severity::ERROR) {
        (log::Level::Error, true)
    } else if severity.contains(Severity::WARNING) {
        (log::Level::Warn, true)
    } else if severity.contains(Severity::INFO) {
        (log::Level::Info, false)
    } else {
        (log::Level::Trace, false)
    }
}

/// Read a nul-terminated fixed-size name array out of a Vulkan struct
pub fn vk_string(raw: &[c_char]) -> String {
    #[allow(clippy::cast_sign_loss)]
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Choose the validation layer to enable.
///
/// The Khronos layer wins, then the old LunarG meta layer, then anything
/// describing itself as standard validation.
pub fn pick_validation_layer(layers: &[vk::LayerProperties]) -> Option<String> {
    let named: Vec<(String, String)> = layers
        .iter()
        .map(|l| (vk_string(&l.layer_name), vk_string(&l.description)))
        .collect();

    for wanted in [KHRONOS_VALIDATION, LUNARG_VALIDATION] {
        if named.iter().any(|(name, _)| name == wanted) {
            return Some(wanted.to_string());
        }
    }

    named
        .into_iter()
        .find(|(_, desc)| desc.contains("Standard Validation"))
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(dst: &mut [c_char], src: &str) {
        for (d, s) in dst.iter_mut().zip(src.bytes()) {
            *d = s as c_char;
        }
    }

    fn layer(name: &str, desc: &str) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        fill(&mut props.layer_name, name);
        fill(&mut props.description, desc);
        props
    }

    #[test]
    fn test_khronos_layer_preferred() {
        let layers = [
            layer(LUNARG_VALIDATION, "LunarG Standard Validation"),
            layer("VK_LAYER_MESA_overlay", "Mesa overlay"),
            layer(KHRONOS_VALIDATION, "Khronos Validation Layer"),
        ];
        assert_eq!(pick_validation_layer(&layers).as_deref(), Some(KHRONOS_VALIDATION));
    }

    #[test]
    fn test_lunarg_fallback() {
        let layers = [
            layer("VK_LAYER_MESA_overlay", "Mesa overlay"),
            layer(LUNARG_VALIDATION, "LunarG Standard Validation"),
        ];
        assert_eq!(pick_validation_layer(&layers).as_deref(), Some(LUNARG_VALIDATION));
    }

    #[test]
    fn test_description_fallback() {
        let layers = [
            layer("VK_LAYER_VENDOR_checks", "Vendor Standard Validation"),
            layer("VK_LAYER_MESA_overlay", "Mesa overlay"),
        ];
        assert_eq!(
            pick_validation_layer(&layers).as_deref(),
            Some("VK_LAYER_VENDOR_checks")
        );
    }

    #[test]
    fn test_no_validation_layer() {
        let layers = [layer("VK_LAYER_MESA_overlay", "Mesa overlay")];
        assert_eq!(pick_validation_layer(&layers), None);
        assert_eq!(pick_validation_layer(&[]), None);
    }

    #[test]
    fn test_message_route_by_severity() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(message_route(Severity::ERROR), (log::Level::Error, true));
        assert_eq!(message_route(Severity::WARNING), (log::Level::Warn, true));
        assert_eq!(message_route(Severity::INFO), (log::Level::Info, false));
        assert_eq!(message_route(Severity::VERBOSE), (log::Level::Trace, false));
    }

    fn call_messenger(queue: &ValidationQueue, severity: vk::DebugUtilsMessageSeverityFlagsEXT, text: &str) {
        let message = CString::new(text).unwrap();
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: message.as_ptr(),
            ..Default::default()
        };
        let user_data = (queue as *const ValidationQueue).cast_mut().cast::<c_void>();
        let result = unsafe {
            debug_callback(severity, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, &data, user_data)
        };
        assert_eq!(result, vk::FALSE);
    }

    #[test]
    fn test_messenger_queues_errors_for_the_hook() {
        let queue = ValidationQueue::default();
        call_messenger(&queue, vk::DebugUtilsMessageSeverityFlagsEXT::INFO, "loader chatter");
        call_messenger(&queue, vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, "vkQueueSubmit bad fence");
        call_messenger(&queue, vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, "slow path");

        let messages = queue.drain();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("vkQueueSubmit bad fence"));
        assert!(messages[1].contains("slow path"));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_messenger_without_user_data_only_logs() {
        let message = CString::new("no queue").unwrap();
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: message.as_ptr(),
            ..Default::default()
        };
        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                &data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }

    #[test]
    fn test_vk_string_stops_at_nul() {
        let mut raw = [0 as c_char; 16];
        fill(&mut raw, "GeForce");
        assert_eq!(vk_string(&raw), "GeForce");
    }
}
