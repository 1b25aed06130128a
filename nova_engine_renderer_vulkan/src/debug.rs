//! Validation layer plumbing
//!
//! Routes `VK_EXT_debug_utils` messages into the engine log system and
//! provides debug object naming so validation messages reference readable
//! names instead of raw handles.

use ash::vk;
use nova_engine::log::{dispatch, LogSeverity};
use nova_engine::nova::Result;
use nova_engine::nova_err;
use std::borrow::Cow;
use std::ffi::{c_void, CStr, CString};

/// Debug messenger wrapper, present only when validation is enabled
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let messenger = unsafe {
            loader
                .create_debug_utils_messenger(&debug_info, None)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to create debug messenger: {:?}", e)
                })?
        };

        Ok(Self { loader, messenger })
    }

    /// Called from `GraphicsContext` teardown, after the device is gone but
    /// before the instance is destroyed
    pub fn destroy(&self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        let data = *callback_data;
        if data.p_message.is_null() {
            Cow::Borrowed("<no message>")
        } else {
            CStr::from_ptr(data.p_message).to_string_lossy()
        }
    };

    let severity = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => LogSeverity::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => LogSeverity::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => LogSeverity::Debug,
        _ => LogSeverity::Trace,
    };

    dispatch(
        severity,
        "nova::vulkan::validation",
        format!("[{:?}] {}", message_type, message),
    );

    // Never abort the call that triggered the message
    vk::FALSE
}

/// Attach a human-readable name to a Vulkan object
///
/// No-op when validation (and thus debug_utils) is not loaded; naming is
/// diagnostic only and never an error path.
pub fn set_object_name<H: vk::Handle>(
    debug_device: Option<&ash::ext::debug_utils::Device>,
    handle: H,
    name: &str,
) {
    let Some(debug_device) = debug_device else {
        return;
    };
    let Ok(name) = CString::new(name) else {
        return;
    };
    let name_info = vk::DebugUtilsObjectNameInfoEXT::default()
        .object_handle(handle)
        .object_name(&name);
    unsafe {
        let _ = debug_device.set_debug_utils_object_name(&name_info);
    }
}
