//! Shared graphics context
//!
//! `GraphicsContext` owns the Vulkan instance, surface, logical device and
//! queue handles. Every other component holds it behind an `Arc`, so the
//! context is always dropped last and teardown order stays correct without
//! any manual sequencing at the call sites.

use ash::vk;
use nova_engine::nova::{Config, Error, Result};
use nova_engine::{nova_err, nova_info, nova_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};

use crate::debug;
use crate::vulkan_device::{
    self, DeviceCapabilities, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS,
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Shared GPU context
///
/// Owns instance, surface, debug messenger, and logical device. Queue
/// handles are retrieved once at init; roles without a dedicated family
/// alias the graphics queue.
pub struct GraphicsContext {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    debug_utils: Option<debug::DebugMessenger>,
    debug_device: Option<ash::ext::debug_utils::Device>,

    physical_device: vk::PhysicalDevice,
    device_properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    capabilities: DeviceCapabilities,
    device: ash::Device,

    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    compute_queue: vk::Queue,
    transfer_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl GraphicsContext {
    /// Initialize the full context against a window
    ///
    /// Instance, surface, physical device pick, logical device and queue
    /// retrieval in one pass. Any failure tears down what was already
    /// created and is fatal to the caller.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                nova_err!("nova::vulkan", "Failed to load Vulkan library: {:?}", e)
            })?;

            let enable_validation =
                config.enable_validation && Self::validation_layer_available(&entry)?;
            if config.enable_validation && !enable_validation {
                nova_warn!(
                    "nova::vulkan",
                    "Validation layer requested but not available, continuing without it"
                );
            }

            let app_name = CString::new(config.app_name.as_str()).map_err(|_| {
                Error::InvalidUsage("Application name contains a NUL byte".to_string())
            })?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Nova")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle().map_err(|e| {
                nova_err!("nova::vulkan", "Failed to get display handle: {}", e)
            })?;
            let mut extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| {
                        nova_err!("nova::vulkan", "Failed to get required extensions: {}", e)
                    })?
                    .to_vec();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            Self::verify_instance_extensions(&entry, &extension_names)?;

            let layer_names = if enable_validation {
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                nova_err!("nova::vulkan", "Failed to create Vulkan instance: {:?}", e)
            })?;

            let debug_utils = if enable_validation {
                match debug::DebugMessenger::new(&entry, &instance) {
                    Ok(messenger) => Some(messenger),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            // Cleanup for the init path only; Drop covers everything after
            // construction succeeds.
            let destroy_partial = |instance: &ash::Instance,
                                   debug_utils: &Option<debug::DebugMessenger>,
                                   surface: Option<vk::SurfaceKHR>,
                                   surface_loader: &ash::khr::surface::Instance| {
                if let Some(surface) = surface {
                    surface_loader.destroy_surface(surface, None);
                }
                if let Some(messenger) = debug_utils {
                    messenger.destroy();
                }
                instance.destroy_instance(None);
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let window_handle = match window.window_handle() {
                Ok(handle) => handle,
                Err(e) => {
                    destroy_partial(&instance, &debug_utils, None, &surface_loader);
                    return Err(nova_err!(
                        "nova::vulkan",
                        "Failed to get window handle: {}",
                        e
                    ));
                }
            };
            let surface = match ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ) {
                Ok(surface) => surface,
                Err(e) => {
                    destroy_partial(&instance, &debug_utils, None, &surface_loader);
                    return Err(nova_err!("nova::vulkan", "Failed to create surface: {:?}", e));
                }
            };

            let physical_device =
                match vulkan_device::pick_physical_device(&instance, &surface_loader, surface) {
                    Ok(device) => device,
                    Err(e) => {
                        destroy_partial(&instance, &debug_utils, Some(surface), &surface_loader);
                        return Err(e);
                    }
                };

            let device_properties = instance.get_physical_device_properties(physical_device);
            let memory_properties =
                instance.get_physical_device_memory_properties(physical_device);
            nova_info!(
                "nova::vulkan",
                "Selected GPU: {}",
                device_properties
                    .device_name_as_c_str()
                    .unwrap_or(c"<unknown>")
                    .to_string_lossy()
            );

            let capabilities = match DeviceCapabilities::probe(&instance, physical_device) {
                Ok(capabilities) => capabilities,
                Err(e) => {
                    destroy_partial(&instance, &debug_utils, Some(surface), &surface_loader);
                    return Err(e);
                }
            };
            if !capabilities.timeline_semaphores {
                nova_warn!(
                    "nova::vulkan",
                    "Timeline semaphores not supported, frame sync will use binary fallback"
                );
            }

            let queue_family_properties =
                instance.get_physical_device_queue_family_properties(physical_device);
            let queue_families =
                vulkan_device::partition_queue_families(&queue_family_properties, |family| {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, family, surface)
                        .unwrap_or(false)
                });
            // pick_physical_device already rejected incomplete devices
            let (graphics_family, present_family) =
                match (queue_families.graphics, queue_families.present) {
                    (Some(g), Some(p)) => (g, p),
                    _ => {
                        destroy_partial(&instance, &debug_utils, Some(surface), &surface_loader);
                        return Err(nova_err!(
                            "nova::vulkan",
                            "Selected device lost graphics or present support"
                        ));
                    }
                };

            let device = match Self::create_logical_device(
                &instance,
                physical_device,
                &queue_families,
                &capabilities,
            ) {
                Ok(device) => device,
                Err(e) => {
                    destroy_partial(&instance, &debug_utils, Some(surface), &surface_loader);
                    return Err(e);
                }
            };

            let debug_device = debug_utils
                .as_ref()
                .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let compute_queue =
                device.get_device_queue(queue_families.compute.unwrap_or(graphics_family), 0);
            let transfer_queue =
                device.get_device_queue(queue_families.transfer.unwrap_or(graphics_family), 0);
            let present_queue = device.get_device_queue(present_family, 0);

            nova_info!(
                "nova::vulkan",
                "Queue families: graphics={} compute={} transfer={} present={}",
                graphics_family,
                queue_families.compute.unwrap_or(graphics_family),
                queue_families.transfer.unwrap_or(graphics_family),
                present_family
            );

            Ok(Self {
                entry,
                instance,
                surface_loader,
                surface,
                debug_utils,
                debug_device,
                physical_device,
                device_properties,
                memory_properties,
                capabilities,
                device,
                queue_families,
                graphics_queue,
                compute_queue,
                transfer_queue,
                present_queue,
            })
        }
    }

    fn validation_layer_available(entry: &ash::Entry) -> Result<bool> {
        let layers = unsafe {
            entry.enumerate_instance_layer_properties().map_err(|e| {
                nova_err!("nova::vulkan", "Failed to enumerate instance layers: {:?}", e)
            })?
        };
        Ok(layers
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok())
            .any(|name| name == VALIDATION_LAYER))
    }

    /// Fail early with the missing-extension names instead of an opaque
    /// `ERROR_EXTENSION_NOT_PRESENT` from instance creation
    fn verify_instance_extensions(
        entry: &ash::Entry,
        required: &[*const std::ffi::c_char],
    ) -> Result<()> {
        let available = unsafe {
            entry
                .enumerate_instance_extension_properties(None)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to enumerate instance extensions: {:?}", e)
                })?
        };

        for &ptr in required {
            let wanted = unsafe { CStr::from_ptr(ptr) };
            let found = available
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok())
                .any(|name| name == wanted);
            if !found {
                return Err(nova_err!(
                    "nova::vulkan",
                    "Required instance extension not available: {}",
                    wanted.to_string_lossy()
                ));
            }
        }
        Ok(())
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: &QueueFamilyIndices,
        capabilities: &DeviceCapabilities,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let mut device_extension_names: Vec<*const std::ffi::c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        if capabilities.timeline_semaphores {
            device_extension_names.push(ash::khr::timeline_semaphore::NAME.as_ptr());
        }

        let device_features = vk::PhysicalDeviceFeatures::default();
        let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(capabilities.timeline_semaphores);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features)
            .push_next(&mut vulkan12_features);

        unsafe {
            instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to create logical device: {:?}", e)
                })
        }
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Debug-utils device functions, present only when validation is on
    pub fn debug_device(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_device.as_ref()
    }

    /// Name a Vulkan object for validation output. No-op without validation.
    pub fn name_object<H: vk::Handle>(&self, handle: H, name: &str) {
        debug::set_object_name(self.debug_device.as_ref(), handle, name);
    }

    pub fn device_properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.device_properties
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn compute_queue(&self) -> vk::Queue {
        self.compute_queue
    }

    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Block until the device is idle. Errors are logged, not propagated,
    /// so teardown paths can call this unconditionally.
    pub fn wait_idle(&self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                nova_warn!("nova::vulkan", "device_wait_idle failed: {:?}", e);
            }
        }
    }

    /// Find a memory type index on the selected device
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        vulkan_device::find_memory_type(&self.memory_properties, type_bits, properties)
            .ok_or(Error::OutOfMemory)
    }

    /// Check optimal-tiling support for a format feature set
    pub fn is_format_supported(&self, format: vk::Format, features: vk::FormatFeatureFlags) -> bool {
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        props.optimal_tiling_features.contains(features)
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                nova_warn!("nova::vulkan", "device_wait_idle failed during teardown: {:?}", e);
            }
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(messenger) = &self.debug_utils {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}
