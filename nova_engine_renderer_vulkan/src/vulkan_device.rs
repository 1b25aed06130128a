//! Physical device selection and queue family partitioning
//!
//! Pure selection logic lives here so it can be tested against synthetic
//! queue layouts without a GPU; the actual enumeration calls are thin
//! wrappers used by `GraphicsContext` during init.

use ash::vk;
use nova_engine::nova::Result;
use nova_engine::{nova_debug, nova_err, nova_warn};
use std::ffi::CStr;

/// Device extensions the engine hard-depends on. A device missing any of
/// these is not suitable.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Queue family assignment for the four queue roles
///
/// Graphics and present must both be valid for a context to be usable.
/// Compute and transfer prefer a dedicated family but fall back to the
/// graphics family; the heuristic can leave compute and transfer aliased to
/// the same family, so the only guarantee here is "valid family index", not
/// true queue concurrency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// A context is usable iff it can draw and present
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Unique family indices, for logical-device queue creation
    pub fn unique_families(&self) -> Vec<u32> {
        let mut unique = Vec::with_capacity(4);
        for family in [self.graphics, self.compute, self.transfer, self.present]
            .into_iter()
            .flatten()
        {
            if !unique.contains(&family) {
                unique.push(family);
            }
        }
        unique
    }
}

/// Partition queue families into the four roles
///
/// Single pass over the family list:
/// - graphics: first family advertising GRAPHICS
/// - compute: first COMPUTE-without-GRAPHICS family, else any COMPUTE family
/// - transfer: first TRANSFER family with neither GRAPHICS nor COMPUTE,
///   else any TRANSFER family
/// - present: first family the surface predicate confirms
///
/// Dedicated assignments are never overwritten by fallback ones. Exits as
/// soon as all four roles are valid, so a shared compute/transfer
/// assignment sticks when an earlier family already covered every role.
/// Compute and transfer fall back to the graphics family when no capable
/// family was found at all.
pub fn partition_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut present_support: impl FnMut(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();
    // Tracks whether the current compute/transfer assignment is a dedicated
    // family, so a later fallback candidate cannot replace it.
    let mut compute_dedicated = false;
    let mut transfer_dedicated = false;

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        let flags = family.queue_flags;

        if indices.graphics.is_none() && flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }

        if flags.contains(vk::QueueFlags::COMPUTE) {
            let dedicated = !flags.contains(vk::QueueFlags::GRAPHICS);
            if dedicated && !compute_dedicated {
                indices.compute = Some(i);
                compute_dedicated = true;
            } else if indices.compute.is_none() {
                indices.compute = Some(i);
            }
        }

        if flags.contains(vk::QueueFlags::TRANSFER) {
            let dedicated = !flags.contains(vk::QueueFlags::GRAPHICS)
                && !flags.contains(vk::QueueFlags::COMPUTE);
            if dedicated && !transfer_dedicated {
                indices.transfer = Some(i);
                transfer_dedicated = true;
            } else if indices.transfer.is_none() {
                indices.transfer = Some(i);
            }
        }

        if indices.present.is_none() && present_support(i) {
            indices.present = Some(i);
        }

        if indices.graphics.is_some()
            && indices.compute.is_some()
            && indices.transfer.is_some()
            && indices.present.is_some()
        {
            break;
        }
    }

    // No dedicated or shared family advertised the capability at all:
    // fall back to the graphics family.
    if indices.compute.is_none() {
        indices.compute = indices.graphics;
    }
    if indices.transfer.is_none() {
        indices.transfer = indices.graphics;
    }

    indices
}

/// Score a device for selection
///
/// Discrete GPUs get a 1000-point head start; the maximum 2D image dimension
/// is a monotonic proxy for overall capability. Ties are broken by
/// enumeration order in `pick_physical_device`.
pub fn score_device(properties: &vk::PhysicalDeviceProperties) -> i64 {
    let mut score: i64 = 0;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    score += i64::from(properties.limits.max_image_dimension2_d);
    score
}

/// Surface capabilities, formats, and present modes for one device
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// A chain can be built iff at least one format and one mode exist
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    pub fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        unsafe {
            let capabilities = surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to get surface capabilities: {:?}", e)
                })?;

            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| nova_err!("nova::vulkan", "Failed to get surface formats: {:?}", e))?;

            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to get surface present modes: {:?}", e)
                })?;

            Ok(Self {
                capabilities,
                formats,
                present_modes,
            })
        }
    }
}

/// Optional capability flags probed once during device selection
///
/// Absence is never fatal; call sites pick a fallback path instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCapabilities {
    pub timeline_semaphores: bool,
    pub descriptor_indexing: bool,
    pub ray_tracing: bool,
    pub mesh_shaders: bool,
}

impl DeviceCapabilities {
    /// Build the capability set from the device's advertised extension names
    pub fn from_extension_names(names: &[&CStr]) -> Self {
        let has = |wanted: &CStr| names.iter().any(|n| *n == wanted);
        Self {
            timeline_semaphores: has(ash::khr::timeline_semaphore::NAME),
            descriptor_indexing: has(ash::ext::descriptor_indexing::NAME),
            ray_tracing: has(ash::khr::ray_tracing_pipeline::NAME),
            mesh_shaders: has(ash::ext::mesh_shader::NAME),
        }
    }

    pub fn probe(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<Self> {
        let extensions = enumerate_device_extensions(instance, physical_device)?;
        let names: Vec<&CStr> = extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .collect();
        Ok(Self::from_extension_names(&names))
    }
}

fn enumerate_device_extensions(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<Vec<vk::ExtensionProperties>> {
    unsafe {
        instance
            .enumerate_device_extension_properties(physical_device)
            .map_err(|e| nova_err!("nova::vulkan", "Failed to enumerate device extensions: {:?}", e))
    }
}

/// Check that every required extension is advertised by the device
pub fn check_device_extension_support(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    required: &[&CStr],
) -> Result<bool> {
    let available = enumerate_device_extensions(instance, physical_device)?;

    let mut all_found = true;
    for wanted in required {
        let found = available
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .any(|name| name == *wanted);
        if !found {
            nova_warn!(
                "nova::vulkan",
                "Required device extension not found: {}",
                wanted.to_string_lossy()
            );
            all_found = false;
        }
    }

    Ok(all_found)
}

/// Whether a device can run the frame pipeline at all
pub fn is_device_suitable(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> bool {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    let indices = partition_queue_families(&families, |family| unsafe {
        surface_loader
            .get_physical_device_surface_support(physical_device, family, surface)
            .unwrap_or(false)
    });

    if !indices.is_complete() {
        return false;
    }

    match check_device_extension_support(instance, physical_device, &REQUIRED_DEVICE_EXTENSIONS) {
        Ok(true) => {}
        _ => return false,
    }

    match SurfaceSupport::query(surface_loader, physical_device, surface) {
        Ok(support) => support.is_adequate(),
        Err(_) => false,
    }
}

/// Enumerate GPU-class devices, score the suitable ones, and pick the best
///
/// Ties are broken by enumeration order (strict `>` keeps the first max).
/// Failure is fatal to initialization; there is no degraded mode.
pub fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<vk::PhysicalDevice> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(|e| nova_err!("nova::vulkan", "Failed to enumerate physical devices: {:?}", e))?
    };

    if devices.is_empty() {
        return Err(nova_err!("nova::vulkan", "No Vulkan-capable GPU found"));
    }

    let mut best_score: i64 = -1;
    let mut best_device = None;

    for &device in &devices {
        if !is_device_suitable(instance, surface_loader, device, surface) {
            continue;
        }

        let properties = unsafe { instance.get_physical_device_properties(device) };
        let score = score_device(&properties);
        nova_debug!(
            "nova::vulkan",
            "Candidate device '{}' scored {}",
            properties
                .device_name_as_c_str()
                .unwrap_or(c"<unknown>")
                .to_string_lossy(),
            score
        );

        if score > best_score {
            best_score = score;
            best_device = Some(device);
        }
    }

    best_device.ok_or_else(|| nova_err!("nova::vulkan", "No suitable physical device found"))
}

/// Find a memory type matching the requested type bits and property flags
///
/// Operates on the cached memory-property table so it stays pure and
/// testable; `GraphicsContext::find_memory_type` is the public entry point.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
    })
}
