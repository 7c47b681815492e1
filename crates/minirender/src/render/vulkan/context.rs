//! Vulkan context management
//!
//! Instance creation, surface ownership, physical device selection and the
//! logical device shared by every other Vulkan wrapper in this crate.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use thiserror::Error;

use crate::render::vulkan::window::PresentationTarget;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Requested image layout transition has no barrier mapping
    #[error("Unsupported layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
    },

    /// A bounded GPU wait expired
    #[error("Timed out after {timeout_ns} ns waiting for {what}")]
    Timeout {
        /// What was being waited on
        what: &'static str,
        /// The timeout that expired, in nanoseconds
        timeout_ns: u64,
    },

    /// The logical device was lost
    #[error("Vulkan device lost")]
    DeviceLost,

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            other => Self::Api(other),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, optionally with the Khronos validation layer
    pub fn new<W: PresentationTarget>(
        window: &W,
        app_name: &str,
        app_version: (u32, u32, u32),
        enable_validation: bool,
    ) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        log_instance_extensions(&entry);

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("Application name contains a NUL byte".to_string()))?;
        let engine_name_cstr = CString::new("minirender")
            .map_err(|_| VulkanError::InitializationFailed("Engine name contains a NUL byte".to_string()))?;
        let (major, minor, patch) = app_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;

        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::InitializationFailed("Extension name contains a NUL byte".to_string()))?;

        let mut extensions: Vec<*const c_char> = cstr_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let validation = enable_validation && validation_layer_available(&entry);
        if enable_validation && !validation {
            log::warn!("{} requested but not installed, continuing without validation", VALIDATION_LAYER);
        }
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation {
            vec![CString::new(VALIDATION_LAYER)
                .map_err(|_| VulkanError::InitializationFailed("Layer name contains a NUL byte".to_string()))?]
        } else {
            Vec::new()
        };
        let layer_name_ptrs: Vec<*const c_char> = layer_names
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_name_ptrs);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug_utils = if validation {
            let loader = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!("Vulkan instance created (validation: {})", validation);

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    /// Whether a debug messenger is forwarding validation output
    pub fn validation_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

fn validation_layer_available(entry: &Entry) -> bool {
    let Ok(layers) = entry.enumerate_instance_layer_properties() else {
        return false;
    };
    layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name.to_str().map_or(false, |name| name == VALIDATION_LAYER)
    })
}

fn log_instance_extensions(entry: &Entry) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match entry.enumerate_instance_extension_properties(None) {
        Ok(extensions) => {
            log::debug!("{} instance extensions supported", extensions.len());
            for ext in &extensions {
                let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
                log::debug!("  {}", name.to_string_lossy());
            }
        }
        Err(e) => log::debug!("Could not enumerate instance extensions: {:?}", e),
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Presentation surface and its extension loader
pub struct PresentationSurface {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl PresentationSurface {
    /// Create a surface for the window through the windowing collaborator
    pub fn new<W: PresentationTarget>(instance: &VulkanInstance, window: &mut W) -> VulkanResult<Self> {
        let loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window.create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;
        Ok(Self { loader, surface })
    }

    /// Surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn loader(&self) -> &Surface {
        &self.loader
    }

    /// Query capabilities, formats and present modes for a physical device
    pub fn query_support(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self.loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
                formats: self.loader
                    .get_physical_device_surface_formats(physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
                present_modes: self.loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Snapshot of what a surface supports on one physical device
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported color formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Queue families used for graphics and presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family that supports graphics operations
    pub graphics: u32,
    /// Family that can present to the surface
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Pick the first graphics family and the first present family
    ///
    /// A family that does both is preferred over splitting work across two.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Option<Self>> {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            let is_graphics = family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let is_present = supports_present(index)?;

            if is_graphics && is_present {
                return Ok(Some(Self { graphics: index, present: index }));
            }
            if is_graphics && graphics.is_none() {
                graphics = Some(index);
            }
            if is_present && present.is_none() {
                present = Some(index);
            }
        }

        Ok(graphics.zip(present).map(|(graphics, present)| Self { graphics, present }))
    }

    /// Whether one family serves both roles
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Selected queue families
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device able to render to the surface
    pub fn select_suitable_device(
        instance: &Instance,
        surface: &PresentationSurface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };
        log::info!("Devices found: {}", devices.len());

        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            log::info!(
                "  {} (API {}.{}.{})",
                device_name(&properties),
                vk::api_version_major(properties.api_version),
                vk::api_version_minor(properties.api_version),
                vk::api_version_patch(properties.api_version),
            );

            match Self::evaluate_device(instance, device, properties, surface) {
                Ok(Some(info)) => {
                    log::info!("Selected GPU: {}", device_name(&info.properties));
                    return Ok(info);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping {}: {}", device_name(&properties), e),
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        properties: vk::PhysicalDeviceProperties,
        surface: &PresentationSurface,
    ) -> VulkanResult<Option<Self>> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = QueueFamilyIndices::find(&families, |index| unsafe {
            surface.loader()
                .get_physical_device_surface_support(device, index, surface.handle())
                .map_err(VulkanError::Api)
        })?;
        let Some(queue_families) = queue_families else {
            return Ok(None);
        };

        let extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        let support = surface.query_support(device)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Ok(None);
        }

        let features = unsafe { instance.get_physical_device_features(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

        Ok(Some(Self {
            device,
            properties,
            features,
            memory_properties,
            queue_families,
        }))
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Logical device, its queues and the physical device it was created from
///
/// Every other wrapper receives `&DeviceContext` at construction and keeps a
/// clone of the `ash::Device` dispatch table for its own teardown. The context
/// itself must outlive all of them; `RenderSystem` guarantees that through
/// field order.
pub struct DeviceContext {
    device: Device,
    physical_device: PhysicalDeviceInfo,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: SwapchainLoader,
}

impl DeviceContext {
    /// Select a physical device and create the logical device with its queues
    pub fn new(instance: &VulkanInstance, surface: &PresentationSurface) -> VulkanResult<Self> {
        let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface)?;
        let families = physical_device.queue_families;

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical_device.features.sampler_anisotropy == vk::TRUE)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance.instance.create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(&instance.instance, &device);

        log::debug!(
            "Logical device created (graphics family {}, present family {})",
            families.graphics,
            families.present
        );

        Ok(Self {
            device,
            physical_device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }

    /// Logical device dispatch table
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Owned clone of the dispatch table for wrappers that destroy objects
    pub fn raw_device(&self) -> Device {
        self.device.clone()
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Queue family indices chosen at selection time
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Block until every queue on the device has drained
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::from)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}
