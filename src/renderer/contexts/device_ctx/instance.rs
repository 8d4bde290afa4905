use std::ffi::{c_char, c_void, CStr};
use ash::vk;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;

/// Initializes Vulkan and keeps the Vulkan instance alive
pub struct RenderInstance {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub surface_loader: ash::khr::surface::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl RenderInstance {
    const REQUIRED_VALIDATION_LAYERS: &'static [&'static CStr] = &[
        c"VK_LAYER_KHRONOS_validation",
    ];

    /// `window_extensions` are the instance extensions the window system needs for presentation
    pub fn new(
        window_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> Result<Self> {
        let entry = ash::Entry::linked();

        let enable_validation = enable_validation && Self::validation_layers_supported(&entry)?;
        let instance = Self::create_instance(&entry, window_extensions, enable_validation)
            .wrap_err("Failed to create Vulkan instance")?;

        let debug_utils = if enable_validation {
            Some(Self::create_debug_utils_messenger(&entry, &instance)?)
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug_utils,
        })
    }

    fn create_instance(
        entry: &ash::Entry,
        window_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let application_info = vk::ApplicationInfo::default()
            .application_name(c"vkscene")
            .engine_name(c"vkscene")
            .api_version(vk::API_VERSION_1_2);
        let enabled_layer_names = if enable_validation {
            Self::REQUIRED_VALIDATION_LAYERS
                .iter()
                .map(|layer| layer.as_ptr())
                .collect::<Vec<*const c_char>>()
        } else {
            Vec::new()
        };

        let mut enabled_extension_names = window_extensions.to_vec();
        if enable_validation {
            enabled_extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        #[cfg(target_os = "macos")]
        {
            enabled_extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
            enabled_extension_names.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
        }

        let mut debug_info = debug_utils_messenger_create_info();
        let mut instance_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_layer_names(&enabled_layer_names)
            .enabled_extension_names(&enabled_extension_names);
        if enable_validation {
            // Also report problems raised while creating and destroying the instance
            instance_info = instance_info.push_next(&mut debug_info);
        }

        #[cfg(target_os = "macos")]
        let instance_info = instance_info
            .flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR);

        Ok(unsafe {
            entry.create_instance(&instance_info, None)?
        })
    }

    fn create_debug_utils_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils_loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let debug_utils_info = debug_utils_messenger_create_info();
        let debug_utils_messenger = unsafe {
            debug_utils_loader.create_debug_utils_messenger(&debug_utils_info, None)?
        };
        Ok((debug_utils_loader, debug_utils_messenger))
    }

    fn validation_layers_supported(entry: &ash::Entry) -> Result<bool> {
        let supported_layers = unsafe {
            entry.enumerate_instance_layer_properties()?
        };

        for layer in Self::REQUIRED_VALIDATION_LAYERS {
            let supported = supported_layers
                .iter()
                .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == *layer));
            if !supported {
                log::warn!("Validation layer {:?} not available, continuing without it", layer);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl Drop for RenderInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn debug_utils_messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    let message_severity = vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let message_type = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(message_severity)
        .message_type(message_type)
        .pfn_user_callback(Some(debug_callback))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let msg_type = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        _ => "[Unknown]",
    };
    let msg = unsafe {
        if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr((*p_callback_data).p_message)
    };
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            log::trace!("[Verbose]{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Warning]{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Error]{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[Info]{} {:?}", msg_type, msg);
        }
        _ => {
            log::warn!("[Unknown]{} {:?}", msg_type, msg);
        }
    }

    vk::FALSE
}
