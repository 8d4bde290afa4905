use std::ffi::{c_char, CStr};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::{OptionExt, WrapErr};
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use crate::renderer::contexts::device_ctx::instance::RenderInstance;
use crate::renderer::contexts::device_ctx::queue::{Queue, QueueFamily};
use crate::renderer::contexts::device_ctx::transfer_ctx::TransferContext;

/// Logical device, its single graphics/present queue and the memory allocator
pub struct RenderDevice {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub name: String,

    /// Used for both rendering and presentation
    pub graphics_queue: Arc<Queue>,

    /// `minUniformBufferOffsetAlignment` of the selected device
    pub min_uniform_alignment: u64,

    memory_allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    transfer_context: ManuallyDrop<TransferContext>,
}

impl RenderDevice {
    pub fn new(
        instance: &RenderInstance,
        surface: vk::SurfaceKHR,
        fence_timeout_ns: u64,
    ) -> Result<Self> {
        let (physical_device, graphics_queue_family) =
            Self::select_physical_device(instance, surface)?;

        let properties = unsafe {
            instance.instance.get_physical_device_properties(physical_device)
        };
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_owned());
        let min_uniform_alignment = properties.limits.min_uniform_buffer_offset_alignment;
        log::info!(
            "Selected {} ({:?}), queue family {}, uniform alignment {}",
            name,
            properties.device_type,
            graphics_queue_family.index,
            min_uniform_alignment,
        );

        let (logical_device, graphics_queue) = Self::create_logical_device(
            &instance.instance,
            physical_device,
            graphics_queue_family,
        ).wrap_err("Failed to create logical device")?;

        let memory_allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: logical_device.clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }).wrap_err("Failed to create memory allocator")?;

        let logical_device = Arc::new(logical_device);
        let graphics_queue = Arc::new(graphics_queue);

        let transfer_context = TransferContext::new(
            graphics_queue.clone(),
            fence_timeout_ns,
            logical_device.clone(),
        )?;

        Ok(Self {
            logical: logical_device,
            physical: physical_device,
            name,
            graphics_queue,
            min_uniform_alignment,
            memory_allocator: ManuallyDrop::new(Arc::new(Mutex::new(memory_allocator))),
            transfer_context: ManuallyDrop::new(transfer_context),
        })
    }

    pub fn memory_allocator(&self) -> Arc<Mutex<Allocator>> {
        Arc::clone(&self.memory_allocator)
    }

    pub fn transfer_context(&self) -> &TransferContext {
        &self.transfer_context
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.logical
                .device_wait_idle()
                .wrap_err("Failed to wait for device idle")
        }
    }

    fn select_physical_device(
        instance: &RenderInstance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, QueueFamily)> {
        let req_device_exts = Self::get_required_device_extensions();

        unsafe {
            instance
                .instance
                .enumerate_physical_devices()?
                .into_iter()
                .filter(|device| {
                    let props = instance.instance.get_physical_device_properties(*device);
                    props.api_version >= vk::API_VERSION_1_2
                })
                // Filter out devices that do not contain the required device extensions
                .filter(|device| {
                    let supported_extensions = instance
                        .instance
                        .enumerate_device_extension_properties(*device)
                        .unwrap_or_default();

                    req_device_exts.iter().all(|req_ext| {
                        let req_ext_supported = supported_extensions
                            .iter()
                            .any(|sup_ext| sup_ext.extension_name_as_c_str().is_ok_and(|sup| sup == *req_ext));
                        if !req_ext_supported {
                            log::debug!("Device extension not supported: {:?}", req_ext);
                        }
                        req_ext_supported
                    })
                })
                .filter(|device| RequiredDeviceFeatures::supported(&instance.instance, *device))
                // Filter out devices without a queue family that can both draw and present
                .filter_map(|device| {
                    let props = instance
                        .instance
                        .get_physical_device_queue_family_properties(device);

                    props
                        .iter()
                        .enumerate()
                        .map(|(i, q)| QueueFamily::new(i as u32, *q))
                        .find(|family| {
                            family.supports_graphics() && instance
                                .surface_loader
                                .get_physical_device_surface_support(device, family.index, surface)
                                .unwrap_or(false)
                        })
                        .map(|family| (device, family))
                })
                .min_by_key(|(device, _)| {
                    let props = instance.instance.get_physical_device_properties(*device);
                    match props.device_type {
                        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
                        vk::PhysicalDeviceType::CPU => 3,
                        vk::PhysicalDeviceType::OTHER => 4,
                        _ => 5,
                    }
                })
                .ok_or_eyre("No suitable physical device found")
        }
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: QueueFamily,
    ) -> Result<(ash::Device, Queue)> {
        let queue_priorities = [1.0];
        let queue_create_infos = [
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_queue_family.index)
                .queue_priorities(&queue_priorities),
        ];

        let device = {
            let enabled_extension_names = Self::get_required_device_extensions()
                .iter()
                .map(|ext| ext.as_ptr())
                .collect::<Vec<*const c_char>>();
            let mut enabled_features = RequiredDeviceFeatures::new();
            let device_create_info = enabled_features
                .device_create_info()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&enabled_extension_names);

            unsafe {
                instance.create_device(physical_device, &device_create_info, None)?
            }
        };

        let graphics_queue = unsafe {
            let queue = device.get_device_queue(graphics_queue_family.index, 0);
            Queue::new(graphics_queue_family, queue)
        };

        Ok((device, graphics_queue))
    }

    fn get_required_device_extensions() -> Vec<&'static CStr> {
        vec![
            ash::khr::swapchain::NAME,

            #[cfg(target_os = "macos")]
            ash::khr::portability_subset::NAME,
        ]
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.logical.device_wait_idle() {
                log::error!("Failed to wait for device idle during shutdown: {e}");
            }
            // Both hold device objects and must go before the device itself
            ManuallyDrop::drop(&mut self.transfer_context);
            ManuallyDrop::drop(&mut self.memory_allocator);
            self.logical.destroy_device(None);
        }
    }
}

/// Features the variable-count texture array depends on
struct RequiredDeviceFeatures<'a> {
    features: vk::PhysicalDeviceFeatures,
    descriptor_indexing_features: vk::PhysicalDeviceDescriptorIndexingFeatures<'a>,
}

impl RequiredDeviceFeatures<'_> {
    fn new() -> Self {
        let features = vk::PhysicalDeviceFeatures::default();
        let descriptor_indexing_features =
            vk::PhysicalDeviceDescriptorIndexingFeatures::default()
                .runtime_descriptor_array(true)
                .descriptor_binding_partially_bound(true)
                .descriptor_binding_variable_descriptor_count(true)
                .shader_sampled_image_array_non_uniform_indexing(true);

        Self {
            features,
            descriptor_indexing_features,
        }
    }

    fn supported(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
        unsafe {
            instance.get_physical_device_features2(device, &mut features2);
        }
        let supported = indexing.runtime_descriptor_array == vk::TRUE
            && indexing.descriptor_binding_partially_bound == vk::TRUE
            && indexing.descriptor_binding_variable_descriptor_count == vk::TRUE
            && indexing.shader_sampled_image_array_non_uniform_indexing == vk::TRUE;
        if !supported {
            log::debug!("Device lacks descriptor indexing features");
        }
        supported
    }

    fn device_create_info(&mut self) -> vk::DeviceCreateInfo<'_> {
        vk::DeviceCreateInfo::default()
            .enabled_features(&self.features)
            .push_next(&mut self.descriptor_indexing_features)
    }
}
