use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::device_ctx::instance::RenderInstance;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub swapchain_images: Vec<vk::Image>,
    pub swapchain_image_views: Vec<vk::ImageView>,
    pub swapchain_image_extent: vk::Extent2D,
    pub swapchain_image_format: vk::Format,

    device: Arc<ash::Device>,
}

impl Swapchain {
    /// `old_swapchain` may be null; when set it is retired by the new one but not destroyed
    pub fn new(
        surface: vk::SurfaceKHR,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        drawable_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
        ins: &RenderInstance,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let surface_capabilities = unsafe {
            ins.surface_loader
                .get_physical_device_surface_capabilities(dev.physical, surface)?
        };

        let image_extent = choose_extent(&surface_capabilities, drawable_extent);
        let min_image_count = choose_image_count(&surface_capabilities);
        let pre_transform = if surface_capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            surface_capabilities.current_transform
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(
            &ins.instance,
            &dev.logical,
        );
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(image_extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_info, None)
                .wrap_err("Failed to create swapchain")?
        };

        let (
            swapchain_images,
            swapchain_image_views,
        ) = match Self::create_swapchain_images(
            swapchain,
            &swapchain_loader,
            surface_format.format,
            dev,
        ) {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        log::info!(
            "Swapchain {}x{} with {} images, {:?}",
            image_extent.width,
            image_extent.height,
            swapchain_images.len(),
            present_mode,
        );

        Ok(Self {
            swapchain,
            swapchain_loader,
            swapchain_images,
            swapchain_image_views,
            swapchain_image_extent: image_extent,
            swapchain_image_format: surface_format.format,
            device: dev.logical.clone(),
        })
    }

    pub fn image_count(&self) -> usize {
        self.swapchain_images.len()
    }

    fn create_swapchain_images(
        swapchain: vk::SwapchainKHR,
        swapchain_loader: &ash::khr::swapchain::Device,
        swapchain_image_format: vk::Format,
        dev: &RenderDevice,
    ) -> Result<(Vec<vk::Image>, Vec<vk::ImageView>)> {
        let swapchain_images = unsafe {
            swapchain_loader.get_swapchain_images(swapchain)?
        };
        let swapchain_image_views = swapchain_images
            .iter()
            .map(|image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(swapchain_image_format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::R,
                        g: vk::ComponentSwizzle::G,
                        b: vk::ComponentSwizzle::B,
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image(*image);
                unsafe {
                    dev.logical.create_image_view(&view_info, None)
                }
            })
            .collect::<VkResult<Vec<vk::ImageView>>>()?;

        Ok((
            swapchain_images,
            swapchain_image_views,
        ))
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.swapchain_image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    drawable_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: drawable_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: drawable_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

// One more than the minimum so the driver never stalls us on its own image; 0 means no maximum
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    if max > 0 && min + 1 > max {
        max
    } else {
        min + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let extent = vk::Extent2D { width: 800, height: 600 };
        assert_eq!(choose_image_count(&capabilities(2, 8, extent)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3, extent)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 0, extent)), 3);
    }

    #[test]
    fn extent_follows_surface_unless_undefined() {
        let fixed = vk::Extent2D { width: 1024, height: 768 };
        let drawable = vk::Extent2D { width: 800, height: 600 };
        assert_eq!(choose_extent(&capabilities(2, 3, fixed), drawable), fixed);

        let undefined = vk::Extent2D { width: u32::MAX, height: u32::MAX };
        assert_eq!(choose_extent(&capabilities(2, 3, undefined), drawable), drawable);

        let huge = vk::Extent2D { width: 10_000, height: 0 };
        assert_eq!(
            choose_extent(&capabilities(2, 3, undefined), huge),
            vk::Extent2D { width: 4096, height: 1 },
        );
    }
}
