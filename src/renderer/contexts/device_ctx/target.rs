use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::device_ctx::instance::RenderInstance;
use crate::renderer::internals::swapchain::Swapchain;

/// Presentation target of the renderer, encapsulating the surface and swapchain
pub struct RenderTarget {
    pub surface: vk::SurfaceKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,

    swapchain: Option<Swapchain>,
    surface_loader: ash::khr::surface::Instance,
}

impl RenderTarget {
    pub fn new(
        surface: vk::SurfaceKHR,
        drawable_extent: vk::Extent2D,
        vsync: bool,
        ins: &RenderInstance,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let surface_formats = unsafe {
            ins.surface_loader
                .get_physical_device_surface_formats(dev.physical, surface)?
        };

        let surface_present_modes = unsafe {
            ins.surface_loader
                .get_physical_device_surface_present_modes(dev.physical, surface)?
        };

        let surface_format = choose_surface_format(&surface_formats)?;
        let present_mode = choose_present_mode(&surface_present_modes, vsync);

        let swapchain = Swapchain::new(
            surface,
            surface_format,
            present_mode,
            drawable_extent,
            vk::SwapchainKHR::null(),
            ins,
            dev,
        )?;

        Ok(Self {
            surface,
            surface_format,
            present_mode,
            swapchain: Some(swapchain),
            surface_loader: ins.surface_loader.clone(),
        })
    }

    pub fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain.as_ref().ok_or_eyre("Swapchain is being rebuilt")
    }

    /// Rebuilds the swapchain at `drawable_extent`. The device must be idle.
    pub fn resize(
        &mut self,
        drawable_extent: vk::Extent2D,
        ins: &RenderInstance,
        dev: &RenderDevice,
    ) -> Result<()> {
        let old = self.swapchain.take();
        let old_handle = old
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |swapchain| swapchain.swapchain);
        let swapchain = Swapchain::new(
            self.surface,
            self.surface_format,
            self.present_mode,
            drawable_extent,
            old_handle,
            ins,
            dev,
        );
        // The retired swapchain is destroyed only after the new one was created from it
        drop(old);
        self.swapchain = Some(swapchain?);
        Ok(())
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.swapchain.take();
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_eyre("Surface reports no formats")
}

fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // Always supported
        vk::PresentModeKHR::FIFO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_srgb_bgra() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(choose_surface_format(&formats[..1]).unwrap().format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn vsync_forces_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&modes[..1], false), vk::PresentModeKHR::FIFO);
    }
}
