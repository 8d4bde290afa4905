use std::path::Path;
use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use gpu_allocator::vulkan::Allocator;
use crate::renderer::contexts::device_ctx::transfer_ctx::TransferContext;
use crate::renderer::internals::image::Image;

pub struct ColorTexture {
    pub image: Image,
}

impl ColorTexture {
    pub fn new_from_image(
        image: &image::DynamicImage,
        name: &str,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
        transfer_context: &TransferContext,
    ) -> Result<Self> {
        let data = image.to_rgba8().into_raw();
        let image = Image::new_color_image(
            &data,
            image.width(),
            image.height(),
            name,
            memory_allocator,
            device,
            transfer_context,
        )?;
        Ok(Self { image })
    }

    /// Decodes `path` and uploads it; the decoded pixels are dropped once the copy completes
    pub fn load(
        path: &Path,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
        transfer_context: &TransferContext,
    ) -> Result<Self> {
        let decoded = image::open(path)
            .wrap_err_with(|| format!("Failed to decode texture {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("texture");
        log::debug!("Loaded texture {name} ({}x{})", decoded.width(), decoded.height());
        Self::new_from_image(&decoded, name, memory_allocator, device, transfer_context)
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }
}

/// Linear repeat sampler shared by every texture through an immutable binding
pub struct Sampler {
    pub sampler: vk::Sampler,
    device: Arc<ash::Device>,
}

impl Sampler {
    pub fn new_linear(device: Arc<ash::Device>) -> Result<Self> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(0.0);
        let sampler = unsafe {
            device
                .create_sampler(&info, None)
                .wrap_err("Failed to create sampler")?
        };
        Ok(Self { sampler, device })
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
