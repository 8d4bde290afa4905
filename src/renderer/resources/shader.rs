use std::ffi::CStr;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crate::renderer::config::SHADERS_DIR;

pub const VERTEX_ENTRY_POINT: &CStr = c"vs_main";
pub const FRAGMENT_ENTRY_POINT: &CStr = c"fs_main";

/// Vertex and fragment modules compiled by the build script
pub struct GraphicsShader {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    device: Arc<ash::Device>,
}

impl GraphicsShader {
    pub fn new(shader_name: &str, device: Arc<ash::Device>) -> Result<Self> {
        let shaders_dir = Path::new(SHADERS_DIR);
        let vert_mod = create_shader_module(
            &shaders_dir.join(format!("{shader_name}.vert.spv")),
            &device,
        )?;
        let frag_mod = match create_shader_module(
            &shaders_dir.join(format!("{shader_name}.frag.spv")),
            &device,
        ) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert_mod, None) };
                return Err(e);
            }
        };
        log::debug!("Loaded shader '{shader_name}'");
        Ok(Self { vert_mod, frag_mod, device })
    }

    pub fn stages(&self) -> [vk::PipelineShaderStageCreateInfo<'static>; 2] {
        [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vert_mod)
                .name(VERTEX_ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.frag_mod)
                .name(FRAGMENT_ENTRY_POINT),
        ]
    }
}

impl Drop for GraphicsShader {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

fn create_shader_module(filepath: &Path, device: &ash::Device) -> Result<vk::ShaderModule> {
    let mut file = File::open(filepath)
        .wrap_err_with(|| format!("Failed to open shader binary {}", filepath.display()))?;
    // Handles the alignment and magic-number checks that a raw byte cast would skip
    let code = ash::util::read_spv(&mut file)
        .wrap_err_with(|| format!("Invalid SPIR-V in {}", filepath.display()))?;

    let shader_module_info = vk::ShaderModuleCreateInfo::default()
        .code(&code);

    let shader_module = unsafe {
        device
            .create_shader_module(&shader_module_info, None)
            .wrap_err_with(|| format!("Failed to create shader module {}", filepath.display()))?
    };

    Ok(shader_module)
}
