use color_eyre::Result;
use color_eyre::eyre::{OptionExt, eyre};
use naga::{
    back::spv,
    front::wgsl,
    valid::{Capabilities, ValidationFlags, Validator},
    ShaderStage,
};
use std::{env, fs, path::Path};

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=shaders");

    compile_shaders()?;

    Ok(())
}

fn compile_shaders() -> Result<()> {
    let cargo_manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
    let shaders_in_dir = Path::new(&cargo_manifest_dir).join("shaders");
    let shaders_out_dir = Path::new(&cargo_manifest_dir).join("shaders-built");
    fs::create_dir_all(&shaders_out_dir)?;

    for entry in fs::read_dir(shaders_in_dir)? {
        let entry = entry?;
        let path = entry.path();
        println!("cargo:rerun-if-changed={}", path.display());

        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_eyre(format!("Shader file has no extension: {:?}", path))?;
        if ext != "wgsl" {
            log::warn!("Skipping non-WGSL file: {:?}", path);
            continue;
        }

        // `<name>.<stage>.wgsl`
        let shader_name = path
            .file_stem()
            .ok_or_eyre("Shader file has no name")?
            .to_str()
            .ok_or_eyre("Shader file name is not valid UTF-8")?;
        let stage = match shader_name.rsplit('.').next() {
            Some("vert") => ShaderStage::Vertex,
            Some("frag") => ShaderStage::Fragment,
            Some("comp") => ShaderStage::Compute,
            _ => return Err(eyre!("Shader file {:?} does not name a stage", path)),
        };

        // Parse the WGSL source into IR
        let source = fs::read_to_string(&path)?;
        let module = wgsl::parse_str(&source)
            .map_err(|e| eyre!("{}", e.emit_to_string(&source)))?;
        if !module.entry_points.iter().any(|ep| ep.stage == stage) {
            return Err(eyre!("{:?} has no {:?} entry point", path, stage));
        }

        // Validate the IR
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        let validation_info = validator.validate(&module)?;

        // The projection matrix already flips Y, so naga must not flip it again
        let mut options = spv::Options::default();
        options.flags.remove(spv::WriterFlags::ADJUST_COORDINATE_SPACE);

        // Generate the SPIR-V binary
        let spv_binary = spv::write_vec(&module, &validation_info, &options, None)?;

        let output_filepath = shaders_out_dir.join(format!("{}.spv", shader_name));
        fs::write(output_filepath, bytemuck::cast_slice(&spv_binary))?;
    }

    Ok(())
}
