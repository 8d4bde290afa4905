use color_eyre::Result;
use ash::vk;

pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
    binding_flags: Vec<vk::DescriptorBindingFlags>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            binding_flags: Vec::new(),
        }
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        descriptor_count: u32,
        stages: vk::ShaderStageFlags,
        binding_flags: vk::DescriptorBindingFlags,
        immutable_samplers: Option<&'a [vk::Sampler]>,
    ) -> Self {
        let mut binding = vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(descriptor_count)
            .stage_flags(stages);

        if let Some(immutable_samplers) = immutable_samplers {
            binding = binding.immutable_samplers(immutable_samplers);
        }

        self.bindings.push(binding);
        self.binding_flags.push(binding_flags);
        self
    }

    /// Pool sizes for `set_count` sets built from this layout. `variable_count` replaces the
    /// declared count of a `VARIABLE_DESCRIPTOR_COUNT` binding.
    pub fn pool_sizes(&self, set_count: u32, variable_count: u32) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for (binding, flags) in self.bindings.iter().zip(&self.binding_flags) {
            let per_set = if flags.contains(vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT) {
                variable_count
            } else {
                binding.descriptor_count
            };
            let count = per_set * set_count;
            if count == 0 {
                continue;
            }
            match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
                Some(size) => size.descriptor_count += count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: count,
                }),
            }
        }
        sizes
    }

    pub fn build(
        &self,
        flags: vk::DescriptorSetLayoutCreateFlags,
        device: &ash::Device,
    ) -> Result<vk::DescriptorSetLayout> {
        let mut binding_flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(&self.binding_flags);
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&self.bindings)
            .flags(flags)
            .push_next(&mut binding_flags_info);
        Ok(unsafe {
            device.create_descriptor_set_layout(&layout_info, None)?
        })
    }
}
