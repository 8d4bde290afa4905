use ash::vk;

pub struct Queue {
    pub family: QueueFamily,
    pub handle: vk::Queue,
}

impl Queue {
    pub fn new(
        family: QueueFamily,
        handle: vk::Queue,
    ) -> Self {
        Self {
            family,
            handle,
        }
    }
}

/// The renderer drives one queue family that must handle both graphics and presentation
#[derive(Clone, Debug)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

impl QueueFamily {
    pub fn new(
        index: u32,
        properties: vk::QueueFamilyProperties,
    ) -> Self {
        Self {
            index,
            properties,
        }
    }

    pub fn supports_graphics(&self) -> bool {
        self.properties.queue_flags.contains(vk::QueueFlags::GRAPHICS)
    }
}

impl PartialEq for QueueFamily {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for QueueFamily {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_compare_by_index() {
        let graphics = vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::GRAPHICS,
            ..Default::default()
        };
        let transfer = vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::TRANSFER,
            ..Default::default()
        };
        assert_eq!(QueueFamily::new(0, graphics), QueueFamily::new(0, transfer));
        assert_ne!(QueueFamily::new(0, graphics), QueueFamily::new(1, graphics));
        assert!(QueueFamily::new(0, graphics).supports_graphics());
        assert!(!QueueFamily::new(1, transfer).supports_graphics());
    }
}
