//! Low-level Vulkan object wrappers used to implement the resources.

pub mod buffer;
pub mod command_pool;
pub mod descriptor_set_layout_builder;
pub mod image;
pub mod render_pass;
pub mod swapchain;
