//! Mid-level objects built from the internals: geometry, textures, shaders,
//! pipelines and the uniform arena.

pub mod geometry;
pub mod pipeline;
pub mod shader;
pub mod texture;
pub mod uniform_layout;
