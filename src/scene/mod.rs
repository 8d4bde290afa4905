pub mod entity;
pub mod parser;

use std::path::Path;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use glam::Vec3;
use crate::renderer::resources::geometry::VertexSet;
use crate::renderer::shader_data::ObjectUniform;
use crate::scene::entity::Entity;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scene {
    pub vertex_sets: Vec<VertexSet>,
    pub entities: Vec<Entity>,
    pub camera_eye: Option<Vec3>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read scene {}", path.display()))?;
        let scene = parser::parse(&source)
            .wrap_err_with(|| format!("Failed to parse scene {}", path.display()))?;
        log::info!(
            "Loaded scene {}: {} vertex sets, {} entities",
            path.display(),
            scene.vertex_sets.len(),
            scene.entities.len(),
        );
        Ok(scene)
    }

    /// Per-object uniforms at simulation time `elapsed`, in entity order
    pub fn object_uniforms(&self, elapsed: f32) -> Vec<ObjectUniform> {
        self.entities.iter().map(|entity| entity.update(elapsed)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::config::{SCENE_PATH, TEXTURE_PATHS};

    #[test]
    fn bundled_scene_is_valid() -> Result<()> {
        let scene = Scene::load(Path::new(SCENE_PATH))?;
        assert!(!scene.entities.is_empty());
        for entity in &scene.entities {
            assert!(entity.geometry < scene.vertex_sets.len());
            assert!(entity.texture.map_or(true, |texture| texture < TEXTURE_PATHS.len()));
        }
        assert_eq!(scene.object_uniforms(1.0).len(), scene.entities.len());
        Ok(())
    }
}
