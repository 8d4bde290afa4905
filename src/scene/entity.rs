use std::f32::consts::FRAC_PI_2;
use glam::{Mat4, Quat, Vec3};
use crate::renderer::shader_data::ObjectUniform;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// Sways along X while slowly turning
    Humanoid,
    /// Spins in place
    Vehicle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    /// Index into the scene's vertex sets
    pub geometry: usize,
    pub texture: Option<usize>,
    pub position: Vec3,
    pub speed: f32,
    pub scale: Vec3,
}

impl Entity {
    const HUMANOID_TURN_RATE: f32 = 0.2;
    const VEHICLE_TURN_RATE: f32 = 2.0;

    /// Model matrix after `elapsed` seconds of simulation time
    pub fn transform(&self, elapsed: f32) -> Mat4 {
        let (translation, angle) = match self.kind {
            EntityKind::Humanoid => (
                self.position + Vec3::X * (self.speed * elapsed).sin(),
                Self::HUMANOID_TURN_RATE * elapsed * FRAC_PI_2,
            ),
            EntityKind::Vehicle => (
                self.position,
                Self::VEHICLE_TURN_RATE * self.speed * elapsed * FRAC_PI_2,
            ),
        };
        Mat4::from_scale_rotation_translation(self.scale, Quat::from_rotation_z(angle), translation)
    }

    pub fn update(&self, elapsed: f32) -> ObjectUniform {
        let texture_index = self
            .texture
            .and_then(|texture| i32::try_from(texture).ok())
            .unwrap_or(-1);
        ObjectUniform::new(self.transform(elapsed), texture_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn entity(kind: EntityKind) -> Entity {
        Entity {
            kind,
            geometry: 0,
            texture: Some(1),
            position: Vec3::new(1.0, 2.0, 3.0),
            speed: 1.5,
            scale: Vec3::new(2.0, 2.0, 2.0),
        }
    }

    #[test]
    fn update_depends_only_on_elapsed_time() {
        for kind in [EntityKind::Humanoid, EntityKind::Vehicle] {
            let entity = entity(kind);
            let first = entity.update(3.25);
            let _ = entity.update(10.0);
            assert_eq!(entity.update(3.25), first);
        }
    }

    #[test]
    fn starts_at_rest() {
        for kind in [EntityKind::Humanoid, EntityKind::Vehicle] {
            let entity = entity(kind);
            let expected = Mat4::from_scale_rotation_translation(
                entity.scale,
                Quat::IDENTITY,
                entity.position,
            );
            assert!(entity.transform(0.0).abs_diff_eq(expected, 1e-6));
        }
    }

    #[test]
    fn vehicle_turns_a_quarter_per_half_second() {
        let mut vehicle = entity(EntityKind::Vehicle);
        vehicle.speed = 1.0;
        vehicle.scale = Vec3::ONE;
        let x_axis = vehicle.transform(0.5).transform_vector3(Vec3::X);
        assert_relative_eq!(x_axis.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(x_axis.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn humanoid_sways_around_its_position() {
        let human = entity(EntityKind::Humanoid);
        let t = std::f32::consts::PI / (2.0 * human.speed);
        let origin = human.transform(t).transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, human.position.x + 1.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, human.position.y, epsilon = 1e-5);
    }

    #[test]
    fn untextured_entities_use_negative_index() {
        let mut human = entity(EntityKind::Humanoid);
        assert_eq!(human.update(0.0).texture_index, 1);
        human.texture = None;
        assert_eq!(human.update(0.0).texture_index, -1);
    }
}
