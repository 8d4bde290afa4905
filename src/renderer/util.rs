use glam::Vec3;

/// Angle above the horizon of a view direction
pub fn calculate_pitch(forward: Vec3) -> f32 {
    let forward = forward.normalize();
    forward.y.clamp(-1.0, 1.0).asin()
}

/// Rotation about +Y that turns -Z into the horizontal part of `forward`
pub fn calculate_yaw(forward: Vec3) -> f32 {
    let forward = forward.normalize();
    (-forward.x).atan2(-forward.z)
}

pub fn calculate_direction(pitch: f32, yaw: f32) -> Vec3 {
    Vec3::new(
        -yaw.sin() * pitch.cos(),
        pitch.sin(),
        -yaw.cos() * pitch.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn angles_round_trip_through_direction() {
        for (pitch, yaw) in [(0.0, 0.0), (0.3, 1.2), (-0.7, -2.5), (1.2, 3.0)] {
            let direction = calculate_direction(pitch, yaw);
            assert_relative_eq!(direction.length(), 1.0, epsilon = 1e-6);
            assert_relative_eq!(calculate_pitch(direction), pitch, epsilon = 1e-5);
            assert_relative_eq!(calculate_yaw(direction), yaw, epsilon = 1e-5);
        }
    }

    #[test]
    fn zero_angles_look_down_negative_z() {
        let direction = calculate_direction(0.0, 0.0);
        assert_relative_eq!(direction.x, 0.0);
        assert_relative_eq!(direction.y, 0.0);
        assert_relative_eq!(direction.z, -1.0);
    }
}
