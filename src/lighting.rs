//! Scene light rig.
//!
//! Ambient fill plus a warm key point light and a cool secondary light on the
//! opposite diagonal. The secondary light is dropped on reduced quality.
//! Only lit mesh materials respond; points and lines are self-illuminated.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Serialize;

use crate::material::hex_color;
use crate::quality::QualityProfile;

/// A point light with intensity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointLight {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: u32, intensity: f32) -> Self {
        Self {
            position: position.to_array(),
            color: hex_color(color),
            intensity,
        }
    }

    fn to_gpu(self) -> ([f32; 4], [f32; 4]) {
        let [x, y, z] = self.position;
        let [r, g, b] = self.color;
        ([x, y, z, self.intensity], [r, g, b, 1.0])
    }
}

/// Lights handed to the host renderer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightRig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub key: PointLight,
    pub secondary: Option<PointLight>,
}

impl LightRig {
    pub fn for_quality(profile: &QualityProfile) -> Self {
        Self {
            ambient_color: hex_color(0x4A5FC1),
            ambient_intensity: 0.3,
            key: PointLight::new(Vec3::splat(10.0), 0xF59E0B, 1.0),
            secondary: profile
                .secondary_light
                .then(|| PointLight::new(Vec3::splat(-10.0), 0x8B5CF6, 0.5)),
        }
    }

    /// Number of point lights (ambient not counted).
    pub fn point_light_count(&self) -> usize {
        1 + self.secondary.is_some() as usize
    }

    pub fn to_uniforms(&self) -> LightingUniforms {
        let [r, g, b] = self.ambient_color;
        let (key_position, key_color) = self.key.to_gpu();
        // A missing secondary light uploads with zero intensity.
        let (fill_position, fill_color) = self
            .secondary
            .map_or(([0.0; 4], [0.0; 4]), PointLight::to_gpu);

        LightingUniforms {
            ambient: [r, g, b, self.ambient_intensity],
            key_position,
            key_color,
            fill_position,
            fill_color,
        }
    }
}

/// GPU-ready lighting uniforms, matching `Lighting` in `mesh.wgsl`.
/// Total size: 80 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightingUniforms {
    /// rgb, w = intensity.
    pub ambient: [f32; 4],
    /// xyz position, w = intensity.
    pub key_position: [f32; 4],
    pub key_color: [f32; 4],
    pub fill_position: [f32; 4],
    pub fill_color: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_rig_has_two_lights() {
        let rig = LightRig::for_quality(&QualityProfile::full());
        assert_eq!(rig.point_light_count(), 2);
        assert_eq!(rig.key.position, [10.0, 10.0, 10.0]);
        assert_eq!(rig.secondary.unwrap().intensity, 0.5);
    }

    #[test]
    fn test_reduced_rig_drops_secondary() {
        let rig = LightRig::for_quality(&QualityProfile::reduced());
        assert_eq!(rig.point_light_count(), 1);

        let uniforms = rig.to_uniforms();
        assert_eq!(uniforms.fill_position[3], 0.0);
        assert!((uniforms.ambient[3] - 0.3).abs() < 1e-6);
        assert_eq!(uniforms.key_position, [10.0, 10.0, 10.0, 1.0]);
    }

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<LightingUniforms>(), 80);
    }
}
