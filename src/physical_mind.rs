//! Physical Mind: teal aura, perception rings and drifting perception particles.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec3;
use rand::Rng;

use crate::layer::{resolve, Layer, LayerKind, MountContext};
use crate::material::{MeshMaterial, PointsMaterial};
use crate::point_field::{generate, Distribution};
use crate::scene_graph::{AttributeBuffer, EntityId, MeshShape, PointCloud, SceneEntity, SceneGraph, Transform};

pub const PATTERN_COUNT: usize = 5;
const INTERPRETATION_STREAMS: usize = 6;

/// Scales the per-point velocity into a drift excursion.
pub const DRIFT_SPAN: f32 = 30.0;

/// One perception ring's constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionPattern {
    pub radius: f32,
    pub speed: f32,
    pub phase: f32,
    pub base_opacity: f32,
}

impl PerceptionPattern {
    pub fn nth(i: usize) -> Self {
        let f = i as f32;
        Self {
            radius: 3.0 + f * 0.8,
            speed: 1.0 + f * 0.3,
            phase: f / PATTERN_COUNT as f32 * TAU,
            base_opacity: 0.3 - f * 0.05,
        }
    }

    /// z-rotation, uniform scale and opacity at `time`.
    pub fn pose(&self, time: f32) -> (f32, f32, f32) {
        let phase = time * self.speed + self.phase;
        let scale = 1.0 + (phase * 2.0).sin() * 0.2;
        let opacity = self.base_opacity * (0.5 + (phase * 3.0).sin() * 0.3);
        (phase, scale, opacity)
    }
}

/// Aura opacity and uniform scale at `time`.
pub fn aura_pulse(time: f32) -> (f32, f32) {
    (0.2 + (time * 1.5).sin() * 0.1, 1.0 + (time * 2.0).sin() * 0.1)
}

#[derive(Debug)]
struct Ring {
    pattern: PerceptionPattern,
    handle: Option<EntityId>,
}

/// Rest state of the CPU-driven particles.
#[derive(Debug, Default)]
struct Drift {
    rest: Vec<f32>,
    velocities: Vec<f32>,
    phases: Vec<f32>,
}

impl Drift {
    fn write(&self, positions: &mut [f32], time: f32) {
        for (i, ((out, rest), v)) in positions
            .chunks_exact_mut(3)
            .zip(self.rest.chunks_exact(3))
            .zip(self.velocities.chunks_exact(3))
            .enumerate()
        {
            let sway = DRIFT_SPAN * (time * 0.5 + self.phases[i]).sin();
            for k in 0..3 {
                out[k] = rest[k] + v[k] * sway;
            }
        }
    }
}

#[derive(Debug)]
pub struct PhysicalMind {
    root: Option<EntityId>,
    aura: Option<EntityId>,
    particles: Option<EntityId>,
    rings: Vec<Ring>,
    drift: Drift,
}

impl PhysicalMind {
    pub fn mount<R: Rng + ?Sized>(scene: &mut SceneGraph, ctx: &MountContext<'_>, rng: &mut R) -> Self {
        let profile = ctx.profile;
        let root = scene.create_group(Transform::default(), None);
        let segments = profile.sphere_segments;

        let aura = scene.create_mesh(
            MeshShape::Sphere {
                radius: 4.0,
                width_segments: segments,
                height_segments: segments,
            },
            MeshMaterial::basic(0x20B2AA, 0.15).double_sided(),
            Transform::default(),
            Some(root),
        );

        let rings = (0..PATTERN_COUNT)
            .map(|i| {
                let pattern = PerceptionPattern::nth(i);
                let handle = scene.create_mesh(
                    MeshShape::Torus {
                        radius: pattern.radius,
                        tube: 0.1,
                        radial_segments: profile.torus_radial_segments,
                        tubular_segments: profile.torus_tubular_segments,
                    },
                    MeshMaterial::glowing(0x8B5CF6, pattern.base_opacity, 0.2),
                    Transform::default().with_rotation(Vec3::new(FRAC_PI_2, 0.0, 0.0)),
                    Some(root),
                );
                Ring {
                    pattern,
                    handle: Some(handle),
                }
            })
            .collect();

        let field = generate(profile.perception_particles, &Distribution::TORSO, rng);
        let drift = Drift {
            rest: field.positions.clone(),
            velocities: field.velocities.clone().unwrap_or_else(|| vec![0.0; field.positions.len()]),
            phases: field.auxiliary.clone(),
        };
        let particles = scene.spawn(
            SceneEntity::Points(PointCloud {
                positions: AttributeBuffer::new(field.positions, 3),
                colors: AttributeBuffer::new(field.colors, 3),
                material: PointsMaterial::additive(0.03, 0.7),
            }),
            Transform::default(),
            Some(root),
        );

        scene.create_mesh(
            MeshShape::Sphere {
                radius: 0.8,
                width_segments: segments / 2,
                height_segments: segments / 2,
            },
            MeshMaterial::glowing(0x20B2AA, 0.4, 0.3),
            Transform::default(),
            Some(root),
        );

        let stream_segments = profile.stream_radial_segments.min(6);
        for i in 0..INTERPRETATION_STREAMS {
            let angle = i as f32 / INTERPRETATION_STREAMS as f32 * TAU;
            let position = Vec3::new(angle.cos() * 2.0, (i as f32 * 0.5).sin() * 0.5, angle.sin() * 2.0);
            scene.create_mesh(
                MeshShape::Cylinder {
                    radius_top: 0.01,
                    radius_bottom: 0.03,
                    height: 3.0,
                    radial_segments: stream_segments,
                },
                MeshMaterial::glowing(0x20B2AA, 0.6, 0.4),
                Transform::from_position(position).with_rotation(Vec3::new(0.0, angle, 0.0)),
                Some(root),
            );
        }

        scene.add_to_scene(root);
        Self {
            root: Some(root),
            aura: Some(aura),
            particles: Some(particles),
            rings,
            drift,
        }
    }

    pub fn aura(&self) -> Option<EntityId> {
        self.aura
    }

    pub fn particles(&self) -> Option<EntityId> {
        self.particles
    }

    /// Ring handles paired with their pattern, in pattern order.
    pub fn rings(&self) -> impl Iterator<Item = (PerceptionPattern, Option<EntityId>)> + '_ {
        self.rings.iter().map(|r| (r.pattern, r.handle))
    }
}

impl Layer for PhysicalMind {
    fn kind(&self) -> LayerKind {
        LayerKind::PhysicalMind
    }

    fn root(&self) -> Option<EntityId> {
        self.root
    }

    fn update(&mut self, scene: &mut SceneGraph, elapsed: f32) {
        if let Some(group) = resolve(scene, self.root, "mind group") {
            group.transform.rotation.y = elapsed * 0.1;
        }

        if let Some(node) = resolve(scene, self.aura, "aura") {
            let (opacity, scale) = aura_pulse(elapsed);
            node.transform.set_uniform_scale(scale);
            if let Some(mesh) = node.as_mesh_mut() {
                mesh.material.opacity = opacity;
            }
        }

        for ring in &self.rings {
            let Some(node) = resolve(scene, ring.handle, "perception ring") else {
                continue;
            };
            let (spin, scale, opacity) = ring.pattern.pose(elapsed);
            node.transform.rotation.z = spin;
            node.transform.set_uniform_scale(scale);
            if let Some(mesh) = node.as_mesh_mut() {
                mesh.material.opacity = opacity;
            }
        }

        if let Some(cloud) = resolve(scene, self.particles, "perception particles").and_then(|n| n.as_points_mut()) {
            self.drift.write(cloud.positions.as_mut_slice(), elapsed);
            cloud.positions.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::ShaderLibrary;
    use crate::quality::QualityProfile;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::f32::consts::PI;

    fn mounted() -> (SceneGraph, PhysicalMind) {
        let profile = QualityProfile::full();
        let shaders = ShaderLibrary::new();
        let ctx = MountContext {
            profile: &profile,
            shaders: &shaders,
            connection_threshold: 1.5,
            connection_retention: 0.1,
        };
        let mut scene = SceneGraph::new();
        let layer = PhysicalMind::mount(&mut scene, &ctx, &mut SmallRng::seed_from_u64(4));
        (scene, layer)
    }

    #[test]
    fn test_patterns() {
        let first = PerceptionPattern::nth(0);
        assert_eq!(first.radius, 3.0);
        assert_eq!(first.phase, 0.0);
        let last = PerceptionPattern::nth(4);
        assert!((last.radius - 6.2).abs() < 1e-5);
        assert!((last.speed - 2.2).abs() < 1e-5);
        assert!((last.base_opacity - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_aura_opacity_at_pi() {
        let (mut scene, mut layer) = mounted();
        layer.update(&mut scene, PI);
        let aura = scene.get(layer.aura().unwrap()).unwrap().as_mesh().unwrap();
        assert!((aura.material.opacity - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_rings_are_independent() {
        let (mut scene, mut layer) = mounted();
        let handles: Vec<_> = layer.rings().collect();
        scene.destroy(handles[2].1.unwrap());
        layer.update(&mut scene, 1.3);

        for (pattern, handle) in handles.into_iter().filter(|(_, h)| scene.exists(h.unwrap())) {
            let node = scene.get(handle.unwrap()).unwrap();
            let (spin, scale, opacity) = pattern.pose(1.3);
            assert_eq!(node.transform.rotation.z, spin);
            assert_eq!(node.transform.scale.x, scale);
            assert_eq!(node.as_mesh().unwrap().material.opacity, opacity);
            // The lay-flat tilt is preserved.
            assert_eq!(node.transform.rotation.x, FRAC_PI_2);
        }
    }

    #[test]
    fn test_drift_is_closed_form() {
        let (mut scene, mut layer) = mounted();
        let id = layer.particles().unwrap();

        layer.update(&mut scene, 5.0);
        let first = scene.get_mut(id).unwrap().as_points_mut().unwrap().positions.as_slice().to_vec();
        layer.update(&mut scene, 9.0);
        layer.update(&mut scene, 5.0);
        let cloud = scene.get_mut(id).unwrap().as_points_mut().unwrap();
        assert_eq!(cloud.positions.as_slice(), &first[..]);
        assert!(cloud.positions.is_dirty());
    }

    #[test]
    fn test_drift_stays_near_rest() {
        let (mut scene, mut layer) = mounted();
        let id = layer.particles().unwrap();
        layer.update(&mut scene, 2.0);
        let cloud = scene.get_mut(id).unwrap().as_points_mut().unwrap();
        for (p, rest) in cloud.positions.as_slice().iter().zip(&layer.drift.rest) {
            assert!((p - rest).abs() <= 0.01 * DRIFT_SPAN + 1e-5);
        }
    }
}
