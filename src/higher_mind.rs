//! Higher Mind: golden energy shell above the figure.
//!
//! The shell's points go through the shader path; the CPU only moves the
//! group, the eight energy streams, and writes the time uniform.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec3;
use rand::Rng;

use crate::layer::{resolve, Layer, LayerKind, MountContext};
use crate::material::{MeshMaterial, ENERGY_FIELD};
use crate::point_field::{generate, Distribution};
use crate::scene_graph::{EntityId, MeshShape, SceneEntity, SceneGraph, Transform};
use crate::shader_points::ShaderPoints;

pub const STREAM_COUNT: usize = 8;
const STREAM_RING_RADIUS: f32 = 6.0;
const STREAM_HEIGHT: f32 = 8.0;
const POINT_SIZE: f32 = 0.1;

/// One energy stream and its fixed phase.
#[derive(Debug, Clone, Copy)]
pub struct EnergyStream {
    pub base: Vec3,
    pub phase: f32,
    handle: Option<EntityId>,
}

impl EnergyStream {
    /// Vertical offset, z-rotation and uniform scale at `time`.
    pub fn pose(&self, index: usize, time: f32) -> (f32, f32, f32) {
        let y = self.base.y + (time * 2.0 + self.phase).sin() * 0.5;
        let spin = time * 0.3 + index as f32 * 0.2;
        let scale = 1.0 + (time * 4.0 + index as f32).sin() * 0.2;
        (y, spin, scale)
    }
}

#[derive(Debug)]
pub struct HigherMind {
    root: Option<EntityId>,
    field: Option<EntityId>,
    streams: Vec<EnergyStream>,
}

impl HigherMind {
    pub fn mount<R: Rng + ?Sized>(scene: &mut SceneGraph, ctx: &MountContext<'_>, rng: &mut R) -> Self {
        let profile = ctx.profile;
        let root = scene.create_group(Transform::default(), None);

        let field = match ctx.shaders.get(ENERGY_FIELD) {
            Some(program) => {
                let geometry = Arc::new(generate(profile.energy_points, &Distribution::ENERGY_SHELL, rng));
                let points = ShaderPoints::new(geometry, program, &[], POINT_SIZE);
                Some(scene.spawn(SceneEntity::ShaderPoints(points), Transform::default(), Some(root)))
            }
            None => {
                log::warn!("shader program '{}' not registered, energy field skipped", ENERGY_FIELD);
                None
            }
        };

        let stream_shape = MeshShape::Cylinder {
            radius_top: 0.02,
            radius_bottom: 0.05,
            height: 6.0,
            radial_segments: profile.stream_radial_segments,
        };
        let streams = (0..STREAM_COUNT)
            .map(|i| {
                let angle = i as f32 / STREAM_COUNT as f32 * TAU;
                let base = Vec3::new(angle.cos() * STREAM_RING_RADIUS, STREAM_HEIGHT, angle.sin() * STREAM_RING_RADIUS);
                let handle = scene.create_mesh(
                    stream_shape,
                    MeshMaterial::glowing(0xF59E0B, 0.6, 0.3),
                    Transform::from_position(base),
                    Some(root),
                );
                EnergyStream {
                    base,
                    phase: rng.gen::<f32>() * TAU,
                    handle: Some(handle),
                }
            })
            .collect();

        let segments = profile.sphere_segments;
        scene.create_mesh(
            MeshShape::Sphere {
                radius: 1.5,
                width_segments: segments,
                height_segments: segments,
            },
            MeshMaterial::glowing(0xFEF3C7, 0.4, 0.5).with_emissive(0xF59E0B),
            Transform::from_position(Vec3::new(0.0, STREAM_HEIGHT, 0.0)),
            Some(root),
        );

        scene.add_to_scene(root);
        Self {
            root: Some(root),
            field,
            streams,
        }
    }

    pub fn streams(&self) -> &[EnergyStream] {
        &self.streams
    }

    pub fn field(&self) -> Option<EntityId> {
        self.field
    }
}

/// Group yaw and vertical bob at `time`.
pub fn group_motion(time: f32) -> (f32, f32) {
    (time * 0.1, (time * 0.5).sin() * 0.3)
}

impl Layer for HigherMind {
    fn kind(&self) -> LayerKind {
        LayerKind::HigherMind
    }

    fn root(&self) -> Option<EntityId> {
        self.root
    }

    fn update(&mut self, scene: &mut SceneGraph, elapsed: f32) {
        if let Some(group) = resolve(scene, self.root, "higher mind group") {
            let (yaw, bob) = group_motion(elapsed);
            group.transform.rotation.y = yaw;
            group.transform.position.y = bob;
        }

        for (index, stream) in self.streams.iter().enumerate() {
            let Some(node) = resolve(scene, stream.handle, "energy stream") else {
                continue;
            };
            let (y, spin, scale) = stream.pose(index, elapsed);
            node.transform.position.y = y;
            node.transform.rotation.z = spin;
            node.transform.set_uniform_scale(scale);
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

    fn mounted(profile: &QualityProfile) -> (SceneGraph, HigherMind) {
        let shaders = ShaderLibrary::new();
        let ctx = MountContext {
            profile,
            shaders: &shaders,
            connection_threshold: 1.5,
            connection_retention: 0.1,
        };
        let mut scene = SceneGraph::new();
        let layer = HigherMind::mount(&mut scene, &ctx, &mut SmallRng::seed_from_u64(9));
        (scene, layer)
    }

    #[test]
    fn test_mount_composition() {
        let profile = QualityProfile::reduced();
        let (scene, layer) = mounted(&profile);
        let root = layer.root().unwrap();

        // field + streams + core
        assert_eq!(scene.get(root).unwrap().children().len(), 1 + STREAM_COUNT + 1);
        match &scene.get(layer.field().unwrap()).unwrap().entity {
            SceneEntity::ShaderPoints(points) => {
                assert_eq!(points.point_count(), profile.energy_points);
                assert_eq!(points.program().id, ENERGY_FIELD);
            }
            other => panic!("Expected shader points, got {:?}", other),
        }
    }

    #[test]
    fn test_streams_on_ring() {
        let (_, layer) = mounted(&QualityProfile::full());
        for stream in layer.streams() {
            let radial = Vec3::new(stream.base.x, 0.0, stream.base.z).length();
            assert!((radial - STREAM_RING_RADIUS).abs() < 1e-4);
            assert!((0.0..TAU).contains(&stream.phase));
        }
    }

    #[test]
    fn test_update_at_zero() {
        let (mut scene, mut layer) = mounted(&QualityProfile::full());
        layer.update(&mut scene, 0.0);

        let group = scene.get(layer.root().unwrap()).unwrap();
        assert_eq!(group.transform.rotation.y, 0.0);
        assert_eq!(group.transform.position.y, 0.0);
    }

    #[test]
    fn test_update_is_idempotent() {
        let (mut scene, mut layer) = mounted(&QualityProfile::full());
        layer.update(&mut scene, 3.7);
        let first = scene.render_tree();
        layer.update(&mut scene, 3.7);
        assert_eq!(scene.render_tree(), first);
    }

    #[test]
    fn test_update_skips_destroyed_streams() {
        let (mut scene, mut layer) = mounted(&QualityProfile::full());
        let doomed = layer.streams[0].handle.unwrap();
        scene.destroy(doomed);
        layer.update(&mut scene, 1.0);

        let (y, _, scale) = layer.streams[1].pose(1, 1.0);
        let node = scene.get(layer.streams[1].handle.unwrap()).unwrap();
        assert_eq!(node.transform.position.y, y);
        assert_eq!(node.transform.scale, Vec3::splat(scale));
    }
}
