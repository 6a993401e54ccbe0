//! Physical Brain: neuron cloud, synapse graph and a translucent outline.
//!
//! Neurons are shader-driven. Synapse colors are CPU-owned and fully rewritten
//! every frame from a phase shared across the whole graph.

use std::sync::Arc;

use glam::Vec3;
use rand::Rng;

use crate::connectivity::build_connectivity;
use crate::layer::{resolve, Layer, LayerKind, MountContext};
use crate::material::{BlendMode, LineMaterial, MeshMaterial, NEURON};
use crate::point_field::{generate, Distribution};
use crate::scene_graph::{AttributeBuffer, EntityId, LineSegments, MeshShape, SceneEntity, SceneGraph, Transform};
use crate::shader_points::ShaderPoints;

pub const OUTLINE_RADIUS: f32 = 2.8;
const POINT_SIZE: f32 = 0.05;

/// Synapse tint; multiplied by the pulse intensity.
const SYNAPSE_TINT: [f32; 3] = [0.4, 0.6, 1.0];

/// Pulse intensity for the vertex pair starting at float `offset`.
///
/// The raw wave `0.2 + sin(5t + 0.01k) * 0.3` dips to -0.1. Negative vertex
/// colors display as black anyway, so the value is clamped to [0, 1] before
/// it reaches the buffer.
pub fn synapse_intensity(time: f32, offset: usize) -> f32 {
    (0.2 + (time * 5.0 + offset as f32 * 0.01).sin() * 0.3).clamp(0.0, 1.0)
}

/// Rewrite every synapse color at `time`. Each line is 6 floats (two RGB).
pub fn write_synapse_colors(colors: &mut [f32], time: f32) {
    for (pair, chunk) in colors.chunks_exact_mut(6).enumerate() {
        let intensity = synapse_intensity(time, pair * 6);
        for (i, value) in chunk.iter_mut().enumerate() {
            *value = intensity * SYNAPSE_TINT[i % 3];
        }
    }
}

/// Group yaw and uniform scale at `time`.
pub fn group_motion(time: f32) -> (f32, f32) {
    ((time * 0.2).sin() * 0.1, 1.0 + (time * 1.5).sin() * 0.05)
}

#[derive(Debug)]
pub struct PhysicalBrain {
    root: Option<EntityId>,
    outline: Option<EntityId>,
    neurons: Option<EntityId>,
    synapses: Option<EntityId>,
    edge_count: usize,
}

impl PhysicalBrain {
    pub fn mount<R: Rng + ?Sized>(scene: &mut SceneGraph, ctx: &MountContext<'_>, rng: &mut R) -> Self {
        let profile = ctx.profile;
        let root = scene.create_group(Transform::default(), None);

        let segments = profile.sphere_segments;
        let outline = scene.create_mesh(
            MeshShape::Sphere {
                radius: OUTLINE_RADIUS,
                width_segments: segments,
                height_segments: segments,
            },
            MeshMaterial::basic(0x8B5CF6, 0.1),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            Some(root),
        );

        let field = Arc::new(generate(profile.neuron_count, &Distribution::BRAIN, rng));
        let graph = build_connectivity(&field, ctx.connection_threshold, ctx.connection_retention, rng);
        let edge_count = graph.edge_count();

        let neurons = match ctx.shaders.get(NEURON) {
            Some(program) => {
                let points = ShaderPoints::new(Arc::clone(&field), program, &[], POINT_SIZE);
                Some(scene.spawn(SceneEntity::ShaderPoints(points), Transform::default(), Some(root)))
            }
            None => {
                log::warn!("shader program '{}' not registered, neurons skipped", NEURON);
                None
            }
        };

        let synapses = scene.spawn(
            SceneEntity::Lines(LineSegments {
                positions: AttributeBuffer::new(graph.line_positions, 3),
                colors: AttributeBuffer::new(graph.line_colors, 3),
                material: LineMaterial {
                    opacity: 0.6,
                    blend_mode: BlendMode::Additive,
                },
            }),
            Transform::default(),
            Some(root),
        );

        log::debug!("brain: {} neurons, {} synapses", field.len(), edge_count);
        scene.add_to_scene(root);
        Self {
            root: Some(root),
            outline: Some(outline),
            neurons,
            synapses: Some(synapses),
            edge_count,
        }
    }

    pub fn outline(&self) -> Option<EntityId> {
        self.outline
    }

    pub fn neurons(&self) -> Option<EntityId> {
        self.neurons
    }

    pub fn synapses(&self) -> Option<EntityId> {
        self.synapses
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

impl Layer for PhysicalBrain {
    fn kind(&self) -> LayerKind {
        LayerKind::PhysicalBrain
    }

    fn root(&self) -> Option<EntityId> {
        self.root
    }

    fn update(&mut self, scene: &mut SceneGraph, elapsed: f32) {
        if let Some(group) = resolve(scene, self.root, "brain group") {
            let (yaw, scale) = group_motion(elapsed);
            group.transform.rotation.y = yaw;
            group.transform.set_uniform_scale(scale);
        }

        if let Some(lines) = resolve(scene, self.synapses, "synapses").and_then(|n| n.as_lines_mut()) {
            write_synapse_colors(lines.colors.as_mut_slice(), elapsed);
            lines.colors.mark_dirty();
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

    fn mounted(profile: &QualityProfile) -> (SceneGraph, PhysicalBrain) {
        let shaders = ShaderLibrary::new();
        let ctx = MountContext {
            profile,
            shaders: &shaders,
            connection_threshold: 1.5,
            connection_retention: 0.1,
        };
        let mut scene = SceneGraph::new();
        let layer = PhysicalBrain::mount(&mut scene, &ctx, &mut SmallRng::seed_from_u64(21));
        (scene, layer)
    }

    #[test]
    fn test_intensity_stays_in_unit_range() {
        for step in 0..200 {
            let t = step as f32 * 0.137;
            for offset in [0, 6, 600, 6000] {
                let i = synapse_intensity(t, offset);
                assert!((0.0..=1.0).contains(&i));
            }
        }
    }

    #[test]
    fn test_intensity_trough_clamps_to_black() {
        let trough = 3.0 * std::f32::consts::FRAC_PI_2 / 5.0;
        assert_eq!(synapse_intensity(trough, 0), 0.0);

        let peak = std::f32::consts::FRAC_PI_2 / 5.0;
        assert!((synapse_intensity(peak, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_write_synapse_colors_pairs_match() {
        let mut colors = vec![0.0; 18];
        write_synapse_colors(&mut colors, 0.4);
        for (pair, chunk) in colors.chunks(6).enumerate() {
            let expected = synapse_intensity(0.4, pair * 6);
            assert_eq!(chunk[0..3], chunk[3..6]);
            assert!((chunk[2] - expected).abs() < 1e-6);
            assert!((chunk[0] - expected * 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_update_marks_synapses_dirty() {
        let (mut scene, mut layer) = mounted(&QualityProfile::full());
        assert!(layer.edge_count() > 0);
        scene.take_dirty();

        layer.update(&mut scene, 1.0);
        let lines = scene.get_mut(layer.synapses().unwrap()).unwrap().as_lines_mut().unwrap();
        assert!(lines.colors.is_dirty());
        assert!(!lines.positions.is_dirty());
    }

    #[test]
    fn test_outline_segments_follow_quality() {
        for (profile, expected) in [(QualityProfile::full(), 32), (QualityProfile::reduced(), 16)] {
            let (scene, layer) = mounted(&profile);
            match scene.get(layer.outline().unwrap()).unwrap().as_mesh().unwrap().shape {
                MeshShape::Sphere { width_segments, height_segments, .. } => {
                    assert_eq!(width_segments, expected);
                    assert_eq!(height_segments, expected);
                }
                other => panic!("Expected sphere, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_handles_are_skipped() {
        let (mut scene, mut layer) = mounted(&QualityProfile::reduced());
        scene.clear();
        layer.update(&mut scene, 2.0);
        assert!(scene.is_empty());
    }
}
