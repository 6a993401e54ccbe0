//! Procedural point-field generation.
//!
//! A [`PointField`] is a flat, GPU-friendly set of parallel attribute arrays
//! (positions, colors, auxiliary scalars) produced once from a [`Distribution`]
//! recipe. Layouts are stochastic: two calls with the same recipe and an
//! entropy-seeded RNG yield different clouds, so callers should reason about
//! them statistically.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::Rng;

/// Per-point phase step used by the energy shell's auxiliary channel.
const SHELL_PHASE_STEP: f32 = 0.03;

/// Distribution recipes used by the three layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Hollow spherical shell lifted above the origin (Higher layer).
    ///
    /// `radius = base_radius + random * radial_span`.
    SphericalShell {
        base_radius: f32,
        radial_span: f32,
        vertical_offset: f32,
    },
    /// Uniform-density ellipsoid volume (Physical Brain layer).
    ///
    /// Radial draws are cube-root scaled so density is uniform in volume
    /// rather than biased toward the surface.
    BrainEllipsoid {
        horizontal_scale: f32,
        vertical_scale: f32,
        vertical_offset: f32,
    },
    /// Spherical cloud compressed along Y around the torso (Physical Mind layer).
    ///
    /// Each point also gets a small random velocity bounded by `drift_speed`.
    TorsoShell {
        base_radius: f32,
        radial_span: f32,
        flattening: f32,
        drift_speed: Vec3,
    },
}

impl Distribution {
    /// Golden energy shell hovering above the figure.
    pub const ENERGY_SHELL: Self = Self::SphericalShell {
        base_radius: 5.0,
        radial_span: 3.0,
        vertical_offset: 8.0,
    };

    /// Head-level ellipsoid for the neuron cloud.
    pub const BRAIN: Self = Self::BrainEllipsoid {
        horizontal_scale: 2.5,
        vertical_scale: 2.0,
        vertical_offset: 1.0,
    };

    /// Flattened perception cloud around the torso.
    pub const TORSO: Self = Self::TorsoShell {
        base_radius: 2.0,
        radial_span: 2.0,
        flattening: 0.7,
        drift_speed: Vec3::new(0.02, 0.01, 0.02),
    };

    /// Check whether a point lies inside the recipe's bounding volume.
    ///
    /// `tolerance` absorbs floating point error at the boundary.
    pub fn contains(&self, p: Vec3, tolerance: f32) -> bool {
        match *self {
            Distribution::SphericalShell { base_radius, radial_span, vertical_offset } => {
                let r = Vec3::new(p.x, p.y - vertical_offset, p.z).length();
                r >= base_radius - tolerance && r <= base_radius + radial_span + tolerance
            }
            Distribution::BrainEllipsoid { horizontal_scale, vertical_scale, vertical_offset } => {
                let q = Vec3::new(
                    p.x / horizontal_scale,
                    (p.y - vertical_offset) / vertical_scale,
                    p.z / horizontal_scale,
                );
                q.length_squared() <= 1.0 + tolerance
            }
            Distribution::TorsoShell { base_radius, radial_span, flattening, .. } => {
                let r = Vec3::new(p.x, p.y / flattening, p.z).length();
                r >= base_radius - tolerance && r <= base_radius + radial_span + tolerance
            }
        }
    }
}

/// A generated point cloud.
///
/// All arrays are indexed in parallel by point index and are fully populated.
/// The point count never changes after generation.
#[derive(Debug, Clone)]
pub struct PointField {
    /// xyz triples, length `3 * len()`.
    pub positions: Vec<f32>,
    /// Baseline RGB triples in [0, 1], length `3 * len()`.
    pub colors: Vec<f32>,
    /// One scalar per point used to desynchronise per-point phase.
    pub auxiliary: Vec<f32>,
    /// Neuron activity in [0, 1), brain recipe only.
    pub activity: Option<Vec<f32>>,
    /// Drift velocity triples, torso recipe only.
    pub velocities: Option<Vec<f32>>,
}

impl PointField {
    fn with_capacity(count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(count * 3),
            colors: Vec::with_capacity(count * 3),
            auxiliary: Vec::with_capacity(count),
            activity: None,
            velocities: None,
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.auxiliary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auxiliary.is_empty()
    }

    /// Position of point `i`.
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[i * 3..i * 3 + 3])
    }

    /// Baseline color of point `i`.
    pub fn color(&self, i: usize) -> Vec3 {
        Vec3::from_slice(&self.colors[i * 3..i * 3 + 3])
    }

    /// Activity of point `i`, 0.0 when the recipe has no activity channel.
    pub fn activity(&self, i: usize) -> f32 {
        self.activity.as_ref().map_or(0.0, |a| a[i])
    }

    /// Total number of `f32` values held across all attribute arrays.
    pub fn float_count(&self) -> usize {
        self.positions.len()
            + self.colors.len()
            + self.auxiliary.len()
            + self.activity.as_ref().map_or(0, Vec::len)
            + self.velocities.as_ref().map_or(0, Vec::len)
    }

    /// Iterate over positions as vectors.
    pub fn iter_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions.chunks_exact(3).map(Vec3::from_slice)
    }
}

/// Generate `count` points following `recipe`.
///
/// # Panics
///
/// Panics if `count` is zero; callers control this value.
pub fn generate<R: Rng + ?Sized>(count: usize, recipe: &Distribution, rng: &mut R) -> PointField {
    assert!(count > 0, "point field needs at least one point");

    let mut field = PointField::with_capacity(count);

    match *recipe {
        Distribution::SphericalShell { base_radius, radial_span, vertical_offset } => {
            for i in 0..count {
                let radius = base_radius + rng.gen::<f32>() * radial_span;
                let p = spherical(radius, rng) + Vec3::Y * vertical_offset;
                field.positions.extend_from_slice(&p.to_array());

                // Gold-white palette with per-channel jitter.
                let intensity = 0.5 + rng.gen::<f32>() * 0.5;
                field.colors.extend_from_slice(&[
                    intensity * (0.9 + rng.gen::<f32>() * 0.1),
                    intensity * (0.8 + rng.gen::<f32>() * 0.2),
                    intensity * (0.3 + rng.gen::<f32>() * 0.4),
                ]);

                field.auxiliary.push(i as f32 * SHELL_PHASE_STEP);
            }
        }
        Distribution::BrainEllipsoid { horizontal_scale, vertical_scale, vertical_offset } => {
            let mut activity = Vec::with_capacity(count);
            for _ in 0..count {
                let theta = rng.gen::<f32>() * TAU;
                let phi = rng.gen::<f32>() * PI;
                let r = rng.gen::<f32>().cbrt();

                field.positions.extend_from_slice(&[
                    r * horizontal_scale * phi.sin() * theta.cos(),
                    r * vertical_scale * phi.cos() + vertical_offset,
                    r * horizontal_scale * phi.sin() * theta.sin(),
                ]);

                let a: f32 = rng.gen();
                activity.push(a);
                field.colors.extend_from_slice(&neuron_color(a).to_array());
                field.auxiliary.push(rng.gen());
            }
            field.activity = Some(activity);
        }
        Distribution::TorsoShell { base_radius, radial_span, flattening, drift_speed } => {
            let mut velocities = Vec::with_capacity(count * 3);
            for _ in 0..count {
                let radius = base_radius + rng.gen::<f32>() * radial_span;
                let mut p = spherical(radius, rng);
                p.y *= flattening;
                field.positions.extend_from_slice(&p.to_array());

                velocities.extend_from_slice(&[
                    (rng.gen::<f32>() - 0.5) * drift_speed.x,
                    (rng.gen::<f32>() - 0.5) * drift_speed.y,
                    (rng.gen::<f32>() - 0.5) * drift_speed.z,
                ]);

                // Teal to purple.
                let hue: f32 = rng.gen();
                field.colors.extend_from_slice(&[
                    0.1 + hue * 0.5,
                    0.6 + hue * 0.4,
                    0.8 + hue * 0.2,
                ]);

                field.auxiliary.push(rng.gen::<f32>() * TAU);
            }
            field.velocities = Some(velocities);
        }
    }

    log::debug!("generated {} points for {:?}", count, recipe);
    field
}

/// Baseline neuron color for an activity level.
pub fn neuron_color(activity: f32) -> Vec3 {
    Vec3::new(
        0.1 + activity * 0.4,
        0.2 + activity * 0.6,
        0.8 + activity * 0.2,
    )
}

/// Point on a sphere of `radius` from uniform azimuth/polar draws.
fn spherical<R: Rng + ?Sized>(radius: f32, rng: &mut R) -> Vec3 {
    let theta = rng.gen::<f32>() * TAU;
    let phi = rng.gen::<f32>() * PI;
    Vec3::new(
        radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    fn assert_colors_in_unit_range(field: &PointField) {
        for c in &field.colors {
            assert!((0.0..=1.0).contains(c), "color channel {} out of range", c);
        }
    }

    #[test]
    fn test_attribute_lengths_match_count() {
        let mut rng = rng();
        for recipe in [Distribution::ENERGY_SHELL, Distribution::BRAIN, Distribution::TORSO] {
            let field = generate(123, &recipe, &mut rng);
            assert_eq!(field.len(), 123);
            assert_eq!(field.positions.len(), 369);
            assert_eq!(field.colors.len(), 369);
            assert_eq!(field.auxiliary.len(), 123);
            assert_colors_in_unit_range(&field);
        }
    }

    #[test]
    fn test_brain_points_inside_ellipsoid() {
        let mut rng = rng();
        let field = generate(2000, &Distribution::BRAIN, &mut rng);
        for p in field.iter_positions() {
            assert!(Distribution::BRAIN.contains(p, 1e-4), "{:?} escaped the ellipsoid", p);
        }
        let activity = field.activity.as_ref().unwrap();
        assert_eq!(activity.len(), 2000);
        assert!(activity.iter().all(|a| (0.0..1.0).contains(a)));
    }

    #[test]
    fn test_brain_density_is_volumetric() {
        // With cube-root radial draws, the inner half-radius ball holds ~1/8 of the points.
        let mut rng = rng();
        let field = generate(4000, &Distribution::BRAIN, &mut rng);
        let inner = field
            .iter_positions()
            .filter(|p| {
                let q = Vec3::new(p.x / 2.5, (p.y - 1.0) / 2.0, p.z / 2.5);
                q.length() < 0.5
            })
            .count();
        let fraction = inner as f32 / 4000.0;
        assert!((0.08..0.18).contains(&fraction), "inner fraction {}", fraction);
    }

    #[test]
    fn test_energy_shell_radius_and_offset() {
        let mut rng = rng();
        let field = generate(500, &Distribution::ENERGY_SHELL, &mut rng);
        for p in field.iter_positions() {
            assert!(Distribution::ENERGY_SHELL.contains(p, 1e-3));
        }
        let mean_y: f32 = field.iter_positions().map(|p| p.y).sum::<f32>() / 500.0;
        assert!((mean_y - 8.0).abs() < 1.0, "shell should center near y=8, got {}", mean_y);
        assert!(field.activity.is_none());
        assert!((field.auxiliary[10] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_torso_is_flattened_with_bounded_velocities() {
        let mut rng = rng();
        let field = generate(800, &Distribution::TORSO, &mut rng);
        let max_y = field.iter_positions().map(|p| p.y.abs()).fold(0.0, f32::max);
        assert!(max_y <= 4.0 * 0.7 + 1e-4);

        let velocities = field.velocities.as_ref().unwrap();
        assert_eq!(velocities.len(), 2400);
        for v in velocities.chunks_exact(3) {
            assert!(v[0].abs() <= 0.01 && v[1].abs() <= 0.005 && v[2].abs() <= 0.01);
        }
        assert_colors_in_unit_range(&field);
    }

    #[test]
    #[should_panic]
    fn test_zero_count_is_rejected() {
        let mut rng = rng();
        generate(0, &Distribution::BRAIN, &mut rng);
    }
}
