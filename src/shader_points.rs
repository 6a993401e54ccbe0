//! Shader-driven point clouds.
//!
//! [`ShaderPoints`] binds an immutable [`PointField`] to a [`ShaderProgram`]
//! and its uniform set. Per frame the host only writes the time uniform; the
//! program derives displacement and color pulse from it and the per-point
//! auxiliary channel, so point count scales with no per-point CPU cost.

use std::sync::Arc;

use crate::material::ShaderProgram;
use crate::point_field::PointField;
use crate::uniforms::{UniformSet, UniformValue};

/// A point cloud animated entirely by its shading program.
#[derive(Clone, Debug)]
pub struct ShaderPoints {
    geometry: Arc<PointField>,
    program: Arc<ShaderProgram>,
    uniforms: UniformSet,
}

impl ShaderPoints {
    /// Wrap `geometry` with `program`.
    ///
    /// `overrides` replace the program's declared extra uniforms by name;
    /// everything else keeps the program default.
    ///
    /// # Panics
    ///
    /// Panics if an override names a uniform the program does not declare.
    pub fn new(
        geometry: Arc<PointField>,
        program: Arc<ShaderProgram>,
        overrides: &[(&str, UniformValue)],
        point_size: f32,
    ) -> Self {
        for (name, _) in overrides {
            assert!(
                program.extras.iter().any(|(declared, _)| declared == name),
                "program '{}' declares no uniform '{}'",
                program.id,
                name
            );
        }

        let extras = program.extras.iter().map(|(name, default)| {
            let value = overrides
                .iter()
                .find(|(n, _)| n == name)
                .map_or(*default, |(_, v)| *v);
            (*name, value)
        });
        let uniforms = UniformSet::for_points(point_size, extras);

        Self {
            geometry,
            program,
            uniforms,
        }
    }

    /// Per-frame hook: write the shared time uniform. Nothing else changes.
    pub fn advance(&mut self, elapsed: f32) {
        self.uniforms.set_time(elapsed);
    }

    pub fn geometry(&self) -> &PointField {
        &self.geometry
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn point_count(&self) -> usize {
        self.geometry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{ShaderLibrary, ENERGY_FIELD, NEURON};
    use crate::point_field::{generate, Distribution};
    use crate::uniforms::{SIZE, TIME};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn energy_points() -> ShaderPoints {
        let mut rng = SmallRng::seed_from_u64(2);
        let field = Arc::new(generate(64, &Distribution::ENERGY_SHELL, &mut rng));
        let program = ShaderLibrary::new().get(ENERGY_FIELD).unwrap();
        ShaderPoints::new(field, program, &[("u_lift", UniformValue::F32(0.1))], 0.1)
    }

    #[test]
    fn test_advance_writes_only_time() {
        let mut points = energy_points();
        let before: Vec<_> = points
            .uniforms()
            .iter()
            .filter(|(name, _)| *name != TIME)
            .map(|(name, v)| (name.to_string(), *v))
            .collect();
        let positions = points.geometry().positions.clone();
        let colors = points.geometry().colors.clone();

        points.advance(1.25);
        points.advance(1.5);

        assert_eq!(points.uniforms().time(), 1.5);
        assert_eq!(points.uniforms().time_writes(), 2);
        for (name, value) in before {
            assert_eq!(points.uniforms().get(&name), Some(&value));
        }
        assert_eq!(points.geometry().positions, positions);
        assert_eq!(points.geometry().colors, colors);
    }

    #[test]
    fn test_overrides_and_defaults() {
        let points = energy_points();
        assert_eq!(points.uniforms().get("u_lift"), Some(&UniformValue::F32(0.1)));
        assert_eq!(points.uniforms().get("u_opacity"), Some(&UniformValue::F32(0.8)));
        assert_eq!(points.uniforms().get(SIZE), Some(&UniformValue::F32(0.1)));
        assert_eq!(points.point_count(), 64);
    }

    #[test]
    #[should_panic]
    fn test_undeclared_override_is_rejected() {
        let mut rng = SmallRng::seed_from_u64(2);
        let field = Arc::new(generate(8, &Distribution::BRAIN, &mut rng));
        let program = ShaderLibrary::new().get(NEURON).unwrap();
        ShaderPoints::new(field, program, &[("u_lift", UniformValue::F32(0.1))], 0.05);
    }
}
