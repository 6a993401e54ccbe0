//! Materials and host-defined shading programs.
//!
//! Fixed-function materials (points, lines, meshes) carry only parameters the
//! external renderer needs. Shader-driven point clouds reference a
//! [`ShaderProgram`] from the [`ShaderLibrary`]; programs are versioned WGSL
//! kernels whose per-point math is never mirrored on the CPU.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::uniforms::UniformValue;

/// Convert a 0xRRGGBB literal to linear-ish RGB floats.
pub fn hex_color(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Blend modes for materials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlendMode {
    /// No blending, fully opaque.
    #[default]
    Opaque,
    /// Standard alpha blending.
    AlphaBlend,
    /// Additive blending (for glows, particles).
    Additive,
}

impl BlendMode {
    /// Convert to wgpu blend state.
    pub fn to_blend_state(&self) -> wgpu::BlendState {
        match self {
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
            BlendMode::AlphaBlend => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
        }
    }

    pub fn is_transparent(&self) -> bool {
        !matches!(self, BlendMode::Opaque)
    }
}

/// Material for CPU-driven point clouds (vertex colors).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsMaterial {
    pub size: f32,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub size_attenuation: bool,
}

impl PointsMaterial {
    pub fn additive(size: f32, opacity: f32) -> Self {
        Self {
            size,
            opacity,
            blend_mode: BlendMode::Additive,
            size_attenuation: true,
        }
    }
}

/// Material for line segments (vertex colors).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMaterial {
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

/// Material for solid meshes. Opacity is the animated parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshMaterial {
    pub color: [f32; 3],
    pub opacity: f32,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub double_sided: bool,
    /// Whether the material reacts to scene lights.
    pub lit: bool,
}

impl MeshMaterial {
    /// Unlit translucent material.
    pub fn basic(color: u32, opacity: f32) -> Self {
        Self {
            color: hex_color(color),
            opacity,
            emissive: [0.0; 3],
            emissive_intensity: 0.0,
            double_sided: false,
            lit: false,
        }
    }

    /// Lit translucent material glowing in its own color.
    pub fn glowing(color: u32, opacity: f32, emissive_intensity: f32) -> Self {
        Self {
            color: hex_color(color),
            opacity,
            emissive: hex_color(color),
            emissive_intensity,
            double_sided: false,
            lit: true,
        }
    }

    /// Builder: override the emissive color.
    pub fn with_emissive(mut self, emissive: u32) -> Self {
        self.emissive = hex_color(emissive);
        self
    }

    /// Builder: render both faces.
    pub fn double_sided(mut self) -> Self {
        self.double_sided = true;
        self
    }
}

/// Unique identifier for a shading program.
pub type ProgramId = &'static str;

/// A versioned WGSL kernel for shader-driven point clouds.
///
/// The program declares a uniform struct whose layout matches
/// [`crate::uniforms::UniformSet`]: time, size, then `extras` in order.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    pub id: ProgramId,
    pub version: u32,
    pub source: &'static str,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    /// Extra uniforms with their defaults, in layout order.
    pub extras: Vec<(&'static str, UniformValue)>,
    pub blend_mode: BlendMode,
    pub depth_write: bool,
}

/// Energy-field program: vertical shimmer and color pulse for the Higher layer.
pub const ENERGY_FIELD: ProgramId = "energy_field";
/// Neuron program: activity wave coloring for the brain layer.
pub const NEURON: ProgramId = "neuron";

/// Registry of built-in shading programs.
pub struct ShaderLibrary {
    programs: HashMap<ProgramId, Arc<ShaderProgram>>,
}

impl ShaderLibrary {
    /// Create a library holding the built-in programs.
    pub fn new() -> Self {
        let mut library = Self {
            programs: HashMap::new(),
        };
        library.register_builtin_programs();
        library
    }

    fn register_builtin_programs(&mut self) {
        self.register(ShaderProgram {
            id: ENERGY_FIELD,
            version: 2,
            source: include_str!("gpu/energy_field.wgsl"),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            extras: vec![
                ("u_lift", UniformValue::F32(0.06)),
                ("u_opacity", UniformValue::F32(0.8)),
            ],
            blend_mode: BlendMode::Additive,
            depth_write: false,
        });

        self.register(ShaderProgram {
            id: NEURON,
            version: 3,
            source: include_str!("gpu/neuron.wgsl"),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            extras: Vec::new(),
            blend_mode: BlendMode::Additive,
            depth_write: false,
        });
    }

    /// Register a program, replacing any previous one with the same id.
    pub fn register(&mut self, program: ShaderProgram) {
        self.programs.insert(program.id, Arc::new(program));
    }

    /// Get a program by id.
    pub fn get(&self, id: &str) -> Option<Arc<ShaderProgram>> {
        self.programs.get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.programs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Iterate over all registered programs.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ShaderProgram>> {
        self.programs.values()
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}
