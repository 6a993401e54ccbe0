pub mod gpu;
pub mod scene_graph;
pub mod material;
pub mod uniforms;
pub mod shader_points;
pub mod lighting;
pub mod quality;
pub mod sanitize;
pub mod config;
pub mod stream;

// Procedural generators
pub mod point_field;
pub mod connectivity;

// Layers
pub mod layer;
pub mod higher_mind;
pub mod physical_brain;
pub mod physical_mind;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
