//! Top-level orchestrator.
//!
//! [`CognitionStream`] owns the scene graph and the mounted layers. The host
//! drives it with visibility records, quality changes and one [`frame`] call
//! per rendered frame, and reads back a sanitized render tree.
//!
//! [`frame`]: CognitionStream::frame

use std::collections::BTreeMap;

use anyhow::Result;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::StreamConfig;
use crate::layer::{mount_layer, Layer, LayerKind, LayerState, MountContext};
use crate::lighting::LightRig;
use crate::material::ShaderLibrary;
use crate::quality::{DeviceClassifier, QualityProfile};
use crate::sanitize::Sanitizer;
use crate::scene_graph::{EntityId, RenderNode, ResourceStats, SceneGraph};

/// Summary of one [`CognitionStream::frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub frame: u64,
    pub elapsed: f32,
    pub layers_updated: usize,
    pub shader_units_advanced: usize,
    /// CPU-owned buffers awaiting upload after this frame.
    pub dirty_buffers: usize,
}

pub struct CognitionStream {
    scene: SceneGraph,
    shaders: ShaderLibrary,
    layers: BTreeMap<LayerKind, Box<dyn Layer>>,
    visibility: LayerState,
    profile: QualityProfile,
    lights: LightRig,
    classifier: DeviceClassifier,
    sanitizer: Sanitizer,
    quality_override: Option<bool>,
    connection_threshold: f32,
    connection_retention: f64,
    rng: SmallRng,
    frame: u64,
}

impl CognitionStream {
    /// Build a stream, classifying the device from viewport width and user agent
    /// unless the config forces the quality flag.
    pub fn new(config: &StreamConfig, viewport_width: u32, user_agent: &str) -> Result<Self> {
        config.validate()?;
        let classifier = config.classifier()?;
        let reduced = config
            .reduced_quality
            .unwrap_or_else(|| classifier.classify(viewport_width, user_agent));

        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let profile = QualityProfile::for_flag(reduced);
        let mut stream = Self {
            scene: SceneGraph::new(),
            shaders: ShaderLibrary::new(),
            layers: BTreeMap::new(),
            visibility: LayerState::none(),
            profile,
            lights: LightRig::for_quality(&profile),
            classifier,
            sanitizer: config.sanitizer()?,
            quality_override: config.reduced_quality,
            connection_threshold: config.connection_threshold,
            connection_retention: config.connection_retention,
            rng,
            frame: 0,
        };
        log::info!("cognition stream created (reduced quality: {})", reduced);
        stream.set_visibility(config.layers);
        Ok(stream)
    }

    /// Build with an explicit quality flag, skipping device classification.
    pub fn with_quality(config: &StreamConfig, reduced: bool) -> Result<Self> {
        let config = StreamConfig {
            reduced_quality: Some(reduced),
            ..config.clone()
        };
        Self::new(&config, 0, "")
    }

    /// Apply a visibility record: mount layers that turned on and release the
    /// ones that turned off. Unchanged entries are left alone.
    pub fn set_visibility(&mut self, state: LayerState) {
        for kind in LayerKind::ALL {
            match (self.layers.contains_key(&kind), state.get(kind)) {
                (false, true) => self.mount(kind),
                (true, false) => self.unmount(kind),
                _ => {}
            }
        }
        self.visibility = state;
    }

    /// Flip one layer.
    pub fn toggle_layer(&mut self, kind: LayerKind) {
        let mut state = self.visibility;
        state.toggle(kind);
        self.set_visibility(state);
    }

    pub fn visibility(&self) -> LayerState {
        self.visibility
    }

    pub fn is_mounted(&self, kind: LayerKind) -> bool {
        self.layers.contains_key(&kind)
    }

    fn mount(&mut self, kind: LayerKind) {
        let ctx = MountContext {
            profile: &self.profile,
            shaders: &self.shaders,
            connection_threshold: self.connection_threshold,
            connection_retention: self.connection_retention,
        };
        let layer = mount_layer(kind, &mut self.scene, &ctx, &mut self.rng);
        self.layers.insert(kind, layer);
    }

    fn unmount(&mut self, kind: LayerKind) {
        if let Some(layer) = self.layers.remove(&kind) {
            let released = layer.root().map_or(0, |root| self.scene.destroy(root));
            log::info!("unmounted layer {} ({} entities released)", kind, released);
        }
    }

    /// Set the quality flag. A change regenerates every mounted layer.
    /// Returns whether anything changed.
    pub fn set_reduced_quality(&mut self, reduced: bool) -> bool {
        if reduced == self.profile.reduced {
            return false;
        }
        log::info!("quality changed (reduced: {}), regenerating layers", reduced);
        self.profile = QualityProfile::for_flag(reduced);
        self.lights = LightRig::for_quality(&self.profile);

        let mounted: Vec<LayerKind> = self.layers.keys().copied().collect();
        for kind in mounted {
            self.unmount(kind);
            self.mount(kind);
        }
        true
    }

    /// Re-classify after a viewport resize. A forced flag from config wins.
    pub fn resize(&mut self, viewport_width: u32, user_agent: &str) -> bool {
        let reduced = self
            .quality_override
            .unwrap_or_else(|| self.classifier.classify(viewport_width, user_agent));
        self.set_reduced_quality(reduced)
    }

    /// Run every mounted layer's driver and advance its shader units.
    pub fn frame(&mut self, elapsed: f32) -> FrameReport {
        let mut shader_units_advanced = 0;
        for layer in self.layers.values_mut() {
            layer.update(&mut self.scene, elapsed);
            if let Some(root) = layer.root() {
                shader_units_advanced += self.scene.advance_shader_points(root, elapsed);
            }
        }
        self.frame += 1;

        FrameReport {
            frame: self.frame,
            elapsed,
            layers_updated: self.layers.len(),
            shader_units_advanced,
            dirty_buffers: self.scene.dirty_count(),
        }
    }

    /// Resource accounting for one layer. `None` when it is not mounted.
    pub fn layer_stats(&self, kind: LayerKind) -> Option<ResourceStats> {
        let root = self.layer_root(kind)?;
        Some(self.scene.subtree_stats(root))
    }

    pub fn layer_root(&self, kind: LayerKind) -> Option<EntityId> {
        self.layers.get(&kind).and_then(|layer| layer.root())
    }

    /// Renderable tree with foreign attributes stripped.
    pub fn render_tree(&self) -> Vec<RenderNode> {
        let mut tree = self.scene.render_tree();
        let removed = self.sanitizer.sanitize_in_place(&mut tree);
        if removed > 0 {
            log::debug!("stripped {} foreign attributes from render tree", removed);
        }
        tree
    }

    pub fn render_tree_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.render_tree())?)
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Mutable scene access for the host (attribute injection, GPU sync).
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(reduced: bool) -> CognitionStream {
        let config = StreamConfig {
            seed: Some(7),
            ..StreamConfig::default()
        };
        CognitionStream::with_quality(&config, reduced).unwrap()
    }

    #[test]
    fn test_mounts_initial_layers() {
        let stream = seeded(true);
        for kind in LayerKind::ALL {
            assert!(stream.is_mounted(kind));
            assert!(stream.layer_stats(kind).unwrap().entities > 0);
        }
        assert_eq!(stream.scene().roots().len(), 3);
    }

    #[test]
    fn test_toggle_releases_and_remounts() {
        let mut stream = seeded(true);
        let before = stream.layer_stats(LayerKind::PhysicalBrain).unwrap();

        stream.toggle_layer(LayerKind::PhysicalBrain);
        assert!(!stream.is_mounted(LayerKind::PhysicalBrain));
        assert_eq!(stream.layer_stats(LayerKind::PhysicalBrain), None);

        stream.toggle_layer(LayerKind::PhysicalBrain);
        let after = stream.layer_stats(LayerKind::PhysicalBrain).unwrap();
        assert_eq!(after.entities, before.entities);
    }

    #[test]
    fn test_frame_report() {
        let mut stream = seeded(false);
        let report = stream.frame(0.5);
        assert_eq!(report.frame, 1);
        assert_eq!(report.layers_updated, 3);
        // energy field + neurons
        assert_eq!(report.shader_units_advanced, 2);
        // synapse colors + perception positions
        assert_eq!(report.dirty_buffers, 2);

        stream.scene_mut().take_dirty();
        stream.set_visibility(LayerState::none());
        let report = stream.frame(0.6);
        assert_eq!(report.layers_updated, 0);
        assert_eq!(report.dirty_buffers, 0);
        assert!(stream.scene().is_empty());
    }

    #[test]
    fn test_quality_change_regenerates() {
        let mut stream = seeded(false);
        let full = stream.layer_stats(LayerKind::PhysicalMind).unwrap();
        assert!(stream.set_reduced_quality(true));
        assert!(!stream.set_reduced_quality(true));
        let reduced = stream.layer_stats(LayerKind::PhysicalMind).unwrap();
        assert!(reduced.floats < full.floats);
        assert_eq!(stream.lights().point_light_count(), 1);
    }

    #[test]
    fn test_resize_respects_override() {
        let mut stream = seeded(false);
        assert!(!stream.resize(320, "iPhone"));
        assert!(!stream.profile().reduced);

        let mut stream = CognitionStream::new(&StreamConfig::default(), 1280, "desktop").unwrap();
        assert!(!stream.profile().reduced);
        assert!(stream.resize(600, "desktop"));
        assert!(stream.profile().reduced);
    }
}
