//! Layer plumbing shared by the three visual subsystems.
//!
//! A layer is mounted into the [`SceneGraph`] under its own root group and then
//! driven once per frame. Layers store only [`EntityId`] handles; every update
//! re-resolves them and skips whatever is missing.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::material::ShaderLibrary;
use crate::quality::QualityProfile;
use crate::scene_graph::{EntityId, SceneGraph, SceneNode};

/// Attribute key carrying the layer name on each layer root.
pub const LAYER_ATTRIBUTE: &str = "layer";

/// The three toggleable layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerKind {
    HigherMind,
    PhysicalBrain,
    PhysicalMind,
}

impl LayerKind {
    pub const ALL: [LayerKind; 3] = [LayerKind::HigherMind, LayerKind::PhysicalBrain, LayerKind::PhysicalMind];

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::HigherMind => "higherMind",
            LayerKind::PhysicalBrain => "physicalBrain",
            LayerKind::PhysicalMind => "physicalMind",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "higherMind" | "higher-mind" | "higher" => Ok(LayerKind::HigherMind),
            "physicalBrain" | "physical-brain" | "brain" => Ok(LayerKind::PhysicalBrain),
            "physicalMind" | "physical-mind" | "mind" => Ok(LayerKind::PhysicalMind),
            _ => Err(format!("Unknown layer: {}", s)),
        }
    }
}

/// Visibility record supplied by the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerState {
    #[serde(default = "visible")]
    pub higher_mind: bool,
    #[serde(default = "visible")]
    pub physical_brain: bool,
    #[serde(default = "visible")]
    pub physical_mind: bool,
}

fn visible() -> bool {
    true
}

impl LayerState {
    pub fn all() -> Self {
        Self {
            higher_mind: true,
            physical_brain: true,
            physical_mind: true,
        }
    }

    pub fn none() -> Self {
        Self {
            higher_mind: false,
            physical_brain: false,
            physical_mind: false,
        }
    }

    pub fn get(&self, kind: LayerKind) -> bool {
        match kind {
            LayerKind::HigherMind => self.higher_mind,
            LayerKind::PhysicalBrain => self.physical_brain,
            LayerKind::PhysicalMind => self.physical_mind,
        }
    }

    pub fn set(&mut self, kind: LayerKind, on: bool) {
        match kind {
            LayerKind::HigherMind => self.higher_mind = on,
            LayerKind::PhysicalBrain => self.physical_brain = on,
            LayerKind::PhysicalMind => self.physical_mind = on,
        }
    }

    /// Flip one entry.
    pub fn toggle(&mut self, kind: LayerKind) {
        self.set(kind, !self.get(kind));
    }

    /// Layers that are on, in canonical order.
    pub fn enabled(&self) -> impl Iterator<Item = LayerKind> + '_ {
        LayerKind::ALL.into_iter().filter(move |&kind| self.get(kind))
    }
}

impl Default for LayerState {
    fn default() -> Self {
        Self::all()
    }
}

/// Inputs threaded into every layer at mount time.
#[derive(Clone, Copy)]
pub struct MountContext<'a> {
    pub profile: &'a QualityProfile,
    pub shaders: &'a ShaderLibrary,
    pub connection_threshold: f32,
    pub connection_retention: f64,
}

/// A mounted layer and its frame-update driver.
pub trait Layer {
    fn kind(&self) -> LayerKind;

    /// Root group in the scene, if mounted.
    fn root(&self) -> Option<EntityId>;

    /// Apply the frame at `elapsed` seconds.
    ///
    /// Every output is a pure function of `elapsed` and per-entity constants,
    /// so calling twice with the same time yields the same state.
    fn update(&mut self, scene: &mut SceneGraph, elapsed: f32);
}

/// Mount `kind` into `scene`.
pub fn mount_layer<R: Rng + ?Sized>(
    kind: LayerKind,
    scene: &mut SceneGraph,
    ctx: &MountContext<'_>,
    rng: &mut R,
) -> Box<dyn Layer> {
    let layer: Box<dyn Layer> = match kind {
        LayerKind::HigherMind => Box::new(crate::higher_mind::HigherMind::mount(scene, ctx, rng)),
        LayerKind::PhysicalBrain => Box::new(crate::physical_brain::PhysicalBrain::mount(scene, ctx, rng)),
        LayerKind::PhysicalMind => Box::new(crate::physical_mind::PhysicalMind::mount(scene, ctx, rng)),
    };
    debug_assert_eq!(layer.kind(), kind);
    if let Some(root) = layer.root().and_then(|id| scene.get_mut(id)) {
        root.attributes.insert(LAYER_ATTRIBUTE.to_string(), kind.name().to_string());
    }
    log::info!("mounted layer {}", kind);
    layer
}

/// Resolve a driver handle, tracing when it is not available yet.
pub(crate) fn resolve<'a>(
    scene: &'a mut SceneGraph,
    handle: Option<EntityId>,
    what: &str,
) -> Option<&'a mut SceneNode> {
    let node = scene.resolve_mut(handle);
    if node.is_none() {
        log::trace!("skipping {}: handle not mounted", what);
    }
    node
}
