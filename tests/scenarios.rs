//! End-to-end behaviour of the stream: layer lifecycle, drivers, quality
//! switches and the render handoff.
//!
//! Run with: cargo test --test scenarios

use std::f32::consts::PI;

use cognition_stream::config::StreamConfig;
use cognition_stream::connectivity::build_connectivity;
use cognition_stream::layer::{LayerKind, LayerState, LAYER_ATTRIBUTE};
use cognition_stream::point_field::PointField;
use cognition_stream::scene_graph::{RenderNode, RenderPrimitive};
use cognition_stream::stream::CognitionStream;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn config_with(layers: LayerState) -> StreamConfig {
    StreamConfig {
        layers,
        seed: Some(42),
        ..StreamConfig::default()
    }
}

fn stream(layers: LayerState, reduced: bool) -> CognitionStream {
    CognitionStream::with_quality(&config_with(layers), reduced).expect("default config is valid")
}

fn only(kind: LayerKind) -> LayerState {
    let mut state = LayerState::none();
    state.set(kind, true);
    state
}

fn layer_node(tree: &[RenderNode], kind: LayerKind) -> &RenderNode {
    tree.iter()
        .find(|n| n.attributes.get(LAYER_ATTRIBUTE).map(String::as_str) == Some(kind.name()))
        .unwrap_or_else(|| panic!("{} not in render tree", kind))
}

fn find<'a>(node: &'a RenderNode, pred: &dyn Fn(&RenderNode) -> bool) -> Option<&'a RenderNode> {
    if pred(node) {
        return Some(node);
    }
    node.children.iter().find_map(|child| find(child, pred))
}

fn square(side: f32) -> PointField {
    let points = [[0.0, 0.0, 0.0], [side, 0.0, 0.0], [0.0, side, 0.0], [side, side, 0.0]];
    PointField {
        positions: points.iter().flatten().copied().collect(),
        colors: vec![0.5; 12],
        auxiliary: vec![0.0; 4],
        activity: Some(vec![0.5; 4]),
        velocities: None,
    }
}

#[test]
fn higher_mind_at_rest_on_first_frame() {
    let mut stream = stream(LayerState::all(), false);
    let report = stream.frame(0.0);
    assert_eq!(report.layers_updated, 3);

    let tree = stream.render_tree();
    let higher = layer_node(&tree, LayerKind::HigherMind);
    assert_eq!(higher.rotation[1], 0.0);
    assert_eq!(higher.position[1], 0.0);
}

#[test]
fn mind_aura_opacity_at_pi() {
    let mut stream = stream(only(LayerKind::PhysicalMind), false);
    stream.frame(PI);

    let tree = stream.render_tree();
    let mind = layer_node(&tree, LayerKind::PhysicalMind);
    let aura = find(mind, &|n| {
        matches!(&n.primitive, RenderPrimitive::Mesh { material, .. } if material.double_sided)
    })
    .expect("aura mesh");

    let RenderPrimitive::Mesh { material, .. } = &aura.primitive else {
        unreachable!()
    };
    assert!((material.opacity - 0.1).abs() < 1e-5, "opacity {}", material.opacity);
}

#[test]
fn unmounted_layer_releases_its_entities() {
    let mut stream = stream(LayerState::all(), true);
    stream.frame(1.0);

    let root = stream.layer_root(LayerKind::PhysicalBrain).expect("brain mounted");
    let owned = stream.scene().descendants(root);
    let stats = stream.layer_stats(LayerKind::PhysicalBrain).expect("brain stats");
    assert!(stats.buffers > 0);
    assert_eq!(stats.entities, owned.len());

    stream.toggle_layer(LayerKind::PhysicalBrain);

    assert!(!stream.is_mounted(LayerKind::PhysicalBrain));
    assert!(stream.layer_stats(LayerKind::PhysicalBrain).is_none());
    for id in owned {
        assert!(!stream.scene().exists(id), "{:?} still allocated", id);
    }

    // The other layers keep running.
    let report = stream.frame(2.0);
    assert_eq!(report.layers_updated, 2);
}

#[test]
fn square_side_edges_only() {
    let mut rng = SmallRng::seed_from_u64(9);
    let field = square(1.2);

    let kept = build_connectivity(&field, 1.5, 1.0, &mut rng);
    assert_eq!(kept.edge_count(), 4);
    for edge in &kept.edges {
        let d = field.position(edge.a as usize).distance(field.position(edge.b as usize));
        assert!((d - 1.2).abs() < 1e-6, "diagonal kept: {:?}", edge);
    }

    let none = build_connectivity(&field, 1.5, 0.0, &mut rng);
    assert!(none.is_empty());
}

#[test]
fn square_retention_is_statistical() {
    let mut rng = SmallRng::seed_from_u64(17);
    let field = square(1.2);

    let trials = 2000;
    let total: usize = (0..trials)
        .map(|_| build_connectivity(&field, 1.5, 0.5, &mut rng).edge_count())
        .sum();
    let mean = total as f64 / trials as f64;
    assert!((mean - 2.0).abs() < 0.15, "mean kept edges {}", mean);
}

fn neuron_count(stream: &CognitionStream) -> usize {
    let tree = stream.render_tree();
    let brain = layer_node(&tree, LayerKind::PhysicalBrain);
    let neurons = find(brain, &|n| {
        matches!(&n.primitive, RenderPrimitive::ShaderPoints { program, .. } if program == "neuron")
    })
    .expect("neuron points");
    match neurons.primitive {
        RenderPrimitive::ShaderPoints { count, .. } => count,
        _ => unreachable!(),
    }
}

#[test]
fn quality_switch_regenerates_mounted_layers() {
    let mut stream = stream(only(LayerKind::PhysicalBrain), false);
    let before = stream.layer_root(LayerKind::PhysicalBrain);
    assert_eq!(neuron_count(&stream), 500);

    assert!(stream.set_reduced_quality(true));
    assert_eq!(neuron_count(&stream), 250);
    assert_ne!(stream.layer_root(LayerKind::PhysicalBrain), before);
    assert!(!stream.is_mounted(LayerKind::HigherMind));

    // Same flag again is a no-op.
    let root = stream.layer_root(LayerKind::PhysicalBrain);
    assert!(!stream.set_reduced_quality(true));
    assert_eq!(stream.layer_root(LayerKind::PhysicalBrain), root);
}

#[test]
fn narrow_viewport_selects_reduced_quality() {
    let config = config_with(LayerState::none());
    let mut stream = CognitionStream::new(&config, 1280, "Mozilla/5.0 (X11; Linux x86_64)").expect("stream");
    assert!(!stream.profile().reduced);

    assert!(stream.resize(600, "Mozilla/5.0 (X11; Linux x86_64)"));
    assert!(stream.profile().reduced);
    assert!(!stream.resize(600, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"));
}

#[test]
fn repeated_frames_at_same_time_are_idempotent() {
    let mut stream = stream(LayerState::all(), true);
    stream.frame(3.25);
    let first = stream.render_tree();
    stream.frame(3.25);
    let second = stream.render_tree();
    assert_eq!(first, second);
}

#[test]
fn injected_attributes_never_reach_render_tree() {
    let mut stream = stream(only(LayerKind::HigherMind), true);
    let root = stream.layer_root(LayerKind::HigherMind).expect("mounted");
    let node = stream.scene_mut().get_mut(root).expect("root exists");
    node.attributes.insert("data-lov-id".to_string(), "src/App.tsx:12".to_string());
    node.attributes.insert("data-component-id".to_string(), "x".to_string());
    node.attributes.insert("__LovHandle".to_string(), "y".to_string());

    let tree = stream.render_tree();
    let higher = layer_node(&tree, LayerKind::HigherMind);
    assert!(!higher.attributes.contains_key("data-lov-id"));
    assert!(!higher.attributes.contains_key("data-component-id"));
    assert!(!higher.attributes.contains_key("__LovHandle"));
    assert_eq!(higher.attributes.len(), 1);

    let json = stream.render_tree_json().expect("serializes");
    assert!(!json.contains("data-lov"));
    assert!(!json.contains("__LovHandle"));
}

#[test]
fn hidden_layers_are_absent() {
    let stream = stream(LayerState::none(), false);
    assert!(stream.render_tree().is_empty());
    assert!(stream.scene().is_empty());
}
