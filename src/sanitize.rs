//! Boundary filter for the render tree.
//!
//! Host tooling may decorate scene nodes with its own attribute keys. Those
//! keys are stripped from the snapshot before it reaches the renderer. This is
//! a pure tree transform; nothing in the animation path reads attributes.

use regex::Regex;

use crate::scene_graph::RenderNode;

/// Keys matching this pattern are considered foreign. Matching ignores case.
pub const FOREIGN_ATTRIBUTE_PATTERN: &str = r"(?i)^(data-lov|__lov|data-component-id)|lov";

/// Strips foreign attribute keys from [`RenderNode`] trees.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    foreign: Regex,
}

impl Sanitizer {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            foreign: Regex::new(pattern)?,
        })
    }

    pub fn is_foreign(&self, key: &str) -> bool {
        self.foreign.is_match(key)
    }

    /// Return a copy of `nodes` with every foreign key removed at every depth.
    pub fn sanitize(&self, nodes: &[RenderNode]) -> Vec<RenderNode> {
        nodes.iter().map(|node| self.sanitize_node(node)).collect()
    }

    fn sanitize_node(&self, node: &RenderNode) -> RenderNode {
        let mut clean = node.clone();
        clean.attributes.retain(|key, _| !self.is_foreign(key));
        clean.children = self.sanitize(&node.children);
        clean
    }

    /// In-place variant; returns how many keys were removed.
    pub fn sanitize_in_place(&self, nodes: &mut [RenderNode]) -> usize {
        let mut removed = 0;
        for node in nodes {
            let before = node.attributes.len();
            node.attributes.retain(|key, _| !self.foreign.is_match(key));
            removed += before - node.attributes.len();
            removed += self.sanitize_in_place(&mut node.children);
        }
        removed
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(FOREIGN_ATTRIBUTE_PATTERN).expect("built-in attribute pattern is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{SceneGraph, Transform};

    fn tagged_tree() -> Vec<RenderNode> {
        let mut scene = SceneGraph::new();
        let root = scene.create_group(Transform::default(), None);
        let child = scene.create_group(Transform::default(), Some(root));
        scene.add_to_scene(root);

        for (id, key) in [
            (root, "data-lov-id"),
            (root, "name"),
            (root, "DATA-COMPONENT-ID"),
            (child, "__lovHandle"),
            (child, "data-component-id"),
            (child, "x-lovable-meta"),
            (child, "__LovHandle"),
            (child, "layer"),
        ] {
            scene.get_mut(id).unwrap().attributes.insert(key.to_string(), "1".to_string());
        }
        scene.render_tree()
    }

    #[test]
    fn test_foreign_keys() {
        let sanitizer = Sanitizer::default();
        assert!(sanitizer.is_foreign("data-lov-name"));
        assert!(sanitizer.is_foreign("__lovSource"));
        assert!(sanitizer.is_foreign("data-component-id"));
        assert!(sanitizer.is_foreign("lovable"));
        assert!(!sanitizer.is_foreign("data-layer"));
    }

    #[test]
    fn test_foreign_keys_ignore_case() {
        let sanitizer = Sanitizer::default();
        for key in ["data-LOV-id", "__LovHandle", "Lovable", "DATA-COMPONENT-ID", "Data-Lov-Name"] {
            assert!(sanitizer.is_foreign(key), "{} should be foreign", key);
        }
        assert!(!sanitizer.is_foreign("Layer"));
        assert!(!sanitizer.is_foreign("DATA-LAYER"));
        assert!(!sanitizer.is_foreign("opacity"));
    }

    #[test]
    fn test_strips_at_every_depth() {
        let sanitizer = Sanitizer::default();
        let clean = sanitizer.sanitize(&tagged_tree());

        let root = &clean[0];
        assert_eq!(root.attributes.keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(root.children[0].attributes.keys().collect::<Vec<_>>(), vec!["layer"]);
    }

    #[test]
    fn test_in_place_counts_removed() {
        let sanitizer = Sanitizer::default();
        let mut tree = tagged_tree();
        assert_eq!(sanitizer.sanitize_in_place(&mut tree), 6);
        assert_eq!(sanitizer.sanitize_in_place(&mut tree), 0);
    }
}
