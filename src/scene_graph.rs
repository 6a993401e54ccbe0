//! Scene graph hosting the renderable output of every layer.
//!
//! Entities live in a handle table keyed by [`EntityId`]. Drivers keep ids,
//! never references, and look them up each frame; a stale or missing id simply
//! resolves to `None`. Entities form a tree: destroying a node destroys its
//! subtree and releases every buffer it owned.

use std::collections::{BTreeMap, HashMap};

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::Serialize;

use crate::material::{LineMaterial, MeshMaterial, PointsMaterial};
use crate::shader_points::ShaderPoints;

/// Unique identifier for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

/// Transform component for scene entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied XYZ.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn set_uniform_scale(&mut self, s: f32) {
        self.scale = Vec3::splat(s);
    }

    /// Local matrix: Translation * Rotation * Scale.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// A flat float attribute with a re-upload flag.
#[derive(Debug, Clone)]
pub struct AttributeBuffer {
    data: Vec<f32>,
    item_size: usize,
    needs_update: bool,
}

impl AttributeBuffer {
    pub fn new(data: Vec<f32>, item_size: usize) -> Self {
        debug_assert!(item_size > 0 && data.len() % item_size == 0);
        Self {
            data,
            item_size,
            needs_update: false,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access. Callers mark the buffer dirty when done.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of items (vertices) in the buffer.
    pub fn count(&self) -> usize {
        self.data.len() / self.item_size
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.needs_update
    }

    /// Clear the flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.needs_update, false)
    }
}

/// Tessellated mesh shapes. Segment counts are chosen by the quality profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MeshShape {
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Torus {
        radius: f32,
        tube: f32,
        radial_segments: u32,
        tubular_segments: u32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        radial_segments: u32,
    },
}

/// CPU-driven point cloud with vertex colors.
#[derive(Debug, Clone)]
pub struct PointCloud {
    pub positions: AttributeBuffer,
    pub colors: AttributeBuffer,
    pub material: PointsMaterial,
}

/// Line list: every two vertices form one segment.
#[derive(Debug, Clone)]
pub struct LineSegments {
    pub positions: AttributeBuffer,
    pub colors: AttributeBuffer,
    pub material: LineMaterial,
}

impl LineSegments {
    pub fn segment_count(&self) -> usize {
        self.positions.count() / 2
    }
}

/// A mesh instance.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub shape: MeshShape,
    pub material: MeshMaterial,
}

/// Renderable payload of a scene node.
#[derive(Debug, Clone)]
pub enum SceneEntity {
    Group,
    Points(PointCloud),
    ShaderPoints(ShaderPoints),
    Lines(LineSegments),
    Mesh(Mesh),
}

impl SceneEntity {
    /// Number of attribute buffers owned by this entity.
    fn buffer_count(&self) -> usize {
        match self {
            SceneEntity::Group | SceneEntity::Mesh(_) => 0,
            SceneEntity::Points(_) | SceneEntity::Lines(_) => 2,
            SceneEntity::ShaderPoints(p) => {
                let field = p.geometry();
                3 + field.activity.is_some() as usize + field.velocities.is_some() as usize
            }
        }
    }

    /// Number of `f32` values owned by this entity's buffers.
    fn float_count(&self) -> usize {
        match self {
            SceneEntity::Group | SceneEntity::Mesh(_) => 0,
            SceneEntity::Points(p) => p.positions.len() + p.colors.len(),
            SceneEntity::Lines(l) => l.positions.len() + l.colors.len(),
            SceneEntity::ShaderPoints(p) => p.geometry().float_count(),
        }
    }
}

/// A node in the scene tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub entity: SceneEntity,
    pub transform: Transform,
    pub visible: bool,
    /// Free-form string attributes. Hosts may inject keys here; they are
    /// filtered at the render handoff and never read by layer logic.
    pub attributes: BTreeMap<String, String>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl SceneNode {
    fn new(entity: SceneEntity, transform: Transform) -> Self {
        Self {
            entity,
            transform,
            visible: true,
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn as_points_mut(&mut self) -> Option<&mut PointCloud> {
        match &mut self.entity {
            SceneEntity::Points(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_lines_mut(&mut self) -> Option<&mut LineSegments> {
        match &mut self.entity {
            SceneEntity::Lines(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.entity {
            SceneEntity::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.entity {
            SceneEntity::Mesh(m) => Some(m),
            _ => None,
        }
    }
}

/// Which attribute of an entity needs re-upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Position,
    Color,
}

/// Resource accounting for a subtree or the whole graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub entities: usize,
    pub buffers: usize,
    pub floats: usize,
}

impl std::ops::AddAssign for ResourceStats {
    fn add_assign(&mut self, rhs: Self) {
        self.entities += rhs.entities;
        self.buffers += rhs.buffers;
        self.floats += rhs.floats;
    }
}

/// The scene graph - owns every entity created by the layers.
#[derive(Debug)]
pub struct SceneGraph {
    entities: HashMap<EntityId, SceneNode>,
    /// Root entities added to the scene (will be rendered).
    scene_entities: Vec<EntityId>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            scene_entities: Vec::new(),
            next_id: 1,
        }
    }

    fn new_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create an entity, optionally as a child of `parent`.
    ///
    /// A missing parent leaves the entity detached.
    pub fn spawn(&mut self, entity: SceneEntity, transform: Transform, parent: Option<EntityId>) -> EntityId {
        let id = self.new_id();
        self.entities.insert(id, SceneNode::new(entity, transform));
        if let Some(parent) = parent {
            self.attach(id, parent);
        }
        id
    }

    pub fn create_group(&mut self, transform: Transform, parent: Option<EntityId>) -> EntityId {
        self.spawn(SceneEntity::Group, transform, parent)
    }

    pub fn create_mesh(
        &mut self,
        shape: MeshShape,
        material: MeshMaterial,
        transform: Transform,
        parent: Option<EntityId>,
    ) -> EntityId {
        self.spawn(SceneEntity::Mesh(Mesh { shape, material }), transform, parent)
    }

    /// Attach `child` under `parent`. Returns false if either is missing.
    pub fn attach(&mut self, child: EntityId, parent: EntityId) -> bool {
        if child == parent || !self.entities.contains_key(&parent) {
            return false;
        }
        let Some(node) = self.entities.get_mut(&child) else {
            return false;
        };
        let old_parent = node.parent.replace(parent);
        if let Some(old) = old_parent.and_then(|p| self.entities.get_mut(&p)) {
            old.children.retain(|&c| c != child);
        }
        if let Some(p) = self.entities.get_mut(&parent) {
            p.children.push(child);
        }
        true
    }

    /// Add a root entity to the scene (make it renderable).
    /// Returns true if the entity was added, false if already in scene or doesn't exist.
    pub fn add_to_scene(&mut self, id: EntityId) -> bool {
        if !self.entities.contains_key(&id) || self.scene_entities.contains(&id) {
            return false;
        }
        self.scene_entities.push(id);
        true
    }

    /// Remove a root from the scene without destroying it.
    pub fn remove_from_scene(&mut self, id: EntityId) -> bool {
        if let Some(pos) = self.scene_entities.iter().position(|&e| e == id) {
            self.scene_entities.remove(pos);
            true
        } else {
            false
        }
    }

    /// Destroy an entity and its whole subtree, releasing owned buffers.
    /// Returns the number of entities destroyed.
    pub fn destroy(&mut self, id: EntityId) -> usize {
        let doomed = self.descendants(id);
        if doomed.is_empty() {
            return 0;
        }
        self.remove_from_scene(id);
        if let Some(parent) = self.entities.get(&id).and_then(|n| n.parent) {
            if let Some(p) = self.entities.get_mut(&parent) {
                p.children.retain(|&c| c != id);
            }
        }
        for e in &doomed {
            self.entities.remove(e);
        }
        doomed.len()
    }

    /// `root` followed by all of its descendants, depth first.
    /// Empty if `root` does not exist.
    pub fn descendants(&self, root: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.entities.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneNode> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut SceneNode> {
        self.entities.get_mut(&id)
    }

    /// Resolve an optional handle. Unbound or stale handles yield `None`.
    pub fn resolve_mut(&mut self, handle: Option<EntityId>) -> Option<&mut SceneNode> {
        handle.and_then(|id| self.entities.get_mut(&id))
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn is_in_scene(&self, id: EntityId) -> bool {
        self.scene_entities.contains(&id)
    }

    /// Roots currently in the scene.
    pub fn roots(&self) -> &[EntityId] {
        &self.scene_entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.scene_entities.clear();
    }

    /// World matrix of an entity, walking up the parent chain.
    pub fn world_matrix(&self, id: EntityId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.entities.get(&c)) {
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// An entity is rendered only if it and all its ancestors are visible.
    pub fn is_visible(&self, id: EntityId) -> bool {
        let mut current = Some(id);
        let mut found = false;
        while let Some(node) = current.and_then(|c| self.entities.get(&c)) {
            if !node.visible {
                return false;
            }
            found = true;
            current = node.parent;
        }
        found
    }

    /// Advance every shader-driven point cloud under `root`.
    /// Returns how many were advanced.
    pub fn advance_shader_points(&mut self, root: EntityId, elapsed: f32) -> usize {
        let mut advanced = 0;
        for id in self.descendants(root) {
            if let Some(SceneEntity::ShaderPoints(points)) = self.entities.get_mut(&id).map(|n| &mut n.entity) {
                points.advance(elapsed);
                advanced += 1;
            }
        }
        advanced
    }

    /// Collect and clear every pending re-upload flag.
    pub fn take_dirty(&mut self) -> Vec<(EntityId, Attribute)> {
        let mut dirty = Vec::new();
        for (&id, node) in self.entities.iter_mut() {
            let (positions, colors) = match &mut node.entity {
                SceneEntity::Points(p) => (&mut p.positions, &mut p.colors),
                SceneEntity::Lines(l) => (&mut l.positions, &mut l.colors),
                _ => continue,
            };
            if positions.take_dirty() {
                dirty.push((id, Attribute::Position));
            }
            if colors.take_dirty() {
                dirty.push((id, Attribute::Color));
            }
        }
        dirty.sort_by_key(|(id, _)| *id);
        dirty
    }

    /// Count buffers currently flagged for re-upload.
    pub fn dirty_count(&self) -> usize {
        self.entities
            .values()
            .map(|node| match &node.entity {
                SceneEntity::Points(p) => p.positions.is_dirty() as usize + p.colors.is_dirty() as usize,
                SceneEntity::Lines(l) => l.positions.is_dirty() as usize + l.colors.is_dirty() as usize,
                _ => 0,
            })
            .sum()
    }

    /// Resources held by `root` and its descendants.
    pub fn subtree_stats(&self, root: EntityId) -> ResourceStats {
        let mut stats = ResourceStats::default();
        for id in self.descendants(root) {
            if let Some(node) = self.entities.get(&id) {
                stats += ResourceStats {
                    entities: 1,
                    buffers: node.entity.buffer_count(),
                    floats: node.entity.float_count(),
                };
            }
        }
        stats
    }

    /// Resources held by the whole graph, attached or not.
    pub fn stats(&self) -> ResourceStats {
        let mut stats = ResourceStats::default();
        for node in self.entities.values() {
            stats += ResourceStats {
                entities: 1,
                buffers: node.entity.buffer_count(),
                floats: node.entity.float_count(),
            };
        }
        stats
    }

    /// Snapshot the renderable tree for every root in the scene.
    pub fn render_tree(&self) -> Vec<RenderNode> {
        self.scene_entities
            .iter()
            .filter_map(|&id| self.render_node(id))
            .collect()
    }

    fn render_node(&self, id: EntityId) -> Option<RenderNode> {
        let node = self.entities.get(&id)?;
        let primitive = match &node.entity {
            SceneEntity::Group => RenderPrimitive::Group,
            SceneEntity::Points(p) => RenderPrimitive::Points {
                count: p.positions.count(),
                material: p.material.clone(),
            },
            SceneEntity::ShaderPoints(p) => RenderPrimitive::ShaderPoints {
                count: p.point_count(),
                program: p.program().id.to_string(),
                version: p.program().version,
                time: p.uniforms().time(),
            },
            SceneEntity::Lines(l) => RenderPrimitive::Lines {
                segments: l.segment_count(),
                material: l.material.clone(),
            },
            SceneEntity::Mesh(m) => RenderPrimitive::Mesh {
                shape: m.shape,
                material: m.material.clone(),
            },
        };
        Some(RenderNode {
            id,
            position: node.transform.position.to_array(),
            rotation: node.transform.rotation.to_array(),
            scale: node.transform.scale.to_array(),
            world: self.world_matrix(id).to_cols_array(),
            visible: node.visible,
            primitive,
            attributes: node.attributes.clone(),
            children: node.children.iter().filter_map(|&c| self.render_node(c)).collect(),
        })
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Renderer-facing snapshot of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: EntityId,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    /// Column-major world matrix.
    pub world: [f32; 16],
    pub visible: bool,
    pub primitive: RenderPrimitive,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    /// Total nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RenderNode::node_count).sum::<usize>()
    }
}

/// Primitive description inside a [`RenderNode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderPrimitive {
    Group,
    Points { count: usize, material: PointsMaterial },
    ShaderPoints { count: usize, program: String, version: u32, time: f32 },
    Lines { segments: usize, material: LineMaterial },
    Mesh { shape: MeshShape, material: MeshMaterial },
}
