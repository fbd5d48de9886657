//! Arena-backed scene graph.
//!
//! Nodes form an explicit ownership tree (anchor -> housing -> screen). Every
//! node has at most one parent; removing a node removes its whole subtree.
//! Ids are never reused, so a stale [`EntityId`] simply stops resolving.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Affine3A, Quat, Vec2, Vec3};

use crate::error::SceneError;
use crate::playback::TextureId;

/// Stable handle to a node in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rigid transform (no scale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn to_affine(self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.translation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Render geometry attached to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshShape {
    /// Axis-aligned box centred on the node origin.
    Box { size: Vec3 },
    /// XZ plane facing +Y, centred on the node origin.
    Plane { width: f32, depth: f32 },
}

/// Pick geometry, expressed in the node's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Cuboid { half_extents: Vec3 },
    Plane { half_size: Vec2 },
}

impl Collider {
    pub fn from_mesh(mesh: &MeshShape) -> Self {
        match *mesh {
            MeshShape::Box { size } => Collider::Cuboid {
                half_extents: size * 0.5,
            },
            MeshShape::Plane { width, depth } => Collider::Plane {
                half_size: Vec2::new(width, depth) * 0.5,
            },
        }
    }
}

/// Visual appearance of a renderable node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    Simple {
        /// sRGB color.
        color: [f32; 3],
        roughness: f32,
        metallic: bool,
    },
    /// Live output of a playback session.
    Video { texture: TextureId },
}

impl Material {
    pub fn is_video(&self) -> bool {
        matches!(self, Material::Video { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub local: Pose,
    pub mesh: Option<MeshShape>,
    pub material: Option<Material>,
    pub collider: Option<Collider>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl Node {
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }
}

/// Description of a node to insert.
#[derive(Debug, Clone, Default)]
pub struct NodeDesc {
    pub name: String,
    pub local: Pose,
    pub mesh: Option<MeshShape>,
    pub material: Option<Material>,
}

impl NodeDesc {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_pose(mut self, local: Pose) -> Self {
        self.local = local;
        self
    }

    pub fn with_mesh(mut self, mesh: MeshShape, material: Material) -> Self {
        self.mesh = Some(mesh);
        self.material = Some(material);
        self
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<EntityId, Node>,
    next_id: u64,
    revision: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every structural or material change; mirrors poll this.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn name(&self, id: EntityId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    /// Nodes in creation order; parents always precede their children.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn spawn_root(&mut self, desc: NodeDesc) -> EntityId {
        self.insert(desc, None)
    }

    pub fn spawn_child(&mut self, parent: EntityId, desc: NodeDesc) -> Result<EntityId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::UnknownEntity(parent));
        }
        let id = self.insert(desc, Some(parent));
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    fn insert(&mut self, desc: NodeDesc, parent: Option<EntityId>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name: desc.name,
                local: desc.local,
                mesh: desc.mesh,
                material: desc.material,
                collider: None,
                parent,
                children: Vec::new(),
            },
        );
        self.revision += 1;
        id
    }

    /// Remove `id` and its whole subtree. Returns removed ids, root first.
    pub fn despawn_recursive(&mut self, id: EntityId) -> Vec<EntityId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        if let Some(parent) = node.parent
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().rev().copied());
                removed.push(current);
            }
        }
        self.revision += 1;
        removed
    }

    /// First descendant of `root` (or `root` itself) carrying `name`.
    pub fn find_in_subtree(&self, root: EntityId, name: &str) -> Option<EntityId> {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let node = self.nodes.get(&current)?;
            if node.name == name {
                return Some(current);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    pub fn set_local_pose(&mut self, id: EntityId, pose: Pose) -> Result<(), SceneError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(SceneError::UnknownEntity(id))?;
        node.local = pose;
        self.revision += 1;
        Ok(())
    }

    pub fn material(&self, id: EntityId) -> Option<Material> {
        self.nodes.get(&id).and_then(|n| n.material)
    }

    pub fn set_material(&mut self, id: EntityId, material: Material) -> Result<(), SceneError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(SceneError::UnknownEntity(id))?;
        node.material = Some(material);
        self.revision += 1;
        Ok(())
    }

    /// Derive pick colliders from render meshes, optionally for the whole subtree.
    pub fn generate_collision_shapes(&mut self, id: EntityId, recursive: bool) -> Result<(), SceneError> {
        if !self.contains(id) {
            return Err(SceneError::UnknownEntity(id));
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            if let Some(mesh) = node.mesh.as_ref() {
                node.collider = Some(Collider::from_mesh(mesh));
            }
            if recursive {
                stack.extend(node.children.iter().copied());
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// Compose local poses from the root down to `id`.
    pub fn world_transform(&self, id: EntityId) -> Option<Affine3A> {
        let mut node = self.nodes.get(&id)?;
        let mut world = node.local.to_affine();
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            world = node.local.to_affine() * world;
        }
        Some(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black() -> Material {
        Material::Simple {
            color: [0.0; 3],
            roughness: 0.5,
            metallic: false,
        }
    }

    #[test]
    fn despawn_removes_subtree_and_detaches_from_parent() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn_root(NodeDesc::named("root"));
        let a = scene.spawn_child(root, NodeDesc::named("a")).unwrap();
        let b = scene.spawn_child(a, NodeDesc::named("b")).unwrap();
        let c = scene.spawn_child(root, NodeDesc::named("c")).unwrap();

        let removed = scene.despawn_recursive(a);
        assert_eq!(removed, vec![a, b]);
        assert!(!scene.contains(b));
        assert_eq!(scene.get(root).unwrap().children(), &[c]);
    }

    #[test]
    fn spawn_child_of_unknown_parent_fails() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn_root(NodeDesc::named("root"));
        scene.despawn_recursive(root);
        assert!(matches!(
            scene.spawn_child(root, NodeDesc::named("orphan")),
            Err(SceneError::UnknownEntity(id)) if id == root
        ));
        assert!(scene.is_empty());
    }

    #[test]
    fn world_transform_composes_parents() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn_root(NodeDesc::named("root").with_pose(Pose::new(
            Vec3::new(0.0, 0.0, -2.0),
            Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
        )));
        let child = scene
            .spawn_child(
                root,
                NodeDesc::named("child").with_pose(Pose::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            )
            .unwrap();

        let world = scene.world_transform(child).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5, "{origin:?}");
    }

    #[test]
    fn collision_shapes_follow_meshes() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn_root(
            NodeDesc::named("box").with_mesh(MeshShape::Box { size: Vec3::new(2.0, 4.0, 6.0) }, black()),
        );
        let plane = scene
            .spawn_child(
                root,
                NodeDesc::named("plane").with_mesh(MeshShape::Plane { width: 1.0, depth: 3.0 }, black()),
            )
            .unwrap();

        scene.generate_collision_shapes(root, false).unwrap();
        assert!(scene.get(plane).unwrap().collider.is_none());

        scene.generate_collision_shapes(root, true).unwrap();
        assert_eq!(
            scene.get(root).unwrap().collider,
            Some(Collider::Cuboid { half_extents: Vec3::new(1.0, 2.0, 3.0) })
        );
        assert_eq!(
            scene.get(plane).unwrap().collider,
            Some(Collider::Plane { half_size: Vec2::new(0.5, 1.5) })
        );
    }

    #[test]
    fn revision_tracks_material_changes() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn_root(NodeDesc::named("root"));
        let before = scene.revision();
        scene.set_material(root, black()).unwrap();
        assert!(scene.revision() > before);
    }
}
