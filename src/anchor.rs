//! Surface anchors created from plane detection.
//!
//! Only vertical planes anchor content, and only one anchor exists at a time.

use log::{debug, info};

use crate::error::SceneError;
use crate::scene::{EntityId, NodeDesc, Pose, SceneGraph};

pub const ANCHOR_NAME: &str = "planeAnchor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneAlignment {
    Vertical,
    Horizontal,
}

/// A plane reported by the tracking subsystem. The pose's local +Y axis is
/// the plane normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedPlane {
    pub id: PlaneId,
    pub alignment: PlaneAlignment,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub entity: EntityId,
    pub plane: PlaneId,
}

impl Anchor {
    pub fn pose(&self, scene: &SceneGraph) -> Option<Pose> {
        scene.get(self.entity).map(|n| n.local)
    }

    pub fn attach(&self, scene: &mut SceneGraph, child: NodeDesc) -> Result<EntityId, SceneError> {
        scene.spawn_child(self.entity, child)
    }
}

#[derive(Debug, Default)]
pub struct AnchorTracker {
    anchor: Option<Anchor>,
}

impl AnchorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    /// Create the anchor for the first suitable plane. Returns it only when a
    /// new anchor was created.
    pub fn on_plane_detected(&mut self, scene: &mut SceneGraph, plane: &DetectedPlane) -> Option<Anchor> {
        if plane.alignment != PlaneAlignment::Vertical {
            debug!("ignoring {:?} plane {:?}", plane.alignment, plane.id);
            return None;
        }
        if self.anchor.is_some() {
            self.on_plane_updated(scene, plane);
            return None;
        }
        let entity = scene.spawn_root(NodeDesc::named(ANCHOR_NAME).with_pose(plane.pose));
        let anchor = Anchor {
            entity,
            plane: plane.id,
        };
        info!("anchored {entity} to vertical plane {:?}", plane.id);
        self.anchor = Some(anchor);
        Some(anchor)
    }

    /// Follow pose refinements of the anchored plane.
    pub fn on_plane_updated(&mut self, scene: &mut SceneGraph, plane: &DetectedPlane) -> bool {
        match self.anchor {
            Some(anchor) if anchor.plane == plane.id => {
                scene.set_local_pose(anchor.entity, plane.pose).is_ok()
            }
            _ => false,
        }
    }

    /// Drop the anchor (and its subtree) when its plane is lost.
    pub fn on_plane_lost(&mut self, scene: &mut SceneGraph, plane: PlaneId) -> Option<Vec<EntityId>> {
        let anchor = self.anchor.filter(|a| a.plane == plane)?;
        self.anchor = None;
        info!("plane {plane:?} lost, removing anchor {}", anchor.entity);
        Some(scene.despawn_recursive(anchor.entity))
    }
}
