//! The television: a black housing box with a named screen plane on its +Y face.

use glam::Vec3;
use log::info;

use crate::anchor::Anchor;
use crate::error::SceneError;
use crate::scene::{EntityId, Material, MeshShape, NodeDesc, Pose, SceneGraph};

pub const HOUSING_NAME: &str = "tvHousing";
pub const SCREEN_NAME: &str = "tvScreen";

/// Housing size: width, thickness, depth.
pub const TV_SIZE: Vec3 = Vec3::new(1.23 / 2.0, 0.046 / 2.0, 0.7 / 2.0);

/// Outward offset of the screen above the housing face (z-fighting).
pub const SCREEN_EPSILON: f32 = 0.001;

pub fn housing_material() -> Material {
    Material::Simple {
        color: [0.0, 0.0, 0.0],
        roughness: 0.4,
        metallic: false,
    }
}

/// The inert "off" look of the screen.
pub fn screen_off_material() -> Material {
    Material::Simple {
        color: [0.0, 0.0, 0.0],
        roughness: 0.2,
        metallic: false,
    }
}

pub fn screen_offset() -> Vec3 {
    Vec3::new(0.0, TV_SIZE.y / 2.0 + SCREEN_EPSILON, 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TvObject {
    pub housing: EntityId,
    pub screen: EntityId,
}

impl TvObject {
    /// Build the TV under `anchor`. A second call for the same anchor returns
    /// the TV that is already there.
    pub fn spawn(scene: &mut SceneGraph, anchor: &Anchor) -> Result<TvObject, SceneError> {
        if let Some(existing) = Self::find(scene, anchor) {
            return Ok(existing);
        }

        let housing = anchor.attach(
            scene,
            NodeDesc::named(HOUSING_NAME).with_mesh(MeshShape::Box { size: TV_SIZE }, housing_material()),
        )?;
        let screen = scene.spawn_child(
            housing,
            NodeDesc::named(SCREEN_NAME)
                .with_pose(Pose::from_translation(screen_offset()))
                .with_mesh(
                    MeshShape::Plane {
                        width: TV_SIZE.x,
                        depth: TV_SIZE.z,
                    },
                    screen_off_material(),
                ),
        )?;
        scene.generate_collision_shapes(housing, true)?;

        info!("spawned tv housing={housing} screen={screen} under {}", anchor.entity);
        Ok(TvObject { housing, screen })
    }

    pub fn find(scene: &SceneGraph, anchor: &Anchor) -> Option<TvObject> {
        let housing = scene
            .get(anchor.entity)?
            .children()
            .iter()
            .copied()
            .find(|child| scene.name(*child) == Some(HOUSING_NAME))?;
        let screen = scene.find_in_subtree(housing, SCREEN_NAME)?;
        Some(TvObject { housing, screen })
    }
}
