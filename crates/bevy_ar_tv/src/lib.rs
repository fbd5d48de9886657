//! Bevy front end for `ar_tv`.
//!
//! [`ArTvPlugin`] owns one [`ArSession`] and keeps a mirror of its scene graph
//! as Bevy entities. Tracking and the selection UI talk to it with messages
//! ([`PlaneDetected`], [`PlaneLost`], [`SelectVideo`]); pointer presses on the
//! primary window become [`ScreenTap`]s and are routed through the session.

pub mod config;
pub mod native_media;
pub mod thumbnails;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use ar_tv::glam as core_math;
use ar_tv::{
    ArSession, CoordinatorConfig, DetectedPlane, DirectoryResolver, EntityId, MeshShape, PlaneId,
    PlaybackError, Pose, Ray, ScreenRays, TapOutcome, TextureId, VideoFrame, VideoId,
};
use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::window::PrimaryWindow;

pub use config::ArTvConfig;
pub use native_media::{MediaConfig, NativeMediaBackend, NativePreviewGenerator};

type SceneMaterial = ar_tv::Material;

/// A vertical or horizontal plane reported by tracking.
#[derive(Message, Debug, Clone, Copy)]
pub struct PlaneDetected(pub DetectedPlane);

#[derive(Message, Debug, Clone, Copy)]
pub struct PlaneUpdated(pub DetectedPlane);

#[derive(Message, Debug, Clone, Copy)]
pub struct PlaneLost(pub PlaneId);

/// The user picked a thumbnail. Nothing plays until the next tap.
#[derive(Message, Debug, Clone)]
pub struct SelectVideo(pub VideoId);

/// A press at a viewport position (logical pixels, origin top-left).
#[derive(Message, Debug, Clone, Copy)]
pub struct ScreenTap {
    pub position: Vec2,
}

#[derive(Message, Debug, Clone)]
pub struct TapResolved {
    pub position: Vec2,
    pub result: Result<TapOutcome, PlaybackError>,
}

/// Marks the camera whose viewport taps are routed through.
#[derive(Component, Default)]
pub struct ArCamera;

/// Bevy entity standing in for a scene graph node.
#[derive(Component, Debug, Clone, Copy)]
pub struct MirroredNode(pub EntityId);

#[derive(Resource)]
pub struct ArTv(pub ArSession);

/// Set by UI layers that currently own the pointer (egui windows, etc.).
#[derive(Resource, Default)]
pub struct TapInputBlocked(pub bool);

#[derive(Resource, Debug, Default, Clone)]
pub struct ArTvStatus {
    pub taps: u64,
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Resource, Default)]
pub struct SceneMirror {
    revision: Option<u64>,
    entities: HashMap<EntityId, Entity>,
}

impl SceneMirror {
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Clone)]
pub struct VideoTexture {
    pub image: Handle<Image>,
    pub material: Handle<StandardMaterial>,
}

/// Material handles for mirrored nodes; one per distinct simple material and
/// one per video texture.
#[derive(Resource, Default)]
pub struct MirrorMaterials {
    simple: Vec<(SceneMaterial, Handle<StandardMaterial>)>,
    video: HashMap<TextureId, VideoTexture>,
}

impl MirrorMaterials {
    pub fn video(&self, texture: TextureId) -> Option<&VideoTexture> {
        self.video.get(&texture)
    }

    pub fn video_count(&self) -> usize {
        self.video.len()
    }

    fn handle_for(
        &mut self,
        material: &SceneMaterial,
        materials: &mut Assets<StandardMaterial>,
        images: &mut Assets<Image>,
    ) -> Handle<StandardMaterial> {
        match material {
            SceneMaterial::Simple {
                color,
                roughness,
                metallic,
            } => {
                if let Some((_, handle)) = self.simple.iter().find(|(m, _)| m == material) {
                    return handle.clone();
                }
                let handle = materials.add(StandardMaterial {
                    base_color: Color::srgb(color[0], color[1], color[2]),
                    perceptual_roughness: *roughness,
                    metallic: if *metallic { 1.0 } else { 0.0 },
                    ..default()
                });
                self.simple.push((*material, handle.clone()));
                handle
            }
            SceneMaterial::Video { texture } => {
                let entry = self.video.entry(*texture).or_insert_with(|| {
                    let image = images.add(blank_image());
                    let material = materials.add(StandardMaterial {
                        base_color_texture: Some(image.clone()),
                        unlit: true,
                        ..default()
                    });
                    VideoTexture { image, material }
                });
                entry.material.clone()
            }
        }
    }
}

/// Installs the session, the scene mirror and the input systems. By default
/// the session plays files from `config.media_dir` through ffmpeg;
/// [`ArTvPlugin::with_session`] takes a prebuilt one instead.
pub struct ArTvPlugin {
    pub config: ArTvConfig,
    session: Mutex<Option<ArSession>>,
}

impl Default for ArTvPlugin {
    fn default() -> Self {
        Self::new(ArTvConfig::default())
    }
}

impl ArTvPlugin {
    pub fn new(config: ArTvConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    pub fn with_session(config: ArTvConfig, session: ArSession) -> Self {
        Self {
            config,
            session: Mutex::new(Some(session)),
        }
    }
}

fn native_session(config: &ArTvConfig) -> ArSession {
    ArSession::new(
        CoordinatorConfig { rebind: config.rebind },
        Box::new(DirectoryResolver::new(&config.media_dir)),
        Box::new(NativeMediaBackend::new(config.media())),
    )
}

impl Plugin for ArTvPlugin {
    fn build(&self, app: &mut App) {
        let session = self
            .session
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| native_session(&self.config));
        info!(
            "ar_tv: media dir {} ({} videos), rebind {:?}",
            self.config.media_dir.display(),
            self.config.catalog.len(),
            self.config.rebind
        );

        app.insert_resource(self.config.clone())
            .insert_resource(ArTv(session))
            .init_resource::<SceneMirror>()
            .init_resource::<MirrorMaterials>()
            .init_resource::<ArTvStatus>()
            .init_resource::<TapInputBlocked>()
            .add_message::<PlaneDetected>()
            .add_message::<PlaneUpdated>()
            .add_message::<PlaneLost>()
            .add_message::<SelectVideo>()
            .add_message::<ScreenTap>()
            .add_message::<TapResolved>()
            .add_systems(
                Update,
                (
                    apply_plane_messages,
                    apply_selection,
                    collect_pointer_taps,
                    dispatch_taps,
                    report_engine_errors,
                    sync_scene_mirror,
                    upload_video_frames,
                )
                    .chain(),
            )
            .add_systems(Last, release_on_exit);
    }
}

pub fn to_transform(pose: &Pose) -> Transform {
    Transform {
        translation: Vec3::from_array(pose.translation.to_array()),
        rotation: Quat::from_array(pose.rotation.to_array()),
        scale: Vec3::ONE,
    }
}

pub fn to_pose(transform: &Transform) -> Pose {
    Pose::new(
        core_math::Vec3::from_array(transform.translation.to_array()),
        core_math::Quat::from_array(transform.rotation.to_array()),
    )
}

fn to_mesh(shape: &MeshShape) -> Mesh {
    match *shape {
        MeshShape::Box { size } => Cuboid::new(size.x, size.y, size.z).into(),
        MeshShape::Plane { width, depth } => Plane3d::default().mesh().size(width, depth).into(),
    }
}

fn blank_image() -> Image {
    Image::new_fill(
        Extent3d {
            width: 2,
            height: 2,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 255],
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    )
}

/// Wrap a decoded frame as an sRGB texture. `None` when the buffer does not
/// match the frame size.
pub fn frame_image(frame: VideoFrame) -> Option<Image> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.width == 0 || frame.height == 0 || frame.rgba.len() != expected {
        return None;
    }
    Some(Image::new(
        Extent3d {
            width: frame.width,
            height: frame.height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        frame.rgba,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    ))
}

/// Rays through a Bevy camera's viewport.
pub struct CameraRays<'a> {
    pub camera: &'a Camera,
    pub transform: &'a GlobalTransform,
}

impl ScreenRays for CameraRays<'_> {
    fn ray_through(&self, point: core_math::Vec2) -> Option<Ray> {
        let ray = self
            .camera
            .viewport_to_world(self.transform, Vec2::new(point.x, point.y))
            .ok()?;
        Ray::new(
            core_math::Vec3::from_array(ray.origin.to_array()),
            core_math::Vec3::from_array(ray.direction.as_vec3().to_array()),
        )
    }
}

pub fn describe_outcome(outcome: &TapOutcome) -> String {
    match outcome {
        TapOutcome::Ignored(reason) => format!("ignored ({reason:?})"),
        TapOutcome::Started(video) => format!("started video {video}"),
        TapOutcome::Paused(video) => format!("paused video {video}"),
        TapOutcome::Resumed(video) => format!("resumed video {video}"),
        TapOutcome::Replayed(video) => format!("replayed video {video}"),
        TapOutcome::Rebound { released, bound } => format!("switched from video {released} to {bound}"),
    }
}

fn apply_plane_messages(
    mut detected: MessageReader<PlaneDetected>,
    mut updated: MessageReader<PlaneUpdated>,
    mut lost: MessageReader<PlaneLost>,
    mut ar: ResMut<ArTv>,
) {
    for PlaneDetected(plane) in detected.read() {
        if let Some(tv) = ar.0.on_plane_detected(plane) {
            info!("tv placed on plane {:?} (screen {})", plane.id, tv.screen);
        }
    }
    for PlaneUpdated(plane) in updated.read() {
        ar.0.on_plane_updated(plane);
    }
    for PlaneLost(plane) in lost.read() {
        if ar.0.on_plane_lost(*plane) {
            info!("plane {plane:?} lost; tv removed");
        }
    }
}

fn apply_selection(mut selections: MessageReader<SelectVideo>, mut ar: ResMut<ArTv>) {
    for SelectVideo(video) in selections.read() {
        ar.0.on_select(video.clone());
    }
}

fn collect_pointer_taps(
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    ui: Query<&Interaction>,
    blocked: Res<TapInputBlocked>,
    mut taps: MessageWriter<ScreenTap>,
) {
    if blocked.0 || ui.iter().any(|i| *i != Interaction::None) {
        return;
    }
    if mouse.just_pressed(MouseButton::Left)
        && let Ok(window) = windows.single()
        && let Some(position) = window.cursor_position()
    {
        taps.write(ScreenTap { position });
    }
    for touch in touches.iter_just_pressed() {
        taps.write(ScreenTap {
            position: touch.position(),
        });
    }
}

fn dispatch_taps(
    mut taps: MessageReader<ScreenTap>,
    cameras: Query<(&Camera, &GlobalTransform), With<ArCamera>>,
    mut ar: ResMut<ArTv>,
    mut status: ResMut<ArTvStatus>,
    mut resolved: MessageWriter<TapResolved>,
) {
    for tap in taps.read() {
        let Ok((camera, transform)) = cameras.single() else {
            warn!("tap ignored: expected exactly one ArCamera");
            continue;
        };
        let rays = CameraRays { camera, transform };
        let point = core_math::Vec2::new(tap.position.x, tap.position.y);
        let result = ar.0.on_tap(point, &rays);
        status.taps += 1;
        match &result {
            Ok(outcome) => {
                info!("tap at {:?}: {}", tap.position, describe_outcome(outcome));
                status.last_outcome = Some(describe_outcome(outcome));
            }
            Err(err) => {
                warn!("tap at {:?} failed: {err}", tap.position);
                status.last_error = Some(err.to_string());
            }
        }
        resolved.write(TapResolved {
            position: tap.position,
            result,
        });
    }
}

fn report_engine_errors(mut ar: ResMut<ArTv>, mut status: ResMut<ArTvStatus>) {
    if let Some(err) = ar.0.take_engine_error() {
        warn!("playback engine: {err}");
        status.last_error = Some(err);
    }
}

fn sync_scene_mirror(
    mut commands: Commands,
    ar: Res<ArTv>,
    mut mirror: ResMut<SceneMirror>,
    mut mirror_materials: ResMut<MirrorMaterials>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    let scene = ar.0.scene();
    if mirror.revision == Some(scene.revision()) {
        return;
    }
    mirror.revision = Some(scene.revision());

    let stale: Vec<EntityId> = mirror
        .entities
        .keys()
        .filter(|id| !scene.contains(**id))
        .copied()
        .collect();
    for id in stale {
        if let Some(entity) = mirror.entities.remove(&id) {
            // Children may already be gone with their parent.
            commands.entity(entity).try_despawn();
        }
    }

    let mut live_textures = HashSet::new();
    // Creation order puts parents before their children.
    for (id, node) in scene.iter() {
        let transform = to_transform(&node.local);
        if let Some(SceneMaterial::Video { texture }) = &node.material {
            live_textures.insert(*texture);
        }
        let material = node
            .material
            .as_ref()
            .map(|m| mirror_materials.handle_for(m, &mut materials, &mut images));

        if let Some(entity) = mirror.entity(id) {
            let mut entity = commands.entity(entity);
            entity.insert(transform);
            if let Some(material) = material {
                entity.insert(MeshMaterial3d(material));
            }
            continue;
        }

        let mut entity = commands.spawn((
            Name::new(node.name.clone()),
            MirroredNode(id),
            transform,
            Visibility::default(),
        ));
        if let Some(mesh) = &node.mesh {
            entity.insert(Mesh3d(meshes.add(to_mesh(mesh))));
        }
        if let Some(material) = material {
            entity.insert(MeshMaterial3d(material));
        }
        if let Some(parent) = node.parent().and_then(|p| mirror.entity(p)) {
            entity.insert(ChildOf(parent));
        }
        let entity = entity.id();
        mirror.entities.insert(id, entity);
    }

    mirror_materials.video.retain(|texture, _| live_textures.contains(texture));
}

fn upload_video_frames(
    mut ar: ResMut<ArTv>,
    mirror_materials: Res<MirrorMaterials>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some((texture, frame)) = ar.0.poll_frame() else {
        return;
    };
    let Some(video) = mirror_materials.video(texture) else {
        return;
    };
    let Some(image) = images.get_mut(&video.image) else {
        return;
    };
    if image.width() == frame.width && image.height() == frame.height {
        image.data = Some(frame.rgba);
    } else if let Some(resized) = frame_image(frame) {
        *image = resized;
        // Re-prepare the bind group against the new texture size.
        let _ = materials.get_mut(&video.material);
    }
}

fn release_on_exit(app_exit: MessageReader<AppExit>, mut ar: ResMut<ArTv>) {
    if app_exit.is_empty() {
        return;
    }
    info!("releasing playback sessions");
    ar.0.shutdown();
}
