use std::f32::consts::FRAC_PI_2;

use ar_tv::{DetectedPlane, DirectoryResolver, PlaneAlignment, PlaneId, PreviewError, PreviewGenerator, VideoFrame, VideoId};
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task};
use bevy::window::PrimaryWindow;
use bevy_ar_tv::{
    ArCamera, ArTv, ArTvConfig, ArTvPlugin, ArTvStatus, NativePreviewGenerator, PlaneDetected,
    PlaneLost, ScreenTap, TapInputBlocked, frame_image, to_pose,
};
use bevy_ar_tv::thumbnails::{
    THUMB_WIDTH, ThumbnailLabel, highlight_selection, spawn_thumbnail_strip, thumbnail_clicks,
};
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use futures_lite::future::block_on;

const WALL_DISTANCE: f32 = 1.6;
const PREVIEW_FAILED: &str = "Failed to load video frame.";

fn main() -> anyhow::Result<()> {
    let config = ArTvConfig::from_env()?;
    let tracking = SimulatedTracking::new(config.auto_detect_secs);

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.07)))
        .insert_resource(tracking)
        .init_resource::<PreviewTasks>()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "ar_tv viewer".to_string(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(EguiPlugin::default())
        .add_plugins(ArTvPlugin::new(config))
        .add_systems(Startup, (setup_scene, spawn_thumbnails))
        .add_systems(
            Update,
            (
                simulate_tracking,
                tap_centre_on_space,
                apply_previews,
                thumbnail_clicks,
                highlight_selection,
            ),
        )
        .add_systems(EguiPrimaryContextPass, ui_status)
        .run();
    Ok(())
}

/// Stands in for AR plane detection: one wall in front of the camera that
/// can be found and lost from the keyboard.
#[derive(Resource)]
struct SimulatedTracking {
    auto_detect: Option<Timer>,
    next_plane: u64,
    active: Option<PlaneId>,
}

impl SimulatedTracking {
    fn new(auto_detect_secs: Option<f32>) -> Self {
        Self {
            auto_detect: auto_detect_secs.map(|secs| Timer::from_seconds(secs, TimerMode::Once)),
            next_plane: 1,
            active: None,
        }
    }

    fn detect(&mut self) -> Option<DetectedPlane> {
        if self.active.is_some() {
            return None;
        }
        let id = PlaneId(self.next_plane);
        self.next_plane += 1;
        self.active = Some(id);
        Some(DetectedPlane {
            id,
            alignment: PlaneAlignment::Vertical,
            pose: to_pose(&wall_transform()),
        })
    }
}

/// Wall facing the camera; local +Y (the plane normal) points back at it.
fn wall_transform() -> Transform {
    Transform::from_xyz(0.0, 0.0, -WALL_DISTANCE).with_rotation(Quat::from_rotation_x(FRAC_PI_2))
}

#[derive(Component)]
struct WallVisual;

struct PendingPreview {
    button: Entity,
    label: Entity,
    video: VideoId,
    task: Task<Result<VideoFrame, PreviewError>>,
}

#[derive(Resource, Default)]
struct PreviewTasks(Vec<PendingPreview>);

fn setup_scene(mut commands: Commands) {
    commands.spawn((Camera3d::default(), Transform::default(), ArCamera));
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(1.0, 2.0, 1.5).looking_at(Vec3::new(0.0, 0.0, -WALL_DISTANCE), Vec3::Y),
    ));
    commands.spawn((
        PointLight {
            intensity: 200_000.0,
            range: 8.0,
            ..default()
        },
        Transform::from_xyz(0.0, 0.8, -0.4),
    ));
}

fn spawn_thumbnails(mut commands: Commands, config: Res<ArTvConfig>, mut tasks: ResMut<PreviewTasks>) {
    let generator = NativePreviewGenerator::new(
        config.media(),
        DirectoryResolver::new(&config.media_dir),
        (THUMB_WIDTH * 2.0) as u32,
    );
    let pool = AsyncComputeTaskPool::get();

    let strip = spawn_thumbnail_strip(&mut commands, config.catalog.videos());
    for slot in strip.slots {
        let generator = generator.clone();
        let id = slot.video.clone();
        let task = pool.spawn(async move { generator.preview_frame(&id) });
        tasks.0.push(PendingPreview {
            button: slot.button,
            label: slot.label,
            video: slot.video,
            task,
        });
    }
}

fn apply_previews(
    mut commands: Commands,
    mut tasks: ResMut<PreviewTasks>,
    mut images: ResMut<Assets<Image>>,
    mut labels: Query<&mut Text, With<ThumbnailLabel>>,
) {
    if tasks.0.is_empty() {
        return;
    }
    let mut still_pending = Vec::new();
    for pending in tasks.0.drain(..) {
        if !pending.task.is_finished() {
            still_pending.push(pending);
            continue;
        }
        let image = match block_on(pending.task) {
            Ok(frame) => frame_image(frame),
            Err(err) => {
                warn!("preview for video {}: {err}", pending.video);
                None
            }
        };
        match image {
            Some(image) => {
                commands
                    .entity(pending.button)
                    .insert(ImageNode::new(images.add(image)));
            }
            None => {
                if let Ok(mut text) = labels.get_mut(pending.label) {
                    text.0 = PREVIEW_FAILED.to_string();
                }
            }
        }
    }
    tasks.0 = still_pending;
}

fn simulate_tracking(
    mut commands: Commands,
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    mut tracking: ResMut<SimulatedTracking>,
    mut detected: MessageWriter<PlaneDetected>,
    mut lost: MessageWriter<PlaneLost>,
    walls: Query<Entity, With<WallVisual>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let mut want_detect = keys.just_pressed(KeyCode::KeyP);
    if let Some(timer) = tracking.auto_detect.as_mut()
        && timer.tick(time.delta()).just_finished()
    {
        want_detect = true;
    }

    if want_detect && let Some(plane) = tracking.detect() {
        info!("simulated wall {:?} detected", plane.id);
        detected.write(PlaneDetected(plane));
        // Just behind the anchor so the housing reads as wall-mounted.
        let wall = wall_transform();
        commands.spawn((
            WallVisual,
            Mesh3d(meshes.add(Plane3d::default().mesh().size(6.0, 4.0))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.55, 0.53, 0.5),
                perceptual_roughness: 0.9,
                ..default()
            })),
            wall.with_translation(wall.translation + wall.rotation * Vec3::NEG_Y * 0.025),
        ));
    }

    if keys.just_pressed(KeyCode::KeyL)
        && let Some(plane) = tracking.active.take()
    {
        info!("simulated wall {plane:?} lost");
        lost.write(PlaneLost(plane));
        for wall in &walls {
            commands.entity(wall).despawn();
        }
    }
}

fn tap_centre_on_space(
    keys: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut taps: MessageWriter<ScreenTap>,
) {
    if !keys.just_pressed(KeyCode::Space) {
        return;
    }
    if let Ok(window) = windows.single() {
        taps.write(ScreenTap {
            position: Vec2::new(window.width(), window.height()) * 0.5,
        });
    }
}

fn ui_status(
    mut contexts: EguiContexts,
    mut ar: ResMut<ArTv>,
    status: Res<ArTvStatus>,
    tracking: Res<SimulatedTracking>,
    diagnostics: Res<DiagnosticsStore>,
    mut blocked: ResMut<TapInputBlocked>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("AR TV").default_width(260.0).show(ctx, |ui| {
        match tracking.active {
            Some(plane) => ui.label(format!("Wall: plane {}", plane.0)),
            None => ui.label("Wall: searching (P to detect)"),
        };
        ui.label(format!("Screen: {}", ar.0.current_state()));
        ui.label(format!(
            "Selected: {}",
            ar.0.selected().map(ToString::to_string).unwrap_or_else(|| "none".to_string())
        ));
        ui.label(format!(
            "Bound: {}",
            ar.0.bound_video().map(ToString::to_string).unwrap_or_else(|| "none".to_string())
        ));
        ui.separator();
        ui.label(format!("Taps: {}", status.taps));
        if let Some(outcome) = &status.last_outcome {
            ui.label(format!("Last tap: {outcome}"));
        }
        if let Some(err) = &status.last_error {
            ui.colored_label(egui::Color32::from_rgb(230, 110, 90), err);
        }
        ui.separator();
        if ui.button("Stop").clicked() && let Some(video) = ar.0.stop() {
            info!("stopped video {video}");
        }
        ui.label("Click the screen (or Space) to play/pause. P/L: find/lose the wall.");
        if let Some(fps) = diagnostics
            .get(&FrameTimeDiagnosticsPlugin::FPS)
            .and_then(|d| d.smoothed())
        {
            ui.label(format!("FPS: {fps:.1}"));
        }
    });
    blocked.0 = ctx.wants_pointer_input() || ctx.is_pointer_over_area();
}
