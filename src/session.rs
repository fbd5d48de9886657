//! One AR session: scene, anchor tracking, the TV and the coordinator.
//!
//! This is the surface the host drives: plane events from tracking, selection
//! events from the thumbnail strip, and raw taps from the input layer.

use glam::Vec2;
use log::{debug, info};

use crate::anchor::{AnchorTracker, DetectedPlane, PlaneId};
use crate::coordinator::{
    CoordinatorConfig, IgnoredTap, InteractionCoordinator, InteractionState, TapOutcome,
};
use crate::error::PlaybackError;
use crate::picking::{HitRouter, ScreenRays};
use crate::playback::{MediaBackend, SourceResolver, TextureId, VideoFrame, VideoId};
use crate::scene::SceneGraph;
use crate::tv::TvObject;

pub struct ArSession {
    scene: SceneGraph,
    anchors: AnchorTracker,
    tv: Option<TvObject>,
    router: HitRouter,
    coordinator: InteractionCoordinator,
}

impl ArSession {
    pub fn new(
        config: CoordinatorConfig,
        resolver: Box<dyn SourceResolver>,
        backend: Box<dyn MediaBackend>,
    ) -> Self {
        Self {
            scene: SceneGraph::new(),
            anchors: AnchorTracker::new(),
            tv: None,
            router: HitRouter,
            coordinator: InteractionCoordinator::new(config, resolver, backend),
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn tv(&self) -> Option<TvObject> {
        self.tv
    }

    pub fn anchors(&self) -> &AnchorTracker {
        &self.anchors
    }

    /// Feed a plane from tracking. Spawns the TV on the first vertical plane.
    pub fn on_plane_detected(&mut self, plane: &DetectedPlane) -> Option<TvObject> {
        let anchor = self.anchors.on_plane_detected(&mut self.scene, plane)?;
        match TvObject::spawn(&mut self.scene, &anchor) {
            Ok(tv) => {
                self.tv = Some(tv);
                Some(tv)
            }
            Err(err) => {
                debug!("tv spawn skipped: {err}");
                None
            }
        }
    }

    pub fn on_plane_updated(&mut self, plane: &DetectedPlane) -> bool {
        self.anchors.on_plane_updated(&mut self.scene, plane)
    }

    /// Tracking lost the plane: drop the TV and release whatever played on it.
    pub fn on_plane_lost(&mut self, plane: PlaneId) -> bool {
        if self.anchors.on_plane_lost(&mut self.scene, plane).is_none() {
            return false;
        }
        self.tv = None;
        for video in self.coordinator.release_orphans(&self.scene) {
            info!("released video {video} with its surface");
        }
        true
    }

    pub fn on_select(&mut self, video: VideoId) {
        self.coordinator.on_select(video);
    }

    pub fn selected(&self) -> Option<&VideoId> {
        self.coordinator.selected()
    }

    /// Route a viewport tap and dispatch it to the state machine.
    pub fn on_tap(&mut self, point: Vec2, view: &impl ScreenRays) -> Result<TapOutcome, PlaybackError> {
        if self.tv.is_none() {
            return Ok(TapOutcome::Ignored(IgnoredTap::NoSurface));
        }
        let hit = self.router.route(point, view, &self.scene);
        self.coordinator.on_tap(&mut self.scene, hit)
    }

    pub fn current_state(&self) -> InteractionState {
        self.coordinator.current_state(self.tv.map(|tv| tv.screen))
    }

    pub fn bound_video(&self) -> Option<&VideoId> {
        self.coordinator.bound_video(self.tv?.screen)
    }

    pub fn coordinator(&self) -> &InteractionCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut InteractionCoordinator {
        &mut self.coordinator
    }

    /// Mutable access to both halves, for dispatching routed hits directly.
    pub fn parts_mut(&mut self) -> (&mut SceneGraph, &mut InteractionCoordinator) {
        (&mut self.scene, &mut self.coordinator)
    }

    /// Turn the screen back off, releasing its session.
    pub fn stop(&mut self) -> Option<VideoId> {
        let screen = self.tv?.screen;
        self.coordinator.unbind(&mut self.scene, screen)
    }

    pub fn poll_frame(&mut self) -> Option<(TextureId, VideoFrame)> {
        let screen = self.tv?.screen;
        self.coordinator.poll_frame(screen)
    }

    pub fn take_engine_error(&mut self) -> Option<String> {
        let screen = self.tv?.screen;
        self.coordinator.take_engine_error(screen)
    }

    pub fn shutdown(&mut self) {
        self.coordinator.release_all();
    }
}
