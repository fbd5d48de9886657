//! Tap/selection state machine.
//!
//! The coordinator owns the selected video and is the only caller of the
//! [`PlaybackBinder`]. A tap on the screen either starts the selected video,
//! pauses/resumes what is bound, replays it once it has ended, or (after a
//! selection change) rebinds.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use log::{info, warn};

use crate::error::PlaybackError;
use crate::playback::{
    MediaBackend, PlaybackBinder, PlaybackSession, PlaybackState, SourceResolver, TextureId,
    VideoFrame, VideoId,
};
use crate::scene::{EntityId, SceneGraph};
use crate::tv::{SCREEN_NAME, screen_off_material};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Unbound,
    BoundPlaying,
    BoundPaused,
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InteractionState::Unbound => "unbound",
            InteractionState::BoundPlaying => "playing",
            InteractionState::BoundPaused => "paused",
        })
    }
}

/// What a tap does when the bound video is not the selected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebindPolicy {
    /// Rebind to the selection whenever it differs from the bound video.
    #[default]
    OnSelectionChange,
    /// Always toggle whatever is bound; the selection only matters once the
    /// screen is unbound again.
    ToggleBound,
}

impl FromStr for RebindPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "selection" | "on-selection-change" | "rebind" => Ok(Self::OnSelectionChange),
            "toggle-bound" | "toggle" | "legacy" => Ok(Self::ToggleBound),
            other => bail!("unknown rebind policy {other:?} (expected `selection` or `toggle-bound`)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorConfig {
    pub rebind: RebindPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredTap {
    /// No anchor yet, so nothing can be hit.
    NoSurface,
    /// The tap did not land on any entity.
    Miss,
    /// Landed on something other than the screen.
    NotScreen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    Ignored(IgnoredTap),
    Started(VideoId),
    Paused(VideoId),
    Resumed(VideoId),
    /// The bound video had ended; a fresh session plays it from the start.
    Replayed(VideoId),
    Rebound { released: VideoId, bound: VideoId },
}

pub struct InteractionCoordinator {
    config: CoordinatorConfig,
    selected: Option<VideoId>,
    binder: PlaybackBinder,
    resolver: Box<dyn SourceResolver>,
    backend: Box<dyn MediaBackend>,
}

impl InteractionCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        resolver: Box<dyn SourceResolver>,
        backend: Box<dyn MediaBackend>,
    ) -> Self {
        Self {
            config,
            selected: None,
            binder: PlaybackBinder::new(),
            resolver,
            backend,
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    /// Record the selection. Takes effect on the next tap only.
    pub fn on_select(&mut self, video: VideoId) {
        info!("selected video {video}");
        self.selected = Some(video);
    }

    pub fn selected(&self) -> Option<&VideoId> {
        self.selected.as_ref()
    }

    pub fn binder(&self) -> &PlaybackBinder {
        &self.binder
    }

    pub fn current_state(&self, screen: Option<EntityId>) -> InteractionState {
        let session = screen.and_then(|s| self.binder.current_session(s));
        match session.map(|s| (s.is_finished(), s.state())) {
            None => InteractionState::Unbound,
            Some((true, _)) => InteractionState::BoundPaused,
            Some((false, PlaybackState::Paused)) => InteractionState::BoundPaused,
            Some((false, PlaybackState::Playing | PlaybackState::Idle)) => InteractionState::BoundPlaying,
        }
    }

    pub fn bound_video(&self, screen: EntityId) -> Option<&VideoId> {
        self.binder.current_session(screen).map(PlaybackSession::video)
    }

    /// Dispatch a routed tap. `hit` is whatever the hit router returned.
    pub fn on_tap(&mut self, scene: &mut SceneGraph, hit: Option<EntityId>) -> Result<TapOutcome, PlaybackError> {
        let Some(entity) = hit else {
            return Ok(TapOutcome::Ignored(IgnoredTap::Miss));
        };
        if scene.name(entity) != Some(SCREEN_NAME) {
            return Ok(TapOutcome::Ignored(IgnoredTap::NotScreen));
        }

        let bound = self.binder.current_session(entity).map(|s| s.video().clone());
        let Some(bound) = bound else {
            let video = self.open_selected()?;
            let video_id = video.video().clone();
            self.binder.bind(scene, entity, video)?;
            return Ok(TapOutcome::Started(video_id));
        };

        let wants_rebind = self.config.rebind == RebindPolicy::OnSelectionChange
            && self.selected.as_ref().is_some_and(|selected| *selected != bound);
        if wants_rebind {
            let session = self.open_selected()?;
            let video_id = session.video().clone();
            let released = self.binder.bind(scene, entity, session)?.unwrap_or(bound);
            return Ok(TapOutcome::Rebound {
                released,
                bound: video_id,
            });
        }

        let finished = self.binder.current_session(entity).is_some_and(PlaybackSession::is_finished);
        if finished {
            let video = self.selected.clone().unwrap_or_else(|| bound.clone());
            let session = self.open_video(video)?;
            let video_id = session.video().clone();
            self.binder.bind(scene, entity, session)?;
            return Ok(if video_id == bound {
                TapOutcome::Replayed(video_id)
            } else {
                TapOutcome::Rebound {
                    released: bound,
                    bound: video_id,
                }
            });
        }

        match self.binder.toggle(entity) {
            Some(PlaybackState::Paused) => Ok(TapOutcome::Paused(bound)),
            _ => Ok(TapOutcome::Resumed(bound)),
        }
    }

    /// Resolve and open the selected video without touching current bindings.
    fn open_selected(&mut self) -> Result<PlaybackSession, PlaybackError> {
        let video = self.selected.clone().ok_or(PlaybackError::NoSelection)?;
        self.open_video(video)
    }

    fn open_video(&mut self, video: VideoId) -> Result<PlaybackSession, PlaybackError> {
        PlaybackSession::open(video, self.resolver.as_ref(), self.backend.as_mut()).inspect_err(|err| {
            warn!("bind attempt failed: {err}");
        })
    }

    /// Release the screen's session (if any) and show the off material again.
    pub fn unbind(&mut self, scene: &mut SceneGraph, screen: EntityId) -> Option<VideoId> {
        self.binder.unbind(scene, screen, screen_off_material())
    }

    /// Release sessions whose surface was removed from the scene.
    pub fn release_orphans(&mut self, scene: &SceneGraph) -> Vec<VideoId> {
        self.binder.release_orphans(scene)
    }

    pub fn release_all(&mut self) {
        self.binder.release_all();
    }

    pub fn poll_frame(&mut self, screen: EntityId) -> Option<(TextureId, VideoFrame)> {
        self.binder.poll_frame(screen)
    }

    pub fn take_engine_error(&mut self, screen: EntityId) -> Option<String> {
        self.binder.take_error(screen)
    }
}
