//! Binds playback sessions to renderable surfaces.
//!
//! The binder is the single owner of every live session and the only writer of
//! a bound surface's material. At most one session is live per surface.

use std::collections::HashMap;

use log::{debug, info};

use crate::error::SceneError;
use crate::playback::{PlaybackSession, PlaybackState, TextureId, VideoFrame, VideoId};
use crate::scene::{EntityId, Material, SceneGraph};

#[derive(Debug, Default)]
pub struct PlaybackBinder {
    sessions: HashMap<EntityId, PlaybackSession>,
}

impl PlaybackBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is bound to `surface` with `session` and start it.
    ///
    /// Returns the video of the released session, if one was bound. When
    /// `surface` is not in the scene nothing is touched and the new session is
    /// released before the error is returned.
    pub fn bind(
        &mut self,
        scene: &mut SceneGraph,
        surface: EntityId,
        mut session: PlaybackSession,
    ) -> Result<Option<VideoId>, SceneError> {
        if !scene.contains(surface) {
            session.release();
            return Err(SceneError::UnknownEntity(surface));
        }

        let released = self.sessions.remove(&surface).map(|previous| {
            let video = previous.release();
            debug!("released session for video {video} on {surface}");
            video
        });

        scene.set_material(
            surface,
            Material::Video {
                texture: session.texture(),
            },
        )?;
        session.start();
        info!("bound video {} to {surface}", session.video());
        self.sessions.insert(surface, session);
        Ok(released)
    }

    pub fn current_session(&self, surface: EntityId) -> Option<&PlaybackSession> {
        self.sessions.get(&surface)
    }

    /// Pause-in-place / resume of the session bound to `surface`.
    pub fn toggle(&mut self, surface: EntityId) -> Option<PlaybackState> {
        let session = self.sessions.get_mut(&surface)?;
        let state = session.toggle();
        info!("video {} on {surface} is now {state:?}", session.video());
        Some(state)
    }

    /// Release the session bound to `surface` and restore `off_material` if the
    /// surface still exists.
    pub fn unbind(
        &mut self,
        scene: &mut SceneGraph,
        surface: EntityId,
        off_material: Material,
    ) -> Option<VideoId> {
        let session = self.sessions.remove(&surface)?;
        let video = session.release();
        if scene.contains(surface) {
            let _ = scene.set_material(surface, off_material);
        }
        info!("unbound video {video} from {surface}");
        Some(video)
    }

    /// Release every session whose surface is no longer part of `scene`.
    pub fn release_orphans(&mut self, scene: &SceneGraph) -> Vec<VideoId> {
        let orphaned: Vec<EntityId> = self
            .sessions
            .keys()
            .filter(|surface| !scene.contains(**surface))
            .copied()
            .collect();
        orphaned
            .into_iter()
            .filter_map(|surface| self.sessions.remove(&surface))
            .map(|session| session.release())
            .collect()
    }

    pub fn release_all(&mut self) {
        for (_, session) in self.sessions.drain() {
            session.release();
        }
    }

    pub fn poll_frame(&mut self, surface: EntityId) -> Option<(TextureId, VideoFrame)> {
        let session = self.sessions.get_mut(&surface)?;
        let frame = session.poll_frame()?;
        Some((session.texture(), frame))
    }

    pub fn take_error(&mut self, surface: EntityId) -> Option<String> {
        self.sessions.get_mut(&surface)?.take_error()
    }

    pub fn bound_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Drop for PlaybackBinder {
    fn drop(&mut self) {
        self.release_all();
    }
}
