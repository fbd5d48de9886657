//! Error types for scene, source resolution and playback.

use thiserror::Error;

use crate::playback::VideoId;
use crate::scene::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("entity {0} is not part of the scene")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("video {0} not found")]
    NotFound(VideoId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("video {0} not found")]
    NotFound(VideoId),
    #[error("failed to decode preview for {id}: {reason}")]
    Decode { id: VideoId, reason: String },
}

impl From<ResolveError> for PreviewError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(id) => PreviewError::NotFound(id),
        }
    }
}

/// Failures reported back to whoever asked for a bind (usually a tap).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("source not found for video {0}")]
    SourceNotFound(VideoId),
    #[error("no video selected")]
    NoSelection,
    #[error("playback engine failed for {id}: {reason}")]
    Engine { id: VideoId, reason: String },
    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl From<ResolveError> for PlaybackError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(id) => PlaybackError::SourceNotFound(id),
        }
    }
}
