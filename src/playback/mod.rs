//! Playback sessions and the collaborator traits they are built from.
//!
//! The core never decodes anything itself. A [`SourceResolver`] turns an opaque
//! [`VideoId`] into a [`SourceHandle`], a [`MediaBackend`] opens a
//! [`PlaybackEngine`] for that handle, and a [`PlaybackSession`] tracks the
//! play/pause state of one engine.

pub mod binder;

use std::fmt;

use crate::error::{PlaybackError, PreviewError, ResolveError};

pub use binder::PlaybackBinder;

/// Opaque video token chosen by the selection UI ("1", "2", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VideoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Playable source produced by a resolver. `locator` is meaningful only to
/// the backend that opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    pub id: VideoId,
    pub locator: String,
}

/// Identifies the texture a playback engine renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// One decoded RGBA8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub trait SourceResolver: Send + Sync {
    fn resolve(&self, id: &VideoId) -> Result<SourceHandle, ResolveError>;
}

/// Static preview frames for the thumbnail strip. Independent of playback.
pub trait PreviewGenerator: Send + Sync {
    type Image;

    fn preview_frame(&self, id: &VideoId) -> Result<Self::Image, PreviewError>;
}

/// A decode/playback pipeline owned by the platform media layer.
///
/// Commands are fire-and-forget: `play` must not block on the pipeline
/// actually starting.
pub trait PlaybackEngine: Send + Sync {
    fn texture(&self) -> TextureId;
    fn play(&mut self);
    fn pause(&mut self);
    /// Stop decoding and free every resource held by the pipeline.
    fn release(&mut self);

    /// Latest frame produced since the previous poll, if any.
    fn poll_frame(&mut self) -> Option<VideoFrame> {
        None
    }

    /// Asynchronous pipeline failure, if one was reported since the last call.
    fn take_error(&mut self) -> Option<String> {
        None
    }

    /// The source has played through to its end.
    fn is_finished(&self) -> bool {
        false
    }
}

pub trait MediaBackend: Send + Sync {
    fn open(&mut self, source: &SourceHandle) -> Result<Box<dyn PlaybackEngine>, PlaybackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// One engine bound to one resolved video.
pub struct PlaybackSession {
    video: VideoId,
    state: PlaybackState,
    engine: Box<dyn PlaybackEngine>,
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("video", &self.video)
            .field("state", &self.state)
            .field("texture", &self.engine.texture())
            .finish()
    }
}

impl PlaybackSession {
    /// Resolve `video` and open an engine for it. The session starts idle.
    pub fn open(
        video: VideoId,
        resolver: &dyn SourceResolver,
        backend: &mut dyn MediaBackend,
    ) -> Result<Self, PlaybackError> {
        let source = resolver.resolve(&video)?;
        let engine = backend.open(&source)?;
        Ok(Self::with_engine(video, engine))
    }

    pub fn with_engine(video: VideoId, engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            video,
            state: PlaybackState::Idle,
            engine,
        }
    }

    pub fn video(&self) -> &VideoId {
        &self.video
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn texture(&self) -> TextureId {
        self.engine.texture()
    }

    /// Reached the end of its source. A finished session shows its last frame
    /// until it is replaced.
    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }

    pub(crate) fn start(&mut self) {
        self.engine.play();
        self.state = PlaybackState::Playing;
    }

    /// Playing pauses in place; paused (or idle) plays.
    pub(crate) fn toggle(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Playing => {
                self.engine.pause();
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Paused | PlaybackState::Idle => {
                self.engine.play();
                self.state = PlaybackState::Playing;
            }
        }
        self.state
    }

    pub(crate) fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.engine.poll_frame()
    }

    pub(crate) fn take_error(&mut self) -> Option<String> {
        self.engine.take_error()
    }

    pub(crate) fn release(mut self) -> VideoId {
        self.engine.release();
        self.video
    }
}
