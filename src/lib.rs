//! ar_tv: a virtual television anchored to a real-world wall.
//!
//! The crate holds the engine-agnostic core: an explicit scene graph, surface
//! anchoring, the TV composite, tap routing, and the playback state machine
//! that binds video sessions to the screen. Rendering, tracking and decoding
//! live behind traits so a host (see `bevy_ar_tv`) can plug them in.

pub mod anchor;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod picking;
pub mod playback;
pub mod scene;
pub mod session;
pub mod tv;

pub use anchor::{Anchor, AnchorTracker, DetectedPlane, PlaneAlignment, PlaneId};
pub use catalog::{DirectoryResolver, VideoCatalog};
pub use coordinator::{
    CoordinatorConfig, IgnoredTap, InteractionCoordinator, InteractionState, RebindPolicy,
    TapOutcome,
};
pub use error::{PlaybackError, PreviewError, ResolveError, SceneError};
pub use picking::{Hit, HitRouter, PinholeCamera, Ray, ScreenRays};
pub use playback::{
    MediaBackend, PlaybackBinder, PlaybackEngine, PlaybackSession, PlaybackState,
    PreviewGenerator, SourceHandle, SourceResolver, TextureId, VideoFrame, VideoId,
};
pub use scene::{EntityId, Material, MeshShape, Pose, SceneGraph};
pub use session::ArSession;
pub use tv::{SCREEN_NAME, TvObject};

pub use glam;
