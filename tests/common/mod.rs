//! Scripted collaborators for driving an `ArSession` without real media.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ar_tv::glam::{Quat, Vec2, Vec3};
use ar_tv::{
    ArSession, CoordinatorConfig, DetectedPlane, MediaBackend, PinholeCamera, PlaneAlignment,
    PlaneId, PlaybackEngine, PlaybackError, Pose, ResolveError, SourceHandle, SourceResolver,
    TextureId, VideoFrame, VideoId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Opened { video: String, texture: u64 },
    Play(u64),
    Pause(u64),
    Release(u64),
}

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EngineEvent>>>,
    finished: Arc<Mutex<HashSet<u64>>>,
}

impl EventLog {
    pub fn push(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Make the engine on `texture` report that its source ran out.
    pub fn finish(&self, texture: u64) {
        self.finished.lock().unwrap().insert(texture);
    }

    fn is_finished(&self, texture: u64) -> bool {
        self.finished.lock().unwrap().contains(&texture)
    }

    pub fn released(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Release(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

pub struct ScriptedResolver {
    known: HashSet<String>,
}

impl ScriptedResolver {
    pub fn new(known: &[&str]) -> Self {
        Self {
            known: known.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SourceResolver for ScriptedResolver {
    fn resolve(&self, id: &VideoId) -> Result<SourceHandle, ResolveError> {
        if self.known.contains(id.as_str()) {
            Ok(SourceHandle {
                id: id.clone(),
                locator: format!("mem://{id}"),
            })
        } else {
            Err(ResolveError::NotFound(id.clone()))
        }
    }
}

pub struct ScriptedEngine {
    texture: TextureId,
    log: EventLog,
    frames: Vec<VideoFrame>,
}

impl PlaybackEngine for ScriptedEngine {
    fn texture(&self) -> TextureId {
        self.texture
    }

    fn play(&mut self) {
        self.log.push(EngineEvent::Play(self.texture.0));
    }

    fn pause(&mut self) {
        self.log.push(EngineEvent::Pause(self.texture.0));
    }

    fn release(&mut self) {
        self.log.push(EngineEvent::Release(self.texture.0));
    }

    fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.frames.pop()
    }

    fn is_finished(&self) -> bool {
        self.log.is_finished(self.texture.0)
    }
}

pub struct ScriptedBackend {
    log: EventLog,
    next_texture: u64,
    broken: HashSet<String>,
}

impl ScriptedBackend {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            next_texture: 1,
            broken: HashSet::new(),
        }
    }

    /// Sources that resolve but fail to open.
    pub fn with_broken(mut self, broken: &[&str]) -> Self {
        self.broken = broken.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl MediaBackend for ScriptedBackend {
    fn open(&mut self, source: &SourceHandle) -> Result<Box<dyn PlaybackEngine>, PlaybackError> {
        if self.broken.contains(source.id.as_str()) {
            return Err(PlaybackError::Engine {
                id: source.id.clone(),
                reason: "decoder refused the stream".to_string(),
            });
        }
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.log.push(EngineEvent::Opened {
            video: source.id.to_string(),
            texture: texture.0,
        });
        Ok(Box::new(ScriptedEngine {
            texture,
            log: self.log.clone(),
            frames: vec![VideoFrame {
                width: 2,
                height: 1,
                rgba: vec![255; 8],
            }],
        }))
    }
}

pub const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);
pub const SCREEN_CENTRE: Vec2 = Vec2::new(400.0, 300.0);
pub const EMPTY_CORNER: Vec2 = Vec2::new(5.0, 5.0);

pub fn camera() -> PinholeCamera {
    PinholeCamera {
        pose: Pose::IDENTITY,
        vertical_fov: 60f32.to_radians(),
        viewport: VIEWPORT,
    }
}

/// A wall one metre in front of the camera, normal facing the camera.
pub fn wall(id: u64) -> DetectedPlane {
    DetectedPlane {
        id: PlaneId(id),
        alignment: PlaneAlignment::Vertical,
        pose: Pose::new(
            Vec3::new(0.0, 0.0, -1.0),
            Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
        ),
    }
}

pub fn session_with(config: CoordinatorConfig, known: &[&str], log: &EventLog) -> ArSession {
    ArSession::new(
        config,
        Box::new(ScriptedResolver::new(known)),
        Box::new(ScriptedBackend::new(log.clone())),
    )
}

/// Session with a detected wall, a spawned TV, and videos 1..=3 available.
pub fn anchored_session(log: &EventLog) -> ArSession {
    let mut session = session_with(CoordinatorConfig::default(), &["1", "2", "3"], log);
    session.on_plane_detected(&wall(1)).expect("tv spawns on first wall");
    session
}
