//! The list of selectable videos and a directory-backed resolver.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ResolveError;
use crate::playback::{SourceHandle, SourceResolver, VideoId};

pub const DEFAULT_VIDEOS: [&str; 3] = ["1", "2", "3"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCatalog {
    videos: Vec<VideoId>,
}

impl Default for VideoCatalog {
    fn default() -> Self {
        Self {
            videos: DEFAULT_VIDEOS.iter().map(|v| VideoId::from(*v)).collect(),
        }
    }
}

impl VideoCatalog {
    pub fn new(videos: Vec<VideoId>) -> Self {
        Self { videos }
    }

    /// Comma separated ids; blanks and duplicates are skipped.
    pub fn from_csv(csv: &str) -> Self {
        let mut videos: Vec<VideoId> = Vec::new();
        for id in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let id = VideoId::from(id);
            if !videos.contains(&id) {
                videos.push(id);
            }
        }
        Self { videos }
    }

    pub fn videos(&self) -> &[VideoId] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

const VIDEO_EXTENSION: &str = "mp4";

/// Resolves `<dir>/<id>.mp4`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    dir: PathBuf,
}

impl DirectoryResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: &VideoId) -> PathBuf {
        self.dir.join(format!("{}.{VIDEO_EXTENSION}", id.as_str()))
    }
}

fn file_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

impl SourceResolver for DirectoryResolver {
    fn resolve(&self, id: &VideoId) -> Result<SourceHandle, ResolveError> {
        // Ids are tokens, not paths.
        if id.as_str().is_empty() || id.as_str().contains(['/', '\\']) || id.as_str().contains("..") {
            return Err(ResolveError::NotFound(id.clone()));
        }
        let path = self.path_for(id);
        if !file_exists(&path) {
            return Err(ResolveError::NotFound(id.clone()));
        }
        Ok(SourceHandle {
            id: id.clone(),
            locator: path.to_string_lossy().into_owned(),
        })
    }
}
