//! Environment-driven configuration.
//!
//! | variable                 | default        |
//! |--------------------------|----------------|
//! | `AR_TV_MEDIA_DIR`        | `assets/videos`|
//! | `AR_TV_VIDEOS`           | `1,2,3`        |
//! | `AR_TV_FFMPEG`           | `ffmpeg`       |
//! | `AR_TV_FFPROBE`          | `ffprobe`      |
//! | `AR_TV_FRAME_RATE`       | `30`           |
//! | `AR_TV_TEXTURE_WIDTH`    | `640`          |
//! | `AR_TV_REBIND`           | `selection`    |
//! | `AR_TV_AUTO_DETECT_SECS` | `1.5` (`off` disables) |

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use ar_tv::{RebindPolicy, VideoCatalog};
use bevy::prelude::Resource;

use crate::native_media::MediaConfig;

#[derive(Resource, Debug, Clone)]
pub struct ArTvConfig {
    pub media_dir: PathBuf,
    pub catalog: VideoCatalog,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub frame_rate: u32,
    pub texture_width: u32,
    pub rebind: RebindPolicy,
    /// Simulated plane detection delay for the desktop viewer.
    pub auto_detect_secs: Option<f32>,
}

impl Default for ArTvConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("assets/videos"),
            catalog: VideoCatalog::default(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            frame_rate: 30,
            texture_width: 640,
            rebind: RebindPolicy::default(),
            auto_detect_secs: Some(1.5),
        }
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{name}={raw:?} is not valid"))
}

/// Upper bound for the simulated detection delay.
const MAX_AUTO_DETECT_SECS: f32 = 3600.0;

fn falsy(raw: &str) -> bool {
    let v = raw.trim();
    v == "0" || v.eq_ignore_ascii_case("off") || v.eq_ignore_ascii_case("false")
}

impl ArTvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("AR_TV_MEDIA_DIR") {
            config.media_dir = PathBuf::from(dir.trim());
        }
        if let Some(videos) = get("AR_TV_VIDEOS") {
            config.catalog = VideoCatalog::from_csv(&videos);
            if config.catalog.is_empty() {
                bail!("AR_TV_VIDEOS={videos:?} names no videos");
            }
        }
        if let Some(ffmpeg) = get("AR_TV_FFMPEG") {
            config.ffmpeg = ffmpeg.trim().to_string();
        }
        if let Some(ffprobe) = get("AR_TV_FFPROBE") {
            config.ffprobe = ffprobe.trim().to_string();
        }
        if let Some(raw) = get("AR_TV_FRAME_RATE") {
            config.frame_rate = parse_var("AR_TV_FRAME_RATE", &raw)?;
            if config.frame_rate == 0 {
                bail!("AR_TV_FRAME_RATE must be positive");
            }
        }
        if let Some(raw) = get("AR_TV_TEXTURE_WIDTH") {
            config.texture_width = parse_var("AR_TV_TEXTURE_WIDTH", &raw)?;
        }
        if let Some(raw) = get("AR_TV_REBIND") {
            config.rebind = raw.parse::<RebindPolicy>().context("AR_TV_REBIND")?;
        }
        if let Some(raw) = get("AR_TV_AUTO_DETECT_SECS") {
            config.auto_detect_secs = if falsy(&raw) {
                None
            } else {
                let secs = parse_var::<f32>("AR_TV_AUTO_DETECT_SECS", &raw)?;
                if !(0.0..=MAX_AUTO_DETECT_SECS).contains(&secs) {
                    bail!("AR_TV_AUTO_DETECT_SECS={raw:?} must be between 0 and {MAX_AUTO_DETECT_SECS} seconds");
                }
                Some(secs)
            };
        }
        Ok(config)
    }

    pub fn media(&self) -> MediaConfig {
        MediaConfig {
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            frame_rate: self.frame_rate,
            texture_width: self.texture_width,
        }
    }
}
