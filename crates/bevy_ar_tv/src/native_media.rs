//! ffmpeg-backed playback engines and preview frames.
//!
//! Each engine owns one decoder thread. The thread probes the file with
//! `ffprobe`, then reads raw RGBA frames from an `ffmpeg` child and forwards
//! them at the configured frame rate. While paused the thread stops reading,
//! so the pipe fills up and ffmpeg blocks on its own. At the end of the file
//! the engine reports itself finished; the next `play` decodes from the start.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use ar_tv::{
    DirectoryResolver, MediaBackend, PlaybackEngine, PlaybackError, PreviewError, PreviewGenerator,
    SourceHandle, SourceResolver, TextureId, VideoFrame, VideoId,
};
use bevy::log::{info, warn};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub frame_rate: u32,
    pub texture_width: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            frame_rate: 30,
            texture_width: 640,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    SetPlaying(bool),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum Event {
    Frame(VideoFrame),
    Error(String),
}

/// At most this many ffmpeg stderr lines are logged and forwarded.
const STDERR_FORWARD_LINES: usize = 200;

/// Extract the first video stream's size from `ffprobe -of json` output.
pub fn parse_probe_output(json: &str) -> Result<(u32, u32)> {
    let value: serde_json::Value = serde_json::from_str(json).context("ffprobe output is not json")?;
    let stream = value
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .context("ffprobe reported no video stream")?;
    let dim = |key: &str| {
        stream
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .with_context(|| format!("ffprobe stream has no {key}"))
    };
    Ok((dim("width")?, dim("height")?))
}

/// Scale to at most `target_width`, keeping aspect. Both sides stay even
/// since most ffmpeg scalers reject odd sizes.
pub fn scaled_dimensions(width: u32, height: u32, target_width: u32) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        bail!("video has an empty frame ({width}x{height})");
    }
    let w = target_width.min(width).max(2) & !1;
    let h = ((height as f64 * w as f64 / width as f64).round() as u32).max(2) & !1;
    Ok((w, h))
}

fn probe_dimensions(config: &MediaConfig, path: &str) -> Result<(u32, u32)> {
    let output = ProcessCommand::new(&config.ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to launch {}", config.ffprobe))?;
    if !output.status.success() {
        bail!(
            "ffprobe failed on {path}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn rawvideo_command(config: &MediaConfig, path: &str, width: u32, height: u32, frames: Option<u32>) -> ProcessCommand {
    let mut cmd = ProcessCommand::new(&config.ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
        .arg(path)
        .args(["-an", "-vf"])
        .arg(format!("scale={width}:{height}"));
    if let Some(frames) = frames {
        cmd.arg("-frames:v").arg(frames.to_string());
    }
    cmd.args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .stdin(Stdio::null());
    cmd
}

/// Start a decoder thread for `path`. The thread sets `finished` whenever it
/// reaches the end of the stream and clears it when playback restarts.
pub fn spawn(
    path: String,
    config: MediaConfig,
    finished: Arc<AtomicBool>,
) -> Result<(Sender<Command>, Receiver<Event>, JoinHandle<()>)> {
    let (cmd_tx, cmd_rx) = unbounded::<Command>();
    let (evt_tx, evt_rx) = unbounded::<Event>();

    let join = thread::Builder::new()
        .name("ar-tv-decoder".to_string())
        .spawn(move || {
            if let Err(e) = run_decoder(&path, &config, &cmd_rx, &evt_tx, &finished) {
                warn!("[native-media] {path}: {e:#}");
                let _ = evt_tx.send(Event::Error(format!("{e:#}")));
            }
        })
        .context("failed to spawn decoder thread")?;

    Ok((cmd_tx, evt_rx, join))
}

fn drain_stderr(child: &mut Child, evt_tx: &Sender<Event>) {
    let Some(stderr) = child.stderr.take() else {
        return;
    };
    let evt_tx = evt_tx.clone();
    thread::spawn(move || {
        forward_stderr(BufReader::new(stderr), &evt_tx, STDERR_FORWARD_LINES);
    });
}

/// Read `reader` to the end so the child never blocks on a full pipe, but
/// forward only the first `limit` lines. Returns how many lines were read.
fn forward_stderr(reader: impl BufRead, evt_tx: &Sender<Event>, limit: usize) -> usize {
    let mut read = 0;
    for line in reader.lines().map_while(|l| l.ok()) {
        if read < limit {
            warn!("[native-media][stderr] {line}");
            let _ = evt_tx.send(Event::Error(format!("ffmpeg: {line}")));
        } else if read == limit {
            warn!("[native-media][stderr] further output suppressed");
        }
        read += 1;
    }
    read
}

/// Apply queued commands to `playing`. False once shutdown was requested or
/// the player is gone.
fn apply_pending(cmd_rx: &Receiver<Command>, playing: &mut bool) -> bool {
    loop {
        match cmd_rx.try_recv() {
            Ok(Command::SetPlaying(p)) => *playing = p,
            Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return false,
            Err(TryRecvError::Empty) => return true,
        }
    }
}

/// Block until the next `SetPlaying(true)`. False on shutdown.
fn wait_for_replay(cmd_rx: &Receiver<Command>) -> bool {
    loop {
        match cmd_rx.recv() {
            Ok(Command::SetPlaying(true)) => return true,
            Ok(Command::SetPlaying(false)) => {}
            Ok(Command::Shutdown) | Err(_) => return false,
        }
    }
}

enum PassEnd {
    Shutdown,
    EndOfStream,
}

struct Stream<'a> {
    path: &'a str,
    config: &'a MediaConfig,
    width: u32,
    height: u32,
}

fn run_decoder(
    path: &str,
    config: &MediaConfig,
    cmd_rx: &Receiver<Command>,
    evt_tx: &Sender<Event>,
    finished: &AtomicBool,
) -> Result<()> {
    let (src_w, src_h) = probe_dimensions(config, path)?;
    let (width, height) = scaled_dimensions(src_w, src_h, config.texture_width)?;
    info!("[native-media] {path}: {src_w}x{src_h} -> {width}x{height} @ {} fps", config.frame_rate);
    let stream = Stream {
        path,
        config,
        width,
        height,
    };

    let mut playing = false;
    loop {
        match decode_pass(&stream, &mut playing, cmd_rx, evt_tx)? {
            PassEnd::Shutdown => return Ok(()),
            PassEnd::EndOfStream => {
                info!("[native-media] {path}: end of stream");
                finished.store(true, Ordering::Release);
                if !wait_for_replay(cmd_rx) {
                    return Ok(());
                }
                info!("[native-media] {path}: restarting from the beginning");
                finished.store(false, Ordering::Release);
                playing = true;
            }
        }
    }
}

/// One ffmpeg run from the start of the file.
fn decode_pass(
    stream: &Stream<'_>,
    playing: &mut bool,
    cmd_rx: &Receiver<Command>,
    evt_tx: &Sender<Event>,
) -> Result<PassEnd> {
    if !apply_pending(cmd_rx, playing) {
        return Ok(PassEnd::Shutdown);
    }
    let mut child = rawvideo_command(stream.config, stream.path, stream.width, stream.height, None)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to launch {}", stream.config.ffmpeg))?;
    drain_stderr(&mut child, evt_tx);
    let Some(mut stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        bail!("ffmpeg stdout was not captured");
    };

    let result = pump_frames(&mut stdout, stream, playing, cmd_rx, evt_tx);
    let _ = child.kill();
    let _ = child.wait();
    result
}

fn pump_frames(
    stdout: &mut impl Read,
    stream: &Stream<'_>,
    playing: &mut bool,
    cmd_rx: &Receiver<Command>,
    evt_tx: &Sender<Event>,
) -> Result<PassEnd> {
    let (width, height) = (stream.width, stream.height);
    let frame_len = width as usize * height as usize * 4;
    let interval = Duration::from_secs_f64(1.0 / f64::from(stream.config.frame_rate.max(1)));
    let mut next_due = Instant::now();

    loop {
        if !*playing {
            match cmd_rx.recv() {
                Ok(Command::SetPlaying(p)) => {
                    *playing = p;
                    next_due = Instant::now();
                }
                Ok(Command::Shutdown) | Err(_) => return Ok(PassEnd::Shutdown),
            }
            continue;
        }
        if !apply_pending(cmd_rx, playing) {
            return Ok(PassEnd::Shutdown);
        }
        if !*playing {
            continue;
        }

        let mut rgba = vec![0u8; frame_len];
        match stdout.read_exact(&mut rgba) {
            Ok(()) => {
                if evt_tx.send(Event::Frame(VideoFrame { width, height, rgba })).is_err() {
                    return Ok(PassEnd::Shutdown);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(PassEnd::EndOfStream),
            Err(e) => return Err(anyhow!(e).context("reading decoded frames")),
        }

        next_due += interval;
        let now = Instant::now();
        if next_due > now {
            thread::sleep(next_due - now);
        } else {
            next_due = now;
        }
    }
}

/// One decoder thread driving one texture.
///
/// Releasing only signals the thread; it exits (killing its ffmpeg child) as
/// soon as it sees the shutdown, so callers never wait on a probe or a read.
pub struct NativeVideoPlayer {
    texture: TextureId,
    tx: Sender<Command>,
    rx: Receiver<Event>,
    pending: Option<VideoFrame>,
    last_error: Option<String>,
    finished: Arc<AtomicBool>,
}

impl NativeVideoPlayer {
    /// Keep only the newest frame; older ones are stale by now.
    fn drain(&mut self) {
        for evt in self.rx.try_iter() {
            match evt {
                Event::Frame(frame) => self.pending = Some(frame),
                Event::Error(e) => self.last_error = Some(e),
            }
        }
    }
}

impl PlaybackEngine for NativeVideoPlayer {
    fn texture(&self) -> TextureId {
        self.texture
    }

    fn play(&mut self) {
        let _ = self.tx.send(Command::SetPlaying(true));
    }

    fn pause(&mut self) {
        let _ = self.tx.send(Command::SetPlaying(false));
    }

    fn release(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        self.pending = None;
    }

    fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.drain();
        self.pending.take()
    }

    fn take_error(&mut self) -> Option<String> {
        self.drain();
        self.last_error.take()
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl Drop for NativeVideoPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens a [`NativeVideoPlayer`] per source, numbering textures from 1.
#[derive(Debug, Default)]
pub struct NativeMediaBackend {
    config: MediaConfig,
    next_texture: u64,
}

impl NativeMediaBackend {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            config,
            next_texture: 0,
        }
    }
}

impl MediaBackend for NativeMediaBackend {
    fn open(&mut self, source: &SourceHandle) -> Result<Box<dyn PlaybackEngine>, PlaybackError> {
        let finished = Arc::new(AtomicBool::new(false));
        // The handle is dropped: the thread detaches and reaps its own child.
        let (tx, rx, _join) =
            spawn(source.locator.clone(), self.config.clone(), finished.clone()).map_err(|e| PlaybackError::Engine {
                id: source.id.clone(),
                reason: format!("{e:#}"),
            })?;
        self.next_texture += 1;
        info!("[native-media] opened {} as texture {}", source.id, self.next_texture);
        Ok(Box::new(NativeVideoPlayer {
            texture: TextureId(self.next_texture),
            tx,
            rx,
            pending: None,
            last_error: None,
            finished,
        }))
    }
}

/// First frame of each video, decoded synchronously. Run it off the main
/// thread.
#[derive(Debug, Clone)]
pub struct NativePreviewGenerator {
    config: MediaConfig,
    resolver: DirectoryResolver,
    width: u32,
}

impl NativePreviewGenerator {
    pub fn new(config: MediaConfig, resolver: DirectoryResolver, width: u32) -> Self {
        Self { config, resolver, width }
    }

    fn decode_first_frame(&self, path: &str) -> Result<VideoFrame> {
        let (src_w, src_h) = probe_dimensions(&self.config, path)?;
        let (width, height) = scaled_dimensions(src_w, src_h, self.width)?;
        let output = rawvideo_command(&self.config, path, width, height, Some(1))
            .output()
            .with_context(|| format!("failed to launch {}", self.config.ffmpeg))?;
        if !output.status.success() {
            bail!("ffmpeg failed: {}", String::from_utf8_lossy(&output.stderr).trim());
        }
        let expected = width as usize * height as usize * 4;
        if output.stdout.len() < expected {
            bail!("short frame: {} of {expected} bytes", output.stdout.len());
        }
        let mut rgba = output.stdout;
        rgba.truncate(expected);
        Ok(VideoFrame { width, height, rgba })
    }
}

impl PreviewGenerator for NativePreviewGenerator {
    type Image = VideoFrame;

    fn preview_frame(&self, id: &VideoId) -> Result<VideoFrame, PreviewError> {
        let source = self.resolver.resolve(id)?;
        self.decode_first_frame(&source.locator).map_err(|e| PreviewError::Decode {
            id: id.clone(),
            reason: format!("{e:#}"),
        })
    }
}
