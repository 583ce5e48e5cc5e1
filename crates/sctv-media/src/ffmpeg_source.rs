//! FFmpeg-backed frame source.
//!
//! Spawns one `ffmpeg` process per open source, decoding the input to raw
//! RGB24 frames of a fixed size on stdout. Reopening a source spawns a fresh
//! process, which is how a dropped RTSP session gets re-established.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use sctv_models::{SourceLocator, StreamDescriptor};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::traits::{FrameSource, FrameSourceFactory};

/// Decoding parameters shared by every source the factory opens.
#[derive(Debug, Clone)]
pub struct FfmpegSourceConfig {
    /// Output frame width
    pub width: u32,
    /// Output frame height
    pub height: u32,
    /// RTSP lower transport (`tcp` avoids UDP packet loss artifacts)
    pub rtsp_transport: String,
}

impl Default for FfmpegSourceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            rtsp_transport: "tcp".to_string(),
        }
    }
}

impl FfmpegSourceConfig {
    /// Build the ffmpeg argument list for a locator.
    pub fn build_args(&self, locator: &SourceLocator) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        let input = if let Some(index) = locator.device_index() {
            args.push("-f".into());
            args.push("v4l2".into());
            format!("/dev/video{}", index)
        } else {
            if locator.is_rtsp() {
                args.push("-rtsp_transport".into());
                args.push(self.rtsp_transport.clone());
            }
            locator.as_str().trim().to_string()
        };

        args.push("-i".into());
        args.push(input);

        args.extend(
            [
                "-an".to_string(),
                "-vf".to_string(),
                format!("scale={}:{}", self.width, self.height),
                "-pix_fmt".to_string(),
                "rgb24".to_string(),
                "-f".to_string(),
                "rawvideo".to_string(),
                "pipe:1".to_string(),
            ]
            .into_iter(),
        );

        args
    }
}

/// Opens `FfmpegFrameSource`s.
pub struct FfmpegSourceFactory {
    ffmpeg: PathBuf,
    config: FfmpegSourceConfig,
}

impl FfmpegSourceFactory {
    /// Create a factory, failing if ffmpeg is not installed.
    pub fn new(config: FfmpegSourceConfig) -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        Ok(Self { ffmpeg, config })
    }

    pub fn config(&self) -> &FfmpegSourceConfig {
        &self.config
    }
}

#[async_trait]
impl FrameSourceFactory for FfmpegSourceFactory {
    async fn open(&self, stream: &StreamDescriptor) -> MediaResult<Box<dyn FrameSource>> {
        let args = self.config.build_args(&stream.locator);
        debug!(stream_id = %stream.id, "Spawning ffmpeg for {}", stream.locator);

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::open_failed(stream.locator.redacted(), e.to_string()))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::open_failed(stream.locator.redacted(), "stdout not captured")
        })?;

        // Drain stderr so ffmpeg never blocks on a full pipe
        if let Some(stderr) = child.stderr.take() {
            let stream_id = stream.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(stream_id = %stream_id, "ffmpeg: {}", line);
                }
            });
        }

        info!(stream_id = %stream.id, "Opened frame source {}", stream.locator);

        Ok(Box::new(FfmpegFrameSource {
            child: Some(child),
            stdout: Some(stdout),
            width: self.config.width,
            height: self.config.height,
        }))
    }
}

/// A running ffmpeg decode process.
pub struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn read(&mut self) -> MediaResult<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buffer = vec![0u8; Frame::byte_len(self.width, self.height)];
        match stdout.read_exact(&mut buffer).await {
            Ok(_) => Frame::new(self.width, self.height, buffer).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(MediaError::read_failed(e.to_string())),
        }
    }

    async fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}
