//! Video capture sidecar.
//!
//! Frames read back from the GPU are handed to a dedicated `video-writer`
//! thread over a bounded channel so encoding never blocks the render loop for
//! longer than it takes to queue a buffer. The writer feeds a [`FrameSink`]:
//! either an `ffmpeg` child process reading raw RGBA on stdin, or a directory
//! of numbered PNG files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use clap::Args;
use crossbeam_channel::{bounded, Sender};
use thiserror::Error;

/// Frames allowed to queue before `capture` starts blocking.
const QUEUE_DEPTH: usize = 8;

pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Output format of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// MPEG-4 part 2 tagged `xvid`; also the fallback for unknown names.
    Xvid,
    /// H.264 through libx264.
    H264,
    /// H.264 through libx264, requested by its `avc1` fourcc.
    Avc1,
    /// MPEG-4 part 2 tagged `mp4v`.
    Mp4v,
    /// Numbered PNG files instead of a video stream.
    PngSequence,
}

impl VideoCodec {
    /// Maps a `--record-video` value to a codec. An empty request disables
    /// recording; unknown names fall back to XVID.
    pub fn from_request(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let codec = match trimmed.to_ascii_lowercase().as_str() {
            "xvid" => Self::Xvid,
            "h264" => Self::H264,
            "avc1" => Self::Avc1,
            "mp4v" => Self::Mp4v,
            "png" => Self::PngSequence,
            _ => {
                tracing::warn!(requested = trimmed, "unknown video codec; using XVID");
                Self::Xvid
            }
        };
        Some(codec)
    }

    pub fn fourcc(self) -> &'static str {
        match self {
            Self::Xvid => "XVID",
            Self::H264 => "H264",
            Self::Avc1 => "avc1",
            Self::Mp4v => "mp4v",
            Self::PngSequence => "png",
        }
    }

    /// ffmpeg encoder name and optional container tag.
    fn ffmpeg_encoder(self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::Xvid => ("mpeg4", Some("xvid")),
            Self::H264 | Self::Avc1 => ("libx264", None),
            Self::Mp4v => ("mpeg4", Some("mp4v")),
            Self::PngSequence => ("png", None),
        }
    }
}

/// Everything needed to open a [`FrameSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSettings {
    pub codec: VideoCodec,
    /// Frame size in pixels; every captured frame must match it.
    pub width: u32,
    pub height: u32,
    /// Playback rate written into the video.
    pub fps: u32,
    /// Video file, or the directory name stem for a PNG sequence.
    pub output: PathBuf,
    /// Encoder executable; `ffmpeg` from `PATH` unless overridden.
    pub encoder: PathBuf,
}

impl RecordSettings {
    pub fn new(codec: VideoCodec, width: u32, height: u32, fps: u32, output: PathBuf) -> Self {
        Self {
            codec,
            width,
            height,
            fps,
            output,
            encoder: PathBuf::from(DEFAULT_ENCODER),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Directory receiving numbered frames when recording a PNG sequence:
    /// the output path without its extension.
    pub fn frame_dir(&self) -> PathBuf {
        if self.output.extension().is_some() {
            self.output.with_extension("")
        } else {
            self.output.clone()
        }
    }
}

/// Recording flags shared by the compute demos.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct RecordArgs {
    /// Record the rendered frames with this codec (`XVID`, `h264`, `avc1`, `mp4v` or `png`).
    #[arg(long = "record-video", visible_alias = "rv", value_name = "CODEC")]
    pub record_video: Option<String>,

    /// Frame rate written into the recording.
    #[arg(
        long = "video-fps",
        visible_alias = "vfps",
        value_name = "FPS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub video_fps: u32,

    /// Recording destination; a PNG sequence uses it as a directory name.
    #[arg(long = "video-output", value_name = "PATH", default_value = "output.avi")]
    pub video_output: PathBuf,
}

impl RecordArgs {
    /// `None` unless a codec was requested.
    pub fn settings(&self, width: u32, height: u32) -> Option<RecordSettings> {
        let codec = VideoCodec::from_request(self.record_video.as_deref()?)?;
        Some(RecordSettings::new(
            codec,
            width,
            height,
            self.video_fps,
            self.video_output.clone(),
        ))
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("frame has {actual} bytes; expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("failed to launch video encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write video frame: {0}")]
    Io(#[from] io::Error),
    #[error("failed to write frame image: {0}")]
    Image(#[from] image::ImageError),
    #[error("video encoder exited with {0}")]
    EncoderFailed(ExitStatus),
    #[error("video writer thread stopped")]
    WriterStopped,
}

/// Destination for captured RGBA frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), RecordError>;
    fn finish(self: Box<Self>) -> Result<(), RecordError>;
}

/// Arguments for an ffmpeg process encoding raw RGBA from stdin.
pub fn ffmpeg_args(settings: &RecordSettings) -> Vec<String> {
    let (encoder, tag) = settings.codec.ffmpeg_encoder();
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    args.push(format!("{}x{}", settings.width, settings.height));
    args.push("-r".into());
    args.push(settings.fps.to_string());
    args.extend(["-i".to_string(), "-".to_string()]);
    args.extend(["-c:v".to_string(), encoder.to_string()]);
    if let Some(tag) = tag {
        args.extend(["-vtag".to_string(), tag.to_string()]);
    }
    if encoder == "libx264" {
        args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    }
    args.push(settings.output.display().to_string());
    args
}

pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn spawn(settings: &RecordSettings) -> Result<Self, RecordError> {
        let program = settings.encoder.display().to_string();
        let args = ffmpeg_args(settings);
        tracing::debug!(%program, ?args, "launching video encoder");
        let mut child = Command::new(&settings.encoder)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RecordError::Spawn {
                program: program.clone(),
                source,
            })?;
        let stdin = child.stdin.take();
        Ok(Self { child, stdin })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), RecordError> {
        let stdin = self.stdin.as_mut().ok_or(RecordError::WriterStopped)?;
        stdin.write_all(frame)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), RecordError> {
        // Closing stdin tells ffmpeg the stream is over.
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(RecordError::EncoderFailed(status))
        }
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, ... into a directory.
pub struct PngSequenceSink {
    dir: PathBuf,
    width: u32,
    height: u32,
    next_index: u64,
}

impl PngSequenceSink {
    pub fn create(dir: &Path, width: u32, height: u32) -> Result<Self, RecordError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            width,
            height,
            next_index: 0,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), RecordError> {
        let path = self.frame_path(self.next_index);
        image::save_buffer(
            &path,
            frame,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        self.next_index += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RecordError> {
        Ok(())
    }
}

pub fn open_sink(settings: &RecordSettings) -> Result<Box<dyn FrameSink>, RecordError> {
    match settings.codec {
        VideoCodec::PngSequence => Ok(Box::new(PngSequenceSink::create(
            &settings.frame_dir(),
            settings.width,
            settings.height,
        )?)),
        _ => Ok(Box::new(FfmpegSink::spawn(settings)?)),
    }
}

/// Owns the writer thread. Dropping a recorder without calling
/// [`Recorder::finish`] still flushes it, logging any failure.
pub struct Recorder {
    sender: Option<Sender<Vec<u8>>>,
    worker: Option<JoinHandle<Result<u64, RecordError>>>,
    frame_len: usize,
}

impl Recorder {
    pub fn start(settings: &RecordSettings) -> Result<Self, RecordError> {
        let sink = open_sink(settings)?;
        tracing::info!(
            codec = settings.codec.fourcc(),
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            output = %settings.output.display(),
            "recording video"
        );
        Self::with_sink(settings.frame_len(), sink)
    }

    pub fn with_sink(frame_len: usize, mut sink: Box<dyn FrameSink>) -> Result<Self, RecordError> {
        let (sender, receiver) = bounded::<Vec<u8>>(QUEUE_DEPTH);
        let worker = thread::Builder::new()
            .name("video-writer".into())
            .spawn(move || {
                let mut written = 0u64;
                for frame in receiver.iter() {
                    sink.write_frame(&frame)?;
                    written += 1;
                }
                sink.finish()?;
                Ok(written)
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            frame_len,
        })
    }

    /// Queues one top-down RGBA frame.
    pub fn capture(&self, frame: Vec<u8>) -> Result<(), RecordError> {
        if frame.len() != self.frame_len {
            return Err(RecordError::FrameSize {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }
        let sender = self.sender.as_ref().ok_or(RecordError::WriterStopped)?;
        sender.send(frame).map_err(|_| RecordError::WriterStopped)
    }

    /// Closes the queue, waits for the writer and returns the frame count.
    pub fn finish(mut self) -> Result<u64, RecordError> {
        self.join()
    }

    fn join(&mut self) -> Result<u64, RecordError> {
        drop(self.sender.take());
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| RecordError::WriterStopped)?,
            None => Ok(0),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.join() {
                tracing::error!("video recording failed: {err}");
            }
        }
    }
}
